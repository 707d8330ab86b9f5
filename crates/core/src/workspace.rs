//! On-disk layout of a service root.
//!
//! ```text
//! <root>/uploads/<job_id>/   downloaded narration and background
//! <root>/temp/<job_id>.ass   subtitle track
//! <root>/outputs/<name>.mp4  rendered videos
//! <root>/backgrounds/        operator-provided backgrounds
//! ```

use std::path::{Component, Path, PathBuf};

use rand::seq::SliceRandom;

use crate::{
    error::{Result, TartilError},
    fetch::is_remote,
};

pub const DEFAULT_BACKGROUND: &str = "default";
const DEFAULT_BACKGROUND_FILE: &str = "default.mp4";

fn is_video_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| matches!(ext.as_str(), "mp4" | "mov" | "avi" | "mkv"))
}

/// A media reference resolved for one job.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MediaSource {
    /// Already on disk.
    Local(PathBuf),
    /// Downloaded to `dest` by the fetch stage.
    Remote { url: String, dest: PathBuf },
}

impl MediaSource {
    /// Where the media lives once the fetch stage is done.
    pub fn path(&self) -> &Path {
        match self {
            MediaSource::Local(path) => path,
            MediaSource::Remote { dest, .. } => dest,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory layout.
    pub async fn prepare(&self) -> Result<()> {
        for dir in [
            self.uploads_dir(),
            self.outputs_dir(),
            self.temp_dir(),
            self.backgrounds_dir(),
        ] {
            tokio::fs::create_dir_all(&dir).await?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.root.join("outputs")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("temp")
    }

    pub fn backgrounds_dir(&self) -> PathBuf {
        self.root.join("backgrounds")
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.uploads_dir().join(job_id)
    }

    pub fn subtitles_path(&self, job_id: &str) -> PathBuf {
        self.temp_dir().join(format!("{job_id}.ass"))
    }

    pub fn output_path(&self, output_name: &str) -> PathBuf {
        self.outputs_dir().join(format!("{output_name}.mp4"))
    }

    /// Resolve a background reference.
    ///
    /// `None` and `"default"` select `backgrounds/default.mp4`. URLs are
    /// fetched later into the job folder. Other names are looked up inside
    /// `backgrounds/`; a directory yields a random video from it.
    pub fn resolve_background(&self, reference: Option<&str>, job_id: &str) -> Result<MediaSource> {
        let reference = reference.map(str::trim).filter(|r| !r.is_empty());

        match reference {
            None | Some(DEFAULT_BACKGROUND) => {
                let default = self.backgrounds_dir().join(DEFAULT_BACKGROUND_FILE);
                if default.is_file() {
                    Ok(MediaSource::Local(default))
                } else {
                    Err(TartilError::BackgroundNotFound {
                        name: DEFAULT_BACKGROUND_FILE.to_string(),
                    })
                }
            }
            Some(url) if is_remote(url) => {
                let ext = Path::new(url.split(['?', '#']).next().unwrap_or(url))
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
                    .filter(|e| matches!(e.as_str(), "mp4" | "mov" | "avi" | "mkv"))
                    .unwrap_or_else(|| "mp4".to_string());
                Ok(MediaSource::Remote {
                    url: url.to_string(),
                    dest: self.job_dir(job_id).join(format!("background.{ext}")),
                })
            }
            Some(name) => self.resolve_local_background(name),
        }
    }

    fn resolve_local_background(&self, name: &str) -> Result<MediaSource> {
        let not_found = || TartilError::BackgroundNotFound {
            name: name.to_string(),
        };

        let relative = Path::new(name);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(not_found());
        }

        let candidate = self.backgrounds_dir().join(relative);
        if candidate.is_dir() {
            let mut videos: Vec<PathBuf> = std::fs::read_dir(&candidate)?
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.is_file() && is_video_file(path))
                .collect();
            videos.sort();

            let chosen = videos
                .choose(&mut rand::thread_rng())
                .cloned()
                .ok_or_else(not_found)?;
            tracing::debug!(background = %chosen.display(), "picked random background");
            Ok(MediaSource::Local(chosen))
        } else if candidate.is_file() {
            Ok(MediaSource::Local(candidate))
        } else {
            Err(not_found())
        }
    }

    /// Resolve the narration reference: a URL to download or an existing file.
    pub fn resolve_audio(&self, reference: &str, job_id: &str) -> Result<MediaSource> {
        let reference = reference.trim();
        if is_remote(reference) {
            return Ok(MediaSource::Remote {
                url: reference.to_string(),
                dest: self.job_dir(job_id).join("audio.mp3"),
            });
        }

        let path = PathBuf::from(reference);
        if path.is_file() {
            Ok(MediaSource::Local(path))
        } else {
            Err(TartilError::Validation(format!(
                "audio_url must be an http(s) URL or an existing file, got '{reference}'"
            )))
        }
    }

    /// Locate a rendered video by its file name inside `outputs/`.
    pub fn output_file(&self, filename: &str) -> Result<PathBuf> {
        let mut components = Path::new(filename).components();
        let plain_name = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !plain_name {
            return Err(TartilError::OutputNotFound(filename.to_string()));
        }

        let path = self.outputs_dir().join(filename);
        if path.is_file() {
            Ok(path)
        } else {
            Err(TartilError::OutputNotFound(filename.to_string()))
        }
    }
}

/// Restrict an output name to `[A-Za-z0-9._-]`, falling back when nothing
/// usable remains.
pub fn sanitize_output_name(name: &str, fallback: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}
