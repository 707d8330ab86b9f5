//! Encoder invocation planning.
//!
//! [`plan`] reconciles the background clip against the narration and produces
//! the full ffmpeg argument list. Durations are probed by the caller so the
//! planner stays pure.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::{
    config::RenderConfig,
    error::{Result, TartilError},
};

/// Trailing silence appended to the narration before the hard clip.
const AUDIO_PAD_SECONDS: u32 = 1;

/// How the background is stretched over the narration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Background shorter than the narration; the input is repeated.
    Loop { loops_needed: u64 },
    /// Background long enough to cover the narration.
    SinglePass,
    /// Background without a measurable duration, treated as one frame held.
    StillImage,
}

impl Strategy {
    pub fn choose(background_duration: f64, audio_duration: f64) -> Self {
        if !(background_duration > 0.0) {
            Strategy::StillImage
        } else if background_duration < audio_duration {
            Strategy::Loop {
                loops_needed: (audio_duration / background_duration).floor() as u64 + 1,
            }
        } else {
            Strategy::SinglePass
        }
    }
}

#[derive(Clone, Debug)]
pub struct CompositionInputs {
    pub background: PathBuf,
    pub audio: PathBuf,
    pub subtitles: PathBuf,
    pub output: PathBuf,
}

/// A ready-to-run encoder invocation.
#[derive(Clone, Debug)]
pub struct EncodePlan {
    pub strategy: Strategy,
    pub width: u32,
    pub height: u32,
    /// Clip length of the output, equal to the narration duration.
    pub output_duration: f64,
    pub output: PathBuf,
    /// Arguments after the program name.
    pub args: Vec<OsString>,
}

impl EncodePlan {
    pub fn display_args(&self) -> String {
        self.args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// Option-level escaping first, then filtergraph-level.
fn escape_filter_value(value: &str) -> String {
    let escape = |input: &str, special: &[char]| {
        let mut out = String::with_capacity(input.len());
        for c in input.chars() {
            if special.contains(&c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    };
    let option = escape(value, &['\\', '\'', ':']);
    escape(&option, &['\\', '\'', '[', ']', ',', ';'])
}

fn subtitle_filter(subtitles: &Path, fonts_dir: Option<&Path>) -> String {
    let mut filter = format!(
        "ass={}",
        escape_filter_value(&subtitles.to_string_lossy())
    );
    if let Some(dir) = fonts_dir {
        filter.push_str(&format!(
            ":fontsdir={}",
            escape_filter_value(&dir.to_string_lossy())
        ));
    }
    filter
}

/// Build the encoder invocation for one job.
///
/// Fails with [`TartilError::UnmeasurableAudio`] when the narration duration
/// is not positive, since the clip would be empty.
pub fn plan(
    inputs: &CompositionInputs,
    background_duration: f64,
    audio_duration: f64,
    config: &RenderConfig,
) -> Result<EncodePlan> {
    if !(audio_duration > 0.0) {
        return Err(TartilError::UnmeasurableAudio {
            path: inputs.audio.clone(),
        });
    }

    let strategy = Strategy::choose(background_duration, audio_duration);
    let (width, height) = config.resolution.dimensions();

    let mut args: Vec<OsString> = Vec::with_capacity(32);
    let mut push = |arg: &str| args.push(OsString::from(arg));

    match strategy {
        Strategy::Loop { loops_needed } => {
            push("-stream_loop");
            push(&loops_needed.to_string());
        }
        Strategy::StillImage => {
            push("-loop");
            push("1");
        }
        Strategy::SinglePass => {}
    }

    let filter = format!(
        "[0:v]scale={width}:{height}:force_original_aspect_ratio=decrease,\
         pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,{subtitles}[v];\
         [1:a]apad=pad_dur={AUDIO_PAD_SECONDS}[a]",
        subtitles = subtitle_filter(&inputs.subtitles, config.fonts_dir.as_deref()),
    );

    args.push("-i".into());
    args.push(inputs.background.clone().into_os_string());
    args.push("-i".into());
    args.push(inputs.audio.clone().into_os_string());

    for arg in [
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "[v]".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
        "-t".to_string(),
        audio_duration.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-crf".to_string(),
        config.crf.to_string(),
        "-preset".to_string(),
        config.preset.clone(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        config.audio_bitrate.clone(),
        "-y".to_string(),
    ] {
        args.push(arg.into());
    }
    args.push(inputs.output.clone().into_os_string());

    Ok(EncodePlan {
        strategy,
        width,
        height,
        output_duration: audio_duration,
        output: inputs.output.clone(),
        args,
    })
}
