use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{process::Command, time::timeout};

use crate::{
    compose::EncodePlan,
    config::ServiceConfig,
    error::{Result, TartilError},
};

/// External media toolchain used by the pipeline.
#[async_trait]
pub trait MediaTool: Send + Sync + 'static {
    /// Container duration in seconds, or `None` when it cannot be read.
    async fn probe_duration(&self, path: &Path) -> Option<f64>;

    /// Run an encode to completion.
    async fn encode(&self, plan: &EncodePlan) -> Result<()>;
}

/// `MediaTool` backed by the ffmpeg/ffprobe binaries.
pub struct FfmpegTool {
    ffmpeg_bin: PathBuf,
    ffprobe_bin: PathBuf,
    probe_timeout: Duration,
    encode_timeout: Duration,
}

impl FfmpegTool {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            ffmpeg_bin: config.ffmpeg_bin.clone(),
            ffprobe_bin: config.ffprobe_bin.clone(),
            probe_timeout: config.probe_timeout,
            encode_timeout: config.encode_timeout,
        }
    }

    fn parse_duration(stdout: &[u8]) -> Option<f64> {
        let duration = String::from_utf8_lossy(stdout).trim().parse::<f64>().ok()?;
        duration.is_finite().then_some(duration)
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn probe_duration(&self, path: &Path) -> Option<f64> {
        let output = Command::new(&self.ffprobe_bin)
            .arg("-v")
            .arg("error")
            .arg("-show_entries")
            .arg("format=duration")
            .arg("-of")
            .arg("default=noprint_wrappers=1:nokey=1")
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        match timeout(self.probe_timeout, output).await {
            Ok(Ok(output)) if output.status.success() => Self::parse_duration(&output.stdout),
            Ok(Ok(output)) => {
                tracing::debug!(path = %path.display(), status = %output.status, "ffprobe failed");
                None
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "could not run ffprobe");
                None
            }
            Err(_) => {
                tracing::warn!(
                    path = %path.display(),
                    seconds = self.probe_timeout.as_secs(),
                    "ffprobe timed out"
                );
                None
            }
        }
    }

    async fn encode(&self, plan: &EncodePlan) -> Result<()> {
        tracing::debug!(args = %plan.display_args(), "running ffmpeg");

        let status = Command::new(&self.ffmpeg_bin)
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match timeout(self.encode_timeout, status).await {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => {
                tracing::warn!(%status, output = %plan.output.display(), "ffmpeg exited with failure");
                Err(TartilError::EncodeFailed)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "could not run ffmpeg");
                Err(TartilError::EncodeFailed)
            }
            Err(_) => Err(TartilError::ToolTimeout {
                tool: "ffmpeg".to_string(),
                seconds: self.encode_timeout.as_secs(),
            }),
        }
    }
}
