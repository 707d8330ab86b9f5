use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use crate::workers::events::{EventHeader, JobSpec, job_event};

#[derive(Serialize)]
pub struct CaptionsBuilt {
    pub header: EventHeader,
    pub job: JobSpec,
    pub subtitles_path: PathBuf,
    /// Measured narration length in seconds.
    pub audio_duration: f64,
    pub caption_count: usize,
}

impl CaptionsBuilt {
    pub const EVENT_TYPE: &'static str = "job.captions_built";

    pub fn new(
        parent_id: Uuid,
        job: JobSpec,
        subtitles_path: PathBuf,
        audio_duration: f64,
        caption_count: usize,
    ) -> Self {
        Self {
            header: EventHeader::child_of(parent_id),
            job,
            subtitles_path,
            audio_duration,
            caption_count,
        }
    }
}

job_event!(CaptionsBuilt);
