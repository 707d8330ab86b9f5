use serde::Serialize;

use crate::{
    config::RenderConfig,
    workers::events::{EventHeader, job_event},
    workspace::MediaSource,
};

/// Everything the stages need to render one job.
#[derive(Clone, Debug, Serialize)]
pub struct JobSpec {
    pub job_id: String,
    pub verse_text: String,
    pub audio: MediaSource,
    pub background: MediaSource,
    /// Sanitized file stem of the rendered video.
    pub output_name: String,
    pub config: RenderConfig,
}

#[derive(Serialize)]
pub struct JobSubmitted {
    pub header: EventHeader,
    pub job: JobSpec,
}

impl JobSubmitted {
    pub const EVENT_TYPE: &'static str = "job.submitted";

    pub fn new(job: JobSpec) -> Self {
        Self {
            header: EventHeader::root(),
            job,
        }
    }
}

job_event!(JobSubmitted);
