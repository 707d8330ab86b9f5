use std::path::PathBuf;

use serde::Serialize;
use uuid::Uuid;

use crate::workers::events::{EventHeader, JobSpec, job_event};

#[derive(Serialize)]
pub struct VideoComposed {
    pub header: EventHeader,
    pub job: JobSpec,
    pub output_path: PathBuf,
    pub duration: f64,
}

impl VideoComposed {
    pub const EVENT_TYPE: &'static str = "job.video_composed";

    pub fn new(parent_id: Uuid, job: JobSpec, output_path: PathBuf, duration: f64) -> Self {
        Self {
            header: EventHeader::child_of(parent_id),
            job,
            output_path,
            duration,
        }
    }
}

job_event!(VideoComposed);
