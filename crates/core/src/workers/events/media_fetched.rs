use serde::Serialize;
use uuid::Uuid;

use crate::workers::events::{EventHeader, JobSpec, job_event};

/// Narration and background are on local disk.
#[derive(Serialize)]
pub struct MediaFetched {
    pub header: EventHeader,
    pub job: JobSpec,
}

impl MediaFetched {
    pub const EVENT_TYPE: &'static str = "job.media_fetched";

    pub fn new(parent_id: Uuid, job: JobSpec) -> Self {
        Self {
            header: EventHeader::child_of(parent_id),
            job,
        }
    }
}

job_event!(MediaFetched);
