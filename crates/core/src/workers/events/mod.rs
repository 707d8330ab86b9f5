/// Implements [`Event`](crate::events::Event) for a stage event carrying a
/// `header: EventHeader` and a `job: JobSpec`.
macro_rules! job_event {
    ($ty:ty) => {
        impl $crate::events::Event for $ty {
            fn event_id(&self) -> uuid::Uuid {
                self.header.event_id
            }

            fn parent_ids(&self) -> &[uuid::Uuid] {
                &self.header.parent_ids
            }

            fn event_type(&self) -> &'static str {
                Self::EVENT_TYPE
            }

            fn timestamp(&self) -> std::time::SystemTime {
                self.header.timestamp
            }

            fn job_id(&self) -> Option<&str> {
                Some(&self.job.job_id)
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self as &dyn std::any::Any
            }
        }
    };
}

pub(crate) use job_event;

pub mod captions_built;
pub mod job_submitted;
pub mod media_fetched;
pub mod pipeline_failed;
pub mod video_composed;

pub use captions_built::*;
pub use job_submitted::*;
pub use media_fetched::*;
pub use pipeline_failed::*;
pub use video_composed::*;

use std::time::SystemTime;

use uuid::Uuid;

#[derive(Clone, Debug, serde::Serialize)]
pub struct EventHeader {
    pub event_id: Uuid,
    pub parent_ids: Vec<Uuid>,
    pub timestamp: SystemTime,
}

impl EventHeader {
    pub fn root() -> Self {
        Self {
            event_id: Uuid::new_v4(),
            parent_ids: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn child_of(parent_id: Uuid) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            parent_ids: vec![parent_id],
            timestamp: SystemTime::now(),
        }
    }
}
