use std::{any::Any, sync::Arc, time::SystemTime};

use serde::Serialize;
use uuid::Uuid;

use crate::events::Event;

#[derive(Clone, Debug, Serialize)]
pub struct PipelineFailed {
    pub event_id: Uuid,
    pub ts: SystemTime,
    pub parents: [Uuid; 1],
    pub job_id: Option<String>,
    pub stage: &'static str,
    pub message: String,
}

impl PipelineFailed {
    pub const EVENT_TYPE: &'static str = "pipeline.failed";

    pub fn new(parent: Arc<dyn Event>, stage: &'static str, message: String) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            ts: SystemTime::now(),
            parents: [parent.event_id()],
            job_id: parent.job_id().map(str::to_string),
            stage,
            message,
        }
    }
}

impl Event for PipelineFailed {
    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn parent_ids(&self) -> &[Uuid] {
        &self.parents
    }

    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }

    fn timestamp(&self) -> SystemTime {
        self.ts
    }

    fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self as &dyn Any
    }
}
