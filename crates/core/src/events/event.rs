use std::{any::Any, sync::Arc, time::SystemTime};

use erased_serde::Serialize as ErasedSerialize;
use tokio::time::Instant;
use uuid::Uuid;

pub trait Event: Send + Sync + ErasedSerialize + 'static {
    fn event_id(&self) -> Uuid;
    fn parent_ids(&self) -> &[Uuid];
    fn event_type(&self) -> &'static str;
    fn timestamp(&self) -> SystemTime;

    /// Job this event belongs to, if any.
    fn job_id(&self) -> Option<&str> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

erased_serde::serialize_trait_object!(Event);

pub struct EnrichedEvent {
    pub event: Arc<dyn Event>,
    pub ingest_seq: u64,
    pub session_id: Uuid,
    pub ingested_at: Instant,
}

pub fn downcast_ref<T: 'static>(e: &Arc<dyn Event>) -> Option<&T> {
    e.as_any().downcast_ref::<T>()
}

pub fn expect<'a, T: 'static>(
    e: &'a Arc<dyn Event>,
    expected_event_type: &'static str,
) -> anyhow::Result<&'a T> {
    downcast_ref::<T>(e).ok_or_else(|| {
        anyhow::anyhow!(
            "expected event_type={}, got={}",
            expected_event_type,
            e.event_type()
        )
    })
}
