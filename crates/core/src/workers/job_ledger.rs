use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    events::{EnrichedEvent, EventBus, downcast_ref},
    jobs::JobStore,
    queues::QueueKind,
    workers::{InputSpec, PipelineFailed, SubscriptionSpec, VideoComposed, Worker},
};

/// Records terminal outcomes in the job store.
///
/// Never fails: a ledger error would be routed straight back to itself.
pub struct JobLedgerWorker {
    store: Arc<JobStore>,
    download_prefix: String,
}

impl JobLedgerWorker {
    pub fn new(store: Arc<JobStore>, download_prefix: impl Into<String>) -> Self {
        Self {
            store,
            download_prefix: download_prefix.into(),
        }
    }

    fn record_success(&self, done: &VideoComposed) {
        let download_url = format!(
            "{}/{}.mp4",
            self.download_prefix.trim_end_matches('/'),
            done.job.output_name
        );
        match self
            .store
            .complete(&done.job.job_id, done.output_path.clone(), download_url)
        {
            Ok(job) => tracing::info!(
                job_id = %job.id,
                output = %done.output_path.display(),
                duration = done.duration,
                "job completed"
            ),
            Err(e) => tracing::warn!(job_id = %done.job.job_id, error = %e, "could not complete job"),
        }
    }

    fn record_failure(&self, failed: &PipelineFailed) {
        let Some(job_id) = failed.job_id.as_deref() else {
            tracing::warn!(stage = failed.stage, message = %failed.message, "failure without a job");
            return;
        };

        match self.store.fail(job_id, failed.message.clone()) {
            Ok(_) => tracing::warn!(job_id, stage = failed.stage, message = %failed.message, "job failed"),
            Err(e) => tracing::warn!(job_id, error = %e, "could not record failure"),
        }
    }
}

#[async_trait]
impl Worker for JobLedgerWorker {
    const SUBSCRIBER_ID: &'static str = "job.ledger";

    fn subscription(capacity: usize) -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![
                InputSpec {
                    event_type: VideoComposed::EVENT_TYPE,
                    queue_kind: QueueKind::Isolated {
                        output_buffer: capacity,
                    },
                },
                InputSpec {
                    event_type: PipelineFailed::EVENT_TYPE,
                    queue_kind: QueueKind::Isolated {
                        output_buffer: capacity,
                    },
                },
            ],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, _bus: &EventBus) -> anyhow::Result<()> {
        if let Some(done) = downcast_ref::<VideoComposed>(&event.event) {
            self.record_success(done);
        }

        if let Some(failed) = downcast_ref::<PipelineFailed>(&event.event) {
            self.record_failure(failed);
        }
        Ok(())
    }
}
