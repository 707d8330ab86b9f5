use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    compose::{CompositionInputs, plan},
    events::{EnrichedEvent, EventBus, expect},
    jobs::{JobStatus, JobStore},
    media::MediaTool,
    queues::QueueKind,
    workers::{CaptionsBuilt, InputSpec, SubscriptionSpec, VideoComposed, Worker},
    workspace::Workspace,
};

/// Probes the background, plans the encode and runs it.
pub struct ComposeVideoWorker {
    store: Arc<JobStore>,
    media: Arc<dyn MediaTool>,
    workspace: Workspace,
}

impl ComposeVideoWorker {
    pub fn new(store: Arc<JobStore>, media: Arc<dyn MediaTool>, workspace: Workspace) -> Self {
        Self {
            store,
            media,
            workspace,
        }
    }
}

#[async_trait]
impl Worker for ComposeVideoWorker {
    const SUBSCRIBER_ID: &'static str = "job.compose_video";

    fn subscription(capacity: usize) -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec {
                event_type: CaptionsBuilt::EVENT_TYPE,
                queue_kind: QueueKind::FifoDropOldest { capacity },
            }],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<CaptionsBuilt>(&event.event, CaptionsBuilt::EVENT_TYPE)?;
        let job = &req.job;

        self.store.advance(&job.job_id, JobStatus::GeneratingVideo)?;

        let background_duration = self
            .media
            .probe_duration(job.background.path())
            .await
            .unwrap_or(0.0);

        let inputs = CompositionInputs {
            background: job.background.path().to_path_buf(),
            audio: job.audio.path().to_path_buf(),
            subtitles: req.subtitles_path.clone(),
            output: self.workspace.output_path(&job.output_name),
        };
        let encode = plan(&inputs, background_duration, req.audio_duration, &job.config)?;
        tracing::info!(
            strategy = ?encode.strategy,
            background_duration,
            audio_duration = req.audio_duration,
            "encoding"
        );

        self.media.encode(&encode).await?;

        anyhow::ensure!(
            bus.publish(Arc::new(VideoComposed::new(
                req.header.event_id,
                job.clone(),
                encode.output,
                encode.output_duration,
            ))),
            "job ledger did not accept the result"
        );
        Ok(())
    }
}
