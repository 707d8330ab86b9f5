use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use crate::{
    events::{EnrichedEvent, EventBus, expect},
    fetch::MediaFetcher,
    queues::QueueKind,
    workers::{InputSpec, JobSubmitted, MediaFetched, SubscriptionSpec, Worker},
    workspace::{MediaSource, Workspace},
};

/// Downloads remote narration and background into the job folder.
pub struct FetchMediaWorker {
    fetcher: Arc<dyn MediaFetcher>,
    workspace: Workspace,
}

impl FetchMediaWorker {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, workspace: Workspace) -> Self {
        Self { fetcher, workspace }
    }

    async fn ensure_local(&self, source: &MediaSource) -> crate::Result<()> {
        if let MediaSource::Remote { url, dest } = source {
            tracing::info!(%url, "downloading");
            self.fetcher.fetch(url, dest).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Worker for FetchMediaWorker {
    const SUBSCRIBER_ID: &'static str = "job.fetch_media";

    fn subscription(capacity: usize) -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec {
                event_type: JobSubmitted::EVENT_TYPE,
                queue_kind: QueueKind::BoundedDropNewest { capacity },
            }],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<JobSubmitted>(&event.event, JobSubmitted::EVENT_TYPE)?;
        let job = &req.job;

        tokio::fs::create_dir_all(self.workspace.job_dir(&job.job_id))
            .await
            .context("could not create job folder")?;

        self.ensure_local(&job.audio).await?;
        self.ensure_local(&job.background).await?;

        anyhow::ensure!(
            bus.publish(Arc::new(MediaFetched::new(req.header.event_id, job.clone()))),
            "caption stage did not accept the job"
        );
        Ok(())
    }
}
