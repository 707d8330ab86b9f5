use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    captions::{StyleSheet, build},
    events::{EnrichedEvent, EventBus, expect},
    jobs::{JobStatus, JobStore},
    media::MediaTool,
    queues::QueueKind,
    text::{prepare, segment},
    timeline::allocate,
    workers::{CaptionsBuilt, InputSpec, MediaFetched, SubscriptionSpec, Worker},
    workspace::Workspace,
};

/// Times the text against the narration and writes the subtitle track.
pub struct BuildCaptionsWorker {
    store: Arc<JobStore>,
    media: Arc<dyn MediaTool>,
    workspace: Workspace,
}

impl BuildCaptionsWorker {
    pub fn new(store: Arc<JobStore>, media: Arc<dyn MediaTool>, workspace: Workspace) -> Self {
        Self {
            store,
            media,
            workspace,
        }
    }
}

#[async_trait]
impl Worker for BuildCaptionsWorker {
    const SUBSCRIBER_ID: &'static str = "job.build_captions";

    fn subscription(capacity: usize) -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id: Self::SUBSCRIBER_ID,
            inputs: vec![InputSpec {
                event_type: MediaFetched::EVENT_TYPE,
                queue_kind: QueueKind::FifoDropOldest { capacity },
            }],
        }
    }

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> anyhow::Result<()> {
        let req = expect::<MediaFetched>(&event.event, MediaFetched::EVENT_TYPE)?;
        let job = &req.job;
        let config = &job.config;

        self.store
            .advance(&job.job_id, JobStatus::GeneratingSubtitles)?;

        let audio_duration = self
            .media
            .probe_duration(job.audio.path())
            .await
            .unwrap_or(0.0);

        let text = prepare(&job.verse_text, config.clean_policy(), config.remove_diacritics);
        let units = segment(&text, config.words_per_segment, config.max_segments);
        let timeline = allocate(&units, audio_duration);

        let reciter_name = Some(config.reciter_name.as_str());
        let document = build(&timeline, &StyleSheet::from_config(config), reciter_name)?;

        let subtitles_path = self.workspace.subtitles_path(&job.job_id);
        document.write_to(&subtitles_path).await?;
        tracing::info!(
            captions = timeline.len(),
            audio_duration,
            "subtitle track written"
        );

        anyhow::ensure!(
            bus.publish(Arc::new(CaptionsBuilt::new(
                req.header.event_id,
                job.clone(),
                subtitles_path,
                audio_duration,
                timeline.len(),
            ))),
            "compose stage did not accept the job"
        );
        Ok(())
    }
}
