use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::{
    events::{EnrichedEvent, EventBus},
    workers::{PipelineFailed, SubscriptionSpec, WorkerInputs},
};

/// A pipeline stage. Handles one event at a time; an error from `handle`
/// becomes a [`PipelineFailed`] event naming this stage.
#[async_trait]
pub trait Worker: Send + Sized + 'static {
    const SUBSCRIBER_ID: &'static str;

    fn subscription(capacity: usize) -> SubscriptionSpec;

    async fn handle(&mut self, event: Arc<EnrichedEvent>, bus: &EventBus) -> Result<()>;

    async fn run(
        mut self,
        mut inputs: WorkerInputs,
        bus: Arc<EventBus>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<()> {
        tracing::debug!(stage = Self::SUBSCRIBER_ID, "worker started");
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::debug!(stage = Self::SUBSCRIBER_ID, "worker stopped");
                    return Ok(());
                }
                item = inputs.next() => {
                    let parent = Arc::clone(&item.event.event);
                    let span = tracing::info_span!(
                        "stage",
                        stage = Self::SUBSCRIBER_ID,
                        job_id = parent.job_id().unwrap_or("-"),
                    );

                    if let Err(e) = self.handle(item.event, &bus).instrument(span).await {
                        // Alternate form keeps the causes behind any added context.
                        let message = format!("{e:#}");
                        tracing::warn!(
                            stage = Self::SUBSCRIBER_ID,
                            job_id = parent.job_id(),
                            error = %message,
                            "stage failed"
                        );
                        bus.publish(Arc::new(PipelineFailed::new(
                            parent,
                            Self::SUBSCRIBER_ID,
                            message,
                        )));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{any::Any, time::SystemTime};

    use anyhow::Context;
    use uuid::Uuid;

    use super::*;
    use crate::{
        events::{BusConfig, Event, EventBusBuilder, downcast_ref},
        queues::QueueKind,
        workers::InputSpec,
    };

    #[derive(serde::Serialize)]
    struct Tick {
        id: Uuid,
    }

    impl Event for Tick {
        fn event_id(&self) -> Uuid {
            self.id
        }

        fn parent_ids(&self) -> &[Uuid] {
            &[]
        }

        fn event_type(&self) -> &'static str {
            "test.tick"
        }

        fn timestamp(&self) -> SystemTime {
            SystemTime::now()
        }

        fn job_id(&self) -> Option<&str> {
            Some("job-1")
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Failing;

    #[async_trait]
    impl Worker for Failing {
        const SUBSCRIBER_ID: &'static str = "test.failing";

        fn subscription(capacity: usize) -> SubscriptionSpec {
            SubscriptionSpec {
                subscriber_id: Self::SUBSCRIBER_ID,
                inputs: vec![InputSpec {
                    event_type: "test.tick",
                    queue_kind: QueueKind::BoundedDropNewest { capacity },
                }],
            }
        }

        async fn handle(&mut self, _event: Arc<EnrichedEvent>, _bus: &EventBus) -> Result<()> {
            Err(std::io::Error::other("disk gone")).context("could not create job folder")
        }
    }

    #[tokio::test]
    async fn test_failure_event_keeps_the_whole_error_chain() {
        let (bus, mut wiring, _tasks) = EventBusBuilder::new(BusConfig::default())
            .subscribe(Failing::subscription(4))
            .subscribe(SubscriptionSpec {
                subscriber_id: "test.sink",
                inputs: vec![InputSpec {
                    event_type: PipelineFailed::EVENT_TYPE,
                    queue_kind: QueueKind::FifoDropOldest { capacity: 4 },
                }],
            })
            .build()
            .unwrap();
        let bus = Arc::new(bus);
        let (shutdown_tx, _) = broadcast::channel(1);

        let worker = tokio::spawn(Failing.run(
            wiring.take(Failing::SUBSCRIBER_ID).unwrap(),
            Arc::clone(&bus),
            shutdown_tx.subscribe(),
        ));
        assert!(bus.publish(Arc::new(Tick { id: Uuid::new_v4() })));

        let mut sink = wiring.take("test.sink").unwrap();
        let item = sink.next().await;
        let failed = downcast_ref::<PipelineFailed>(&item.event.event).unwrap();
        assert_eq!(failed.stage, Failing::SUBSCRIBER_ID);
        assert_eq!(failed.job_id.as_deref(), Some("job-1"));
        assert_eq!(failed.message, "could not create job folder: disk gone");

        shutdown_tx.send(()).unwrap();
        worker.await.unwrap().unwrap();
    }
}
