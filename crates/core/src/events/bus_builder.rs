use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::Result;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{
    events::EventBus,
    queues::{BoundedQueue, IsolatedForwarder, Overflow, QueueKind, StartupTasks},
    routes::{Route, RouteInbox, Routes},
    workers::{FifoInput, FifoReceiver, SubscriptionSpec, WorkerInputs, WorkerWiring},
};

pub struct BusConfig {
    pub session_id: Uuid,
    pub strict_routing: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            strict_routing: false,
        }
    }
}

#[derive(Default)]
pub struct BusMetrics {
    pub unrouted_publish_total: AtomicU64,
}

impl BusMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_unrouted(&self, evt: &'static str) {
        self.unrouted_publish_total.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(event_type = evt, "published event has no subscriber");
    }

    pub fn unrouted_total(&self) -> u64 {
        self.unrouted_publish_total.load(Ordering::Relaxed)
    }
}

fn validate(subs: &[SubscriptionSpec]) -> Result<()> {
    use std::collections::HashSet;

    let mut seen_subscribers: HashSet<&'static str> = HashSet::new();
    for s in subs {
        if s.subscriber_id.trim().is_empty() {
            anyhow::bail!("empty subscriber_id");
        }
        if !seen_subscribers.insert(s.subscriber_id) {
            anyhow::bail!("duplicate subscriber_id={}", s.subscriber_id);
        }
        if s.inputs.is_empty() {
            anyhow::bail!("subscriber_id={} has no inputs", s.subscriber_id);
        }

        let mut seen_inputs: HashSet<&'static str> = HashSet::new();
        for i in &s.inputs {
            if i.event_type.trim().is_empty() {
                anyhow::bail!("subscriber_id={} has empty event_type", s.subscriber_id);
            }
            if !seen_inputs.insert(i.event_type) {
                anyhow::bail!(
                    "subscriber_id={} has duplicate input event_type={}",
                    s.subscriber_id,
                    i.event_type
                );
            }

            match i.queue_kind {
                QueueKind::FifoDropOldest { capacity } => {
                    anyhow::ensure!(capacity > 0, "capacity must be > 0")
                }
                QueueKind::BoundedDropNewest { capacity } => {
                    anyhow::ensure!(capacity > 0, "capacity must be > 0")
                }
                QueueKind::Isolated { output_buffer } => {
                    anyhow::ensure!(output_buffer > 0, "output_buffer must be > 0")
                }
            }
        }
    }
    Ok(())
}

pub struct EventBusBuilder {
    cfg: BusConfig,
    subs: Vec<SubscriptionSpec>,
}

impl EventBusBuilder {
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            subs: Vec::new(),
        }
    }

    pub fn subscribe(mut self, s: SubscriptionSpec) -> Self {
        self.subs.push(s);
        self
    }

    pub fn build(self) -> Result<(EventBus, WorkerWiring, StartupTasks)> {
        validate(&self.subs)?;

        let mut routes: HashMap<&'static str, Vec<Route>> = HashMap::new();
        let mut wiring: HashMap<&'static str, WorkerInputs> = HashMap::new();
        let mut tasks = StartupTasks { tokio: Vec::new() };
        let metrics = Arc::new(BusMetrics::new());

        for spec in self.subs {
            let notify_any = Arc::new(Notify::new());
            let mut fifos = Vec::new();

            for input in spec.inputs {
                let drops_total = Arc::new(AtomicU64::new(0));

                let bounded = |capacity: usize, overflow: Overflow| {
                    let q = Arc::new(BoundedQueue::new(capacity, overflow, Arc::clone(&notify_any)));
                    let receiver = FifoReceiver::Bounded(q.receiver());
                    (RouteInbox::Bounded(q), receiver)
                };

                let (inbox, receiver) = match input.queue_kind {
                    QueueKind::FifoDropOldest { capacity } => bounded(capacity, Overflow::DropOldest),
                    QueueKind::BoundedDropNewest { capacity } => {
                        bounded(capacity, Overflow::RejectNewest)
                    }
                    QueueKind::Isolated { output_buffer } => {
                        let (fwd, out_rx, drain_task) =
                            IsolatedForwarder::new(output_buffer, Arc::clone(&notify_any));
                        tasks.tokio.push(drain_task);
                        (RouteInbox::Isolated(fwd), FifoReceiver::Isolated(out_rx))
                    }
                };

                routes.entry(input.event_type).or_default().push(Route {
                    subscriber_id: spec.subscriber_id,
                    inbox,
                    drops_total,
                });
                fifos.push(FifoInput {
                    event_type: input.event_type,
                    receiver,
                });
            }

            wiring.insert(
                spec.subscriber_id,
                WorkerInputs {
                    fifos,
                    notify_any,
                    fifo_index: 0,
                },
            );
        }

        let bus = EventBus::new(self.cfg, Routes { table: routes }, metrics);
        Ok((bus, WorkerWiring::new(wiring), tasks))
    }
}

#[cfg(test)]
mod tests {
    use std::{any::Any, time::SystemTime};

    use super::*;
    use crate::{events::Event, workers::InputSpec};

    #[derive(serde::Serialize)]
    struct Ping {
        id: Uuid,
    }

    impl Ping {
        const EVENT_TYPE: &'static str = "test.ping";
    }

    impl Event for Ping {
        fn event_id(&self) -> Uuid {
            self.id
        }

        fn parent_ids(&self) -> &[Uuid] {
            &[]
        }

        fn event_type(&self) -> &'static str {
            Self::EVENT_TYPE
        }

        fn timestamp(&self) -> SystemTime {
            SystemTime::now()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn ping() -> Arc<Ping> {
        Arc::new(Ping { id: Uuid::new_v4() })
    }

    fn spec(subscriber_id: &'static str, event_type: &'static str, queue_kind: QueueKind) -> SubscriptionSpec {
        SubscriptionSpec {
            subscriber_id,
            inputs: vec![InputSpec {
                event_type,
                queue_kind,
            }],
        }
    }

    #[test]
    fn test_duplicate_subscribers_are_rejected() {
        let result = EventBusBuilder::new(BusConfig::default())
            .subscribe(spec("a", Ping::EVENT_TYPE, QueueKind::FifoDropOldest { capacity: 1 }))
            .subscribe(spec("a", Ping::EVENT_TYPE, QueueKind::FifoDropOldest { capacity: 1 }))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let result = EventBusBuilder::new(BusConfig::default())
            .subscribe(spec("a", Ping::EVENT_TYPE, QueueKind::BoundedDropNewest { capacity: 0 }))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_bounded_inbox_refuses_when_full() {
        let (bus, mut wiring, _tasks) = EventBusBuilder::new(BusConfig::default())
            .subscribe(spec("intake", Ping::EVENT_TYPE, QueueKind::BoundedDropNewest { capacity: 1 }))
            .build()
            .unwrap();

        let first = ping();
        let first_id = first.id;
        assert!(bus.publish(first));
        assert!(!bus.publish(ping()));
        assert_eq!(bus.drops_for("intake"), 1);

        let mut inputs = wiring.take("intake").unwrap();
        let item = inputs.next().await;
        assert_eq!(item.event_type, Ping::EVENT_TYPE);
        assert_eq!(item.event.event.event_id(), first_id);
    }

    #[tokio::test]
    async fn test_drop_oldest_inbox_keeps_latest() {
        let (bus, mut wiring, _tasks) = EventBusBuilder::new(BusConfig::default())
            .subscribe(spec("stage", Ping::EVENT_TYPE, QueueKind::FifoDropOldest { capacity: 1 }))
            .build()
            .unwrap();

        assert!(bus.publish(ping()));
        let second = ping();
        let second_id = second.id;
        assert!(bus.publish(second));

        let mut inputs = wiring.take("stage").unwrap();
        assert_eq!(inputs.next().await.event.event.event_id(), second_id);
    }

    #[test]
    fn test_unrouted_events_are_counted() {
        let (bus, _wiring, _tasks) = EventBusBuilder::new(BusConfig::default())
            .subscribe(spec("a", "test.other", QueueKind::FifoDropOldest { capacity: 1 }))
            .build()
            .unwrap();

        assert!(!bus.publish(ping()));
        assert_eq!(bus.metrics().unrouted_total(), 1);
    }
}
