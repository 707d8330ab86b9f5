use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    events::{BusConfig, BusMetrics, EnrichedEvent, Event},
    routes::Routes,
};

#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

pub struct EventBusInner {
    session_id: Uuid,
    next_ingest_seq: AtomicU64,
    routes: Arc<Routes>,
    metrics: Arc<BusMetrics>,
    strict_routing: bool,
}

impl EventBus {
    pub fn new(cfg: BusConfig, routes: Routes, metrics: Arc<BusMetrics>) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                session_id: cfg.session_id,
                next_ingest_seq: AtomicU64::new(0),
                routes: Arc::new(routes),
                metrics,
                strict_routing: cfg.strict_routing,
            }),
        }
    }

    /// Deliver an event to every subscribed inbox.
    ///
    /// Returns `false` when the event had no route or any inbox refused it.
    pub fn publish(&self, event: Arc<dyn Event>) -> bool {
        let ingest_seq = self.inner.next_ingest_seq.fetch_add(1, Ordering::Relaxed);

        if tracing::enabled!(tracing::Level::TRACE) {
            match serde_json::to_string(&*event) {
                Ok(payload) => tracing::trace!(
                    event_type = event.event_type(),
                    ingest_seq,
                    %payload,
                    "publish"
                ),
                Err(e) => tracing::trace!(event_type = event.event_type(), error = %e, "publish"),
            }
        }

        let enriched_event = Arc::new(EnrichedEvent {
            event,
            session_id: self.inner.session_id,
            ingest_seq,
            ingested_at: Instant::now(),
        });

        let event_type = enriched_event.event.event_type();
        let Some(routes) = self.inner.routes.table.get(event_type) else {
            self.inner.metrics.record_unrouted(event_type);

            if self.inner.strict_routing {
                panic!("Unrouted event type: {}", event_type);
            }

            return false;
        };

        let mut delivered_all = true;
        for route in routes {
            let ok = route.inbox.try_deliver(Arc::clone(&enriched_event));

            if !ok {
                route.drops_total.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    subscriber = route.subscriber_id,
                    event_type,
                    job_id = enriched_event.event.job_id(),
                    "inbox refused event"
                );
                delivered_all = false;
            }
        }
        delivered_all
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.session_id
    }

    pub fn metrics(&self) -> &BusMetrics {
        &self.inner.metrics
    }

    /// Events a subscriber's inbox refused so far.
    pub fn drops_for(&self, subscriber_id: &str) -> u64 {
        self.inner
            .routes
            .table
            .values()
            .flatten()
            .filter(|r| r.subscriber_id == subscriber_id)
            .map(|r| r.drops_total.load(Ordering::Relaxed))
            .sum()
    }
}
