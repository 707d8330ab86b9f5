//! Logging setup.
//!
//! Events pass an `EnvFilter` and then a per-layer budget that admits at most
//! `max_events_per_second` events in any one-second window. Rejected events
//! are counted and a periodic summary is logged under [`REPORT_TARGET`],
//! which the budget never rejects.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{Metadata, subscriber::Interest};
use tracing_subscriber::{
    EnvFilter, Layer,
    layer::{Context, Filter, SubscriberExt},
    util::SubscriberInitExt,
};

pub const REPORT_TARGET: &str = "tartil::log_budget";

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Environment variable holding the filter directives.
    pub filter_env: &'static str,
    /// Directive used when the variable is unset or invalid.
    pub default_directive: &'static str,
    pub max_events_per_second: usize,
    pub report_interval: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter_env: "TARTIL_LOG",
            default_directive: "info",
            max_events_per_second: 15,
            report_interval: Duration::from_secs(5),
        }
    }
}

/// Sliding one-second window of admitted events plus a dropped counter.
pub struct LogBudget {
    max_per_second: usize,
    window: Mutex<VecDeque<Instant>>,
    dropped: AtomicU64,
}

impl LogBudget {
    pub fn new(max_per_second: usize) -> Self {
        Self {
            max_per_second: max_per_second.max(1),
            window: Mutex::new(VecDeque::with_capacity(max_per_second.max(1))),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    fn admit_at(&self, now: Instant) -> bool {
        let mut window = self.window.lock().expect("LogBudget poisoned");
        while window
            .front()
            .is_some_and(|t| now.duration_since(*t) > Duration::from_secs(1))
        {
            window.pop_front();
        }

        if window.len() < self.max_per_second {
            window.push_back(now);
            true
        } else {
            drop(window);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Dropped events since the last call.
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

pub struct BudgetFilter {
    budget: Arc<LogBudget>,
}

impl<S> Filter<S> for BudgetFilter {
    fn enabled(&self, meta: &Metadata<'_>, _cx: &Context<'_, S>) -> bool {
        if !meta.is_event() || meta.target() == REPORT_TARGET {
            return true;
        }
        self.budget.admit()
    }

    // Admission depends on time, so every event must be asked about.
    fn callsite_enabled(&self, _meta: &'static Metadata<'static>) -> Interest {
        Interest::sometimes()
    }
}

/// Install the global subscriber. Returns the shared budget so the caller can
/// start [`spawn_drop_reporter`].
///
/// A second call leaves the existing subscriber in place.
pub fn init(config: &TelemetryConfig) -> Arc<LogBudget> {
    let budget = Arc::new(LogBudget::new(config.max_events_per_second));

    let env_filter = EnvFilter::try_from_env(config.filter_env)
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(BudgetFilter {
            budget: Arc::clone(&budget),
        });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();

    budget
}

/// Periodically log how many events the budget rejected.
pub fn spawn_drop_reporter(
    budget: Arc<LogBudget>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                _ = ticker.tick() => {
                    let dropped = budget.take_dropped();
                    if dropped > 0 {
                        tracing::warn!(target: REPORT_TARGET, dropped, "log events suppressed by rate limit");
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_admits_up_to_limit_per_window() {
        let budget = LogBudget::new(15);
        let start = Instant::now();

        let admitted = (0..20).filter(|_| budget.admit_at(start)).count();
        assert_eq!(admitted, 15);
        assert_eq!(budget.take_dropped(), 5);
        assert_eq!(budget.take_dropped(), 0);
    }

    #[test]
    fn test_budget_refills_after_a_second() {
        let budget = LogBudget::new(2);
        let start = Instant::now();
        assert!(budget.admit_at(start));
        assert!(budget.admit_at(start));
        assert!(!budget.admit_at(start + Duration::from_millis(500)));
        assert!(budget.admit_at(start + Duration::from_millis(1100)));
        assert_eq!(budget.take_dropped(), 1);
    }

    #[tokio::test]
    async fn test_reporter_stops_on_shutdown() {
        let budget = Arc::new(LogBudget::new(1));
        let (tx, rx) = broadcast::channel(1);
        let handle = spawn_drop_reporter(Arc::clone(&budget), Duration::from_millis(10), rx);

        budget.admit();
        budget.admit();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(budget.take_dropped(), 0);

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
