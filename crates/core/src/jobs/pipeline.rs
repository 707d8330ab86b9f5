use std::sync::Arc;

use tokio::{sync::broadcast, task::JoinHandle};

use crate::{
    error::{Result, TartilError},
    events::{BusConfig, EventBus, EventBusBuilder},
    fetch::MediaFetcher,
    jobs::JobStore,
    media::MediaTool,
    workers::{
        BuildCaptionsWorker, ComposeVideoWorker, FetchMediaWorker, JobLedgerWorker, Worker,
    },
    workspace::Workspace,
};

pub struct PipelineHandle {
    pub bus: Arc<EventBus>,
    pub shutdown_tx: broadcast::Sender<()>,
    pub tasks: Vec<JoinHandle<anyhow::Result<()>>>,
}

pub struct PipelineParts {
    pub store: Arc<JobStore>,
    pub media: Arc<dyn MediaTool>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub workspace: Workspace,
    pub download_prefix: String,
    /// Inbox size of every stage; matches the admission limit.
    pub capacity: usize,
}

fn spawn_worker<W: Worker>(
    worker: W,
    inputs: crate::workers::WorkerInputs,
    bus: &Arc<EventBus>,
    shutdown_tx: &broadcast::Sender<()>,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(worker.run(inputs, Arc::clone(bus), shutdown_tx.subscribe()))
}

/// Wire the stage workers onto a fresh bus and spawn them.
pub fn start_pipeline(bus_config: BusConfig, parts: PipelineParts) -> Result<PipelineHandle> {
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let capacity = parts.capacity.max(1);

    let builder = EventBusBuilder::new(bus_config)
        .subscribe(FetchMediaWorker::subscription(capacity))
        .subscribe(BuildCaptionsWorker::subscription(capacity))
        .subscribe(ComposeVideoWorker::subscription(capacity))
        .subscribe(JobLedgerWorker::subscription(capacity));

    let (bus, mut wiring, startup) = builder
        .build()
        .map_err(|e| TartilError::Wiring(e.to_string()))?;
    let bus = Arc::new(bus);

    // Isolated drain tasks must run before anything is published.
    for t in startup.tokio {
        tokio::spawn(t);
    }

    let tasks = vec![
        spawn_worker(
            FetchMediaWorker::new(parts.fetcher, parts.workspace.clone()),
            wiring.require(FetchMediaWorker::SUBSCRIBER_ID)?,
            &bus,
            &shutdown_tx,
        ),
        spawn_worker(
            BuildCaptionsWorker::new(
                Arc::clone(&parts.store),
                Arc::clone(&parts.media),
                parts.workspace.clone(),
            ),
            wiring.require(BuildCaptionsWorker::SUBSCRIBER_ID)?,
            &bus,
            &shutdown_tx,
        ),
        spawn_worker(
            ComposeVideoWorker::new(
                Arc::clone(&parts.store),
                Arc::clone(&parts.media),
                parts.workspace.clone(),
            ),
            wiring.require(ComposeVideoWorker::SUBSCRIBER_ID)?,
            &bus,
            &shutdown_tx,
        ),
        spawn_worker(
            JobLedgerWorker::new(Arc::clone(&parts.store), parts.download_prefix),
            wiring.require(JobLedgerWorker::SUBSCRIBER_ID)?,
            &bus,
            &shutdown_tx,
        ),
    ];

    tracing::debug!(session_id = %bus.session_id(), capacity, "pipeline started");

    Ok(PipelineHandle {
        bus,
        shutdown_tx,
        tasks,
    })
}
