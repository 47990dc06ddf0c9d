//! # qcoord-service: the coordinator's RPC facade and process lifecycle
//!
//! Bundles every manager crate behind one [`Coordinator`], exposes the
//! client- and worker-facing RPC surface as [`CoordinatorService`], and
//! drives the background loops (task dispatch, checkers, reconciliation,
//! handoff) that keep the in-memory indices converging on durable intent.

pub mod broker;
pub mod error;
pub mod metrics;
pub mod reconcile;
pub mod service;
pub mod state;
pub mod supervisor;

pub use broker::Broker;
pub use error::{CoordinatorError, CoordinatorResult};
pub use metrics::Metrics;
pub use reconcile::Reconciler;
pub use service::{CollectionStatusView, CoordinatorService, PartitionStatusView, ShardLeaderView};
pub use state::{CoordinatorState, StateHolder};
pub use supervisor::Supervisor;

use std::sync::Arc;

use qcoord_catalog::Catalog;
use qcoord_checkers::{FailedLoadCache, HandoffObserver};
use qcoord_config::QCoordConfig;
use qcoord_distribution::DistributionManager;
use qcoord_job::JobScheduler;
use qcoord_meta::{FileMetaStore, KeyLayout, MetaStore};
use qcoord_resource::ResourceManager;
use qcoord_target::TargetManager;
use qcoord_task::{TaskScheduler, WorkerClient};
use qcoord_types::ResourceGroupName;

/// Everything needed to bring a coordinator process up: the durable store
/// is built from configuration, but the broker and worker client are
/// external RPC collaborators (spec §1, §6) the caller supplies.
pub struct Coordinator {
    pub service: Arc<CoordinatorService>,
    pub state: Arc<StateHolder>,
    reconciler: Arc<Reconciler>,
    supervisor: Arc<Supervisor>,
    handoff: Arc<HandoffObserver>,
    job_events: parking_lot::Mutex<Option<tokio::sync::mpsc::UnboundedReceiver<qcoord_job::JobOutcome>>>,
}

impl Coordinator {
    /// Builds every manager from `config`, opens the embedded meta store,
    /// and provisions any resource groups named in `config.resource_groups`.
    /// Does not call [`Catalog::load_all`] or flip the coordinator healthy;
    /// call [`Coordinator::run`] (or drive those steps manually) to do so.
    pub fn new(config: &QCoordConfig, broker: Arc<dyn Broker>, worker: Arc<dyn WorkerClient>) -> Result<Self, CoordinatorError> {
        let meta: Arc<dyn MetaStore> = Arc::new(FileMetaStore::open(&config.meta.root).map_err(qcoord_catalog::CatalogError::from)?);
        let keys = KeyLayout::new(config.meta.key_root.clone());

        let catalog = Arc::new(Catalog::new(meta.clone(), keys.clone()));
        let distribution = Arc::new(DistributionManager::new());
        let target = Arc::new(TargetManager::new());
        let resources = Arc::new(ResourceManager::new());
        let failed_load = Arc::new(FailedLoadCache::new(std::time::Duration::from_secs(config.scheduler.failed_load_ttl_secs)));

        for group in &config.resource_groups.groups {
            let name = ResourceGroupName::new(group.name.clone());
            if resources.group(&name).is_none() {
                resources.create(name, group.capacity)?;
            }
        }

        let (jobs, job_events) = JobScheduler::new(catalog.clone(), resources.clone());
        let jobs = Arc::new(jobs);
        let task = Arc::new(TaskScheduler::new(distribution.clone(), target.clone(), worker));

        let state = Arc::new(StateHolder::new(CoordinatorState::Starting));
        let metrics = Arc::new(Metrics::new());

        let service = Arc::new(CoordinatorService::new(
            catalog.clone(),
            distribution.clone(),
            target.clone(),
            resources.clone(),
            jobs.clone(),
            task.clone(),
            broker,
            failed_load.clone(),
            state.clone(),
            metrics,
        ));

        let reconciler = service.reconciler().clone();
        let supervisor = Arc::new(Supervisor::new(catalog, distribution, target, resources, task, failed_load, config.scheduler.clone()));
        let handoff = Arc::new(HandoffObserver::new(meta, keys, jobs));

        Ok(Self {
            service,
            state,
            reconciler,
            supervisor,
            handoff,
            job_events: parking_lot::Mutex::new(Some(job_events)),
        })
    }

    /// Loads durable state, marks the coordinator healthy, and spawns the
    /// reconciliation, handoff, and checker/dispatch background tasks.
    /// Returns once startup completes; the spawned tasks keep running in
    /// the background until the process exits (the supervisor loop exits
    /// on Ctrl-C, the others on meta-store shutdown).
    pub async fn run(&self) -> Result<(), CoordinatorError> {
        self.service.catalog().load_all().await?;

        if let Err(e) = self.handoff.drain_pending().await {
            tracing::warn!(error = %e, "failed to drain pending handoff records at startup");
        }

        self.state.set(CoordinatorState::Healthy);
        tracing::info!("coordinator is healthy");

        let job_events = self.job_events.lock().take().expect("Coordinator::run called more than once");

        let reconciler = self.reconciler.clone();
        tokio::spawn(async move { reconciler.run(job_events).await });

        let handoff = self.handoff.clone();
        tokio::spawn(async move {
            if let Err(e) = handoff.run().await {
                tracing::error!(error = %e, "handoff observer exited with an error");
            }
        });

        self.supervisor.run().await;
        self.state.set(CoordinatorState::Stopping);
        Ok(())
    }
}
