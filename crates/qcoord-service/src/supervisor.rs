//! Background tick loop: the checkers and the task dispatcher each run on
//! their own fixed-interval cadence, modeled on the same
//! `tokio::select!` + `tokio::time::interval` shape used elsewhere in the
//! workspace for long-lived monitor loops. One `Supervisor` per
//! coordinator process; `run` exits on Ctrl-C or when its shutdown
//! signal fires.

use std::collections::HashSet;
use std::sync::Arc;

use qcoord_catalog::Catalog;
use qcoord_checkers::{
    BalanceChecker, ChannelChecker, FailedLoadCache, FailedLoadSweeper, LeaderChecker, SegmentChecker, TargetObserver,
};
use qcoord_config::SchedulerConfig;
use qcoord_distribution::DistributionManager;
use qcoord_resource::ResourceManager;
use qcoord_target::TargetManager;
use qcoord_task::TaskScheduler;
use tokio::signal;
use tokio::time::{interval, Duration};

/// Owns one checker/observer of each kind plus the task dispatcher, and
/// ticks each on its configured interval until shut down.
pub struct Supervisor {
    resources: Arc<ResourceManager>,
    task: Arc<TaskScheduler>,
    segment: SegmentChecker,
    channel: ChannelChecker,
    balance: BalanceChecker,
    leader: LeaderChecker,
    target_observer: TargetObserver,
    failed_load: Arc<FailedLoadCache>,
    failed_load_sweeper: FailedLoadSweeper,
    config: SchedulerConfig,
}

impl Supervisor {
    pub fn new(
        catalog: Arc<Catalog>,
        distribution: Arc<DistributionManager>,
        target: Arc<TargetManager>,
        resources: Arc<ResourceManager>,
        task: Arc<TaskScheduler>,
        failed_load: Arc<FailedLoadCache>,
        config: SchedulerConfig,
    ) -> Self {
        let segment = SegmentChecker::new(catalog.clone(), distribution.clone(), target.clone(), task.clone());
        let channel = ChannelChecker::new(catalog.clone(), distribution.clone(), target.clone(), task.clone());
        let balance = BalanceChecker::new(catalog.clone(), distribution.clone(), task.clone()).with_threshold_rows(config.balance_threshold_rows);
        let leader = LeaderChecker::new(catalog.clone(), distribution.clone(), target.clone())
            .with_stale_after(Duration::from_secs(config.leader_stale_after_secs));
        let target_observer = TargetObserver::new(catalog, distribution, target);
        let failed_load_sweeper = FailedLoadSweeper::new(failed_load.clone());

        Self { resources, task, segment, channel, balance, leader, target_observer, failed_load, failed_load_sweeper, config }
    }

    fn live_nodes(&self) -> HashSet<qcoord_types::NodeId> {
        self.resources.list_groups().into_iter().flat_map(|g| g.nodes.into_iter()).collect()
    }

    /// Runs every checker and the dispatcher on its own interval until
    /// Ctrl-C arrives. Intended to be spawned as the coordinator's sole
    /// background task.
    pub async fn run(&self) {
        let mut dispatch_tick = interval(Duration::from_secs(self.config.dispatch_interval_secs.max(1)));
        let mut balance_tick = interval(Duration::from_secs(self.config.balance_interval_secs.max(1)));
        let mut channel_tick = interval(Duration::from_secs(self.config.channel_interval_secs.max(1)));
        let mut segment_tick = interval(Duration::from_secs(self.config.segment_interval_secs.max(1)));
        let mut leader_tick = interval(Duration::from_secs(self.config.leader_interval_secs.max(1)));
        let mut target_tick = interval(Duration::from_secs(self.config.target_interval_secs.max(1)));
        let mut sweep_tick = interval(Duration::from_secs(self.config.failed_load_sweep_interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = dispatch_tick.tick() => {
                    let live = self.live_nodes();
                    let report = self.task.dispatch_tick(&live).await;
                    for (_, collection_id) in &report.insufficient_memory {
                        self.failed_load.put(*collection_id, "worker reported insufficient memory to load");
                    }
                    tracing::debug!(?report, "task dispatch tick");
                }
                _ = segment_tick.tick() => {
                    let report = self.segment.tick();
                    tracing::debug!(?report, "segment checker tick");
                }
                _ = channel_tick.tick() => {
                    let report = self.channel.tick();
                    tracing::debug!(?report, "channel checker tick");
                }
                _ = balance_tick.tick() => {
                    let report = self.balance.tick();
                    tracing::debug!(?report, "balance checker tick");
                }
                _ = leader_tick.tick() => {
                    let report = self.leader.tick();
                    tracing::debug!(?report, "leader checker tick");
                }
                _ = target_tick.tick() => {
                    let report = self.target_observer.tick();
                    if report.promoted > 0 {
                        tracing::info!(promoted = report.promoted, "promoted next targets to current");
                    }
                }
                _ = sweep_tick.tick() => {
                    self.failed_load_sweeper.tick();
                }
                _ = signal::ctrl_c() => {
                    tracing::info!("received ctrl-c, supervisor shutting down");
                    break;
                }
            }
        }
    }
}
