//! Dev-mode wiring: builds a [`Coordinator`] against in-memory `Broker`/
//! `WorkerClient` fakes instead of a real storage broker or worker fleet.
//!
//! Mirrors the teacher's `kimberlite-dev` orchestrator in spirit — a
//! single-process way to bring the whole stack up locally — but here the
//! fakes are the coordinator's own test doubles rather than a second,
//! embedded server: the RPC transport and the workers themselves are
//! external collaborators per spec §1, and this crate carries no
//! production implementation of either.

use std::sync::Arc;

use qcoord_service::broker::fakes::FakeBroker;
use qcoord_service::{Coordinator, CoordinatorError};
use qcoord_task::FakeWorkerClient;

use crate::QCoordConfig;

/// Builds a [`Coordinator`] wired to in-memory fakes for both external
/// collaborator traits. Never use outside local development or tests —
/// loaded collections and reported distribution never reach a real
/// worker.
pub fn bootstrap(config: &QCoordConfig) -> Result<Coordinator, CoordinatorError> {
    let broker = Arc::new(FakeBroker::new());
    let worker = Arc::new(FakeWorkerClient::new());
    Coordinator::new(config, broker, worker)
}
