//! # qcoord
//!
//! The query coordinator facade: wires every manager crate into one
//! [`Coordinator`] process. This crate is intentionally thin — all the
//! control-plane logic lives in `qcoord-catalog`, `qcoord-distribution`,
//! `qcoord-target`, `qcoord-resource`, `qcoord-job`, `qcoord-task`,
//! `qcoord-checkers`, and `qcoord-service`. `qcoord` only:
//!
//! - re-exports [`Coordinator`] as the single entrypoint a binary needs,
//! - owns the CLI (`src/main.rs`) that loads [`QCoordConfig`] and starts
//!   the process,
//! - carries the `dev-fakes` feature that swaps the external `Broker`/
//!   `WorkerClient` collaborators (spec §1, §6 — out of core scope) for
//!   in-memory stand-ins, so the coordinator can be run and exercised
//!   without a real storage broker or worker fleet.

pub use qcoord_config::QCoordConfig;
pub use qcoord_service::{Coordinator, CoordinatorError, CoordinatorService};

#[cfg(feature = "dev-fakes")]
pub mod dev;
