#![cfg(feature = "dev-fakes")]

use qcoord::QCoordConfig;

#[test]
fn bootstrap_wires_a_coordinator_against_in_memory_fakes() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = QCoordConfig::default();
    config.meta.root = dir.path().join("meta");

    let coordinator = qcoord::dev::bootstrap(&config).expect("coordinator should build against in-memory fakes");

    // `Coordinator::new` opens the store and wires every manager but does
    // not yet load durable state or flip healthy — that happens in `run`.
    assert!(!coordinator.service.check_health());
}
