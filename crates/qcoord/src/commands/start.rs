//! Start command - runs the coordinator process.

use anyhow::{Context, Result};
use qcoord_config::QCoordConfig;

pub async fn run(project: &str) -> Result<()> {
    let mut config = QCoordConfig::load_from_dir(project).context("failed to load configuration")?;
    config.resolve_paths(project);

    tracing::info!(
        meta_root = %config.meta.root.display(),
        bind_address = %config.server.bind_address,
        "starting query coordinator"
    );

    #[cfg(feature = "dev-fakes")]
    {
        let coordinator = crate::dev::bootstrap(&config).context("failed to build coordinator")?;
        coordinator.run().await?;
        Ok(())
    }

    #[cfg(not(feature = "dev-fakes"))]
    {
        let _ = config;
        anyhow::bail!(
            "qcoord was built without the `dev-fakes` feature: the storage broker and worker \
             fleet are external collaborators (spec §1, §6) this crate carries no production \
             RPC client for. Rebuild with --features dev-fakes to run against in-memory fakes, \
             or embed qcoord-service::Coordinator in a binary that supplies real Broker/\
             WorkerClient implementations."
        )
    }
}
