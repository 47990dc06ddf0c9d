//! Layered configuration for the query coordinator.
//!
//! Loading precedence, lowest to highest:
//! 1. Built-in defaults
//! 2. `~/.config/qcoord/config.toml` (user defaults)
//! 3. `qcoord.toml` (git-tracked, project config)
//! 4. `qcoord.local.toml` (gitignored, local overrides)
//! 5. `QCO_*` environment variables (highest precedence)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Top-level coordinator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QCoordConfig {
    pub meta: MetaConfig,
    pub scheduler: SchedulerConfig,
    pub task: TaskConfig,
    pub resource_groups: ResourceGroupsConfig,
    pub server: ServerConfig,
}

/// Tunables for `qcoord-meta`'s embedded file-backed store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaConfig {
    /// Directory the embedded file meta store persists its snapshot under.
    pub root: PathBuf,
    /// Key-layout root prefix (see `qcoord_meta::KeyLayout`).
    pub key_root: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".qcoord/meta"),
            key_root: "qcoord".to_string(),
        }
    }
}

/// Dispatch-tick cadence for the task scheduler and each checker, and the
/// checkers' own threshold tunables (spec §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub dispatch_interval_secs: u64,
    pub balance_interval_secs: u64,
    pub channel_interval_secs: u64,
    pub segment_interval_secs: u64,
    pub leader_interval_secs: u64,
    pub target_interval_secs: u64,
    pub failed_load_sweep_interval_secs: u64,
    pub failed_load_ttl_secs: u64,
    pub balance_threshold_rows: u64,
    pub leader_stale_after_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dispatch_interval_secs: 1,
            balance_interval_secs: 30,
            channel_interval_secs: 5,
            segment_interval_secs: 5,
            leader_interval_secs: 5,
            target_interval_secs: 2,
            failed_load_sweep_interval_secs: 60,
            failed_load_ttl_secs: 600,
            balance_threshold_rows: 1000,
            leader_stale_after_secs: 30,
        }
    }
}

/// Retry/timeout tunables for the task scheduler's executor (spec §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub action_timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            action_timeout_secs: 120,
            max_attempts: 5,
        }
    }
}

/// Startup-time resource-group provisioning (spec §4.5). The default group
/// always exists regardless of this list; entries here are additional
/// named groups created once at boot if absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceGroupsConfig {
    pub default_capacity: u32,
    pub groups: Vec<ResourceGroupDef>,
}

impl Default for ResourceGroupsConfig {
    fn default() -> Self {
        Self {
            default_capacity: 10_000,
            groups: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceGroupDef {
    pub name: String,
    pub capacity: u32,
}

/// RPC listener tunables. The listener itself is an external collaborator
/// surface (spec §6 Non-goals); these addresses are carried so the facade
/// binary has somewhere to read them from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub metrics_bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:19530".to_string(),
            metrics_bind_address: "127.0.0.1:9091".to_string(),
        }
    }
}

impl QCoordConfig {
    pub fn load() -> anyhow::Result<Self> {
        ConfigLoader::new().load()
    }

    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolves `meta.root` to an absolute path under `base_dir` if it was
    /// given relative.
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();
        if self.meta.root.is_relative() {
            self.meta.root = base.join(&self.meta.root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_tunables() {
        let config = QCoordConfig::default();
        assert_eq!(config.server.bind_address, "127.0.0.1:19530");
        assert_eq!(config.task.action_timeout_secs, 120);
        assert_eq!(config.task.max_attempts, 5);
        assert_eq!(config.scheduler.balance_threshold_rows, 1000);
        assert!(config.resource_groups.groups.is_empty());
    }

    #[test]
    fn resolve_paths_anchors_relative_meta_root() {
        let mut config = QCoordConfig::default();
        config.resolve_paths("/var/lib/qcoord");
        assert_eq!(config.meta.root, PathBuf::from("/var/lib/qcoord/.qcoord/meta"));
    }
}
