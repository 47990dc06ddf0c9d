//! Configuration loader with multi-source merging.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::{Paths, QCoordConfig};

/// Layers, lowest to highest precedence: built-in defaults, user config
/// dir, project `qcoord.toml`, local `qcoord.local.toml`, `QCO_*` env vars.
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "QCO".to_string(),
        }
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn load(self) -> Result<QCoordConfig> {
        let mut builder = config::Config::builder();

        let defaults = QCoordConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        let paths = Paths::new();
        if let Ok(user_config_file) = paths.user_config_file() {
            if user_config_file.exists() {
                builder = builder.add_source(
                    config::File::from(user_config_file).required(false).format(config::FileFormat::Toml),
                );
            }
        }

        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file).required(false).format(config::FileFormat::Toml),
            );
        }

        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file).required(false).format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix).separator("_").try_parsing(true),
        );

        let config = builder.build().context("failed to build configuration")?;

        let mut qcoord_config: QCoordConfig = config.try_deserialize().context("failed to deserialize configuration")?;
        qcoord_config.resolve_paths(&self.project_dir);

        Ok(qcoord_config)
    }

    pub fn load_or_default(self) -> QCoordConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_defaults_with_no_files_present() {
        let temp_dir = tempdir().unwrap();
        let config = ConfigLoader::new().with_project_dir(temp_dir.path()).load().unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1:19530");
        assert_eq!(config.task.max_attempts, 5);
    }

    #[test]
    fn project_config_overrides_defaults() {
        let temp_dir = tempdir().unwrap();
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("qcoord.toml"),
            r#"
[server]
bind_address = "0.0.0.0:19530"

[task]
max_attempts = 9
"#,
        )
        .unwrap();

        let config = ConfigLoader::new().with_project_dir(project_dir).load().unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:19530");
        assert_eq!(config.task.max_attempts, 9);
    }

    #[test]
    fn local_config_overrides_project_config() {
        let temp_dir = tempdir().unwrap();
        let project_dir = temp_dir.path();

        fs::write(project_dir.join("qcoord.toml"), "[server]\nbind_address = \"127.0.0.1:19530\"\n").unwrap();
        fs::write(project_dir.join("qcoord.local.toml"), "[server]\nbind_address = \"localhost:9999\"\n").unwrap();

        let config = ConfigLoader::new().with_project_dir(project_dir).load().unwrap();
        assert_eq!(config.server.bind_address, "localhost:9999");
    }

    #[test]
    fn relative_meta_root_resolves_against_project_dir() {
        let temp_dir = tempdir().unwrap();
        let project_dir = temp_dir.path();

        let config = ConfigLoader::new().with_project_dir(project_dir).load().unwrap();
        assert!(config.meta.root.is_absolute());
    }
}
