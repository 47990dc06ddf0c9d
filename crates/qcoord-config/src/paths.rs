//! Path utilities and XDG directory discovery.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::ConfigError;

/// XDG-compliant paths for the coordinator's own config/state, separate
/// from the meta store's persisted records.
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("dev", "qcoord", "qcoord"),
        }
    }

    /// `~/.config/qcoord/`
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::XdgError("failed to determine user config directory".to_string()))
    }

    /// `~/.config/qcoord/config.toml`
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join("config.toml"))
    }

    /// `<project_dir>/qcoord.toml`
    pub fn project_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("qcoord.toml")
    }

    /// `<project_dir>/qcoord.local.toml` — gitignored local override.
    pub fn local_config_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("qcoord.local.toml")
    }

    pub fn is_initialized(project_dir: impl AsRef<Path>) -> bool {
        Self::project_config_file(project_dir).exists()
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn project_paths_are_scoped_under_the_project_dir() {
        let temp_dir = tempdir().unwrap();
        let project_dir = temp_dir.path();

        assert_eq!(Paths::project_config_file(project_dir), project_dir.join("qcoord.toml"));
        assert_eq!(Paths::local_config_file(project_dir), project_dir.join("qcoord.local.toml"));
        assert!(!Paths::is_initialized(project_dir));

        std::fs::write(Paths::project_config_file(project_dir), "[meta]\n").unwrap();
        assert!(Paths::is_initialized(project_dir));
    }
}
