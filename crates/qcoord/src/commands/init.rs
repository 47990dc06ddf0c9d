//! Initialize command - writes a new `qcoord.toml` project config.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use qcoord_config::{Paths, QCoordConfig};

pub fn run(path: &str) -> Result<()> {
    let project_dir = Path::new(path);

    if Paths::is_initialized(project_dir) {
        anyhow::bail!("project already initialized in {}: qcoord.toml already exists", project_dir.display());
    }

    fs::create_dir_all(project_dir).context("failed to create project directory")?;

    let config = QCoordConfig::default();
    let config_path = Paths::project_config_file(project_dir);
    let config_content = toml::to_string_pretty(&config).context("failed to serialize default configuration")?;
    fs::write(&config_path, config_content).context("failed to write qcoord.toml")?;

    let gitignore_path = project_dir.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(&gitignore_path, ".qcoord/\nqcoord.local.toml\n").context("failed to write .gitignore")?;
    }

    println!("Initialized query coordinator project in {}", project_dir.display());
    println!("  Config: {}", config_path.display());
    println!();
    println!("Next: qcoord start --project {path}");

    Ok(())
}
