//! Configuration management commands.

use anyhow::{Context, Result};
use qcoord_config::QCoordConfig;

pub fn show(project: &str, format: &str) -> Result<()> {
    let config = QCoordConfig::load_from_dir(project).context("failed to load configuration")?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        _ => println!("{}", toml::to_string_pretty(&config)?),
    }

    Ok(())
}
