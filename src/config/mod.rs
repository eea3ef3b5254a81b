pub mod schema;

pub use schema::{KernelConfig, SeedCompany};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Default holdco home directory (~/.holdco).
pub fn default_home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".holdco"))
        .unwrap_or_else(|| PathBuf::from(".holdco"))
}

/// Resolve a path that may contain `~`.
pub fn resolve_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Load and validate config from the given path, or return defaults.
pub fn load_config(path: &Path) -> Result<KernelConfig> {
    let config = if path.exists() {
        let contents =
            std::fs::read_to_string(path).context("Failed to read holdco config file")?;
        toml::from_str::<KernelConfig>(&contents)
            .context("Failed to parse holdco config (TOML)")?
    } else {
        KernelConfig::default()
    };
    config
        .validate()
        .with_context(|| format!("Invalid config at {}", path.display()))?;
    Ok(config)
}

/// Save config to the given path (TOML format).
pub fn save_config(config: &KernelConfig, path: &Path) -> Result<()> {
    let contents = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents).context("Failed to write config file")?;
    Ok(())
}
