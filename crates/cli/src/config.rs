//! CLI configuration utilities

use anyhow::{Context, Result};
use campus_frontend_common::CampusConfig;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "campus.toml";
const SESSION_FILE: &str = "session.json";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "campus", "campus")
}

/// Default location of the configuration file
pub fn default_config_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from(CONFIG_FILE),
        |dirs| dirs.config_dir().join(CONFIG_FILE),
    )
}

/// Load configuration from an explicit file, the default file if it exists, or defaults
pub fn load(path: Option<&Path>) -> Result<CampusConfig> {
    let path = match path {
        Some(path) => Some(path.to_path_buf()),
        None => Some(default_config_path()).filter(|p| p.exists()),
    };

    let path_str = path.as_deref().and_then(Path::to_str);
    CampusConfig::load(path_str).with_context(|| match &path {
        Some(p) => format!("Failed to load configuration from {}", p.display()),
        None => "Failed to load configuration".to_string(),
    })
}

/// Pick the state directory: flag or environment, then configuration, then the platform data dir
pub fn resolve_state_dir(flag: Option<PathBuf>, config: &CampusConfig) -> PathBuf {
    flag.or_else(|| config.state_dir.clone()).unwrap_or_else(|| {
        project_dirs().map_or_else(
            || PathBuf::from(".campus"),
            |dirs| dirs.data_dir().to_path_buf(),
        )
    })
}

/// Where the durable session lives inside the state directory
pub fn session_path(state_dir: &Path) -> PathBuf {
    state_dir.join(SESSION_FILE)
}

/// Write a configuration file with every default spelled out
pub fn generate_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(&CampusConfig::default())?;
    std::fs::write(path, content)?;
    Ok(())
}
