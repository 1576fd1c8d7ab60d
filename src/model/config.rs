use anyhow::{Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub tools: ToolsConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub log_filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsConfig {
    pub git: String,
    pub python: String,
    /// Relative to the directory holding a `requirements.txt`.
    pub bundled_python: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    pub default_path: String,
    pub tick_ms: u64,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let mut config = Self::defaults()?;

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "comfy-nodes") {
            let config_path = proj_dirs.config_dir().join("config.toml");
            if config_path.exists() {
                let user_str = fs::read_to_string(&config_path)?;
                config = toml::from_str(&user_str)?;
            }
        }

        if config.ui.default_path.starts_with('~') {
            let home = dirs_home().ok_or_else(|| anyhow!("cannot determine home directory"))?;
            config.ui.default_path =
                config
                    .ui
                    .default_path
                    .replacen('~', &home.to_string_lossy(), 1);
        }

        Ok(config)
    }

    /// The embedded defaults, without any user layer.
    pub fn defaults() -> Result<Self> {
        let defaults = include_str!("../../config/default.toml");
        Ok(toml::from_str(defaults)?)
    }
}

fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
