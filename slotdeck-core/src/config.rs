//! Console configuration
//!
//! Resolution order:
//! 1. an explicitly given YAML file
//! 2. `config.yaml` in the platform config dir (`~/.config/slotdeck/` on Linux)
//! 3. the built-in defaults embedded in the binary
//!
//! A config file that omits `humanize` inherits the built-in alias tables.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::alias::{AliasTableSpec, AliasTables};

const BUILTIN_CONFIG: &str = include_str!("default_config.yaml");

/// Name of the config file inside the platform config dir
pub const CONFIG_FILE_NAME: &str = "config.yaml";

fn default_name() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

/// Flags passed to the image listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageListing {
    #[serde(default = "default_true")]
    pub include_uninstalled: bool,

    #[serde(default)]
    pub include_operating: bool,
}

impl Default for ImageListing {
    fn default() -> Self {
        Self {
            include_uninstalled: true,
            include_operating: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Domain whose allow-list the console manages
    #[serde(default = "default_name")]
    pub domain: String,

    /// Group install sessions are created in
    #[serde(default = "default_name")]
    pub group: String,

    #[serde(default)]
    pub images: ImageListing,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humanize: Option<AliasTableSpec>,
}

impl ConsoleConfig {
    /// Built-in configuration
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_CONFIG).context("Built-in configuration is invalid")
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml_ng::from_str(content).context("Failed to parse console configuration")
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        Self::from_yaml_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        let content = serde_yaml_ng::to_string(self).context("Failed to serialize config")?;
        std::fs::write(path, content).with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Platform config file location, if the platform has one
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "slotdeck").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Resolve the configuration in the documented order
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading config from {}", path.display());
            return Self::load_from_path(path);
        }
        if let Some(path) = Self::default_path().filter(|p| p.exists()) {
            info!("Loading config from {}", path.display());
            return Self::load_from_path(&path);
        }
        debug!("No config file found, using built-in defaults");
        Self::builtin()
    }

    /// Compiled alias tables, falling back to the built-in ones
    pub fn alias_tables(&self) -> Result<AliasTables> {
        match &self.humanize {
            Some(spec) => AliasTables::compile(spec),
            None => {
                let builtin = Self::builtin()?;
                let spec = builtin.humanize.unwrap_or_default();
                AliasTables::compile(&spec)
            }
        }
    }
}
