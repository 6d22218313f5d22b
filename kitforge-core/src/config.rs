//! Kitforge configuration (`.kitforge/config.yaml`)
//!
//! Every field has a default, so a missing file or a partial file is fine:
//!
//! ```yaml
//! registry:
//!   root: components/generated
//!   source_extension: tsx
//! rate_limits:
//!   mutation: { requests_per_window: 20, window_ms: 60000 }
//! ```
//!
//! Relative paths are resolved against the project root passed to
//! [`KitforgeConfig::registry_layout`] and [`KitforgeConfig::catalog_path`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::catalog::DEFAULT_CATALOG_FILE;
use crate::error::{KitforgeError, Result};
use crate::rate_limit::RateLimitConfig;
use crate::registry::{RegistryLayout, DEFAULT_REGISTRY_DIR};

/// Default config file location, relative to the project root
pub const CONFIG_FILE: &str = ".kitforge/config.yaml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KitforgeConfig {
    pub registry: RegistrySettings,
    pub catalog: CatalogSettings,
    pub rate_limits: RateLimitSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub root: PathBuf,
    pub source_extension: String,
    pub index_file: String,
    pub manifest_file: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        let layout = RegistryLayout::default();
        Self {
            root: PathBuf::from(DEFAULT_REGISTRY_DIR),
            source_extension: layout.source_extension,
            index_file: layout.index_file,
            manifest_file: layout.manifest_file,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub path: PathBuf,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CATALOG_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub mutation: RateLimitConfig,
    pub generation: RateLimitConfig,
    pub sweep_interval_ms: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            mutation: RateLimitConfig::mutation(),
            generation: RateLimitConfig::generation(),
            sweep_interval_ms: 60_000,
        }
    }
}

impl RateLimitSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

impl KitforgeConfig {
    /// Load `.kitforge/config.yaml` under `project_root`, or defaults
    pub fn load_or_default(project_root: &Path) -> Result<Self> {
        Self::load_from_path(&project_root.join(CONFIG_FILE))
    }

    /// Load from a specific file; a missing file yields defaults
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| KitforgeError::io(path, e))?;
        let config = Self::from_yaml(&content).map_err(|e| match e {
            KitforgeError::Parse { reason, .. } => KitforgeError::parse(path, reason),
            other => other,
        })?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate YAML
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(content)
            .map_err(|e| KitforgeError::parse(CONFIG_FILE, e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let extension = self.registry.source_extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(KitforgeError::Validation(
                "registry.source_extension cannot be empty".to_string(),
            ));
        }
        if self.registry.index_file.is_empty() || self.registry.manifest_file.is_empty() {
            return Err(KitforgeError::Validation(
                "registry.index_file and registry.manifest_file are required".to_string(),
            ));
        }
        self.rate_limits.mutation.validate()?;
        self.rate_limits.generation.validate()?;
        if self.rate_limits.sweep_interval_ms == 0 {
            return Err(KitforgeError::Validation(
                "rate_limits.sweep_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Registry layout with `root` resolved against `project_root`
    pub fn registry_layout(&self, project_root: &Path) -> RegistryLayout {
        RegistryLayout {
            root: project_root.join(&self.registry.root),
            source_extension: self
                .registry
                .source_extension
                .trim_start_matches('.')
                .to_string(),
            index_file: self.registry.index_file.clone(),
            manifest_file: self.registry.manifest_file.clone(),
        }
    }

    pub fn catalog_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.catalog.path)
    }
}
