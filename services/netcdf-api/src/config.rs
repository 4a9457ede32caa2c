//! Service configuration loaded from YAML.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use netcdf_parser::{default_temp_dir, ReadOptions};
use serde::{Deserialize, Serialize};

/// Runtime configuration for the conversion service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Largest accepted request body, in megabytes.
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,

    /// Directory for upload temp files; `None` picks [`default_temp_dir`].
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,

    /// Apply CF `scale_factor`/`add_offset` unpacking.
    #[serde(default = "default_unpack_cf")]
    pub unpack_cf: bool,
}

fn default_max_upload_mb() -> usize {
    512
}

fn default_unpack_cf() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_upload_mb: default_max_upload_mb(),
            temp_dir: None,
            unpack_cf: default_unpack_cf(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from a YAML file.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "Config file {} does not exist, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read: {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse: {:?}", path))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to null, not to an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(default_temp_dir)
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            unpack: self.unpack_cf,
        }
    }
}
