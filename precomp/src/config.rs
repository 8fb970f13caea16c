use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Rebuild settings, loaded from TOML. Every field has a default, so an
/// empty document is a valid config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RebuildConfig {
    /// Size-reduce marker payloads and the bootstrap payload.
    pub minify: bool,
    /// Stage comments ending with this text survive the rebuild.
    pub config_comment_suffix: String,
    pub layout: LayoutConfig,
}

/// Grid used to re-position preserved hats and definitions.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    pub x_offset: f64,
    pub y_offset: f64,
    /// Rows per column before the cursor wraps.
    pub rows: usize,
}

impl Default for RebuildConfig {
    fn default() -> Self {
        RebuildConfig {
            minify: true,
            config_comment_suffix: "// _twconfig_".to_string(),
            layout: LayoutConfig::default(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            x_offset: 250.0,
            y_offset: 150.0,
            rows: 6,
        }
    }
}

impl RebuildConfig {
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&source)
    }
}
