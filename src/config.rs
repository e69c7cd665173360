//! Gallery configuration.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields the stock behaviour:
//!
//! ```toml
//! [grid]
//! min_column_width = 100
//! gap = 2
//! overscan = 500
//!
//! [source]
//! page_size = 100
//!
//! [loader]
//! max_retries = 2
//! retry_delay_ms = 1000
//! max_in_flight = 24
//! max_response_bytes = 16777216
//!
//! [cache]
//! max_entries = 4096
//! max_bytes = 268435456
//!
//! [filters]
//! threshold = { low = 0.0, high = 1.0 }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::ConfidenceThreshold;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub grid: GridConfig,
    pub source: SourceConfig,
    pub loader: LoaderConfig,
    pub cache: CacheConfig,
    pub filters: FilterConfig,
}

/// Grid geometry inputs.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Minimum cell width; the column count is `floor(width / min_column_width)`.
    pub min_column_width: u32,
    /// Padding on each side of an image inside its cell.
    pub gap: u32,
    /// Distance beyond the visible edge within which cells count as visible.
    pub overscan: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            min_column_width: 100,
            gap: 2,
            overscan: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Samples requested per data-source page.
    pub page_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Concurrent network operations; `None` admits every visible item at once.
    pub max_in_flight: Option<usize>,
    /// Upper bound on a single response body.
    pub max_response_bytes: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay_ms: 1000,
            max_in_flight: Some(24),
            max_response_bytes: 16 * 1024 * 1024,
        }
    }
}

impl LoaderConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Initial confidence window.
    pub threshold: ConfidenceThreshold,
}

impl GalleryConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.min_column_width == 0 {
            return Err(ConfigError::Invalid(
                "grid.min_column_width must be positive".into(),
            ));
        }
        if self.source.page_size == 0 {
            return Err(ConfigError::Invalid("source.page_size must be positive".into()));
        }
        if self.loader.max_in_flight == Some(0) {
            return Err(ConfigError::Invalid(
                "loader.max_in_flight must be positive when set".into(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid("cache.max_entries must be positive".into()));
        }
        Ok(())
    }
}
