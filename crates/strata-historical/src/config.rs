//! Historical cache configuration

use crate::error::{HistoricalError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default bound on concurrently tracked indices
pub const MAX_ACTIVE_REQUESTS: usize = 10;

/// Environment variable overriding [`HistoricalCacheConfig::max_active_requests`]
pub const MAX_ACTIVE_REQUESTS_ENV: &str = "STRATA_HISTORICAL_MAX_ACTIVE_REQUESTS";

/// Configuration of the historical state cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalCacheConfig {
    /// Maximum number of indices tracked at once; least recently queried
    /// indices are evicted beyond this
    pub max_active_requests: usize,
}

impl Default for HistoricalCacheConfig {
    fn default() -> Self {
        Self {
            max_active_requests: MAX_ACTIVE_REQUESTS,
        }
    }
}

impl HistoricalCacheConfig {
    /// Configuration with a custom tracking bound
    pub fn with_max_active_requests(max_active_requests: usize) -> Self {
        Self {
            max_active_requests,
        }
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| HistoricalError::Config(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HistoricalError::Config(format!("Failed to read config file: {e}")))?;

        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| HistoricalError::Config(format!("Invalid TOML: {e}")))?,
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| HistoricalError::Config(format!("Invalid JSON: {e}")))?,
            _ => return Err(HistoricalError::Config("Unsupported file format".into())),
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply overrides from an explicit set of variables
    pub fn merge_with_vars<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if key == MAX_ACTIVE_REQUESTS_ENV {
                self.max_active_requests = value.parse().map_err(|_| {
                    HistoricalError::Config(format!("Invalid number in {MAX_ACTIVE_REQUESTS_ENV}"))
                })?;
            }
        }
        self.validate()
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.max_active_requests == 0 {
            return Err(HistoricalError::Config(
                "max_active_requests must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
