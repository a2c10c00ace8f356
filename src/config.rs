//! TOML configuration with compiled-in defaults.
//!
//! Lookup order: the file named by `EVENTSIEVE_CONFIG`, then
//! `/etc/eventsieve/eventsieve.toml`, then defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classify::{autoscaler, ClassifyOptions};
use crate::correlate::{DEFAULT_RELATED_WINDOW_SECS, MAX_RELATED_WINDOW_SECS};
use crate::dedup::DEFAULT_WINDOW_MINUTES;
use crate::error::SieveError;

pub const CONFIG_ENV: &str = "EVENTSIEVE_CONFIG";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/eventsieve/eventsieve.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SieveConfig {
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub dedup: DedupConfig,
    #[serde(default)]
    pub correlate: CorrelateConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SieveConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "EVENTSIEVE_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    pub fn validate(&self) -> Result<(), SieveError> {
        if self.dedup.window_minutes == 0 {
            return Err(SieveError::InvalidConfig {
                field: "dedup.window_minutes",
                reason: "must be at least 1".into(),
            });
        }
        if self.dedup.max_events == 0 {
            return Err(SieveError::InvalidConfig {
                field: "dedup.max_events",
                reason: "must be at least 1".into(),
            });
        }
        let related = self.correlate.related_window_secs;
        if related <= 0 || related > MAX_RELATED_WINDOW_SECS {
            return Err(SieveError::InvalidConfig {
                field: "correlate.related_window_secs",
                reason: format!("must be between 1 and {}", MAX_RELATED_WINDOW_SECS),
            });
        }
        let min_duration = self.classify.autoscaler_min_duration_minutes;
        if min_duration.is_nan() || min_duration < 0.0 {
            return Err(SieveError::InvalidConfig {
                field: "classify.autoscaler_min_duration_minutes",
                reason: "must be a non-negative number".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Classify
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    pub autoscaler_min_duration_minutes: f64,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            autoscaler_min_duration_minutes: autoscaler::MIN_DURATION_MINUTES,
        }
    }
}

impl From<&ClassifyConfig> for ClassifyOptions {
    fn from(cfg: &ClassifyConfig) -> Self {
        ClassifyOptions {
            autoscaler_min_duration_minutes: cfg.autoscaler_min_duration_minutes,
        }
    }
}

// ---------------------------------------------------------------------------
// Dedup and input window
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub window_minutes: u32,
    /// Newest records kept per run. Grouping cost grows with this.
    pub max_events: usize,
    /// Records older than this, relative to the newest record, are dropped. 0 disables.
    pub retention_minutes: u32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_minutes: DEFAULT_WINDOW_MINUTES,
            max_events: 500,
            retention_minutes: 24 * 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Correlate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelateConfig {
    pub related_window_secs: i64,
    /// Bucket by `namespace:resource:tag` instead of `namespace:tag`.
    pub per_resource: bool,
}

impl Default for CorrelateConfig {
    fn default() -> Self {
        Self {
            related_window_secs: DEFAULT_RELATED_WINDOW_SECS,
            per_resource: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
