//! Engine configuration
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. An explicit path, `CADENCE_CONFIG`, or the data-dir override
//!    (~/.local/share/cadence/config/engine.toml), first one that exists
//! 2. Embedded defaults (compiled into binary)
//!
//! Values missing from an override keep their embedded default.
//! `CADENCE_STORAGE_URL` and `CADENCE_STORAGE_DIR` override `[storage]`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::detect::{check_lookback, DEFAULT_LOOKBACK_DAYS};
use crate::error::{Error, Result};
use crate::tasks::RetryPolicy;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

pub const CONFIG_PATH_ENV: &str = "CADENCE_CONFIG";
pub const STORAGE_URL_ENV: &str = "CADENCE_STORAGE_URL";
pub const STORAGE_DIR_ENV: &str = "CADENCE_STORAGE_DIR";

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionConfig {
    pub default_lookback_days: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    /// Attachments fetched concurrently per batch
    pub attachment_batch_size: usize,
    pub fetch_timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            attachment_batch_size: 20,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageConfig {
    pub base_url: Option<String>,
    pub root_dir: Option<PathBuf>,
}

/// Queue and duration limits for one task type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskLimits {
    pub queue_concurrency: usize,
    pub max_duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TasksConfig {
    pub detect_recurring: TaskLimits,
    pub export_transactions: TaskLimits,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub export: ExportConfig,
    pub storage: StorageConfig,
    pub retry: RetryPolicy,
    pub tasks: TasksConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig {
                default_lookback_days: DEFAULT_LOOKBACK_DAYS,
            },
            export: ExportConfig::default(),
            storage: StorageConfig::default(),
            retry: RetryPolicy::default(),
            tasks: TasksConfig {
                detect_recurring: TaskLimits {
                    queue_concurrency: 10,
                    max_duration: Duration::from_secs(300),
                },
                export_transactions: TaskLimits {
                    queue_concurrency: 5,
                    max_duration: Duration::from_secs(300),
                },
            },
        }
    }
}

impl EngineConfig {
    /// Resolve and load config, then apply environment overrides
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        let path = explicit
            .map(Path::to_path_buf)
            .or(env_path)
            .or_else(default_config_path);

        let mut config = match path {
            Some(ref p) if p.exists() => {
                let content = fs::read_to_string(p).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", p.display(), e))
                })?;
                Self::from_toml(&content)?
            }
            Some(ref p) if explicit.is_some() => {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            _ => Self::embedded()?,
        };

        if let Ok(url) = std::env::var(STORAGE_URL_ENV) {
            config.storage.base_url = Some(url);
        }
        if let Ok(dir) = std::env::var(STORAGE_DIR_ENV) {
            config.storage.root_dir = Some(PathBuf::from(dir));
        }

        config.validate()?;
        Ok(config)
    }

    /// The defaults compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Parse TOML on top of the built-in defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Self::default();

        if let Some(detection) = raw.detection {
            if let Some(days) = detection.default_lookback_days {
                config.detection.default_lookback_days = days;
            }
        }

        if let Some(export) = raw.export {
            if let Some(size) = export.attachment_batch_size {
                config.export.attachment_batch_size = size;
            }
            if let Some(secs) = export.fetch_timeout_secs {
                config.export.fetch_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(storage) = raw.storage {
            config.storage.base_url = storage.base_url.or(config.storage.base_url);
            config.storage.root_dir = storage.root_dir.or(config.storage.root_dir);
        }

        if let Some(retry) = raw.retry {
            let policy = &mut config.retry;
            if let Some(n) = retry.max_attempts {
                policy.max_attempts = n;
            }
            if let Some(ms) = retry.min_delay_ms {
                policy.min_delay = Duration::from_millis(ms);
            }
            if let Some(ms) = retry.max_delay_ms {
                policy.max_delay = Duration::from_millis(ms);
            }
            if let Some(factor) = retry.factor {
                policy.factor = factor;
            }
            if let Some(jitter) = retry.jitter {
                policy.jitter = jitter;
            }
            if let Some(secs) = retry.transient_delay_secs {
                policy.transient_delay = Duration::from_secs(secs);
            }
        }

        if let Some(tasks) = raw.tasks {
            apply_limits(&mut config.tasks.detect_recurring, tasks.detect_recurring);
            apply_limits(
                &mut config.tasks.export_transactions,
                tasks.export_transactions,
            );
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_lookback(self.detection.default_lookback_days)
            .map_err(|e| Error::Config(format!("[detection] {}", e)))?;
        if self.export.attachment_batch_size == 0 {
            return Err(Error::Config(
                "[export] attachment_batch_size must be at least 1".into(),
            ));
        }
        if self.export.fetch_timeout.is_zero() {
            return Err(Error::Config(
                "[export] fetch_timeout_secs must be at least 1".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "[retry] max_attempts must be at least 1".into(),
            ));
        }
        if self.retry.factor < 1.0 {
            return Err(Error::Config("[retry] factor must be >= 1.0".into()));
        }
        for (name, limits) in [
            ("detect_recurring", &self.tasks.detect_recurring),
            ("export_transactions", &self.tasks.export_transactions),
        ] {
            if limits.queue_concurrency == 0 {
                return Err(Error::Config(format!(
                    "[tasks.{}] queue_concurrency must be at least 1",
                    name
                )));
            }
            if limits.max_duration.is_zero() {
                return Err(Error::Config(format!(
                    "[tasks.{}] max_duration_secs must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn apply_limits(limits: &mut TaskLimits, raw: Option<RawTaskLimits>) {
    if let Some(raw) = raw {
        if let Some(n) = raw.queue_concurrency {
            limits.queue_concurrency = n;
        }
        if let Some(secs) = raw.max_duration_secs {
            limits.max_duration = Duration::from_secs(secs);
        }
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("cadence").join("config").join("engine.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    detection: Option<RawDetection>,
    export: Option<RawExport>,
    storage: Option<RawStorage>,
    retry: Option<RawRetry>,
    tasks: Option<RawTasks>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    default_lookback_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawExport {
    attachment_batch_size: Option<usize>,
    fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    base_url: Option<String>,
    root_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct RawRetry {
    max_attempts: Option<u32>,
    min_delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
    factor: Option<f64>,
    jitter: Option<bool>,
    transient_delay_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawTasks {
    detect_recurring: Option<RawTaskLimits>,
    export_transactions: Option<RawTaskLimits>,
}

#[derive(Debug, Deserialize)]
struct RawTaskLimits {
    queue_concurrency: Option<usize>,
    max_duration_secs: Option<u64>,
}
