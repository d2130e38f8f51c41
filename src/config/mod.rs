//! Layered configuration: TOML file, overridden by `APP_`-prefixed
//! environment variables, overridden by CLI flags applied by the
//! composition root.

pub mod defaults;
pub mod duration_serde;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use defaults::*;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookmarkStoreConfig {
    pub fallback_container: String,
    #[serde(with = "duration_serde::duration")]
    pub tags_ttl: Duration,
    #[serde(with = "duration_serde::duration")]
    pub container_list_ttl: Duration,
    #[serde(with = "duration_serde::duration")]
    pub playlist_mapping_ttl: Duration,
}

impl Default for BookmarkStoreConfig {
    fn default() -> Self {
        Self {
            fallback_container: DEFAULT_FALLBACK_CONTAINER.to_string(),
            tags_ttl: DEFAULT_TAGS_TTL,
            container_list_ttl: DEFAULT_CONTAINER_LIST_TTL,
            playlist_mapping_ttl: DEFAULT_PLAYLIST_MAPPING_TTL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggingConfig {
    pub blocked_tags: String,
    pub max_tags: u32,
    pub confidence_floor: f64,
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            blocked_tags: DEFAULT_BLOCKED_TAGS.to_string(),
            max_tags: DEFAULT_MAX_TAGS,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerProfileConfig {
    pub threshold_percent: u8,
    pub window_size: usize,
    #[serde(with = "duration_serde::duration")]
    pub open_dwell: Duration,
    pub half_open_probes: u32,
}

impl Default for BreakerProfileConfig {
    fn default() -> Self {
        Self {
            threshold_percent: DEFAULT_BREAKER_THRESHOLD_PERCENT,
            window_size: DEFAULT_BREAKER_WINDOW_SIZE,
            open_dwell: DEFAULT_BREAKER_OPEN_DWELL,
            half_open_probes: DEFAULT_BREAKER_HALF_OPEN_PROBES,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub video_source: BreakerProfileConfig,
    pub bookmark_store: BreakerProfileConfig,
    pub llm: BreakerProfileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryProfileConfig {
    pub max_attempts: u32,
    #[serde(with = "duration_serde::duration")]
    pub base_wait: Duration,
    pub multiplier: f64,
}

impl RetryProfileConfig {
    fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_wait: DEFAULT_RETRY_BASE_WAIT,
            multiplier: DEFAULT_RETRY_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub video_source: RetryProfileConfig,
    pub bookmark_store: RetryProfileConfig,
    pub llm: RetryProfileConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            video_source: RetryProfileConfig::with_attempts(DEFAULT_RETRY_ATTEMPTS_VIDEO_SOURCE),
            bookmark_store: RetryProfileConfig::with_attempts(
                DEFAULT_RETRY_ATTEMPTS_BOOKMARK_STORE,
            ),
            llm: RetryProfileConfig::with_attempts(DEFAULT_RETRY_ATTEMPTS_LLM),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    #[serde(with = "duration_serde::duration")]
    pub fixed_delay: Duration,
    #[serde(with = "duration_serde::duration")]
    pub initial_delay: Duration,
    /// Comma-separated playlist ids; trimmed, blanks skipped at parse time.
    pub playlist_ids: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_SCHEDULER_ENABLED,
            fixed_delay: DEFAULT_SCHEDULER_FIXED_DELAY,
            initial_delay: DEFAULT_SCHEDULER_INITIAL_DELAY,
            playlist_ids: String::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn playlist_id_list(&self) -> Vec<String> {
        self.playlist_ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnsortedProcessorConfig {
    pub enabled: bool,
    #[serde(with = "duration_serde::duration")]
    pub fixed_delay: Duration,
    #[serde(with = "duration_serde::duration")]
    pub initial_delay: Duration,
}

impl Default for UnsortedProcessorConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_UNSORTED_PROCESSOR_ENABLED,
            fixed_delay: DEFAULT_UNSORTED_PROCESSOR_FIXED_DELAY,
            initial_delay: DEFAULT_UNSORTED_PROCESSOR_INITIAL_DELAY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// A run is aborted at its next safe point once this elapses; default
    /// is one hour, matching the interactive-stream default.
    #[serde(with = "duration_serde::duration")]
    pub run_deadline: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            run_deadline: DEFAULT_RUN_DEADLINE,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub web: WebConfig,
    pub bookmark_store: BookmarkStoreConfig,
    pub tagging: TaggingConfig,
    pub breaker: BreakerConfig,
    pub retry: RetryConfig,
    pub scheduler: SchedulerConfig,
    pub unsorted_processor: UnsortedProcessorConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Config {
    /// Loads configuration layering an optional TOML file under
    /// `APP_`-prefixed environment variable overrides (nested keys joined
    /// with `__`, e.g. `APP_BREAKER__LLM__THRESHOLD_PERCENT`).
    pub fn load_from_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Toml::string(&Self::defaults_toml()));

        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(figment.extract()?)
    }

    fn defaults_toml() -> String {
        toml::to_string(&Config::default()).unwrap_or_default()
    }
}
