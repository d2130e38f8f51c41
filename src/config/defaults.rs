//! Default values for configuration options, in one central location.

use std::time::Duration;

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Bookmark store defaults
pub const DEFAULT_FALLBACK_CONTAINER: &str = "Videos";
pub const DEFAULT_TAGS_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_CONTAINER_LIST_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_PLAYLIST_MAPPING_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// Tagging defaults
pub const DEFAULT_BLOCKED_TAGS: &str = "";
pub const DEFAULT_MAX_TAGS: u32 = 5;
pub const DEFAULT_CONFIDENCE_FLOOR: f64 = 0.5;
pub const DEFAULT_SAMPLE_VIDEO_COUNT: usize = 10;

// Breaker defaults (identical across dependencies)
pub const DEFAULT_BREAKER_THRESHOLD_PERCENT: u8 = 50;
pub const DEFAULT_BREAKER_WINDOW_SIZE: usize = 10;
pub const DEFAULT_BREAKER_OPEN_DWELL: Duration = Duration::from_secs(30);
pub const DEFAULT_BREAKER_HALF_OPEN_PROBES: u32 = 3;

// Retry defaults (per-dependency attempt counts differ; base wait/multiplier shared)
pub const DEFAULT_RETRY_BASE_WAIT: Duration = Duration::from_secs(1);
pub const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;
pub const DEFAULT_RETRY_ATTEMPTS_VIDEO_SOURCE: u32 = 3;
pub const DEFAULT_RETRY_ATTEMPTS_BOOKMARK_STORE: u32 = 3;
pub const DEFAULT_RETRY_ATTEMPTS_LLM: u32 = 2;

// Orchestrator defaults
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_RUN_DEADLINE: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_PROGRESS_CHANNEL_CAPACITY: usize = 64;

// Scheduler defaults
pub const DEFAULT_SCHEDULER_ENABLED: bool = false;
pub const DEFAULT_SCHEDULER_FIXED_DELAY: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_SCHEDULER_INITIAL_DELAY: Duration = Duration::from_secs(30);

// Unsorted sweeper defaults
pub const DEFAULT_UNSORTED_PROCESSOR_ENABLED: bool = false;
pub const DEFAULT_UNSORTED_PROCESSOR_FIXED_DELAY: Duration = Duration::from_secs(6 * 60 * 60);
pub const DEFAULT_UNSORTED_PROCESSOR_INITIAL_DELAY: Duration = Duration::from_secs(60);
