//! Core domain types shared across the tagging pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A video as seen at the upstream video source. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRef {
    pub video_id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
}

/// A tag vocabulary entry in the bookmark store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

/// A single AI-proposed tag with its confidence and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredTag {
    pub name: String,
    pub confidence: f64,
    #[serde(default)]
    pub preexisting: bool,
}

/// Special container id denoting the bookmark store's "unsorted" pseudo-container.
pub const UNSORTED_CONTAINER_ID: i64 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub container: i64,
    #[serde(default)]
    pub tags: HashSet<String>,
}

/// Per-request shaping of tag generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TagStrategy {
    pub max_tags: u32,
    pub confidence_floor: f64,
    pub custom_instructions: Option<String>,
}

impl Default for TagStrategy {
    fn default() -> Self {
        Self {
            max_tags: 5,
            confidence_floor: 0.5,
            custom_instructions: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistFilters {
    #[serde(default)]
    pub published_after: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub max_duration_seconds: Option<u64>,
    #[serde(default)]
    pub max_videos: Option<usize>,
}

/// Controls how many informational `progress` events a run emits. Never
/// suppresses `video_completed`, `video_skipped`, `batch_completed`, `error`,
/// `started`, or `completed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPlaylistRequest {
    pub playlist_input_raw: String,
    #[serde(default)]
    pub filters: Option<PlaylistFilters>,
    #[serde(default)]
    pub strategy: Option<TagStrategy>,
    #[serde(default)]
    pub verbosity: Option<Verbosity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub total: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoOutcome {
    pub video: VideoRef,
    pub tags: Vec<ScoredTag>,
    pub status: VideoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// One event in the progress stream emitted by a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    #[serde(rename = "type")]
    pub kind: ProgressEventKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProgressEventKind {
    Started,
    Progress,
    BatchCompleted,
    VideoCompleted,
    VideoSkipped,
    Error,
    Completed,
}

impl ProgressEvent {
    pub fn new(kind: ProgressEventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// The three remote dependencies the resilience envelope governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Dependency {
    VideoSource,
    BookmarkStore,
    Llm,
}

/// The constant principal identifier this single-tenant deployment uses for
/// every cache key and store call. A multi-tenant extension replaces this
/// with a real per-user identifier.
pub const DEFAULT_PRINCIPAL: &str = "default";
