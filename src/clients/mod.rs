//! External contracts for the three remote dependencies (§4.6, §6). Only
//! the operations the core consumes are specified; the concrete wire format
//! is out of scope, so each client is a thin REST adapter behind a trait
//! the orchestrator/selector/tag-generator depend on instead of a concrete
//! type — mirroring the segregated-trait-per-capability shape used for
//! source handlers.

pub mod bookmark_store;
pub mod llm;
pub mod video_source;

pub use bookmark_store::{BookmarkStoreClient, HttpBookmarkStoreClient};
pub use llm::{HttpLlmClient, LlmClient};
pub use video_source::{HttpVideoSourceClient, VideoSourceClient};

use std::time::Duration;

/// Builds the shared `reqwest::Client` used by every remote dependency,
/// configured with a conservative per-attempt timeout — exceeding it
/// surfaces as a retryable `ClientError::Timeout`-shaped transport error.
pub fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("reqwest client configuration is valid")
}
