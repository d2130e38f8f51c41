use crate::models::Dependency;
use thiserror::Error;

/// Error surfaced by a single C1/C2/LLM client call, before the resilience
/// envelope has had a chance to retry or trip a breaker.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("{message}")]
    Other { message: String },
}

impl ClientError {
    /// Whether a fresh attempt is worth making. Mirrors the database-retry
    /// pattern of pattern-matching known-transient variants.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(e) => e.is_timeout() || e.is_connect() || e.status().is_none(),
            ClientError::Timeout => true,
            ClientError::RateLimited { .. } => true,
            ClientError::NotFound { .. } => false,
            ClientError::InvalidResponse { .. } => false,
            ClientError::Other { .. } => false,
        }
    }
}

/// Top-level error returned by the orchestrator, selector, and transport
/// boundary. Categories match the error-routing table: `Validation` -> 400,
/// `NotFound` -> 404, `ExternalServiceUnavailable` -> 503, `Internal` -> 500.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("{service} is unavailable, retry after {retry_after_seconds}s")]
    ExternalServiceUnavailable {
        service: Dependency,
        retry_after_seconds: u64,
    },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn external_service_unavailable(service: Dependency, retry_after_seconds: u64) -> Self {
        Self::ExternalServiceUnavailable {
            service,
            retry_after_seconds,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
