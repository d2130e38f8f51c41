//! Error taxonomy for the tagging pipeline.
//!
//! `ClientError` is what the C1/C2/LLM client traits return; `PipelineError`
//! is the orchestrator/selector/transport-facing error. There is no blanket
//! `From<ClientError>` conversion: `resilience::guard` maps a failed call by
//! hand into `PipelineError::ExternalServiceUnavailable`, since the mapping
//! needs context (which dependency, the breaker's or `RateLimited`'s
//! retry-after) that a plain `#[from]` can't carry.

mod types;

pub use types::{ClientError, PipelineError};

pub type ClientResult<T> = Result<T, ClientError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
