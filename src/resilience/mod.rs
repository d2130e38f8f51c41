//! The cross-component resilience envelope (C3): every outgoing call to the
//! three remote dependencies is wrapped in bounded retry, a per-dependency
//! circuit breaker, and a fallback that converts remote failure into
//! `PipelineError::ExternalServiceUnavailable`.
//!
//! Composition order: the breaker checks permission once per logical call,
//! the retry loop runs entirely inside that single permission window, and
//! the breaker observes exactly one outcome for the whole retried call —
//! matching the tie-break rule that a call which exhausts retries and trips
//! the breaker is reported as one failure, not N.

pub mod circuit_breaker;
pub mod retry;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::config::{BreakerConfig, RetryConfig, RetryProfileConfig};
use crate::errors::{ClientError, PipelineError};
use crate::models::Dependency;
use circuit_breaker::{BreakerRejection, CircuitBreaker};

/// Process-global, one breaker per dependency, shared by every run and
/// owned by the composition root.
pub struct ResilienceEnvelope {
    breakers: HashMap<Dependency, Arc<CircuitBreaker>>,
    retry_configs: HashMap<Dependency, RetryProfileConfig>,
}

impl ResilienceEnvelope {
    pub fn new(breaker_config: &BreakerConfig, retry_config: &RetryConfig) -> Self {
        let mut breakers = HashMap::new();
        let mut retry_configs = HashMap::new();

        for dep in Dependency::iter() {
            let (breaker_profile, retry_profile) = match dep {
                Dependency::VideoSource => (
                    breaker_config.video_source.clone(),
                    retry_config.video_source.clone(),
                ),
                Dependency::BookmarkStore => (
                    breaker_config.bookmark_store.clone(),
                    retry_config.bookmark_store.clone(),
                ),
                Dependency::Llm => (breaker_config.llm.clone(), retry_config.llm.clone()),
            };
            breakers.insert(dep, Arc::new(CircuitBreaker::new(breaker_profile)));
            retry_configs.insert(dep, retry_profile);
        }

        Self {
            breakers,
            retry_configs,
        }
    }

    pub fn breaker(&self, dep: Dependency) -> &CircuitBreaker {
        self.breakers.get(&dep).expect("every dependency has a breaker")
    }

    /// Runs `operation` under the full envelope for `dep`, returning a
    /// domain-level `ExternalServiceUnavailable` on breaker-open or
    /// retry-exhaustion.
    pub async fn guard<T, F, Fut>(
        &self,
        dep: Dependency,
        operation_name: &str,
        operation: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let breaker = self.breaker(dep);
        let retry_config = self
            .retry_configs
            .get(&dep)
            .expect("every dependency has a retry config");

        if let Err(BreakerRejection::Open { retry_after_seconds }) = breaker.try_acquire() {
            return Err(PipelineError::external_service_unavailable(
                dep,
                retry_after_seconds,
            ));
        }

        let result = retry::with_retry(retry_config, operation_name, operation).await;

        // Only an exhausted availability-class failure (transport, timeout,
        // rate limit) counts against the breaker. A well-formed negative
        // response (not found, invalid payload) means the dependency is
        // healthy and simply answered in a way this call can't use.
        let breaker_success = match &result {
            Ok(_) => true,
            Err(err) => !err.is_retryable(),
        };
        breaker.record_outcome(breaker_success);

        result.map_err(|err| match err {
            ClientError::NotFound { resource } => PipelineError::not_found(resource),
            ClientError::InvalidResponse { message } | ClientError::Other { message } => {
                PipelineError::internal(message)
            }
            other => {
                let retry_after_seconds = match &other {
                    ClientError::RateLimited { retry_after_seconds } => *retry_after_seconds,
                    _ => breaker.remaining_open_dwell().as_secs().max(1),
                };
                PipelineError::external_service_unavailable(dep, retry_after_seconds)
            }
        })
    }
}
