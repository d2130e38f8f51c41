//! Thin HTTP handlers: request validation at the boundary, delegation to
//! the orchestrator, and response shaping.

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::stream::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::defaults::DEFAULT_PROGRESS_CHANNEL_CAPACITY;
use crate::errors::PipelineError;
use crate::models::{ProgressEvent, ProgressEventKind, TagPlaylistRequest};
use crate::web::responses::handle_error;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct DebugQuery {
    #[serde(default)]
    pub debug: bool,
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// `POST /api/v1/playlists/tag` — accepts a `TagPlaylistRequest`, streams
/// `ProgressEvent`s as SSE, closing on `completed` or a fatal `error`.
pub async fn tag_playlist(
    State(state): State<AppState>,
    Query(query): Query<DebugQuery>,
    Json(request): Json<TagPlaylistRequest>,
) -> Response {
    if request.playlist_input_raw.trim().is_empty() {
        let error = PipelineError::validation("playlistInputRaw must not be blank");
        return handle_error(&error, "/api/v1/playlists/tag", query.debug);
    }

    let cancel = CancellationToken::new();
    let (sink, receiver) = mpsc::channel::<ProgressEvent>(DEFAULT_PROGRESS_CHANNEL_CAPACITY);

    let orchestrator = state.orchestrator.clone();
    let run_cancel = cancel.clone();
    tokio::spawn(async move {
        orchestrator.run(request, sink, run_cancel).await;
    });

    spawn_deadline_watcher(cancel.clone(), state.run_deadline);

    Sse::new(event_stream(receiver, cancel))
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// Aborts the run at its next safe point once `deadline` elapses, by
/// cancelling the same token `CancelOnDrop` already cancels on client
/// disconnect. Exits as soon as the run finishes or disconnects first,
/// without waiting out the rest of the deadline.
fn spawn_deadline_watcher(cancel: CancellationToken, deadline: std::time::Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(deadline) => {
                info!("run deadline elapsed, cancelling");
                cancel.cancel();
            }
            _ = cancel.cancelled() => {}
        }
    });
}

/// Cancels the in-flight run when the stream is dropped, which happens
/// when the client disconnects mid-run (the SSE layer stops polling us).
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn event_stream(
    receiver: mpsc::Receiver<ProgressEvent>,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let _guard = CancelOnDrop(cancel);
        let mut receiver = ReceiverStream::new(receiver);
        use tokio_stream::StreamExt;
        while let Some(event) = receiver.next().await {
            let is_terminal = matches!(event.kind, ProgressEventKind::Completed)
                || (matches!(event.kind, ProgressEventKind::Error) && event.message.starts_with("Fatal"));
            let sse_event = Event::default()
                .event(event.kind.to_string())
                .json_data(&event)
                .unwrap_or_else(|_| Event::default().event("error").data("event serialization failed"));
            yield Ok(sse_event);
            if is_terminal {
                info!("progress stream closed after terminal event");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum_test::TestServer;
    use serde_json::json;

    use super::*;
    use crate::cache::CacheLayer;
    use crate::clients::bookmark_store::MockBookmarkStoreClient;
    use crate::clients::llm::MockLlmClient;
    use crate::clients::video_source::MockVideoSourceClient;
    use crate::clients::VideoSourceClient;
    use crate::config::{
        BookmarkStoreConfig, BreakerConfig, BreakerProfileConfig, RetryConfig, RetryProfileConfig,
    };
    use crate::gateway::BookmarkStoreGateway;
    use crate::models::Container;
    use crate::orchestrator::TaggingOrchestrator;
    use crate::resilience::ResilienceEnvelope;
    use crate::selector::CollectionSelector;
    use crate::tagging::TagGenerator;
    use crate::web::build_router;

    fn fast_envelope() -> ResilienceEnvelope {
        let breaker_profile = BreakerProfileConfig {
            threshold_percent: 50,
            window_size: 2,
            open_dwell: Duration::from_secs(30),
            half_open_probes: 3,
        };
        let retry_profile = RetryProfileConfig {
            max_attempts: 1,
            base_wait: Duration::from_millis(1),
            multiplier: 1.0,
        };
        ResilienceEnvelope::new(
            &BreakerConfig {
                video_source: breaker_profile.clone(),
                bookmark_store: breaker_profile.clone(),
                llm: breaker_profile,
            },
            &RetryConfig {
                video_source: retry_profile.clone(),
                bookmark_store: retry_profile.clone(),
                llm: retry_profile,
            },
        )
    }

    fn test_state(run_deadline: Duration) -> AppState {
        let mut store = MockBookmarkStoreClient::new();
        store.expect_list_containers().returning(|_| {
            Ok(vec![Container {
                id: 1,
                title: "Videos".to_string(),
            }])
        });
        store.expect_list_tags().returning(|_| Ok(vec![]));

        let mut video_source = MockVideoSourceClient::new();
        video_source
            .expect_list_playlist_videos()
            .returning(|_| Ok(vec![]));

        let mut llm = MockLlmClient::new();
        llm.expect_complete().returning(|_| Ok("Videos".to_string()));

        let resilience = Arc::new(fast_envelope());
        let cache = Arc::new(CacheLayer::new(&BookmarkStoreConfig::default()));
        let video_source: Arc<dyn VideoSourceClient> = Arc::new(video_source);
        let llm: Arc<dyn crate::clients::LlmClient> = Arc::new(llm);
        let gateway = Arc::new(BookmarkStoreGateway::new(
            Arc::new(store),
            resilience.clone(),
            cache.clone(),
        ));
        let selector = Arc::new(CollectionSelector::new(
            gateway.clone(),
            video_source.clone(),
            llm.clone(),
            resilience.clone(),
            cache.clone(),
            "Videos".to_string(),
        ));
        let tag_generator = Arc::new(TagGenerator::new(llm, resilience.clone(), ""));
        let orchestrator = Arc::new(TaggingOrchestrator::new(
            video_source,
            gateway,
            resilience,
            selector,
            tag_generator,
        ));

        AppState {
            orchestrator,
            run_deadline,
        }
    }

    #[tokio::test]
    async fn tag_playlist_streams_started_then_completed_over_sse() {
        let server = TestServer::new(build_router(test_state(Duration::from_secs(60))))
            .expect("test server must build");

        let response = server
            .post("/api/v1/playlists/tag")
            .json(&json!({ "playlistInputRaw": "P1" }))
            .await;

        response.assert_status_ok();
        let body = response.text();
        let started_at = body.find("event: started").expect("started event present");
        let completed_at = body.find("event: completed").expect("completed event present");
        assert!(started_at < completed_at);
    }

    #[tokio::test]
    async fn blank_playlist_input_is_rejected_before_any_run_starts() {
        let server = TestServer::new(build_router(test_state(Duration::from_secs(60))))
            .expect("test server must build");

        let response = server
            .post("/api/v1/playlists/tag")
            .json(&json!({ "playlistInputRaw": "   " }))
            .await;

        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    }
}
