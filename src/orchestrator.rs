//! The tagging orchestrator (C6): drives the state machine per playlist
//! run, emits progress events, and aggregates the run summary.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::clients::VideoSourceClient;
use crate::config::defaults::DEFAULT_BATCH_SIZE;
use crate::errors::PipelineError;
use crate::gateway::BookmarkStoreGateway;
use crate::models::{
    Dependency, PlaylistFilters, ProcessingSummary, ProgressEvent, ProgressEventKind,
    TagPlaylistRequest, Tag, TagStrategy, VideoOutcome, VideoRef, VideoStatus, Verbosity,
};
use crate::resilience::ResilienceEnvelope;
use crate::selector::CollectionSelector;
use crate::tagging::TagGenerator;

pub struct TaggingOrchestrator {
    video_source: Arc<dyn VideoSourceClient>,
    gateway: Arc<BookmarkStoreGateway>,
    resilience: Arc<ResilienceEnvelope>,
    selector: Arc<CollectionSelector>,
    tag_generator: Arc<TagGenerator>,
    batch_size: usize,
}

impl TaggingOrchestrator {
    pub fn new(
        video_source: Arc<dyn VideoSourceClient>,
        gateway: Arc<BookmarkStoreGateway>,
        resilience: Arc<ResilienceEnvelope>,
        selector: Arc<CollectionSelector>,
        tag_generator: Arc<TagGenerator>,
    ) -> Self {
        Self {
            video_source,
            gateway,
            resilience,
            selector,
            tag_generator,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub async fn run(
        &self,
        request: TagPlaylistRequest,
        sink: mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> ProcessingSummary {
        let mut summary = ProcessingSummary::default();
        let verbosity = request.verbosity.unwrap_or_default();

        self.emit_critical(&sink, ProgressEvent::new(ProgressEventKind::Started, "run started"))
            .await;

        let playlist_id = request.playlist_input_raw.trim().to_string();
        if playlist_id.is_empty() {
            return self
                .fail_run(
                    &sink,
                    PipelineError::validation("playlistInputRaw must not be blank"),
                    summary,
                )
                .await;
        }

        let container_title = match self.selector.select_for_playlist(&playlist_id).await {
            Ok(title) => title,
            Err(e) => return self.fail_run(&sink, e, summary).await,
        };
        self.emit_progress(
            &sink,
            verbosity,
            format!("selected container '{container_title}'"),
        );

        let containers = self.gateway.list_containers().await;
        let container_id = match BookmarkStoreGateway::resolve_container_id(&containers, &container_title) {
            Some(id) => id,
            None => {
                return self
                    .fail_run(
                        &sink,
                        PipelineError::not_found(format!("container:{container_title}")),
                        summary,
                    )
                    .await
            }
        };

        let vocabulary = match self.gateway.list_tags().await {
            Ok(v) => v,
            Err(e) => return self.fail_run(&sink, e, summary).await,
        };

        let videos = match self
            .resilience
            .guard(Dependency::VideoSource, "list_playlist_videos", || {
                let video_source = self.video_source.clone();
                let playlist_id = playlist_id.clone();
                async move { video_source.list_playlist_videos(&playlist_id).await }
            })
            .await
        {
            Ok(videos) => videos,
            Err(e) => return self.fail_run(&sink, e, summary).await,
        };

        let filtered = apply_filters(videos, request.filters.as_ref());
        summary.total = filtered.len() as u64;

        let strategy = request.strategy.clone().unwrap_or_default();
        let total_batches = filtered.len().div_ceil(self.batch_size);

        let mut batch_number = 0usize;
        for batch in filtered.chunks(self.batch_size) {
            batch_number += 1;
            let mut batch_succeeded = 0u64;
            let mut batch_skipped = 0u64;
            let mut batch_failed = 0u64;
            let mut cut_short = false;

            for video in batch {
                if cancel.is_cancelled() {
                    cut_short = true;
                    break;
                }

                match self
                    .process_video(video, container_id, &vocabulary, &strategy)
                    .await
                {
                    Ok(outcome) => {
                        apply_outcome(&mut summary, outcome.status);
                        match outcome.status {
                            VideoStatus::Success => {
                                batch_succeeded += 1;
                                self.emit_informational(
                                    &sink,
                                    ProgressEvent::new(
                                        ProgressEventKind::VideoCompleted,
                                        format!("tagged '{}'", outcome.video.title),
                                    )
                                    .with_data(json!({
                                        "videoId": outcome.video.video_id,
                                        "tags": outcome.tags,
                                    })),
                                );
                            }
                            VideoStatus::Skipped => {
                                batch_skipped += 1;
                                self.emit_informational(
                                    &sink,
                                    ProgressEvent::new(
                                        ProgressEventKind::VideoSkipped,
                                        format!("'{}' already bookmarked", outcome.video.title),
                                    )
                                    .with_data(json!({ "videoId": outcome.video.video_id })),
                                );
                            }
                            VideoStatus::Failed => {
                                batch_failed += 1;
                                self.emit_informational(
                                    &sink,
                                    ProgressEvent::new(
                                        ProgressEventKind::Error,
                                        outcome
                                            .error_message
                                            .clone()
                                            .unwrap_or_else(|| "video processing failed".to_string()),
                                    )
                                    .with_data(json!({ "videoId": outcome.video.video_id })),
                                );
                            }
                        }
                    }
                    Err(fatal) => return self.fail_run(&sink, fatal, summary).await,
                }
            }

            if !cut_short {
                self.emit_informational(
                    &sink,
                    ProgressEvent::new(ProgressEventKind::BatchCompleted, format!("batch {batch_number}/{total_batches} complete"))
                        .with_data(json!({
                            "batchNumber": batch_number,
                            "totalBatches": total_batches,
                            "succeeded": batch_succeeded,
                            "skipped": batch_skipped,
                            "failed": batch_failed,
                        })),
                );
            } else {
                info!(playlist_id, "run cancelled mid-batch");
                break;
            }
        }

        self.complete_run(&sink, summary).await
    }

    /// Returns `Ok(outcome)` for every non-fatal result, including
    /// per-video failures folded into `VideoStatus::Failed`. Returns
    /// `Err` only for `ExternalServiceUnavailable`, which escalates to a
    /// fatal run abort rather than a per-video failure.
    async fn process_video(
        &self,
        video: &VideoRef,
        container_id: i64,
        vocabulary: &[Tag],
        strategy: &TagStrategy,
    ) -> Result<VideoOutcome, PipelineError> {
        match self.gateway.bookmark_exists(container_id, &video.url).await {
            Ok(true) => {
                return Ok(VideoOutcome {
                    video: video.clone(),
                    tags: Vec::new(),
                    status: VideoStatus::Skipped,
                    error_message: None,
                })
            }
            Ok(false) => {}
            Err(e @ PipelineError::ExternalServiceUnavailable { .. }) => return Err(e),
            Err(e) => return Ok(failed_outcome(video, e)),
        }

        let tags = match self.tag_generator.generate(video, vocabulary, strategy).await {
            Ok(tags) => tags,
            Err(e @ PipelineError::ExternalServiceUnavailable { .. }) => return Err(e),
            Err(e) => return Ok(failed_outcome(video, e)),
        };

        let tag_names: Vec<String> = tags.iter().map(|t| t.name.clone()).collect();
        match self
            .gateway
            .create_bookmark(container_id, &video.url, &video.title, &tag_names)
            .await
        {
            Ok(()) => Ok(VideoOutcome {
                video: video.clone(),
                tags,
                status: VideoStatus::Success,
                error_message: None,
            }),
            Err(e @ PipelineError::ExternalServiceUnavailable { .. }) => Err(e),
            Err(e) => Ok(failed_outcome(video, e)),
        }
    }

    async fn fail_run(
        &self,
        sink: &mpsc::Sender<ProgressEvent>,
        error: PipelineError,
        summary: ProcessingSummary,
    ) -> ProcessingSummary {
        self.emit_critical(
            sink,
            ProgressEvent::new(ProgressEventKind::Error, format!("Fatal: {error}")),
        )
        .await;
        self.complete_run(sink, summary).await
    }

    async fn complete_run(
        &self,
        sink: &mpsc::Sender<ProgressEvent>,
        summary: ProcessingSummary,
    ) -> ProcessingSummary {
        self.emit_critical(
            sink,
            ProgressEvent::new(ProgressEventKind::Completed, "run completed")
                .with_data(json!(summary)),
        )
        .await;
        summary
    }

    /// `started`/`completed`/fatal `error` must never be dropped.
    async fn emit_critical(&self, sink: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) {
        let _ = sink.send(event).await;
    }

    /// Informational events may be dropped under backpressure rather than
    /// stall the pipeline.
    fn emit_informational(&self, sink: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) {
        let _ = sink.try_send(event);
    }

    fn emit_progress(&self, sink: &mpsc::Sender<ProgressEvent>, verbosity: Verbosity, message: String) {
        if verbosity != Verbosity::Quiet {
            self.emit_informational(sink, ProgressEvent::new(ProgressEventKind::Progress, message));
        }
    }
}

/// Folds a single video's outcome into the run summary. Pulled out of the
/// per-video loop so the `total = succeeded + skipped + failed` invariant
/// can be checked against arbitrary outcome sequences, not just real runs.
fn apply_outcome(summary: &mut ProcessingSummary, status: VideoStatus) {
    match status {
        VideoStatus::Success => summary.succeeded += 1,
        VideoStatus::Skipped => summary.skipped += 1,
        VideoStatus::Failed => summary.failed += 1,
    }
}

fn failed_outcome(video: &VideoRef, error: PipelineError) -> VideoOutcome {
    VideoOutcome {
        video: video.clone(),
        tags: Vec::new(),
        status: VideoStatus::Failed,
        error_message: Some(error.to_string()),
    }
}

/// Applies, in order: `publishedAfter` (strict `>`), `maxDuration` (`<=`),
/// then `maxVideos` (limit). Videos missing the relevant field fail that
/// filter.
fn apply_filters(videos: Vec<VideoRef>, filters: Option<&PlaylistFilters>) -> Vec<VideoRef> {
    let Some(filters) = filters else {
        return videos;
    };

    let mut result: Vec<VideoRef> = videos
        .into_iter()
        .filter(|v| match filters.published_after {
            Some(cutoff) => v.published_at.is_some_and(|p| p > cutoff),
            None => true,
        })
        .filter(|v| match filters.max_duration_seconds {
            Some(max) => v.duration_seconds.is_some_and(|d| d <= max),
            None => true,
        })
        .collect();

    if let Some(max_videos) = filters.max_videos {
        result.truncate(max_videos);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::cache::CacheLayer;
    use crate::clients::bookmark_store::MockBookmarkStoreClient;
    use crate::clients::llm::MockLlmClient;
    use crate::clients::video_source::MockVideoSourceClient;
    use crate::config::{
        BookmarkStoreConfig, BreakerConfig, BreakerProfileConfig, RetryConfig, RetryProfileConfig,
    };
    use crate::errors::ClientError;
    use crate::models::Container;

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

    fn sample_video(id: &str) -> VideoRef {
        VideoRef {
            video_id: id.to_string(),
            url: format!("https://example.com/{id}"),
            title: format!("Video {id}"),
            description: None,
            published_at: None,
            duration_seconds: None,
        }
    }

    fn build_orchestrator(
        video_source: MockVideoSourceClient,
        store: MockBookmarkStoreClient,
        llm: MockLlmClient,
    ) -> TaggingOrchestrator {
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
        TaggingOrchestrator::new(video_source, gateway, resilience, selector, tag_generator)
    }

    fn request(playlist_id: &str) -> TagPlaylistRequest {
        TagPlaylistRequest {
            playlist_input_raw: playlist_id.to_string(),
            filters: None,
            strategy: None,
            verbosity: None,
        }
    }

    async fn drain(mut receiver: mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = receiver.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn external_service_unavailable_escalates_and_aborts_the_run() {
        let mut store = MockBookmarkStoreClient::new();
        store.expect_list_containers().returning(|_| {
            Ok(vec![Container {
                id: 1,
                title: "Videos".to_string(),
            }])
        });
        store.expect_list_tags().returning(|_| Ok(vec![]));
        store
            .expect_bookmark_exists()
            .returning(|_, _| Err(ClientError::Timeout));

        let mut video_source = MockVideoSourceClient::new();
        video_source
            .expect_list_playlist_videos()
            .returning(|_| Ok(vec![sample_video("v1")]));

        let mut llm = MockLlmClient::new();
        llm.expect_complete().returning(|_| Ok("Videos".to_string()));

        let orchestrator = build_orchestrator(video_source, store, llm);
        let (sink, receiver) = mpsc::channel(32);
        let summary = orchestrator
            .run(request("P1"), sink, CancellationToken::new())
            .await;

        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 0);

        let events = drain(receiver).await;
        let fatal = events
            .iter()
            .find(|e| matches!(e.kind, ProgressEventKind::Error) && e.message.starts_with("Fatal"));
        assert!(fatal.is_some(), "expected a fatal error event, got {events:?}");
        assert!(!events
            .iter()
            .any(|e| matches!(e.kind, ProgressEventKind::VideoCompleted | ProgressEventKind::VideoSkipped)));
        assert!(matches!(events.last().unwrap().kind, ProgressEventKind::Completed));
    }

    #[tokio::test]
    async fn per_video_failure_folds_into_failed_and_the_run_continues() {
        let mut store = MockBookmarkStoreClient::new();
        store.expect_list_containers().returning(|_| {
            Ok(vec![Container {
                id: 1,
                title: "Videos".to_string(),
            }])
        });
        store.expect_list_tags().returning(|_| Ok(vec![]));
        store.expect_bookmark_exists().returning(|_, _| Ok(false));
        store.expect_create_bookmark().returning(|_, _, _, _| {
            Err(ClientError::InvalidResponse {
                message: "store returned a malformed body".to_string(),
            })
        });

        let mut video_source = MockVideoSourceClient::new();
        video_source
            .expect_list_playlist_videos()
            .returning(|_| Ok(vec![sample_video("v1"), sample_video("v2")]));

        let mut llm = MockLlmClient::new();
        llm.expect_complete().returning(|_| Ok("[]".to_string()));

        let orchestrator = build_orchestrator(video_source, store, llm);
        let (sink, receiver) = mpsc::channel(32);
        let summary = orchestrator
            .run(request("P1"), sink, CancellationToken::new())
            .await;

        assert_eq!(summary.total, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.succeeded, 0);

        let events = drain(receiver).await;
        assert!(!events
            .iter()
            .any(|e| matches!(e.kind, ProgressEventKind::Error) && e.message.starts_with("Fatal")));
        assert!(matches!(events.last().unwrap().kind, ProgressEventKind::Completed));
    }

    fn video(published_at: Option<chrono::DateTime<chrono::Utc>>, duration: Option<u64>) -> VideoRef {
        VideoRef {
            video_id: "v".into(),
            url: "https://example.com/v".into(),
            title: "v".into(),
            description: None,
            published_at,
            duration_seconds: duration,
        }
    }

    #[test]
    fn no_filters_passes_everything_through() {
        let videos = vec![video(None, None), video(None, None)];
        assert_eq!(apply_filters(videos, None).len(), 2);
    }

    #[test]
    fn missing_published_at_fails_published_after_filter() {
        let cutoff = chrono::Utc::now();
        let videos = vec![video(None, None)];
        let filters = PlaylistFilters {
            published_after: Some(cutoff),
            max_duration_seconds: None,
            max_videos: None,
        };
        assert_eq!(apply_filters(videos, Some(&filters)).len(), 0);
    }

    #[test]
    fn missing_duration_fails_max_duration_filter() {
        let videos = vec![video(None, None)];
        let filters = PlaylistFilters {
            published_after: None,
            max_duration_seconds: Some(60),
            max_videos: None,
        };
        assert_eq!(apply_filters(videos, Some(&filters)).len(), 0);
    }

    #[test]
    fn max_videos_truncates_after_other_filters() {
        let videos = vec![
            video(None, Some(10)),
            video(None, Some(10)),
            video(None, Some(10)),
        ];
        let filters = PlaylistFilters {
            published_after: None,
            max_duration_seconds: Some(20),
            max_videos: Some(1),
        };
        assert_eq!(apply_filters(videos, Some(&filters)).len(), 1);
    }

    #[test]
    fn batch_boundary_ten_is_one_batch_eleven_is_two() {
        let ten: Vec<i32> = (0..10).collect();
        let eleven: Vec<i32> = (0..11).collect();
        assert_eq!(ten.chunks(10).count(), 1);
        assert_eq!(eleven.chunks(10).count(), 2);
    }

    fn video_status_strategy() -> impl proptest::strategy::Strategy<Value = VideoStatus> {
        proptest::prop_oneof![
            proptest::strategy::Just(VideoStatus::Success),
            proptest::strategy::Just(VideoStatus::Skipped),
            proptest::strategy::Just(VideoStatus::Failed),
        ]
    }

    proptest::proptest! {
        // A completed, non-cancelled run always accounts for every video
        // exactly once across the three outcome buckets.
        #[test]
        fn total_equals_sum_of_outcomes(statuses in proptest::collection::vec(video_status_strategy(), 0..50)) {
            let mut summary = ProcessingSummary {
                total: statuses.len() as u64,
                ..Default::default()
            };
            for status in &statuses {
                apply_outcome(&mut summary, *status);
            }
            proptest::prop_assert_eq!(summary.total, summary.succeeded + summary.skipped + summary.failed);
        }
    }
}
