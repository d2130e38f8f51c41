//! The AI collection selector (C5): produces a container title for a
//! playlist or a single video, with shared validation and fallback logic.

use std::sync::Arc;

use tracing::warn;

use crate::cache::CacheLayer;
use crate::clients::{LlmClient, VideoSourceClient};
use crate::config::defaults::DEFAULT_SAMPLE_VIDEO_COUNT;
use crate::errors::PipelineResult;
use crate::gateway::BookmarkStoreGateway;
use crate::models::{Dependency, VideoRef};
use crate::resilience::ResilienceEnvelope;

const LOW_CONFIDENCE: &str = "LOW_CONFIDENCE";

/// The result of validating an LLM's container choice, distinguishing a
/// genuine accepted title from the reason a fallback was used. Only
/// `Accepted`, `LowConfidence`, and `Invalid` are cacheable: `LlmUnavailable`
/// reflects a transient exception/breaker-open condition and must not be
/// remembered against the playlist.
enum SelectedContainer {
    Accepted(String),
    LowConfidence(String),
    Invalid(String),
    LlmUnavailable(String),
}

impl SelectedContainer {
    fn title(&self) -> &str {
        match self {
            Self::Accepted(t) | Self::LowConfidence(t) | Self::Invalid(t) | Self::LlmUnavailable(t) => t,
        }
    }

    fn cacheable(&self) -> bool {
        !matches!(self, Self::LlmUnavailable(_))
    }
}

pub struct CollectionSelector {
    gateway: Arc<BookmarkStoreGateway>,
    video_source: Arc<dyn VideoSourceClient>,
    llm: Arc<dyn LlmClient>,
    resilience: Arc<ResilienceEnvelope>,
    cache: Arc<CacheLayer>,
    fallback_container: String,
}

impl CollectionSelector {
    pub fn new(
        gateway: Arc<BookmarkStoreGateway>,
        video_source: Arc<dyn VideoSourceClient>,
        llm: Arc<dyn LlmClient>,
        resilience: Arc<ResilienceEnvelope>,
        cache: Arc<CacheLayer>,
        fallback_container: String,
    ) -> Self {
        Self {
            gateway,
            video_source,
            llm,
            resilience,
            cache,
            fallback_container,
        }
    }

    /// Selects a container title for an entire playlist, consulting and
    /// populating the playlist->container cache.
    pub async fn select_for_playlist(&self, playlist_id: &str) -> PipelineResult<String> {
        if let Some(cached) = self.cache.playlist_container.get(&playlist_id.to_string()) {
            return Ok(cached);
        }

        let containers = self.gateway.list_containers().await;
        if containers.is_empty() {
            return self.resolve_fallback().await;
        }

        let videos = self
            .resilience
            .guard(Dependency::VideoSource, "list_playlist_videos", || {
                let video_source = self.video_source.clone();
                let playlist_id = playlist_id.to_string();
                async move { video_source.list_playlist_videos(&playlist_id).await }
            })
            .await?;

        if videos.is_empty() {
            // Do not cache: an empty playlist may later populate.
            return self.resolve_fallback().await;
        }

        let samples: Vec<&VideoRef> = videos.iter().take(DEFAULT_SAMPLE_VIDEO_COUNT).collect();
        let titles: Vec<String> = containers.iter().map(|c| c.title.clone()).collect();
        let prompt = build_playlist_prompt(playlist_id, &titles, &samples);

        let choice = self.validate_llm_choice(&prompt, &titles).await?;
        if choice.cacheable() {
            self.cache
                .playlist_container
                .insert(playlist_id.to_string(), choice.title().to_string());
        }
        Ok(choice.title().to_string())
    }

    /// Selects a container title for a single video, without
    /// metadata/samples and without caching.
    pub async fn select_for_video(&self, video: &VideoRef) -> PipelineResult<String> {
        let containers = self.gateway.list_containers().await;
        if containers.is_empty() {
            return self.resolve_fallback().await;
        }

        let titles: Vec<String> = containers.iter().map(|c| c.title.clone()).collect();
        let prompt = build_video_prompt(video, &titles);
        Ok(self.validate_llm_choice(&prompt, &titles).await?.title().to_string())
    }

    /// Submits `prompt` and validates the response against `titles`,
    /// distinguishing a genuine (cacheable) choice from a fallback reached
    /// via `LOW_CONFIDENCE`, an invalid response, or an LLM exception (not
    /// cacheable: the degradation is transient).
    async fn validate_llm_choice(&self, prompt: &str, titles: &[String]) -> PipelineResult<SelectedContainer> {
        let response = self
            .resilience
            .guard(Dependency::Llm, "select_collection", || {
                let llm = self.llm.clone();
                let prompt = prompt.to_string();
                async move { llm.complete(&prompt).await }
            })
            .await;

        let response = match response {
            Ok(text) => text,
            Err(_) => {
                let fallback = self.resolve_fallback().await?;
                return Ok(SelectedContainer::LlmUnavailable(fallback));
            }
        };

        let trimmed = response.trim();
        if trimmed == LOW_CONFIDENCE {
            let fallback = self.resolve_fallback().await?;
            return Ok(SelectedContainer::LowConfidence(fallback));
        }

        if titles.iter().any(|t| t == trimmed) {
            return Ok(SelectedContainer::Accepted(trimmed.to_string()));
        }

        warn!(response = trimmed, "selector response not in container list, using fallback");
        let fallback = self.resolve_fallback().await?;
        Ok(SelectedContainer::Invalid(fallback))
    }

    /// The fallback title is always expressible: creating it via C2 is the
    /// last resort, and creation evicts the containers cache.
    async fn resolve_fallback(&self) -> PipelineResult<String> {
        let containers = self.gateway.list_containers().await;
        if containers.iter().any(|c| c.title == self.fallback_container) {
            return Ok(self.fallback_container.clone());
        }

        self.gateway.create_container(&self.fallback_container).await?;
        Ok(self.fallback_container.clone())
    }
}

fn build_playlist_prompt(playlist_id: &str, titles: &[String], samples: &[&VideoRef]) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are choosing the single best existing bookmark container for a playlist of videos.\n");
    prompt.push_str("Available containers:\n");
    for title in titles {
        prompt.push_str(&format!("- {title}\n"));
    }
    prompt.push_str(&format!("\nPlaylist: {playlist_id}\n"));
    if !samples.is_empty() {
        prompt.push_str("Sample videos:\n");
        for (i, video) in samples.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, video.title));
        }
    }
    prompt.push_str(
        "\nRespond with only an exact title from the list above, or the literal string LOW_CONFIDENCE. \
         Do not invent names. Do not explain.",
    );
    prompt
}

fn build_video_prompt(video: &VideoRef, titles: &[String]) -> String {
    let mut prompt = String::new();
    prompt.push_str("You are choosing the single best existing bookmark container for one video.\n");
    prompt.push_str("Available containers:\n");
    for title in titles {
        prompt.push_str(&format!("- {title}\n"));
    }
    prompt.push_str(&format!("\nVideo: {}\n", video.title));
    if let Some(description) = &video.description {
        prompt.push_str(&format!("Description: {description}\n"));
    }
    prompt.push_str(
        "\nRespond with only an exact title from the list above, or the literal string LOW_CONFIDENCE. \
         Do not invent names. Do not explain.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tracing_test::{logs_contain, traced_test};

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

    fn sample_video() -> VideoRef {
        VideoRef {
            video_id: "v1".into(),
            url: "https://example.com/v1".into(),
            title: "Intro".into(),
            description: None,
            published_at: None,
            duration_seconds: None,
        }
    }

    #[tokio::test]
    async fn llm_unavailable_fallback_is_not_cached() {
        let mut store = MockBookmarkStoreClient::new();
        store.expect_list_containers().returning(|_| {
            Ok(vec![Container {
                id: 1,
                title: "Tech".to_string(),
            }])
        });
        store.expect_create_container().returning(|_| Ok(2));

        let mut video_source = MockVideoSourceClient::new();
        video_source
            .expect_list_playlist_videos()
            .returning(|_| Ok(vec![sample_video()]));

        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .returning(|_| Err(ClientError::Timeout));

        let resilience = Arc::new(fast_envelope());
        let cache = Arc::new(CacheLayer::new(&BookmarkStoreConfig::default()));
        let gateway = Arc::new(BookmarkStoreGateway::new(
            Arc::new(store),
            resilience.clone(),
            cache.clone(),
        ));
        let selector = CollectionSelector::new(
            gateway,
            Arc::new(video_source),
            Arc::new(llm),
            resilience,
            cache.clone(),
            "Videos".to_string(),
        );

        let title = selector.select_for_playlist("P1").await.unwrap();
        assert_eq!(title, "Videos");
        assert_eq!(cache.playlist_container.get(&"P1".to_string()), None);
    }

    #[tokio::test]
    async fn accepted_choice_is_cached() {
        let mut store = MockBookmarkStoreClient::new();
        store.expect_list_containers().returning(|_| {
            Ok(vec![Container {
                id: 1,
                title: "Tech".to_string(),
            }])
        });

        let mut video_source = MockVideoSourceClient::new();
        video_source
            .expect_list_playlist_videos()
            .returning(|_| Ok(vec![sample_video()]));

        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .returning(|_| Ok("Tech".to_string()));

        let resilience = Arc::new(fast_envelope());
        let cache = Arc::new(CacheLayer::new(&BookmarkStoreConfig::default()));
        let gateway = Arc::new(BookmarkStoreGateway::new(
            Arc::new(store),
            resilience.clone(),
            cache.clone(),
        ));
        let selector = CollectionSelector::new(
            gateway,
            Arc::new(video_source),
            Arc::new(llm),
            resilience,
            cache.clone(),
            "Videos".to_string(),
        );

        let title = selector.select_for_playlist("P1").await.unwrap();
        assert_eq!(title, "Tech");
        assert_eq!(
            cache.playlist_container.get(&"P1".to_string()),
            Some("Tech".to_string())
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn response_outside_container_list_falls_back_and_logs_a_warning() {
        let mut store = MockBookmarkStoreClient::new();
        store.expect_list_containers().returning(|_| {
            Ok(vec![Container {
                id: 1,
                title: "Tech".to_string(),
            }])
        });

        let mut video_source = MockVideoSourceClient::new();
        video_source
            .expect_list_playlist_videos()
            .returning(|_| Ok(vec![sample_video()]));

        let mut llm = MockLlmClient::new();
        llm.expect_complete()
            .returning(|_| Ok("Gardening".to_string()));

        let resilience = Arc::new(fast_envelope());
        let cache = Arc::new(CacheLayer::new(&BookmarkStoreConfig::default()));
        let gateway = Arc::new(BookmarkStoreGateway::new(
            Arc::new(store),
            resilience.clone(),
            cache.clone(),
        ));
        let selector = CollectionSelector::new(
            gateway,
            Arc::new(video_source),
            Arc::new(llm),
            resilience,
            cache.clone(),
            "Tech".to_string(),
        );

        let title = selector.select_for_playlist("P1").await.unwrap();
        assert_eq!(title, "Tech");
        assert!(logs_contain("selector response not in container list"));
    }

    #[test]
    fn playlist_prompt_contains_all_container_titles_and_samples() {
        let titles = vec!["Tech".to_string(), "Cooking".to_string()];
        let sample = VideoRef {
            video_id: "v1".into(),
            url: "https://example.com/v1".into(),
            title: "Intro to Rust".into(),
            description: None,
            published_at: None,
            duration_seconds: None,
        };
        let prompt = build_playlist_prompt("P1", &titles, &[&sample]);
        assert!(prompt.contains("Tech"));
        assert!(prompt.contains("Cooking"));
        assert!(prompt.contains("Intro to Rust"));
        assert!(prompt.contains("LOW_CONFIDENCE"));
    }

    #[test]
    fn video_prompt_includes_description_when_present() {
        let video = VideoRef {
            video_id: "v1".into(),
            url: "https://example.com/v1".into(),
            title: "Intro".into(),
            description: Some("A beginner tutorial".into()),
            published_at: None,
            duration_seconds: None,
        };
        let prompt = build_video_prompt(&video, &["Tech".to_string()]);
        assert!(prompt.contains("A beginner tutorial"));
    }
}
