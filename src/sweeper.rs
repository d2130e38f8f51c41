//! The unsorted sweeper (C6b): periodically enriches bookmarks sitting in
//! the store's special "unsorted" pseudo-container, one video at a time.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::clients::VideoSourceClient;
use crate::config::UnsortedProcessorConfig;
use crate::gateway::BookmarkStoreGateway;
use crate::models::{Bookmark, TagStrategy, UNSORTED_CONTAINER_ID};
use crate::selector::CollectionSelector;
use crate::tagging::TagGenerator;

pub struct UnsortedSweeper {
    video_source: Arc<dyn VideoSourceClient>,
    gateway: Arc<BookmarkStoreGateway>,
    selector: Arc<CollectionSelector>,
    tag_generator: Arc<TagGenerator>,
}

impl UnsortedSweeper {
    pub fn new(
        video_source: Arc<dyn VideoSourceClient>,
        gateway: Arc<BookmarkStoreGateway>,
        selector: Arc<CollectionSelector>,
        tag_generator: Arc<TagGenerator>,
    ) -> Self {
        Self {
            video_source,
            gateway,
            selector,
            tag_generator,
        }
    }

    /// Runs sweeps on a fixed delay until cancelled. No-op if disabled.
    pub async fn run_periodic(&self, config: &UnsortedProcessorConfig, cancel: CancellationToken) {
        if !config.enabled {
            info!("unsorted sweeper disabled, not starting");
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(config.initial_delay) => {}
            _ = cancel.cancelled() => return,
        }

        loop {
            self.sweep().await;

            tokio::select! {
                _ = tokio::time::sleep(config.fixed_delay) => {}
                _ = cancel.cancelled() => {
                    info!("unsorted sweeper received cancellation, shutting down");
                    return;
                }
            }
        }
    }

    /// Runs one sweep. Individual bookmark failures are logged and do not
    /// stop the sweep; a summary line terminates it.
    pub async fn sweep(&self) {
        let bookmarks = match self.gateway.list_bookmarks(UNSORTED_CONTAINER_ID).await {
            Ok(bookmarks) => bookmarks,
            Err(e) => {
                warn!(error = %e, "unsorted sweep could not list bookmarks, skipping this run");
                return;
            }
        };

        let candidates: Vec<&Bookmark> = bookmarks
            .iter()
            .filter(|b| is_youtube_url(&b.url))
            .collect();

        let total = candidates.len();
        let mut succeeded = 0u64;
        let mut failed = 0u64;

        for bookmark in candidates {
            match self.process_bookmark(bookmark).await {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    failed += 1;
                    warn!(bookmark_id = bookmark.id, error = %e, "unsorted sweep failed for bookmark");
                }
            }
        }

        info!(total, succeeded, failed, "unsorted sweep complete");
    }

    async fn process_bookmark(&self, bookmark: &Bookmark) -> Result<(), String> {
        let video_id = extract_youtube_video_id(&bookmark.url)
            .ok_or_else(|| "could not extract video id from url".to_string())?;

        let video = self
            .video_source
            .get_video(&video_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("video {video_id} no longer exists at source"))?;

        let strategy = TagStrategy::default();
        let vocabulary = self.gateway.list_tags().await.map_err(|e| e.to_string())?;
        let tags = self
            .tag_generator
            .generate(&video, &vocabulary, &strategy)
            .await
            .map_err(|e| e.to_string())?;

        let container_title = self
            .selector
            .select_for_video(&video)
            .await
            .map_err(|e| e.to_string())?;
        let containers = self.gateway.list_containers().await;
        let container_id = BookmarkStoreGateway::resolve_container_id(&containers, &container_title)
            .ok_or_else(|| format!("container '{container_title}' not resolvable"))?;

        let tag_names: Vec<String> = tags.into_iter().map(|t| t.name).collect();
        self.gateway
            .update_bookmark(bookmark.id, container_id, &tag_names)
            .await
            .map_err(|e| e.to_string())
    }
}

fn is_youtube_url(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .is_some_and(|host| {
            host == "youtube.com"
                || host.ends_with(".youtube.com")
                || host == "youtu.be"
                || host == "m.youtube.com"
        })
}

/// Extracts a YouTube video id from either a `watch?v=` or a `youtu.be/`
/// short link.
fn extract_youtube_video_id(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    if host == "youtu.be" {
        return parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|s| !s.is_empty())
            .map(String::from);
    }
    parsed
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.to_string())
}
