//! Thin cache-aware wrapper around the bookmark store client (C2), shared
//! by the selector, orchestrator, and unsorted sweeper so cache policy
//! lives in exactly one place.

use std::sync::Arc;

use crate::cache::CacheLayer;
use crate::clients::BookmarkStoreClient;
use crate::errors::PipelineResult;
use crate::models::{Bookmark, Container, Dependency, Tag, DEFAULT_PRINCIPAL};
use crate::resilience::ResilienceEnvelope;

pub struct BookmarkStoreGateway {
    store: Arc<dyn BookmarkStoreClient>,
    resilience: Arc<ResilienceEnvelope>,
    cache: Arc<CacheLayer>,
}

impl BookmarkStoreGateway {
    pub fn new(
        store: Arc<dyn BookmarkStoreClient>,
        resilience: Arc<ResilienceEnvelope>,
        cache: Arc<CacheLayer>,
    ) -> Self {
        Self {
            store,
            resilience,
            cache,
        }
    }

    /// Reads the container list through the cache. A remote failure is
    /// absorbed into an empty list rather than propagated, letting callers
    /// fall through to their own fallback logic.
    pub async fn list_containers(&self) -> Vec<Container> {
        let principal = DEFAULT_PRINCIPAL.to_string();
        if let Some(cached) = self.cache.containers.get(&principal) {
            return cached;
        }

        let containers = self
            .resilience
            .guard(Dependency::BookmarkStore, "list_containers", || {
                let store = self.store.clone();
                let principal = principal.clone();
                async move { store.list_containers(&principal).await }
            })
            .await
            .unwrap_or_default();

        self.cache
            .cache_containers_unless_empty(&principal, &containers);
        containers
    }

    pub async fn list_tags(&self) -> PipelineResult<Vec<Tag>> {
        let principal = DEFAULT_PRINCIPAL.to_string();
        if let Some(cached) = self.cache.tags.get(&principal) {
            return Ok(cached);
        }

        let tags = self
            .resilience
            .guard(Dependency::BookmarkStore, "list_tags", || {
                let store = self.store.clone();
                let principal = principal.clone();
                async move { store.list_tags(&principal).await }
            })
            .await?;

        // Empty lists are cached for tags (unlike containers).
        self.cache.tags.insert(principal, tags.clone());
        Ok(tags)
    }

    /// Creates a container and evicts the containers cache so subsequent
    /// reads observe the new entry.
    pub async fn create_container(&self, title: &str) -> PipelineResult<i64> {
        let id = self
            .resilience
            .guard(Dependency::BookmarkStore, "create_container", || {
                let store = self.store.clone();
                let title = title.to_string();
                async move { store.create_container(&title).await }
            })
            .await?;
        self.cache.containers.evict_all();
        Ok(id)
    }

    /// Fails closed: a breaker-open or exhausted-retries outcome propagates
    /// as `ExternalServiceUnavailable`, blocking the caller's insert rather
    /// than allowing a possibly-duplicate bookmark through.
    pub async fn bookmark_exists(&self, container_id: i64, url: &str) -> PipelineResult<bool> {
        self.resilience
            .guard(Dependency::BookmarkStore, "bookmark_exists", || {
                let store = self.store.clone();
                let url = url.to_string();
                async move { store.bookmark_exists(container_id, &url).await }
            })
            .await
    }

    pub async fn create_bookmark(
        &self,
        container_id: i64,
        url: &str,
        title: &str,
        tags: &[String],
    ) -> PipelineResult<()> {
        self.resilience
            .guard(Dependency::BookmarkStore, "create_bookmark", || {
                let store = self.store.clone();
                let url = url.to_string();
                let title = title.to_string();
                let tags = tags.to_vec();
                async move { store.create_bookmark(container_id, &url, &title, &tags).await }
            })
            .await
    }

    pub async fn list_bookmarks(&self, container_id: i64) -> PipelineResult<Vec<Bookmark>> {
        self.resilience
            .guard(Dependency::BookmarkStore, "list_bookmarks", || {
                let store = self.store.clone();
                async move { store.list_bookmarks(container_id).await }
            })
            .await
    }

    pub async fn update_bookmark(
        &self,
        bookmark_id: i64,
        container_id: i64,
        tags: &[String],
    ) -> PipelineResult<()> {
        self.resilience
            .guard(Dependency::BookmarkStore, "update_bookmark", || {
                let store = self.store.clone();
                let tags = tags.to_vec();
                async move { store.update_bookmark(bookmark_id, container_id, &tags).await }
            })
            .await
    }

    /// Title lookup is case-insensitive; ids are opaque integers.
    pub fn resolve_container_id(containers: &[Container], title: &str) -> Option<i64> {
        containers
            .iter()
            .find(|c| c.title.eq_ignore_ascii_case(title))
            .map(|c| c.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_container_id_is_case_insensitive() {
        let containers = vec![Container {
            id: 7,
            title: "Tech".to_string(),
        }];
        assert_eq!(
            BookmarkStoreGateway::resolve_container_id(&containers, "tech"),
            Some(7)
        );
        assert_eq!(
            BookmarkStoreGateway::resolve_container_id(&containers, "Cooking"),
            None
        );
    }
}
