use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ClientResult;
use crate::models::{Bookmark, Container, Tag};

/// C2 — operations the core consumes from the bookmark store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookmarkStoreClient: Send + Sync {
    async fn list_tags(&self, principal: &str) -> ClientResult<Vec<Tag>>;
    async fn list_containers(&self, principal: &str) -> ClientResult<Vec<Container>>;
    async fn create_container(&self, title: &str) -> ClientResult<i64>;
    async fn bookmark_exists(&self, container_id: i64, url: &str) -> ClientResult<bool>;
    async fn create_bookmark(
        &self,
        container_id: i64,
        url: &str,
        title: &str,
        tags: &[String],
    ) -> ClientResult<()>;
    async fn list_bookmarks(&self, container_id: i64) -> ClientResult<Vec<Bookmark>>;
    async fn update_bookmark(
        &self,
        bookmark_id: i64,
        container_id: i64,
        tags: &[String],
    ) -> ClientResult<()>;
}

pub struct HttpBookmarkStoreClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBookmarkStoreClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateContainerRequest<'a> {
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateContainerResponse {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct BookmarkExistsResponse {
    exists: bool,
}

#[derive(Debug, Serialize)]
struct CreateBookmarkRequest<'a> {
    url: &'a str,
    title: &'a str,
    tags: &'a [String],
}

#[derive(Debug, Serialize)]
struct UpdateBookmarkRequest<'a> {
    container_id: i64,
    tags: &'a [String],
}

#[async_trait]
impl BookmarkStoreClient for HttpBookmarkStoreClient {
    async fn list_tags(&self, principal: &str) -> ClientResult<Vec<Tag>> {
        let url = format!("{}/principals/{}/tags", self.base_url, principal);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn list_containers(&self, principal: &str) -> ClientResult<Vec<Container>> {
        let url = format!("{}/principals/{}/containers", self.base_url, principal);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn create_container(&self, title: &str) -> ClientResult<i64> {
        let url = format!("{}/containers", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&CreateContainerRequest { title })
            .send()
            .await?
            .error_for_status()?;
        let body: CreateContainerResponse = response.json().await?;
        Ok(body.id)
    }

    async fn bookmark_exists(&self, container_id: i64, url: &str) -> ClientResult<bool> {
        let request_url = format!(
            "{}/containers/{}/bookmarks/exists",
            self.base_url, container_id
        );
        let response = self
            .http
            .get(&request_url)
            .query(&[("url", url)])
            .send()
            .await?
            .error_for_status()?;
        let body: BookmarkExistsResponse = response.json().await?;
        Ok(body.exists)
    }

    async fn create_bookmark(
        &self,
        container_id: i64,
        url: &str,
        title: &str,
        tags: &[String],
    ) -> ClientResult<()> {
        let request_url = format!("{}/containers/{}/bookmarks", self.base_url, container_id);
        self.http
            .post(&request_url)
            .json(&CreateBookmarkRequest { url, title, tags })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn list_bookmarks(&self, container_id: i64) -> ClientResult<Vec<Bookmark>> {
        let url = format!("{}/containers/{}/bookmarks", self.base_url, container_id);
        let response = self.http.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn update_bookmark(
        &self,
        bookmark_id: i64,
        container_id: i64,
        tags: &[String],
    ) -> ClientResult<()> {
        let url = format!("{}/bookmarks/{}", self.base_url, bookmark_id);
        self.http
            .put(&url)
            .json(&UpdateBookmarkRequest { container_id, tags })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
