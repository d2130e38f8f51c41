use async_trait::async_trait;
use serde::Deserialize;

use crate::errors::{ClientError, ClientResult};
use crate::models::VideoRef;

/// C1 — operations the core consumes from the upstream video source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoSourceClient: Send + Sync {
    async fn list_playlist_videos(&self, playlist_id: &str) -> ClientResult<Vec<VideoRef>>;
    async fn get_video(&self, video_id: &str) -> ClientResult<Option<VideoRef>>;
}

pub struct HttpVideoSourceClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpVideoSourceClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlaylistVideosResponse {
    videos: Vec<VideoRef>,
}

#[async_trait]
impl VideoSourceClient for HttpVideoSourceClient {
    async fn list_playlist_videos(&self, playlist_id: &str) -> ClientResult<Vec<VideoRef>> {
        let url = format!("{}/playlists/{}/videos", self.base_url, playlist_id);
        let response = self.http.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound {
                resource: format!("playlist:{playlist_id}"),
            });
        }
        let response = response.error_for_status()?;
        let body: PlaylistVideosResponse = response.json().await?;
        Ok(body.videos)
    }

    async fn get_video(&self, video_id: &str) -> ClientResult<Option<VideoRef>> {
        let url = format!("{}/videos/{}", self.base_url, video_id);
        let response = self.http.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let video: VideoRef = response.json().await?;
        Ok(Some(video))
    }
}
