//! YouTube adapter (resumable upload)
//!
//! Uploads a single video through the Data API's resumable protocol: one
//! request registers the video metadata and returns an upload session URL,
//! a second request sends the bytes.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PlatformError;
use crate::platforms::{map_status_error, map_transport_error, PlatformAdapter, PublishedPost};
use crate::types::{MediaFile, PlatformAccount, PlatformContent, PlatformId};

pub struct YoutubeAdapter {
    client: reqwest::Client,
    upload_base: String,
}

impl YoutubeAdapter {
    pub fn new(client: reqwest::Client, upload_base: String) -> Self {
        Self { client, upload_base }
    }

    /// Open a resumable upload session and return its session URL
    async fn initiate_upload(
        &self,
        token: &str,
        content: &PlatformContent,
        file: &MediaFile,
    ) -> Result<String, PlatformError> {
        let metadata = video_metadata(content);

        let response = self
            .client
            .post(format!("{}/videos", self.upload_base))
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(token)
            .header("X-Upload-Content-Type", file.mime.as_str())
            .header("X-Upload-Content-Length", file.file_size.to_string())
            .json(&metadata)
            .send()
            .await
            .map_err(|e| map_transport_error(PlatformId::Youtube, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| map_transport_error(PlatformId::Youtube, e))?;
            return Err(map_status_error(PlatformId::Youtube, status, &text));
        }

        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::Upload(
                    "youtube: upload session response carried no Location header".to_string(),
                )
            })
    }

    async fn upload_bytes(
        &self,
        token: &str,
        session_url: &str,
        file: &MediaFile,
    ) -> Result<Value, PlatformError> {
        let bytes = tokio::fs::read(&file.file_path).await.map_err(|e| {
            PlatformError::Upload(format!("Failed to read {}: {}", file.file_path, e))
        })?;

        let response = self
            .client
            .put(session_url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, file.mime.as_str())
            .body(bytes)
            .send()
            .await
            .map_err(|e| map_transport_error(PlatformId::Youtube, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(PlatformId::Youtube, e))?;

        if !status.is_success() {
            return Err(map_status_error(PlatformId::Youtube, status, &text));
        }

        serde_json::from_str(&text)
            .map_err(|e| PlatformError::Upload(format!("youtube: unexpected response: {}", e)))
    }
}

#[async_trait]
impl PlatformAdapter for YoutubeAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::Youtube
    }

    async fn publish(
        &self,
        account: &PlatformAccount,
        content: &PlatformContent,
        media: &[MediaFile],
    ) -> Result<PublishedPost, PlatformError> {
        let file = match media {
            [file] => file,
            _ => {
                return Err(PlatformError::Validation(
                    "youtube: a post requires exactly one video attachment".to_string(),
                ));
            }
        };

        let token = &account.access_token;
        let session_url = self.initiate_upload(token, content, file).await?;
        let result = self.upload_bytes(token, &session_url, file).await?;

        let video_id = result
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::Posting("youtube: upload response carried no video id".to_string())
            })?;

        Ok(PublishedPost {
            url: Some(watch_url(&video_id)),
            platform_post_id: video_id,
        })
    }
}

/// Video metadata for the upload session.
///
/// Falls back to the first line of the body when no explicit title is set,
/// since the API rejects untitled videos.
fn video_metadata(content: &PlatformContent) -> Value {
    let title = content
        .title
        .clone()
        .or_else(|| {
            content
                .body
                .lines()
                .next()
                .filter(|l| !l.trim().is_empty())
                .map(|l| {
                    let mut t: String = l.chars().take(100).collect();
                    t.truncate(t.trim_end().len());
                    t
                })
        })
        .unwrap_or_else(|| "Untitled".to_string());

    serde_json::json!({
        "snippet": {
            "title": title,
            "description": content.body,
            "tags": content.tags,
        },
        "status": {
            "privacyStatus": "public",
        },
    })
}

fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}
