//! Twitter/X adapter
//!
//! Media goes through the v1.1 upload endpoint, the tweet itself through the
//! v2 `/tweets` endpoint. Both use the account's OAuth 2.0 bearer token.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PlatformError;
use crate::platforms::{map_status_error, map_transport_error, PlatformAdapter, PublishedPost};
use crate::types::{MediaFile, PlatformAccount, PlatformContent, PlatformId};

pub struct TwitterAdapter {
    client: reqwest::Client,
    api_base: String,
    upload_base: String,
}

impl TwitterAdapter {
    pub fn new(client: reqwest::Client, api_base: String, upload_base: String) -> Self {
        Self {
            client,
            api_base,
            upload_base,
        }
    }

    async fn upload_media(&self, token: &str, file: &MediaFile) -> Result<String, PlatformError> {
        let bytes = tokio::fs::read(&file.file_path).await.map_err(|e| {
            PlatformError::Upload(format!("Failed to read {}: {}", file.file_path, e))
        })?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file.id.clone())
            .mime_str(file.mime.as_str())
            .map_err(|e| PlatformError::Upload(format!("Invalid media type: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("media", part);

        let response = self
            .client
            .post(format!("{}/media/upload.json", self.upload_base))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| map_transport_error(PlatformId::Twitter, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(PlatformId::Twitter, e))?;
        if !status.is_success() {
            return Err(map_status_error(PlatformId::Twitter, status, &text));
        }

        let result: Value = serde_json::from_str(&text).map_err(|e| {
            PlatformError::Upload(format!("twitter: unexpected upload response: {}", e))
        })?;

        result
            .get("media_id_string")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::Upload("twitter: upload response carried no media id".to_string())
            })
    }
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::Twitter
    }

    async fn publish(
        &self,
        account: &PlatformAccount,
        content: &PlatformContent,
        media: &[MediaFile],
    ) -> Result<PublishedPost, PlatformError> {
        let token = &account.access_token;

        let mut media_ids = Vec::with_capacity(media.len());
        for file in media {
            media_ids.push(self.upload_media(token, file).await?);
        }

        let body = tweet_body(&content.body, &media_ids);

        let response = self
            .client
            .post(format!("{}/tweets", self.api_base))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(PlatformId::Twitter, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(PlatformId::Twitter, e))?;
        if !status.is_success() {
            return Err(map_status_error(PlatformId::Twitter, status, &text));
        }

        let result: Value = serde_json::from_str(&text)
            .map_err(|e| PlatformError::Posting(format!("twitter: unexpected response: {}", e)))?;

        let tweet_id = result
            .pointer("/data/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::Posting("twitter: response carried no tweet id".to_string())
            })?;

        Ok(PublishedPost {
            url: Some(status_url(&tweet_id)),
            platform_post_id: tweet_id,
        })
    }
}

fn tweet_body(text: &str, media_ids: &[String]) -> Value {
    if media_ids.is_empty() {
        serde_json::json!({ "text": text })
    } else {
        serde_json::json!({
            "text": text,
            "media": { "media_ids": media_ids },
        })
    }
}

fn status_url(tweet_id: &str) -> String {
    format!("https://twitter.com/i/status/{}", tweet_id)
}
