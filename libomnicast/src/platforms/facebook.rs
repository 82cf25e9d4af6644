//! Facebook Pages adapter
//!
//! Publishes to a Page feed through the Graph API. Photos are uploaded
//! unpublished first and attached to the feed post; a single video goes
//! through the `/me/videos` edge instead.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PlatformError;
use crate::platforms::{map_status_error, map_transport_error, PlatformAdapter, PublishedPost};
use crate::types::{MediaFile, MediaKind, PlatformAccount, PlatformContent, PlatformId};

pub struct FacebookAdapter {
    client: reqwest::Client,
    graph_base: String,
}

impl FacebookAdapter {
    pub fn new(client: reqwest::Client, graph_base: String) -> Self {
        Self { client, graph_base }
    }

    async fn graph_post(
        &self,
        path: &str,
        token: &str,
        body: Value,
    ) -> Result<Value, PlatformError> {
        let response = self
            .client
            .post(format!("{}/{}", self.graph_base, path))
            .query(&[("access_token", token)])
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(PlatformId::Facebook, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(PlatformId::Facebook, e))?;

        if !status.is_success() {
            return Err(map_status_error(PlatformId::Facebook, status, &text));
        }

        serde_json::from_str(&text).map_err(|e| {
            PlatformError::Posting(format!("facebook: unexpected response: {}", e))
        })
    }

    async fn upload_photo(&self, token: &str, file: &MediaFile) -> Result<String, PlatformError> {
        let result = if let Some(url) = &file.remote_url {
            self.graph_post(
                "me/photos",
                token,
                serde_json::json!({ "url": url, "published": false }),
            )
            .await?
        } else {
            let bytes = tokio::fs::read(&file.file_path).await.map_err(|e| {
                PlatformError::Upload(format!("Failed to read {}: {}", file.file_path, e))
            })?;

            let part = reqwest::multipart::Part::bytes(bytes)
                .file_name(file.id.clone())
                .mime_str(file.mime.as_str())
                .map_err(|e| PlatformError::Upload(format!("Invalid media type: {}", e)))?;
            let form = reqwest::multipart::Form::new()
                .text("published", "false")
                .part("source", part);

            let response = self
                .client
                .post(format!("{}/me/photos", self.graph_base))
                .query(&[("access_token", token)])
                .multipart(form)
                .send()
                .await
                .map_err(|e| map_transport_error(PlatformId::Facebook, e))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| map_transport_error(PlatformId::Facebook, e))?;
            if !status.is_success() {
                return Err(map_status_error(PlatformId::Facebook, status, &text));
            }
            serde_json::from_str(&text).map_err(|e| {
                PlatformError::Upload(format!("facebook: unexpected upload response: {}", e))
            })?
        };

        extract_id(&result)
            .ok_or_else(|| PlatformError::Upload("facebook: photo upload returned no id".into()))
    }

    async fn publish_video(
        &self,
        token: &str,
        content: &PlatformContent,
        file: &MediaFile,
    ) -> Result<String, PlatformError> {
        let result = if let Some(url) = &file.remote_url {
            self.graph_post(
                "me/videos",
                token,
                serde_json::json!({
                    "file_url": url,
                    "description": content.body,
                    "title": content.title,
                }),
            )
            .await?
        } else {
            let bytes = tokio::fs::read(&file.file_path).await.map_err(|e| {
                PlatformError::Upload(format!("Failed to read {}: {}", file.file_path, e))
            })?;

            let part = reqwest::multipart::Part::bytes(bytes)
                .file_name(file.id.clone())
                .mime_str(file.mime.as_str())
                .map_err(|e| PlatformError::Upload(format!("Invalid media type: {}", e)))?;
            let mut form = reqwest::multipart::Form::new()
                .text("description", content.body.clone())
                .part("source", part);
            if let Some(title) = &content.title {
                form = form.text("title", title.clone());
            }

            let response = self
                .client
                .post(format!("{}/me/videos", self.graph_base))
                .query(&[("access_token", token)])
                .multipart(form)
                .send()
                .await
                .map_err(|e| map_transport_error(PlatformId::Facebook, e))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| map_transport_error(PlatformId::Facebook, e))?;
            if !status.is_success() {
                return Err(map_status_error(PlatformId::Facebook, status, &text));
            }
            serde_json::from_str(&text).map_err(|e| {
                PlatformError::Upload(format!("facebook: unexpected upload response: {}", e))
            })?
        };

        extract_id(&result)
            .ok_or_else(|| PlatformError::Posting("facebook: video post returned no id".into()))
    }
}

#[async_trait]
impl PlatformAdapter for FacebookAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::Facebook
    }

    /// Verify the token belongs to a Page, not a user.
    ///
    /// A user token passes `/me` but cannot post to a Page feed, which is
    /// the common misconfiguration, so the error names the fix.
    async fn preflight(&self, account: &PlatformAccount) -> Result<(), PlatformError> {
        if account.access_token.is_empty() {
            return Err(PlatformError::Authentication(format!(
                "Account {} has no access token",
                account.account_name
            )));
        }

        let response = self
            .client
            .get(format!("{}/me", self.graph_base))
            .query(&[
                ("fields", "id,name,category"),
                ("access_token", account.access_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| map_transport_error(PlatformId::Facebook, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(PlatformId::Facebook, e))?;
        if !status.is_success() {
            return Err(map_status_error(PlatformId::Facebook, status, &text));
        }

        let me: Value = serde_json::from_str(&text).map_err(|e| {
            PlatformError::Authentication(format!("facebook: unexpected /me response: {}", e))
        })?;

        // Page nodes carry a category field; user nodes do not
        if me.get("category").is_none() {
            return Err(PlatformError::Authentication(format!(
                "Token for account {} is a user token, not a Page token. \
                 Generate a Page access token for the target Page and reconnect.",
                account.account_name
            )));
        }

        Ok(())
    }

    async fn publish(
        &self,
        account: &PlatformAccount,
        content: &PlatformContent,
        media: &[MediaFile],
    ) -> Result<PublishedPost, PlatformError> {
        let token = &account.access_token;

        let post_id = match media.iter().find(|m| m.mime.kind() == MediaKind::Video) {
            Some(video) => self.publish_video(token, content, video).await?,
            None if media.is_empty() => {
                let result = self
                    .graph_post("me/feed", token, serde_json::json!({ "message": content.body }))
                    .await?;
                extract_id(&result).ok_or_else(|| {
                    PlatformError::Posting("facebook: feed post returned no id".into())
                })?
            }
            None => {
                let mut attached = Vec::with_capacity(media.len());
                for file in media {
                    let media_fbid = self.upload_photo(token, file).await?;
                    attached.push(serde_json::json!({ "media_fbid": media_fbid }));
                }
                let result = self
                    .graph_post(
                        "me/feed",
                        token,
                        serde_json::json!({
                            "message": content.body,
                            "attached_media": attached,
                        }),
                    )
                    .await?;
                extract_id(&result).ok_or_else(|| {
                    PlatformError::Posting("facebook: feed post returned no id".into())
                })?
            }
        };

        Ok(PublishedPost {
            url: Some(post_url(&post_id)),
            platform_post_id: post_id,
        })
    }
}

fn extract_id(value: &Value) -> Option<String> {
    value
        .get("id")
        .or_else(|| value.get("post_id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn post_url(post_id: &str) -> String {
    format!("https://www.facebook.com/{}", post_id)
}
