//! LinkedIn adapter (ugcPosts API)
//!
//! Attachments are registered as assets, uploaded to the returned URL, and
//! referenced from the ugcPost by their asset URN.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PlatformError;
use crate::platforms::{map_status_error, map_transport_error, PlatformAdapter, PublishedPost};
use crate::types::{MediaFile, MediaKind, PlatformAccount, PlatformContent, PlatformId};

pub struct LinkedinAdapter {
    client: reqwest::Client,
    api_base: String,
}

impl LinkedinAdapter {
    pub fn new(client: reqwest::Client, api_base: String) -> Self {
        Self { client, api_base }
    }

    /// Member URN for the token's owner
    async fn author_urn(&self, token: &str) -> Result<String, PlatformError> {
        let response = self
            .client
            .get(format!("{}/me", self.api_base))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| map_transport_error(PlatformId::Linkedin, e))?;

        let me = read_json(response).await?;
        me.get("id")
            .and_then(Value::as_str)
            .map(|id| format!("urn:li:person:{}", id))
            .ok_or_else(|| {
                PlatformError::Authentication("linkedin: /me response carried no id".to_string())
            })
    }

    /// Register an upload slot and push the file bytes into it
    async fn upload_asset(
        &self,
        token: &str,
        author: &str,
        file: &MediaFile,
    ) -> Result<String, PlatformError> {
        let recipe = match file.mime.kind() {
            MediaKind::Image => "urn:li:digitalmediaRecipe:feedshare-image",
            MediaKind::Video => "urn:li:digitalmediaRecipe:feedshare-video",
        };

        let register = serde_json::json!({
            "registerUploadRequest": {
                "recipes": [recipe],
                "owner": author,
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent",
                }],
            },
        });

        let response = self
            .client
            .post(format!("{}/assets?action=registerUpload", self.api_base))
            .bearer_auth(token)
            .json(&register)
            .send()
            .await
            .map_err(|e| map_transport_error(PlatformId::Linkedin, e))?;

        let result = read_json(response).await?;

        let upload_url = result
            .pointer(
                "/value/uploadMechanism/com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest/uploadUrl",
            )
            .and_then(Value::as_str)
            .ok_or_else(|| {
                PlatformError::Upload("linkedin: register response carried no upload URL".to_string())
            })?;
        let asset = result
            .pointer("/value/asset")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::Upload("linkedin: register response carried no asset URN".to_string())
            })?;

        let bytes = tokio::fs::read(&file.file_path).await.map_err(|e| {
            PlatformError::Upload(format!("Failed to read {}: {}", file.file_path, e))
        })?;

        let response = self
            .client
            .put(upload_url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, file.mime.as_str())
            .body(bytes)
            .send()
            .await
            .map_err(|e| map_transport_error(PlatformId::Linkedin, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| map_transport_error(PlatformId::Linkedin, e))?;
            return Err(map_status_error(PlatformId::Linkedin, status, &text));
        }

        Ok(asset)
    }
}

#[async_trait]
impl PlatformAdapter for LinkedinAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::Linkedin
    }

    async fn preflight(&self, account: &PlatformAccount) -> Result<(), PlatformError> {
        if account.access_token.is_empty() {
            return Err(PlatformError::Authentication(format!(
                "Account {} has no access token",
                account.account_name
            )));
        }
        self.author_urn(&account.access_token).await?;
        Ok(())
    }

    async fn publish(
        &self,
        account: &PlatformAccount,
        content: &PlatformContent,
        media: &[MediaFile],
    ) -> Result<PublishedPost, PlatformError> {
        let token = &account.access_token;
        let author = self.author_urn(token).await?;

        let mut assets = Vec::with_capacity(media.len());
        for file in media {
            let asset = self.upload_asset(token, &author, file).await?;
            assets.push((asset, file.alt_text.clone()));
        }

        let media_kind = media.first().map(|m| m.mime.kind());
        let body = ugc_post_body(&author, &content.body, &assets, media_kind);

        let response = self
            .client
            .post(format!("{}/ugcPosts", self.api_base))
            .bearer_auth(token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(PlatformId::Linkedin, e))?;

        // The post URN comes back in the X-RestLi-Id header
        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| map_transport_error(PlatformId::Linkedin, e))?;
            return Err(map_status_error(PlatformId::Linkedin, status, &text));
        }

        let post_urn = match header_id {
            Some(id) => id,
            None => {
                let result: Value = response
                    .json()
                    .await
                    .map_err(|e| map_transport_error(PlatformId::Linkedin, e))?;
                result
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| {
                        PlatformError::Posting(
                            "linkedin: response carried no post URN".to_string(),
                        )
                    })?
            }
        };

        Ok(PublishedPost {
            url: Some(update_url(&post_urn)),
            platform_post_id: post_urn,
        })
    }
}

fn ugc_post_body(
    author: &str,
    text: &str,
    assets: &[(String, Option<String>)],
    media_kind: Option<MediaKind>,
) -> Value {
    let category = match media_kind {
        None => "NONE",
        Some(MediaKind::Image) => "IMAGE",
        Some(MediaKind::Video) => "VIDEO",
    };

    let media: Vec<Value> = assets
        .iter()
        .map(|(asset, alt_text)| {
            let mut entry = serde_json::json!({
                "status": "READY",
                "media": asset,
            });
            if let Some(alt) = alt_text {
                entry["description"] = serde_json::json!({ "text": alt });
            }
            entry
        })
        .collect();

    serde_json::json!({
        "author": author,
        "lifecycleState": "PUBLISHED",
        "specificContent": {
            "com.linkedin.ugc.ShareContent": {
                "shareCommentary": { "text": text },
                "shareMediaCategory": category,
                "media": media,
            },
        },
        "visibility": {
            "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC",
        },
    })
}

fn update_url(post_urn: &str) -> String {
    format!("https://www.linkedin.com/feed/update/{}", post_urn)
}

async fn read_json(response: reqwest::Response) -> Result<Value, PlatformError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| map_transport_error(PlatformId::Linkedin, e))?;

    if !status.is_success() {
        return Err(map_status_error(PlatformId::Linkedin, status, &text));
    }

    serde_json::from_str(&text)
        .map_err(|e| PlatformError::Posting(format!("linkedin: unexpected response: {}", e)))
}
