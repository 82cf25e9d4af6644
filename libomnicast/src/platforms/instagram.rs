//! Instagram adapter (Graph API container flow)
//!
//! Instagram ingests media from public URLs only: each attachment becomes a
//! media container, carousels wrap the children in a carousel container, and
//! a final `media_publish` call makes the post live. Media without a
//! `remote_url` is rejected by validation before this adapter runs.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::PlatformError;
use crate::platforms::{map_status_error, map_transport_error, PlatformAdapter, PublishedPost};
use crate::types::{MediaFile, MediaKind, PlatformAccount, PlatformContent, PlatformId};

pub struct InstagramAdapter {
    client: reqwest::Client,
    graph_base: String,
}

impl InstagramAdapter {
    pub fn new(client: reqwest::Client, graph_base: String) -> Self {
        Self { client, graph_base }
    }

    async fn graph_get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, PlatformError> {
        let response = self
            .client
            .get(format!("{}/{}", self.graph_base, path))
            .query(query)
            .send()
            .await
            .map_err(|e| map_transport_error(PlatformId::Instagram, e))?;

        read_json(response).await
    }

    async fn graph_post(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, PlatformError> {
        let response = self
            .client
            .post(format!("{}/{}", self.graph_base, path))
            .query(query)
            .send()
            .await
            .map_err(|e| map_transport_error(PlatformId::Instagram, e))?;

        read_json(response).await
    }

    /// Resolve the IG business account id behind the token's Page
    async fn business_account_id(&self, token: &str) -> Result<String, PlatformError> {
        let me = self
            .graph_get(
                "me",
                &[("fields", "instagram_business_account"), ("access_token", token)],
            )
            .await?;

        me.pointer("/instagram_business_account/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                PlatformError::Authentication(
                    "instagram: no business account is linked to this token's Page. \
                     Link an Instagram professional account to the Page and reconnect."
                        .to_string(),
                )
            })
    }

    /// Create a container for one attachment; carousel children omit the caption
    async fn create_container(
        &self,
        token: &str,
        ig_user: &str,
        file: &MediaFile,
        caption: Option<&str>,
        is_carousel_item: bool,
    ) -> Result<String, PlatformError> {
        let url = file.remote_url.as_deref().ok_or_else(|| {
            PlatformError::Upload("instagram: media has no public URL".to_string())
        })?;

        let mut query: Vec<(&str, &str)> = vec![("access_token", token)];
        match file.mime.kind() {
            MediaKind::Image => query.push(("image_url", url)),
            MediaKind::Video => {
                query.push(("video_url", url));
                query.push(("media_type", "REELS"));
            }
        }
        if is_carousel_item {
            query.push(("is_carousel_item", "true"));
        }
        if let Some(caption) = caption {
            query.push(("caption", caption));
        }

        let result = self
            .graph_post(&format!("{}/media", ig_user), &query)
            .await?;
        container_id(&result)
    }

    async fn publish_container(
        &self,
        token: &str,
        ig_user: &str,
        creation_id: &str,
    ) -> Result<String, PlatformError> {
        let result = self
            .graph_post(
                &format!("{}/media_publish", ig_user),
                &[("creation_id", creation_id), ("access_token", token)],
            )
            .await?;
        container_id(&result)
    }

    /// Public permalink for a published media id
    async fn permalink(&self, token: &str, media_id: &str) -> Option<String> {
        self.graph_get(media_id, &[("fields", "permalink"), ("access_token", token)])
            .await
            .ok()
            .and_then(|v| v.get("permalink").and_then(Value::as_str).map(str::to_string))
    }
}

#[async_trait]
impl PlatformAdapter for InstagramAdapter {
    fn id(&self) -> PlatformId {
        PlatformId::Instagram
    }

    async fn preflight(&self, account: &PlatformAccount) -> Result<(), PlatformError> {
        if account.access_token.is_empty() {
            return Err(PlatformError::Authentication(format!(
                "Account {} has no access token",
                account.account_name
            )));
        }
        self.business_account_id(&account.access_token).await?;
        Ok(())
    }

    async fn publish(
        &self,
        account: &PlatformAccount,
        content: &PlatformContent,
        media: &[MediaFile],
    ) -> Result<PublishedPost, PlatformError> {
        if media.is_empty() {
            return Err(PlatformError::Validation(
                "instagram: a post requires at least one media attachment".to_string(),
            ));
        }

        let token = &account.access_token;
        let ig_user = self.business_account_id(token).await?;

        let creation_id = if media.len() == 1 {
            self.create_container(token, &ig_user, &media[0], Some(content.body.as_str()), false)
                .await?
        } else {
            let mut children = Vec::with_capacity(media.len());
            for file in media {
                children.push(
                    self.create_container(token, &ig_user, file, None, true)
                        .await?,
                );
            }
            let children = children.join(",");
            let result = self
                .graph_post(
                    &format!("{}/media", ig_user),
                    &[
                        ("media_type", "CAROUSEL"),
                        ("children", children.as_str()),
                        ("caption", content.body.as_str()),
                        ("access_token", token),
                    ],
                )
                .await?;
            container_id(&result)?
        };

        let media_id = self.publish_container(token, &ig_user, &creation_id).await?;
        let url = self.permalink(token, &media_id).await;

        Ok(PublishedPost {
            platform_post_id: media_id,
            url,
        })
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, PlatformError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| map_transport_error(PlatformId::Instagram, e))?;

    if !status.is_success() {
        return Err(map_status_error(PlatformId::Instagram, status, &text));
    }

    serde_json::from_str(&text)
        .map_err(|e| PlatformError::Posting(format!("instagram: unexpected response: {}", e)))
}

fn container_id(value: &Value) -> Result<String, PlatformError> {
    value
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PlatformError::Posting("instagram: response carried no id".to_string()))
}
