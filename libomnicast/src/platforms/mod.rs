//! Platform adapters and the adapter registry
//!
//! Each supported platform implements [`PlatformAdapter`]. Dispatch code
//! looks adapters up in a [`PlatformRegistry`] keyed by platform id, so
//! adding a platform means registering one more adapter rather than
//! touching every call site.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::{OmnicastError, PlatformError, Result};
use crate::types::{MediaFile, PlatformAccount, PlatformContent, PlatformId};
use crate::validation::{constraints_for, MediaConstraints};

pub mod facebook;
pub mod instagram;
pub mod linkedin;
pub mod twitter;
pub mod youtube;

// Mock adapter is available for all builds to support integration tests
pub mod mock;

/// Outcome of a successful publish on one account
#[derive(Debug, Clone)]
pub struct PublishedPost {
    /// Platform-assigned id for the created post
    pub platform_post_id: String,
    /// Public URL of the created post, when the platform exposes one
    pub url: Option<String>,
}

/// One platform's publish implementation
///
/// Adapters are stateless beyond their HTTP client and API endpoints;
/// per-account credentials arrive with each call.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Platform this adapter publishes to
    fn id(&self) -> PlatformId;

    /// Attachment limits for this platform
    fn constraints(&self) -> MediaConstraints {
        constraints_for(self.id())
    }

    /// Cheap credential check before a publish attempt.
    ///
    /// The default accepts any account with a non-empty token. Adapters
    /// override this when a token can be well-formed but still wrong for
    /// the operation, and should return an actionable message in that case.
    async fn preflight(&self, account: &PlatformAccount) -> std::result::Result<(), PlatformError> {
        if account.access_token.is_empty() {
            return Err(PlatformError::Authentication(format!(
                "Account {} has no access token",
                account.account_name
            )));
        }
        Ok(())
    }

    /// Publish content and media on the given account
    async fn publish(
        &self,
        account: &PlatformAccount,
        content: &PlatformContent,
        media: &[MediaFile],
    ) -> std::result::Result<PublishedPost, PlatformError>;
}

/// Adapter lookup table keyed by platform id
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    adapters: HashMap<PlatformId, Arc<dyn PlatformAdapter>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one for the same platform
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.id(), adapter);
    }

    pub fn get(&self, id: PlatformId) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&id).cloned()
    }

    /// Platforms with a registered adapter
    pub fn platforms(&self) -> Vec<PlatformId> {
        let mut ids: Vec<PlatformId> = self.adapters.keys().copied().collect();
        ids.sort_by_key(|id| id.as_str());
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Build a registry with an adapter for each enabled platform in the config
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.scheduler.dispatch_timeout))
            .build()
            .map_err(|e| {
                OmnicastError::Platform(PlatformError::Network(format!(
                    "Failed to build HTTP client: {}",
                    e
                )))
            })?;

        let mut registry = Self::new();

        if let Some(fb) = &config.facebook {
            if fb.enabled {
                registry.register(Arc::new(facebook::FacebookAdapter::new(
                    client.clone(),
                    fb.graph_base.clone(),
                )));
            }
        }
        if let Some(ig) = &config.instagram {
            if ig.enabled {
                registry.register(Arc::new(instagram::InstagramAdapter::new(
                    client.clone(),
                    ig.graph_base.clone(),
                )));
            }
        }
        if let Some(yt) = &config.youtube {
            if yt.enabled {
                registry.register(Arc::new(youtube::YoutubeAdapter::new(
                    client.clone(),
                    yt.upload_base.clone(),
                )));
            }
        }
        if let Some(tw) = &config.twitter {
            if tw.enabled {
                registry.register(Arc::new(twitter::TwitterAdapter::new(
                    client.clone(),
                    tw.api_base.clone(),
                    tw.upload_base.clone(),
                )));
            }
        }
        if let Some(li) = &config.linkedin {
            if li.enabled {
                registry.register(Arc::new(linkedin::LinkedinAdapter::new(
                    client.clone(),
                    li.api_base.clone(),
                )));
            }
        }

        Ok(registry)
    }
}

/// Translate a reqwest transport error into a platform error
pub(crate) fn map_transport_error(platform: PlatformId, e: reqwest::Error) -> PlatformError {
    if e.is_timeout() || e.is_connect() {
        PlatformError::Network(format!("{}: {}", platform, e))
    } else {
        PlatformError::Posting(format!("{}: {}", platform, e))
    }
}

/// Translate a non-success HTTP status plus response body into a platform error
pub(crate) fn map_status_error(
    platform: PlatformId,
    status: reqwest::StatusCode,
    body: &str,
) -> PlatformError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, truncate_body(body))
    };

    match status.as_u16() {
        401 | 403 => PlatformError::Authentication(format!("{}: {}", platform, detail)),
        429 => PlatformError::RateLimit(format!("{}: {}", platform, detail)),
        500..=599 => PlatformError::Network(format!("{}: {}", platform, detail)),
        _ => PlatformError::Posting(format!("{}: {}", platform, detail)),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 300;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}
