//! Mock adapter for testing
//!
//! A configurable adapter that simulates successes, failures, and latency so
//! dispatch logic can be tested without credentials or network access.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::PlatformError;
use crate::platforms::{PlatformAdapter, PublishedPost};
use crate::types::{MediaFile, PlatformAccount, PlatformContent, PlatformId};

/// Behavior knobs for a [`MockAdapter`]
#[derive(Clone)]
pub struct MockBehavior {
    pub platform: PlatformId,
    /// Error returned from preflight, if any
    pub preflight_error: Option<PlatformError>,
    /// Error returned from publish, if any
    pub publish_error: Option<PlatformError>,
    /// Publish fails with `publish_error` this many times, then succeeds
    pub fail_first_n: Option<usize>,
    /// Simulated latency per call
    pub delay: Duration,
}

impl MockBehavior {
    pub fn new(platform: PlatformId) -> Self {
        Self {
            platform,
            preflight_error: None,
            publish_error: None,
            fail_first_n: None,
            delay: Duration::ZERO,
        }
    }
}

/// Record of one publish call, for assertions
#[derive(Debug, Clone)]
pub struct PublishCall {
    pub account_id: String,
    pub body: String,
    pub media_count: usize,
}

pub struct MockAdapter {
    behavior: MockBehavior,
    preflight_calls: AtomicUsize,
    publish_calls: AtomicUsize,
    published: Mutex<Vec<PublishCall>>,
}

impl MockAdapter {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            preflight_calls: AtomicUsize::new(0),
            publish_calls: AtomicUsize::new(0),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Adapter that always succeeds
    pub fn success(platform: PlatformId) -> Self {
        Self::new(MockBehavior::new(platform))
    }

    /// Adapter whose preflight rejects the account
    pub fn preflight_failure(platform: PlatformId, error: &str) -> Self {
        let mut behavior = MockBehavior::new(platform);
        behavior.preflight_error = Some(PlatformError::Authentication(error.to_string()));
        Self::new(behavior)
    }

    /// Adapter whose publish always fails
    pub fn publish_failure(platform: PlatformId, error: &str) -> Self {
        let mut behavior = MockBehavior::new(platform);
        behavior.publish_error = Some(PlatformError::Posting(error.to_string()));
        Self::new(behavior)
    }

    /// Adapter that fails `n` times with a transient error, then succeeds
    pub fn transient_failures(platform: PlatformId, n: usize) -> Self {
        let mut behavior = MockBehavior::new(platform);
        behavior.publish_error = Some(PlatformError::Network("connection reset".to_string()));
        behavior.fail_first_n = Some(n);
        Self::new(behavior)
    }

    /// Adapter that sleeps before completing each publish
    pub fn with_delay(platform: PlatformId, delay: Duration) -> Self {
        let mut behavior = MockBehavior::new(platform);
        behavior.delay = delay;
        Self::new(behavior)
    }

    pub fn preflight_calls(&self) -> usize {
        self.preflight_calls.load(Ordering::SeqCst)
    }

    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<PublishCall> {
        self.published.lock().unwrap().clone()
    }

    /// Shared handle for registering the same mock in a registry while
    /// keeping access to its counters from the test
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl PlatformAdapter for MockAdapter {
    fn id(&self) -> PlatformId {
        self.behavior.platform
    }

    async fn preflight(&self, account: &PlatformAccount) -> Result<(), PlatformError> {
        self.preflight_calls.fetch_add(1, Ordering::SeqCst);

        if account.access_token.is_empty() {
            return Err(PlatformError::Authentication(format!(
                "Account {} has no access token",
                account.account_name
            )));
        }
        if let Some(err) = &self.behavior.preflight_error {
            return Err(err.clone());
        }
        Ok(())
    }

    async fn publish(
        &self,
        account: &PlatformAccount,
        content: &PlatformContent,
        media: &[MediaFile],
    ) -> Result<PublishedPost, PlatformError> {
        let call_index = self.publish_calls.fetch_add(1, Ordering::SeqCst);

        if !self.behavior.delay.is_zero() {
            sleep(self.behavior.delay).await;
        }

        if let Some(err) = &self.behavior.publish_error {
            let still_failing = match self.behavior.fail_first_n {
                Some(n) => call_index < n,
                None => true,
            };
            if still_failing {
                return Err(err.clone());
            }
        }

        self.published.lock().unwrap().push(PublishCall {
            account_id: account.id.clone(),
            body: content.body.clone(),
            media_count: media.len(),
        });

        let post_id = format!("mock-{}", uuid::Uuid::new_v4());
        Ok(PublishedPost {
            url: Some(format!(
                "https://{}.example/{}/{}",
                self.behavior.platform, account.account_name, post_id
            )),
            platform_post_id: post_id,
        })
    }
}
