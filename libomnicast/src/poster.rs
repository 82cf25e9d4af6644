//! Post dispatch across platform accounts
//!
//! [`Dispatcher`] takes one due post and fans it out to its target accounts
//! concurrently. Accounts whose platform cannot carry the post's media are
//! excluded up front, without a network call, and do not count against the
//! outcome; if no account survives the filter the post fails immediately.
//! A post ends `Posted` only when every contacted account succeeded; any
//! failure leaves it `Failed` with the reasons joined into its error field,
//! while successful accounts keep their recorded URLs.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::{PlatformAdapter, PlatformRegistry};
use crate::store::{PostPatch, PostStore};
use crate::types::{
    now_seconds, AccountResult, MediaFile, PlatformAccount, PlatformContent, Post, PostStatus,
};
use crate::validation::validate_media;

/// Timeout and retry policy for one account's publish attempt
#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    pub timeout: Duration,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
    /// Base backoff delay, doubled after each attempt
    pub retry_delay: Duration,
}

impl DispatchPolicy {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.dispatch_timeout),
            max_retries: config.max_retries,
            retry_delay: Duration::from_secs(config.retry_delay),
        }
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

/// Outcome of dispatching one post
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub post_id: String,
    pub status: PostStatus,
    pub results: Vec<AccountResult>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Whether a failed attempt is worth retrying
pub fn is_transient_error(error: &PlatformError) -> bool {
    matches!(
        error,
        PlatformError::Network(_) | PlatformError::RateLimit(_)
    )
}

/// Await every future and split the outcomes into successes and failures
pub async fn settle_all<T, E, F>(futures: Vec<F>) -> (Vec<T>, Vec<E>)
where
    F: Future<Output = std::result::Result<T, E>>,
{
    let mut oks = Vec::new();
    let mut errs = Vec::new();
    for result in join_all(futures).await {
        match result {
            Ok(value) => oks.push(value),
            Err(error) => errs.push(error),
        }
    }
    (oks, errs)
}

#[derive(Clone)]
pub struct Dispatcher {
    store: PostStore,
    registry: PlatformRegistry,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(store: PostStore, registry: PlatformRegistry, policy: DispatchPolicy) -> Self {
        Self {
            store,
            registry,
            policy,
        }
    }

    pub fn store(&self) -> &PostStore {
        &self.store
    }

    /// Publish a post on all of its target accounts and persist the outcome
    pub async fn dispatch(&self, post: &Post) -> Result<DispatchReport> {
        info!(post_id = %post.id, targets = post.targets.len(), "Dispatching post");

        self.store
            .update_post(&post.id, PostPatch::status(PostStatus::Posting))
            .await?;

        if post.targets.is_empty() {
            return self
                .finalize(
                    &post.id,
                    Vec::new(),
                    Some("Post has no target accounts".to_string()),
                )
                .await;
        }

        let mut unresolved = Vec::new();
        let mut accounts = Vec::new();
        for account_id in &post.targets {
            match self.store.get_account(account_id).await {
                Ok(Some(account)) => accounts.push(account),
                Ok(None) => unresolved.push(format!("{}: account not found", account_id)),
                Err(e) => {
                    unresolved.push(format!("{}: failed to load account: {}", account_id, e))
                }
            }
        }

        // Incompatible accounts are dropped here, before any network traffic,
        // and do not count against the post's outcome
        let mut excluded = Vec::new();
        let mut compatible = Vec::new();
        for account in accounts {
            match validate_media(account.platform, &post.media) {
                Ok(()) => compatible.push(account),
                Err(reason) => {
                    debug!(
                        account = %account.account_name,
                        %reason,
                        "Excluding incompatible account"
                    );
                    excluded.push(format!(
                        "{} ({}): {}",
                        account.account_name, account.platform, reason
                    ));
                }
            }
        }

        if compatible.is_empty() {
            let mut reasons = unresolved;
            reasons.extend(excluded);
            return self
                .finalize(
                    &post.id,
                    Vec::new(),
                    Some(format!("No dispatchable accounts: {}", reasons.join("; "))),
                )
                .await;
        }

        let futures: Vec<_> = compatible
            .iter()
            .map(|account| self.dispatch_account(post, account))
            .collect();
        let results = join_all(futures).await;

        // A failed result write must not stop the post from being finalized
        for result in &results {
            if let Err(e) = self.store.record_account_result(&post.id, result).await {
                warn!(post_id = %post.id, error = %e, "Failed to record account result");
            }
        }

        let mut failures: Vec<String> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| {
                format!(
                    "{} ({}): {}",
                    r.account_id,
                    r.platform,
                    r.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();
        failures.extend(unresolved);

        let error = if failures.is_empty() {
            None
        } else {
            Some(failures.join("; "))
        };

        self.finalize(&post.id, results, error).await
    }

    async fn finalize(
        &self,
        post_id: &str,
        results: Vec<AccountResult>,
        error: Option<String>,
    ) -> Result<DispatchReport> {
        let status = if error.is_none() {
            PostStatus::Posted
        } else {
            PostStatus::Failed
        };

        let patch = PostPatch {
            status: Some(status),
            error: Some(error.clone()),
            posted_at: Some(if status == PostStatus::Posted {
                Some(now_seconds())
            } else {
                None
            }),
            ..Default::default()
        };
        self.store.update_post(post_id, patch).await?;

        match status {
            PostStatus::Posted => {
                info!(post_id, accounts = results.len(), "Post published")
            }
            _ => warn!(post_id, error = error.as_deref(), "Post failed"),
        }

        Ok(DispatchReport {
            post_id: post_id.to_string(),
            status,
            results,
        })
    }

    /// One account's attempt. Never returns an error; every outcome becomes
    /// an [`AccountResult`] so one bad account cannot sink its siblings.
    async fn dispatch_account(&self, post: &Post, account: &PlatformAccount) -> AccountResult {
        if !account.connected {
            return AccountResult::failure(account, "Account is disconnected".to_string());
        }

        let content = post.content.resolve(account.platform);
        if content.body.trim().is_empty() && post.media.is_empty() {
            return AccountResult::failure(
                account,
                format!("No content for {}", account.platform),
            );
        }

        let Some(adapter) = self.registry.get(account.platform) else {
            return AccountResult::failure(
                account,
                format!("No adapter registered for {}", account.platform),
            );
        };

        if let Err(e) = adapter.preflight(account).await {
            return AccountResult::failure(account, e.to_string());
        }

        match self
            .publish_with_retry(adapter.as_ref(), account, &content, &post.media)
            .await
        {
            Ok(published) => AccountResult {
                account_id: account.id.clone(),
                platform: account.platform,
                success: true,
                post_url: published.url,
                platform_post_id: Some(published.platform_post_id),
                error: None,
            },
            Err(e) => AccountResult::failure(account, e.to_string()),
        }
    }

    async fn publish_with_retry(
        &self,
        adapter: &dyn PlatformAdapter,
        account: &PlatformAccount,
        content: &PlatformContent,
        media: &[MediaFile],
    ) -> std::result::Result<crate::platforms::PublishedPost, PlatformError> {
        let mut delay = self.policy.retry_delay;
        let mut attempt = 0u32;

        loop {
            let result = tokio::time::timeout(self.policy.timeout, adapter.publish(account, content, media))
                .await
                .unwrap_or_else(|_| {
                    Err(PlatformError::Network(format!(
                        "{}: publish timed out after {:?}",
                        account.platform, self.policy.timeout
                    )))
                });

            match result {
                Ok(published) => return Ok(published),
                Err(e) if attempt < self.policy.max_retries && is_transient_error(&e) => {
                    warn!(
                        account = %account.account_name,
                        attempt = attempt + 1,
                        error = %e,
                        "Transient publish failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::mock::MockAdapter;
    use crate::types::{MediaMimeType, PlatformContent, PlatformId, PostContent};
    use std::sync::Arc;

    async fn store() -> PostStore {
        PostStore::new(":memory:").await.unwrap()
    }

    async fn add_account(store: &PostStore, platform: PlatformId, name: &str) -> PlatformAccount {
        let account = PlatformAccount::new(platform, name.to_string(), "token".to_string());
        store.add_account(&account).await.unwrap();
        account
    }

    fn text_post(targets: Vec<String>) -> Post {
        Post::new(PostContent::Universal("Hello world".to_string()), targets)
    }

    fn image_file() -> MediaFile {
        MediaFile {
            id: "img".to_string(),
            file_path: "/tmp/img.jpg".to_string(),
            mime: MediaMimeType::Jpeg,
            file_size: 100,
            file_hash: "h".to_string(),
            alt_text: None,
            remote_url: Some("https://cdn.example/img.jpg".to_string()),
        }
    }

    #[tokio::test]
    async fn test_dispatch_all_accounts_succeed() {
        let store = store().await;
        let twitter = add_account(&store, PlatformId::Twitter, "tw").await;
        let linkedin = add_account(&store, PlatformId::Linkedin, "li").await;

        let mut registry = PlatformRegistry::new();
        registry.register(Arc::new(MockAdapter::success(PlatformId::Twitter)));
        registry.register(Arc::new(MockAdapter::success(PlatformId::Linkedin)));

        let post = text_post(vec![twitter.id.clone(), linkedin.id.clone()]);
        store.add_post(&post).await.unwrap();

        let dispatcher = Dispatcher::new(store.clone(), registry, DispatchPolicy::default());
        let report = dispatcher.dispatch(&post).await.unwrap();

        assert_eq!(report.status, PostStatus::Posted);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 0);

        let stored = store.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Posted);
        assert!(stored.posted_at.is_some());
        assert!(stored.error.is_none());
        assert_eq!(stored.post_urls.len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_partial_failure_marks_failed_keeps_urls() {
        let store = store().await;
        let ok = add_account(&store, PlatformId::Twitter, "tw").await;
        let bad = add_account(&store, PlatformId::Linkedin, "li").await;

        let mut registry = PlatformRegistry::new();
        registry.register(Arc::new(MockAdapter::success(PlatformId::Twitter)));
        registry.register(Arc::new(MockAdapter::publish_failure(
            PlatformId::Linkedin,
            "server said no",
        )));

        let post = text_post(vec![ok.id.clone(), bad.id.clone()]);
        store.add_post(&post).await.unwrap();

        let dispatcher = Dispatcher::new(store.clone(), registry, DispatchPolicy::default());
        let report = dispatcher.dispatch(&post).await.unwrap();

        assert_eq!(report.status, PostStatus::Failed);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);

        let stored = store.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Failed);
        assert!(stored.posted_at.is_none());
        let error = stored.error.unwrap();
        assert!(error.contains("server said no"));
        assert!(error.contains(&bad.id));
        // The successful account's URL survives the overall failure
        assert!(stored.post_urls.contains_key(&ok.id));
    }

    #[tokio::test]
    async fn test_incompatible_media_fails_without_network_call() {
        let store = store().await;
        let youtube = add_account(&store, PlatformId::Youtube, "yt").await;

        let adapter = MockAdapter::success(PlatformId::Youtube).shared();
        let mut registry = PlatformRegistry::new();
        registry.register(adapter.clone());

        // An image post can never go to YouTube
        let mut post = text_post(vec![youtube.id.clone()]);
        post.media = vec![image_file()];
        store.add_post(&post).await.unwrap();

        let dispatcher = Dispatcher::new(store.clone(), registry, DispatchPolicy::default());
        let report = dispatcher.dispatch(&post).await.unwrap();

        assert_eq!(report.status, PostStatus::Failed);
        assert!(report.results.is_empty());
        assert_eq!(adapter.preflight_calls(), 0);
        assert_eq!(adapter.publish_calls(), 0);

        let stored = store.get_post(&post.id).await.unwrap().unwrap();
        assert!(stored.error.unwrap().contains("does not support"));
    }

    #[tokio::test]
    async fn test_mixed_compatibility_calls_only_compatible_account() {
        let store = store().await;
        let twitter = add_account(&store, PlatformId::Twitter, "tw").await;
        let youtube = add_account(&store, PlatformId::Youtube, "yt").await;

        let tw_adapter = MockAdapter::success(PlatformId::Twitter).shared();
        let yt_adapter = MockAdapter::success(PlatformId::Youtube).shared();
        let mut registry = PlatformRegistry::new();
        registry.register(tw_adapter.clone());
        registry.register(yt_adapter.clone());

        let mut post = text_post(vec![twitter.id.clone(), youtube.id.clone()]);
        post.media = vec![image_file()];
        store.add_post(&post).await.unwrap();

        let dispatcher = Dispatcher::new(store.clone(), registry, DispatchPolicy::default());
        let report = dispatcher.dispatch(&post).await.unwrap();

        // The excluded account does not count as a failure
        assert_eq!(report.status, PostStatus::Posted);
        assert_eq!(report.results.len(), 1);
        assert_eq!(tw_adapter.publish_calls(), 1);
        assert_eq!(yt_adapter.publish_calls(), 0);

        let stored = store.get_post(&post.id).await.unwrap().unwrap();
        assert!(stored.post_urls.contains_key(&twitter.id));
        assert!(!stored.post_urls.contains_key(&youtube.id));
    }

    #[tokio::test]
    async fn test_disconnected_account_fails_locally() {
        let store = store().await;
        let account = add_account(&store, PlatformId::Twitter, "tw").await;
        store
            .set_account_connected(&account.id, false)
            .await
            .unwrap();

        let adapter = MockAdapter::success(PlatformId::Twitter).shared();
        let mut registry = PlatformRegistry::new();
        registry.register(adapter.clone());

        let post = text_post(vec![account.id.clone()]);
        store.add_post(&post).await.unwrap();

        let dispatcher = Dispatcher::new(store.clone(), registry, DispatchPolicy::default());
        let report = dispatcher.dispatch(&post).await.unwrap();

        assert_eq!(report.status, PostStatus::Failed);
        assert_eq!(adapter.publish_calls(), 0);
        assert!(report.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("disconnected"));
    }

    #[tokio::test]
    async fn test_missing_adapter_reported_per_account() {
        let store = store().await;
        let account = add_account(&store, PlatformId::Twitter, "tw").await;

        let post = text_post(vec![account.id.clone()]);
        store.add_post(&post).await.unwrap();

        let dispatcher =
            Dispatcher::new(store.clone(), PlatformRegistry::new(), DispatchPolicy::default());
        let report = dispatcher.dispatch(&post).await.unwrap();

        assert_eq!(report.status, PostStatus::Failed);
        assert!(report.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("No adapter registered"));
    }

    #[tokio::test]
    async fn test_no_targets_fails_immediately() {
        let store = store().await;
        let post = text_post(vec![]);
        store.add_post(&post).await.unwrap();

        let dispatcher =
            Dispatcher::new(store.clone(), PlatformRegistry::new(), DispatchPolicy::default());
        let report = dispatcher.dispatch(&post).await.unwrap();

        assert_eq!(report.status, PostStatus::Failed);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_target_account_reported_in_error() {
        let store = store().await;
        let post = text_post(vec!["ghost-account".to_string()]);
        store.add_post(&post).await.unwrap();

        let dispatcher =
            Dispatcher::new(store.clone(), PlatformRegistry::new(), DispatchPolicy::default());
        let report = dispatcher.dispatch(&post).await.unwrap();

        assert_eq!(report.status, PostStatus::Failed);
        assert!(report.results.is_empty());

        let stored = store.get_post(&post.id).await.unwrap().unwrap();
        let error = stored.error.unwrap();
        assert!(error.contains("ghost-account"));
        assert!(error.contains("account not found"));
    }

    #[tokio::test]
    async fn test_post_deleted_mid_flight_still_reaches_finalize() {
        use crate::error::{OmnicastError, StoreError};

        let store = store().await;
        let account = add_account(&store, PlatformId::Twitter, "tw").await;

        let adapter =
            MockAdapter::with_delay(PlatformId::Twitter, Duration::from_millis(150)).shared();
        let mut registry = PlatformRegistry::new();
        registry.register(adapter.clone());

        let post = text_post(vec![account.id.clone()]);
        store.add_post(&post).await.unwrap();

        let dispatcher = Dispatcher::new(store.clone(), registry, DispatchPolicy::default());
        let task = {
            let dispatcher = dispatcher.clone();
            let post = post.clone();
            tokio::spawn(async move { dispatcher.dispatch(&post).await })
        };

        tokio::time::sleep(Duration::from_millis(40)).await;
        store.delete_post(&post.id).await.unwrap();

        // The publish itself completed; recording its result hit the gone
        // row and was skipped, so the error surfaces from finalize
        let result = task.await.unwrap();
        assert_eq!(adapter.publish_calls(), 1);
        assert!(matches!(
            result,
            Err(OmnicastError::Store(StoreError::UnknownPost(_)))
        ));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let store = store().await;
        let account = add_account(&store, PlatformId::Twitter, "tw").await;

        let adapter = MockAdapter::transient_failures(PlatformId::Twitter, 2).shared();
        let mut registry = PlatformRegistry::new();
        registry.register(adapter.clone());

        let post = text_post(vec![account.id.clone()]);
        store.add_post(&post).await.unwrap();

        let policy = DispatchPolicy {
            timeout: Duration::from_secs(5),
            max_retries: 2,
            retry_delay: Duration::from_millis(1),
        };
        let dispatcher = Dispatcher::new(store.clone(), registry, policy);
        let report = dispatcher.dispatch(&post).await.unwrap();

        assert_eq!(report.status, PostStatus::Posted);
        assert_eq!(adapter.publish_calls(), 3);
    }

    #[tokio::test]
    async fn test_no_retry_for_permanent_failure() {
        let store = store().await;
        let account = add_account(&store, PlatformId::Twitter, "tw").await;

        let adapter = MockAdapter::publish_failure(PlatformId::Twitter, "bad request").shared();
        let mut registry = PlatformRegistry::new();
        registry.register(adapter.clone());

        let post = text_post(vec![account.id.clone()]);
        store.add_post(&post).await.unwrap();

        let policy = DispatchPolicy {
            timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_delay: Duration::from_millis(1),
        };
        let dispatcher = Dispatcher::new(store.clone(), registry, policy);
        let report = dispatcher.dispatch(&post).await.unwrap();

        assert_eq!(report.status, PostStatus::Failed);
        assert_eq!(adapter.publish_calls(), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let store = store().await;
        let account = add_account(&store, PlatformId::Twitter, "tw").await;

        let adapter =
            MockAdapter::with_delay(PlatformId::Twitter, Duration::from_millis(200)).shared();
        let mut registry = PlatformRegistry::new();
        registry.register(adapter.clone());

        let post = text_post(vec![account.id.clone()]);
        store.add_post(&post).await.unwrap();

        let policy = DispatchPolicy {
            timeout: Duration::from_millis(20),
            max_retries: 0,
            retry_delay: Duration::from_millis(1),
        };
        let dispatcher = Dispatcher::new(store.clone(), registry, policy);
        let report = dispatcher.dispatch(&post).await.unwrap();

        assert_eq!(report.status, PostStatus::Failed);
        assert!(report.results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_per_platform_content_resolution() {
        let store = store().await;
        let twitter = add_account(&store, PlatformId::Twitter, "tw").await;
        let linkedin = add_account(&store, PlatformId::Linkedin, "li").await;

        let tw_adapter = MockAdapter::success(PlatformId::Twitter).shared();
        let li_adapter = MockAdapter::success(PlatformId::Linkedin).shared();
        let mut registry = PlatformRegistry::new();
        registry.register(tw_adapter.clone());
        registry.register(li_adapter.clone());

        let mut map = std::collections::BTreeMap::new();
        map.insert(PlatformId::Twitter, PlatformContent::text("short take"));
        map.insert(PlatformId::Linkedin, PlatformContent::text("long form thoughts"));
        let post = Post::new(
            PostContent::PerPlatform(map),
            vec![twitter.id.clone(), linkedin.id.clone()],
        );
        store.add_post(&post).await.unwrap();

        let dispatcher = Dispatcher::new(store.clone(), registry, DispatchPolicy::default());
        let report = dispatcher.dispatch(&post).await.unwrap();

        assert_eq!(report.status, PostStatus::Posted);
        assert_eq!(tw_adapter.published()[0].body, "short take");
        assert_eq!(li_adapter.published()[0].body, "long form thoughts");
    }

    #[tokio::test]
    async fn test_settle_all_partitions() {
        let futures: Vec<_> = (0..5)
            .map(|i| async move {
                if i % 2 == 0 {
                    Ok::<_, String>(i)
                } else {
                    Err(format!("odd {}", i))
                }
            })
            .collect();

        let (oks, errs) = settle_all(futures).await;
        assert_eq!(oks, vec![0, 2, 4]);
        assert_eq!(errs, vec!["odd 1".to_string(), "odd 3".to_string()]);
    }

    #[test]
    fn test_is_transient_error() {
        assert!(is_transient_error(&PlatformError::Network("x".into())));
        assert!(is_transient_error(&PlatformError::RateLimit("x".into())));
        assert!(!is_transient_error(&PlatformError::Authentication("x".into())));
        assert!(!is_transient_error(&PlatformError::Posting("x".into())));
        assert!(!is_transient_error(&PlatformError::Validation("x".into())));
    }
}
