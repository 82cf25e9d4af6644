//! End-to-end scheduler scenarios against an in-memory store and mock adapters

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use libomnicast::config::SchedulerConfig;
use libomnicast::platforms::mock::MockAdapter;
use libomnicast::platforms::PlatformRegistry;
use libomnicast::scheduler::Scheduler;
use libomnicast::store::{PostPatch, PostStore};
use libomnicast::types::{now_seconds, MediaFile, MediaMimeType, PlatformContent, PostContent};
use libomnicast::{PlatformAccount, PlatformId, Post, PostStatus};

async fn memory_store() -> PostStore {
    PostStore::new(":memory:").await.unwrap()
}

async fn connect_account(store: &PostStore, platform: PlatformId, name: &str) -> PlatformAccount {
    let account = PlatformAccount::new(platform, name.to_string(), "token".to_string());
    store.add_account(&account).await.unwrap();
    account
}

fn due_post(targets: Vec<String>, body: &str) -> Post {
    let mut post = Post::new(PostContent::Universal(body.to_string()), targets);
    post.status = PostStatus::Scheduled;
    post.scheduled_at = Some(now_seconds() - ChronoDuration::minutes(1));
    post
}

fn video_file() -> MediaFile {
    MediaFile {
        id: "vid".to_string(),
        file_path: "/tmp/clip.mp4".to_string(),
        mime: MediaMimeType::Mp4,
        file_size: 5_000_000,
        file_hash: "vhash".to_string(),
        alt_text: None,
        remote_url: Some("https://cdn.example/clip.mp4".to_string()),
    }
}

/// Text-only post with one compatible account publishes on the first tick
#[tokio::test]
async fn due_text_post_publishes_on_one_tick() {
    let store = memory_store().await;
    let account = connect_account(&store, PlatformId::Twitter, "tw").await;

    let adapter = MockAdapter::success(PlatformId::Twitter).shared();
    let mut registry = PlatformRegistry::new();
    registry.register(adapter.clone());

    let post = due_post(vec![account.id.clone()], "hello");
    store.add_post(&post).await.unwrap();

    let mut scheduler = Scheduler::new(store.clone(), registry, &SchedulerConfig::default());
    let reports = scheduler.tick().await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, PostStatus::Posted);

    let stored = store.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Posted);
    assert_eq!(stored.post_urls.len(), 1);
    assert!(stored.post_urls.contains_key(&account.id));
    assert_eq!(adapter.publish_calls(), 1);
}

/// A video post targeting Twitter and LinkedIn plus a remote-URL-less
/// Instagram account contacts only the accounts that can carry the media
#[tokio::test]
async fn incompatible_account_is_excluded_not_failed() {
    let store = memory_store().await;
    let twitter = connect_account(&store, PlatformId::Twitter, "tw").await;
    let instagram = connect_account(&store, PlatformId::Instagram, "ig").await;

    let tw_adapter = MockAdapter::success(PlatformId::Twitter).shared();
    let ig_adapter = MockAdapter::success(PlatformId::Instagram).shared();
    let mut registry = PlatformRegistry::new();
    registry.register(tw_adapter.clone());
    registry.register(ig_adapter.clone());

    let mut post = due_post(vec![twitter.id.clone(), instagram.id.clone()], "clip drop");
    let mut local_video = video_file();
    // No public URL means Instagram cannot ingest it
    local_video.remote_url = None;
    post.media = vec![local_video];
    store.add_post(&post).await.unwrap();

    let mut scheduler = Scheduler::new(store.clone(), registry, &SchedulerConfig::default());
    let reports = scheduler.tick().await.unwrap();

    assert_eq!(reports[0].status, PostStatus::Posted);
    assert_eq!(tw_adapter.publish_calls(), 1);
    assert_eq!(ig_adapter.publish_calls(), 0);

    let stored = store.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Posted);
    assert!(stored.post_urls.contains_key(&twitter.id));
}

/// When no target can carry the media, the post fails in the same tick with
/// zero adapter calls
#[tokio::test]
async fn zero_compatible_accounts_fails_without_network() {
    let store = memory_store().await;
    let youtube = connect_account(&store, PlatformId::Youtube, "yt").await;

    let adapter = MockAdapter::success(PlatformId::Youtube).shared();
    let mut registry = PlatformRegistry::new();
    registry.register(adapter.clone());

    // Text-only post; YouTube requires a video
    let post = due_post(vec![youtube.id.clone()], "no video here");
    store.add_post(&post).await.unwrap();

    let mut scheduler = Scheduler::new(store.clone(), registry, &SchedulerConfig::default());
    let reports = scheduler.tick().await.unwrap();

    assert_eq!(reports[0].status, PostStatus::Failed);
    assert_eq!(adapter.preflight_calls(), 0);
    assert_eq!(adapter.publish_calls(), 0);

    let stored = store.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Failed);
    assert!(stored.error.unwrap().contains("requires at least one media"));
    assert!(stored.post_urls.is_empty());
}

/// A single failing target leaves the post failed with a reason and no URLs
#[tokio::test]
async fn single_target_failure_records_error() {
    let store = memory_store().await;
    let account = connect_account(&store, PlatformId::Linkedin, "li").await;

    let adapter = MockAdapter::publish_failure(PlatformId::Linkedin, "asset rejected").shared();
    let mut registry = PlatformRegistry::new();
    registry.register(adapter.clone());

    let post = due_post(vec![account.id.clone()], "doomed");
    store.add_post(&post).await.unwrap();

    let mut scheduler = Scheduler::new(store.clone(), registry, &SchedulerConfig::default());
    let reports = scheduler.tick().await.unwrap();

    assert_eq!(reports[0].status, PostStatus::Failed);

    let stored = store.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Failed);
    assert!(stored.error.unwrap().contains("asset rejected"));
    assert!(stored.post_urls.is_empty());
    assert!(stored.posted_at.is_none());
}

/// Two posts due in the same tick both publish; a slow one does not block
/// the other
#[tokio::test]
async fn same_tick_posts_settle_independently() {
    let store = memory_store().await;
    let fast = connect_account(&store, PlatformId::Twitter, "fast").await;
    let slow = connect_account(&store, PlatformId::Linkedin, "slow").await;

    let fast_adapter = MockAdapter::success(PlatformId::Twitter).shared();
    let slow_adapter =
        MockAdapter::with_delay(PlatformId::Linkedin, Duration::from_millis(100)).shared();
    let mut registry = PlatformRegistry::new();
    registry.register(fast_adapter.clone());
    registry.register(slow_adapter.clone());

    let first = due_post(vec![fast.id.clone()], "quick one");
    let second = due_post(vec![slow.id.clone()], "slow one");
    store.add_post(&first).await.unwrap();
    store.add_post(&second).await.unwrap();

    let mut scheduler = Scheduler::new(store.clone(), registry, &SchedulerConfig::default());
    let started = std::time::Instant::now();
    let reports = scheduler.tick().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.status == PostStatus::Posted));
    // Concurrent dispatch: total time tracks the slowest post, not the sum
    assert!(elapsed < Duration::from_millis(250), "tick took {:?}", elapsed);

    for post in [&first, &second] {
        let stored = store.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PostStatus::Posted);
    }
}

/// The full lifecycle: schedule, dispatch, fail, reschedule, succeed
#[tokio::test]
async fn reschedule_after_failure_dispatches_again() {
    let store = memory_store().await;
    let account = connect_account(&store, PlatformId::Twitter, "tw").await;

    // Fails once with a transient error, then succeeds; no retries
    // configured, so recovery happens through rescheduling
    let adapter = MockAdapter::transient_failures(PlatformId::Twitter, 1).shared();
    let mut registry = PlatformRegistry::new();
    registry.register(adapter.clone());

    let post = due_post(vec![account.id.clone()], "eventually");
    store.add_post(&post).await.unwrap();

    let mut scheduler = Scheduler::new(store.clone(), registry, &SchedulerConfig::default());
    let reports = scheduler.tick().await.unwrap();
    assert_eq!(reports[0].status, PostStatus::Failed);

    // Subsequent ticks leave the failed post alone
    assert!(scheduler.tick().await.unwrap().is_empty());
    assert_eq!(adapter.publish_calls(), 1);

    let patch = PostPatch {
        status: Some(PostStatus::Scheduled),
        scheduled_at: Some(Some(now_seconds() - ChronoDuration::seconds(5))),
        error: Some(None),
        ..Default::default()
    };
    store.update_post(&post.id, patch).await.unwrap();

    let reports = scheduler.tick().await.unwrap();
    assert_eq!(reports[0].status, PostStatus::Posted);
    assert_eq!(adapter.publish_calls(), 2);

    let stored = store.get_post(&post.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PostStatus::Posted);
    assert!(stored.error.is_none());
}

/// Per-platform content reaches each adapter with its own body
#[tokio::test]
async fn per_platform_content_dispatched_per_account() {
    let store = memory_store().await;
    let twitter = connect_account(&store, PlatformId::Twitter, "tw").await;
    let facebook = connect_account(&store, PlatformId::Facebook, "fb").await;

    let tw_adapter = MockAdapter::success(PlatformId::Twitter).shared();
    let fb_adapter = MockAdapter::success(PlatformId::Facebook).shared();
    let mut registry = PlatformRegistry::new();
    registry.register(tw_adapter.clone());
    registry.register(fb_adapter.clone());

    let mut content = std::collections::BTreeMap::new();
    content.insert(PlatformId::Twitter, PlatformContent::text("tweet-sized"));
    content.insert(PlatformId::Facebook, PlatformContent::text("the long version"));

    let mut post = Post::new(
        PostContent::PerPlatform(content),
        vec![twitter.id.clone(), facebook.id.clone()],
    );
    post.status = PostStatus::Scheduled;
    post.scheduled_at = Some(now_seconds() - ChronoDuration::minutes(1));
    store.add_post(&post).await.unwrap();

    let mut scheduler = Scheduler::new(store.clone(), registry, &SchedulerConfig::default());
    let reports = scheduler.tick().await.unwrap();

    assert_eq!(reports[0].status, PostStatus::Posted);
    assert_eq!(tw_adapter.published()[0].body, "tweet-sized");
    assert_eq!(fb_adapter.published()[0].body, "the long version");
}

/// Running loop picks up a post scheduled after startup, then stops cleanly
#[tokio::test]
async fn running_loop_dispatches_and_shuts_down() {
    let store = memory_store().await;
    let account = connect_account(&store, PlatformId::Twitter, "tw").await;

    let adapter = MockAdapter::success(PlatformId::Twitter).shared();
    let mut registry = PlatformRegistry::new();
    registry.register(adapter.clone());

    let config = SchedulerConfig {
        poll_interval: 1,
        ..Default::default()
    };
    let handle = Scheduler::new(store.clone(), registry, &config).start();

    let post = due_post(vec![account.id.clone()], "picked up live");
    store.add_post(&post).await.unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    loop {
        let status = store.get_post(&post.id).await.unwrap().unwrap().status;
        if status == PostStatus::Posted {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "post never dispatched");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    handle.shutdown().await;
    assert_eq!(adapter.publish_calls(), 1);
}
