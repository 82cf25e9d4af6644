//! The scheduling loop
//!
//! [`Scheduler`] scans the store for due posts on a fixed interval and hands
//! each one to the [`Dispatcher`](crate::poster::Dispatcher). A processed-id
//! set guards against double dispatch when a post's dispatch outlives the
//! poll interval; ids leave the set as soon as their post is no longer in
//! `scheduled` status, which keeps it bounded by the scheduled queue size
//! and lets a rescheduled post run again.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::SchedulerConfig;
use crate::error::{OmnicastError, Result};
use crate::platforms::PlatformRegistry;
use crate::poster::{settle_all, DispatchPolicy, DispatchReport, Dispatcher};
use crate::store::{PostPatch, PostStore};
use crate::types::PostStatus;

pub struct Scheduler {
    dispatcher: Dispatcher,
    poll_interval: Duration,
    processed: HashSet<String>,
}

/// Handle to a running scheduler loop
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for the in-flight tick to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

impl Scheduler {
    pub fn new(store: PostStore, registry: PlatformRegistry, config: &SchedulerConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(store, registry, DispatchPolicy::from_config(config)),
            poll_interval: Duration::from_secs(config.poll_interval),
            processed: HashSet::new(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run one scan: evict stale dedup entries, then dispatch every due post
    /// that has not been picked up already. Posts due in the same scan go
    /// out concurrently.
    pub async fn tick(&mut self) -> Result<Vec<DispatchReport>> {
        let scheduled = self.dispatcher.store().scheduled_ids().await?;
        self.processed.retain(|id| scheduled.contains(id));

        let due = self.dispatcher.store().due_scheduled(Utc::now()).await?;
        let due: Vec<_> = due
            .into_iter()
            .filter(|post| !self.processed.contains(&post.id))
            .collect();

        if due.is_empty() {
            return Ok(Vec::new());
        }
        debug!(count = due.len(), "Dispatching due posts");

        // Mark before any async work so an overlapping scan skips these
        for post in &due {
            self.processed.insert(post.id.clone());
        }

        let dispatcher = &self.dispatcher;
        let futures: Vec<_> = due
            .iter()
            .map(|post| async move {
                dispatcher
                    .dispatch(post)
                    .await
                    .map_err(|e| (post.id.clone(), e))
            })
            .collect();
        let (reports, errors) = settle_all(futures).await;

        for (post_id, e) in errors {
            error!(post_id = %post_id, error = %e, "Dispatch failed");
            self.mark_dispatch_error(&post_id, &e).await;
        }

        Ok(reports)
    }

    /// A dispatch that errored out after marking its post `posting` must not
    /// leave it there; the selection predicate would never pick it up again.
    async fn mark_dispatch_error(&self, post_id: &str, error: &OmnicastError) {
        let patch = PostPatch {
            status: Some(PostStatus::Failed),
            error: Some(Some(format!("Dispatch aborted: {}", error))),
            ..Default::default()
        };
        if let Err(e) = self.dispatcher.store().update_post(post_id, patch).await {
            error!(post_id, error = %e, "Could not mark errored post failed");
        }
    }

    /// Spawn the polling loop. The first scan runs immediately.
    pub fn start(mut self) -> SchedulerHandle {
        let (shutdown, mut rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!(
                poll_interval_secs = self.poll_interval.as_secs(),
                "Scheduler started"
            );
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.tick().await {
                            error!(error = %e, "Scheduler tick failed");
                        }
                    }
                    changed = rx.changed() => {
                        if changed.is_err() || *rx.borrow() {
                            info!("Scheduler stopping");
                            break;
                        }
                    }
                }
            }
        });

        SchedulerHandle { shutdown, task }
    }

    #[cfg(test)]
    fn processed_contains(&self, id: &str) -> bool {
        self.processed.contains(id)
    }

    #[cfg(test)]
    fn processed_len(&self) -> usize {
        self.processed.len()
    }
}
