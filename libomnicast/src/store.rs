//! Persistent post and account store for Omnicast
//!
//! Posts, their media attachments, target account references, and per-account
//! publish results round-trip through SQLite on every mutation. Timestamps
//! are stored as Unix seconds and rehydrated to `DateTime<Utc>` on load.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::error::{Result, StoreError};
use crate::types::{
    AccountResult, MediaFile, MediaMimeType, PlatformAccount, PlatformId, Post, PostContent,
    PostStatus, ProfileInfo,
};

/// Partial update for a post; only the fields that are `Some` are applied.
///
/// Double-`Option` fields distinguish "leave unchanged" (`None`) from
/// "set to NULL" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub content: Option<PostContent>,
    pub media: Option<Vec<MediaFile>>,
    pub targets: Option<Vec<String>>,
    pub scheduled_at: Option<Option<DateTime<Utc>>>,
    pub status: Option<PostStatus>,
    pub error: Option<Option<String>>,
    pub posted_at: Option<Option<DateTime<Utc>>>,
}

impl PostPatch {
    pub fn status(status: PostStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
pub struct PostStore {
    pool: SqlitePool,
}

impl PostStore {
    /// Open (or create) the store at the given path and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();

        if expanded_path != ":memory:" {
            let path = Path::new(&expanded_path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(StoreError::IoError)?;
            }
        }

        // mode=rwc creates the database file if it does not exist
        let db_url = if expanded_path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"))
        };

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .map_err(StoreError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(StoreError::MigrationError)?;

        Ok(Self { pool })
    }

    // ========================================================================
    // Posts
    // ========================================================================

    /// Insert a new post with its media and target references
    pub async fn add_post(&self, post: &Post) -> Result<()> {
        let content_json =
            serde_json::to_string(&post.content).map_err(|e| StoreError::IoError(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, content, status, scheduled_at, error, created_at, posted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&content_json)
        .bind(post.status.as_str())
        .bind(post.scheduled_at.map(|t| t.timestamp()))
        .bind(&post.error)
        .bind(post.created_at.timestamp())
        .bind(post.posted_at.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        self.replace_media(&post.id, &post.media).await?;
        self.replace_targets(&post.id, &post.targets).await?;

        Ok(())
    }

    /// Get a post by id, with media, targets, and post URLs rehydrated
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, content, status, scheduled_at, error, created_at, posted_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(self.hydrate_post(&row).await?))
    }

    /// Apply a shallow merge onto an existing post.
    ///
    /// Unknown ids are a reported error, not a silent no-op.
    pub async fn update_post(&self, post_id: &str, patch: PostPatch) -> Result<Post> {
        let mut post = self
            .get_post(post_id)
            .await?
            .ok_or_else(|| StoreError::UnknownPost(post_id.to_string()))?;

        if let Some(content) = patch.content {
            post.content = content;
        }
        if let Some(scheduled_at) = patch.scheduled_at {
            post.scheduled_at = scheduled_at;
        }
        if let Some(status) = patch.status {
            post.status = status;
        }
        if let Some(error) = patch.error {
            post.error = error;
        }
        if let Some(posted_at) = patch.posted_at {
            post.posted_at = posted_at;
        }

        let content_json =
            serde_json::to_string(&post.content).map_err(|e| StoreError::IoError(e.into()))?;

        sqlx::query(
            r#"
            UPDATE posts
            SET content = ?, status = ?, scheduled_at = ?, error = ?, posted_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&content_json)
        .bind(post.status.as_str())
        .bind(post.scheduled_at.map(|t| t.timestamp()))
        .bind(&post.error)
        .bind(post.posted_at.map(|t| t.timestamp()))
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        if let Some(media) = patch.media {
            self.replace_media(post_id, &media).await?;
            post.media = media;
        }
        if let Some(targets) = patch.targets {
            self.replace_targets(post_id, &targets).await?;
            post.targets = targets;
        }

        Ok(post)
    }

    /// Delete a post and its dependent rows
    pub async fn delete_post(&self, post_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UnknownPost(post_id.to_string()).into());
        }

        Ok(())
    }

    /// List posts, optionally filtered by status, newest first
    pub async fn list_posts(&self, status: Option<PostStatus>, limit: usize) -> Result<Vec<Post>> {
        let rows = if let Some(status) = status {
            sqlx::query(
                r#"
                SELECT id, content, status, scheduled_at, error, created_at, posted_at
                FROM posts WHERE status = ?
                ORDER BY created_at DESC LIMIT ?
                "#,
            )
            .bind(status.as_str())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query(
                r#"
                SELECT id, content, status, scheduled_at, error, created_at, posted_at
                FROM posts
                ORDER BY created_at DESC LIMIT ?
                "#,
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(StoreError::SqlxError)?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in &rows {
            posts.push(self.hydrate_post(row).await?);
        }
        Ok(posts)
    }

    /// Scheduled posts whose scheduled time is at or before `now`
    pub async fn due_scheduled(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            r#"
            SELECT id, content, status, scheduled_at, error, created_at, posted_at
            FROM posts
            WHERE status = 'scheduled' AND scheduled_at IS NOT NULL AND scheduled_at <= ?
            ORDER BY scheduled_at ASC
            "#,
        )
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in &rows {
            posts.push(self.hydrate_post(row).await?);
        }
        Ok(posts)
    }

    /// Ids of every post currently in `scheduled` status
    pub async fn scheduled_ids(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT id FROM posts WHERE status = 'scheduled'")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    /// Record the outcome of one account's publish attempt
    pub async fn record_account_result(
        &self,
        post_id: &str,
        result: &AccountResult,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO account_results
                (post_id, account_id, platform, success, post_url, platform_post_id,
                 error_message, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post_id)
        .bind(&result.account_id)
        .bind(result.platform.as_str())
        .bind(if result.success { 1 } else { 0 })
        .bind(&result.post_url)
        .bind(&result.platform_post_id)
        .bind(&result.error)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    /// All recorded account results for a post, newest first
    pub async fn get_account_results(&self, post_id: &str) -> Result<Vec<AccountResult>> {
        let rows = sqlx::query(
            r#"
            SELECT account_id, platform, success, post_url, platform_post_id, error_message
            FROM account_results
            WHERE post_id = ?
            ORDER BY recorded_at DESC, id DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| AccountResult {
                account_id: r.get("account_id"),
                platform: PostStoreRow::platform(r),
                success: r.get::<i64, _>("success") != 0,
                post_url: r.get("post_url"),
                platform_post_id: r.get("platform_post_id"),
                error: r.get("error_message"),
            })
            .collect())
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    pub async fn add_account(&self, account: &PlatformAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts
                (id, platform, account_name, display_name, username, avatar_url,
                 verified, follower_count, connected, access_token)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(account.platform.as_str())
        .bind(&account.account_name)
        .bind(&account.profile.display_name)
        .bind(&account.profile.username)
        .bind(&account.profile.avatar_url)
        .bind(if account.profile.verified { 1 } else { 0 })
        .bind(account.profile.follower_count)
        .bind(if account.connected { 1 } else { 0 })
        .bind(&account.access_token)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(())
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Option<PlatformAccount>> {
        let row = sqlx::query(
            r#"
            SELECT id, platform, account_name, display_name, username, avatar_url,
                   verified, follower_count, connected, access_token
            FROM accounts WHERE id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(row.map(|r| Self::map_account(&r)))
    }

    pub async fn list_accounts(&self) -> Result<Vec<PlatformAccount>> {
        let rows = sqlx::query(
            r#"
            SELECT id, platform, account_name, display_name, username, avatar_url,
                   verified, follower_count, connected, access_token
            FROM accounts ORDER BY platform, account_name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(rows.iter().map(Self::map_account).collect())
    }

    pub async fn rename_account(&self, account_id: &str, account_name: &str) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET account_name = ? WHERE id = ?")
            .bind(account_name)
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UnknownAccount(account_id.to_string()).into());
        }
        Ok(())
    }

    pub async fn update_account_profile(
        &self,
        account_id: &str,
        profile: &ProfileInfo,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET display_name = ?, username = ?, avatar_url = ?, verified = ?, follower_count = ?
            WHERE id = ?
            "#,
        )
        .bind(&profile.display_name)
        .bind(&profile.username)
        .bind(&profile.avatar_url)
        .bind(if profile.verified { 1 } else { 0 })
        .bind(profile.follower_count)
        .bind(account_id)
        .execute(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UnknownAccount(account_id.to_string()).into());
        }
        Ok(())
    }

    pub async fn set_account_connected(&self, account_id: &str, connected: bool) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET connected = ? WHERE id = ?")
            .bind(if connected { 1 } else { 0 })
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UnknownAccount(account_id.to_string()).into());
        }
        Ok(())
    }

    pub async fn delete_account(&self, account_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(account_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UnknownAccount(account_id.to_string()).into());
        }
        Ok(())
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    async fn hydrate_post(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
        let id: String = row.get("id");
        let content_json: String = row.get("content");
        let content: PostContent =
            serde_json::from_str(&content_json).map_err(|e| StoreError::IoError(e.into()))?;

        let media = self.load_media(&id).await?;
        let targets = self.load_targets(&id).await?;
        let post_urls = self.load_post_urls(&id).await?;

        Ok(Post {
            id,
            content,
            media,
            targets,
            scheduled_at: row
                .get::<Option<i64>, _>("scheduled_at")
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            status: PostStatus::parse(&row.get::<String, _>("status")),
            post_urls,
            error: row.get("error"),
            created_at: DateTime::from_timestamp(row.get::<i64, _>("created_at"), 0)
                .unwrap_or_else(Utc::now),
            posted_at: row
                .get::<Option<i64>, _>("posted_at")
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
        })
    }

    async fn load_media(&self, post_id: &str) -> Result<Vec<MediaFile>> {
        let rows = sqlx::query(
            r#"
            SELECT id, file_path, mime, file_size, file_hash, alt_text, remote_url
            FROM post_media WHERE post_id = ? ORDER BY position ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(rows
            .iter()
            .map(|r| MediaFile {
                id: r.get("id"),
                file_path: r.get("file_path"),
                mime: MediaMimeType::from_mime_str(&r.get::<String, _>("mime"))
                    .unwrap_or(MediaMimeType::Jpeg),
                file_size: r.get::<i64, _>("file_size") as u64,
                file_hash: r.get("file_hash"),
                alt_text: r.get("alt_text"),
                remote_url: r.get("remote_url"),
            })
            .collect())
    }

    async fn load_targets(&self, post_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT account_id FROM post_targets WHERE post_id = ? ORDER BY account_id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        Ok(rows.iter().map(|r| r.get("account_id")).collect())
    }

    /// Latest successful URL per account for a post
    async fn load_post_urls(&self, post_id: &str) -> Result<BTreeMap<String, String>> {
        let rows = sqlx::query(
            r#"
            SELECT account_id, post_url
            FROM account_results
            WHERE post_id = ? AND success = 1 AND post_url IS NOT NULL
            ORDER BY recorded_at ASC, id ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::SqlxError)?;

        let mut urls = BTreeMap::new();
        for row in rows {
            urls.insert(row.get("account_id"), row.get("post_url"));
        }
        Ok(urls)
    }

    async fn replace_media(&self, post_id: &str, media: &[MediaFile]) -> Result<()> {
        sqlx::query("DELETE FROM post_media WHERE post_id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        for (position, item) in media.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO post_media
                    (id, post_id, position, file_path, mime, file_size, file_hash,
                     alt_text, remote_url)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&item.id)
            .bind(post_id)
            .bind(position as i64)
            .bind(&item.file_path)
            .bind(item.mime.as_str())
            .bind(item.file_size as i64)
            .bind(&item.file_hash)
            .bind(&item.alt_text)
            .bind(&item.remote_url)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;
        }

        Ok(())
    }

    async fn replace_targets(&self, post_id: &str, targets: &[String]) -> Result<()> {
        sqlx::query("DELETE FROM post_targets WHERE post_id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::SqlxError)?;

        for account_id in targets {
            sqlx::query("INSERT INTO post_targets (post_id, account_id) VALUES (?, ?)")
                .bind(post_id)
                .bind(account_id)
                .execute(&self.pool)
                .await
                .map_err(StoreError::SqlxError)?;
        }

        Ok(())
    }

    fn map_account(row: &sqlx::sqlite::SqliteRow) -> PlatformAccount {
        PlatformAccount {
            id: row.get("id"),
            platform: PostStoreRow::platform(row),
            account_name: row.get("account_name"),
            profile: ProfileInfo {
                display_name: row.get("display_name"),
                username: row.get("username"),
                avatar_url: row.get("avatar_url"),
                verified: row.get::<i64, _>("verified") != 0,
                follower_count: row.get("follower_count"),
            },
            connected: row.get::<i64, _>("connected") != 0,
            access_token: row.get("access_token"),
        }
    }
}

/// Row parsing helpers shared across queries
struct PostStoreRow;

impl PostStoreRow {
    fn platform(row: &sqlx::sqlite::SqliteRow) -> PlatformId {
        row.get::<String, _>("platform")
            .parse()
            .unwrap_or(PlatformId::Facebook)
    }
}
