//! Core types for Omnicast

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{OmnicastError, Result};

/// A supported target platform
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum PlatformId {
    Facebook,
    Instagram,
    Youtube,
    Twitter,
    Linkedin,
}

impl PlatformId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::Youtube => "youtube",
            Self::Twitter => "twitter",
            Self::Linkedin => "linkedin",
        }
    }

    /// All known platforms, in display order
    pub fn all() -> [PlatformId; 5] {
        [
            Self::Facebook,
            Self::Instagram,
            Self::Youtube,
            Self::Twitter,
            Self::Linkedin,
        ]
    }
}

impl FromStr for PlatformId {
    type Err = OmnicastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "facebook" => Ok(Self::Facebook),
            "instagram" => Ok(Self::Instagram),
            "youtube" => Ok(Self::Youtube),
            "twitter" | "x" => Ok(Self::Twitter),
            "linkedin" => Ok(Self::Linkedin),
            other => Err(OmnicastError::InvalidInput(format!(
                "Unknown platform '{}'. Valid platforms: facebook, instagram, youtube, twitter, linkedin",
                other
            ))),
        }
    }
}

impl std::fmt::Display for PlatformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PostStatus {
    Draft,
    Scheduled,
    Posting,
    Posted,
    Failed,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Posting => "posting",
            Self::Posted => "posted",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "draft" => Self::Draft,
            "scheduled" => Self::Scheduled,
            "posting" => Self::Posting,
            "posted" => Self::Posted,
            _ => Self::Failed,
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Platform-specific structured content
///
/// `body` maps to the platform's primary text field (Facebook message,
/// Instagram caption, tweet text). `title` and `tags` are only consumed by
/// platforms that have those concepts (YouTube).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlatformContent {
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl PlatformContent {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            title: None,
            tags: Vec::new(),
        }
    }
}

/// Post content: one text for every platform, or a per-platform mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PostContent {
    Universal(String),
    PerPlatform(BTreeMap<PlatformId, PlatformContent>),
}

impl PostContent {
    /// Unwrap the content for one platform.
    ///
    /// Per-platform mappings without an entry for the platform resolve to
    /// empty content; the adapters reject empty bodies where the platform
    /// requires text.
    pub fn resolve(&self, platform: PlatformId) -> PlatformContent {
        match self {
            PostContent::Universal(text) => PlatformContent::text(text.clone()),
            PostContent::PerPlatform(map) => map.get(&platform).cloned().unwrap_or_default(),
        }
    }

    /// Short preview of the content for listings
    pub fn preview(&self) -> String {
        match self {
            PostContent::Universal(text) => text.clone(),
            PostContent::PerPlatform(map) => map
                .values()
                .next()
                .map(|c| c.body.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Supported media MIME types for attachments
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MediaMimeType {
    Jpeg,
    Png,
    Gif,
    WebP,
    Mp4,
    Mov,
    Webm,
}

impl MediaMimeType {
    /// Parse MIME type from a MIME string (e.g., "image/jpeg")
    pub fn from_mime_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            "video/mp4" => Some(Self::Mp4),
            "video/quicktime" => Some(Self::Mov),
            "video/webm" => Some(Self::Webm),
            _ => None,
        }
    }

    /// Detect MIME type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            "mp4" => Some(Self::Mp4),
            "mov" => Some(Self::Mov),
            "webm" => Some(Self::Webm),
            _ => None,
        }
    }

    /// Get the MIME type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Mp4 => "video/mp4",
            Self::Mov => "video/quicktime",
            Self::Webm => "video/webm",
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Jpeg | Self::Png | Self::Gif | Self::WebP => MediaKind::Image,
            Self::Mp4 | Self::Mov | Self::Webm => MediaKind::Video,
        }
    }
}

impl std::fmt::Display for MediaMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A media attachment for a post
///
/// Attachments are stored as file references on disk, not embedded in the
/// store. The file_hash provides integrity verification. `remote_url` is set
/// when the file is also publicly hosted (Instagram publishes from URLs).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaFile {
    pub id: String,
    pub file_path: String,
    pub mime: MediaMimeType,
    pub file_size: u64,
    pub file_hash: String,
    pub alt_text: Option<String>,
    pub remote_url: Option<String>,
}

impl MediaFile {
    pub fn kind(&self) -> MediaKind {
        self.mime.kind()
    }

    /// Build a media attachment from a file on disk, detecting the type from
    /// the extension and hashing the content.
    pub fn from_path(path: &Path, alt_text: Option<String>) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let mime = MediaMimeType::from_extension(ext).ok_or_else(|| {
            OmnicastError::InvalidInput(format!(
                "Unsupported media type '{}' for file {}",
                ext,
                path.display()
            ))
        })?;

        let bytes = std::fs::read(path).map_err(crate::error::StoreError::IoError)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let file_hash = format!("{:x}", hasher.finalize());

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            file_path: path.to_string_lossy().to_string(),
            mime,
            file_size: bytes.len() as u64,
            file_hash,
            alt_text,
            remote_url: None,
        })
    }
}

/// Public profile data for a connected account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProfileInfo {
    pub display_name: String,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
    pub verified: bool,
    pub follower_count: Option<i64>,
}

/// A connected destination account on one platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformAccount {
    pub id: String,
    pub platform: PlatformId,
    pub account_name: String,
    pub profile: ProfileInfo,
    pub connected: bool,
    pub access_token: String,
}

impl PlatformAccount {
    pub fn new(
        platform: PlatformId,
        account_name: String,
        access_token: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            platform,
            account_name: account_name.clone(),
            profile: ProfileInfo {
                display_name: account_name,
                ..Default::default()
            },
            connected: true,
            access_token,
        }
    }
}

/// A unit of content scheduled for publication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub content: PostContent,
    pub media: Vec<MediaFile>,
    /// Ids of the target PlatformAccounts (references, not owned)
    pub targets: Vec<String>,
    pub scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
    pub status: PostStatus,
    /// Account id -> published URL, populated per successful account
    pub post_urls: BTreeMap<String, String>,
    /// Aggregated human-readable failure description
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub posted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Post {
    pub fn new(content: PostContent, targets: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            media: Vec::new(),
            targets,
            scheduled_at: None,
            status: PostStatus::Draft,
            post_urls: BTreeMap::new(),
            error: None,
            created_at: now_seconds(),
            posted_at: None,
        }
    }
}

/// Outcome of publishing one post through one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResult {
    pub account_id: String,
    pub platform: PlatformId,
    pub success: bool,
    /// Published URL (if the platform exposes one)
    pub post_url: Option<String>,
    /// Platform-specific post id (if successful)
    pub platform_post_id: Option<String>,
    /// Failure description (if failed)
    pub error: Option<String>,
}

impl AccountResult {
    pub fn failure(account: &PlatformAccount, error: String) -> Self {
        Self {
            account_id: account.id.clone(),
            platform: account.platform,
            success: false,
            post_url: None,
            platform_post_id: None,
            error: Some(error),
        }
    }
}

/// Current time truncated to whole seconds, matching store precision
pub fn now_seconds() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(chrono::Utc::now().timestamp(), 0)
        .expect("current time is representable")
}
