//! Media compatibility rules per platform
//!
//! Each platform has hard limits on attachment counts and formats. These
//! checks run before any network call so an incompatible post fails fast
//! with a clear reason instead of a platform API error.

use crate::types::{MediaFile, MediaKind, MediaMimeType, PlatformId};

/// Attachment limits for one platform
#[derive(Debug, Clone, Copy)]
pub struct MediaConstraints {
    pub max_images: usize,
    pub max_videos: usize,
    /// Whether images and videos may appear in the same post
    pub mixing_allowed: bool,
    /// Whether the platform accepts text-only posts
    pub media_required: bool,
    /// Whether attachments must carry a public remote URL (no direct upload)
    pub remote_url_required: bool,
    pub supported_mimes: &'static [MediaMimeType],
    pub max_image_bytes: u64,
    pub max_video_bytes: u64,
}

const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * MB;

const IMAGE_AND_VIDEO_MIMES: &[MediaMimeType] = &[
    MediaMimeType::Jpeg,
    MediaMimeType::Png,
    MediaMimeType::Gif,
    MediaMimeType::WebP,
    MediaMimeType::Mp4,
    MediaMimeType::Mov,
];

const YOUTUBE_MIMES: &[MediaMimeType] = &[
    MediaMimeType::Mp4,
    MediaMimeType::Mov,
    MediaMimeType::Webm,
];

const INSTAGRAM_MIMES: &[MediaMimeType] = &[
    MediaMimeType::Jpeg,
    MediaMimeType::Png,
    MediaMimeType::Mp4,
    MediaMimeType::Mov,
];

/// Platform attachment limits
pub fn constraints_for(platform: PlatformId) -> MediaConstraints {
    match platform {
        PlatformId::Facebook => MediaConstraints {
            max_images: 10,
            max_videos: 1,
            mixing_allowed: false,
            media_required: false,
            remote_url_required: false,
            supported_mimes: IMAGE_AND_VIDEO_MIMES,
            max_image_bytes: 10 * MB,
            max_video_bytes: GB,
        },
        // The Instagram Graph API only ingests media from public URLs
        PlatformId::Instagram => MediaConstraints {
            max_images: 10,
            max_videos: 1,
            mixing_allowed: true,
            media_required: true,
            remote_url_required: true,
            supported_mimes: INSTAGRAM_MIMES,
            max_image_bytes: 8 * MB,
            max_video_bytes: 650 * MB,
        },
        PlatformId::Youtube => MediaConstraints {
            max_images: 0,
            max_videos: 1,
            mixing_allowed: false,
            media_required: true,
            remote_url_required: false,
            supported_mimes: YOUTUBE_MIMES,
            max_image_bytes: 0,
            max_video_bytes: 2 * GB,
        },
        PlatformId::Twitter => MediaConstraints {
            max_images: 4,
            max_videos: 1,
            mixing_allowed: false,
            media_required: false,
            remote_url_required: false,
            supported_mimes: IMAGE_AND_VIDEO_MIMES,
            max_image_bytes: 5 * MB,
            max_video_bytes: 512 * MB,
        },
        PlatformId::Linkedin => MediaConstraints {
            max_images: 9,
            max_videos: 1,
            mixing_allowed: false,
            media_required: false,
            remote_url_required: false,
            supported_mimes: IMAGE_AND_VIDEO_MIMES,
            max_image_bytes: 8 * MB,
            max_video_bytes: 500 * MB,
        },
    }
}

/// Check a media set against a platform's constraints.
///
/// Returns a human-readable reason when the set cannot be published there.
pub fn validate_media(platform: PlatformId, media: &[MediaFile]) -> Result<(), String> {
    let constraints = constraints_for(platform);

    if media.is_empty() {
        if constraints.media_required {
            return Err(format!("{} requires at least one media attachment", platform));
        }
        return Ok(());
    }

    for file in media {
        if !constraints.supported_mimes.contains(&file.mime) {
            return Err(format!(
                "{} does not support {} attachments",
                platform,
                file.mime.as_str()
            ));
        }
        if constraints.remote_url_required && file.remote_url.is_none() {
            return Err(format!(
                "{} requires media to be reachable at a public URL",
                platform
            ));
        }
        let size_cap = match file.mime.kind() {
            MediaKind::Image => constraints.max_image_bytes,
            MediaKind::Video => constraints.max_video_bytes,
        };
        if size_cap > 0 && file.file_size > size_cap {
            return Err(format!(
                "{} caps {} files at {} MB ({} is {} MB)",
                platform,
                file.mime.kind(),
                size_cap / MB,
                file.id,
                file.file_size / MB
            ));
        }
    }

    let image_count = media.iter().filter(|m| m.mime.kind() == MediaKind::Image).count();
    let video_count = media.iter().filter(|m| m.mime.kind() == MediaKind::Video).count();

    if image_count > 0 && video_count > 0 && !constraints.mixing_allowed {
        return Err(format!(
            "{} does not allow mixing images and videos in one post",
            platform
        ));
    }
    if image_count > constraints.max_images {
        return Err(format!(
            "{} allows at most {} images per post ({} attached)",
            platform, constraints.max_images, image_count
        ));
    }
    if video_count > constraints.max_videos {
        return Err(format!(
            "{} allows at most {} video per post ({} attached)",
            platform, constraints.max_videos, video_count
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(n: u32) -> MediaFile {
        MediaFile {
            id: format!("img-{}", n),
            file_path: format!("/tmp/img-{}.jpg", n),
            mime: MediaMimeType::Jpeg,
            file_size: 1024,
            file_hash: format!("hash-{}", n),
            alt_text: None,
            remote_url: Some(format!("https://cdn.example/img-{}.jpg", n)),
        }
    }

    fn video() -> MediaFile {
        MediaFile {
            id: "vid-1".to_string(),
            file_path: "/tmp/clip.mp4".to_string(),
            mime: MediaMimeType::Mp4,
            file_size: 1_000_000,
            file_hash: "vhash".to_string(),
            alt_text: None,
            remote_url: Some("https://cdn.example/clip.mp4".to_string()),
        }
    }

    #[test]
    fn test_text_only_allowed_where_media_optional() {
        assert!(validate_media(PlatformId::Facebook, &[]).is_ok());
        assert!(validate_media(PlatformId::Twitter, &[]).is_ok());
        assert!(validate_media(PlatformId::Linkedin, &[]).is_ok());
    }

    #[test]
    fn test_text_only_rejected_where_media_required() {
        assert!(validate_media(PlatformId::Instagram, &[]).is_err());
        assert!(validate_media(PlatformId::Youtube, &[]).is_err());
    }

    #[test]
    fn test_twitter_image_limit() {
        let four: Vec<MediaFile> = (0..4).map(image).collect();
        assert!(validate_media(PlatformId::Twitter, &four).is_ok());

        let five: Vec<MediaFile> = (0..5).map(image).collect();
        let err = validate_media(PlatformId::Twitter, &five).unwrap_err();
        assert!(err.contains("at most 4 images"));
    }

    #[test]
    fn test_twitter_rejects_mixed_media() {
        let mixed = vec![image(1), video()];
        let err = validate_media(PlatformId::Twitter, &mixed).unwrap_err();
        assert!(err.contains("mixing"));
    }

    #[test]
    fn test_youtube_video_only() {
        assert!(validate_media(PlatformId::Youtube, &[video()]).is_ok());

        let err = validate_media(PlatformId::Youtube, &[image(1)]).unwrap_err();
        assert!(err.contains("does not support"));
    }

    #[test]
    fn test_youtube_rejects_multiple_videos() {
        let two = vec![video(), video()];
        assert!(validate_media(PlatformId::Youtube, &two).is_err());
    }

    #[test]
    fn test_instagram_requires_remote_url() {
        let mut local = image(1);
        local.remote_url = None;
        let err = validate_media(PlatformId::Instagram, &[local]).unwrap_err();
        assert!(err.contains("public URL"));

        assert!(validate_media(PlatformId::Instagram, &[image(1)]).is_ok());
    }

    #[test]
    fn test_instagram_carousel_limit() {
        let ten: Vec<MediaFile> = (0..10).map(image).collect();
        assert!(validate_media(PlatformId::Instagram, &ten).is_ok());

        let eleven: Vec<MediaFile> = (0..11).map(image).collect();
        assert!(validate_media(PlatformId::Instagram, &eleven).is_err());
    }

    #[test]
    fn test_linkedin_image_limit() {
        let nine: Vec<MediaFile> = (0..9).map(image).collect();
        assert!(validate_media(PlatformId::Linkedin, &nine).is_ok());

        let ten: Vec<MediaFile> = (0..10).map(image).collect();
        assert!(validate_media(PlatformId::Linkedin, &ten).is_err());
    }

    #[test]
    fn test_unsupported_mime() {
        let mut webm = video();
        webm.mime = MediaMimeType::Webm;
        let err = validate_media(PlatformId::Facebook, &[webm]).unwrap_err();
        assert!(err.contains("does not support"));
    }

    #[test]
    fn test_oversized_media_rejected() {
        let mut huge = image(1);
        huge.file_size = 6 * MB;
        let err = validate_media(PlatformId::Twitter, &[huge.clone()]).unwrap_err();
        assert!(err.contains("caps image files at 5 MB"));

        // The same file is fine where the cap is higher
        assert!(validate_media(PlatformId::Facebook, &[huge]).is_ok());

        let mut big_video = video();
        big_video.file_size = 600 * MB;
        assert!(validate_media(PlatformId::Linkedin, &[big_video.clone()]).is_err());
        assert!(validate_media(PlatformId::Instagram, &[big_video]).is_ok());
    }

    #[test]
    fn test_facebook_album_limit() {
        let ten: Vec<MediaFile> = (0..10).map(image).collect();
        assert!(validate_media(PlatformId::Facebook, &ten).is_ok());

        let eleven: Vec<MediaFile> = (0..11).map(image).collect();
        assert!(validate_media(PlatformId::Facebook, &eleven).is_err());
    }
}
