use mime::Mime;

/// The only container accepted for video uploads
pub const VIDEO_MP4: &str = "video/mp4";

/// Parse a `Content-Type` value down to its essence (`type/subtype`),
/// dropping parameters such as `charset`.
pub fn parse_media_type(content_type: &str) -> Option<String> {
    content_type
        .parse::<Mime>()
        .ok()
        .map(|m| m.essence_str().to_ascii_lowercase())
}

/// File extension for an accepted video media type
pub fn video_extension(media_type: &str) -> Option<&'static str> {
    match media_type {
        VIDEO_MP4 => Some(".mp4"),
        _ => None,
    }
}

/// File extension for an accepted thumbnail media type
pub fn thumbnail_extension(media_type: &str) -> Option<&'static str> {
    match media_type {
        "image/jpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        _ => None,
    }
}
