use super::error::{LocalFileError, Result};
use super::schema::ImageType;

/// Accepted file extensions per MIME family. Drives the picker filters only;
/// dropped files are not filtered and still go through [`classify`].
pub const SUPPORTED_TYPES: &[(&str, &[&str])] = &[
    (
        "image/*",
        &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".avif", ".jfif", ".svg"],
    ),
    // TODO: verify mkv decodes through the frame decoder on every platform
    ("video/*", &[".mp4", ".webm", ".mkv"]),
];

/// Map a declared content type to its media category.
/// `image/gif` is checked before the generic `image/` prefix.
pub fn classify(mime_type: &str) -> Result<ImageType> {
    if mime_type.starts_with("image/gif") {
        Ok(ImageType::AnimatedImage)
    } else if mime_type.starts_with("image/") {
        Ok(ImageType::Image)
    } else if mime_type.starts_with("video/") {
        Ok(ImageType::Video)
    } else {
        Err(LocalFileError::UnsupportedType(mime_type.to_string()))
    }
}

/// Guess MIME type from filename extension.
pub fn guess_mime_type(filename: &str) -> &'static str {
    let ext = match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => return "application/octet-stream",
    };
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" | "jfif" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "txt" => "text/plain",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
