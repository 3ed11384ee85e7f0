//! File-type helpers shared by every pipeline.

use std::path::Path;

/// Extensions accepted from masking archives and renaming uploads.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "webp"];

/// Extensions accepted for composite inputs, masks, and style references.
pub const COMPOSITE_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Whether `name` ends in one of `extensions` (case-insensitive).
pub fn has_extension(name: &str, extensions: &[&str]) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Whether `name` looks like an image we can process.
pub fn is_image_file(name: &str) -> bool {
    has_extension(name, IMAGE_EXTENSIONS)
}

/// Whether `name` is a ZIP archive by extension.
pub fn is_zip_file(name: &str) -> bool {
    has_extension(name, &["zip"])
}

/// Hidden files (`.DS_Store`) and macOS resource forks (`__MACOSX/...`).
pub fn is_hidden_or_system(name: &str) -> bool {
    name.starts_with('.') || name.starts_with("__MACOSX")
}
