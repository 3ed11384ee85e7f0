//! Deterministic naming for uploaded assets and downloaded outputs.

use std::path::{Path, PathBuf};

/// Split a filename into `(stem, ext)` where `ext` keeps its leading dot.
///
/// `"look.final.png"` becomes `("look.final", ".png")`; a name without an
/// extension yields an empty `ext`.
pub fn split_name(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(0) | None => (filename, ""),
        Some(idx) => filename.split_at(idx),
    }
}

/// Remote name with a millisecond suffix: `{stem}_{millis}{ext}`.
///
/// ```
/// use lookbook_core::naming::unique_suffix_name;
///
/// assert_eq!(unique_suffix_name("look.png", 1700000000000), "look_1700000000000.png");
/// ```
pub fn unique_suffix_name(filename: &str, millis: i64) -> String {
    let (stem, ext) = split_name(filename);
    format!("{stem}_{millis}{ext}")
}

/// Remote name with a millisecond prefix: `{millis}_{name}`.
///
/// ```
/// use lookbook_core::naming::timestamp_prefixed_name;
///
/// assert_eq!(timestamp_prefixed_name("look.png", 42), "42_look.png");
/// ```
pub fn timestamp_prefixed_name(filename: &str, millis: i64) -> String {
    format!("{millis}_{filename}")
}

/// Destination path for output variant `index` (1-based).
///
/// Variant 1 is `base` itself; later variants become
/// `{stem}_variant_{n}{ext}` in the same directory.
pub fn variant_path(base: &Path, index: usize) -> PathBuf {
    if index <= 1 {
        return base.to_path_buf();
    }

    let filename = base
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, ext) = split_name(&filename);
    base.with_file_name(format!("{stem}_variant_{index}{ext}"))
}

/// Output filename for a composited input: `processed_{input}`.
pub fn processed_name(input_filename: &str) -> String {
    format!("processed_{input_filename}")
}

/// Download name for a processed masking archive: `{stem}_processed.zip`.
pub fn processed_archive_name(archive_filename: &str) -> String {
    let (stem, _) = split_name(archive_filename);
    format!("{stem}_processed.zip")
}

/// Next `closeup({n}){ext}` name not yet present in `existing`.
pub fn next_closeup_name<F>(ext: &str, mut exists: F) -> String
where
    F: FnMut(&str) -> bool,
{
    let mut index = 1u32;
    loop {
        let candidate = format!("closeup({index}){ext}");
        if !exists(&candidate) {
            return candidate;
        }
        index += 1;
    }
}

/// `filename` itself when free, otherwise the first `{stem}_{n}{ext}`
/// (n from 2) for which `exists` is false.
///
/// ```
/// use lookbook_core::naming::deduplicated_name;
///
/// assert_eq!(deduplicated_name("x.png", |n| n == "x.png"), "x_2.png");
/// ```
pub fn deduplicated_name<F>(filename: &str, mut exists: F) -> String
where
    F: FnMut(&str) -> bool,
{
    if !exists(filename) {
        return filename.to_string();
    }
    let (stem, ext) = split_name(filename);
    let mut index = 2u32;
    loop {
        let candidate = format!("{stem}_{index}{ext}");
        if !exists(&candidate) {
            return candidate;
        }
        index += 1;
    }
}
