//! ZIP intake and packaging.
//!
//! The `zip` crate is synchronous; callers run these helpers through
//! [`tokio::task::spawn_blocking`] (see the `*_blocking` wrappers).

use std::fs::File;
use std::collections::HashSet;
use std::io::{self, Cursor, Write};
use std::path::{Component, Path, PathBuf};

use lookbook_core::media::{has_extension, is_hidden_or_system};
use lookbook_core::naming::deduplicated_name;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Invalid ZIP archive: {0}")]
    Invalid(#[from] zip::result::ZipError),

    #[error("Archive I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive worker failed: {0}")]
    Worker(String),
}

/// Whether an entry path belongs to OS metadata (`__MACOSX/`, `.DS_Store`).
fn is_metadata_entry(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => is_hidden_or_system(&name.to_string_lossy()),
        _ => false,
    })
}

/// Extract entries with one of `extensions` into `dest`, flattened to
/// their basenames. Directories, metadata entries and entries with an
/// unsafe path are skipped. A repeated basename gets a `{stem}_{n}{ext}`
/// name. Returns the written paths in archive order.
pub fn extract_images(
    bytes: &[u8],
    dest: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    std::fs::create_dir_all(dest)?;
    let mut written = Vec::new();
    let mut used: HashSet<String> = HashSet::new();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let Some(path) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        if is_metadata_entry(&path) {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !has_extension(&name, extensions) {
            continue;
        }

        let unique = deduplicated_name(&name, |candidate| used.contains(candidate));
        if unique != name {
            tracing::warn!(entry = entry.name(), renamed = %unique, "Duplicate basename in archive");
        }
        let target = dest.join(&unique);
        let mut out = File::create(&target)?;
        if let Err(e) = io::copy(&mut entry, &mut out) {
            tracing::warn!(entry = %name, error = %e, "Skipping unreadable archive entry");
            drop(out);
            let _ = std::fs::remove_file(&target);
            continue;
        }
        used.insert(unique);
        written.push(target);
    }

    Ok(written)
}

/// Extract every safe entry into `dest`, keeping the directory tree.
pub fn extract_tree(bytes: &[u8], dest: &Path) -> Result<usize, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut count = 0;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(path) = entry.enclosed_name() else {
            tracing::warn!(entry = entry.name(), "Skipping archive entry with unsafe path");
            continue;
        };
        if is_metadata_entry(&path) {
            continue;
        }

        let target = dest.join(&path);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        count += 1;
    }

    Ok(count)
}

/// Pack every file under `dir` into an in-memory ZIP.
///
/// Entry names are relative to `dir` with `/` separators; when `prefix`
/// is given it becomes the top-level folder of every entry.
pub fn zip_dir(dir: &Path, prefix: Option<&str>) -> Result<Vec<u8>, ArchiveError> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for file in files {
        let relative = file
            .strip_prefix(dir)
            .unwrap_or(&file)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let name = match prefix {
            Some(prefix) => format!("{prefix}/{relative}"),
            None => relative,
        };
        writer.start_file(name, options)?;
        writer.write_all(&std::fs::read(&file)?)?;
    }

    Ok(writer.finish()?.into_inner())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Async wrappers
// ---------------------------------------------------------------------------

async fn blocking<T, F>(f: F) -> Result<T, ArchiveError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ArchiveError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ArchiveError::Worker(e.to_string()))?
}

pub async fn extract_images_blocking(
    bytes: Vec<u8>,
    dest: PathBuf,
    extensions: &'static [&'static str],
) -> Result<Vec<PathBuf>, ArchiveError> {
    blocking(move || extract_images(&bytes, &dest, extensions)).await
}

pub async fn extract_tree_blocking(bytes: Vec<u8>, dest: PathBuf) -> Result<usize, ArchiveError> {
    blocking(move || extract_tree(&bytes, &dest)).await
}

pub async fn zip_dir_blocking(dir: PathBuf, prefix: Option<String>) -> Result<Vec<u8>, ArchiveError> {
    blocking(move || zip_dir(&dir, prefix.as_deref())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use lookbook_core::media::IMAGE_EXTENSIONS;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in entries {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn extract_images_flattens_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[
            ("shoot/", ""),
            ("shoot/a.PNG", "a"),
            ("shoot/notes.txt", "n"),
            ("__MACOSX/shoot/._a.PNG", "junk"),
            ("b.jpg", "b"),
        ]);

        let written = extract_images(&bytes, dir.path(), IMAGE_EXTENSIONS).unwrap();

        assert_eq!(written, vec![dir.path().join("a.PNG"), dir.path().join("b.jpg")]);
        assert_eq!(std::fs::read(dir.path().join("a.PNG")).unwrap(), b"a");
    }

    #[test]
    fn repeated_basenames_get_numbered_instead_of_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[("a/x.png", "first"), ("b/x.png", "second")]);

        let written = extract_images(&bytes, dir.path(), IMAGE_EXTENSIONS).unwrap();

        assert_eq!(written, vec![dir.path().join("x.png"), dir.path().join("x_2.png")]);
        let bodies: Vec<String> = written
            .iter()
            .map(|p| std::fs::read_to_string(p).unwrap())
            .collect();
        assert_eq!(bodies, vec!["first", "second"]);
    }

    #[test]
    fn dot_slash_entries_are_not_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[
            ("./look_01.png", "1"),
            ("./look_02.jpg", "2"),
            ("./.DS_Store", "x"),
        ]);

        let written = extract_images(&bytes, dir.path(), IMAGE_EXTENSIONS).unwrap();
        assert_eq!(
            written,
            vec![dir.path().join("look_01.png"), dir.path().join("look_02.jpg")]
        );

        let tree = tempfile::tempdir().unwrap();
        let count = extract_tree(&build_zip(&[("./look_1/front.jpg", "f")]), tree.path()).unwrap();
        assert_eq!(count, 1);
        assert!(tree.path().join("look_1/front.jpg").exists());
    }

    #[test]
    fn extract_tree_keeps_structure_and_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[
            ("look_1/front.jpg", "f"),
            ("../escape.jpg", "x"),
            (".DS_Store", "x"),
        ]);

        let count = extract_tree(&bytes, dir.path()).unwrap();

        assert_eq!(count, 1);
        assert!(dir.path().join("look_1/front.jpg").exists());
        assert!(!dir.path().join(".DS_Store").exists());
    }

    #[test]
    fn zip_dir_uses_relative_names_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("top.png"), b"t").unwrap();
        std::fs::write(dir.path().join("nested/inner.png"), b"i").unwrap();

        let plain = zip_dir(dir.path(), None).unwrap();
        assert_eq!(entry_names(&plain), vec!["nested/inner.png", "top.png"]);

        let prefixed = zip_dir(dir.path(), Some("processed_images")).unwrap();
        assert_eq!(
            entry_names(&prefixed),
            vec!["processed_images/nested/inner.png", "processed_images/top.png"]
        );
    }

    #[test]
    fn garbage_is_an_invalid_archive() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(
            extract_images(b"definitely not a zip", dir.path(), IMAGE_EXTENSIONS),
            Err(ArchiveError::Invalid(_))
        );
    }
}
