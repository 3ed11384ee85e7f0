//! Directory listing for pipeline inputs.

use std::path::{Path, PathBuf};

use lookbook_core::media::{has_extension, is_hidden_or_system};

fn wanted(name: &str, extensions: &[&str]) -> bool {
    !is_hidden_or_system(name) && has_extension(name, extensions)
}

/// Files directly inside `dir` with one of `extensions`, sorted by name.
pub async fn list_files(dir: &Path, extensions: &[&str]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if wanted(&name, extensions) {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// Files anywhere under `dir` with one of `extensions`, sorted by path.
/// Hidden directories (e.g. `__MACOSX`, `.git`) are not entered.
pub async fn walk_files(dir: &Path, extensions: &[&str]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                if !is_hidden_or_system(&name) {
                    pending.push(entry.path());
                }
            } else if file_type.is_file() && wanted(&name, extensions) {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Immediate subdirectories of `dir`, sorted, hidden ones excluded.
pub async fn list_dirs(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await?.is_dir() && !is_hidden_or_system(&name) {
            dirs.push(entry.path());
        }
    }

    dirs.sort();
    Ok(dirs)
}

/// Final path component as an owned string.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
