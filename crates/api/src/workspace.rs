//! Per-request scratch directories.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A fresh temporary tree with `input/`, `masks/` and `output/`.
///
/// The whole tree is removed when the value is dropped, whichever way
/// the request ends.
#[derive(Debug)]
pub struct RequestWorkspace {
    root: TempDir,
    input: PathBuf,
    masks: PathBuf,
    output: PathBuf,
}

impl RequestWorkspace {
    pub async fn create() -> io::Result<Self> {
        let root = tempfile::Builder::new().prefix("lookbook-").tempdir()?;
        let input = root.path().join("input");
        let masks = root.path().join("masks");
        let output = root.path().join("output");
        for dir in [&input, &masks, &output] {
            tokio::fs::create_dir_all(dir).await?;
        }
        tracing::debug!(path = %root.path().display(), "Created request workspace");
        Ok(Self {
            root,
            input,
            masks,
            output,
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn masks(&self) -> &Path {
        &self.masks
    }

    pub fn output(&self) -> &Path {
        &self.output
    }
}
