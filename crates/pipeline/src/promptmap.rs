//! Fashion prompt generation.
//!
//! For each outfit folder: classify the model's gender, pick a background
//! from the prompt library that has a matching style image, describe the
//! outfit and splice the description into the background's prompt.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use lookbook_core::promptmap::{
    adjust_background_for_gender, clean_description, find_matching_prompt, group_flat_images,
    order_model_first, parse_prompt_library, substitute_description, Gender, PromptLibrary,
};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, PromptMapConfig};
use crate::error::PipelineError;
use crate::files::{file_name, list_dirs, list_files};
use crate::vision::VisionModel;

/// Extensions considered outfit photos.
pub const PROMPT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Generated prompt for one outfit folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderResult {
    pub folder_id: String,
    pub description: String,
    pub background_suggestion: String,
    pub gender: String,
    pub text: String,
    pub style_image: String,
}

impl FolderResult {
    fn error(folder_id: &str, error: &PipelineError) -> Self {
        let message = format!("Error: {error}");
        Self {
            folder_id: folder_id.to_string(),
            description: message.clone(),
            background_suggestion: String::new(),
            gender: String::new(),
            text: message,
            style_image: String::new(),
        }
    }
}

/// Group extracted images into outfit folders.
///
/// With subdirectories present each one is a folder (empty ones dropped);
/// otherwise the flat file list is grouped by name.
pub async fn group_folders(root: &Path) -> std::io::Result<IndexMap<String, Vec<PathBuf>>> {
    let mut folders = IndexMap::new();
    let dirs = list_dirs(root).await?;

    if !dirs.is_empty() {
        for dir in dirs {
            let images = list_files(&dir, PROMPT_IMAGE_EXTENSIONS).await?;
            let folder = file_name(&dir);
            if images.is_empty() {
                tracing::warn!(folder = %folder, "No images found in folder");
                continue;
            }
            let names = order_model_first(images.iter().map(|p| file_name(p)).collect());
            folders.insert(folder, names.iter().map(|n| dir.join(n)).collect());
        }
        return Ok(folders);
    }

    let images = list_files(root, PROMPT_IMAGE_EXTENSIONS).await?;
    let names: Vec<String> = images.iter().map(|p| file_name(p)).collect();
    for (folder, members) in group_flat_images(&names) {
        folders.insert(folder, members.iter().map(|n| root.join(n)).collect());
    }
    Ok(folders)
}

/// Pick a library background whose gender-adjusted name has a style image.
///
/// Tries `attempts` uniformly random keys first, then chooses among every
/// key that qualifies, and finally settles for any key.
pub fn select_background<R: Rng + ?Sized>(
    library: &PromptLibrary,
    gender: Gender,
    available: &BTreeSet<String>,
    attempts: usize,
    rng: &mut R,
) -> Option<String> {
    let keys: Vec<&String> = library.keys().collect();
    let has_style = |key: &str| available.contains(&adjust_background_for_gender(key, gender));

    for attempt in 1..=attempts {
        let key = keys.choose(rng)?;
        if has_style(key) {
            tracing::info!(background = %key, gender = %gender, "Selected background with style image");
            return Some((*key).clone());
        }
        tracing::debug!(attempt, background = %key, "No style image for background");
    }

    let qualifying: Vec<&String> = keys.iter().copied().filter(|k| has_style(k)).collect();
    if let Some(key) = qualifying.choose(rng) {
        tracing::warn!(background = %key, gender = %gender, "Used fallback background");
        return Some((*key).clone());
    }

    let key = keys.choose(rng)?;
    tracing::error!(background = %key, gender = %gender, "No background with a style image, using random");
    Some((*key).clone())
}

pub struct PromptMapPipeline<'a> {
    vision: &'a dyn VisionModel,
    config: PromptMapConfig,
}

impl<'a> PromptMapPipeline<'a> {
    pub fn new(vision: &'a dyn VisionModel, config: PromptMapConfig) -> Self {
        Self { vision, config }
    }

    pub async fn load_library(&self) -> Result<PromptLibrary, PipelineError> {
        let path = &self.config.library_path;
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::MissingFile {
                    description: "prompt library".into(),
                    path: path.clone(),
                }
                .into())
            }
            Err(e) => return Err(e.into()),
        };

        let library = parse_prompt_library(&text).map_err(|e| ConfigError::InvalidTemplate {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        tracing::info!(prompts = library.len(), "Prompt library loaded");
        Ok(library)
    }

    /// Stems of the style images backgrounds can be matched against.
    pub async fn available_styles(&self) -> BTreeSet<String> {
        match list_files(&self.config.style_dir, PROMPT_IMAGE_EXTENSIONS).await {
            Ok(files) => files
                .iter()
                .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
                .collect(),
            Err(e) => {
                tracing::error!(
                    dir = %self.config.style_dir.display(),
                    error = %e,
                    "Failed to read style folder",
                );
                BTreeSet::new()
            }
        }
    }

    /// Generate prompts for every outfit folder under `root`.
    pub async fn run(&self, root: &Path) -> Result<Vec<FolderResult>, PipelineError> {
        let library = self.load_library().await?;
        let styles = self.available_styles().await;
        let folders = group_folders(root).await?;

        if folders.is_empty() {
            tracing::warn!("No folders with images found");
        }

        let mut results = Vec::with_capacity(folders.len());
        for (folder_id, images) in &folders {
            tracing::info!(folder = %folder_id, images = images.len(), "Processing folder");
            let result = match self
                .process_folder(folder_id, images, &library, &styles)
                .await
            {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(folder = %folder_id, error = %e, "Folder failed");
                    FolderResult::error(folder_id, &e)
                }
            };
            results.push(result);
        }

        tracing::info!(folders = results.len(), "Prompt generation finished");
        Ok(results)
    }

    async fn process_folder(
        &self,
        folder_id: &str,
        images: &[PathBuf],
        library: &PromptLibrary,
        styles: &BTreeSet<String>,
    ) -> Result<FolderResult, PipelineError> {
        let Some(first) = images.first() else {
            return Err(PipelineError::NoImages);
        };

        let gender = match self.vision.classify_gender(first).await? {
            Some(gender) => gender,
            None => {
                tracing::warn!(folder = folder_id, "Could not detect gender, using default");
                Gender::default()
            }
        };

        let background = select_background(
            library,
            gender,
            styles,
            self.config.background_attempts,
            &mut rand::rng(),
        );

        let description = clean_description(&self.vision.describe(first).await?);

        let adjusted = background
            .as_deref()
            .map(|b| adjust_background_for_gender(b, gender))
            .unwrap_or_default();

        let matched = if adjusted.is_empty() {
            None
        } else {
            find_matching_prompt(&adjusted, library)
        };
        let (text, style_image) = match matched {
            Some((key, prompt)) => (substitute_description(prompt, &description), key.to_string()),
            None => {
                tracing::warn!(folder = folder_id, "No matching prompt, using description only");
                (description.clone(), String::new())
            }
        };

        Ok(FolderResult {
            folder_id: folder_id.to_string(),
            description,
            background_suggestion: adjusted,
            gender: gender.to_string(),
            text,
            style_image,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn library(keys: &[&str]) -> PromptLibrary {
        keys.iter()
            .map(|k| (k.to_string(), format!("{k} prompt Wearing")))
            .collect()
    }

    fn styles(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn only_qualifying_background_is_found() {
        let lib = library(&["beach", "studio", "rooftop"]);
        let available = styles(&["studio_women"]);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = select_background(&lib, Gender::Women, &available, 10, &mut rng);
            assert_eq!(picked.as_deref(), Some("studio"));
        }
    }

    #[test]
    fn zero_attempts_still_uses_filtered_fallback() {
        let lib = library(&["beach", "studio_women"]);
        let available = styles(&["studio"]);
        let mut rng = StdRng::seed_from_u64(7);
        let picked = select_background(&lib, Gender::Men, &available, 0, &mut rng);
        assert_eq!(picked.as_deref(), Some("studio_women"));
    }

    #[test]
    fn falls_back_to_any_key() {
        let lib = library(&["beach"]);
        let mut rng = StdRng::seed_from_u64(1);
        let picked = select_background(&lib, Gender::Men, &BTreeSet::new(), 3, &mut rng);
        assert_eq!(picked.as_deref(), Some("beach"));
    }

    #[test]
    fn empty_library_selects_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let picked =
            select_background(&PromptLibrary::new(), Gender::Women, &BTreeSet::new(), 3, &mut rng);
        assert!(picked.is_none());
    }

    #[tokio::test]
    async fn nested_folders_put_model_shots_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("look_b")).unwrap();
        std::fs::create_dir_all(dir.path().join("look_a")).unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        std::fs::write(dir.path().join("look_a/back.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("look_a/front_MODEL.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("look_b/1.png"), b"x").unwrap();
        std::fs::write(dir.path().join("stray.png"), b"x").unwrap();

        let folders = group_folders(dir.path()).await.unwrap();
        let keys: Vec<&str> = folders.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["look_a", "look_b"]);
        assert_eq!(
            folders["look_a"],
            vec![
                dir.path().join("look_a/front_MODEL.jpg"),
                dir.path().join("look_a/back.jpg")
            ]
        );
    }

    #[tokio::test]
    async fn flat_files_are_grouped_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["coat_1.jpg", "coat_2.jpg", "dress.png"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let folders = group_folders(dir.path()).await.unwrap();
        assert_eq!(folders["group_coat"].len(), 2);
        assert_eq!(folders["single_dress"], vec![dir.path().join("dress.png")]);
    }
}
