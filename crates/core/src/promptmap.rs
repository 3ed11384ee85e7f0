//! Text rules for fashion prompt generation.
//!
//! A prompt library maps background names to scene prompts that contain
//! the placeholder word "Wearing". Each folder of outfit photos gets a
//! vision-model description that replaces the placeholder, and a
//! background chosen to match the model's gender: women's variants of a
//! background carry a `_women` suffix.

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Background name -> scene prompt, in library order.
pub type PromptLibrary = IndexMap<String, String>;

/// Suffix marking the women's variant of a background.
pub const WOMEN_SUFFIX: &str = "_women";

/// Marker that puts an image at the front of its folder.
const MODEL_MARKER: &str = "MODEL";

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[Ww]earing\b").expect("valid regex"));
static SEQUENCE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_\d+$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Men,
    Women,
}

impl Gender {
    /// Parse a free-form model answer.
    ///
    /// "women" is checked before "men" since the latter is a substring.
    pub fn from_response(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("women") {
            Some(Self::Women)
        } else if lower.contains("men") {
            Some(Self::Men)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Men => "Men",
            Self::Women => "Women",
        }
    }
}

impl Default for Gender {
    fn default() -> Self {
        Self::Women
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a prompt library document (`{"background": "prompt", ...}`).
pub fn parse_prompt_library(text: &str) -> Result<PromptLibrary, CoreError> {
    let library: PromptLibrary = serde_json::from_str(text)
        .map_err(|e| CoreError::Validation(format!("Invalid prompt library: {e}")))?;
    if library.is_empty() {
        return Err(CoreError::Validation("Prompt library is empty".to_string()));
    }
    Ok(library)
}

/// Normalise a raw outfit description.
///
/// Strips surrounding whitespace and quotes, guarantees a leading
/// "Wearing" and collapses internal whitespace runs.
pub fn clean_description(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('"').trim_matches('\'');
    if trimmed.is_empty() {
        return String::new();
    }

    let prefixed = if trimmed.to_lowercase().starts_with("wearing") {
        trimmed.to_string()
    } else {
        format!("Wearing {trimmed}")
    };

    WHITESPACE.replace_all(&prefixed, " ").trim().to_string()
}

/// Replace the "Wearing" placeholder in a library prompt with `description`.
///
/// Replacement is a single pass, so the description's own leading
/// "Wearing" is never substituted again.
pub fn substitute_description(prompt: &str, description: &str) -> String {
    PLACEHOLDER
        .replace_all(prompt, regex::NoExpand(description))
        .into_owned()
}

/// Apply the gender convention to a background name.
///
/// ```
/// use lookbook_core::promptmap::{adjust_background_for_gender, Gender};
///
/// assert_eq!(adjust_background_for_gender("rooftop", Gender::Women), "rooftop_women");
/// assert_eq!(adjust_background_for_gender("rooftop_women", Gender::Men), "rooftop");
/// ```
pub fn adjust_background_for_gender(background: &str, gender: Gender) -> String {
    match gender {
        Gender::Women if !background.ends_with(WOMEN_SUFFIX) => {
            format!("{background}{WOMEN_SUFFIX}")
        }
        Gender::Men => background
            .strip_suffix(WOMEN_SUFFIX)
            .unwrap_or(background)
            .to_string(),
        Gender::Women => background.to_string(),
    }
}

/// Find the library prompt for a (gender-adjusted) background name.
///
/// Priority: exact key; for `_women` names the base name compared
/// case-insensitively; then substring containment in either direction.
/// Returns `(matched key, prompt)`.
pub fn find_matching_prompt<'a>(
    background: &str,
    library: &'a PromptLibrary,
) -> Option<(&'a str, &'a str)> {
    if let Some((key, prompt)) = library.get_key_value(background) {
        return Some((key.as_str(), prompt.as_str()));
    }

    if let Some(base) = background.strip_suffix(WOMEN_SUFFIX) {
        let base = base.to_lowercase();
        if let Some((key, prompt)) = library.iter().find(|(k, _)| k.to_lowercase() == base) {
            tracing::debug!(background, key = %key, "Matched prompt without women suffix");
            return Some((key.as_str(), prompt.as_str()));
        }
    }

    let wanted = background.to_lowercase();
    let found = library.iter().find(|(k, _)| {
        let key = k.to_lowercase();
        key.contains(&wanted) || wanted.contains(&key)
    });

    match found {
        Some((key, prompt)) => {
            tracing::debug!(background, key = %key, "Partial prompt match");
            Some((key.as_str(), prompt.as_str()))
        }
        None => {
            tracing::warn!(background, "No matching prompt found");
            None
        }
    }
}

/// Sort image names, putting names containing "MODEL" (any case) first.
pub fn order_model_first(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    let (mut model, other): (Vec<String>, Vec<String>) = names
        .into_iter()
        .partition(|n| n.to_uppercase().contains(MODEL_MARKER));
    model.extend(other);
    model
}

/// Group a flat listing of image file names into virtual folders.
///
/// A single image becomes `single_{stem}`. Otherwise names are grouped by
/// stem with a trailing `_<digits>` removed: groups of one become
/// `single_{prefix}`, larger groups `group_{prefix}`.
pub fn group_flat_images(names: &[String]) -> IndexMap<String, Vec<String>> {
    let mut sorted: Vec<&String> = names.iter().collect();
    sorted.sort();

    let mut folders = IndexMap::new();

    if let [only] = sorted.as_slice() {
        let (stem, _) = crate::naming::split_name(only);
        folders.insert(format!("single_{stem}"), vec![(*only).clone()]);
        return folders;
    }

    let mut prefixes: IndexMap<String, Vec<String>> = IndexMap::new();
    for name in sorted {
        let (stem, _) = crate::naming::split_name(name);
        let prefix = SEQUENCE_SUFFIX.replace(stem, "").into_owned();
        prefixes.entry(prefix).or_default().push(name.clone());
    }

    for (prefix, images) in prefixes {
        let folder = if images.len() == 1 {
            format!("single_{prefix}")
        } else {
            format!("group_{prefix}")
        };
        folders.insert(folder, order_model_first(images));
    }

    folders
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn library() -> PromptLibrary {
        let mut lib = PromptLibrary::new();
        lib.insert(
            "urban_street".into(),
            "A model Wearing, walking down an urban street".into(),
        );
        lib.insert("Beach".into(), "A model wearing on the beach at sunset".into());
        lib.insert("rooftop_garden".into(), "Wearing on a rooftop garden".into());
        lib
    }

    #[test]
    fn gender_parsing_prefers_women() {
        assert_eq!(Gender::from_response("Women"), Some(Gender::Women));
        assert_eq!(Gender::from_response(" women."), Some(Gender::Women));
        assert_eq!(Gender::from_response("Men"), Some(Gender::Men));
        assert_eq!(Gender::from_response("unsure"), None);
        assert_eq!(Gender::default(), Gender::Women);
    }

    #[test]
    fn clean_description_adds_prefix_and_collapses_whitespace() {
        assert_eq!(
            clean_description("  \"a red   jacket\n with jeans\" "),
            "Wearing a red jacket with jeans"
        );
        assert_eq!(
            clean_description("'Wearing a blue coat'"),
            "Wearing a blue coat"
        );
        assert_eq!(clean_description("   "), "");
    }

    #[test]
    fn substitution_is_single_pass() {
        let text = substitute_description(
            "A model Wearing, walking down an urban street",
            "Wearing a red jacket",
        );
        assert_eq!(text, "A model Wearing a red jacket, walking down an urban street");
    }

    #[test]
    fn substitution_handles_lowercase_placeholder() {
        let text = substitute_description("A model wearing on the beach", "Wearing a $5 hat");
        assert_eq!(text, "A model Wearing a $5 hat on the beach");
    }

    #[test]
    fn adjust_is_idempotent() {
        assert_eq!(
            adjust_background_for_gender("beach_women", Gender::Women),
            "beach_women"
        );
        assert_eq!(adjust_background_for_gender("beach", Gender::Men), "beach");
    }

    #[test]
    fn exact_match_wins() {
        let lib = library();
        assert_eq!(find_matching_prompt("Beach", &lib).unwrap().0, "Beach");
    }

    #[test]
    fn women_variant_matches_base_case_insensitively() {
        let lib = library();
        assert_eq!(find_matching_prompt("beach_women", &lib).unwrap().0, "Beach");
    }

    #[test]
    fn partial_match_either_direction() {
        let lib = library();
        assert_eq!(find_matching_prompt("rooftop", &lib).unwrap().0, "rooftop_garden");
        assert_eq!(
            find_matching_prompt("urban_street_night", &lib).unwrap().0,
            "urban_street"
        );
    }

    #[test]
    fn no_match_is_none() {
        assert!(find_matching_prompt("forest", &library()).is_none());
    }

    #[test]
    fn model_images_come_first() {
        let ordered = order_model_first(vec![
            "b.jpg".into(),
            "a_model.jpg".into(),
            "a.jpg".into(),
            "MODEL_front.png".into(),
        ]);
        assert_eq!(ordered, vec!["MODEL_front.png", "a_model.jpg", "a.jpg", "b.jpg"]);
    }

    #[test]
    fn single_flat_image_gets_own_folder() {
        let folders = group_flat_images(&["look.jpg".to_string()]);
        assert_eq!(folders.len(), 1);
        assert_eq!(folders["single_look"], vec!["look.jpg"]);
    }

    #[test]
    fn flat_images_group_by_sequence_prefix() {
        let names: Vec<String> = ["coat_001.jpg", "coat_002.jpg", "dress.png", "coat_MODEL.jpg"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let folders = group_flat_images(&names);

        assert_eq!(folders["group_coat"], vec!["coat_001.jpg", "coat_002.jpg"]);
        assert_eq!(folders["single_dress"], vec!["dress.png"]);
        assert_eq!(folders["single_coat_MODEL"], vec!["coat_MODEL.jpg"]);
    }

    #[test]
    fn library_parsing() {
        let lib = parse_prompt_library(r#"{"beach": "Wearing on a beach"}"#).unwrap();
        assert_eq!(lib["beach"], "Wearing on a beach");

        assert_matches!(parse_prompt_library("{}"), Err(CoreError::Validation(_)));
        assert_matches!(parse_prompt_library("[]"), Err(CoreError::Validation(_)));
    }
}
