//! Product prompt data consumed by the background-replace pipeline.
//!
//! Callers send a JSON document mapping product keys to prompt entries:
//!
//! ```json
//! { "look_01": { "text": "Wearing a ... in an urban street", "style_image": "Urban street" } }
//! ```
//!
//! The prompt-generation endpoint emits a list instead, so both shapes are
//! normalised into an ordered [`PromptData`] map.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Prompt text used when no product supplies one.
pub const DEFAULT_PROMPT_TEXT: &str = "Generate a scene with the provided image and style";

/// Style name used when no product supplies one.
pub const DEFAULT_STYLE_NAME: &str = "Urban street";

/// One product's prompt entry. Unknown fields are kept for the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPrompt {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub style_image: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Product key -> prompt entry, in document order.
pub type PromptData = IndexMap<String, ProductPrompt>;

/// The prompt and style applied to every pair of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPrompt {
    /// Product key the defaults were taken from, if any.
    pub source: Option<String>,
    pub text: String,
    pub style_name: String,
}

/// Parse prompt data from raw JSON bytes.
pub fn parse_prompt_data(bytes: &[u8]) -> Result<PromptData, CoreError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| CoreError::Validation(format!("Invalid prompts JSON: {e}")))?;
    normalize_prompt_data(value)
}

/// Normalise either accepted shape into [`PromptData`].
///
/// - An object is taken as `{product_key: entry}`.
/// - In a list, an item carrying a `folder_id` string is keyed by it; any
///   other object item is merged as `{product_key: entry}` pairs.
///
/// Entries that are not objects are ignored.
pub fn normalize_prompt_data(value: Value) -> Result<PromptData, CoreError> {
    let mut data = PromptData::new();

    match value {
        Value::Object(map) => {
            for (key, entry) in map {
                insert_entry(&mut data, key, entry);
            }
        }
        Value::Array(items) => {
            for item in items {
                let Value::Object(map) = item else {
                    continue;
                };
                if let Some(folder_id) = map.get("folder_id").and_then(Value::as_str) {
                    let key = folder_id.to_string();
                    insert_entry(&mut data, key, Value::Object(map));
                } else {
                    for (key, entry) in map {
                        insert_entry(&mut data, key, entry);
                    }
                }
            }
            tracing::info!(entries = data.len(), "Converted list-shaped prompt data");
        }
        _ => {
            return Err(CoreError::Validation(
                "Prompts JSON must be an object or a list".to_string(),
            ))
        }
    }

    Ok(data)
}

fn insert_entry(data: &mut PromptData, key: String, entry: Value) {
    if !entry.is_object() {
        tracing::debug!(key = %key, "Ignoring non-object prompt entry");
        return;
    }
    match serde_json::from_value::<ProductPrompt>(entry) {
        Ok(prompt) => {
            data.insert(key, prompt);
        }
        Err(e) => tracing::warn!(key = %key, error = %e, "Ignoring malformed prompt entry"),
    }
}

/// Unique style names referenced by the prompt data, in first-seen order.
pub fn required_styles(data: &PromptData) -> Vec<String> {
    let mut styles: Vec<String> = Vec::new();
    for prompt in data.values() {
        if let Some(style) = prompt.style_image.as_deref().filter(|s| !s.is_empty()) {
            if !styles.iter().any(|s| s == style) {
                styles.push(style.to_string());
            }
        }
    }
    styles
}

/// Choose the single prompt/style applied to every pair of a batch.
///
/// `preferred` names a product key; when absent (or unknown) the first
/// product in document order is used. Missing fields fall back to
/// [`DEFAULT_PROMPT_TEXT`] and [`DEFAULT_STYLE_NAME`].
pub fn select_batch_prompt(data: &PromptData, preferred: Option<&str>) -> BatchPrompt {
    let chosen = match preferred {
        Some(key) => match data.get_key_value(key) {
            Some(entry) => Some(entry),
            None => {
                tracing::warn!(product = key, "Requested default product not found, using first");
                data.first()
            }
        },
        None => data.first(),
    };

    let (source, prompt) = match chosen {
        Some((key, prompt)) => (Some(key.clone()), Some(prompt)),
        None => (None, None),
    };

    let text = prompt
        .and_then(|p| p.text.clone())
        .unwrap_or_else(|| DEFAULT_PROMPT_TEXT.to_string());
    let style_name = prompt
        .and_then(|p| p.style_image.clone())
        .unwrap_or_else(|| DEFAULT_STYLE_NAME.to_string());

    BatchPrompt {
        source,
        text,
        style_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn object_shape_preserves_order() {
        let data = normalize_prompt_data(json!({
            "zeta": { "text": "z", "style_image": "Beach" },
            "alpha": { "text": "a", "style_image": "Studio" }
        }))
        .unwrap();

        let keys: Vec<&str> = data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn list_of_wrapped_entries_is_merged() {
        let data = normalize_prompt_data(json!([
            { "look_01": { "text": "one", "style_image": "Beach" } },
            { "look_02": { "text": "two", "style_image": "Studio" } }
        ]))
        .unwrap();

        assert_eq!(data.len(), 2);
        assert_eq!(data["look_02"].text.as_deref(), Some("two"));
    }

    #[test]
    fn list_of_folder_results_is_keyed_by_folder_id() {
        let data = normalize_prompt_data(json!([
            {
                "folder_id": "look_01",
                "text": "Wearing a coat on a rooftop",
                "style_image": "rooftop_women",
                "gender": "Women"
            }
        ]))
        .unwrap();

        let entry = &data["look_01"];
        assert_eq!(entry.style_image.as_deref(), Some("rooftop_women"));
        assert_eq!(entry.extra["gender"], "Women");
    }

    #[test]
    fn scalar_document_is_rejected() {
        assert_matches!(normalize_prompt_data(json!(3)), Err(CoreError::Validation(_)));
    }

    #[test]
    fn invalid_bytes_are_rejected() {
        assert_matches!(parse_prompt_data(b"{oops"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn required_styles_are_unique_and_ordered() {
        let data = normalize_prompt_data(json!({
            "a": { "style_image": "Beach" },
            "b": { "style_image": "Studio" },
            "c": { "style_image": "Beach" },
            "d": { "text": "no style" },
            "e": { "style_image": "" }
        }))
        .unwrap();

        assert_eq!(required_styles(&data), vec!["Beach", "Studio"]);
    }

    #[test]
    fn batch_prompt_defaults_to_first_product() {
        let data = normalize_prompt_data(json!({
            "a": { "text": "first", "style_image": "Beach" },
            "b": { "text": "second", "style_image": "Studio" }
        }))
        .unwrap();

        let prompt = select_batch_prompt(&data, None);
        assert_eq!(prompt.source.as_deref(), Some("a"));
        assert_eq!(prompt.text, "first");
        assert_eq!(prompt.style_name, "Beach");
    }

    #[test]
    fn batch_prompt_honours_preferred_product() {
        let data = normalize_prompt_data(json!({
            "a": { "text": "first", "style_image": "Beach" },
            "b": { "text": "second", "style_image": "Studio" }
        }))
        .unwrap();

        let prompt = select_batch_prompt(&data, Some("b"));
        assert_eq!(prompt.text, "second");
        assert_eq!(prompt.style_name, "Studio");

        let fallback = select_batch_prompt(&data, Some("missing"));
        assert_eq!(fallback.source.as_deref(), Some("a"));
    }

    #[test]
    fn batch_prompt_falls_back_to_constants() {
        let prompt = select_batch_prompt(&PromptData::new(), None);
        assert_eq!(prompt.source, None);
        assert_eq!(prompt.text, DEFAULT_PROMPT_TEXT);
        assert_eq!(prompt.style_name, DEFAULT_STYLE_NAME);
    }
}
