//! Style-reference resolution.
//!
//! Prompt data names the style each product should use (`"Urban street"`)
//! while the style folder holds files such as `urban_street_women.png`.
//! Each required name is matched against the candidate file stems with a
//! scored heuristic:
//!
//! | Condition                                   | Score |
//! |---------------------------------------------|-------|
//! | required name contained in the file stem    | +1    |
//! | file stem contained in the required name    | +1    |
//! | exact match                                 | +10   |
//!
//! All comparisons are case-insensitive. The highest score wins, ties go
//! to the earliest candidate, and a name scoring zero everywhere is
//! missing.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

/// Score awarded for an exact (case-insensitive) stem match.
pub const EXACT_MATCH_SCORE: u32 = 10;

/// Score awarded for each direction of substring containment.
pub const CONTAINMENT_SCORE: u32 = 1;

/// Outcome of resolving a list of style names against the style folder.
#[derive(Debug, Clone, Default)]
pub struct StyleResolution {
    /// Required name -> matched file, in required order.
    pub matches: IndexMap<String, PathBuf>,
    /// Required names with no candidate scoring above zero.
    pub missing: Vec<String>,
}

impl StyleResolution {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Score how well `candidate_stem` matches `style_name`.
pub fn match_score(style_name: &str, candidate_stem: &str) -> u32 {
    let wanted = style_name.to_lowercase();
    let stem = candidate_stem.to_lowercase();

    let mut score = 0;
    if stem.contains(&wanted) {
        score += CONTAINMENT_SCORE;
    }
    if wanted.contains(&stem) {
        score += CONTAINMENT_SCORE;
    }
    if wanted == stem {
        score += EXACT_MATCH_SCORE;
    }
    score
}

/// Resolve every required style name to a candidate file.
pub fn resolve_styles<S: AsRef<str>>(required: &[S], candidates: &[PathBuf]) -> StyleResolution {
    let mut resolution = StyleResolution::default();

    for style_name in required {
        let style_name = style_name.as_ref();
        let mut best: Option<(&PathBuf, u32)> = None;

        for candidate in candidates {
            let score = match_score(style_name, file_stem(candidate));
            if score > best.map(|(_, s)| s).unwrap_or(0) {
                best = Some((candidate, score));
            }
        }

        match best {
            Some((path, score)) => {
                tracing::info!(
                    style = style_name,
                    file = %path.display(),
                    score,
                    "Matched style reference",
                );
                resolution.matches.insert(style_name.to_string(), path.clone());
            }
            None => {
                tracing::warn!(style = style_name, "No match found for style reference");
                resolution.missing.push(style_name.to_string());
            }
        }
    }

    resolution
}

fn file_stem(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("")
}
