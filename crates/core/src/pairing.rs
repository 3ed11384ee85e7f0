//! Matching composite inputs to their masks.
//!
//! An input `look_01.png` pairs with a mask sharing its stem, trying
//! `look_01.jpg` first and `look_01.png` second. Extension comparison is
//! case-insensitive; stems must match exactly. Inputs without a mask are
//! reported as skipped rather than failing the batch.

use serde::Serialize;

use crate::naming::split_name;

/// Mask extensions tried for each input, in priority order.
pub const MASK_EXTENSIONS: &[&str] = &[".jpg", ".png"];

/// An input image and the mask that shares its base name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetPair {
    pub input: String,
    pub mask: String,
}

/// Result of pairing a set of inputs against a set of masks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pairing {
    /// Matched pairs, in input order.
    pub pairs: Vec<AssetPair>,
    /// Inputs with no matching mask, in input order.
    pub skipped: Vec<String>,
}

/// Pair each input filename with a mask filename.
pub fn pair_assets<I, M>(inputs: &[I], masks: &[M]) -> Pairing
where
    I: AsRef<str>,
    M: AsRef<str>,
{
    let mut pairing = Pairing::default();

    for input in inputs {
        let input = input.as_ref();
        let (stem, _) = split_name(input);

        match find_mask(stem, masks) {
            Some(mask) => {
                tracing::info!(input, mask, "Found matching input/mask pair");
                pairing.pairs.push(AssetPair {
                    input: input.to_string(),
                    mask: mask.to_string(),
                });
            }
            None => {
                tracing::warn!(input, "No mask found for input, skipping");
                pairing.skipped.push(input.to_string());
            }
        }
    }

    pairing
}

fn find_mask<'a, M: AsRef<str>>(stem: &str, masks: &'a [M]) -> Option<&'a str> {
    MASK_EXTENSIONS.iter().find_map(|wanted| {
        masks.iter().map(AsRef::as_ref).find(|mask| {
            let (mask_stem, mask_ext) = split_name(mask);
            mask_stem == stem && mask_ext.eq_ignore_ascii_case(wanted)
        })
    })
}
