//! Face-box geometry for the renaming pipeline.
//!
//! Detectors report boxes in coordinates relative to the image (0.0 - 1.0).
//! A photo "has a valid face" when at least one box is confident enough,
//! sits high enough in the frame and is tall enough in pixels. Close-up
//! product shots either have no face or only a cropped chin at the top.

use serde::{Deserialize, Serialize};

/// A detected face in relative coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    /// Top edge, relative to image height.
    pub ymin: f32,
    /// Box height, relative to image height.
    pub height: f32,
    /// Detector confidence.
    pub score: f32,
}

impl FaceBox {
    /// Bottom edge, relative to image height.
    pub fn ymax(&self) -> f32 {
        self.ymin + self.height
    }
}

/// Thresholds for accepting a detected face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRules {
    pub min_confidence: f32,
    pub max_face_bottom_ratio: f32,
    pub min_face_height_px: u32,
}

impl Default for FaceRules {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            max_face_bottom_ratio: 0.65,
            min_face_height_px: 40,
        }
    }
}

impl FaceRules {
    /// Whether a single box passes every threshold for an image `image_height`
    /// pixels tall.
    pub fn accepts(&self, face: &FaceBox, image_height: u32) -> bool {
        if face.score < self.min_confidence {
            return false;
        }
        if face.ymax() > self.max_face_bottom_ratio {
            return false;
        }
        let height_px = face.height * image_height as f32;
        height_px >= self.min_face_height_px as f32
    }
}

/// Whether any of `faces` is acceptable under `rules`.
pub fn has_valid_face(faces: &[FaceBox], image_height: u32, rules: &FaceRules) -> bool {
    faces.iter().any(|f| rules.accepts(f, image_height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(ymin: f32, height: f32, score: f32) -> FaceBox {
        FaceBox { ymin, height, score }
    }

    #[test]
    fn portrait_face_is_valid() {
        // 1000px tall image, face 100px tall ending at 30%.
        let faces = [face(0.2, 0.1, 0.9)];
        assert!(has_valid_face(&faces, 1000, &FaceRules::default()));
    }

    #[test]
    fn low_confidence_is_rejected() {
        let faces = [face(0.2, 0.1, 0.3)];
        assert!(!has_valid_face(&faces, 1000, &FaceRules::default()));
    }

    #[test]
    fn face_too_low_in_frame_is_rejected() {
        // Bottom edge at 0.8 > 0.65.
        let faces = [face(0.7, 0.1, 0.9)];
        assert!(!has_valid_face(&faces, 1000, &FaceRules::default()));
    }

    #[test]
    fn tiny_face_is_rejected() {
        // 0.05 * 400 = 20px < 40px.
        let faces = [face(0.1, 0.05, 0.9)];
        assert!(!has_valid_face(&faces, 400, &FaceRules::default()));
    }

    #[test]
    fn any_acceptable_box_is_enough() {
        let faces = [face(0.7, 0.1, 0.9), face(0.1, 0.2, 0.8)];
        assert!(has_valid_face(&faces, 1000, &FaceRules::default()));
    }

    #[test]
    fn no_faces_is_invalid() {
        assert!(!has_valid_face(&[], 1000, &FaceRules::default()));
    }

    #[test]
    fn thresholds_are_inclusive() {
        let rules = FaceRules {
            max_face_bottom_ratio: 0.625,
            ..FaceRules::default()
        };
        // Exactly 40px tall, exactly 0.5 confidence, bottom exactly 0.625.
        assert!(rules.accepts(&face(0.125, 0.5, 0.5), 80));
    }

    #[test]
    fn custom_rules_apply() {
        let rules = FaceRules {
            min_confidence: 0.95,
            ..FaceRules::default()
        };
        assert!(!rules.accepts(&face(0.2, 0.1, 0.9), 1000));
    }
}
