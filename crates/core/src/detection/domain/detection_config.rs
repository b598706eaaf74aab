use std::fmt;

use crate::shared::constants::{DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_FACTOR};

/// Which pretrained cascade to run.
///
/// Names typed by a user can fall outside the two built-in variants; those are
/// kept as `Unrecognized` so the pipeline can degrade instead of failing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    Face,
    Eye,
    Unrecognized(String),
}

impl ModelVariant {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "face" | "faces" => ModelVariant::Face,
            "eye" | "eyes" => ModelVariant::Eye,
            _ => ModelVariant::Unrecognized(name.to_string()),
        }
    }

    /// Wire name used in the serial status line.
    pub fn as_str(&self) -> &str {
        match self {
            ModelVariant::Face => "faces",
            ModelVariant::Eye => "eyes",
            ModelVariant::Unrecognized(name) => name,
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColorMode {
    Color,
    Grayscale,
    Unrecognized(String),
}

impl ColorMode {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "rgb" | "color" | "colour" => ColorMode::Color,
            "gray" | "grey" | "grayscale" => ColorMode::Grayscale,
            _ => ColorMode::Unrecognized(name.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ColorMode::Color => "rgb",
            ColorMode::Grayscale => "gray",
            ColorMode::Unrecognized(name) => name,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cascade tuning knobs passed through to the detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorParams {
    /// Pyramid step between scales; must be > 1.0.
    pub scale_factor: f64,
    /// Raw hits a cluster needs (exclusive) to count as a detection.
    pub min_neighbors: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
        }
    }
}

/// A consistent view of the pipeline settings for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionConfig {
    pub model_variant: ModelVariant,
    pub color_mode: ColorMode,
    pub scale_factor: f64,
    pub min_neighbors: u32,
}

impl DetectionConfig {
    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            model_variant: ModelVariant::Face,
            color_mode: ColorMode::Color,
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case::faces("faces", ModelVariant::Face)]
    #[case::face_upper("FACE", ModelVariant::Face)]
    #[case::eyes("eyes", ModelVariant::Eye)]
    #[case::eye_padded(" eye ", ModelVariant::Eye)]
    #[case::unknown("hands", ModelVariant::Unrecognized("hands".into()))]
    fn test_model_variant_parse(#[case] input: &str, #[case] expected: ModelVariant) {
        assert_eq!(ModelVariant::parse(input), expected);
    }

    #[rstest]
    #[case::rgb("rgb", ColorMode::Color)]
    #[case::colour("Colour", ColorMode::Color)]
    #[case::gray("gray", ColorMode::Grayscale)]
    #[case::grayscale("grayscale", ColorMode::Grayscale)]
    #[case::sepia("sepia", ColorMode::Unrecognized("sepia".into()))]
    fn test_color_mode_parse(#[case] input: &str, #[case] expected: ColorMode) {
        assert_eq!(ColorMode::parse(input), expected);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(ModelVariant::Face.to_string(), "faces");
        assert_eq!(ModelVariant::Eye.to_string(), "eyes");
        assert_eq!(ModelVariant::Unrecognized("hands".into()).to_string(), "hands");
        assert_eq!(ColorMode::Grayscale.to_string(), "gray");
    }

    #[test]
    fn test_default_tuning() {
        let config = DetectionConfig::default();
        assert_eq!(config.model_variant, ModelVariant::Face);
        assert_eq!(config.color_mode, ColorMode::Color);
        assert_relative_eq!(config.scale_factor, 1.5);
        assert_eq!(config.min_neighbors, 5);
        assert_eq!(config.detector_params(), DetectorParams::default());
    }
}
