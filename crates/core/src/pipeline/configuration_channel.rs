use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::RwLock;

use crate::detection::domain::detection_config::{ColorMode, DetectionConfig, ModelVariant};
use crate::shared::constants::{
    MAX_MIN_NEIGHBORS, MAX_SCALE_FACTOR, MIN_MIN_NEIGHBORS, MIN_SCALE_FACTOR,
};

/// Thread-safe holder of the live [`DetectionConfig`].
///
/// Each field is written independently (last write wins) and read per frame
/// through [`snapshot`](Self::snapshot). Poisoned locks are recovered.
pub struct ConfigurationChannel {
    model_variant: RwLock<ModelVariant>,
    color_mode: RwLock<ColorMode>,
    scale_factor_bits: AtomicU64,
    min_neighbors: AtomicU32,
}

impl ConfigurationChannel {
    pub fn new() -> Self {
        Self::from_config(DetectionConfig::default())
    }

    /// Starts from `config`, clamping its numeric fields.
    pub fn from_config(config: DetectionConfig) -> Self {
        let channel = Self {
            model_variant: RwLock::new(config.model_variant),
            color_mode: RwLock::new(config.color_mode),
            scale_factor_bits: AtomicU64::new(0),
            min_neighbors: AtomicU32::new(0),
        };
        channel.set_scale_factor(config.scale_factor);
        channel.set_min_neighbors(config.min_neighbors);
        channel
    }

    pub fn set_model_variant(&self, variant: ModelVariant) {
        log::debug!("Model variant -> {variant}");
        *self
            .model_variant
            .write()
            .unwrap_or_else(|e| e.into_inner()) = variant;
    }

    pub fn set_color_mode(&self, mode: ColorMode) {
        log::debug!("Color mode -> {mode}");
        *self.color_mode.write().unwrap_or_else(|e| e.into_inner()) = mode;
    }

    /// Parses `name` leniently; unknown names are kept as `Unrecognized`.
    pub fn set_model_variant_name(&self, name: &str) {
        self.set_model_variant(ModelVariant::parse(name));
    }

    pub fn set_color_mode_name(&self, name: &str) {
        self.set_color_mode(ColorMode::parse(name));
    }

    /// Stores `value` clamped to `[1.01, 2.0]`. NaN falls back to the minimum.
    pub fn set_scale_factor(&self, value: f64) {
        let clamped = if value.is_nan() {
            MIN_SCALE_FACTOR
        } else {
            value.clamp(MIN_SCALE_FACTOR, MAX_SCALE_FACTOR)
        };
        if clamped != value {
            log::warn!("Scale factor {value} out of range, using {clamped}");
        }
        self.scale_factor_bits
            .store(clamped.to_bits(), Ordering::Release);
    }

    /// Stores `value` clamped to `[1, 10]`.
    pub fn set_min_neighbors(&self, value: u32) {
        let clamped = value.clamp(MIN_MIN_NEIGHBORS, MAX_MIN_NEIGHBORS);
        if clamped != value {
            log::warn!("Min neighbors {value} out of range, using {clamped}");
        }
        self.min_neighbors.store(clamped, Ordering::Release);
    }

    pub fn snapshot(&self) -> DetectionConfig {
        DetectionConfig {
            model_variant: self
                .model_variant
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            color_mode: self
                .color_mode
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .clone(),
            scale_factor: f64::from_bits(self.scale_factor_bits.load(Ordering::Acquire)),
            min_neighbors: self.min_neighbors.load(Ordering::Acquire),
        }
    }
}

impl Default for ConfigurationChannel {
    fn default() -> Self {
        Self::new()
    }
}
