use std::sync::Mutex;

use crate::detection::domain::detection_config::ModelVariant;

/// Most recent count and the variant that produced it.
///
/// Written by the acquisition loop after every frame, sampled by the
/// metric publisher on its own cadence.
pub struct LatestMetric {
    inner: Mutex<(usize, ModelVariant)>,
}

impl LatestMetric {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new((0, ModelVariant::Face)),
        }
    }

    pub fn update(&self, count: usize, variant: &ModelVariant) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        guard.0 = count;
        if guard.1 != *variant {
            guard.1 = variant.clone();
        }
    }

    pub fn sample(&self) -> (usize, ModelVariant) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Serial wire form, e.g. `N faces: 3`.
    pub fn status_line(&self) -> String {
        let (count, variant) = self.sample();
        format!("N {variant}: {count}")
    }
}

impl Default for LatestMetric {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_line() {
        assert_eq!(LatestMetric::new().status_line(), "N faces: 0");
    }

    #[test]
    fn test_update_replaces_count_and_variant() {
        let metric = LatestMetric::new();
        metric.update(3, &ModelVariant::Face);
        assert_eq!(metric.status_line(), "N faces: 3");
        metric.update(2, &ModelVariant::Eye);
        assert_eq!(metric.sample(), (2, ModelVariant::Eye));
        assert_eq!(metric.status_line(), "N eyes: 2");
    }

    #[test]
    fn test_unrecognized_variant_uses_raw_name() {
        let metric = LatestMetric::new();
        metric.update(0, &ModelVariant::Unrecognized("hands".into()));
        assert_eq!(metric.status_line(), "N hands: 0");
    }
}
