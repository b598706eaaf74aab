use std::collections::HashSet;
use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::detection_config::{ColorMode, DetectionConfig, ModelVariant};
use crate::detection::domain::object_detector::ObjectDetector;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Outcome of running one frame through the pipeline.
#[derive(Clone, Debug)]
pub struct DetectionResult {
    pub count: usize,
    pub annotated_frame: Frame,
    /// Variant that produced `count`, so consumers label it consistently.
    pub model_variant: ModelVariant,
}

/// Per-frame pipeline: color conversion → detect → annotate.
///
/// Never fails. Unrecognized settings and detector errors degrade to an
/// unannotated frame with a zero count. Each kind of problem is reported
/// through the [`PipelineLogger`] once per run; repeats go to `debug`.
pub struct DetectionPipeline {
    face_detector: Box<dyn ObjectDetector>,
    eye_detector: Box<dyn ObjectDetector>,
    annotator: Box<dyn FrameAnnotator>,
    logger: Box<dyn PipelineLogger>,
    warned: HashSet<String>,
}

impl DetectionPipeline {
    pub fn new(
        face_detector: Box<dyn ObjectDetector>,
        eye_detector: Box<dyn ObjectDetector>,
        annotator: Box<dyn FrameAnnotator>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            face_detector,
            eye_detector,
            annotator,
            logger,
            warned: HashSet::new(),
        }
    }

    pub fn process(&mut self, frame: Frame, config: &DetectionConfig) -> DetectionResult {
        let t0 = Instant::now();
        let mut frame = match &config.color_mode {
            ColorMode::Color => frame,
            ColorMode::Grayscale => frame.to_grayscale(),
            ColorMode::Unrecognized(name) => {
                self.warn_once(
                    format!("color:{name}"),
                    format!("Unrecognized color mode '{name}', passing frames through unchanged"),
                );
                frame
            }
        };
        self.logger.timing("convert", elapsed_ms(t0));

        let t1 = Instant::now();
        let params = config.detector_params();
        let detected = match &config.model_variant {
            ModelVariant::Face => Some(self.face_detector.detect(&frame, &params)),
            ModelVariant::Eye => Some(self.eye_detector.detect(&frame, &params)),
            ModelVariant::Unrecognized(name) => {
                self.warn_once(
                    format!("model:{name}"),
                    format!("Unrecognized model '{name}', skipping detection"),
                );
                None
            }
        };
        let regions: Vec<Region> = match detected {
            Some(Ok(regions)) => regions,
            Some(Err(e)) => {
                self.warn_once(
                    format!("detect:{}", config.model_variant),
                    format!("{} detector failed: {e}", config.model_variant),
                );
                Vec::new()
            }
            None => Vec::new(),
        };
        self.logger.timing("detect", elapsed_ms(t1));

        let t2 = Instant::now();
        if !regions.is_empty() {
            if let Err(e) = self.annotator.annotate(&mut frame, &regions) {
                self.warn_once("annotate".to_string(), format!("Annotation failed: {e}"));
            }
        }
        self.logger.timing("annotate", elapsed_ms(t2));

        self.logger.metric("regions", regions.len() as f64);
        self.logger.frame_done();

        DetectionResult {
            count: regions.len(),
            annotated_frame: frame,
            model_variant: config.model_variant.clone(),
        }
    }

    /// Resets per-run logging state: aggregates and already-warned problems.
    pub fn begin_run(&mut self) {
        self.warned.clear();
        self.logger.run_started();
    }

    /// Hands the end-of-run summary to the logger.
    pub fn summary(&self) {
        self.logger.summary();
    }

    fn warn_once(&mut self, key: String, message: String) {
        if self.warned.insert(key) {
            self.logger.warn(&message);
        } else {
            log::debug!("{message}");
        }
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
