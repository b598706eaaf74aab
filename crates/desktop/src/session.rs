//! Background construction of the detection stack and its live handles.
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, TrySendError};

use facecount_core::annotation::infrastructure::rectangle_annotator::RectangleAnnotator;
use facecount_core::detection::infrastructure::cascade_resolver::load_detectors;
use facecount_core::pipeline::acquisition_loop::{AcquisitionLoop, AcquisitionOptions, RunStats};
use facecount_core::pipeline::configuration_channel::ConfigurationChannel;
use facecount_core::pipeline::detection_pipeline::{DetectionPipeline, DetectionResult};
use facecount_core::pipeline::latest_metric::LatestMetric;
use facecount_core::pipeline::metric_publisher::MetricPublisher;
use facecount_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facecount_core::shared::constants::{
    DEFAULT_SERIAL_BAUD, DEFAULT_SERIAL_DEVICE, METRIC_PUBLISH_INTERVAL,
};
use facecount_core::source::infrastructure::device_source_opener::DeviceSourceOpener;
use facecount_core::telemetry::infrastructure::serial_port_sink::open_serial_sink;

/// Results queued for the UI before older ones are dropped.
const DISPLAY_QUEUE: usize = 2;

/// Everything the window drives once the cascades are loaded.
///
/// Field order matters on drop: the loop stops before the publisher.
pub struct Session {
    pub acquisition: AcquisitionLoop,
    pub results: Receiver<DetectionResult>,
    _publisher: MetricPublisher,
}

impl Session {
    pub fn build() -> Result<Self, Box<dyn std::error::Error>> {
        let (face, eye) = load_detectors(None)?;
        let pipeline = DetectionPipeline::new(
            Box::new(face),
            Box::new(eye),
            Box::new(RectangleAnnotator::default()),
            Box::new(StdoutPipelineLogger::new()),
        );

        let latest = Arc::new(LatestMetric::new());
        let acquisition = AcquisitionLoop::new(
            pipeline,
            Arc::new(ConfigurationChannel::new()),
            Arc::clone(&latest),
            Arc::new(DeviceSourceOpener),
            AcquisitionOptions::default(),
        );

        let (tx, results) = crossbeam_channel::bounded(DISPLAY_QUEUE);
        acquisition.subscribe(move |result| match tx.try_send(result) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::trace!("Display busy, frame dropped"),
            Err(TrySendError::Disconnected(_)) => {}
        });

        let sink = open_serial_sink(DEFAULT_SERIAL_DEVICE, DEFAULT_SERIAL_BAUD);
        let publisher = MetricPublisher::spawn(latest, sink, METRIC_PUBLISH_INTERVAL)?;

        Ok(Self {
            acquisition,
            results,
            _publisher: publisher,
        })
    }

    /// Stops the loop and drops results still queued from that run.
    pub fn stop(&self) -> Option<RunStats> {
        let stats = self.acquisition.stop();
        discard_queued(&self.results);
        stats
    }
}

/// Empties the display queue, returning how many results were dropped.
fn discard_queued(results: &Receiver<DetectionResult>) -> usize {
    results.try_iter().count()
}

/// Builds a [`Session`] on a background thread; cascade resolution may download.
pub fn spawn_loader() -> Receiver<Result<Session, String>> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let session = Session::build().map_err(|e| e.to_string());
        if let Err(e) = &session {
            log::error!("Could not start detection: {e}");
        }
        let _ = tx.send(session);
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use facecount_core::detection::domain::detection_config::ModelVariant;
    use facecount_core::shared::frame::{Frame, PixelFormat};

    fn result(count: usize) -> DetectionResult {
        DetectionResult {
            count,
            annotated_frame: Frame::new(vec![0; 3], 1, 1, PixelFormat::Rgb8),
            model_variant: ModelVariant::Face,
        }
    }

    #[test]
    fn test_discard_queued_empties_full_queue() {
        let (tx, rx) = crossbeam_channel::bounded(DISPLAY_QUEUE);
        tx.try_send(result(1)).unwrap();
        tx.try_send(result(2)).unwrap();

        assert_eq!(discard_queued(&rx), 2);
        assert!(rx.try_recv().is_err());

        tx.try_send(result(3)).unwrap();
        assert_eq!(rx.try_recv().unwrap().count, 3);
    }
}
