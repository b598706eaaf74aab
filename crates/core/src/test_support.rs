//! Shared test doubles: scripted sources, recording sinks and tiny cascades.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::annotation::infrastructure::rectangle_annotator::RectangleAnnotator;
use crate::detection::infrastructure::cascade_detector::CascadeDetector;
use crate::detection::infrastructure::haar_cascade::HaarCascade;
use crate::pipeline::detection_pipeline::DetectionPipeline;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::frame::{Frame, PixelFormat};
use crate::source::domain::frame_source::{
    AcquisitionSource, FrameSource, SourceError, SourceOpener,
};
use crate::telemetry::domain::metric_sink::MetricSink;

/// 20x20 cascade with a single stump: fires when the central 4x4 patch is
/// bright relative to the window's contrast. Any fully white window passes.
pub const SQUARE_CASCADE_XML: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier">
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>20</height>
  <width>20</width>
  <stageParams>
    <maxWeakCount>1</maxWeakCount></stageParams>
  <featureParams>
    <maxCatCount>0</maxCatCount></featureParams>
  <stageNum>1</stageNum>
  <stages>
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 2000.</internalNodes>
          <leafValues>
            -1. 1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          8 8 4 4 1.</_></rects></_></features></cascade>
</opencv_storage>
"#;

/// Same layout, but the stage threshold is out of reach of any leaf sum.
pub const NEVER_CASCADE_XML: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade type_id="opencv-cascade-classifier">
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>20</height>
  <width>20</width>
  <stages>
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>2.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 0.</internalNodes>
          <leafValues>
            -1. 1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          0 0 20 20 1.</_></rects></_></features></cascade>
</opencv_storage>
"#;

/// 200x100 black frame with white 40x40 squares at (20, 20) and (120, 20).
pub fn two_squares_frame(format: PixelFormat) -> Frame {
    let (w, h) = (200usize, 100usize);
    let channels = format.channels() as usize;
    let mut data = vec![0u8; w * h * channels];
    for (sx, sy) in [(20usize, 20usize), (120, 20)] {
        for y in sy..sy + 40 {
            let row = (y * w + sx) * channels;
            data[row..row + 40 * channels].fill(255);
        }
    }
    Frame::new(data, w as u32, h as u32, format)
}

/// Faces detected by [`SQUARE_CASCADE_XML`], eyes by [`NEVER_CASCADE_XML`].
pub fn square_pipeline() -> DetectionPipeline {
    let detector = |xml: &str| {
        Box::new(CascadeDetector::new(
            HaarCascade::from_xml(xml).expect("test cascade parses"),
        ))
    };
    DetectionPipeline::new(
        detector(SQUARE_CASCADE_XML),
        detector(NEVER_CASCADE_XML),
        Box::new(RectangleAnnotator::default()),
        Box::new(NullPipelineLogger),
    )
}

/// Replays a fixed script, then repeats a frame forever or reports end of stream.
pub struct ScriptedSource {
    script: VecDeque<Result<Frame, SourceError>>,
    then: Option<Frame>,
}

impl ScriptedSource {
    pub fn finite(script: Vec<Result<Frame, SourceError>>) -> Self {
        Self {
            script: script.into(),
            then: None,
        }
    }

    pub fn repeating(script: Vec<Result<Frame, SourceError>>, frame: Frame) -> Self {
        Self {
            script: script.into(),
            then: Some(frame),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        if let Some(next) = self.script.pop_front() {
            return next;
        }
        self.then.clone().ok_or(SourceError::EndOfStream)
    }
}

type MakeSource = dyn Fn() -> Result<Box<dyn FrameSource>, SourceError> + Send + Sync;

/// Builds a fresh source per `open`, ignoring the descriptor.
pub struct FakeOpener {
    make: Box<MakeSource>,
    opened: Arc<Mutex<Vec<AcquisitionSource>>>,
}

impl FakeOpener {
    pub fn new<F>(make: F) -> Self
    where
        F: Fn() -> Result<Box<dyn FrameSource>, SourceError> + Send + Sync + 'static,
    {
        Self {
            make: Box::new(make),
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn opened(&self) -> Arc<Mutex<Vec<AcquisitionSource>>> {
        Arc::clone(&self.opened)
    }
}

impl SourceOpener for FakeOpener {
    fn open(&self, source: &AcquisitionSource) -> Result<Box<dyn FrameSource>, SourceError> {
        self.opened.lock().unwrap().push(source.clone());
        (self.make)()
    }
}

/// Sink that records every message, or rejects every write when failing.
#[derive(Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<String>>>,
    attempts: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl MetricSink for RecordingSink {
    fn send(&mut self, message: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err("port closed".into());
        }
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Pipeline logger whose records stay readable through clones.
#[derive(Clone, Default)]
pub struct SharedLog {
    warnings: Arc<Mutex<Vec<String>>>,
    frames: Arc<AtomicUsize>,
    runs: Arc<AtomicUsize>,
}

impl SharedLog {
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl PipelineLogger for SharedLog {
    fn run_started(&mut self) {
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
    fn frame_done(&mut self) {
        self.frames.fetch_add(1, Ordering::SeqCst);
    }
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn warn(&mut self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}
