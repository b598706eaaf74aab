use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use serde::Serialize;

use facecount_core::annotation::infrastructure::image_file_writer::write_frame;
use facecount_core::annotation::infrastructure::rectangle_annotator::RectangleAnnotator;
use facecount_core::detection::domain::detection_config::{
    ColorMode, DetectionConfig, ModelVariant,
};
use facecount_core::detection::infrastructure::cascade_resolver::load_detectors;
use facecount_core::pipeline::acquisition_loop::{
    AcquisitionLoop, AcquisitionOptions, LoopState,
};
use facecount_core::pipeline::configuration_channel::ConfigurationChannel;
use facecount_core::pipeline::detection_pipeline::{DetectionPipeline, DetectionResult};
use facecount_core::pipeline::latest_metric::LatestMetric;
use facecount_core::pipeline::metric_publisher::MetricPublisher;
use facecount_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facecount_core::shared::constants::{
    DEFAULT_CAMERA_INDEX, DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_FACTOR, DEFAULT_SERIAL_BAUD,
    DEFAULT_SERIAL_DEVICE, METRIC_PUBLISH_INTERVAL,
};
use facecount_core::source::domain::frame_source::{AcquisitionSource, FrameSource};
use facecount_core::source::infrastructure::device_source_opener::DeviceSourceOpener;
use facecount_core::source::infrastructure::file_static_source::FileStaticSource;
use facecount_core::telemetry::infrastructure::serial_port_sink::open_serial_sink;

/// How often the main thread checks whether the loop ended on its own.
const IDLE_POLL: Duration = Duration::from_millis(200);

/// Count faces or eyes from a camera or a still image.
#[derive(Parser)]
#[command(name = "facecount")]
struct Cli {
    /// Camera device index (default when no --file is given).
    #[arg(long, conflicts_with = "file")]
    camera: Option<u32>,

    /// Still image, re-read on every iteration.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Cascade to run: faces or eyes.
    #[arg(long, default_value = "faces")]
    model: String,

    /// Detection input: rgb or gray.
    #[arg(long, default_value = "rgb")]
    color: String,

    /// Pyramid scale step (1.01-2.0).
    #[arg(long, default_value_t = DEFAULT_SCALE_FACTOR)]
    scale_factor: f64,

    /// Neighbouring hits required per detection (1-10).
    #[arg(long, default_value_t = DEFAULT_MIN_NEIGHBORS)]
    min_neighbors: u32,

    /// Serial device receiving "N faces: <count>" status lines.
    #[arg(long, default_value = DEFAULT_SERIAL_DEVICE)]
    serial_port: String,

    #[arg(long, default_value_t = DEFAULT_SERIAL_BAUD)]
    baud: u32,

    /// Stop after this many processed frames.
    #[arg(long)]
    frames: Option<usize>,

    /// Upper bound on frames processed per second.
    #[arg(long)]
    fps: Option<f64>,

    /// Process the --file image once and exit.
    #[arg(long, requires = "file")]
    once: bool,

    /// Where --once writes the annotated image.
    #[arg(long, requires = "once")]
    output: Option<PathBuf>,

    /// Print one JSON report per frame on stdout.
    #[arg(long)]
    json: bool,

    /// Directory holding cascade XML files, checked before the download cache.
    #[arg(long)]
    cascade_dir: Option<PathBuf>,
}

#[derive(Serialize, Debug, PartialEq)]
struct FrameReport {
    frame: usize,
    model: String,
    count: usize,
    width: u32,
    height: u32,
}

impl FrameReport {
    fn new(frame: usize, result: &DetectionResult) -> Self {
        Self {
            frame,
            model: result.model_variant.to_string(),
            count: result.count,
            width: result.annotated_frame.width(),
            height: result.annotated_frame.height(),
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let pipeline = build_pipeline(cli.cascade_dir.as_deref())?;
    let config = detection_config(&cli);

    match (&cli.file, cli.once) {
        (Some(path), true) => run_once(&cli, path, pipeline, &config),
        _ => run_live(&cli, pipeline, config),
    }
}

fn build_pipeline(cascade_dir: Option<&Path>) -> Result<DetectionPipeline, Box<dyn std::error::Error>> {
    let (face, eye) = load_detectors(cascade_dir)?;
    Ok(DetectionPipeline::new(
        Box::new(face),
        Box::new(eye),
        Box::new(RectangleAnnotator::default()),
        Box::new(StdoutPipelineLogger::new()),
    ))
}

fn detection_config(cli: &Cli) -> DetectionConfig {
    DetectionConfig {
        model_variant: ModelVariant::parse(&cli.model),
        color_mode: ColorMode::parse(&cli.color),
        scale_factor: cli.scale_factor,
        min_neighbors: cli.min_neighbors,
    }
}

fn run_once(
    cli: &Cli,
    path: &Path,
    mut pipeline: DetectionPipeline,
    config: &DetectionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let frame = FileStaticSource::open(path)?.next_frame()?;
    // Same clamping the live loop applies.
    let config = ConfigurationChannel::from_config(config.clone()).snapshot();
    let result = pipeline.process(frame, &config);
    pipeline.summary();

    emit(&FrameReport::new(1, &result), cli.json)?;
    if let Some(output) = &cli.output {
        write_frame(output, &result.annotated_frame)?;
        log::info!("Annotated image written to {}", output.display());
    }
    Ok(())
}

fn run_live(
    cli: &Cli,
    pipeline: DetectionPipeline,
    config: DetectionConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let latest = Arc::new(LatestMetric::new());
    let acquisition = AcquisitionLoop::new(
        pipeline,
        Arc::new(ConfigurationChannel::from_config(config)),
        Arc::clone(&latest),
        Arc::new(DeviceSourceOpener),
        AcquisitionOptions {
            frame_interval: frame_interval(cli.fps),
        },
    );

    let (report_tx, report_rx) = crossbeam_channel::unbounded::<FrameReport>();
    let mut index = 0;
    acquisition.subscribe(move |result| {
        index += 1;
        let _ = report_tx.send(FrameReport::new(index, &result));
    });

    let sink = open_serial_sink(&cli.serial_port, cli.baud);
    let mut publisher = MetricPublisher::spawn(latest, sink, METRIC_PUBLISH_INTERVAL)?;

    acquisition.start(source(cli))?;

    let mut received = 0;
    loop {
        match report_rx.recv_timeout(IDLE_POLL) {
            Ok(report) => {
                emit(&report, cli.json)?;
                received += 1;
                if cli.frames.is_some_and(|limit| received >= limit) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if acquisition.state() == LoopState::Idle {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let stats = acquisition.stop();
    publisher.stop();
    match stats {
        Some(stats) if !stats.faulted => {
            log::info!(
                "Run finished: {} frames, {} skipped reads",
                stats.published,
                stats.skipped
            );
            Ok(())
        }
        _ => Err("acquisition run aborted after a panic".into()),
    }
}

fn source(cli: &Cli) -> AcquisitionSource {
    match &cli.file {
        Some(path) => AcquisitionSource::FileStatic(path.clone()),
        None => AcquisitionSource::Camera(cli.camera.unwrap_or(DEFAULT_CAMERA_INDEX)),
    }
}

fn emit(report: &FrameReport, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        log::info!(
            "Frame {}: {} {} ({}x{})",
            report.frame,
            report.count,
            report.model,
            report.width,
            report.height
        );
    }
    Ok(())
}

fn frame_interval(fps: Option<f64>) -> Option<Duration> {
    fps.map(|f| Duration::from_secs_f64(1.0 / f))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &cli.file {
        if !path.is_file() {
            return Err(format!("Input file not found: {}", path.display()).into());
        }
    }
    if let Some(fps) = cli.fps {
        if !(fps > 0.0 && fps.is_finite()) {
            return Err(format!("FPS must be a positive number, got {fps}").into());
        }
    }
    if cli.frames == Some(0) {
        return Err("--frames must be at least 1".into());
    }
    Ok(())
}
