use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::pipeline::configuration_channel::ConfigurationChannel;
use crate::pipeline::detection_pipeline::{DetectionPipeline, DetectionResult};
use crate::pipeline::latest_metric::LatestMetric;
use crate::source::domain::frame_source::{
    AcquisitionSource, FrameSource, SourceError, SourceOpener,
};

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("acquisition is already running")]
    AlreadyRunning,
    #[error("cannot open source: {0}")]
    SourceUnavailable(#[source] SourceError),
    #[error("failed to spawn acquisition thread: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    StopRequested,
}

impl LoopState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => LoopState::Running,
            2 => LoopState::StopRequested,
            _ => LoopState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LoopState::Idle => 0,
            LoopState::Running => 1,
            LoopState::StopRequested => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcquisitionOptions {
    /// Minimum time between iterations. `None` runs flat out.
    pub frame_interval: Option<Duration>,
}

/// What one run did, returned when the worker is joined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub published: usize,
    pub skipped: usize,
    /// The source reported end of stream.
    pub exhausted: bool,
    /// Processing or a subscriber panicked and the run was abandoned.
    pub faulted: bool,
}

pub type Subscriber = Box<dyn FnMut(DetectionResult) + Send>;

/// State shared between the controller and the worker thread.
struct Shared {
    pipeline: Arc<Mutex<DetectionPipeline>>,
    config: Arc<ConfigurationChannel>,
    latest: Arc<LatestMetric>,
    subscribers: Mutex<Vec<Subscriber>>,
    state: AtomicU8,
    options: AcquisitionOptions,
}

impl Shared {
    fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LoopState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

struct Worker {
    handle: JoinHandle<RunStats>,
    cancel: Arc<AtomicBool>,
    /// Dropped on stop to cut a pacing wait short.
    wake: Sender<()>,
}

/// Owns the background acquire → detect → publish loop.
///
/// All methods take `&self`, so one instance can be shared between a UI
/// thread and signal handlers. `start` and `stop` are serialized by the
/// worker slot mutex.
pub struct AcquisitionLoop {
    shared: Arc<Shared>,
    opener: Arc<dyn SourceOpener>,
    worker: Mutex<Option<Worker>>,
}

impl AcquisitionLoop {
    pub fn new(
        pipeline: DetectionPipeline,
        config: Arc<ConfigurationChannel>,
        latest: Arc<LatestMetric>,
        opener: Arc<dyn SourceOpener>,
        options: AcquisitionOptions,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                pipeline: Arc::new(Mutex::new(pipeline)),
                config,
                latest,
                subscribers: Mutex::new(Vec::new()),
                state: AtomicU8::new(LoopState::Idle.as_u8()),
                options,
            }),
            opener,
            worker: Mutex::new(None),
        }
    }

    pub fn state(&self) -> LoopState {
        self.shared.state()
    }

    /// The pipeline, for one-off processing while the loop is idle.
    pub fn pipeline(&self) -> Arc<Mutex<DetectionPipeline>> {
        Arc::clone(&self.shared.pipeline)
    }

    pub fn configuration(&self) -> Arc<ConfigurationChannel> {
        Arc::clone(&self.shared.config)
    }

    pub fn latest_metric(&self) -> Arc<LatestMetric> {
        Arc::clone(&self.shared.latest)
    }

    /// Registers a display callback. Every published result reaches every
    /// subscriber; the last one registered receives the original frame.
    ///
    /// Callbacks run on the worker thread and must not call back into
    /// `subscribe`.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: FnMut(DetectionResult) + Send + 'static,
    {
        lock(&self.shared.subscribers).push(Box::new(callback));
    }

    pub fn start(&self, source: AcquisitionSource) -> Result<(), AcquisitionError> {
        let mut slot = lock(&self.worker);
        if self.shared.state() != LoopState::Idle {
            return Err(AcquisitionError::AlreadyRunning);
        }
        // A run that ended on its own leaves a finished worker behind.
        if let Some(finished) = slot.take() {
            join_worker(finished);
        }

        let frame_source = self
            .opener
            .open(&source)
            .map_err(AcquisitionError::SourceUnavailable)?;

        let cancel = Arc::new(AtomicBool::new(false));
        let (wake_tx, wake_rx) = crossbeam_channel::bounded::<()>(0);

        self.shared.set_state(LoopState::Running);
        let shared = Arc::clone(&self.shared);
        let worker_cancel = Arc::clone(&cancel);
        let spawned = thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || run(&shared, frame_source, &worker_cancel, &wake_rx));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.set_state(LoopState::Idle);
                return Err(AcquisitionError::Spawn(e));
            }
        };

        log::info!("Acquisition started on {source}");
        *slot = Some(Worker {
            handle,
            cancel,
            wake: wake_tx,
        });
        Ok(())
    }

    /// Cancels the run and waits for the worker. No-op when idle.
    ///
    /// After this returns no subscriber is invoked and the source is closed.
    pub fn stop(&self) -> Option<RunStats> {
        let mut slot = lock(&self.worker);
        let worker = slot.take()?;

        self.shared.set_state(LoopState::StopRequested);
        worker.cancel.store(true, Ordering::Release);
        let stats = join_worker(worker);
        self.shared.set_state(LoopState::Idle);
        stats
    }
}

impl Drop for AcquisitionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_worker(worker: Worker) -> Option<RunStats> {
    drop(worker.wake);
    match worker.handle.join() {
        Ok(stats) => Some(stats),
        Err(_) => {
            log::error!("Acquisition worker panicked");
            None
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn run(
    shared: &Shared,
    mut source: Box<dyn FrameSource>,
    cancel: &AtomicBool,
    wake: &Receiver<()>,
) -> RunStats {
    let _idle = IdleOnExit(&shared.state);
    let mut stats = RunStats::default();
    lock(&shared.pipeline).begin_run();

    while !cancel.load(Ordering::Acquire) {
        let started = Instant::now();
        let config = shared.config.snapshot();

        match source.next_frame() {
            Ok(frame) => {
                let step = panic::catch_unwind(AssertUnwindSafe(|| {
                    let result = lock(&shared.pipeline).process(frame, &config);
                    shared.latest.update(result.count, &result.model_variant);
                    publish(&shared.subscribers, result);
                }));
                if step.is_err() {
                    log::error!("Frame processing panicked, ending acquisition run");
                    stats.faulted = true;
                    break;
                }
                stats.published += 1;
            }
            Err(e) if e.is_transient() => {
                log::debug!("Skipping frame: {e}");
                stats.skipped += 1;
            }
            Err(SourceError::EndOfStream) => {
                log::info!("Source reached end of stream");
                stats.exhausted = true;
                break;
            }
            Err(e) => {
                log::warn!("Frame source failed: {e}");
                break;
            }
        }

        if let Some(interval) = shared.options.frame_interval {
            if let Some(remaining) = interval.checked_sub(started.elapsed()) {
                // Returns early once the controller drops its sender.
                let _ = wake.recv_timeout(remaining);
            }
        }
    }

    drop(source);
    lock(&shared.pipeline).summary();
    log::info!(
        "Acquisition finished: {} frames published, {} reads skipped",
        stats.published,
        stats.skipped
    );

    stats
}

/// Moves a run that ended by itself back to Idle, including on unwind.
/// A stop in progress owns the transition instead.
struct IdleOnExit<'a>(&'a AtomicU8);

impl Drop for IdleOnExit<'_> {
    fn drop(&mut self) {
        let _ = self.0.compare_exchange(
            LoopState::Running.as_u8(),
            LoopState::Idle.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

fn publish(subscribers: &Mutex<Vec<Subscriber>>, result: DetectionResult) {
    let mut subscribers = lock(subscribers);
    if let Some((last, rest)) = subscribers.split_last_mut() {
        for subscriber in rest {
            subscriber(result.clone());
        }
        last(result);
    }
}
