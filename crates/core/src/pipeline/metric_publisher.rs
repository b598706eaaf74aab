use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, Sender};

use crate::pipeline::latest_metric::LatestMetric;
use crate::telemetry::domain::metric_sink::MetricSink;

/// Background thread that writes the latest count to a [`MetricSink`]
/// every `interval`.
///
/// Without a sink no thread is started. The thread ends on [`stop`](Self::stop)
/// or drop, and hands the sink back on join.
pub struct MetricPublisher {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<Box<dyn MetricSink>>>,
}

impl MetricPublisher {
    pub fn spawn(
        latest: Arc<LatestMetric>,
        sink: Option<Box<dyn MetricSink>>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let Some(mut sink) = sink else {
            log::info!("No metric sink configured; publisher idle");
            return Ok(Self {
                shutdown: None,
                handle: None,
            });
        };

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("metric-publisher".into())
            .spawn(move || {
                let ticker = crossbeam_channel::tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let line = latest.status_line();
                            if let Err(e) = sink.send(&line) {
                                log::debug!("Metric write failed: {e}");
                            }
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                sink
            })?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Ends the thread and returns the sink, if one was running.
    pub fn stop(&mut self) -> Option<Box<dyn MetricSink>> {
        drop(self.shutdown.take());
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(sink) => Some(sink),
            Err(_) => {
                log::error!("Metric publisher thread panicked");
                None
            }
        }
    }
}

impl Drop for MetricPublisher {
    fn drop(&mut self) {
        self.stop();
    }
}
