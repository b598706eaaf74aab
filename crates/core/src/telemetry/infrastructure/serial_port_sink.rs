use std::io::Write;
use std::time::Duration;

use crate::telemetry::domain::metric_sink::MetricSink;

const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Writes status lines as raw ASCII to a serial device, with no delimiter.
pub struct SerialPortSink {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialPortSink {
    pub fn open(path: &str, baud: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(path, baud).timeout(WRITE_TIMEOUT).open()?;
        log::info!("Opened serial port {path} at {baud} baud");
        Ok(Self { port })
    }
}

impl MetricSink for SerialPortSink {
    fn send(&mut self, message: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.port.write_all(message.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }
}

/// Opens the serial sink, or logs a warning and returns `None`.
///
/// A missing device disables metric output for the process lifetime.
pub fn open_serial_sink(path: &str, baud: u32) -> Option<Box<dyn MetricSink>> {
    match SerialPortSink::open(path, baud) {
        Ok(sink) => Some(Box::new(sink)),
        Err(e) => {
            log::warn!("Serial port {path} unavailable ({e}); metrics will not be sent");
            None
        }
    }
}
