/// Outbound channel for periodic status lines (serial port, test recorder).
pub trait MetricSink: Send {
    fn send(&mut self, message: &str) -> Result<(), Box<dyn std::error::Error>>;
}
