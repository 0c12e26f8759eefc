//! Named telemetry channels
//!
//! A `Channel` is handed to the orchestrator explicitly instead of relying on a
//! process-wide journal. Records go through the `log` facade with the channel
//! name as target, so `RUST_LOG=insar.run=debug` selects one channel.

use log::Level;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Channel used by the InSAR workflow driver
    pub fn insar_run() -> Self {
        Self::new("insar.run")
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    /// Log a completed timed section as "<what> in <seconds> seconds"
    pub fn timing(&self, what: &str, elapsed: Duration) {
        self.info(&format!("{} in {:.3} seconds", what, elapsed.as_secs_f64()));
    }

    fn log(&self, level: Level, message: &str) {
        log::log!(target: self.name.as_str(), level, "{}", message);
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::insar_run()
    }
}
