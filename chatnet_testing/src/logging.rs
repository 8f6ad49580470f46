//! Shared log capture.
//!
//! `chatnet` logs through `tracing` with its `log` bridge enabled, so records
//! reach the process-wide [`logtest::Logger`]. Tests asserting on logs must
//! hold a [`LoggerHandle`] and run under `#[serial]`.

use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use logtest::Logger;
use rstest::fixture;

/// Exclusive access to the global capturing logger.
pub struct LoggerHandle {
    guard: MutexGuard<'static, Logger>,
}

impl Default for LoggerHandle {
    fn default() -> Self { Self::new() }
}

impl LoggerHandle {
    /// Acquire the logger, discarding records left by earlier tests.
    pub fn new() -> Self {
        static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

        let logger = LOGGER.get_or_init(|| Mutex::new(Logger::start()));
        let mut guard = logger.lock().unwrap_or_else(PoisonError::into_inner);
        while guard.pop().is_some() {}
        Self { guard }
    }

    /// Drain captured records and report whether any at `level` contains
    /// `needle`.
    pub fn contains(&mut self, level: log::Level, needle: &str) -> bool {
        let mut found = false;
        while let Some(record) = self.guard.pop() {
            found |= record.level() == level && record.args().contains(needle);
        }
        found
    }
}

impl std::ops::Deref for LoggerHandle {
    type Target = Logger;

    fn deref(&self) -> &Self::Target { &self.guard }
}

impl std::ops::DerefMut for LoggerHandle {
    fn deref_mut(&mut self) -> &mut Self::Target { &mut self.guard }
}

#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
#[fixture]
pub fn logger() -> LoggerHandle { LoggerHandle::new() }
