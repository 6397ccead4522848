//! The fatal path.
//!
//! Library functions never exit. An application converts the errors it cannot
//! recover from into a [`FatalError`], lets it propagate to a single decision
//! point (usually `main`), and exits there once owned resources have been
//! dropped. [`check_or_abort`] keeps the immediate "report, clean up, exit"
//! form for callers that need it.

use std::io::{self, Write};
use std::process;

use thiserror::Error;
use tracing::error;

use crate::diagnostics::print_error;
use crate::error::{ClStatus, HostError};

/// An unrecoverable failure carrying the status used as process exit code.
#[derive(Debug, Error)]
#[error("{message} ({status})")]
pub struct FatalError {
    pub status: ClStatus,
    pub message: String,
    #[source]
    pub source: Option<HostError>,
}

impl FatalError {
    pub fn new(status: impl Into<ClStatus>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn from_host(source: HostError, message: impl Into<String>) -> Self {
        Self {
            status: source.status(),
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    /// Print the message, the translated status and the cause to stdout.
    /// The same failure is logged through `tracing`.
    pub fn report(&self) {
        error!(status = %self.status, code = self.status.0, "{}", self.message);
        print_error(self.status.0, &self.message);
        if let Some(source) = &self.source {
            println!("  caused by: {source}");
        }
    }

    /// Report and exit with the status as exit code.
    pub fn exit(self) -> ! {
        self.report();
        flush_and_exit(self.exit_code())
    }

    /// Report, run `cleanup`, then exit.
    pub fn terminate(self, cleanup: impl FnOnce()) -> ! {
        self.report();
        cleanup();
        flush_and_exit(self.exit_code())
    }
}

fn flush_and_exit(code: i32) -> ! {
    // process::exit skips destructors, including stdout's buffer.
    let _ = io::stdout().flush();
    process::exit(code)
}

/// `Ok(())` for `CL_SUCCESS`, otherwise a [`FatalError`] with `message`.
pub fn check(status: impl Into<ClStatus>, message: &str) -> Result<(), FatalError> {
    let status = status.into();
    if status.is_success() {
        Ok(())
    } else {
        Err(FatalError::new(status, message))
    }
}

/// Turn a library error into a [`FatalError`] at the decision point.
pub trait OrFatal<T> {
    fn or_fatal(self, message: &str) -> Result<T, FatalError>;
}

impl<T> OrFatal<T> for Result<T, HostError> {
    fn or_fatal(self, message: &str) -> Result<T, FatalError> {
        self.map_err(|source| FatalError::from_host(source, message))
    }
}

/// On failure: report, run `cleanup`, terminate the process with `status`.
pub fn check_or_abort(status: impl Into<ClStatus>, message: &str, cleanup: impl FnOnce()) {
    if let Err(fatal) = check(status, message) {
        fatal.terminate(cleanup);
    }
}

/// Runs a cleanup callback when dropped, unless disarmed.
pub struct CleanupGuard<F: FnOnce()> {
    cleanup: Option<F>,
}

impl<F: FnOnce()> CleanupGuard<F> {
    pub fn new(cleanup: F) -> Self {
        Self {
            cleanup: Some(cleanup),
        }
    }

    /// Drop the guard without running the callback.
    pub fn disarm(mut self) {
        self.cleanup = None;
    }
}

impl<F: FnOnce()> Drop for CleanupGuard<F> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::path::PathBuf;

    #[test]
    fn test_check_success() {
        assert!(check(0, "fine").is_ok());
    }

    #[test]
    fn test_check_failure_keeps_status() {
        let fatal = check(-5, "Failed to enqueue kernel").unwrap_err();
        assert_eq!(fatal.status, ClStatus(-5));
        assert_eq!(fatal.exit_code(), -5);
        assert_eq!(fatal.to_string(), "Failed to enqueue kernel (CL_OUT_OF_RESOURCES)");
    }

    #[test]
    fn test_or_fatal_uses_configuration_status() {
        let result: Result<(), HostError> = Err(HostError::BinaryNotFound {
            path: PathBuf::from("device.aocx"),
        });
        let fatal = result.or_fatal("Failed to create program").unwrap_err();
        assert_eq!(fatal.status, ClStatus::CONFIGURATION_ERROR);
        assert_eq!(fatal.exit_code(), -8888);
        assert!(fatal.source.is_some());
    }

    #[test]
    fn test_check_or_abort_returns_on_success() {
        let cleaned = Cell::new(false);
        check_or_abort(0, "unused", || cleaned.set(true));
        assert!(!cleaned.get());
    }

    #[test]
    fn test_cleanup_guard_runs_once() {
        let runs = Cell::new(0);
        {
            let _guard = CleanupGuard::new(|| runs.set(runs.get() + 1));
        }
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn test_disarmed_guard_does_not_run() {
        let runs = Cell::new(0);
        CleanupGuard::new(|| runs.set(runs.get() + 1)).disarm();
        assert_eq!(runs.get(), 0);
    }
}
