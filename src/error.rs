//! Error types for macrompi

use crate::datatype::ElementKind;
use crate::runtime::Lifecycle;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for macrompi operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for runtime discovery, collectives and progress logging
#[derive(Error, Debug)]
pub enum Error {
    /// No MPI runtime library was found on this host
    #[error("no MPI runtime found (searched {} locations)", searched.len())]
    RuntimeUnavailable {
        /// Directories and files that were inspected, in search order
        searched: Vec<PathBuf>,
    },

    /// The runtime library could not be opened
    #[error("failed to load MPI runtime {}: {source}", path.display())]
    Load {
        /// Path that was handed to the dynamic loader
        path: PathBuf,
        /// Loader error
        #[source]
        source: libloading::Error,
    },

    /// A required entry point could not be resolved
    #[error("failed to resolve `{symbol}`: {source}")]
    Bind {
        /// Symbol name
        symbol: &'static str,
        /// Loader error
        #[source]
        source: libloading::Error,
    },

    /// Operation invoked outside the lifecycle state it requires
    #[error("`{operation}` is not allowed while the runtime is {state}")]
    State {
        /// Name of the rejected operation
        operation: &'static str,
        /// State the communicator was in
        state: Lifecycle,
    },

    /// MPI has already been initialized in this process
    #[error("MPI has already been initialized")]
    AlreadyInitialized,

    /// The bound runtime has no datatype for this element kind
    #[error("unsupported element kind: {0:?}")]
    UnsupportedElement(ElementKind),

    /// Invalid rank specified
    #[error("Invalid rank: {0}")]
    InvalidRank(i32),

    /// Invalid count specified
    #[error("Invalid count: {0}")]
    InvalidCount(i64),

    /// Invalid buffer provided
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),

    /// A token of the array text could not be parsed as a number
    #[error("cannot parse `{token}` as a number")]
    Parse {
        /// Offending token, trimmed
        token: String,
    },

    /// Progress was reported for a task that was never added
    #[error("task {0} does not exist")]
    UnknownTask(i32),

    /// Progress percentage outside `[0, 100]`
    #[error("progress {progress} for task {task} is outside [0, 100]")]
    ProgressOutOfRange {
        /// Task id
        task: usize,
        /// Rejected value
        progress: i32,
        /// Last accepted value for the task, if any
        last: Option<i32>,
    },

    /// Tasks can no longer be added once the task table was written
    #[error("the task table has already been reported")]
    TasksFrozen,

    /// Log file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MPI error with code
    #[error("MPI error (code {0})")]
    MpiError(i32),
}

impl Error {
    /// Check an MPI return code, returning Ok(()) for success.
    pub fn check(code: i32) -> Result<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(Error::MpiError(code))
        }
    }

    /// Negative status code reported across the macro host boundary.
    ///
    /// `-1` is the generic failure value; the remaining codes let a caller
    /// tell the error classes apart without string matching.
    pub fn status(&self) -> i32 {
        match self {
            Error::RuntimeUnavailable { .. } => -2,
            Error::Load { .. } | Error::Bind { .. } => -3,
            Error::State { .. } | Error::AlreadyInitialized => -4,
            Error::UnsupportedElement(_) => -5,
            Error::Io(_) => -6,
            Error::UnknownTask(_) | Error::ProgressOutOfRange { .. } => -7,
            Error::InvalidRank(_)
            | Error::InvalidCount(_)
            | Error::InvalidBuffer(_)
            | Error::Parse { .. }
            | Error::TasksFrozen
            | Error::MpiError(_) => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_success_and_failure() {
        assert!(Error::check(0).is_ok());
        assert!(matches!(Error::check(15), Err(Error::MpiError(15))));
    }

    #[test]
    fn status_codes_are_negative() {
        let errors = [
            Error::RuntimeUnavailable { searched: vec![] },
            Error::AlreadyInitialized,
            Error::UnsupportedElement(ElementKind::Bool),
            Error::InvalidRank(7),
            Error::UnknownTask(3),
            Error::TasksFrozen,
            Error::MpiError(1),
            Error::Io(std::io::Error::other("disk full")),
        ];
        for err in &errors {
            assert!(err.status() < 0, "{err} mapped to {}", err.status());
        }
    }

    #[test]
    fn state_error_names_operation() {
        let err = Error::State {
            operation: "barrier",
            state: Lifecycle::Bound,
        };
        assert_eq!(
            err.to_string(),
            "`barrier` is not allowed while the runtime is bound"
        );
    }
}
