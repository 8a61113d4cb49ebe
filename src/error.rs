//! The crate-wide [`Error`] type.

use std::io;
use std::time::Duration;

/// Convenience alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong while driving a program through a PTY.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `start` was called on a terminal that already holds a session.
    #[error("terminal already started")]
    AlreadyStarted,

    /// `setup` was called on a story that already ran (or is running).
    #[error("story has already been initialized")]
    AlreadyInitialized,

    /// An operation needed a running session but `start` was never called.
    #[error("terminal has not been started")]
    NotStarted,

    /// The input side of the PTY was already closed by `stop`.
    #[error("terminal input is closed")]
    Closed,

    /// The PTY could not be opened or the command could not be spawned.
    #[error("failed to start session: {0:#}")]
    Spawn(anyhow::Error),

    /// The active step was not matched within its own timeout.
    #[error("timed out while waiting for line {rule}: timeout {timeout:?}")]
    StepTimeout { rule: String, timeout: Duration },

    /// The whole story ran past its deadline.
    #[error("story timed out after {timeout:?}")]
    OverallTimeout { timeout: Duration },

    /// The story was cancelled by the caller.
    #[error("story cancelled")]
    Cancelled,

    /// Reading from or writing to the PTY failed.
    #[error("pty i/o error: {0}")]
    Io(#[from] io::Error),

    /// Both phases of [`Terminal::run`](crate::Terminal::run), whichever failed.
    #[error("{}", join_run_failures(.watch.as_deref(), .stop.as_deref()))]
    Run {
        watch: Option<Box<Error>>,
        stop: Option<Box<Error>>,
    },

    /// Failure raised by a custom [`Story`](crate::Story) implementation.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// True for a run that ended because the caller cancelled the story.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Run { watch, .. } => watch.as_deref().is_some_and(Error::is_cancelled),
            _ => false,
        }
    }

    /// True for a step or overall timeout, including one wrapped by `run`.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::StepTimeout { .. } | Error::OverallTimeout { .. } => true,
            Error::Run { watch, .. } => watch.as_deref().is_some_and(Error::is_timeout),
            _ => false,
        }
    }
}

fn join_run_failures(watch: Option<&Error>, stop: Option<&Error>) -> String {
    let mut msgs = Vec::new();
    if let Some(err) = watch {
        msgs.push(format!("run error: {err}"));
    }
    if let Some(err) = stop {
        msgs.push(format!("hang up error: {err}"));
    }
    msgs.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_error_joins_both_phases() {
        let err = Error::Run {
            watch: Some(Box::new(Error::Cancelled)),
            stop: Some(Box::new(Error::Closed)),
        };
        assert_eq!(
            err.to_string(),
            "run error: story cancelled; hang up error: terminal input is closed"
        );
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_run_error_with_single_phase() {
        let err = Error::Run {
            watch: None,
            stop: Some(Box::new(Error::Closed)),
        };
        assert_eq!(err.to_string(), "hang up error: terminal input is closed");
        assert!(!err.is_cancelled());
        assert!(!err.is_timeout());
    }

    #[test]
    fn test_step_timeout_names_rule_and_duration() {
        let err = Error::StepTimeout {
            rule: "\"Your age:\"".to_string(),
            timeout: Duration::from_millis(100),
        };
        assert_eq!(
            err.to_string(),
            "timed out while waiting for line \"Your age:\": timeout 100ms"
        );
        assert!(err.is_timeout());
    }
}
