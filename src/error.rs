//! Error types for the task runner and its collaborators.

/// Top-level error type for runners, hooks and devices.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The background task observed a state byte outside [`TaskState`](crate::TaskState).
    #[error("invalid task state: {0}")]
    InvalidState(u8),

    /// The background task was cancelled by scope exit.
    #[error("task cancelled")]
    Cancelled,

    /// A lifecycle hook failed.
    #[error("hook error: {0}")]
    Hook(String),

    /// The background task panicked.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// `enter` was called while a background task is still live.
    #[error("task runner already entered")]
    AlreadyEntered,

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Blocking-call offload failed.
    #[error("offload error: {0}")]
    Offload(String),

    /// The device has no usable connection.
    #[error("invalid device connection: {0}")]
    InvalidConnection(String),

    /// A shell command exited unsuccessfully under success validation.
    #[error("command `{command}` failed with status {status:?}: {stderr}")]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// Exit status, `None` when terminated by a signal.
        status: Option<i32>,
        /// Captured standard error.
        stderr: String,
    },

    /// Remote execution transport error.
    #[error("remote error: {0}")]
    Remote(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// Returns `true` for the cancellation artifact produced by scope exit.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, RunnerError>;
