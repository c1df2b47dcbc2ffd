//! Hardware status codes and errors.

use std::fmt;
use thiserror::Error;

/// Outcome of a hardware command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HwStatus {
    /// No outcome recorded yet.
    #[default]
    Unset,
    /// The write was not attempted.
    Noop,
    Ok,
    /// Accepted; completes on flush.
    InProgress,
    /// Hardware rejected the input.
    Invalid,
    /// Hardware did not answer in time.
    Timeout,
}

impl HwStatus {
    /// Returns true if the command succeeded or is still on its way.
    pub fn is_success(&self) -> bool {
        matches!(self, HwStatus::Ok | HwStatus::Noop | HwStatus::InProgress)
    }

    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    pub fn into_result(self) -> HwResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(HwError::from_status(self))
        }
    }
}

impl fmt::Display for HwStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HwStatus::Unset => "unset",
            HwStatus::Noop => "noop",
            HwStatus::Ok => "ok",
            HwStatus::InProgress => "in-progress",
            HwStatus::Invalid => "invalid",
            HwStatus::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}

/// Error type for hardware operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HwError {
    #[error("hardware command failed: {status}")]
    Status { status: HwStatus },

    #[error("hardware rejected command: {message}")]
    Rejected { message: String },

    #[error("hardware timed out after {pending} pending commands")]
    Timeout { pending: usize },
}

impl HwError {
    pub fn from_status(status: HwStatus) -> Self {
        match status {
            HwStatus::Invalid => HwError::Rejected {
                message: format!("status {}", status),
            },
            HwStatus::Timeout => HwError::Timeout { pending: 0 },
            _ => HwError::Status { status },
        }
    }

    /// Returns true if retrying the flush may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HwError::Timeout { .. })
    }
}

/// Result type for hardware operations.
pub type HwResult<T> = Result<T, HwError>;
