//! Error types for version resolution
//!
//! Every failure is returned to the caller; nothing in the library exits the
//! process.

use thiserror::Error;

use crate::calculator::CalculatorError;
use crate::record::RecordError;
use crate::snapshot::RestoreError;

/// Failures inside the snapshot window of a delegated increment.
#[derive(Debug, Error)]
pub enum CalculationError {
    #[error("could not write candidate version: {0}")]
    WriteCandidate(#[source] RecordError),

    #[error("calculator failed: {0}")]
    Calculator(#[from] CalculatorError),

    #[error("calculator left an unreadable version: {0}")]
    UnreadableResult(#[source] RecordError),
}

/// Main resolution error type
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("No version token given")]
    MissingInput,

    #[error("Invalid version format: '{0}'")]
    InvalidVersionFormat(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("Version calculation failed: {0}")]
    Calculation(#[from] CalculationError),

    /// The record could not be put back. Data-loss risk.
    #[error("FATAL: version record was not restored ({source}){}", pending_suffix(.pending))]
    RestoreFailed {
        #[source]
        source: RestoreError,
        pending: Option<String>,
    },
}

fn pending_suffix(pending: &Option<String>) -> String {
    pending
        .as_ref()
        .map(|p| format!("; calculation had also failed: {p}"))
        .unwrap_or_default()
}

impl ResolveError {
    /// Input problems the caller can fix by changing the request.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::MissingInput | Self::InvalidVersionFormat(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RestoreFailed { .. })
    }

    /// Exit code for command-line front ends.
    pub fn exit_code(&self) -> u8 {
        if self.is_fatal() {
            3
        } else if self.is_input_error() {
            2
        } else {
            1
        }
    }
}
