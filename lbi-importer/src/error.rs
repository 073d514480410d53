//! Error types for lbi-importer
//!
//! Two layers:
//! - [`SubmitError`] is what a submission client reports for one batch. It tags the
//!   failure as transient (retry by re-running) or not.
//! - [`ImportError`] is what a whole import run reports. [`ImportError::Interrupted`]
//!   is the only variant that guarantees a checkpoint was written for the failure.

use crate::models::ListenParseError;
use thiserror::Error;

/// Exit code for failures the operator should fix or retry (credential, connectivity)
pub const EXIT_RETRY: u8 = 2;

/// Exit code for any other fatal failure
pub const EXIT_FATAL: u8 = 1;

/// Submission client errors
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Connection refused/reset or timed out
    #[error("Connection error: {0}")]
    Transient(String),

    #[error("Invalid ListenBrainz auth token")]
    InvalidToken,

    /// Service answered with a non-success status
    #[error("ListenBrainz rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Service answered 2xx but not with an acceptance
    #[error("Unexpected ListenBrainz response: {0}")]
    Unexpected(String),
}

impl SubmitError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SubmitError::Transient(_))
    }
}

/// Import run errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// Transient submission failure; `checkpoint` listens, the failed batch included,
    /// are recorded as processed
    #[error("Connection error or reset submitting listens, {checkpoint} processed listen(s) saved: {source}")]
    Interrupted {
        checkpoint: u64,
        #[source]
        source: SubmitError,
    },

    /// Non-transient submission failure, the in-flight batch is not recorded
    #[error("Submission failed: {0}")]
    Submission(#[from] SubmitError),

    #[error("Malformed record at line {line}: {source}")]
    MalformedRecord {
        line: u64,
        #[source]
        source: ListenParseError,
    },

    #[error("CSV read error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Progress store error: {0}")]
    Progress(#[from] lbi_common::Error),
}

impl ImportError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ImportError::Interrupted { .. })
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            ImportError::Interrupted { .. } => EXIT_RETRY,
            ImportError::Submission(SubmitError::InvalidToken) => EXIT_RETRY,
            _ => EXIT_FATAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connectivity_is_transient() {
        assert!(SubmitError::Transient("reset".into()).is_transient());
        assert!(!SubmitError::InvalidToken.is_transient());
        assert!(!SubmitError::Rejected {
            status: 400,
            message: "bad".into()
        }
        .is_transient());
        assert!(!SubmitError::Unexpected("status: error".into()).is_transient());
    }

    #[test]
    fn test_exit_codes() {
        let interrupted = ImportError::Interrupted {
            checkpoint: 2,
            source: SubmitError::Transient("reset".into()),
        };
        assert!(interrupted.is_transient());
        assert_eq!(interrupted.exit_code(), EXIT_RETRY);

        assert_eq!(
            ImportError::Submission(SubmitError::InvalidToken).exit_code(),
            EXIT_RETRY
        );

        let malformed = ImportError::MalformedRecord {
            line: 3,
            source: ListenParseError::FieldCount { found: 2 },
        };
        assert!(!malformed.is_transient());
        assert_eq!(malformed.exit_code(), EXIT_FATAL);
    }
}
