//! Error types for segue-engine
//!
//! Defines the engine error taxonomy using thiserror for clear error
//! propagation. A rejected re-entrant processing pass is deliberately not an
//! error; it is reported through metrics and events instead.

use thiserror::Error;

/// Main error type for the sequencing and transition engine
#[derive(Error, Debug)]
pub enum Error {
    /// Feature vector could not be fetched; optimization for the affected
    /// batch aborts and the existing order is kept
    #[error("Analysis unavailable for track {track_id}: {reason}")]
    AnalysisUnavailable { track_id: String, reason: String },

    /// Next track could not be made ready to play
    #[error("Preparation failed for track {track_id}: {reason}")]
    PreparationFailed { track_id: String, reason: String },

    /// Handoff execution failed; recoverable via the hard-cut fallback
    #[error("Transition failed: {0}")]
    TransitionFailed(String),

    /// Transient persistence failure, retried with backoff
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// Operation not valid in the session's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Shared configuration or infrastructure error
    #[error(transparent)]
    Common(#[from] segue_common::Error),
}

impl Error {
    /// Whether the persistence retry loop should try again on this error
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientIo(_))
    }
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_io_is_retryable() {
        let transient = Error::TransientIo("connection reset".into());
        assert!(transient.is_transient());

        let analysis = Error::AnalysisUnavailable {
            track_id: "t1".into(),
            reason: "service down".into(),
        };
        assert!(!analysis.is_transient());
        assert!(!Error::TransitionFailed("boom".into()).is_transient());
    }

    #[test]
    fn common_errors_convert() {
        let err: Error = segue_common::Error::Config("bad".into()).into();
        assert!(matches!(err, Error::Common(_)));
    }
}
