//! Error taxonomy for the swipe pipeline.
//!
//! Configuration errors are fatal at startup: a keyboard must never run with an
//! invalid layout or dwell timer. Everything else is recoverable and degrades to
//! "no suggestion produced".

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SwipeError>;

#[derive(Debug, Error)]
pub enum SwipeError {
    #[error("keys '{first}' and '{second}' overlap")]
    OverlapDetected { first: String, second: String },

    #[error("key '{key}' has invalid bounds: {reason}")]
    InvalidBounds { key: String, reason: String },

    #[error("invalid key id '{key}': {reason}")]
    InvalidKeyId { key: String, reason: String },

    #[error(
        "dwell time {dwell_time_secs}s at a {sample_interval_secs}s sample interval yields {intervals} dwell intervals (need at least 1)"
    )]
    InvalidDwell {
        dwell_time_secs: f64,
        sample_interval_secs: f64,
        intervals: i64,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("trace has {groups} intermediate key groups, limit is {limit}")]
    DecodeBoundsExceeded { groups: usize, limit: usize },

    #[error("language model unavailable: {0}")]
    LanguageModelUnavailable(String),

    /// Raised by `KeyTrace::new`; a built trace is never empty.
    #[error("trace is empty")]
    EmptyTrace,

    #[error("word '{0}' is not among the ranked suggestions")]
    UnknownSuggestion(String),

    #[error("sample {ordinal} arrived after sample {previous}")]
    OutOfOrderSample { previous: u64, ordinal: u64 },

    #[error("ranking worker has shut down")]
    WorkerStopped,

    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("artifact error while {context}: {message}")]
    Artifact {
        context: &'static str,
        message: String,
    },
}

impl SwipeError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn artifact(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Artifact {
            context,
            message: err.to_string(),
        }
    }

    /// Errors that must halt startup.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::OverlapDetected { .. }
                | Self::InvalidBounds { .. }
                | Self::InvalidKeyId { .. }
                | Self::InvalidDwell { .. }
                | Self::InvalidConfig(_)
        )
    }

    /// Errors that degrade to "no suggestion" instead of reaching the UI.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DecodeBoundsExceeded { .. }
                | Self::LanguageModelUnavailable(_)
                | Self::EmptyTrace
                | Self::UnknownSuggestion(_)
                | Self::OutOfOrderSample { .. }
                | Self::WorkerStopped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let overlap = SwipeError::OverlapDetected {
            first: "1".into(),
            second: "2".into(),
        };
        assert!(overlap.is_configuration_error());
        assert!(!overlap.is_recoverable());

        let bounds = SwipeError::DecodeBoundsExceeded {
            groups: 25,
            limit: 20,
        };
        assert!(bounds.is_recoverable());
        assert!(!bounds.is_configuration_error());

        assert!(SwipeError::EmptyTrace.is_recoverable());
        assert!(SwipeError::LanguageModelUnavailable("offline".into()).is_recoverable());
    }

    #[test]
    fn test_messages() {
        let err = SwipeError::InvalidDwell {
            dwell_time_secs: 0.01,
            sample_interval_secs: 0.05,
            intervals: 0,
        };
        assert!(err.to_string().contains("need at least 1"));

        let err = SwipeError::DecodeBoundsExceeded {
            groups: 21,
            limit: 20,
        };
        assert_eq!(
            err.to_string(),
            "trace has 21 intermediate key groups, limit is 20"
        );
    }
}
