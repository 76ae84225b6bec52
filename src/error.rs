//! Error types for scrivener.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrivenerError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Token message errors
    #[error("Token message has {texts} texts but {probs} probabilities")]
    TokenArrayMismatch { texts: usize, probs: usize },

    #[error("Segment start index {index} out of range for {token_count} tokens")]
    SegmentIndexOutOfRange { index: usize, token_count: usize },

    #[error("Segment start indices must be ascending (index {position} is {index})")]
    SegmentIndexNotAscending { position: usize, index: usize },

    #[error("{segments} segments but {starts} start times and {ends} end times")]
    SegmentTimesMismatch {
        segments: usize,
        starts: usize,
        ends: usize,
    },

    // Merge errors
    #[error("Merge planner invariant violated: {message}")]
    PlannerInvariant { message: String },

    #[error("Edit operation targets entry {index} but transcript tail has {len}")]
    OperationOutOfRange { index: usize, len: usize },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl ScrivenerError {
    /// Returns true for errors that indicate a bug rather than bad input.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScrivenerError::PlannerInvariant { .. } | ScrivenerError::OperationOutOfRange { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScrivenerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_token_array_mismatch_display() {
        let error = ScrivenerError::TokenArrayMismatch { texts: 3, probs: 2 };
        assert_eq!(
            error.to_string(),
            "Token message has 3 texts but 2 probabilities"
        );
    }

    #[test]
    fn test_segment_index_out_of_range_display() {
        let error = ScrivenerError::SegmentIndexOutOfRange {
            index: 7,
            token_count: 5,
        };
        assert_eq!(
            error.to_string(),
            "Segment start index 7 out of range for 5 tokens"
        );
    }

    #[test]
    fn test_segment_times_mismatch_display() {
        let error = ScrivenerError::SegmentTimesMismatch {
            segments: 2,
            starts: 1,
            ends: 2,
        };
        assert_eq!(
            error.to_string(),
            "2 segments but 1 start times and 2 end times"
        );
    }

    #[test]
    fn test_planner_invariant_display() {
        let error = ScrivenerError::PlannerInvariant {
            message: "anchor points at a segment".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Merge planner invariant violated: anchor points at a segment"
        );
    }

    #[test]
    fn test_planner_invariant_is_fatal() {
        let fatal = ScrivenerError::PlannerInvariant {
            message: "bug".to_string(),
        };
        assert!(fatal.is_fatal());

        let recoverable = ScrivenerError::TokenArrayMismatch { texts: 1, probs: 0 };
        assert!(!recoverable.is_fatal());
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: ScrivenerError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_str = "invalid = toml = syntax";
        let toml_error = toml::from_str::<toml::Value>(toml_str).unwrap_err();
        let error: ScrivenerError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<ScrivenerError>();
        assert_sync::<ScrivenerError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
