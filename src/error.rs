use crate::models::ItemId;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommenderError>;

#[derive(Debug, Error)]
pub enum RecommenderError {
    /// Query issued before a successful `fit` or snapshot load.
    #[error("{engine} engine is not fitted; call fit or load a snapshot first")]
    NotFitted { engine: &'static str },

    #[error("item {0} is not in the fitted index")]
    UnknownItem(ItemId),

    /// Malformed or inconsistent rows in a fit-time data source.
    #[error("malformed data in {source_name}: {message}")]
    DataShape { source_name: String, message: String },

    #[error("snapshot {path} is incomplete: {reason}")]
    SnapshotIncomplete { path: PathBuf, reason: String },

    #[error("snapshot {path} is not readable: {reason}")]
    SnapshotFormat { path: PathBuf, reason: String },

    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error while {context}: {source}")]
    Serialization {
        context: String,
        #[source]
        source: bincode::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl RecommenderError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn serialization(context: impl Into<String>, source: bincode::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    pub fn data_shape(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataShape {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Errors that indicate caller misuse or corrupted state rather than bad input data.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::NotFitted { .. } | Self::UnknownItem(_) | Self::SnapshotIncomplete { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offender() {
        let err = RecommenderError::UnknownItem(1163);
        assert_eq!(err.to_string(), "item 1163 is not in the fitted index");

        let err = RecommenderError::NotFitted { engine: "content" };
        assert!(err.to_string().starts_with("content engine is not fitted"));
        assert!(err.is_caller_error());

        let err = RecommenderError::data_shape("ratings.csv", "rating 7 out of range");
        assert!(!err.is_caller_error());
    }
}
