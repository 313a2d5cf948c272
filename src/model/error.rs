use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by an [`ObjectBackend`](crate::adapters::ObjectBackend).
///
/// The message is whatever the storage SDK reported; nothing above the
/// backend inspects it to recover or retry.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Operations refused before any backend mutation takes place.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum UnsafeOperation {
    /// The path normalized to the empty string, which would address the whole bucket.
    #[error("refusing to operate on an empty path (entire bucket)")]
    EmptyPath,
    /// More than one key matched a non-recursive delete.
    #[error("{matches} objects match `{path}`; set `recursive` to delete all of them")]
    AmbiguousDelete { path: String, matches: usize },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("storage format `{0}` not supported")]
    UnsupportedFormat(String),

    #[error("storage format `{format}` can only be used with tables")]
    TypeMismatch { format: String },

    #[error("unsafe operation: {0}")]
    UnsafeOperation(UnsafeOperation),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Avro error: {0}")]
    Avro(#[from] apache_avro::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn invalid_path(path: &str, reason: &str) -> Self {
        Error::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_unsafe_operation(&self) -> bool {
        matches!(self, Error::UnsafeOperation(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<ciborium::ser::Error<std::io::Error>> for Error {
    fn from(err: ciborium::ser::Error<std::io::Error>) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<ciborium::de::Error<std::io::Error>> for Error {
    fn from(err: ciborium::de::Error<std::io::Error>) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let cases = vec![
            (
                Error::from(BackendError::new("failed to get_object at: a.csv, gone")),
                "backend error: failed to get_object at: a.csv, gone",
            ),
            (
                Error::UnsafeOperation(UnsafeOperation::EmptyPath),
                "unsafe operation: refusing to operate on an empty path (entire bucket)",
            ),
            (
                Error::UnsafeOperation(UnsafeOperation::AmbiguousDelete {
                    path: "folder/".to_string(),
                    matches: 3,
                }),
                "unsafe operation: 3 objects match `folder/`; set `recursive` to delete all of them",
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected, "failed for case: {}", expected);
        }
    }

    #[test]
    fn test_backend_error_source() {
        let err: Box<dyn std::error::Error> = Box::new(BackendError::new("boom"));
        assert!(err.source().is_none());
        assert!(Error::UnsafeOperation(UnsafeOperation::EmptyPath).is_unsafe_operation());
    }
}
