// Error handling module
// Defines the error taxonomy shared by the benchmark engine and its boundaries

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can stop a benchmark suite or one of its boundary steps.
///
/// Individual request failures never show up here: they are recorded as
/// failed samples and only surface through the error-rate metric.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Endpoint path references a placeholder with no supplied value
    #[error("Endpoint '{endpoint}' has unresolved placeholder [{placeholder}]")]
    UnresolvedPlaceholder {
        endpoint: String,
        placeholder: String,
    },

    /// Two endpoints in one suite share a name
    #[error("Duplicate endpoint name in suite: {0}")]
    DuplicateEndpoint(String),

    /// Load profile or target settings cannot produce a run
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Liveness check never succeeded within the startup timeout
    #[error("Target {url} did not become live within {waited_secs}s")]
    TargetUnreachable { url: String, waited_secs: u64 },

    /// A run produced zero successful samples
    #[error("Run '{endpoint}' against {target} produced no successful samples")]
    EmptyResultSet { endpoint: String, target: String },

    /// Feature history document could not be parsed
    #[error("Feature history store {} is corrupt: {message}", path.display())]
    HistoryStoreCorrupt { path: PathBuf, message: String },

    /// Report or history document could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for benchmark operations
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BenchError::UnresolvedPlaceholder {
            endpoint: "Product".to_string(),
            placeholder: "id".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Endpoint 'Product' has unresolved placeholder [id]"
        );

        let err = BenchError::TargetUnreachable {
            url: "http://127.0.0.1:3001/health".to_string(),
            waited_secs: 30,
        };
        assert_eq!(
            err.to_string(),
            "Target http://127.0.0.1:3001/health did not become live within 30s"
        );
    }

    #[test]
    fn test_history_corrupt_message() {
        let err = BenchError::HistoryStoreCorrupt {
            path: PathBuf::from("results/feature_history.yaml"),
            message: "mapping values are not allowed here".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Feature history store results/feature_history.yaml is corrupt: mapping values are not allowed here"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: BenchError = io.into();
        assert!(matches!(err, BenchError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: missing");
    }
}
