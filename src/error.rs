//! Error types for siteroute
//!
//! Startup failures (`ConfigLoadError`, `AppError`) abort initialisation.
//! Request-time failures never surface here: the completion client absorbs
//! them into a fallback result.

use thiserror::Error;

/// Fatal configuration failure raised while loading defaults or the routing table
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("Failed to read routing file {path}: {source}")]
    RoutingFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse routing table from {origin}: {source}")]
    RoutingParse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid default for {field}: {reason}")]
    InvalidDefaults { field: &'static str, reason: String },

    #[error("Invalid routing entry '{key}': {reason}")]
    InvalidRoutingEntry { key: String, reason: String },

    #[error("Duplicate routing key '{key}'")]
    DuplicateRoutingKey { key: String },

    #[error(
        "Ambiguous wildcard configuration: keys {} are all present; keep exactly one of '*', 'default' or 'DEFAULT'",
        keys.join(", ")
    )]
    AmbiguousWildcard { keys: Vec<String> },
}

/// Main error type for application startup
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    ConfigLoad(#[from] ConfigLoadError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_invalid_routing_entry_message() {
        let err = ConfigLoadError::InvalidRoutingEntry {
            key: "42".to_string(),
            reason: "temperature must be between 0.0 and 2.0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid routing entry '42': temperature must be between 0.0 and 2.0"
        );
    }

    #[test]
    fn test_ambiguous_wildcard_lists_keys() {
        let err = ConfigLoadError::AmbiguousWildcard {
            keys: vec!["*".to_string(), "default".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("*, default"), "got: {}", msg);
        assert!(msg.contains("exactly one"));
    }

    #[test]
    fn test_file_read_error_keeps_io_source() {
        let err = ConfigLoadError::RoutingFileRead {
            path: "/tmp/missing.json".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("/tmp/missing.json"));
        let source = err.source().expect("should have io source");
        assert!(source.is::<std::io::Error>());
    }

    #[test]
    fn test_app_error_is_transparent_over_config_errors() {
        let err: AppError = ConfigLoadError::DuplicateRoutingKey {
            key: "7".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Duplicate routing key '7'");
    }

    #[test]
    fn test_metrics_registration_failure_converts() {
        let err: AppError = prometheus::Error::AlreadyReg.into();
        assert!(matches!(err, AppError::Metrics(_)));
        assert!(err.to_string().starts_with("Failed to register metrics"));
    }
}
