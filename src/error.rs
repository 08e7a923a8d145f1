//! Error types for the devfile registry operator

use thiserror::Error;

/// Result type alias for operator operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that can occur while reconciling registries and registry lists
#[derive(Error, Debug)]
pub enum Error {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("{kind} {name} not found")]
    NotFound { kind: String, name: String },

    #[error("Conflict writing {kind} {name}: the object has been modified")]
    Conflict { kind: String, name: String },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("{0}")]
    InvalidRegistry(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl Error {
    /// Whether the reconcile loop should try again soon
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::KubeError(_) | Error::Conflict { .. } | Error::HttpError(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Short label used for the error counter
    pub fn metric_label(&self) -> &'static str {
        match self {
            Error::KubeError(_) => "kube",
            Error::NotFound { .. } => "not_found",
            Error::Conflict { .. } => "conflict",
            Error::HttpError(_) => "http",
            Error::InvalidRegistry(_) => "invalid_registry",
            Error::ValidationError(_) => "validation",
            Error::ConfigError(_) => "config",
            Error::SerializationError(_) => "serialization",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_is_retriable() {
        let err = Error::Conflict {
            kind: "DevfileRegistriesList".to_string(),
            name: "list".to_string(),
        };
        assert!(err.is_retriable());
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_validation_is_not_retriable() {
        let err = Error::ValidationError("bad".to_string());
        assert!(!err.is_retriable());
        assert_eq!(err.metric_label(), "validation");
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::NotFound {
            kind: "Deployment".to_string(),
            name: "devfile-registry".to_string(),
        };
        assert_eq!(err.to_string(), "Deployment devfile-registry not found");
    }
}
