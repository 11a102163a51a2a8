use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failures raised by the language-model layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendError {
    ApiError {
        message: String,
        status_code: Option<u16>,
    },
    TimeoutError {
        seconds: u64,
    },
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },
    ConfigurationError {
        message: String,
    },
    StreamError {
        message: String,
    },
    /// The caller's cancellation handle fired before the model finished.
    Cancelled,
    Other {
        message: String,
    },
}

impl BackendError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BackendError::Cancelled)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ApiError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "API error ({}): {}", code, message)
                } else {
                    write!(f, "API error: {}", message)
                }
            }
            BackendError::TimeoutError { seconds } => {
                write!(f, "Request timed out after {} seconds", seconds)
            }
            BackendError::InvalidResponse { message, .. } => {
                write!(f, "Invalid response from LLM: {}", message)
            }
            BackendError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            BackendError::StreamError { message } => {
                write!(f, "Stream error: {}", message)
            }
            BackendError::Cancelled => write!(f, "Request was cancelled"),
            BackendError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Failures raised by a [`crate::store::Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::ApiError {
            message: "boom".to_string(),
            status_code: Some(502),
        };
        assert_eq!(err.to_string(), "API error (502): boom");

        let err = BackendError::TimeoutError { seconds: 30 };
        assert!(err.to_string().contains("30 seconds"));
    }

    #[test]
    fn test_cancelled_is_distinguishable() {
        assert!(BackendError::Cancelled.is_cancelled());
        assert!(!BackendError::Other {
            message: "x".to_string()
        }
        .is_cancelled());
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound {
            entity: "warehouse",
            id: "w1".to_string(),
        };
        assert_eq!(err.to_string(), "warehouse not found: w1");
    }
}
