use thiserror::Error;

/// Main error type for zero-shot portfolio selection
#[derive(Error, Debug)]
pub enum ZsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data consistency error: {message}")]
    DataConsistency { message: String },

    #[error("Scorer error: {message}")]
    Scorer { message: String },

    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ZsError {
    pub fn data_consistency(message: impl Into<String>) -> Self {
        Self::DataConsistency {
            message: message.into(),
        }
    }

    pub fn scorer(message: impl Into<String>) -> Self {
        Self::Scorer {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

/// Result type alias for zero-shot selection operations
pub type ZsResult<T> = Result<T, ZsError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::ZsError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::ZsError::Config(format!($($arg)*))
    };
}

/// Macro for creating scorer errors
#[macro_export]
macro_rules! scorer_error {
    ($($arg:tt)*) => {
        $crate::ZsError::Scorer { message: format!($($arg)*) }
    };
}
