use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobdeckError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Unsupported config file extension: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid pipeline step '{step_id}': {reason}")]
    InvalidStep { step_id: String, reason: String },
}

/// Errors raised while fetching job records from a stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Request rejected with {status}: {body}")]
    Client { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("No base URL configured for the job API")]
    MissingBaseUrl,

    #[error("Invalid base URL for the job API: {0}")]
    InvalidBaseUrl(String),

    #[error("Fetch cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true if the error is likely transient and the request can be retried.
    ///
    /// 4xx responses (auth, validation) are never retried, except 429 which the
    /// HTTP source classifies as [`FetchError::Server`].
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Network(_) | FetchError::Timeout(_) | FetchError::Server { .. }
        )
    }
}

/// Reasons a raw job payload could not be turned into a `JobRecord`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Job payload is not a JSON object")]
    NotAnObject,

    #[error("Job payload is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("Invalid timestamp in field '{field}': {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, JobdeckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Network("connection reset".to_string()).is_retryable());
        assert!(FetchError::Timeout(30).is_retryable());
        assert!(FetchError::Server {
            status: 503,
            body: String::new()
        }
        .is_retryable());

        assert!(!FetchError::Client {
            status: 401,
            body: "unauthorized".to_string()
        }
        .is_retryable());
        assert!(!FetchError::Decode("eof".to_string()).is_retryable());
        assert!(!FetchError::Cancelled.is_retryable());
        assert!(!FetchError::MissingBaseUrl.is_retryable());
        assert!(!FetchError::InvalidBaseUrl("x".to_string()).is_retryable());
    }

    #[test]
    fn test_error_conversion() {
        let err: JobdeckError = FetchError::Timeout(5).into();
        assert_eq!(err.to_string(), "Fetch error: Request timed out after 5s");
    }
}
