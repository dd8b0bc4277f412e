use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Stream returned HTTP status {status}")]
    StreamStatusError { status: u16 },

    #[error("Connection error: {message}")]
    ConnectionError { message: String },

    #[error("Timed out: {message}")]
    TimeoutError { message: String },

    #[error("Protocol error: {message}")]
    ProtocolError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Protocol,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Process exit status for a run that failed with this severity.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl StreamError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StreamError::ConfigError { .. }
            | StreamError::InvalidConfigValueError { .. }
            | StreamError::TomlError(_)
            | StreamError::TomlSerializeError(_) => ErrorCategory::Configuration,
            StreamError::HttpError(_)
            | StreamError::StreamStatusError { .. }
            | StreamError::ConnectionError { .. }
            | StreamError::TimeoutError { .. } => ErrorCategory::Network,
            StreamError::ProtocolError { .. } | StreamError::SerializationError(_) => {
                ErrorCategory::Protocol
            }
            StreamError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Protocol | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// Connection-level failures after which the LiveSplit socket must be reopened.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            StreamError::ConnectionError { .. } | StreamError::TimeoutError { .. }
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            StreamError::HttpError(_) | StreamError::StreamStatusError { .. } => {
                format!("Could not read the notes stream: {}", self)
            }
            StreamError::ConnectionError { .. } | StreamError::TimeoutError { .. } => {
                format!("Could not talk to the timer: {}", self)
            }
            StreamError::IoError(e) => format!("File system error: {}", e),
            _ => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the settings file and command line flags",
            ErrorCategory::Network => {
                "Make sure the server is running and reachable from this machine"
            }
            ErrorCategory::Protocol => "Check that both ends speak the expected protocol",
            ErrorCategory::System => "Check file paths and permissions",
        }
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_are_medium() {
        let err = StreamError::StreamStatusError { status: 503 };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_every_failure_exits_non_zero() {
        let errors = [
            StreamError::TimeoutError {
                message: "1s".to_string(),
            },
            StreamError::ConfigError {
                message: "bad".to_string(),
            },
            StreamError::ProtocolError {
                message: "bad".to_string(),
            },
            StreamError::IoError(std::io::Error::other("disk")),
        ];
        for err in errors {
            assert_ne!(err.severity().exit_code(), 0, "{err}");
        }
        assert_eq!(ErrorSeverity::Medium.exit_code(), 2);
        assert_eq!(ErrorSeverity::Critical.exit_code(), 3);
    }

    #[test]
    fn test_disconnect_detection() {
        assert!(StreamError::TimeoutError {
            message: "1s".to_string()
        }
        .is_disconnect());
        assert!(!StreamError::ProtocolError {
            message: "bad".to_string()
        }
        .is_disconnect());
    }
}
