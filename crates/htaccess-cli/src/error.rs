//! Error types for htaccess-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from htaccess-core
    #[error(transparent)]
    Core(#[from] htaccess_core::Error),

    /// Error from htaccess-fs
    #[error(transparent)]
    Fs(#[from] htaccess_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML output error
    #[error("YAML output error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }
}
