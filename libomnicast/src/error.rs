//! Error types for Omnicast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, OmnicastError>;

#[derive(Error, Debug)]
pub enum OmnicastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl OmnicastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            OmnicastError::InvalidInput(_) => 3,
            OmnicastError::Platform(PlatformError::Authentication(_)) => 2,
            OmnicastError::Platform(_) => 1,
            OmnicastError::Config(_) => 2,
            OmnicastError::Store(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("No post with id {0}")]
    UnknownPost(String),

    #[error("No account with id {0}")]
    UnknownAccount(String),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Media validation failed: {0}")]
    Validation(String),

    #[error("Media upload failed: {0}")]
    Upload(String),

    #[error("Publishing failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Unsupported platform: {0}")]
    Unsupported(String),
}
