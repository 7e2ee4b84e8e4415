//! Error types shared by the platform and application layers.

use thiserror::Error;

/// Main error type for the windowing and configuration layers.
#[derive(Error, Debug)]
pub enum Error {
    /// The windowing backend could not be initialized
    #[error("Failed to initialize windowing backend: {0}")]
    PlatformInit(String),

    /// The native window could not be created
    #[error("Failed to create window: {0}")]
    WindowCreate(String),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
