//! Error types for the drive_upload crate.

use thiserror::Error;

/// Errors that can occur while authenticating or talking to Google Drive.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Invalid client secret file: {0}")]
    ClientSecretError(String),

    #[error("Local I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON file: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid folder URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Coarse classification of a [`DriveError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credential load, refresh or interactive login failed.
    Authentication,
    /// A list, create or upload call failed on the wire or on the server.
    RemoteApi,
    /// A local file could not be found, read, written or parsed.
    LocalIo,
    /// User input could not be interpreted.
    InvalidInput,
}

impl DriveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriveError::AuthenticationError(_)
            | DriveError::TokenRefreshError(_)
            | DriveError::ClientSecretError(_) => ErrorKind::Authentication,
            DriveError::HttpError(_) | DriveError::ApiError { .. } => ErrorKind::RemoteApi,
            DriveError::IoError(_) | DriveError::JsonError(_) | DriveError::FileNotFound(_) => {
                ErrorKind::LocalIo
            }
            DriveError::InvalidUrlOrId(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
