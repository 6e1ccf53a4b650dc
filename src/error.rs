// ABOUTME: Error types for insta-media-grabber-rs
// ABOUTME: Centralizes all error handling for the scraping client

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// No inline script matched the expected marker (page markup changed)
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// The embedded data was found but did not have the expected shape
    #[error("Malformed data: {0}")]
    MalformedData(String),

    /// The login page did not carry a CSRF token
    #[error("Error retrieving csrf auth token")]
    CsrfToken,

    /// The server refused the credentials
    #[error("Failed to authenticate: {0}")]
    Authentication(String),

    /// Authentication state was queried before a login attempt
    #[error("Session has not attempted to authenticate yet")]
    NotYetAuthenticated,

    /// The profile does not exist or is not visible to this session
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// A post sequence was requested before any profile was loaded
    #[error("No profile loaded")]
    NoProfileLoaded,

    /// Media fetch or write failed
    #[error("Download failed for {url}: {reason}")]
    Download { url: String, reason: String },

    /// Transport errors from the HTTP client
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Generic application errors
    #[error("{0}")]
    Generic(String),
}

/// Create a new malformed-data error with a message
pub fn malformed<S: Into<String>>(message: S) -> AppError {
    AppError::MalformedData(message.into())
}

/// Create a new download error for the given url
pub fn download_error<U: Into<String>, R: ToString>(url: U, reason: R) -> AppError {
    AppError::Download {
        url: url.into(),
        reason: reason.to_string(),
    }
}
