//! Custom error types for mdpiharvest.
//!
//! This module defines all error types used throughout the application.
//! All functions return `Result<T, HarvestError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for mdpiharvest operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Browser session error (launch, navigation, missing state)
    #[error("Browser error: {0}")]
    Browser(String),

    /// Chrome DevTools protocol transport error
    #[error("Browser protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// HTML parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Bounded wait for a structural page marker expired
    #[error("Render timeout waiting for `{0}`")]
    RenderTimeout(String),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias using `HarvestError`
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a parse error message
    fn ok_or_parse(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_parse(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| HarvestError::Parse(msg.to_string()))
    }
}
