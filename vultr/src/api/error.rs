use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the error text contains `needle`, exact case
    pub fn contains(&self, needle: &str) -> bool {
        self.to_string().contains(needle)
    }

    /// HTTP 404 or an error message saying the object does not exist
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404) || self.to_string().to_lowercase().contains("not found")
    }

    /// The API answers `{"error":"Nothing to change"}` while an object is
    /// mid-transition or already in the requested state
    pub fn is_nothing_to_change(&self) -> bool {
        self.to_string().to_lowercase().contains("nothing to change")
    }
}
