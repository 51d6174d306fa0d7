use thiserror::Error;

/// Client-agnostic errors raised while talking to the marketplace.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The API answered with an error.
    #[error("API error: {message}")]
    Api { message: String },

    /// Too many requests; the API may say how long to back off.
    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Credentials missing or rejected.
    #[error("Authentication failed")]
    AuthRequired,

    /// The requested record does not exist.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// The request never got an answer.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The API returned something that could not be decoded.
    #[error("Unexpected response: {message}")]
    Decode { message: String },

    /// A failure inside this crate, not the marketplace's.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PlatformError {
    /// Create an API error.
    #[inline]
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a not-found error for `resource`.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create a network error.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a decode error for a response that did not parse.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create an internal error.
    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Rate-limit errors are the only ones worth retrying in place.
    #[inline]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// First line of an error's message, for progress lines and logs.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

pub type Result<T> = std::result::Result<T, PlatformError>;
