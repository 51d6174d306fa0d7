//! Errors raised by the eMAG Marketplace API client.

use thiserror::Error;

use crate::platform::PlatformError;

#[derive(Debug, Error)]
pub enum EmagError {
    /// The request never got an HTTP answer.
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx answer.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP 200 with `isError: true`.
    #[error("eMAG rejected the request: {0}")]
    Rejected(String),

    #[error("Rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The envelope parsed but its content did not.
    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EmagError {
    pub fn is_rate_limit(&self) -> bool {
        is_rate_limit_error(self)
    }
}

impl From<EmagError> for PlatformError {
    fn from(err: EmagError) -> Self {
        match err {
            EmagError::Http(message) => PlatformError::Network { message },
            EmagError::Json(e) => PlatformError::Decode {
                message: e.to_string(),
            },
            EmagError::Api { status, message } => match status {
                401 | 403 => PlatformError::AuthRequired,
                404 => PlatformError::NotFound { resource: message },
                429 => PlatformError::RateLimited {
                    retry_after_secs: None,
                },
                _ => PlatformError::Api {
                    message: format!("HTTP {status}: {message}"),
                },
            },
            EmagError::Rejected(message) => PlatformError::Api { message },
            EmagError::RateLimited { retry_after_secs } => {
                PlatformError::RateLimited { retry_after_secs }
            }
            EmagError::Auth(_) => PlatformError::AuthRequired,
            EmagError::Decode(message) => PlatformError::Decode { message },
            EmagError::Config(message) => PlatformError::Internal { message },
        }
    }
}

pub fn is_rate_limit_error(err: &EmagError) -> bool {
    matches!(
        err,
        EmagError::RateLimited { .. } | EmagError::Api { status: 429, .. }
    )
}

/// Short, single-line description for progress output.
pub fn short_error_message(err: &EmagError) -> String {
    match err {
        EmagError::Http(_) => "Network error".to_string(),
        EmagError::Json(_) => "JSON parse error".to_string(),
        EmagError::Api { status, message } => {
            if message.chars().count() > 50 {
                let truncated: String = message.chars().take(47).collect();
                format!("HTTP {status}: {truncated}...")
            } else {
                format!("HTTP {status}: {message}")
            }
        }
        EmagError::Rejected(message) => format!("Rejected: {message}"),
        EmagError::RateLimited { .. } => "Rate limited".to_string(),
        EmagError::Auth(_) => "Authentication failed".to_string(),
        EmagError::Decode(message) => format!("Bad response: {message}"),
        EmagError::Config(message) => format!("Config: {message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_platform_errors() {
        let auth: PlatformError = EmagError::Api {
            status: 401,
            message: "no".to_string(),
        }
        .into();
        assert!(matches!(auth, PlatformError::AuthRequired));

        let forbidden: PlatformError = EmagError::Api {
            status: 403,
            message: "no".to_string(),
        }
        .into();
        assert!(matches!(forbidden, PlatformError::AuthRequired));

        let limited: PlatformError = EmagError::Api {
            status: 429,
            message: String::new(),
        }
        .into();
        assert!(limited.is_rate_limited());

        let other: PlatformError = EmagError::Api {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert!(matches!(other, PlatformError::Api { message } if message == "HTTP 500: boom"));
    }

    #[test]
    fn rejected_requests_keep_their_message() {
        let err: PlatformError = EmagError::Rejected("Invalid vendor ip".to_string()).into();
        assert!(err.to_string().contains("Invalid vendor ip"));
    }

    #[test]
    fn rate_limit_detection() {
        assert!(is_rate_limit_error(&EmagError::RateLimited {
            retry_after_secs: Some(1)
        }));
        assert!(is_rate_limit_error(&EmagError::Api {
            status: 429,
            message: String::new()
        }));
        assert!(!EmagError::Auth("bad".to_string()).is_rate_limit());
    }

    #[test]
    fn short_messages_truncate_long_bodies() {
        let err = EmagError::Api {
            status: 502,
            message: "ă".repeat(80),
        };
        let short = short_error_message(&err);
        assert!(short.ends_with("..."));
        assert_eq!(short.chars().count(), "HTTP 502: ".len() + 47 + 3);
    }
}
