use std::fmt;

pub mod config;
pub mod format;
pub mod payload;
pub mod pipeline;
pub mod safety;
pub mod tools;
pub mod validate;

pub use config::{mask_secret, Config, ConfigError};
pub use payload::UpstreamPayload;
pub use pipeline::Upstream;
pub use tools::{ToolDefinition, ToolKind};
pub use validate::{ValidatedRequest, Violation, Violations};

/// Caller-facing failure of a single tool call.
///
/// `Validation`, `UnsafeUrl` and `UnknownTool` are raised before any network I/O.
/// `Network`, `Status` and `Setup` come out of the HTTP client and go through the retry policy.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0}")]
    Validation(Violations),
    #[error("Invalid or unsafe URL. Only public HTTP/HTTPS URLs are allowed.")]
    UnsafeUrl(String),
    #[error(
        "Network error: Unable to connect to Metaso API. Please check your internet connection."
    )]
    Network(String),
    #[error("{0}")]
    Status(StatusError),
    #[error("Request setup error: {0}")]
    Setup(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Stable machine-readable code (used in logs).
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "invalid_params",
            Self::UnsafeUrl(_) => "unsafe_url",
            Self::Network(_) => "network_error",
            Self::Status(_) => "upstream_status",
            Self::Setup(_) => "setup_error",
            Self::UnknownTool(_) => "unknown_tool",
        }
    }

    /// A failure is final when it carries a 4xx status other than 429, or when it was
    /// detected locally before any request was made. Everything else may be retried.
    pub fn retryable(&self) -> bool {
        match self {
            Self::Status(s) => !((400..500).contains(&s.status) && s.status != 429),
            Self::Network(_) | Self::Setup(_) => true,
            Self::Validation(_) | Self::UnsafeUrl(_) | Self::UnknownTool(_) => false,
        }
    }

    /// HTTP status carried by the failure, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status(s) => Some(s.status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Authentication,
    Authorization,
    RateLimited,
    ServerError,
    Unavailable,
    Other,
}

impl StatusClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Authentication,
            403 => Self::Authorization,
            429 => Self::RateLimited,
            500 => Self::ServerError,
            502..=504 => Self::Unavailable,
            _ => Self::Other,
        }
    }
}

/// Non-2xx answer from the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    pub status: u16,
    pub class: StatusClass,
    /// Reason phrase (e.g. "Not Found"); may be empty.
    pub reason: String,
}

impl StatusError {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            class: StatusClass::from_status(status),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for StatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            StatusClass::Authentication => {
                f.write_str("Authentication failed. Please check your API key.")
            }
            StatusClass::Authorization => f.write_str(
                "Access forbidden. Your API key may not have the required permissions.",
            ),
            StatusClass::RateLimited => {
                f.write_str("Rate limit exceeded. Please try again later.")
            }
            StatusClass::ServerError => {
                f.write_str("Internal server error. Please try again later.")
            }
            StatusClass::Unavailable => {
                f.write_str("Service temporarily unavailable. Please try again later.")
            }
            StatusClass::Other => write!(f, "HTTP {}: {}", self.status, self.reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_map_to_stable_messages() {
        let cases = [
            (401, "Authentication failed. Please check your API key."),
            (
                403,
                "Access forbidden. Your API key may not have the required permissions.",
            ),
            (429, "Rate limit exceeded. Please try again later."),
            (500, "Internal server error. Please try again later."),
            (502, "Service temporarily unavailable. Please try again later."),
            (503, "Service temporarily unavailable. Please try again later."),
            (504, "Service temporarily unavailable. Please try again later."),
        ];
        for (status, msg) in cases {
            let e = Error::Status(StatusError::new(status, "whatever"));
            assert_eq!(e.to_string(), msg, "status={status}");
        }
        let e = Error::Status(StatusError::new(404, "Not Found"));
        assert_eq!(e.to_string(), "HTTP 404: Not Found");
    }

    #[test]
    fn only_client_errors_other_than_429_are_final() {
        for s in [400u16, 401, 403, 404, 422, 499] {
            assert!(!Error::Status(StatusError::new(s, "")).retryable(), "{s}");
        }
        for s in [429u16, 500, 502, 503, 504, 599] {
            assert!(Error::Status(StatusError::new(s, "")).retryable(), "{s}");
        }
        assert!(Error::Network("connection refused".into()).retryable());
        assert!(!Error::UnknownTool("x".into()).retryable());
    }

    #[test]
    fn setup_and_network_messages() {
        assert_eq!(
            Error::Setup("bad header".into()).to_string(),
            "Request setup error: bad header"
        );
        assert!(Error::Network("x".into())
            .to_string()
            .starts_with("Network error: Unable to connect to Metaso API."));
        assert_eq!(
            Error::UnknownTool("metaso_unknown".into()).to_string(),
            "Unknown tool: metaso_unknown"
        );
    }
}
