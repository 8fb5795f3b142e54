use std::time::Duration;

use reqwest::StatusCode;

use crate::manifest::Dialect;

#[derive(Debug, thiserror::Error)]
pub enum SubgrabError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("failed to parse {dialect} manifest: {reason}")]
    Parse { dialect: Dialect, reason: String },

    #[error("track `{track}` resolved to an empty segment plan")]
    EmptyPlan { track: String },

    #[error("no usable cues in {fragments} fragment(s)")]
    EmptyResult { fragments: usize },

    #[error("proxy configuration error: {reason}")]
    ProxyConfiguration { reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("connection to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("export of `{name}` failed: {reason}")]
    Export { name: String, reason: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl SubgrabError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(dialect: Dialect, reason: impl Into<String>) -> Self {
        Self::Parse {
            dialect,
            reason: reason.into(),
        }
    }

    pub fn empty_plan(track: impl Into<String>) -> Self {
        Self::EmptyPlan {
            track: track.into(),
        }
    }

    pub fn connection(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connection {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(status: StatusCode, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    pub fn timeout(url: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            url: url.into(),
            timeout,
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn export(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Export {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Whether a manifest-class fetch should try again after this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. }
            | Self::Connection { .. }
            | Self::Timeout { .. }
            | Self::Io { .. } => true,
            Self::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::Cancelled
            | Self::InvalidUrl { .. }
            | Self::Parse { .. }
            | Self::EmptyPlan { .. }
            | Self::EmptyResult { .. }
            | Self::ProxyConfiguration { .. }
            | Self::NotFound { .. }
            | Self::Configuration { .. }
            | Self::Export { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_and_throttling_are_retryable() {
        assert!(SubgrabError::http_status(StatusCode::BAD_GATEWAY, "u").is_retryable());
        assert!(SubgrabError::http_status(StatusCode::TOO_MANY_REQUESTS, "u").is_retryable());
        assert!(!SubgrabError::http_status(StatusCode::FORBIDDEN, "u").is_retryable());
    }

    #[test]
    fn transient_failures_are_retryable() {
        assert!(SubgrabError::timeout("u", Duration::from_secs(1)).is_retryable());
        assert!(SubgrabError::connection("u", "reset").is_retryable());
    }

    #[test]
    fn structural_errors_are_not_retryable() {
        assert!(!SubgrabError::parse(Dialect::Hls, "bad").is_retryable());
        assert!(!SubgrabError::empty_plan("en").is_retryable());
        assert!(!SubgrabError::NotFound {
            resource: "x".into()
        }
        .is_retryable());
    }
}
