//! Remote call error taxonomy.

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;

use crate::resilience::RetryClassify;

/// Failure of one call to a sibling service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// HTTP 429, optionally with the server's Retry-After
    #[error("{service} rate limited the request")]
    RateLimited {
        service: String,
        retry_after: Option<Duration>,
    },

    /// Any other non-2xx response
    #[error("{service} responded with HTTP {status}")]
    Http { service: String, status: u16 },

    #[error("request to {service} timed out")]
    Timeout { service: String },

    #[error("DNS resolution failed for {service}: {message}")]
    Dns { service: String, message: String },

    #[error("network error calling {service}: {message}")]
    Network { service: String, message: String },

    /// 2xx response without a decodable `{ "data": ... }` envelope
    #[error("malformed response from {service}: {message}")]
    Malformed { service: String, message: String },

    /// Service token could not be issued
    #[error("service token error: {0}")]
    Token(String),
}

impl RemoteError {
    /// Classifies a transport-level reqwest error.
    pub fn from_reqwest(service: &str, error: &reqwest::Error) -> Self {
        let service = service.to_string();
        let message = error_chain(error);

        if error.is_timeout() {
            RemoteError::Timeout { service }
        } else if is_dns_failure(&message) {
            RemoteError::Dns { service, message }
        } else if error.is_decode() {
            RemoteError::Malformed { service, message }
        } else {
            RemoteError::Network { service, message }
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::RateLimited { .. } => Some(429),
            RemoteError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl RetryClassify for RemoteError {
    fn is_retryable(&self) -> bool {
        match self {
            RemoteError::Http { status, .. } => !(400..500).contains(status),
            RemoteError::Token(_) => false,
            _ => true,
        }
    }

    fn is_network(&self) -> bool {
        matches!(self, RemoteError::Dns { .. } | RemoteError::Network { .. })
    }
}

/// Parses a Retry-After header given in seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn is_dns_failure(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("dns error")
        || lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
}
