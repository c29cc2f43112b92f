//! Knowledge gateway error types

use thiserror::Error;

/// Knowledge lookup or answer-generation failure
#[derive(Debug, Error)]
#[error("{message}")]
pub struct KnowledgeError {
    pub kind: KnowledgeErrorKind,
    pub message: String,
}

impl KnowledgeError {
    pub fn new(kind: KnowledgeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(KnowledgeErrorKind::Network, message)
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(KnowledgeErrorKind::RateLimit, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(KnowledgeErrorKind::ServerError, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(KnowledgeErrorKind::Auth, message)
    }

    pub fn catalog(message: impl Into<String>) -> Self {
        Self::new(KnowledgeErrorKind::Catalog, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(KnowledgeErrorKind::Unknown, message)
    }

    /// Map an HTTP status from the answer backend to an error
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}: {body}");
        match status {
            401 | 403 => Self::auth(message),
            429 => Self::rate_limit(message),
            500..=599 => Self::server_error(message),
            _ => Self::unknown(message),
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnowledgeErrorKind {
    /// Network issues, timeouts
    Network,
    /// Rate limited (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// Authentication failed (401, 403)
    Auth,
    /// Catalog missing or malformed
    Catalog,
    Unknown,
}
