//! Error types for Pangrosan.

use thiserror::Error;

/// Result type alias for library operations
pub type Result<T> = std::result::Result<T, PangrosanError>;

#[derive(Error, Debug)]
pub enum PangrosanError {
    /// Malformed IP, CIDR or domain literal
    #[error("Parse error: {0}")]
    Parse(String),

    /// Name resolution failed (timeout, NXDOMAIN, resolver error)
    #[error("Resolution failed for {domain}: {reason}")]
    Resolution { domain: String, reason: String },

    /// Invalid list content detected while building a priority list
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed persisted record
    #[error("Store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PangrosanError {
    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub(crate) fn resolution(domain: &str, reason: impl Into<String>) -> Self {
        Self::Resolution {
            domain: domain.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error is a resolution failure (absorbed by batch resolution)
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }
}
