//! Crate-wide error type.

use thiserror::Error;

/// Errors surfaced by the enrichment library.
///
/// Most network-level problems never reach this type: DNS failures collapse into an
/// empty exchange set and SMTP failures into probe outcomes. What remains are
/// configuration problems, store I/O, and cancellation.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Could not extract domain: {0}")]
    DomainExtraction(String),

    #[error("Domain does not exist (NXDOMAIN): {0}")]
    NxDomain(String),

    #[error("No mail exchange records found for: {0}")]
    NoDnsRecords(String),

    #[error("DNS lookup timed out for: {0}")]
    DnsTimeout(String),

    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("SMTP connectivity check failed: {0}")]
    Connectivity(String),

    #[error("Invalid email address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Lead store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, AppError>;
