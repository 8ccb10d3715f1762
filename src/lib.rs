//! # Lead Enricher Core Library
//!
//! Resolves the most probable corporate email address for lead rows without ever
//! sending mail: company domain from website fields, pattern-based candidates, MX
//! lookup, paced SMTP `RCPT` probing with catch-all detection, and a final status.
//!
//! It is designed to be used either directly as a library or via the `lead-enricher`
//! command-line tool (which uses this library).

mod core;
pub mod store;
mod utils;

pub use crate::core::classifier::{classify, Verification};
pub use crate::core::config::{
    get_random_sleep_duration, Config, ConfigBuilder, ConfigFile, SheetLayout,
    DEFAULT_BLOCKED_DOMAINS,
};
pub use crate::core::enricher::{Enricher, RowOutcome, RowState, RunSummary, SkipReason};
pub use crate::core::error::{AppError, Result};
pub use crate::core::models::{
    CandidateProbe, EmailCandidate, EmailStatus, EnrichmentResult, LeadRecord, MailExchangeSet,
    MailHost, ProbeOutcome, RowId,
};
pub use crate::utils::dns::{DnsMxResolver, MxLookup};
pub use crate::utils::domain::resolve_domain;
pub use crate::utils::patterns::LocalPartPattern;
pub use crate::utils::smtp::{MailboxProbe, ProbeReport, SessionStage, SmtpVerifier};

use crate::utils::smtp::test_smtp_connectivity;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The engine wired to real DNS and SMTP.
pub type LeadEnricher = Enricher<DnsMxResolver, SmtpVerifier>;

/// Builds the DNS resolver and SMTP verifier and returns a ready engine.
///
/// # Arguments
/// * `config` - The effective configuration, shared with the verifier.
/// * `cancel` - Token that stops pacing sleeps and row processing.
///
/// # Returns
/// * `Result<LeadEnricher>` - Fails on an unusable DNS setup or sender address.
pub fn initialize_enricher(config: Arc<Config>, cancel: CancellationToken) -> Result<LeadEnricher> {
    tracing::debug!("Initializing enricher components...");
    let mx = DnsMxResolver::new(&config)?;
    tracing::debug!("DNS resolver initialized.");
    let prober = SmtpVerifier::new(Arc::clone(&config), cancel.clone())?;
    tracing::debug!("SMTP verifier initialized.");
    tracing::info!("Enricher initialized successfully.");
    Ok(Enricher::new(config, mx, prober, cancel))
}

/// Performs an early check for outbound SMTP connectivity.
pub async fn check_smtp_connectivity(config: &Config) -> Result<()> {
    test_smtp_connectivity(config).await
}

/// Splits a full name into first and last parts.
///
/// The first whitespace-separated token is the first name and the last token the
/// last name; a single token is treated as a first name.
pub fn split_full_name(full_name: &str) -> (String, String) {
    let parts: Vec<&str> = full_name.split_whitespace().collect();
    match parts.as_slice() {
        [] => (String::new(), String::new()),
        [only] => (only.to_string(), String::new()),
        [first, .., last] => (first.to_string(), last.to_string()),
    }
}

/// Resolves one lead given as a full name and a website, without a row store.
///
/// # Arguments
/// * `enricher` - The engine to resolve with.
/// * `full_name` - The person's name; the first and last tokens are used.
/// * `website` - A website URL or bare domain for the company.
///
/// # Returns
/// * `RowState` - `Classified`, `Skipped` or `Cancelled`.
pub async fn enrich_single_lead<M, P>(
    enricher: &Enricher<M, P>,
    full_name: &str,
    website: &str,
) -> RowState
where
    M: MxLookup,
    P: MailboxProbe,
{
    let (first_name, last_name) = split_full_name(full_name);
    let lead = LeadRecord {
        row: RowId(0),
        first_name,
        last_name,
        website_candidates: vec![website.to_string()],
    };
    tracing::info!(target: "enrich_task", "Resolving single lead '{}' at '{}'", full_name, website);
    enricher.resolve_lead(&lead).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_full_name() {
        assert_eq!(
            split_full_name("Jane Doe"),
            ("Jane".to_string(), "Doe".to_string())
        );
        assert_eq!(
            split_full_name("  Mary Ann  van Dyke "),
            ("Mary".to_string(), "Dyke".to_string())
        );
        assert_eq!(split_full_name("Cher"), ("Cher".to_string(), String::new()));
        assert_eq!(split_full_name("   "), (String::new(), String::new()));
    }

    #[tokio::test]
    async fn test_enrich_single_lead_heuristic_when_smtp_disabled() {
        let config = Arc::new(
            ConfigBuilder::new()
                .skip_default_files()
                .smtp_enabled(false)
                .dns_servers(vec!["127.0.0.1".to_string()])
                .build()
                .unwrap(),
        );
        let enricher = initialize_enricher(config, CancellationToken::new()).unwrap();
        let state = enrich_single_lead(&enricher, "Jane Doe", "https://www.acme.io/team").await;
        assert_eq!(
            state,
            RowState::Classified(EnrichmentResult::new("jane@acme.io", EmailStatus::Heuristic))
        );
    }
}
