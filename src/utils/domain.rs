//! Utility functions for turning free-text website fields into registrable domains.

use crate::core::error::{AppError, Result};
use std::collections::HashSet;
use url::{Host, Url};

/// Extracts the registrable domain (e.g. "example.co.uk") from a URL or bare domain.
///
/// Handles common variations:
/// - Adds an `http://` scheme if missing.
/// - Parses the URL and extracts the host; IP literals are rejected.
/// - Removes a `www.` prefix and any trailing root dot.
/// - Reduces subdomains to the registrable domain using the public suffix list.
///
/// Returns `Err(AppError::DomainExtraction)` or `Err(AppError::UrlParse)` when no
/// usable domain can be derived.
pub(crate) fn get_domain_from_url(website_url_or_domain: &str) -> Result<String> {
    let trimmed_input = website_url_or_domain.trim();
    if trimmed_input.is_empty() {
        return Err(AppError::DomainExtraction(
            "Input string is empty".to_string(),
        ));
    }

    let url_str_with_scheme = if trimmed_input.contains("://") {
        trimmed_input.to_string()
    } else {
        format!("http://{}", trimmed_input)
    };

    let url = Url::parse(&url_str_with_scheme)?;

    let host = match url.host() {
        Some(Host::Domain(host)) => host.to_lowercase(),
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {
            return Err(AppError::DomainExtraction(format!(
                "IP address is not a company domain: {}",
                trimmed_input
            )));
        }
        None => {
            return Err(AppError::DomainExtraction(format!(
                "Could not extract host from parsed URL: {}",
                url
            )));
        }
    };

    let host = host.trim_end_matches('.');
    let host = host.strip_prefix("www.").unwrap_or(host);

    if host.is_empty() || !host.contains('.') || host.starts_with('.') {
        return Err(AppError::DomainExtraction(format!(
            "Extracted host appears invalid: {}",
            host
        )));
    }

    let registrable = psl::domain_str(host).ok_or_else(|| {
        AppError::DomainExtraction(format!("No registrable domain under a public suffix: {}", host))
    })?;

    tracing::trace!(
        "Extracted registrable domain '{}' from '{}'",
        registrable,
        trimmed_input
    );
    Ok(registrable.to_string())
}

/// Returns the first candidate that yields a registrable domain outside `blocked`.
///
/// Candidates are tried in order; malformed values and blocked (social/profile)
/// domains are skipped. `None` means the row has nothing to verify against.
pub fn resolve_domain<S: AsRef<str>>(candidates: &[S], blocked: &HashSet<String>) -> Option<String> {
    for raw in candidates {
        let raw = raw.as_ref();
        match get_domain_from_url(raw) {
            Ok(domain) if blocked.contains(&domain) => {
                tracing::debug!("Skipping blocked domain '{}' (from '{}')", domain, raw);
            }
            Ok(domain) => return Some(domain),
            Err(e) => {
                if !raw.trim().is_empty() {
                    tracing::debug!("Skipping website value '{}': {}", raw, e);
                }
            }
        }
    }
    None
}
