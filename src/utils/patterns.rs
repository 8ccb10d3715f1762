//! Generates candidate email addresses from a person's name and a resolved domain.

use crate::core::config::Config;
use crate::core::models::EmailCandidate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Local-part shapes, named by the token used in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocalPartPattern {
    #[serde(rename = "first")]
    First,
    #[serde(rename = "first.last")]
    FirstDotLast,
    #[serde(rename = "flast")]
    FirstInitialLast,
    #[serde(rename = "firstlast")]
    FirstLast,
    #[serde(rename = "first_last")]
    FirstUnderscoreLast,
    #[serde(rename = "lastf")]
    LastFirstInitial,
    #[serde(rename = "last.first")]
    LastDotFirst,
    #[serde(rename = "last")]
    Last,
}

impl LocalPartPattern {
    /// Highest-confidence first.
    pub const DEFAULT_ORDER: [LocalPartPattern; 8] = [
        LocalPartPattern::First,
        LocalPartPattern::FirstDotLast,
        LocalPartPattern::FirstInitialLast,
        LocalPartPattern::FirstLast,
        LocalPartPattern::FirstUnderscoreLast,
        LocalPartPattern::LastFirstInitial,
        LocalPartPattern::LastDotFirst,
        LocalPartPattern::Last,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            LocalPartPattern::First => "first",
            LocalPartPattern::FirstDotLast => "first.last",
            LocalPartPattern::FirstInitialLast => "flast",
            LocalPartPattern::FirstLast => "firstlast",
            LocalPartPattern::FirstUnderscoreLast => "first_last",
            LocalPartPattern::LastFirstInitial => "lastf",
            LocalPartPattern::LastDotFirst => "last.first",
            LocalPartPattern::Last => "last",
        }
    }

    /// Builds the local part, or `None` when a required name part is missing.
    fn compose(&self, first: &str, last: &str) -> Option<String> {
        let first_initial = first.chars().next();
        let both = !first.is_empty() && !last.is_empty();

        match self {
            LocalPartPattern::First => (!first.is_empty()).then(|| first.to_string()),
            LocalPartPattern::Last => (!last.is_empty()).then(|| last.to_string()),
            _ if !both => None,
            LocalPartPattern::FirstDotLast => Some(format!("{}.{}", first, last)),
            LocalPartPattern::FirstInitialLast => first_initial.map(|f| format!("{}{}", f, last)),
            LocalPartPattern::FirstLast => Some(format!("{}{}", first, last)),
            LocalPartPattern::FirstUnderscoreLast => Some(format!("{}_{}", first, last)),
            LocalPartPattern::LastFirstInitial => first_initial.map(|f| format!("{}{}", last, f)),
            LocalPartPattern::LastDotFirst => Some(format!("{}.{}", last, first)),
        }
    }
}

impl fmt::Display for LocalPartPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Lowercases and keeps ASCII letters and digits only.
fn sanitize_name_part(part: &str) -> String {
    part.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Generates the ordered candidate sequence for a name at `domain`.
///
/// Patterns are applied in `config.pattern_order`; an address produced by more than one
/// pattern keeps its first (lowest-rank) slot. Addresses failing `config.email_regex`
/// are dropped. Returns an empty vector when both name parts are empty after
/// sanitization.
pub(crate) fn generate_email_patterns(
    config: &Config,
    first_name: &str,
    last_name: &str,
    domain: &str,
) -> Vec<EmailCandidate> {
    let first = sanitize_name_part(first_name);
    let last = sanitize_name_part(last_name);

    if first.is_empty() && last.is_empty() {
        tracing::warn!(
            "Cannot generate patterns: sanitized name parts are empty (original: '{} {}')",
            first_name,
            last_name
        );
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(config.pattern_order.len());

    for pattern in &config.pattern_order {
        let Some(local_part) = pattern.compose(&first, &last) else {
            continue;
        };
        let address = format!("{}@{}", local_part, domain);
        if !config.email_regex.is_match(&address) {
            tracing::trace!("Generated pattern failed regex validation: {}", address);
            continue;
        }
        if seen.insert(address.clone()) {
            candidates.push(EmailCandidate {
                address,
                rank: candidates.len(),
                pattern: *pattern,
            });
        }
    }

    tracing::debug!(
        "Generated {} candidates for '{} {}' @ '{}'",
        candidates.len(),
        first_name,
        last_name,
        domain
    );
    candidates
}

/// A random, practically unassignable address used to detect catch-all domains.
pub(crate) fn catch_all_probe_address(domain: &str) -> String {
    format!("nobody-{:016x}@{}", rand::thread_rng().gen::<u64>(), domain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigBuilder;

    fn test_config() -> Config {
        ConfigBuilder::new()
            .skip_default_files()
            .build()
            .expect("Failed to build default config for test")
    }

    fn addresses(candidates: &[EmailCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.address.as_str()).collect()
    }

    #[test]
    fn test_default_priority_order() {
        let config = test_config();
        let candidates = generate_email_patterns(&config, "John", "Smith", "example.com");
        assert_eq!(
            addresses(&candidates),
            vec![
                "john@example.com",
                "john.smith@example.com",
                "jsmith@example.com",
                "johnsmith@example.com",
                "john_smith@example.com",
                "smithj@example.com",
                "smith.john@example.com",
                "smith@example.com",
            ]
        );
        for (index, candidate) in candidates.iter().enumerate() {
            assert_eq!(candidate.rank, index);
        }
        assert_eq!(candidates[2].pattern, LocalPartPattern::FirstInitialLast);
    }

    #[test]
    fn test_sanitization() {
        let config = test_config();
        let candidates = generate_email_patterns(&config, "  Jean-Luc ", " O'Malley Jr.", "test.co.uk");
        assert_eq!(candidates[0].address, "jeanluc@test.co.uk");
        assert_eq!(candidates[1].address, "jeanluc.omalleyjr@test.co.uk");
        assert!(!candidates
            .iter()
            .any(|c| c.address.contains('\'') || c.address.contains('-') || c.address.contains(' ')));
    }

    #[test]
    fn test_single_name_part_emits_single_part_patterns_only() {
        let config = test_config();
        let only_first = generate_email_patterns(&config, "Jane", "", "acme.io");
        assert_eq!(addresses(&only_first), vec!["jane@acme.io"]);

        let only_last = generate_email_patterns(&config, "", "Doe", "acme.io");
        assert_eq!(addresses(&only_last), vec!["doe@acme.io"]);
        assert_eq!(only_last[0].rank, 0);
    }

    #[test]
    fn test_empty_names_produce_nothing() {
        let config = test_config();
        assert!(generate_email_patterns(&config, "", "", "example.com").is_empty());
        assert!(generate_email_patterns(&config, "  ", "$%^", "example.com").is_empty());
    }

    #[test]
    fn test_duplicates_collapse_to_lowest_rank() {
        let config = test_config();
        // "a" + "b": flast = "ab" and firstlast = "ab"
        let candidates = generate_email_patterns(&config, "A", "B", "x.org");
        let all = addresses(&candidates);
        let unique: HashSet<&str> = all.iter().copied().collect();
        assert_eq!(all.len(), unique.len());
        let ab = candidates.iter().find(|c| c.address == "ab@x.org").unwrap();
        assert_eq!(ab.pattern, LocalPartPattern::FirstInitialLast);
        assert_eq!(ab.rank, 2);
        // ranks stay dense after collapsing
        let ranks: Vec<usize> = candidates.iter().map(|c| c.rank).collect();
        assert_eq!(ranks, (0..candidates.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_custom_pattern_order() {
        let config = ConfigBuilder::new()
            .skip_default_files()
            .pattern_order(vec![LocalPartPattern::FirstDotLast, LocalPartPattern::First])
            .build()
            .unwrap();
        let candidates = generate_email_patterns(&config, "Ann", "Park", "strict.org");
        assert_eq!(
            addresses(&candidates),
            vec!["ann.park@strict.org", "ann@strict.org"]
        );
    }

    #[test]
    fn test_deterministic() {
        let config = test_config();
        let a = generate_email_patterns(&config, "Bob", "Lee", "catchall.co");
        let b = generate_email_patterns(&config, "Bob", "Lee", "catchall.co");
        assert_eq!(a, b);
    }

    #[test]
    fn test_catch_all_probe_address_is_random_and_valid() {
        let config = test_config();
        let a = catch_all_probe_address("example.com");
        let b = catch_all_probe_address("example.com");
        assert_ne!(a, b);
        assert!(a.starts_with("nobody-"));
        assert!(a.ends_with("@example.com"));
        assert!(config.email_regex.is_match(&a));
    }
}
