//! Runtime configuration: defaults, TOML file schema, and the pacing helper.

mod builder;
mod loading;
mod validation;

pub use builder::ConfigBuilder;

pub(crate) use crate::core::error::Result;
use crate::utils::patterns::LocalPartPattern;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

/// Social and profile hosts that never identify a company mail domain.
pub const DEFAULT_BLOCKED_DOMAINS: [&str; 9] = [
    "linkedin.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "youtube.com",
    "tiktok.com",
    "medium.com",
    "github.com",
];

/// Where lead fields live in the row store and which rows are eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    pub status_field: String,
    pub ready_status: String,
    pub email_field: String,
    pub email_status_field: String,
    pub first_name_fields: Vec<String>,
    pub last_name_fields: Vec<String>,
    /// Checked in order; the first non-social domain wins.
    pub website_fields: Vec<String>,
    /// Leave rows alone when the email cell already holds a value.
    pub skip_existing_email: bool,
}

impl Default for SheetLayout {
    fn default() -> Self {
        let strings = |values: &[&str]| values.iter().map(|v| v.to_string()).collect();
        Self {
            status_field: "Status".to_string(),
            ready_status: "SCRAPED".to_string(),
            email_field: "Email".to_string(),
            email_status_field: "Email Status".to_string(),
            first_name_fields: strings(&["First Name", "FirstName", "first_name"]),
            last_name_fields: strings(&["Last Name", "LastName", "last_name"]),
            website_fields: strings(&["Website", "Company Website", "Website URL"]),
            skip_existing_email: true,
        }
    }
}

/// Immutable settings passed explicitly into the engine.
#[derive(Debug, Clone)]
pub struct Config {
    // SMTP
    pub smtp_enabled: bool,
    pub smtp_timeout: Duration,
    pub smtp_port: u16,
    /// `None` probes with the null reverse-path (`MAIL FROM:<>`).
    pub smtp_sender_email: Option<String>,
    pub helo_name: String,
    pub max_verification_attempts: u32,
    pub max_mx_hosts: usize,
    pub connectivity_probe_host: String,

    // Pacing, in milliseconds
    pub probe_delay_ms: (u64, u64),

    // DNS
    pub dns_timeout: Duration,
    pub dns_servers: Vec<String>,
    pub a_record_fallback: bool,

    // Candidates
    pub blocked_domains: HashSet<String>,
    pub pattern_order: Vec<LocalPartPattern>,
    pub email_regex: Regex,

    // Row store
    pub sheet: SheetLayout,

    pub loaded_config_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            smtp_enabled: true,
            smtp_timeout: Duration::from_secs(8),
            smtp_port: 25,
            smtp_sender_email: None,
            helo_name: "localhost".to_string(),
            max_verification_attempts: 2,
            max_mx_hosts: 2,
            connectivity_probe_host: "gmail-smtp-in.l.google.com".to_string(),
            probe_delay_ms: (400, 1100),
            dns_timeout: Duration::from_secs(5),
            dns_servers: Vec::new(),
            a_record_fallback: false,
            blocked_domains: DEFAULT_BLOCKED_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            pattern_order: LocalPartPattern::DEFAULT_ORDER.to_vec(),
            email_regex: Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$")
                .expect("built-in email regex is valid"),
            sheet: SheetLayout::default(),
            loaded_config_path: None,
        }
    }
}

/// Pacing delay drawn uniformly from the configured millisecond range.
pub fn get_random_sleep_duration(config: &Config) -> Duration {
    let (min_ms, max_ms) = config.probe_delay_ms;
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

/// On-disk TOML schema. Every field is optional; absent ones keep their default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub smtp: SmtpSection,
    pub pacing: PacingSection,
    pub dns: DnsSection,
    pub domains: DomainsSection,
    pub patterns: PatternsSection,
    pub sheet: SheetSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SmtpSection {
    pub enabled: Option<bool>,
    pub smtp_timeout: Option<u64>,
    pub smtp_port: Option<u16>,
    pub sender_email: Option<String>,
    pub helo_name: Option<String>,
    pub max_attempts: Option<u32>,
    pub max_mx_hosts: Option<usize>,
    pub connectivity_probe_host: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PacingSection {
    pub min_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DnsSection {
    pub dns_timeout: Option<u64>,
    pub dns_servers: Option<Vec<String>>,
    pub a_record_fallback: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DomainsSection {
    pub blocked: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PatternsSection {
    pub order: Option<Vec<LocalPartPattern>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SheetSection {
    pub status_field: Option<String>,
    pub ready_status: Option<String>,
    pub email_field: Option<String>,
    pub email_status_field: Option<String>,
    pub first_name_fields: Option<Vec<String>>,
    pub last_name_fields: Option<Vec<String>>,
    pub website_fields: Option<Vec<String>>,
    pub skip_existing_email: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_sleep_within_bounds() {
        let config = Config {
            probe_delay_ms: (10, 20),
            ..Config::default()
        };
        for _ in 0..50 {
            let d = get_random_sleep_duration(&config);
            assert!(d >= Duration::from_millis(10) && d <= Duration::from_millis(20));
        }
    }

    #[test]
    fn test_fixed_sleep_when_bounds_equal() {
        let config = Config {
            probe_delay_ms: (0, 0),
            ..Config::default()
        };
        assert_eq!(get_random_sleep_duration(&config), Duration::ZERO);
    }

    #[test]
    fn test_default_email_regex() {
        let config = Config::default();
        assert!(config.email_regex.is_match("first.last@example.co.uk"));
        assert!(!config.email_regex.is_match("no-at-sign.example.com"));
        assert!(!config.email_regex.is_match("user@localhost"));
    }
}
