//! Handles loading configuration from files and applying it to the Config struct.

use super::{Config, ConfigFile};
use anyhow::Context;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Loads configuration settings from a TOML file.
pub(crate) fn load_config_file(file_path: &str) -> anyhow::Result<ConfigFile> {
    let path = Path::new(file_path);
    if !path.is_file() {
        return Err(anyhow::anyhow!(
            "File not found or is not a file: {}",
            file_path
        ));
    }
    tracing::debug!("Attempting to read config file: {}", file_path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", file_path))?;

    parse_config_str(&content)
        .with_context(|| format!("Failed to parse TOML configuration from {}", file_path))
}

pub(crate) fn parse_config_str(content: &str) -> anyhow::Result<ConfigFile> {
    let parsed: ConfigFile = toml::from_str(content)?;
    Ok(parsed)
}

/// Merges every `Some` field of `file_config` onto `config`.
pub(crate) fn apply_file_config(config: &mut Config, file_config: &ConfigFile) {
    // SMTP
    let smtp = &file_config.smtp;
    if let Some(enabled) = smtp.enabled {
        config.smtp_enabled = enabled;
    }
    if let Some(timeout) = smtp.smtp_timeout {
        config.smtp_timeout = Duration::from_secs(timeout);
    }
    if let Some(port) = smtp.smtp_port {
        config.smtp_port = port;
    }
    if let Some(ref sender) = smtp.sender_email {
        let sender = sender.trim();
        config.smtp_sender_email = (!sender.is_empty()).then(|| sender.to_string());
    }
    if let Some(ref helo) = smtp.helo_name {
        config.helo_name = helo.trim().to_string();
    }
    if let Some(attempts) = smtp.max_attempts {
        config.max_verification_attempts = attempts;
    }
    if let Some(hosts) = smtp.max_mx_hosts {
        config.max_mx_hosts = hosts;
    }
    if let Some(ref host) = smtp.connectivity_probe_host {
        config.connectivity_probe_host = host.trim().to_string();
    }

    // Pacing
    if let Some(min_ms) = file_config.pacing.min_delay_ms {
        config.probe_delay_ms.0 = min_ms;
    }
    if let Some(max_ms) = file_config.pacing.max_delay_ms {
        config.probe_delay_ms.1 = max_ms;
    }

    // DNS
    if let Some(timeout) = file_config.dns.dns_timeout {
        config.dns_timeout = Duration::from_secs(timeout);
    }
    if let Some(ref servers) = file_config.dns.dns_servers {
        config.dns_servers = servers
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(fallback) = file_config.dns.a_record_fallback {
        config.a_record_fallback = fallback;
    }

    // Domains
    if let Some(ref blocked) = file_config.domains.blocked {
        config.blocked_domains = blocked
            .iter()
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
    }

    // Patterns
    if let Some(ref order) = file_config.patterns.order {
        config.pattern_order = order.clone();
    }

    // Sheet
    let sheet = &file_config.sheet;
    let layout = &mut config.sheet;
    if let Some(ref v) = sheet.status_field {
        layout.status_field = v.clone();
    }
    if let Some(ref v) = sheet.ready_status {
        layout.ready_status = v.clone();
    }
    if let Some(ref v) = sheet.email_field {
        layout.email_field = v.clone();
    }
    if let Some(ref v) = sheet.email_status_field {
        layout.email_status_field = v.clone();
    }
    if let Some(ref v) = sheet.first_name_fields {
        layout.first_name_fields = v.clone();
    }
    if let Some(ref v) = sheet.last_name_fields {
        layout.last_name_fields = v.clone();
    }
    if let Some(ref v) = sheet.website_fields {
        layout.website_fields = v.clone();
    }
    if let Some(skip) = sheet.skip_existing_email {
        layout.skip_existing_email = skip;
    }
}
