//! Contains validation logic for the final Config struct.

use super::{Config, Result};
use crate::core::error::AppError;

/// Validates the configuration after loading and overrides.
/// Clamps values where a sensible correction exists; rejects the rest.
pub(crate) fn validate_config(config: &mut Config) -> Result<()> {
    let (min_ms, max_ms) = config.probe_delay_ms;
    if min_ms > max_ms {
        tracing::warn!(
            "Min probe delay ({}ms) > max probe delay ({}ms). Setting max = min.",
            min_ms,
            max_ms
        );
        config.probe_delay_ms.1 = min_ms;
    }
    if config.max_verification_attempts == 0 {
        tracing::warn!("Max verification attempts was set to 0. Setting to 1.");
        config.max_verification_attempts = 1;
    }
    if config.max_mx_hosts == 0 {
        tracing::warn!("Max MX hosts was set to 0. Setting to 1.");
        config.max_mx_hosts = 1;
    }
    if config.smtp_timeout.is_zero() {
        return Err(AppError::Config(
            "SMTP timeout must be at least one second.".to_string(),
        ));
    }
    if config.dns_timeout.is_zero() {
        return Err(AppError::Config(
            "DNS timeout must be at least one second.".to_string(),
        ));
    }
    if let Some(ref sender) = config.smtp_sender_email {
        let valid = sender
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(AppError::Config(format!(
                "Invalid SMTP sender email format: {}",
                sender
            )));
        }
    }
    if config.helo_name.is_empty() {
        return Err(AppError::Config("HELO name cannot be empty.".to_string()));
    }
    if config.pattern_order.is_empty() {
        return Err(AppError::Config(
            "Candidate pattern order cannot be empty.".to_string(),
        ));
    }
    if config.sheet.website_fields.is_empty() {
        return Err(AppError::Config(
            "At least one website field alias is required.".to_string(),
        ));
    }
    if config.sheet.first_name_fields.is_empty() && config.sheet.last_name_fields.is_empty() {
        return Err(AppError::Config(
            "At least one first or last name field alias is required.".to_string(),
        ));
    }
    if config.dns_servers.is_empty() {
        tracing::debug!("No DNS servers configured; the system resolver configuration will be used.");
    }
    if !config.smtp_enabled {
        tracing::info!("SMTP verification disabled; results will be heuristic.");
    }
    Ok(())
}
