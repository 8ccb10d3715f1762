//! Provides the `ConfigBuilder` for fluent configuration construction.

use super::loading::{apply_file_config, load_config_file};
use super::validation::validate_config;
use super::{Config, ConfigFile, Result};
use crate::core::error::AppError;
use crate::utils::patterns::LocalPartPattern;
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] = ["./lead-enricher.toml", "./config.toml"];

/// Builder pattern for creating `Config` instances fluently.
///
/// Precedence, lowest first: built-in defaults, the configuration file, then the
/// values set on the builder. The result is validated before it is returned.
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
    config_file_path: Option<String>,
    skip_default_files: bool,
    overrides: ConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Specify an optional configuration file path to load.
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_file_path = Some(path.into());
        self
    }

    /// Do not look for configuration files in the working directory.
    pub fn skip_default_files(mut self) -> Self {
        self.skip_default_files = true;
        self
    }

    pub fn smtp_enabled(mut self, enabled: bool) -> Self {
        self.overrides.smtp.enabled = Some(enabled);
        self
    }
    pub fn smtp_timeout(mut self, duration: Duration) -> Self {
        self.overrides.smtp.smtp_timeout = Some(duration.as_secs());
        self
    }
    pub fn smtp_port(mut self, port: u16) -> Self {
        self.overrides.smtp.smtp_port = Some(port);
        self
    }
    pub fn smtp_sender_email(mut self, value: impl Into<String>) -> Self {
        self.overrides.smtp.sender_email = Some(value.into());
        self
    }
    pub fn helo_name(mut self, value: impl Into<String>) -> Self {
        self.overrides.smtp.helo_name = Some(value.into());
        self
    }
    pub fn max_verification_attempts(mut self, value: u32) -> Self {
        self.overrides.smtp.max_attempts = Some(value);
        self
    }
    pub fn max_mx_hosts(mut self, value: usize) -> Self {
        self.overrides.smtp.max_mx_hosts = Some(value);
        self
    }
    pub fn probe_delay_ms(mut self, min: u64, max: u64) -> Self {
        self.overrides.pacing.min_delay_ms = Some(min);
        self.overrides.pacing.max_delay_ms = Some(max);
        self
    }
    pub fn dns_timeout(mut self, duration: Duration) -> Self {
        self.overrides.dns.dns_timeout = Some(duration.as_secs());
        self
    }
    pub fn dns_servers(mut self, servers: Vec<String>) -> Self {
        self.overrides.dns.dns_servers = Some(servers);
        self
    }
    pub fn a_record_fallback(mut self, enable: bool) -> Self {
        self.overrides.dns.a_record_fallback = Some(enable);
        self
    }
    pub fn blocked_domains(mut self, domains: Vec<String>) -> Self {
        self.overrides.domains.blocked = Some(domains);
        self
    }
    pub fn pattern_order(mut self, order: Vec<LocalPartPattern>) -> Self {
        self.overrides.patterns.order = Some(order);
        self
    }
    pub fn ready_status(mut self, value: impl Into<String>) -> Self {
        self.overrides.sheet.ready_status = Some(value.into());
        self
    }
    pub fn skip_existing_email(mut self, skip: bool) -> Self {
        self.overrides.sheet.skip_existing_email = Some(skip);
        self
    }

    /// Builds the final `Config`, applying defaults, file settings, overrides, and validation.
    pub fn build(mut self) -> Result<Config> {
        let mut loaded_path: Option<String> = None;

        if let Some(ref path) = self.config_file_path {
            match load_config_file(path) {
                Ok(file_config) => {
                    apply_file_config(&mut self.config, &file_config);
                    loaded_path = Some(path.clone());
                    tracing::info!("Loaded base configuration from specified file: {}", path);
                }
                Err(e) => {
                    tracing::error!("Failed to load specified config file '{}': {:#}", path, e);
                    return Err(AppError::Config(format!(
                        "Failed to load specified configuration file '{}': {:#}",
                        path, e
                    )));
                }
            }
        } else if !self.skip_default_files {
            for path_str in DEFAULT_CONFIG_LOCATIONS {
                if !Path::new(path_str).exists() {
                    continue;
                }
                tracing::debug!("Found potential default config file: {}", path_str);
                match load_config_file(path_str) {
                    Ok(file_config) => {
                        apply_file_config(&mut self.config, &file_config);
                        loaded_path = Some(path_str.to_string());
                        tracing::info!(
                            "Loaded base configuration from default location: {}",
                            path_str
                        );
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Failed to load or parse default config '{}': {:#}",
                            path_str,
                            e
                        );
                    }
                }
            }
            if loaded_path.is_none() {
                tracing::debug!("No configuration file found. Using defaults and overrides.");
            }
        }

        apply_file_config(&mut self.config, &self.overrides);
        self.config.loaded_config_path = loaded_path;
        validate_config(&mut self.config)?;

        tracing::debug!("Final configuration built successfully.");
        Ok(self.config)
    }
}
