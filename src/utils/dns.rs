//! Mail-exchange resolution on top of the trust-dns async resolver.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};
use crate::core::models::{MailExchangeSet, MailHost};

use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use trust_dns_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::TokioAsyncResolver;

/// Anything that can produce the exchange set for a domain.
///
/// Implementations never fail: every resolution problem is an empty set.
#[async_trait]
pub trait MxLookup: Send + Sync {
    async fn lookup_mx(&self, domain: &str) -> MailExchangeSet;
}

/// Builds the async resolver from the configured name servers, or the system
/// configuration when none are set.
pub(crate) fn create_resolver(config: &Config) -> Result<TokioAsyncResolver> {
    let mut opts = ResolverOpts::default();
    opts.timeout = config.dns_timeout;
    opts.attempts = 2;

    if config.dns_servers.is_empty() {
        tracing::debug!(target: "dns_task", "Using system resolver configuration.");
        let (system_config, mut system_opts) =
            trust_dns_resolver::system_conf::read_system_conf().map_err(|e| {
                AppError::Initialization(format!("Failed to read system DNS configuration: {}", e))
            })?;
        system_opts.timeout = config.dns_timeout;
        system_opts.attempts = 2;
        return Ok(TokioAsyncResolver::tokio(system_config, system_opts));
    }

    let mut addrs: Vec<SocketAddr> = Vec::with_capacity(config.dns_servers.len());
    for server in &config.dns_servers {
        // "ip" means port 53
        let addr = server
            .parse::<IpAddr>()
            .map(|ip| SocketAddr::new(ip, 53))
            .or_else(|_| server.parse::<SocketAddr>())
            .map_err(|_| AppError::Config(format!("Invalid DNS server address: {}", server)))?;
        addrs.push(addr);
    }
    tracing::debug!(target: "dns_task", "Using configured DNS servers: {:?}", addrs);

    let mut resolver_config = ResolverConfig::new();
    for addr in addrs {
        for protocol in [Protocol::Udp, Protocol::Tcp] {
            let mut name_server = NameServerConfig::new(addr, protocol);
            name_server.trust_negative_responses = true;
            resolver_config.add_name_server(name_server);
        }
    }
    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}

/// DNS-backed [`MxLookup`].
pub struct DnsMxResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
    a_record_fallback: bool,
}

impl DnsMxResolver {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            resolver: create_resolver(config)?,
            // the resolver retries internally; bound the whole lookup as well
            timeout: config.dns_timeout * 3,
            a_record_fallback: config.a_record_fallback,
        })
    }

    async fn resolve_mail_servers(&self, domain: &str) -> Result<MailExchangeSet> {
        let fqdn = format!("{}.", domain.trim_end_matches('.'));
        let lookup = tokio::time::timeout(self.timeout, self.resolver.mx_lookup(fqdn.as_str()))
            .await
            .map_err(|_| AppError::DnsTimeout(domain.to_string()))?;

        match lookup {
            Ok(records) => {
                let hosts: Vec<MailHost> = records
                    .iter()
                    .map(|mx| MailHost {
                        host: mx.exchange().to_utf8().trim_end_matches('.').to_lowercase(),
                        priority: mx.preference(),
                    })
                    // RFC 7505 null MX: the domain accepts no mail
                    .filter(|h| !h.host.is_empty())
                    .collect();
                if hosts.is_empty() {
                    return Err(AppError::NoDnsRecords(domain.to_string()));
                }
                Ok(MailExchangeSet::new(hosts))
            }
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { response_code, .. }
                    if *response_code == ResponseCode::NXDomain =>
                {
                    Err(AppError::NxDomain(domain.to_string()))
                }
                ResolveErrorKind::NoRecordsFound { .. } => {
                    Err(AppError::NoDnsRecords(domain.to_string()))
                }
                ResolveErrorKind::Timeout => Err(AppError::DnsTimeout(domain.to_string())),
                _ => Err(AppError::DnsResolution(format!("{}: {}", domain, e))),
            },
        }
    }

    /// Implicit MX: the domain itself when it has an address record.
    async fn resolve_address_fallback(&self, domain: &str) -> MailExchangeSet {
        let fqdn = format!("{}.", domain.trim_end_matches('.'));
        match tokio::time::timeout(self.timeout, self.resolver.lookup_ip(fqdn.as_str())).await {
            Ok(Ok(ips)) if ips.iter().next().is_some() => {
                tracing::info!(target: "dns_task", "Using implicit MX (address record) for {}", domain);
                MailExchangeSet::new(vec![MailHost {
                    host: domain.to_string(),
                    priority: 0,
                }])
            }
            _ => MailExchangeSet::empty(),
        }
    }
}

#[async_trait]
impl MxLookup for DnsMxResolver {
    async fn lookup_mx(&self, domain: &str) -> MailExchangeSet {
        tracing::debug!(target: "dns_task", "Resolving MX for {}...", domain);
        match self.resolve_mail_servers(domain).await {
            Ok(set) => {
                tracing::info!(target: "dns_task",
                    "Resolved {} exchange(s) for {}; preferred: {}",
                    set.len(),
                    domain,
                    set.preferred().map(|h| h.host.as_str()).unwrap_or("-")
                );
                set
            }
            Err(e @ AppError::NoDnsRecords(_)) if self.a_record_fallback => {
                tracing::debug!(target: "dns_task", "{}; trying address fallback.", e);
                self.resolve_address_fallback(domain).await
            }
            Err(e @ AppError::NxDomain(_)) | Err(e @ AppError::NoDnsRecords(_)) => {
                tracing::warn!(target: "dns_task", "DNS lookup failed: {}. Cannot perform SMTP checks.", e);
                MailExchangeSet::empty()
            }
            Err(e) => {
                tracing::warn!(target: "dns_task", "DNS lookup error: {}. Treating as no exchanges.", e);
                MailExchangeSet::empty()
            }
        }
    }
}
