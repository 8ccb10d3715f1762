//! Provides the SmtpVerifier client for probing mailboxes via SMTP.

use super::error::{handle_smtp_error, requires_tls, SessionStage};
use super::{MailboxProbe, ProbeReport};
use crate::core::config::{get_random_sleep_duration, Config};
use crate::core::error::{AppError, Result};
use crate::core::models::{EmailCandidate, MailHost, ProbeOutcome};
use crate::utils::patterns::catch_all_probe_address;

use async_trait::async_trait;
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::commands::{Mail, Rcpt};
use lettre::transport::smtp::extension::ClientId;
use lettre::Address;
use std::net::ToSocketAddrs;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Owned inputs of one blocking session.
#[derive(Clone)]
struct SessionParams {
    server: String,
    port: u16,
    helo_name: ClientId,
    timeout: Duration,
    sender: Option<Address>,
    recipient: Address,
    catch_all_probe: Option<Address>,
}

struct SessionReport {
    outcome: ProbeOutcome,
    catch_all: Option<bool>,
    failed_at: Option<SessionStage>,
    /// The server refused the plaintext session and wants STARTTLS.
    tls_required: bool,
}

impl SessionReport {
    fn outcome(outcome: ProbeOutcome) -> Self {
        Self {
            outcome,
            catch_all: None,
            failed_at: None,
            tls_required: false,
        }
    }

    fn failed(outcome: ProbeOutcome, stage: SessionStage) -> Self {
        Self {
            failed_at: Some(stage),
            ..Self::outcome(outcome)
        }
    }

    fn tls_required(stage: SessionStage) -> Self {
        Self {
            tls_required: true,
            ..Self::failed(ProbeOutcome::TransientFailure, stage)
        }
    }
}

/// Sends `QUIT` when dropped, so every exit path closes the session.
struct QuitOnDrop(SmtpConnection);

impl Deref for QuitOnDrop {
    type Target = SmtpConnection;
    fn deref(&self) -> &SmtpConnection {
        &self.0
    }
}

impl DerefMut for QuitOnDrop {
    fn deref_mut(&mut self) -> &mut SmtpConnection {
        &mut self.0
    }
}

impl Drop for QuitOnDrop {
    fn drop(&mut self) {
        if let Err(e) = self.0.quit() {
            tracing::trace!(target: "smtp_task", "QUIT failed: {}", e);
        }
    }
}

/// Represents a client for probing mailboxes via SMTP without sending mail.
#[derive(Clone)]
pub struct SmtpVerifier {
    config: Arc<Config>,
    sender: Option<Address>,
    cancel: CancellationToken,
}

impl SmtpVerifier {
    /// Creates a verifier; pacing sleeps end early once `cancel` fires.
    pub fn new(config: Arc<Config>, cancel: CancellationToken) -> Result<Self> {
        let sender = match config.smtp_sender_email {
            Some(ref s) => Some(Address::from_str(s).map_err(|e| AppError::InvalidAddress {
                address: s.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };
        Ok(Self {
            config,
            sender,
            cancel,
        })
    }

    /// Sleeps for the pacing delay. Returns `false` when cancelled instead.
    async fn pace(&self) -> bool {
        let delay = get_random_sleep_duration(&self.config);
        if delay.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tracing::debug!(target: "smtp_task", "Pacing {:?} before connecting.", delay);
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Probes `email` on `mail_server`, retrying transient failures.
    ///
    /// A transient result that survives every attempt is reported as
    /// `Unreachable`, tagged with the stage that kept failing so callers can tell
    /// a dead host from a greylisted recipient. The catch-all check only runs
    /// when `check_catch_all` is set and the candidate itself was accepted.
    ///
    /// # Arguments
    /// * `email` - The candidate address to check.
    /// * `domain` - The domain the catch-all probe address is built for.
    /// * `mail_server` - The exchange host to connect to.
    /// * `check_catch_all` - Whether to follow an accepted `RCPT` with a random one.
    ///
    /// # Returns
    /// * `ProbeReport` - Never `TransientFailure`; cancellation yields `Unreachable`.
    pub async fn verify_with_retries(
        &self,
        email: &str,
        domain: &str,
        mail_server: &str,
        check_catch_all: bool,
    ) -> ProbeReport {
        let recipient = match Address::from_str(email) {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!(target: "smtp_task", "Invalid recipient format '{}': {}", email, e);
                return ProbeReport::new(ProbeOutcome::Rejected);
            }
        };

        let catch_all_probe = if check_catch_all {
            let address = catch_all_probe_address(domain);
            match Address::from_str(&address) {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!(target: "smtp_task",
                        "Cannot build catch-all probe for {}: {}", domain, e);
                    None
                }
            }
        } else {
            None
        };

        let params = SessionParams {
            server: mail_server.to_string(),
            port: self.config.smtp_port,
            helo_name: ClientId::Domain(self.config.helo_name.clone()),
            timeout: self.config.smtp_timeout,
            sender: self.sender.clone(),
            recipient,
            catch_all_probe,
        };

        let attempts = self.config.max_verification_attempts.max(1);
        let mut last_stage = SessionStage::Connect;
        for attempt in 1..=attempts {
            if !self.pace().await {
                tracing::info!(target: "smtp_task", "Probe of <{}> cancelled.", email);
                return ProbeReport::new(ProbeOutcome::Unreachable);
            }

            tracing::debug!(target: "smtp_task",
                "Attempt {}/{} to verify <{}> via SMTP server {}",
                attempt, attempts, email, mail_server
            );

            let report = self.verify_email(params.clone()).await;
            if report.outcome == ProbeOutcome::TransientFailure {
                last_stage = report.failed_at.unwrap_or(SessionStage::Connect);
                tracing::warn!(target: "smtp_task",
                    "SMTP check for <{}> inconclusive on attempt {}/{}.", email, attempt, attempts);
                continue;
            }

            tracing::info!(target: "smtp_task",
                "SMTP result for <{}> via {}: {} (catch-all: {:?})",
                email, mail_server, report.outcome, report.catch_all
            );
            return ProbeReport {
                outcome: report.outcome,
                catch_all: report.catch_all,
                failed_at: report.failed_at,
            };
        }

        tracing::warn!(target: "smtp_task",
            "SMTP check for <{}> via {} exhausted {} attempt(s) failing at {:?}; unreachable.",
            email, mail_server, attempts, last_stage
        );
        ProbeReport::unreachable(last_stage)
    }

    /// Runs one session, upgraded with STARTTLS when the server demands it.
    ///
    /// # Arguments
    /// * `params` - Connection and recipient details for the session.
    ///
    /// # Returns
    /// * `SessionReport` - The plaintext result, or that of the TLS retry.
    async fn verify_email(&self, params: SessionParams) -> SessionReport {
        let plain = run_blocking_session(params.clone(), false).await;
        if !plain.tls_required {
            return plain;
        }
        tracing::info!(target: "smtp_task",
            "Server {} requires STARTTLS, retrying connection with TLS enabled", params.server);
        run_blocking_session(params, true).await
    }
}

#[async_trait]
impl MailboxProbe for SmtpVerifier {
    async fn probe(
        &self,
        candidate: &EmailCandidate,
        domain: &str,
        host: &MailHost,
        check_catch_all: bool,
    ) -> ProbeReport {
        self.verify_with_retries(&candidate.address, domain, &host.host, check_catch_all)
            .await
    }
}

async fn run_blocking_session(params: SessionParams, use_tls: bool) -> SessionReport {
    match tokio::task::spawn_blocking(move || run_session(&params, use_tls)).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(target: "smtp_task", "SMTP session task failed: {}", e);
            SessionReport::failed(ProbeOutcome::TransientFailure, SessionStage::Connect)
        }
    }
}

/// Greeting, EHLO, optional STARTTLS, `MAIL FROM`, `RCPT TO`, then the
/// optional catch-all `RCPT`.
fn run_session(params: &SessionParams, use_tls: bool) -> SessionReport {
    let socket_addr = match (params.server.as_str(), params.port).to_socket_addrs() {
        Ok(mut addrs) => match addrs.next() {
            Some(addr) => addr,
            None => {
                tracing::warn!(target: "smtp_task", "No address for mail server {}", params.server);
                return SessionReport::failed(ProbeOutcome::TransientFailure, SessionStage::Connect);
            }
        },
        Err(e) => {
            tracing::warn!(target: "smtp_task",
                "Could not resolve mail server {}: {}", params.server, e);
            return SessionReport::failed(ProbeOutcome::TransientFailure, SessionStage::Connect);
        }
    };

    tracing::debug!(target: "smtp_task", "Connecting to {} at {}", params.server, socket_addr);
    let conn = match SmtpConnection::connect(
        socket_addr,
        Some(params.timeout),
        &params.helo_name,
        None,
        None,
    ) {
        Ok(conn) => conn,
        Err(e) => {
            return SessionReport::failed(
                handle_smtp_error(&e, SessionStage::Connect, &params.server),
                SessionStage::Connect,
            )
        }
    };
    let mut conn = QuitOnDrop(conn);

    if use_tls {
        let tls_parameters = match TlsParameters::new(params.server.clone()) {
            Ok(tls) => tls,
            Err(e) => {
                tracing::warn!(target: "smtp_task",
                    "Failed to create TLS parameters for {}: {}", params.server, e);
                return SessionReport::failed(ProbeOutcome::Unreachable, SessionStage::Connect);
            }
        };
        if let Err(e) = conn.starttls(&tls_parameters, &params.helo_name) {
            tracing::warn!(target: "smtp_task", "STARTTLS with {} failed: {}", params.server, e);
            return SessionReport::failed(
                handle_smtp_error(&e, SessionStage::Connect, &params.server),
                SessionStage::Connect,
            );
        }
        tracing::debug!(target: "smtp_task", "Upgraded session with {} to TLS", params.server);
    }

    if let Err(e) = conn.command(Mail::new(params.sender.clone(), vec![])) {
        if !use_tls && requires_tls(&e) {
            return SessionReport::tls_required(SessionStage::MailFrom);
        }
        return SessionReport::failed(
            handle_smtp_error(&e, SessionStage::MailFrom, &params.server),
            SessionStage::MailFrom,
        );
    }

    match conn.command(Rcpt::new(params.recipient.clone(), vec![])) {
        Ok(response) => {
            tracing::debug!(target: "smtp_task",
                "RCPT TO:<{}> accepted by {}: {}",
                params.recipient, params.server, response.code()
            );
        }
        Err(e) => {
            if !use_tls && requires_tls(&e) {
                return SessionReport::tls_required(SessionStage::Rcpt);
            }
            return SessionReport::failed(
                handle_smtp_error(&e, SessionStage::Rcpt, &params.server),
                SessionStage::Rcpt,
            );
        }
    }

    let Some(ref probe_address) = params.catch_all_probe else {
        return SessionReport::outcome(ProbeOutcome::Accepted);
    };

    tracing::debug!(target: "smtp_task", "Catch-all check with <{}> on {}", probe_address, params.server);
    match conn.command(Rcpt::new(probe_address.clone(), vec![])) {
        Ok(_) => {
            tracing::info!(target: "smtp_task",
                "{} accepted random recipient <{}>; domain is catch-all.",
                params.server, probe_address
            );
            SessionReport {
                catch_all: Some(true),
                ..SessionReport::outcome(ProbeOutcome::CatchAll)
            }
        }
        Err(e) if e.is_permanent() => SessionReport {
            catch_all: Some(false),
            ..SessionReport::outcome(ProbeOutcome::Accepted)
        },
        Err(e) => {
            tracing::warn!(target: "smtp_task",
                "Catch-all check on {} inconclusive: {}. Assuming not catch-all.", params.server, e);
            SessionReport::outcome(ProbeOutcome::Accepted)
        }
    }
}

/// Tests outbound SMTP connectivity by connecting to the configured probe host.
///
/// # Arguments
/// * `config` - Supplies the probe host, port, timeout and EHLO name.
///
/// # Returns
/// * `Result<()>` - `Ok` when a session could be opened and closed.
pub async fn test_smtp_connectivity(config: &Config) -> Result<()> {
    let host = config.connectivity_probe_host.clone();
    let port = config.smtp_port;
    let timeout = config.smtp_timeout;
    let helo = ClientId::Domain(config.helo_name.clone());
    tracing::info!("Testing SMTP connectivity to {}:{}...", host, port);

    let target = format!("{}:{}", host, port);
    let task = tokio::task::spawn_blocking(move || {
        let mut conn = SmtpConnection::connect((host.as_str(), port), Some(timeout), &helo, None, None)?;
        conn.quit().ok();
        Ok::<(), lettre::transport::smtp::Error>(())
    });

    match tokio::time::timeout(timeout + Duration::from_secs(2), task).await {
        Ok(Ok(Ok(()))) => {
            tracing::info!("SMTP connectivity test successful (connected to {}).", target);
            Ok(())
        }
        Ok(Ok(Err(e))) => {
            tracing::error!("SMTP connectivity test failed: error connecting to {}: {}", target, e);
            let err_str = e.to_string().to_lowercase();
            if err_str.contains("connection refused") || err_str.contains("network is unreachable") {
                Err(AppError::Connectivity(format!(
                    "Connection to {} refused or network unreachable. Check firewall or network settings.",
                    target
                )))
            } else {
                Err(AppError::Smtp(e))
            }
        }
        Ok(Err(e)) => Err(AppError::Connectivity(format!("connectivity task failed: {}", e))),
        Err(_) => {
            tracing::error!(
                "SMTP connectivity test timed out connecting to {}. Outbound port {} is likely blocked.",
                target, port
            );
            Err(AppError::Connectivity(format!(
                "Connection to {} timed out; port {} is likely blocked.",
                target, port
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::enricher::{Enricher, RowState};
    use crate::core::models::{EmailStatus, EnrichmentResult, LeadRecord, MailExchangeSet, RowId};
    use crate::utils::dns::MxLookup;
    use crate::utils::patterns::LocalPartPattern;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Mutex;

    type RcptRule = fn(&str) -> &'static str;

    struct MockServer {
        port: u16,
        transcript: Arc<Mutex<Vec<String>>>,
    }

    impl MockServer {
        fn lines(&self) -> Vec<String> {
            self.transcript.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.lines().iter().filter(|l| l.starts_with(prefix)).count()
        }
    }

    /// Scripted SMTP server: fixed `MAIL FROM` reply, per-recipient `RCPT` replies.
    fn spawn_mock_server(mail_reply: &'static str, rcpt_reply: RcptRule) -> MockServer {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let transcript = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&transcript);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                serve_session(stream, mail_reply, rcpt_reply, &log);
            }
        });
        MockServer { port, transcript }
    }

    fn serve_session(
        mut stream: TcpStream,
        mail_reply: &str,
        rcpt_reply: RcptRule,
        log: &Mutex<Vec<String>>,
    ) {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        if stream.write_all(b"220 mock.test ESMTP\r\n").is_err() {
            return;
        }
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let command = line.trim_end().to_string();
            log.lock().unwrap().push(command.clone());
            let upper = command.to_uppercase();
            let reply = if upper.starts_with("EHLO") || upper.starts_with("HELO") {
                "250-mock.test\r\n250 STARTTLS".to_string()
            } else if upper.starts_with("STARTTLS") {
                "454 4.7.0 TLS not available due to temporary reason".to_string()
            } else if upper.starts_with("MAIL FROM") {
                mail_reply.to_string()
            } else if upper.starts_with("RCPT TO") {
                let address = command
                    .split_once('<')
                    .and_then(|(_, rest)| rest.split_once('>'))
                    .map(|(addr, _)| addr)
                    .unwrap_or("");
                rcpt_reply(address).to_string()
            } else if upper.starts_with("QUIT") {
                let _ = stream.write_all(b"221 bye\r\n");
                break;
            } else if upper.starts_with("DATA") {
                "354 go ahead".to_string()
            } else {
                "500 unrecognized".to_string()
            };
            if stream.write_all(format!("{}\r\n", reply).as_bytes()).is_err() {
                break;
            }
        }
    }

    fn test_config(port: u16) -> Config {
        Config {
            smtp_port: port,
            smtp_timeout: Duration::from_secs(3),
            probe_delay_ms: (0, 0),
            max_verification_attempts: 2,
            connectivity_probe_host: "127.0.0.1".to_string(),
            ..Config::default()
        }
    }

    fn verifier(config: Config) -> SmtpVerifier {
        SmtpVerifier::new(Arc::new(config), CancellationToken::new()).unwrap()
    }

    fn only_known_mailbox(address: &str) -> &'static str {
        if address.starts_with("jane") {
            "250 2.1.5 ok"
        } else {
            "550 5.1.1 no such user"
        }
    }

    #[tokio::test]
    async fn test_accepted_with_negative_catch_all_check() {
        let server = spawn_mock_server("250 2.1.0 ok", only_known_mailbox);
        let report = verifier(test_config(server.port))
            .verify_with_retries("jane@acme.test", "acme.test", "127.0.0.1", true)
            .await;

        assert_eq!(report.outcome, ProbeOutcome::Accepted);
        assert_eq!(report.catch_all, Some(false));

        let lines = server.lines();
        assert!(lines.contains(&"MAIL FROM:<>".to_string()));
        assert!(lines.contains(&"RCPT TO:<jane@acme.test>".to_string()));
        assert_eq!(server.count("RCPT TO:<nobody-"), 1);
        assert_eq!(server.count("QUIT"), 1);
        assert_eq!(server.count("DATA"), 0);
    }

    #[tokio::test]
    async fn test_catch_all_domain() {
        let server = spawn_mock_server("250 2.1.0 ok", |_| "250 2.1.5 ok");
        let report = verifier(test_config(server.port))
            .verify_with_retries("jane@acme.test", "acme.test", "127.0.0.1", true)
            .await;

        assert_eq!(report.outcome, ProbeOutcome::CatchAll);
        assert_eq!(report.catch_all, Some(true));
        assert_eq!(server.count("QUIT"), 1);
    }

    #[tokio::test]
    async fn test_rejected_mailbox_skips_catch_all_check() {
        let server = spawn_mock_server("250 2.1.0 ok", only_known_mailbox);
        let report = verifier(test_config(server.port))
            .verify_with_retries("john@acme.test", "acme.test", "127.0.0.1", true)
            .await;

        assert_eq!(report.outcome, ProbeOutcome::Rejected);
        assert_eq!(report.catch_all, None);
        assert_eq!(server.count("RCPT TO"), 1);
        assert_eq!(server.count("QUIT"), 1);
    }

    #[tokio::test]
    async fn test_catch_all_check_not_requested() {
        let server = spawn_mock_server("250 2.1.0 ok", |_| "250 2.1.5 ok");
        let report = verifier(test_config(server.port))
            .verify_with_retries("jane@acme.test", "acme.test", "127.0.0.1", false)
            .await;

        assert_eq!(report, ProbeReport::new(ProbeOutcome::Accepted));
        assert_eq!(server.count("RCPT TO"), 1);
    }

    #[tokio::test]
    async fn test_transient_replies_retry_then_unreachable() {
        let server = spawn_mock_server("250 2.1.0 ok", |_| "451 4.7.1 greylisted, try again later");
        let report = verifier(test_config(server.port))
            .verify_with_retries("jane@acme.test", "acme.test", "127.0.0.1", true)
            .await;

        assert_eq!(report.outcome, ProbeOutcome::Unreachable);
        assert_eq!(report.failed_at, Some(SessionStage::Rcpt));
        assert!(!report.is_host_failure());
        assert_eq!(server.count("EHLO"), 2);
        assert_eq!(server.count("QUIT"), 2);
        assert_eq!(server.count("STARTTLS"), 0);
    }

    #[tokio::test]
    async fn test_mail_from_refusal_is_unreachable_without_retry() {
        let server = spawn_mock_server("550 5.7.1 verification probes not welcome", |_| "250 ok");
        let config = Config {
            smtp_sender_email: Some("probe@sender.test".to_string()),
            ..test_config(server.port)
        };
        let report = verifier(config)
            .verify_with_retries("jane@acme.test", "acme.test", "127.0.0.1", true)
            .await;

        assert_eq!(report.outcome, ProbeOutcome::Unreachable);
        assert_eq!(report.failed_at, Some(SessionStage::MailFrom));
        assert!(report.is_host_failure());
        assert!(server
            .lines()
            .contains(&"MAIL FROM:<probe@sender.test>".to_string()));
        assert_eq!(server.count("EHLO"), 1);
        assert_eq!(server.count("RCPT TO"), 0);
        assert_eq!(server.count("QUIT"), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let report = verifier(test_config(port))
            .verify_with_retries("jane@acme.test", "acme.test", "127.0.0.1", true)
            .await;
        assert_eq!(report.outcome, ProbeOutcome::Unreachable);
        assert_eq!(report.failed_at, Some(SessionStage::Connect));
        assert!(report.is_host_failure());
    }

    #[tokio::test]
    async fn test_starttls_demand_retries_session_with_tls() {
        let server = spawn_mock_server("530 5.7.0 Must issue a STARTTLS command first", |_| "250 ok");
        let report = verifier(test_config(server.port))
            .verify_with_retries("jane@acme.test", "acme.test", "127.0.0.1", false)
            .await;

        // each attempt: plaintext session refused at MAIL FROM, then a STARTTLS session
        assert_eq!(server.count("MAIL FROM"), 2);
        assert_eq!(server.count("STARTTLS"), 2);
        assert_eq!(server.count("EHLO"), 4);
        assert_eq!(server.count("RCPT TO"), 0);
        assert_eq!(report.outcome, ProbeOutcome::Unreachable);
        assert_eq!(report.failed_at, Some(SessionStage::Connect));
    }

    #[tokio::test]
    async fn test_cancelled_probe_never_connects() {
        let server = spawn_mock_server("250 2.1.0 ok", |_| "250 ok");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let verifier = SmtpVerifier::new(Arc::new(test_config(server.port)), cancel).unwrap();

        let report = verifier
            .verify_with_retries("jane@acme.test", "acme.test", "127.0.0.1", true)
            .await;
        assert_eq!(report.outcome, ProbeOutcome::Unreachable);
        assert!(server.lines().is_empty());
    }

    #[tokio::test]
    async fn test_pacing_sleep_is_interrupted_by_cancel() {
        let config = Config {
            probe_delay_ms: (60_000, 60_000),
            ..test_config(1)
        };
        let cancel = CancellationToken::new();
        let verifier = SmtpVerifier::new(Arc::new(config), cancel.clone()).unwrap();
        cancel.cancel();
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            verifier.verify_with_retries("jane@acme.test", "acme.test", "127.0.0.1", false),
        )
        .await
        .expect("pacing must stop on cancel");
        assert_eq!(report.outcome, ProbeOutcome::Unreachable);
    }

    #[tokio::test]
    async fn test_mailbox_probe_trait_uses_candidate_and_host() {
        let server = spawn_mock_server("250 2.1.0 ok", only_known_mailbox);
        let verifier = verifier(test_config(server.port));
        let candidate = EmailCandidate {
            address: "jane.doe@acme.test".to_string(),
            rank: 1,
            pattern: LocalPartPattern::FirstDotLast,
        };
        let host = MailHost {
            host: "127.0.0.1".to_string(),
            priority: 10,
        };
        let report = verifier.probe(&candidate, "acme.test", &host, false).await;
        assert_eq!(report.outcome, ProbeOutcome::Accepted);
        assert!(server
            .lines()
            .contains(&"RCPT TO:<jane.doe@acme.test>".to_string()));
    }

    #[test]
    fn test_invalid_sender_is_rejected_at_construction() {
        let config = Config {
            smtp_sender_email: Some("not an address".to_string()),
            ..Config::default()
        };
        let result = SmtpVerifier::new(Arc::new(config), CancellationToken::new());
        assert!(matches!(result, Err(AppError::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn test_connectivity_check() {
        let server = spawn_mock_server("250 ok", |_| "250 ok");
        assert!(test_smtp_connectivity(&test_config(server.port)).await.is_ok());
        assert_eq!(server.count("QUIT"), 1);

        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        assert!(test_smtp_connectivity(&test_config(port)).await.is_err());
    }

    struct LoopbackMx;

    #[async_trait]
    impl MxLookup for LoopbackMx {
        async fn lookup_mx(&self, _domain: &str) -> MailExchangeSet {
            MailExchangeSet::new(vec![MailHost {
                host: "127.0.0.1".to_string(),
                priority: 10,
            }])
        }
    }

    fn greylisted_first_candidate(address: &str) -> &'static str {
        if address.starts_with("jane@") {
            "450 4.2.1 mailbox temporarily unavailable"
        } else if address.starts_with("jane.doe@") {
            "250 2.1.5 ok"
        } else {
            "550 5.1.1 no such user"
        }
    }

    #[tokio::test]
    async fn test_greylisted_candidate_does_not_hide_later_deliverable_one() {
        let server = spawn_mock_server("250 2.1.0 ok", greylisted_first_candidate);
        let config = Arc::new(test_config(server.port));
        let cancel = CancellationToken::new();
        let prober = SmtpVerifier::new(Arc::clone(&config), cancel.clone()).unwrap();
        let engine = Enricher::new(config, LoopbackMx, prober, cancel);
        let lead = LeadRecord {
            row: RowId(0),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            website_candidates: vec!["acme.io".to_string()],
        };

        let state = engine.resolve_lead(&lead).await;

        assert_eq!(
            state,
            RowState::Classified(EnrichmentResult::new(
                "jane.doe@acme.io",
                EmailStatus::Deliverable
            ))
        );
        assert_eq!(server.count("RCPT TO:<jane@acme.io>"), 2);
        assert_eq!(server.count("RCPT TO:<jane.doe@acme.io>"), 1);
    }
}
