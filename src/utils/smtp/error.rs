//! Maps lettre SMTP errors onto probe outcomes.

use crate::core::models::ProbeOutcome;
use lettre::transport::smtp::Error as SmtpError;

/// Which part of the session produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// TCP connect, greeting, EHLO, or the STARTTLS upgrade.
    Connect,
    MailFrom,
    Rcpt,
}

/// Interprets a lettre error raised at `stage` of a session with `server`.
///
/// Only RCPT-stage 5xx replies are evidence about the mailbox. A permanent
/// refusal earlier in the session means the host will not be probed at all.
/// Everything else (4xx, timeouts, refused or reset connections) is transient.
pub(crate) fn handle_smtp_error(error: &SmtpError, stage: SessionStage, server: &str) -> ProbeOutcome {
    let code = error
        .status()
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".to_string());

    if error.is_permanent() {
        return match stage {
            SessionStage::Rcpt => {
                tracing::info!(target: "smtp_task",
                    "RCPT rejected by {} ({}): {}", server, code, error);
                ProbeOutcome::Rejected
            }
            SessionStage::MailFrom | SessionStage::Connect => {
                tracing::warn!(target: "smtp_task",
                    "{} refuses verification probes at {:?} ({}): {}", server, stage, code, error);
                ProbeOutcome::Unreachable
            }
        };
    }

    let err_string = error.to_string().to_lowercase();
    if error.is_transient() {
        if err_string.contains("greylist") || err_string.contains("try again") {
            tracing::info!(target: "smtp_task", "{} is greylisting ({}): {}", server, code, error);
        } else {
            tracing::warn!(target: "smtp_task", "SMTP transient error (4xx) from {}: {}", server, error);
        }
    } else if err_string.contains("timed out")
        || err_string.contains("connection refused")
        || err_string.contains("network is unreachable")
    {
        tracing::warn!(target: "smtp_task",
            "Connection to {} failed: {}. Outbound SMTP may be blocked.", server, error);
    } else {
        tracing::warn!(target: "smtp_task", "SMTP error for {} at {:?}: {}", server, stage, error);
    }
    ProbeOutcome::TransientFailure
}

/// Whether a refusal asks the client to upgrade with STARTTLS first.
pub(crate) fn requires_tls(error: &SmtpError) -> bool {
    let message = error.to_string().to_lowercase();
    let is_530 = error.status().map(|c| c.to_string()) == Some("530".to_string());
    message.contains("starttls")
        || message.contains("tls required")
        || (is_530 && message.contains("5.7.0") && !message.contains("authentication required"))
}

