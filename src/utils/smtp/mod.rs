//! Non-sending SMTP mailbox probing.

pub mod client;
mod error;

pub use client::{test_smtp_connectivity, SmtpVerifier};
pub use error::SessionStage;

use crate::core::models::{EmailCandidate, MailHost, ProbeOutcome};
use async_trait::async_trait;

/// What one candidate probe (retries included) established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    /// Never `TransientFailure`: exhausted retries surface as `Unreachable`.
    pub outcome: ProbeOutcome,
    /// `Some` only when the catch-all check ran and got a definite answer.
    pub catch_all: Option<bool>,
    /// Stage of the last failed session, when one failed.
    pub failed_at: Option<SessionStage>,
}

impl ProbeReport {
    pub fn new(outcome: ProbeOutcome) -> Self {
        Self {
            outcome,
            catch_all: None,
            failed_at: None,
        }
    }

    /// `Unreachable`, having last failed at `stage`.
    pub fn unreachable(stage: SessionStage) -> Self {
        Self {
            failed_at: Some(stage),
            ..Self::new(ProbeOutcome::Unreachable)
        }
    }

    /// Whether the exchange itself is unusable, as opposed to one recipient
    /// being refused temporarily. Only `RCPT`-stage failures are per recipient.
    pub fn is_host_failure(&self) -> bool {
        self.outcome == ProbeOutcome::Unreachable && self.failed_at != Some(SessionStage::Rcpt)
    }
}

/// Probes a single mailbox on a single exchange host.
#[async_trait]
pub trait MailboxProbe: Send + Sync {
    /// `check_catch_all` asks for the random-recipient check when the candidate is accepted.
    async fn probe(
        &self,
        candidate: &EmailCandidate,
        domain: &str,
        host: &MailHost,
        check_catch_all: bool,
    ) -> ProbeReport;
}
