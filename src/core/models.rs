//! Data types shared by the resolution pipeline and the row stores.

use crate::utils::patterns::LocalPartPattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Opaque handle a [`crate::store::LeadStore`] uses to find a row again on write-back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(pub usize);

impl RowId {
    /// Spreadsheet-style row number (1-based, header occupies row 1).
    pub fn sheet_row(&self) -> usize {
        self.0 + 2
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}", self.sheet_row())
    }
}

/// One input lead as read from the store. The engine only ever borrows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub row: RowId,
    pub first_name: String,
    pub last_name: String,
    /// Raw website-like values, in header alias order.
    pub website_candidates: Vec<String>,
}

impl LeadRecord {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// A generated address and the priority it is tried at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailCandidate {
    pub address: String,
    /// Lower rank is tried first; ranks are dense and start at 0.
    pub rank: usize,
    pub pattern: LocalPartPattern,
}

/// A mail exchange host and its DNS preference value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailHost {
    pub host: String,
    pub priority: u16,
}

/// Exchanges for a domain ordered by ascending preference. Empty when resolution failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailExchangeSet {
    hosts: Vec<MailHost>,
}

impl MailExchangeSet {
    pub fn new(mut hosts: Vec<MailHost>) -> Self {
        hosts.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.host.cmp(&b.host)));
        // a host listed twice keeps its most preferred entry
        let mut seen = HashSet::new();
        hosts.retain(|h| seen.insert(h.host.clone()));
        Self { hosts }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn hosts(&self) -> &[MailHost] {
        &self.hosts
    }

    pub fn preferred(&self) -> Option<&MailHost> {
        self.hosts.first()
    }
}

/// Result of probing one candidate against a mail host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeOutcome {
    Accepted,
    Rejected,
    CatchAll,
    TransientFailure,
    Unreachable,
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            ProbeOutcome::Accepted => "ACCEPTED",
            ProbeOutcome::Rejected => "REJECTED",
            ProbeOutcome::CatchAll => "CATCH_ALL",
            ProbeOutcome::TransientFailure => "TRANSIENT_FAILURE",
            ProbeOutcome::Unreachable => "UNREACHABLE",
        };
        f.write_str(token)
    }
}

/// A probe outcome tagged with the candidate it was evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProbe {
    pub candidate: EmailCandidate,
    pub outcome: ProbeOutcome,
    /// Exchange host that produced the outcome.
    pub host: String,
}

/// Final categorical status written back for a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmailStatus {
    Deliverable,
    CatchAll,
    MxUnverifiable,
    Undeliverable,
    Heuristic,
}

impl EmailStatus {
    pub const ALL: [EmailStatus; 5] = [
        EmailStatus::Deliverable,
        EmailStatus::CatchAll,
        EmailStatus::MxUnverifiable,
        EmailStatus::Undeliverable,
        EmailStatus::Heuristic,
    ];

    /// Upper-case token stored in the sheet.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Deliverable => "DELIVERABLE",
            EmailStatus::CatchAll => "CATCH_ALL",
            EmailStatus::MxUnverifiable => "MX_UNVERIFIABLE",
            EmailStatus::Undeliverable => "UNDELIVERABLE",
            EmailStatus::Heuristic => "HEURISTIC",
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two fields written back for a processed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub email: String,
    pub status: EmailStatus,
}

impl EnrichmentResult {
    pub fn new(email: impl Into<String>, status: EmailStatus) -> Self {
        Self {
            email: email.into(),
            status,
        }
    }
}
