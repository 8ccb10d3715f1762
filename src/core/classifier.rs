//! Turns probe evidence for one row into its final email and status.

use crate::core::models::{
    CandidateProbe, EmailCandidate, EmailStatus, EnrichmentResult, MailExchangeSet, ProbeOutcome,
};

/// What the verification stage did for a row.
#[derive(Debug, Clone, Copy)]
pub enum Verification<'a> {
    /// SMTP probing is switched off; nothing was looked up.
    Disabled,
    Attempted {
        exchanges: &'a MailExchangeSet,
        probes: &'a [CandidateProbe],
        /// The catch-all check fired for this row.
        catch_all: bool,
    },
}

/// Applies the classification rules in order:
///
/// 1. catch-all → `CATCH_ALL` with the highest-priority candidate
/// 2. any accepted → `DELIVERABLE` with the first accepted candidate by rank
/// 3. no exchanges, or every probe unreachable → `MX_UNVERIFIABLE` with the best guess
/// 4. probing disabled → `HEURISTIC` with the best guess
/// 5. otherwise `UNDELIVERABLE` with an empty email
pub fn classify(candidates: &[EmailCandidate], verification: Verification<'_>) -> EnrichmentResult {
    let best_guess = candidates
        .iter()
        .min_by_key(|c| c.rank)
        .map(|c| c.address.clone())
        .unwrap_or_default();

    let (exchanges, probes, catch_all) = match verification {
        Verification::Disabled => return EnrichmentResult::new(best_guess, EmailStatus::Heuristic),
        Verification::Attempted {
            exchanges,
            probes,
            catch_all,
        } => (exchanges, probes, catch_all),
    };

    if catch_all || probes.iter().any(|p| p.outcome == ProbeOutcome::CatchAll) {
        return EnrichmentResult::new(best_guess, EmailStatus::CatchAll);
    }

    if let Some(accepted) = probes
        .iter()
        .filter(|p| p.outcome == ProbeOutcome::Accepted)
        .min_by_key(|p| p.candidate.rank)
    {
        return EnrichmentResult::new(accepted.candidate.address.clone(), EmailStatus::Deliverable);
    }

    let all_unreachable =
        !probes.is_empty() && probes.iter().all(|p| p.outcome == ProbeOutcome::Unreachable);
    if exchanges.is_empty() || all_unreachable {
        return EnrichmentResult::new(best_guess, EmailStatus::MxUnverifiable);
    }

    EnrichmentResult::new(String::new(), EmailStatus::Undeliverable)
}
