//! Per-row state machine and the sequential run loop that drives it.

use crate::core::classifier::{classify, Verification};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::models::{
    CandidateProbe, EmailCandidate, EmailStatus, EnrichmentResult, LeadRecord, MailExchangeSet,
    ProbeOutcome,
};
use crate::store::LeadStore;
use crate::utils::dns::MxLookup;
use crate::utils::domain::resolve_domain;
use crate::utils::patterns::generate_email_patterns;
use crate::utils::smtp::MailboxProbe;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a row was left without a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoDomain,
    NoCandidates,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoDomain => f.write_str("no usable company domain"),
            SkipReason::NoCandidates => f.write_str("no candidate addresses"),
        }
    }
}

/// Where a row is in its resolution. Each variant owns what later states need.
#[derive(Debug, Clone, PartialEq)]
pub enum RowState {
    Pending,
    DomainResolved {
        domain: String,
    },
    CandidatesGenerated {
        domain: String,
        candidates: Vec<EmailCandidate>,
    },
    MxResolved {
        domain: String,
        candidates: Vec<EmailCandidate>,
        exchanges: MailExchangeSet,
    },
    MxFailed {
        candidates: Vec<EmailCandidate>,
    },
    VerificationDisabled {
        candidates: Vec<EmailCandidate>,
    },
    Probed {
        candidates: Vec<EmailCandidate>,
        exchanges: MailExchangeSet,
        probes: Vec<CandidateProbe>,
        catch_all: bool,
    },
    Classified(EnrichmentResult),
    Skipped(SkipReason),
    Cancelled,
}

impl RowState {
    /// States the engine stops stepping at. `Written` is the store's business.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RowState::Classified(_) | RowState::Skipped(_) | RowState::Cancelled
        )
    }

    fn name(&self) -> &'static str {
        match self {
            RowState::Pending => "Pending",
            RowState::DomainResolved { .. } => "DomainResolved",
            RowState::CandidatesGenerated { .. } => "CandidatesGenerated",
            RowState::MxResolved { .. } => "MxResolved",
            RowState::MxFailed { .. } => "MxFailed",
            RowState::VerificationDisabled { .. } => "VerificationDisabled",
            RowState::Probed { .. } => "Probed",
            RowState::Classified(_) => "Classified",
            RowState::Skipped(_) => "Skipped",
            RowState::Cancelled => "Cancelled",
        }
    }
}

/// How a row ended after the write step.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Written(EnrichmentResult),
    Skipped(SkipReason),
    Cancelled,
    Failed(String),
}

/// Counts for one run over a store.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub by_status: HashMap<EmailStatus, usize>,
}

impl RunSummary {
    pub fn count(&self, status: EmailStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    fn record(&mut self, outcome: &RowOutcome) {
        match outcome {
            RowOutcome::Written(result) => {
                self.written += 1;
                *self.by_status.entry(result.status).or_insert(0) += 1;
            }
            RowOutcome::Skipped(_) => self.skipped += 1,
            RowOutcome::Failed(_) => self.failed += 1,
            RowOutcome::Cancelled => self.cancelled = true,
        }
    }
}

/// Resolves leads to an email and status, one row at a time.
pub struct Enricher<M, P> {
    config: Arc<Config>,
    mx: M,
    prober: P,
    cancel: CancellationToken,
}

impl<M: MxLookup, P: MailboxProbe> Enricher<M, P> {
    pub fn new(config: Arc<Config>, mx: M, prober: P, cancel: CancellationToken) -> Self {
        Self {
            config,
            mx,
            prober,
            cancel,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Steps a row from `Pending` to a terminal state. Does not write.
    pub async fn resolve_lead(&self, lead: &LeadRecord) -> RowState {
        let mut state = RowState::Pending;
        while !state.is_terminal() {
            let from = state.name();
            state = self.step(lead, state).await;
            tracing::trace!(target: "enrich_task", "[{}] {} -> {}", lead.row, from, state.name());
        }
        state
    }

    /// One transition.
    async fn step(&self, lead: &LeadRecord, state: RowState) -> RowState {
        if self.cancel.is_cancelled() {
            return RowState::Cancelled;
        }

        match state {
            RowState::Pending => {
                match resolve_domain(&lead.website_candidates, &self.config.blocked_domains) {
                    Some(domain) => RowState::DomainResolved { domain },
                    None => RowState::Skipped(SkipReason::NoDomain),
                }
            }

            RowState::DomainResolved { domain } => {
                let candidates = generate_email_patterns(
                    &self.config,
                    &lead.first_name,
                    &lead.last_name,
                    &domain,
                );
                if candidates.is_empty() {
                    RowState::Skipped(SkipReason::NoCandidates)
                } else {
                    RowState::CandidatesGenerated { domain, candidates }
                }
            }

            RowState::CandidatesGenerated { domain, candidates } => {
                if !self.config.smtp_enabled {
                    return RowState::VerificationDisabled { candidates };
                }
                let exchanges = self.mx.lookup_mx(&domain).await;
                if exchanges.is_empty() {
                    RowState::MxFailed { candidates }
                } else {
                    RowState::MxResolved {
                        domain,
                        candidates,
                        exchanges,
                    }
                }
            }

            RowState::MxResolved {
                domain,
                candidates,
                exchanges,
            } => self.probe_candidates(lead, &domain, candidates, exchanges).await,

            RowState::MxFailed { candidates } => {
                let empty = MailExchangeSet::empty();
                RowState::Classified(classify(
                    &candidates,
                    Verification::Attempted {
                        exchanges: &empty,
                        probes: &[],
                        catch_all: false,
                    },
                ))
            }

            RowState::VerificationDisabled { candidates } => {
                RowState::Classified(classify(&candidates, Verification::Disabled))
            }

            RowState::Probed {
                candidates,
                exchanges,
                probes,
                catch_all,
            } => RowState::Classified(classify(
                &candidates,
                Verification::Attempted {
                    exchanges: &exchanges,
                    probes: &probes,
                    catch_all,
                },
            )),

            terminal => terminal,
        }
    }

    /// Probes candidates in rank order, failing over between exchanges.
    ///
    /// Stops at the first accepted candidate, at a catch-all verdict, once every
    /// allowed exchange is unreachable, or when candidates run out. A recipient
    /// that stays temporarily refused is recorded and the next candidate tried on
    /// the same exchange.
    async fn probe_candidates(
        &self,
        lead: &LeadRecord,
        domain: &str,
        candidates: Vec<EmailCandidate>,
        exchanges: MailExchangeSet,
    ) -> RowState {
        let hosts: Vec<_> = exchanges
            .hosts()
            .iter()
            .take(self.config.max_mx_hosts.max(1))
            .collect();
        let mut host_index = 0;
        let mut probes: Vec<CandidateProbe> = Vec::new();
        let mut catch_all: Option<bool> = None;

        'candidates: for candidate in &candidates {
            loop {
                if self.cancel.is_cancelled() {
                    return RowState::Cancelled;
                }
                let host = hosts[host_index];
                let report = self
                    .prober
                    .probe(candidate, domain, host, catch_all.is_none())
                    .await;
                if self.cancel.is_cancelled() {
                    return RowState::Cancelled;
                }
                if report.catch_all.is_some() {
                    catch_all = report.catch_all;
                }

                let host_down = report.is_host_failure();
                if host_down && host_index + 1 < hosts.len() {
                    host_index += 1;
                    tracing::info!(target: "enrich_task",
                        "[{}] {} unreachable; failing over to {}",
                        lead.row, host.host, hosts[host_index].host
                    );
                    continue;
                }

                tracing::debug!(target: "enrich_task",
                    "[{}] <{}> on {}: {}", lead.row, candidate.address, host.host, report.outcome);
                probes.push(CandidateProbe {
                    candidate: candidate.clone(),
                    outcome: report.outcome,
                    host: host.host.clone(),
                });

                match report.outcome {
                    ProbeOutcome::Accepted | ProbeOutcome::CatchAll => break 'candidates,
                    ProbeOutcome::Unreachable if host_down => {
                        tracing::warn!(target: "enrich_task",
                            "[{}] All {} exchange(s) for {} unreachable; stopping probes.",
                            lead.row, hosts.len(), domain
                        );
                        break 'candidates;
                    }
                    ProbeOutcome::Unreachable
                    | ProbeOutcome::Rejected
                    | ProbeOutcome::TransientFailure => break,
                }
            }
        }

        RowState::Probed {
            candidates,
            exchanges,
            probes,
            catch_all: catch_all == Some(true),
        }
    }

    /// Resolves one lead and writes its result. Store errors become `Failed`.
    pub async fn process_row<S: LeadStore + ?Sized>(
        &self,
        store: &mut S,
        lead: &LeadRecord,
    ) -> RowOutcome {
        let started = Instant::now();
        tracing::info!(target: "enrich_task", "[{}] Processing {}", lead.row, lead.display_name());

        match self.resolve_lead(lead).await {
            RowState::Classified(result) => match store.write_result(lead.row, &result) {
                Ok(()) => {
                    tracing::info!(target: "enrich_task",
                        "[{}] Written: {} '{}' in {:.2?}",
                        lead.row, result.status, result.email, started.elapsed()
                    );
                    RowOutcome::Written(result)
                }
                Err(e) => {
                    tracing::error!(target: "enrich_task", "[{}] Write failed: {}", lead.row, e);
                    RowOutcome::Failed(e.to_string())
                }
            },
            RowState::Skipped(reason) => {
                tracing::info!(target: "enrich_task", "[{}] Skipped: {}", lead.row, reason);
                RowOutcome::Skipped(reason)
            }
            RowState::Cancelled => {
                tracing::warn!(target: "enrich_task", "[{}] Cancelled before write.", lead.row);
                RowOutcome::Cancelled
            }
            other => RowOutcome::Failed(format!("row stopped in state {}", other.name())),
        }
    }

    /// Processes every ready row of `store` strictly in order.
    ///
    /// Returns early, without touching the remaining rows, when the cancellation
    /// token fires.
    ///
    /// # Arguments
    /// * `store` - Source of ready rows and target of the write-back.
    /// * `on_row` - Called with each row and its outcome, e.g. for progress display.
    ///
    /// # Returns
    /// * `Result<RunSummary>` - Fails only when the ready rows cannot be read.
    pub async fn run<S, F>(&self, store: &mut S, mut on_row: F) -> Result<RunSummary>
    where
        S: LeadStore + ?Sized,
        F: FnMut(&LeadRecord, &RowOutcome),
    {
        let leads = store.ready_leads()?;
        tracing::info!(target: "enrich_task", "{} ready row(s) to process.", leads.len());

        let mut summary = RunSummary {
            total: leads.len(),
            ..RunSummary::default()
        };

        for lead in &leads {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            let outcome = self.process_row(store, lead).await;
            summary.record(&outcome);
            on_row(lead, &outcome);
            if outcome == RowOutcome::Cancelled {
                break;
            }
        }

        tracing::info!(target: "enrich_task",
            "Run finished: {} written, {} skipped, {} failed{}",
            summary.written,
            summary.skipped,
            summary.failed,
            if summary.cancelled { " (cancelled)" } else { "" }
        );
        Ok(summary)
    }
}
