//! Self-healing resolution.
//!
//! ```text
//! primary ──unique──▶ done (healed = false, confidence 1.0)
//!    │
//!    └─0 or many──▶ stored fallbacks ──▶ generated candidates ──▶ NotFound / AmbiguousMatch
//!                       │                      │
//!                       └──── first unique or verified match ──▶ healed
//! ```
//!
//! Every provider query is bounded by the per-query timeout and by what is
//! left of the per-resolution budget, and races the caller's cancellation
//! token. Store writes for a won match always complete before `resolve`
//! returns, so the next resolution sees them.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, info, warn, Instrument};

use crate::attempt::{confidence_for_rank, AttemptOutcome, CandidateAttempt, CandidateSource};
use crate::config::HealingConfig;
use crate::generator::CandidateGenerator;
use crate::journal::{HealEvent, HealJournal};
use crate::locator::LocatorDescriptor;
use crate::metrics::{MetricsSnapshot, ResolutionOutcome, ResolverMetrics};
use crate::provider::PageProvider;
use crate::record::{AttemptUpdate, LocatorRecord};
use crate::result::{SanarError, SanarResult};
use crate::snapshot::AttributeSnapshot;
use crate::store::LocatorStore;
use crate::verifier::{Disambiguation, MatchVerifier};

/// A resolved element
#[derive(Debug, Clone)]
pub struct ResolutionResult<H> {
    /// Descriptor that produced the element (carries the caller's logical name)
    pub matched_descriptor: LocatorDescriptor,
    /// Provider-owned element handle
    pub element: H,
    /// Whether something other than the primary descriptor matched
    pub healed: bool,
    /// `1 / (1 + rank)` of the matching attempt
    pub confidence: f64,
    /// Every attempt made, in order
    pub attempts: Vec<CandidateAttempt>,
}

/// Resolves descriptors against a page, healing them when they stop matching.
///
/// A resolver is `Send + Sync`; share one across workers with `Arc`.
#[derive(Debug)]
pub struct Resolver {
    config: HealingConfig,
    store: LocatorStore,
    generator: CandidateGenerator,
    verifier: MatchVerifier,
    journal: Option<HealJournal>,
    metrics: ResolverMetrics,
    /// Records kept in memory while the store is failing
    shadow: Mutex<HashMap<String, LocatorRecord>>,
}

#[derive(Debug, Clone, Copy)]
enum Interrupt {
    Cancelled,
    BudgetExhausted,
}

enum Bounded<T> {
    Done(T),
    Failed(String),
    TimedOut,
}

enum Trial<H> {
    Won {
        element: H,
        snapshot: AttributeSnapshot,
        outcome: AttemptOutcome,
    },
    Lost(AttemptOutcome),
}

/// State of one resolution in progress
struct Resolution<'a> {
    descriptor: &'a LocatorDescriptor,
    primary: LocatorDescriptor,
    name: Option<&'a str>,
    record: Option<LocatorRecord>,
    reference: AttributeSnapshot,
    deadline: Instant,
    cancel: &'a CancellationToken,
    attempts: Vec<CandidateAttempt>,
    started: usize,
    tried: HashSet<LocatorDescriptor>,
    ambiguous_scores: Option<Vec<f64>>,
}

impl Resolution<'_> {
    fn push(&mut self, descriptor: LocatorDescriptor, source: CandidateSource, outcome: AttemptOutcome) {
        if let AttemptOutcome::Ambiguous { scores } = &outcome {
            self.ambiguous_scores = Some(scores.clone());
        }
        self.attempts.push(CandidateAttempt {
            rank: self.attempts.len(),
            descriptor,
            source,
            outcome,
        });
    }

    fn interrupted(&mut self, interrupt: Interrupt, budget_ms: u64) -> SanarError {
        let descriptor = self.descriptor.clone();
        match interrupt {
            Interrupt::Cancelled => SanarError::Cancelled {
                descriptor,
                attempted: self.started,
            },
            Interrupt::BudgetExhausted => SanarError::Timeout {
                descriptor,
                budget_ms,
                attempted: self.started,
                attempts: std::mem::take(&mut self.attempts),
            },
        }
    }

    /// Whether the page never answered: no attempt got a reply and at least one timed out
    fn page_unresponsive(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| a.outcome == AttemptOutcome::TimedOut)
            && self.attempts.iter().all(|a| {
                matches!(
                    a.outcome,
                    AttemptOutcome::TimedOut | AttemptOutcome::ProviderError { .. }
                )
            })
    }

    fn exhausted(&mut self, budget_ms: u64) -> SanarError {
        let descriptor = self.descriptor.clone();
        if self.page_unresponsive() {
            return SanarError::Timeout {
                descriptor,
                budget_ms,
                attempted: self.started,
                attempts: std::mem::take(&mut self.attempts),
            };
        }
        let attempts = std::mem::take(&mut self.attempts);
        match self.ambiguous_scores.take() {
            Some(scores) => SanarError::AmbiguousMatch {
                descriptor,
                attempts,
                scores,
            },
            None => SanarError::NotFound {
                descriptor,
                attempts,
            },
        }
    }
}

impl Resolver {
    /// Create a resolver; fails when the configuration is invalid
    pub fn new(config: HealingConfig, store: LocatorStore) -> SanarResult<Self> {
        config.validate()?;
        let journal = config.heal_log.as_ref().map(HealJournal::new);
        Ok(Self {
            verifier: MatchVerifier::new(&config),
            generator: CandidateGenerator::new(),
            journal,
            config,
            store,
            metrics: ResolverMetrics::new(),
            shadow: Mutex::new(HashMap::new()),
        })
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &HealingConfig {
        &self.config
    }

    /// Backing store
    #[must_use]
    pub const fn store(&self) -> &LocatorStore {
        &self.store
    }

    /// Counters accumulated so far
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Resolution history for a logical name.
    ///
    /// Falls back to the in-memory copy kept while the store is failing.
    pub async fn history(&self, name: &str) -> SanarResult<Option<LocatorRecord>> {
        match self.store.get(name).await {
            Ok(record) => Ok(record),
            Err(e) => self.shadow.lock().get(name).cloned().map(Some).ok_or(e),
        }
    }

    /// Resolve `descriptor` on `provider`
    pub async fn resolve<P: PageProvider>(
        &self,
        descriptor: &LocatorDescriptor,
        provider: &P,
    ) -> SanarResult<ResolutionResult<P::Handle>> {
        self.resolve_with_cancel(descriptor, provider, &CancellationToken::new())
            .await
    }

    /// Resolve `descriptor` on `provider`, giving up with
    /// [`SanarError::Cancelled`] once `cancel` fires
    pub async fn resolve_with_cancel<P: PageProvider>(
        &self,
        descriptor: &LocatorDescriptor,
        provider: &P,
        cancel: &CancellationToken,
    ) -> SanarResult<ResolutionResult<P::Handle>> {
        let started = Instant::now();
        let span = debug_span!(
            "resolve",
            locator = %descriptor,
            name = descriptor.logical_name().unwrap_or("-")
        );
        let result = self
            .run(descriptor, provider, cancel, started + self.config.resolution_timeout())
            .instrument(span)
            .await;

        let outcome = match &result {
            Ok(r) if r.healed => Some(ResolutionOutcome::Healed),
            Ok(_) => Some(ResolutionOutcome::PrimaryHit),
            Err(SanarError::NotFound { .. }) => Some(ResolutionOutcome::NotFound),
            Err(SanarError::AmbiguousMatch { .. }) => Some(ResolutionOutcome::Ambiguous),
            Err(SanarError::Timeout { .. }) => Some(ResolutionOutcome::TimedOut),
            Err(SanarError::Cancelled { .. }) => Some(ResolutionOutcome::Cancelled),
            Err(_) => None,
        };
        if let Some(outcome) = outcome {
            self.metrics.record_resolution(outcome, started.elapsed());
        }
        result
    }

    async fn run<P: PageProvider>(
        &self,
        descriptor: &LocatorDescriptor,
        provider: &P,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> SanarResult<ResolutionResult<P::Handle>> {
        let primary = descriptor.without_logical_name();
        let name = descriptor.logical_name();
        let record = match name {
            Some(name) => self.load_record(name).await,
            None => None,
        };
        let reference = record
            .as_ref()
            .map(|r| r.last_snapshot.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| AttributeSnapshot::infer_from(&primary));

        let mut tried = HashSet::new();
        tried.insert(primary.clone());
        let mut res = Resolution {
            descriptor,
            primary,
            name,
            record,
            reference,
            deadline,
            cancel,
            attempts: Vec::new(),
            started: 0,
            tried,
            ambiguous_scores: None,
        };

        // Primary
        self.begin_attempt(&mut res)?;
        let primary = res.primary.clone();
        match self.try_descriptor(provider, &primary, &res, false).await {
            Err(interrupt) => return Err(res.interrupted(interrupt, self.config.per_resolution_timeout_ms)),
            Ok(Trial::Won {
                element,
                snapshot,
                outcome,
            }) => {
                res.push(primary.clone(), CandidateSource::Primary, outcome);
                if let Some(name) = name {
                    let update = AttemptUpdate::success(&primary, &primary, snapshot);
                    self.persist(name, res.record.as_ref(), &update).await;
                }
                debug!("Primary locator matched");
                return Ok(ResolutionResult {
                    matched_descriptor: descriptor.clone(),
                    element,
                    healed: false,
                    confidence: 1.0,
                    attempts: res.attempts,
                });
            }
            Ok(Trial::Lost(outcome)) => {
                debug!(?outcome, "Primary locator missed, healing");
                res.push(primary.clone(), CandidateSource::Primary, outcome);
                if let (Some(name), Some(record)) = (name, res.record.as_ref()) {
                    let update = AttemptUpdate::failure(&primary, &primary);
                    self.persist(name, Some(record), &update).await;
                }
            }
        }

        // Stored fallbacks, most reliable first
        let stored: Vec<LocatorDescriptor> = res
            .record
            .as_ref()
            .map(|r| r.fallback_descriptors().cloned().collect())
            .unwrap_or_default();
        for candidate in stored {
            if !res.tried.insert(candidate.clone()) {
                continue;
            }
            if let Some(result) = self
                .attempt_candidate(provider, &mut res, candidate, CandidateSource::Stored)
                .await?
            {
                return Ok(result);
            }
        }

        // Generated candidates
        let reference = res.reference.clone();
        let mut generated = self.generator.generate(&primary, &reference);
        let mut taken = 0;
        while taken < self.config.max_candidates {
            let Some(candidate) = generated.next() else {
                break;
            };
            if !res.tried.insert(candidate.descriptor.clone()) {
                continue;
            }
            taken += 1;
            let source = CandidateSource::Heuristic(candidate.heuristic);
            if let Some(result) = self
                .attempt_candidate(provider, &mut res, candidate.descriptor, source)
                .await?
            {
                return Ok(result);
            }
        }

        let err = res.exhausted(self.config.per_resolution_timeout_ms);
        warn!(error = %err, "Locator could not be healed");
        Err(err)
    }

    async fn attempt_candidate<P: PageProvider>(
        &self,
        provider: &P,
        res: &mut Resolution<'_>,
        candidate: LocatorDescriptor,
        source: CandidateSource,
    ) -> SanarResult<Option<ResolutionResult<P::Handle>>> {
        self.begin_attempt(res)?;
        let rank = res.attempts.len();
        match self.try_descriptor(provider, &candidate, res, true).await {
            Err(interrupt) => Err(res.interrupted(interrupt, self.config.per_resolution_timeout_ms)),
            Ok(Trial::Won {
                element,
                snapshot,
                outcome,
            }) => {
                let score = match outcome {
                    AttemptOutcome::Verified { score } => Some(score),
                    _ => None,
                };
                res.push(candidate.clone(), source, outcome);
                Ok(Some(
                    self.heal(res, candidate, source, rank, element, snapshot, score)
                        .await,
                ))
            }
            Ok(Trial::Lost(outcome)) => {
                debug!(candidate = %candidate, %source, ?outcome, "Candidate rejected");
                res.push(candidate.clone(), source, outcome);
                if source == CandidateSource::Stored {
                    if let Some(name) = res.name {
                        let update = AttemptUpdate::failure(&res.primary, &candidate);
                        self.persist(name, res.record.as_ref(), &update).await;
                    }
                }
                Ok(None)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn heal<H>(
        &self,
        res: &mut Resolution<'_>,
        candidate: LocatorDescriptor,
        source: CandidateSource,
        rank: usize,
        element: H,
        snapshot: AttributeSnapshot,
        score: Option<f64>,
    ) -> ResolutionResult<H> {
        let confidence = confidence_for_rank(rank);
        if let Some(name) = res.name {
            let update = AttemptUpdate::success(&res.primary, &candidate, snapshot);
            self.persist(name, res.record.as_ref(), &update).await;
        }
        if let Some(journal) = &self.journal {
            let event = HealEvent::new(res.descriptor, &candidate, source, rank, confidence)
                .with_score(score);
            if let Err(e) = journal.append(&event).await {
                warn!(error = %e, path = %journal.path().display(), "Heal journal write failed");
                self.metrics.record_persistence_error();
            }
        }
        info!(healed = %candidate, %source, rank, confidence, "Locator healed");

        let matched_descriptor = match res.name {
            Some(name) => candidate.with_logical_name(name),
            None => candidate,
        };
        ResolutionResult {
            matched_descriptor,
            element,
            healed: true,
            confidence,
            attempts: std::mem::take(&mut res.attempts),
        }
    }

    /// Query one descriptor and decide whether it produced a single element.
    ///
    /// With `verify` off, several matches are reported as ambiguous without
    /// asking the verifier to choose.
    async fn try_descriptor<P: PageProvider>(
        &self,
        provider: &P,
        descriptor: &LocatorDescriptor,
        res: &Resolution<'_>,
        verify: bool,
    ) -> Result<Trial<P::Handle>, Interrupt> {
        self.metrics.record_attempt();
        let query = provider.find_elements(descriptor.strategy(), descriptor.value());
        let mut handles = match self.bounded(query, res.deadline, res.cancel).await? {
            Bounded::Done(handles) => handles,
            Bounded::Failed(message) => {
                warn!(locator = %descriptor, %message, "Provider query failed");
                self.metrics.record_provider_error();
                return Ok(Trial::Lost(AttemptOutcome::ProviderError { message }));
            }
            Bounded::TimedOut => return Ok(Trial::Lost(AttemptOutcome::TimedOut)),
        };

        if handles.len() <= 1 {
            let Some(element) = handles.pop() else {
                return Ok(Trial::Lost(AttemptOutcome::NoMatch));
            };
            let snapshot = match self
                .bounded(provider.describe(&element), res.deadline, res.cancel)
                .await?
            {
                Bounded::Done(snapshot) => snapshot,
                Bounded::Failed(message) => {
                    warn!(locator = %descriptor, %message, "Could not describe matched element");
                    AttributeSnapshot::new()
                }
                Bounded::TimedOut => AttributeSnapshot::new(),
            };
            return Ok(Trial::Won {
                element,
                snapshot,
                outcome: AttemptOutcome::Unique,
            });
        }

        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in &handles {
            match self
                .bounded(provider.describe(handle), res.deadline, res.cancel)
                .await?
            {
                Bounded::Done(snapshot) => snapshots.push(snapshot),
                Bounded::Failed(message) => {
                    self.metrics.record_provider_error();
                    return Ok(Trial::Lost(AttemptOutcome::ProviderError { message }));
                }
                Bounded::TimedOut => return Ok(Trial::Lost(AttemptOutcome::TimedOut)),
            }
        }

        let scores = self.verifier.scores(&snapshots, &res.reference);
        if !verify {
            return Ok(Trial::Lost(AttemptOutcome::Ambiguous { scores }));
        }
        match self.verifier.disambiguate(&snapshots, &res.reference) {
            Disambiguation::Unique { index, score } => Ok(Trial::Won {
                element: handles.swap_remove(index),
                snapshot: snapshots.swap_remove(index),
                outcome: AttemptOutcome::Verified { score },
            }),
            Disambiguation::Ambiguous { scores } => {
                Ok(Trial::Lost(AttemptOutcome::Ambiguous { scores }))
            }
            Disambiguation::BelowThreshold { best } => {
                debug!(locator = %descriptor, best, "No match scored above the minimum");
                Ok(Trial::Lost(AttemptOutcome::Ambiguous { scores }))
            }
        }
    }

    /// Count an attempt as started, unless the resolution is already over
    fn begin_attempt(&self, res: &mut Resolution<'_>) -> SanarResult<()> {
        let interrupt = if res.cancel.is_cancelled() {
            Some(Interrupt::Cancelled)
        } else if Instant::now() >= res.deadline {
            Some(Interrupt::BudgetExhausted)
        } else {
            None
        };
        match interrupt {
            Some(interrupt) => Err(res.interrupted(interrupt, self.config.per_resolution_timeout_ms)),
            None => {
                res.started += 1;
                Ok(())
            }
        }
    }

    /// Run one provider call under the per-query timeout, the remaining
    /// budget and the cancellation token.
    async fn bounded<T, F>(
        &self,
        call: F,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> Result<Bounded<T>, Interrupt>
    where
        F: Future<Output = SanarResult<T>>,
    {
        if cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(Interrupt::BudgetExhausted);
        }
        let call_deadline = deadline.min(now + self.config.provider_timeout());

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Interrupt::Cancelled),
            result = tokio::time::timeout_at(call_deadline, call) => match result {
                Ok(Ok(value)) => Ok(Bounded::Done(value)),
                Ok(Err(e)) => Ok(Bounded::Failed(e.to_string())),
                Err(_) if Instant::now() >= deadline => Err(Interrupt::BudgetExhausted),
                Err(_) => Ok(Bounded::TimedOut),
            },
        }
    }

    async fn load_record(&self, name: &str) -> Option<LocatorRecord> {
        match self.store.get(name).await {
            Ok(record) => record,
            Err(e) => {
                warn!(name, error = %e, "Locator store unavailable, using in-memory record");
                self.metrics.record_persistence_error();
                self.shadow.lock().get(name).cloned()
            }
        }
    }

    /// Write an attempt through the store; on failure keep it in memory so
    /// later resolutions still see it.
    async fn persist(&self, name: &str, base: Option<&LocatorRecord>, update: &AttemptUpdate) {
        match self.store.record_attempt(name, update).await {
            Ok(_) => {
                self.shadow.lock().remove(name);
            }
            Err(e) => {
                warn!(name, error = %e, "Locator store update failed, keeping record in memory");
                self.metrics.record_persistence_error();
                let mut shadow = self.shadow.lock();
                if let Some(record) = shadow.get_mut(name) {
                    record.apply(update);
                } else {
                    let record = match base {
                        Some(base) => {
                            let mut record = base.clone();
                            record.apply(update);
                            Some(record)
                        }
                        None => LocatorRecord::from_first_success(name, update),
                    };
                    if let Some(record) = record {
                        shadow.insert(name.to_string(), record);
                    }
                }
            }
        }
    }
}
