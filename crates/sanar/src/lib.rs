//! Sanar: self-healing locator resolution for browser tests
//!
//! Sanar (Spanish: "to heal") resolves element locators that used to work
//! even after the page markup has shifted: an id renamed, a list reordered,
//! a framework regenerating attribute values. When the primary locator stops
//! matching, the resolver tries locators that worked before, then candidates
//! derived from the last element it resolved, and records what worked so the
//! next run starts from the most reliable alternative.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   resolve    ┌────────────┐  find_elements  ┌──────────────┐
//! │  Test code   │─────────────►│  Resolver  │────────────────►│ PageProvider │
//! └──────────────┘              └────────────┘                 └──────────────┘
//!                                │    │     │
//!                 fallbacks ┌────┘    │     └────┐ ambiguous matches
//!                           ▼         ▼          ▼
//!                 ┌──────────────┐ ┌───────────┐ ┌───────────────┐
//!                 │ LocatorStore │ │ Candidate │ │ MatchVerifier │
//!                 │  (CAS, JSON) │ │ Generator │ │ (similarity)  │
//!                 └──────────────┘ └───────────┘ └───────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sanar::prelude::*;
//!
//! # async fn demo() -> SanarResult<()> {
//! let resolver = Resolver::new(HealingConfig::default(), LocatorStore::open_dir(".sanar")?)?;
//! let page = MockPage::new();
//! let login = LocatorDescriptor::css("#login-btn").with_logical_name("login-submit-button");
//!
//! let resolved = resolver.resolve(&login, &page).await?;
//! if resolved.healed {
//!     println!("healed to {} ({:.2})", resolved.matched_descriptor, resolved.confidence);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod attempt;
mod config;
mod generator;
mod journal;
mod locator;
mod metrics;
mod provider;
mod record;
mod resolver;
mod result;
mod snapshot;
mod store;
mod verifier;

pub use attempt::{confidence_for_rank, AttemptOutcome, CandidateAttempt, CandidateSource};
pub use config::{default_attribute_weights, HealingConfig, POSITION_WEIGHT};
pub use generator::{is_volatile, xpath_literal, Candidate, CandidateGenerator, Candidates, Heuristic};
pub use journal::{HealEvent, HealJournal};
pub use locator::{LocatorDescriptor, Strategy};
pub use metrics::{MetricsSnapshot, ResolutionOutcome, ResolverMetrics};
pub use provider::{MockElement, MockPage, PageProvider};
pub use record::{AttemptStats, AttemptUpdate, FallbackEntry, LocatorRecord};
pub use resolver::{ResolutionResult, Resolver};
pub use result::{SanarError, SanarResult};
pub use snapshot::{normalize_whitespace, AttributeSnapshot};
pub use store::{
    CasOutcome, JsonFileBackend, LocatorStore, MemoryBackend, PersistenceBackend, Versioned,
};
pub use verifier::{Disambiguation, MatchVerifier};

/// Snapshot attribute keys
pub mod keys {
    pub use crate::snapshot::{CLASS, DEPTH, ID, INDEX, NAME, PARENT, TAG, TEXT};
}

/// Cancellation token accepted by [`Resolver::resolve_with_cancel`]
pub use tokio_util::sync::CancellationToken;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::{
        AttributeSnapshot, CancellationToken, HealingConfig, LocatorDescriptor, LocatorStore,
        MockPage, PageProvider, ResolutionResult, Resolver, SanarError, SanarResult, Strategy,
    };
}
