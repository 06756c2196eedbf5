//! Page provider abstraction.
//!
//! The resolver never talks to a browser directly. It asks a
//! [`PageProvider`] for the live elements matching a strategy and value, and
//! for the attributes of an element it picked. Element handles are opaque to
//! the resolver and owned by the provider.
//!
//! # Implementations
//!
//! - [`MockPage`]: scripted in-memory page for tests and demos
//! - adapters over WebDriver or CDP sessions live with the test harness

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::locator::{LocatorDescriptor, Strategy};
use crate::result::{SanarError, SanarResult};
use crate::snapshot::{
    css_split_last_combinator, normalize_whitespace, AttributeSnapshot, CLASS, TEXT,
};

/// "Find elements in the current page" capability
#[async_trait]
pub trait PageProvider: Send + Sync {
    /// Opaque element handle
    type Handle: Clone + Send + Sync + fmt::Debug;

    /// All live elements matching `value` under `strategy`, in document order
    async fn find_elements(&self, strategy: Strategy, value: &str) -> SanarResult<Vec<Self::Handle>>;

    /// Attributes of a live element
    async fn describe(&self, handle: &Self::Handle) -> SanarResult<AttributeSnapshot>;
}

/// Handle to an element of a [`MockPage`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MockElement {
    /// Element key in the page table
    pub id: String,
}

#[derive(Debug, Default)]
struct PageState {
    elements: Vec<(String, AttributeSnapshot)>,
    routes: HashMap<LocatorDescriptor, Vec<String>>,
    failures: HashMap<LocatorDescriptor, String>,
    delays: HashMap<LocatorDescriptor, Duration>,
    delay: Option<Duration>,
    queries: Vec<LocatorDescriptor>,
}

/// Scripted in-memory page.
///
/// Elements are stored in document order. A query is answered from an
/// explicit route when one is registered for its descriptor. Otherwise
/// simple selectors are matched against element attributes: `id`, `text`
/// and `attribute` strategies, single compound CSS selectors without
/// pseudo-classes, and single-step `//tag[...]` XPath with attribute or text
/// predicates. Anything else matches nothing unless routed.
///
/// The page can be edited between resolutions to model markup changes.
#[derive(Debug, Default)]
pub struct MockPage {
    state: RwLock<PageState>,
}

impl MockPage {
    /// Create an empty page
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element (builder style)
    #[must_use]
    pub fn with_element(self, id: &str, snapshot: AttributeSnapshot) -> Self {
        self.add_element(id, snapshot);
        self
    }

    /// Route a descriptor to fixed elements (builder style)
    #[must_use]
    pub fn with_route(self, descriptor: &LocatorDescriptor, ids: &[&str]) -> Self {
        self.route(descriptor, ids);
        self
    }

    /// Delay every query (builder style)
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.write().delay = Some(delay);
        self
    }

    /// Add or replace an element
    pub fn add_element(&self, id: &str, snapshot: AttributeSnapshot) {
        let mut state = self.state.write();
        if let Some(slot) = state.elements.iter_mut().find(|(k, _)| k == id) {
            slot.1 = snapshot;
        } else {
            state.elements.push((id.to_string(), snapshot));
        }
    }

    /// Remove an element; routes pointing at it stop matching it
    pub fn remove_element(&self, id: &str) {
        self.state.write().elements.retain(|(k, _)| k != id);
    }

    /// Route a descriptor to fixed elements, overriding attribute matching
    pub fn route(&self, descriptor: &LocatorDescriptor, ids: &[&str]) {
        self.state.write().routes.insert(
            descriptor.without_logical_name(),
            ids.iter().map(ToString::to_string).collect(),
        );
    }

    /// Drop an explicit route
    pub fn unroute(&self, descriptor: &LocatorDescriptor) {
        self.state.write().routes.remove(descriptor);
    }

    /// Make queries for a descriptor fail
    pub fn fail_query(&self, descriptor: &LocatorDescriptor, message: &str) {
        self.state
            .write()
            .failures
            .insert(descriptor.without_logical_name(), message.to_string());
    }

    /// Delay queries for one descriptor
    pub fn delay_query(&self, descriptor: &LocatorDescriptor, delay: Duration) {
        self.state
            .write()
            .delays
            .insert(descriptor.without_logical_name(), delay);
    }

    /// Every query made so far, in order
    #[must_use]
    pub fn queries(&self) -> Vec<LocatorDescriptor> {
        self.state.read().queries.clone()
    }

    /// Number of queries made so far
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.state.read().queries.len()
    }

    /// Whether a descriptor was queried
    #[must_use]
    pub fn was_queried(&self, descriptor: &LocatorDescriptor) -> bool {
        self.state.read().queries.contains(descriptor)
    }

    fn lookup(state: &PageState, descriptor: &LocatorDescriptor) -> Vec<MockElement> {
        let present = |id: &str| state.elements.iter().any(|(k, _)| k == id);
        if let Some(ids) = state.routes.get(descriptor) {
            return ids
                .iter()
                .filter(|id| present(id.as_str()))
                .map(|id| MockElement { id: id.clone() })
                .collect();
        }

        let Some(query) = attribute_query(descriptor) else {
            return Vec::new();
        };
        state
            .elements
            .iter()
            .filter(|(_, element)| element_matches(element, &query))
            .map(|(id, _)| MockElement { id: id.clone() })
            .collect()
    }
}

#[async_trait]
impl PageProvider for MockPage {
    type Handle = MockElement;

    async fn find_elements(&self, strategy: Strategy, value: &str) -> SanarResult<Vec<MockElement>> {
        let descriptor = LocatorDescriptor::new(strategy, value);
        let delay = {
            let mut state = self.state.write();
            state.queries.push(descriptor.clone());
            state.delays.get(&descriptor).copied().or(state.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.read();
        if let Some(message) = state.failures.get(&descriptor) {
            return Err(SanarError::provider(message.clone()));
        }
        Ok(Self::lookup(&state, &descriptor))
    }

    async fn describe(&self, handle: &MockElement) -> SanarResult<AttributeSnapshot> {
        self.state
            .read()
            .elements
            .iter()
            .find(|(k, _)| *k == handle.id)
            .map(|(_, snapshot)| snapshot.clone())
            .ok_or_else(|| SanarError::provider(format!("stale element '{}'", handle.id)))
    }
}

/// Attributes a simple descriptor requires, or `None` when the descriptor is
/// too complex to evaluate against the element table.
fn attribute_query(descriptor: &LocatorDescriptor) -> Option<AttributeSnapshot> {
    let value = descriptor.value();
    let simple = match descriptor.strategy() {
        Strategy::Id | Strategy::Text | Strategy::Attribute => true,
        Strategy::Css => {
            !value.contains([':', ','].as_slice()) && css_split_last_combinator(value).is_none()
        }
        Strategy::XPath => {
            value.starts_with("//")
                && !value[2..].contains('/')
                && !value.contains("concat(")
                && value.contains('[')
        }
    };
    if !simple {
        return None;
    }
    let query = AttributeSnapshot::infer_from(descriptor);
    (!query.is_empty()).then_some(query)
}

fn element_matches(element: &AttributeSnapshot, query: &AttributeSnapshot) -> bool {
    query.iter().all(|(key, wanted)| match key {
        CLASS => {
            let have: Vec<&str> = element.classes().collect();
            wanted.split_whitespace().all(|c| have.contains(&c))
        }
        TEXT => element.text().as_deref() == Some(normalize_whitespace(wanted).as_str()),
        _ => element.get(key) == Some(wanted),
    })
}
