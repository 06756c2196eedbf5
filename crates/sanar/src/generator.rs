//! Candidate generation: alternative descriptors for a failed locator.
//!
//! Generation is pure and deterministic. Given the same descriptor and
//! snapshot it yields the same candidates in the same order, and it never
//! touches the page. Heuristics run lazily in fixed priority order, so a
//! caller that stops early never pays for later heuristics:
//!
//! 1. [`Heuristic::StableAttributes`]
//! 2. [`Heuristic::VisibleText`]
//! 3. [`Heuristic::SiblingPosition`]
//! 4. [`Heuristic::RelaxedAttribute`]
//!
//! A heuristic whose inputs are missing from the snapshot is skipped.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::OnceLock;

use crate::locator::{LocatorDescriptor, Strategy};
use crate::snapshot::{css_split_last_combinator, regex, AttributeSnapshot, CLASS, ID, NAME};

/// Rule that produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    /// Tag plus every stable identifying attribute
    StableAttributes,
    /// Tag plus exact visible text
    VisibleText,
    /// Tag plus position within the parent scope
    SiblingPosition,
    /// Tag plus any single recorded attribute
    RelaxedAttribute,
}

impl Heuristic {
    /// All heuristics in priority order
    pub const ALL: [Self; 4] = [
        Self::StableAttributes,
        Self::VisibleText,
        Self::SiblingPosition,
        Self::RelaxedAttribute,
    ];

    /// Snake-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StableAttributes => "stable_attributes",
            Self::VisibleText => "visible_text",
            Self::SiblingPosition => "sibling_position",
            Self::RelaxedAttribute => "relaxed_attribute",
        }
    }
}

impl fmt::Display for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alternative descriptor and the heuristic that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The alternative descriptor
    pub descriptor: LocatorDescriptor,
    /// Producing heuristic
    pub heuristic: Heuristic,
}

/// Produces alternative descriptors from a descriptor and a snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateGenerator;

impl CandidateGenerator {
    /// Create a new generator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Lazily generate candidates for `descriptor`.
    ///
    /// The sequence is finite, contains no duplicates and never contains
    /// `descriptor` itself.
    #[must_use]
    pub fn generate<'a>(
        &self,
        descriptor: &'a LocatorDescriptor,
        snapshot: &'a AttributeSnapshot,
    ) -> Candidates<'a> {
        let mut seen = HashSet::new();
        seen.insert(descriptor.without_logical_name());
        Candidates {
            descriptor,
            snapshot,
            stages: Heuristic::ALL.into_iter(),
            pending: VecDeque::new(),
            seen,
        }
    }
}

/// Iterator returned by [`CandidateGenerator::generate`]
#[derive(Debug)]
pub struct Candidates<'a> {
    descriptor: &'a LocatorDescriptor,
    snapshot: &'a AttributeSnapshot,
    stages: std::array::IntoIter<Heuristic, 4>,
    pending: VecDeque<Candidate>,
    seen: HashSet<LocatorDescriptor>,
}

impl Iterator for Candidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            while let Some(candidate) = self.pending.pop_front() {
                if self.seen.insert(candidate.descriptor.clone()) {
                    return Some(candidate);
                }
            }
            let heuristic = self.stages.next()?;
            let descriptors = match heuristic {
                Heuristic::StableAttributes => stable_attributes(self.snapshot),
                Heuristic::VisibleText => visible_text(self.snapshot),
                Heuristic::SiblingPosition => sibling_position(self.descriptor, self.snapshot),
                Heuristic::RelaxedAttribute => relaxed_attributes(self.snapshot),
            };
            self.pending.extend(
                descriptors
                    .into_iter()
                    .map(|descriptor| Candidate { descriptor, heuristic }),
            );
        }
    }
}

fn stable_attributes(snapshot: &AttributeSnapshot) -> Vec<LocatorDescriptor> {
    let tag = snapshot.tag().unwrap_or_default();
    let mut selector = tag.to_string();
    let mut parts = 0;

    if let Some(id) = snapshot.id().filter(|id| !is_volatile(id)) {
        selector.push_str(&css_id(id));
        parts += 1;
    }
    let keyed = snapshot
        .markup_attributes()
        .filter(|(k, _)| *k == NAME || k.starts_with("data-"));
    for (key, value) in keyed {
        if is_css_ident(key) && !is_volatile(value) {
            selector.push_str(&css_attr(key, value));
            parts += 1;
        }
    }

    if parts == 0 {
        Vec::new()
    } else {
        vec![LocatorDescriptor::css(selector)]
    }
}

fn visible_text(snapshot: &AttributeSnapshot) -> Vec<LocatorDescriptor> {
    snapshot
        .text()
        .map(|text| {
            let tag = snapshot.tag().unwrap_or("*");
            LocatorDescriptor::xpath(format!(
                "//{tag}[normalize-space(.)={}]",
                xpath_literal(&text)
            ))
        })
        .into_iter()
        .collect()
}

fn sibling_position(
    descriptor: &LocatorDescriptor,
    snapshot: &AttributeSnapshot,
) -> Vec<LocatorDescriptor> {
    let (Some(tag), Some(index)) = (snapshot.tag(), snapshot.index()) else {
        return Vec::new();
    };

    let scoped = match descriptor.strategy() {
        Strategy::Css => {
            let first = descriptor.value().split(',').next().unwrap_or_default().trim();
            css_split_last_combinator(first)
                .map(|(scope, _)| LocatorDescriptor::css(format!("{scope} > {tag}:nth-of-type({index})")))
        }
        Strategy::XPath => xpath_scope(descriptor.value())
            .map(|scope| LocatorDescriptor::xpath(format!("{scope}{tag}[{index}]"))),
        _ => None,
    };

    scoped
        .or_else(|| {
            snapshot
                .parent()
                .map(|parent| LocatorDescriptor::css(format!("{parent} > {tag}:nth-of-type({index})")))
        })
        .into_iter()
        .collect()
}

fn relaxed_attributes(snapshot: &AttributeSnapshot) -> Vec<LocatorDescriptor> {
    let tag = snapshot.tag().unwrap_or_default();
    let mut out = Vec::new();

    if let Some(id) = snapshot.id() {
        out.push(LocatorDescriptor::css(format!("{tag}{}", css_id(id))));
    }
    if let Some(name) = snapshot.get(NAME) {
        out.push(LocatorDescriptor::css(format!("{tag}{}", css_attr(NAME, name))));
    }
    for class in snapshot.classes().filter(|c| is_css_ident(c)) {
        out.push(LocatorDescriptor::css(format!("{tag}.{class}")));
    }
    for (key, value) in snapshot.markup_attributes() {
        if matches!(key, ID | NAME | CLASS) || !is_css_ident(key) {
            continue;
        }
        out.push(LocatorDescriptor::css(format!("{tag}{}", css_attr(key, value))));
    }
    out
}

/// XPath prefix up to and including the slash before the last step, when the
/// prefix names at least one step of its own.
fn xpath_scope(expression: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut last_slash = None;

    for (i, c) in expression.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, '/') if depth == 0 => last_slash = Some(i),
            _ => {}
        }
    }

    let scope = &expression[..=last_slash?];
    if scope.trim_matches('/').is_empty() {
        None
    } else {
        Some(scope)
    }
}

/// Whether an attribute value looks generated rather than authored.
#[must_use]
pub fn is_volatile(value: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let generated = regex(
        &RE,
        concat!(
            // trailing counters: item-48213, row_0042
            r"\d{3,}$",
            // uuids anywhere
            r"|(?i:[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})",
            // framework-generated ids
            r"|^(?:ember\d+|react-|mui-\d+|radix-|headlessui-)",
            r"|:r[0-9a-z]+:",
            // css-in-js class hashes: css-1x2y3z, sc-bdVaJa
            r"|^(?:css|sc|jsx)-[0-9A-Za-z]{4,}$",
        ),
    );

    if generated.is_match(value) {
        return true;
    }
    value
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| {
            token.len() >= 8
                && token.chars().all(|c| c.is_ascii_hexdigit())
                && token.chars().any(|c| c.is_ascii_digit())
                && token.chars().any(|c| c.is_ascii_alphabetic())
        })
}

fn is_css_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '-')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !s.starts_with("--")
        && !(s.starts_with('-') && s[1..].starts_with(|c: char| c.is_ascii_digit()))
}

fn css_id(id: &str) -> String {
    if is_css_ident(id) {
        format!("#{id}")
    } else {
        css_attr(ID, id)
    }
}

fn css_attr(key: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{key}=\"{escaped}\"]")
}

/// Quote `text` as an XPath string literal, using `concat()` when it holds
/// both quote kinds.
#[must_use]
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    let parts: Vec<String> = text
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}
