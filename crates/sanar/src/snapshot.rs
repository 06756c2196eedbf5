//! Attribute snapshots of resolved elements.
//!
//! A snapshot is captured from an element at the moment it was successfully
//! resolved, and is later used both to generate alternative locators and to
//! score candidate elements when several match.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::locator::{LocatorDescriptor, Strategy};

/// Tag name key
pub const TAG: &str = "tag";
/// Element id key
pub const ID: &str = "id";
/// Class list key (space separated)
pub const CLASS: &str = "class";
/// Visible text key
pub const TEXT: &str = "text";
/// `name` attribute key
pub const NAME: &str = "name";
/// DOM depth key (root element is 0)
pub const DEPTH: &str = "depth";
/// 1-based position among same-tag siblings
pub const INDEX: &str = "index";
/// Parent tag name key
pub const PARENT: &str = "parent";

const STRUCTURAL_KEYS: [&str; 5] = [TAG, TEXT, DEPTH, INDEX, PARENT];

/// Attribute name → value captured from a resolved element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSnapshot {
    attributes: BTreeMap<String, String>,
}

impl AttributeSnapshot {
    /// Create an empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute (builder style)
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set the tag name (lowercased)
    #[must_use]
    pub fn with_tag(self, tag: &str) -> Self {
        self.with(TAG, tag.to_ascii_lowercase())
    }

    /// Set the visible text
    #[must_use]
    pub fn with_text(self, text: &str) -> Self {
        self.with(TEXT, text)
    }

    /// Set the structural position
    #[must_use]
    pub fn with_position(self, depth: u32, index: u32) -> Self {
        self.with(DEPTH, depth.to_string())
            .with(INDEX, index.to_string())
    }

    /// Insert an attribute, ignoring empty values
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.attributes.insert(key.into(), value);
        }
    }

    /// Get an attribute value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Whether the attribute is present
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Tag name
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        self.get(TAG)
    }

    /// Visible text, whitespace-normalized
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.get(TEXT)
            .map(normalize_whitespace)
            .filter(|t| !t.is_empty())
    }

    /// Element id
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.get(ID)
    }

    /// Class tokens in recorded order
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.get(CLASS).unwrap_or_default().split_whitespace()
    }

    /// DOM depth
    #[must_use]
    pub fn depth(&self) -> Option<u32> {
        self.get(DEPTH).and_then(|d| d.parse().ok())
    }

    /// Position among same-tag siblings (1-based)
    #[must_use]
    pub fn index(&self) -> Option<u32> {
        self.get(INDEX)
            .and_then(|i| i.parse().ok())
            .filter(|i| *i > 0)
    }

    /// Parent tag name
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.get(PARENT)
    }

    /// Markup attributes only (no tag, text, or structural keys), sorted by name
    pub fn markup_attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .filter(|(k, _)| !STRUCTURAL_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All entries, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of recorded attributes
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Best-effort snapshot read from a descriptor's own selector text.
    ///
    /// Used when no earlier successful resolution was recorded. Only the last
    /// compound selector (CSS) or step (XPath) is inspected, since that is the
    /// element the descriptor points at.
    #[must_use]
    pub fn infer_from(descriptor: &LocatorDescriptor) -> Self {
        let value = descriptor.value();
        match descriptor.strategy() {
            Strategy::Css => infer_from_css(value),
            Strategy::XPath => infer_from_xpath(value),
            Strategy::Text => Self::new().with_text(value),
            Strategy::Id => Self::new().with(ID, value),
            Strategy::Attribute => descriptor
                .attribute_parts()
                .map(|(name, v)| Self::new().with(name, v.trim_matches(&['"', '\''][..])))
                .unwrap_or_default(),
        }
    }
}

/// Collapse runs of whitespace and trim.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[allow(clippy::expect_used)]
pub(crate) fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
}

fn css_part_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"#([\w-]+)|\.([\w-]+)|\[\s*([\w-]+)\s*(?:[~|^$*]?=\s*["']?([^"'\]]*)["']?)?\s*\]"#,
    )
}

fn css_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^([a-zA-Z][a-zA-Z0-9-]*)")
}

fn xpath_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^/*([a-zA-Z][a-zA-Z0-9-]*)")
}

fn xpath_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"(?:text\(\)|normalize-space\(\s*\.?\s*\)|\.)\s*=\s*(?:'([^']*)'|"([^"]*)")"#,
    )
}

fn xpath_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"@([\w-]+)\s*=\s*(?:'([^']*)'|"([^"]*)")"#)
}

/// Last compound selector of a CSS selector list entry.
pub(crate) fn css_last_compound(selector: &str) -> &str {
    let first = selector.split(',').next().unwrap_or(selector).trim();
    css_split_last_combinator(first).map_or(first, |(_, last)| last)
}

/// Split a CSS selector at its last top-level combinator into
/// `(scope, last compound)`. Brackets, parentheses and quotes are respected.
pub(crate) fn css_split_last_combinator(selector: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut split = None;

    for (i, c) in selector.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth = depth.saturating_sub(1),
            (None, '>' | '+' | '~') if depth == 0 => split = Some((i, i + 1)),
            (None, c) if depth == 0 && c.is_whitespace() => split = Some((i, i + c.len_utf8())),
            _ => {}
        }
    }

    let (start, end) = split?;
    let scope = selector[..start].trim_end().trim_end_matches(&['>', '+', '~'][..]).trim_end();
    let last = selector[end..].trim_start();
    if scope.is_empty() || last.is_empty() {
        None
    } else {
        Some((scope, last))
    }
}

fn infer_from_css(selector: &str) -> AttributeSnapshot {
    let compound = css_last_compound(selector);
    let mut snapshot = AttributeSnapshot::new();

    if let Some(tag) = css_tag_re().captures(compound).and_then(|c| c.get(1)) {
        snapshot.insert(TAG, tag.as_str().to_ascii_lowercase());
    }

    let mut classes = Vec::new();
    for caps in css_part_re().captures_iter(compound) {
        if let Some(id) = caps.get(1) {
            snapshot.insert(ID, id.as_str());
        } else if let Some(class) = caps.get(2) {
            classes.push(class.as_str());
        } else if let Some(name) = caps.get(3) {
            let value = caps.get(4).map_or("", |v| v.as_str());
            snapshot.insert(name.as_str(), value);
        }
    }
    if !classes.is_empty() {
        snapshot.insert(CLASS, classes.join(" "));
    }
    snapshot
}

fn infer_from_xpath(expression: &str) -> AttributeSnapshot {
    let last_step = expression
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or(expression);
    let mut snapshot = AttributeSnapshot::new();

    if let Some(tag) = xpath_tag_re().captures(last_step).and_then(|c| c.get(1)) {
        snapshot.insert(TAG, tag.as_str().to_ascii_lowercase());
    }
    if let Some(caps) = xpath_text_re().captures(last_step) {
        if let Some(text) = caps.get(1).or_else(|| caps.get(2)) {
            snapshot.insert(TEXT, normalize_whitespace(text.as_str()));
        }
    }
    for caps in xpath_attr_re().captures_iter(last_step) {
        if let (Some(name), Some(value)) = (caps.get(1), caps.get(2).or_else(|| caps.get(3))) {
            snapshot.insert(name.as_str(), value.as_str());
        }
    }
    snapshot
}
