//! Locator descriptors: how to find an element.
//!
//! A [`LocatorDescriptor`] is an immutable pair of [`Strategy`] and selector
//! string, optionally tagged with a stable logical name. Two descriptors are
//! equal when their strategy and value are equal; the logical name is metadata
//! and never takes part in equality or hashing.
//!
//! Descriptors have a textual form `strategy:value`:
//!
//! ```text
//! css:#login-btn
//! xpath://button[normalize-space(.)='Log In']
//! text:Log In
//! attribute:data-testid=login
//! id:login-btn
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::result::{SanarError, SanarResult};

/// Strategy used to find an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// CSS selector (e.g., "button.primary")
    Css,
    /// XPath expression
    #[serde(rename = "xpath")]
    XPath,
    /// Visible text content
    Text,
    /// Single attribute match, value written as `name=value`
    Attribute,
    /// Element id
    Id,
}

impl Strategy {
    /// All strategies in declaration order
    pub const ALL: [Self; 5] = [Self::Css, Self::XPath, Self::Text, Self::Attribute, Self::Id];

    /// Textual prefix used in `strategy:value` form
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Css => "css",
            Self::XPath => "xpath",
            Self::Text => "text",
            Self::Attribute => "attribute",
            Self::Id => "id",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(prefix))
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable description of how to find an element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocatorDescriptor {
    strategy: Strategy,
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logical_name: Option<String>,
}

impl LocatorDescriptor {
    /// Create a descriptor without a logical name
    #[must_use]
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
            logical_name: None,
        }
    }

    /// Create a CSS descriptor
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Css, selector)
    }

    /// Create an XPath descriptor
    #[must_use]
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::new(Strategy::XPath, expression)
    }

    /// Create a visible-text descriptor
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Strategy::Text, text)
    }

    /// Create an id descriptor
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::new(Strategy::Id, id)
    }

    /// Create an attribute descriptor matching `name=value`
    #[must_use]
    pub fn attribute(name: &str, value: &str) -> Self {
        Self::new(Strategy::Attribute, format!("{name}={value}"))
    }

    /// Attach a stable logical name (the locator store key)
    #[must_use]
    pub fn with_logical_name(mut self, name: impl Into<String>) -> Self {
        self.logical_name = Some(name.into());
        self
    }

    /// Get the strategy
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Get the selector value
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Get the logical name, if any
    #[must_use]
    pub fn logical_name(&self) -> Option<&str> {
        self.logical_name.as_deref()
    }

    /// Split an attribute descriptor into `(name, value)`
    #[must_use]
    pub fn attribute_parts(&self) -> Option<(&str, &str)> {
        if self.strategy != Strategy::Attribute {
            return None;
        }
        self.value.split_once('=')
    }

    /// Same strategy and value, but without the logical name
    #[must_use]
    pub fn without_logical_name(&self) -> Self {
        Self::new(self.strategy, self.value.clone())
    }

    /// Parse `strategy:value`.
    ///
    /// Input without a known strategy prefix is treated as XPath when it
    /// starts with `/` or `(`, and as CSS otherwise.
    pub fn parse(input: &str) -> SanarResult<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SanarError::InvalidDescriptor {
                input: input.to_string(),
                message: "empty locator".to_string(),
            });
        }

        if let Some((prefix, rest)) = trimmed.split_once(':') {
            if let Some(strategy) = Strategy::from_prefix(prefix) {
                if rest.is_empty() {
                    return Err(SanarError::InvalidDescriptor {
                        input: input.to_string(),
                        message: format!("missing value after '{prefix}:'"),
                    });
                }
                if strategy == Strategy::Attribute && !rest.contains('=') {
                    return Err(SanarError::InvalidDescriptor {
                        input: input.to_string(),
                        message: "attribute locators take the form name=value".to_string(),
                    });
                }
                return Ok(Self::new(strategy, rest));
            }
        }

        let strategy = if trimmed.starts_with('/') || trimmed.starts_with('(') {
            Strategy::XPath
        } else {
            Strategy::Css
        };
        Ok(Self::new(strategy, trimmed))
    }
}

impl PartialEq for LocatorDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.strategy == other.strategy && self.value == other.value
    }
}

impl Eq for LocatorDescriptor {}

impl Hash for LocatorDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.strategy.hash(state);
        self.value.hash(state);
    }
}

impl fmt::Display for LocatorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.strategy, self.value)
    }
}

impl FromStr for LocatorDescriptor {
    type Err = SanarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    mod equality_tests {
        use super::*;

        #[test]
        fn test_logical_name_ignored_in_equality() {
            let a = LocatorDescriptor::css("#login-btn").with_logical_name("login-submit-button");
            let b = LocatorDescriptor::css("#login-btn");
            assert_eq!(a, b);
        }

        #[test]
        fn test_strategy_participates_in_equality() {
            assert_ne!(
                LocatorDescriptor::css("login-btn"),
                LocatorDescriptor::id("login-btn")
            );
        }

        #[test]
        fn test_hash_matches_equality() {
            let mut set = HashSet::new();
            set.insert(LocatorDescriptor::css("#a").with_logical_name("x"));
            set.insert(LocatorDescriptor::css("#a").with_logical_name("y"));
            assert_eq!(set.len(), 1);
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_prefixed() {
            let d: LocatorDescriptor = "css:#login-btn".parse().unwrap();
            assert_eq!(d.strategy(), Strategy::Css);
            assert_eq!(d.value(), "#login-btn");
        }

        #[test]
        fn test_parse_prefix_case_insensitive() {
            let d = LocatorDescriptor::parse("XPath://button").unwrap();
            assert_eq!(d.strategy(), Strategy::XPath);
            assert_eq!(d.value(), "//button");
        }

        #[test]
        fn test_parse_value_keeps_colons() {
            let d = LocatorDescriptor::parse("css:a:hover").unwrap();
            assert_eq!(d.value(), "a:hover");
        }

        #[test]
        fn test_parse_bare_css_with_pseudo_class() {
            let d = LocatorDescriptor::parse("li:first-child").unwrap();
            assert_eq!(d.strategy(), Strategy::Css);
            assert_eq!(d.value(), "li:first-child");
        }

        #[test]
        fn test_parse_bare_xpath() {
            let d = LocatorDescriptor::parse("//form/button[2]").unwrap();
            assert_eq!(d.strategy(), Strategy::XPath);
        }

        #[test]
        fn test_parse_attribute() {
            let d = LocatorDescriptor::parse("attribute:data-testid=login").unwrap();
            assert_eq!(d.attribute_parts(), Some(("data-testid", "login")));
        }

        #[test]
        fn test_parse_attribute_without_equals_rejected() {
            assert!(LocatorDescriptor::parse("attribute:data-testid").is_err());
        }

        #[test]
        fn test_parse_empty_rejected() {
            assert!(LocatorDescriptor::parse("   ").is_err());
            assert!(LocatorDescriptor::parse("id:").is_err());
        }

        #[test]
        fn test_display_round_trips() {
            let d = LocatorDescriptor::text("Log In");
            assert_eq!(d.to_string(), "text:Log In");
            assert_eq!(LocatorDescriptor::parse(&d.to_string()).unwrap(), d);
        }
    }

    mod serde_tests {
        use super::*;

        #[test]
        fn test_serialize_omits_missing_logical_name() {
            let json = serde_json::to_string(&LocatorDescriptor::id("email")).unwrap();
            assert_eq!(json, r#"{"strategy":"id","value":"email"}"#);
        }

        #[test]
        fn test_xpath_strategy_name() {
            let json = serde_json::to_string(&Strategy::XPath).unwrap();
            assert_eq!(json, "\"xpath\"");
        }
    }
}
