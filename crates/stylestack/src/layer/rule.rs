//! Rule-level building blocks: property maps, context conditions and rules.

use std::collections::BTreeSet;
use std::fmt;

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::StyleContext;

/// Ordered `property → value` map with last-writer-wins semantics.
///
/// Lookup is by key. Setting an existing key replaces its value but keeps
/// the position of its first insertion, so serialization order only depends
/// on the order properties were first introduced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Declarations {
    entries: Vec<(String, String)>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `property` to `value`, returning the previous value if any.
    pub fn set(&mut self, property: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let property = property.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == property) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((property, value));
                None
            }
        }
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(property, value);
        self
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == property)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, property: &str) -> bool {
        self.get(property).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Declarations {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut declarations = Declarations::new();
        for (property, value) in iter {
            declarations.set(property, value);
        }
        declarations
    }
}

impl Serialize for Declarations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

/// Error returned when a condition string contains an empty context name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid condition '{0}': context names must be non-empty")]
pub struct InvalidCondition(pub String);

/// A context predicate gating a rule or a whole layer.
///
/// Holds the context names that must all be active. Written as names joined
/// by `+`, e.g. `"dark"` or `"dark+compact"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Condition {
    contexts: BTreeSet<String>,
}

impl Condition {
    /// A condition requiring a single named context.
    pub fn when(context: impl Into<String>) -> Self {
        let mut contexts = BTreeSet::new();
        contexts.insert(context.into().to_ascii_lowercase());
        Self { contexts }
    }

    pub fn dark() -> Self {
        Self::when("dark")
    }

    pub fn light() -> Self {
        Self::when("light")
    }

    /// Conjunction of both conditions.
    pub fn and(mut self, other: &Condition) -> Self {
        self.contexts.extend(other.contexts.iter().cloned());
        self
    }

    pub fn matches(&self, context: &StyleContext) -> bool {
        self.contexts.iter().all(|name| context.is_active(name))
    }

    pub fn contexts(&self) -> impl Iterator<Item = &str> {
        self.contexts.iter().map(|s| s.as_str())
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.contexts().collect();
        f.write_str(&names.join("+"))
    }
}

impl std::str::FromStr for Condition {
    type Err = InvalidCondition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut contexts = BTreeSet::new();
        for name in s.split('+') {
            let name = name.trim();
            if name.is_empty() {
                return Err(InvalidCondition(s.to_string()));
            }
            contexts.insert(name.to_ascii_lowercase());
        }
        Ok(Self { contexts })
    }
}

impl TryFrom<String> for Condition {
    type Error = InvalidCondition;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> Self {
        condition.to_string()
    }
}

/// One selector with its declarations, optionally gated by a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    /// Logical element/role match expression, e.g. `QPushButton#send:hover`.
    pub selector: String,
    pub declarations: Declarations,
    pub condition: Option<Condition>,
    /// 1-based source line, when parsed from text.
    pub line: Option<usize>,
}

impl StyleRule {
    pub fn new(selector: impl Into<String>, declarations: Declarations) -> Self {
        Self {
            selector: selector.into(),
            declarations,
            condition: None,
            line: None,
        }
    }

    /// Adds a declaration, returning `self` for chaining.
    pub fn declare(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.declarations.set(property, value);
        self
    }

    /// Gates the rule on `condition`, combining with any existing one.
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => existing.and(&condition),
            None => condition,
        });
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    pub fn applies_to(&self, context: &StyleContext) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition.matches(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declarations_last_writer_wins_keeps_position() {
        let mut decls = Declarations::new().with("color", "black").with("border", "1px");
        let previous = decls.set("color", "white");

        assert_eq!(previous.as_deref(), Some("black"));
        assert_eq!(decls.get("color"), Some("white"));
        let order: Vec<&str> = decls.iter().map(|(k, _)| k).collect();
        assert_eq!(order, vec!["color", "border"]);
    }

    #[test]
    fn test_declarations_serialize_as_map() {
        let decls: Declarations = [("bg", "white"), ("color", "black")].into_iter().collect();
        let json = serde_json::to_string(&decls).unwrap();
        assert_eq!(json, r#"{"bg":"white","color":"black"}"#);
    }

    #[test]
    fn test_condition_matches_all_contexts() {
        let condition: Condition = "dark+compact".parse().unwrap();
        assert!(!condition.matches(&StyleContext::dark()));
        assert!(condition.matches(&StyleContext::dark().with_flag("compact")));
        assert!(!condition.matches(&StyleContext::light().with_flag("compact")));
    }

    #[test]
    fn test_condition_display_is_sorted() {
        let condition = Condition::when("dark").and(&Condition::when("Compact"));
        assert_eq!(condition.to_string(), "compact+dark");
    }

    #[test]
    fn test_condition_rejects_empty_names() {
        assert!("dark+".parse::<Condition>().is_err());
        assert!("".parse::<Condition>().is_err());
    }

    #[test]
    fn test_condition_serde_as_string() {
        let json = serde_json::to_string(&Condition::dark()).unwrap();
        assert_eq!(json, "\"dark\"");
        let parsed: Condition = serde_json::from_str("\"light\"").unwrap();
        assert_eq!(parsed, Condition::light());
    }

    #[test]
    fn test_rule_applies_to() {
        let rule = StyleRule::new("Button", Declarations::new())
            .declare("bg", "black")
            .when(Condition::dark());
        assert!(rule.applies_to(&StyleContext::dark()));
        assert!(!rule.applies_to(&StyleContext::light()));
        assert!(StyleRule::new("Button", Declarations::new()).applies_to(&StyleContext::light()));
    }
}
