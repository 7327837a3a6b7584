//! The flattened result of resolution.

use std::collections::HashMap;
use std::fmt;

use serde::ser::Serializer;
use serde::Serialize;

use crate::layer::Declarations;

/// Effective stylesheet: selector → final property map.
///
/// Selectors keep the order in which they first received a property, and
/// properties keep the order of their first write. Because of this, two
/// resolutions of the same layers under the same context render to
/// byte-identical text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedStyleSheet {
    entries: Vec<(String, Declarations)>,
    index: HashMap<String, usize>,
}

impl ResolvedStyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes one property, returning the value it replaced.
    pub(crate) fn set(&mut self, selector: &str, property: &str, value: &str) -> Option<String> {
        let slot = match self.index.get(selector) {
            Some(&slot) => slot,
            None => {
                self.entries.push((selector.to_string(), Declarations::new()));
                let slot = self.entries.len() - 1;
                self.index.insert(selector.to_string(), slot);
                slot
            }
        };
        self.entries[slot].1.set(property, value)
    }

    pub fn get(&self, selector: &str) -> Option<&Declarations> {
        self.index.get(selector).map(|&slot| &self.entries[slot].1)
    }

    /// Shorthand for `get(selector)?.get(property)`.
    pub fn value(&self, selector: &str, property: &str) -> Option<&str> {
        self.get(selector)?.get(property)
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(selector, _)| selector.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Declarations)> {
        self.entries
            .iter()
            .map(|(selector, declarations)| (selector.as_str(), declarations))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the stylesheet as QSS text, one block per selector.
    pub fn to_qss(&self) -> String {
        let mut out = String::new();
        for (i, (selector, declarations)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(selector);
            out.push_str(" {\n");
            for (property, value) in declarations.iter() {
                out.push_str("    ");
                out.push_str(property);
                out.push_str(": ");
                out.push_str(value);
                out.push_str(";\n");
            }
            out.push_str("}\n");
        }
        out
    }
}

impl fmt::Display for ResolvedStyleSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_qss())
    }
}

impl Serialize for ResolvedStyleSheet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}
