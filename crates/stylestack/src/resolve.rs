//! Deterministic merge of ordered layers into one stylesheet.
//!
//! # Algorithm
//!
//! 1. Validate every rule of every layer. Any malformed rule aborts with a
//!    [`ParseError`] before anything is written, so a failed resolution
//!    never yields a partial stylesheet.
//! 2. Walk layers in order, skipping layers and rules whose condition does
//!    not match the context.
//! 3. Write each declaration into the accumulator keyed by
//!    `(selector, property)`, overwriting earlier values. Properties that
//!    no later layer touches are preserved.
//!
//! Only ordered structures drive the output, so resolving the same layers
//! under the same context always yields the same stylesheet.
//!
//! ```rust
//! use stylestack::{resolve, Condition, Declarations, StyleContext, StyleRule, ThemeLayer};
//!
//! let layers = vec![
//!     ThemeLayer::new("base").rule(StyleRule::new("Button", Declarations::new()).declare("bg", "white")),
//!     ThemeLayer::new("night")
//!         .rule(StyleRule::new("Button", Declarations::new()).declare("bg", "black"))
//!         .when(Condition::dark()),
//! ];
//!
//! let light = resolve(&layers, &StyleContext::light()).unwrap();
//! assert_eq!(light.stylesheet.value("Button", "bg"), Some("white"));
//!
//! let dark = resolve(&layers, &StyleContext::dark()).unwrap();
//! assert_eq!(dark.stylesheet.value("Button", "bg"), Some("black"));
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::context::StyleContext;
use crate::error::{ConflictWarning, ParseError};
use crate::layer::{StyleRule, ThemeLayer};
use crate::sheet::ResolvedStyleSheet;

/// Output of a successful resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub stylesheet: ResolvedStyleSheet,
    /// Overrides between unconditional layers, in the order they happened.
    pub warnings: Vec<ConflictWarning>,
}

/// Merges `layers` in order under `context`.
///
/// # Errors
///
/// Returns a [`ParseError`] naming the layer and line of the first
/// malformed rule. Nothing is produced in that case.
pub fn resolve(layers: &[ThemeLayer], context: &StyleContext) -> Result<Resolution, ParseError> {
    for layer in layers {
        for rule in layer.rules() {
            validate_rule(layer, rule)?;
        }
    }

    let mut stylesheet = ResolvedStyleSheet::new();
    let mut warnings = Vec::new();
    // (selector, property) → id of the unconditional layer that last wrote
    // it. Conditional writes never touch this map.
    let mut writers: HashMap<(String, String), String> = HashMap::new();

    for layer in layers.iter().filter(|layer| layer.applies_to(context)) {
        for rule in layer.rules().iter().filter(|rule| rule.applies_to(context)) {
            let unconditional = !layer.is_conditional() && !rule.is_conditional();
            let selector = rule.selector.trim();

            for (property, value) in rule.declarations.iter() {
                stylesheet.set(selector, property, value.trim());
                if !unconditional {
                    continue;
                }

                let key = (selector.to_string(), property.to_string());
                let previous = writers.insert(key, layer.id().to_string());
                if let Some(earlier) = previous.filter(|earlier| earlier != layer.id()) {
                    let warning = ConflictWarning {
                        selector: selector.to_string(),
                        property: property.to_string(),
                        earlier_layer: earlier,
                        later_layer: layer.id().to_string(),
                    };
                    debug!(%warning, "style conflict");
                    warnings.push(warning);
                }
            }
        }
    }

    debug!(
        selectors = stylesheet.len(),
        layers = layers.len(),
        mode = %context.mode(),
        "resolved stylesheet"
    );
    Ok(Resolution {
        stylesheet,
        warnings,
    })
}

/// Checks that a rule can be written out as QSS unchanged.
fn validate_rule(layer: &ThemeLayer, rule: &StyleRule) -> Result<(), ParseError> {
    let fail = |message: String| ParseError::new(layer.id(), rule.line, message);

    let selector = rule.selector.trim();
    if selector.is_empty() {
        return Err(fail("empty selector".to_string()));
    }
    if selector.contains(['{', '}', ';']) {
        return Err(fail(format!("malformed selector '{}'", selector)));
    }

    for (property, value) in rule.declarations.iter() {
        if !is_property_name(property) {
            return Err(fail(format!(
                "malformed property name '{}' in '{}'",
                property, selector
            )));
        }
        let value = value.trim();
        if value.is_empty() {
            return Err(fail(format!(
                "empty value for property '{}' in '{}'",
                property, selector
            )));
        }
        if value.contains(['{', '}', ';']) {
            return Err(fail(format!(
                "malformed value '{}' for property '{}' in '{}'",
                value, property, selector
            )));
        }
    }
    Ok(())
}

/// CSS identifier shape: letters, digits, `-` and `_`, not starting with a digit.
fn is_property_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '-' || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
