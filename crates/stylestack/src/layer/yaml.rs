//! YAML layer parsing.
//!
//! ```yaml
//! QPushButton:
//!   border-radius: 4px
//!   background: "#f0f0f0"
//!   dark:
//!     background: "#3c3f41"
//!
//! QLabel[role="user"]:
//!   padding: 6
//! ```
//!
//! Scalar entries are properties of the selector; `light:` and `dark:`
//! sub-mappings become rules gated on that mode, placed after the
//! selector's base rule so they override it. Entry order is preserved.
//!
//! `serde_yaml` values carry no positions, so structural errors locate
//! their line by searching the source for the offending key path.

use serde_yaml::{Mapping, Value};

use super::rule::{Condition, Declarations, StyleRule};
use crate::error::ParseError;

pub(crate) fn parse_yaml(layer: &str, content: &str) -> Result<Vec<StyleRule>, ParseError> {
    let source = Source { layer, content };
    let root: Value = serde_yaml::from_str(content).map_err(|e| {
        ParseError::new(layer, e.location().map(|loc| loc.line()), e.to_string())
    })?;

    let mapping = match root {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(source.error(
                &[],
                format!("expected a mapping of selectors, got {}", kind_of(&other)),
            ))
        }
    };

    let mut rules = Vec::new();
    for (key, value) in &mapping {
        let selector = scalar_text(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| source.error(&[], "selector must be a non-empty string"))?;

        let body = value.as_mapping().ok_or_else(|| {
            source.error(
                &[selector.as_str()],
                format!(
                    "selector '{}' must map to properties, got {}",
                    selector,
                    kind_of(value)
                ),
            )
        })?;

        let line = source.line_of(&[selector.as_str()]);
        let (base, overrides) = split_body(&source, &selector, body)?;
        if !base.is_empty() || overrides.is_empty() {
            rules.push(with_line(StyleRule::new(selector.clone(), base), line));
        }
        for (condition, declarations) in overrides {
            let mode = condition.to_string();
            let line = source.line_of(&[selector.as_str(), mode.as_str()]);
            rules.push(with_line(
                StyleRule::new(selector.clone(), declarations).when(condition),
                line,
            ));
        }
    }
    Ok(rules)
}

fn with_line(rule: StyleRule, line: Option<usize>) -> StyleRule {
    match line {
        Some(line) => rule.at_line(line),
        None => rule,
    }
}

struct Source<'a> {
    layer: &'a str,
    content: &'a str,
}

impl Source<'_> {
    fn error(&self, path: &[&str], message: impl Into<String>) -> ParseError {
        ParseError::new(self.layer, self.line_of(path), message)
    }

    /// 1-based line of the last key in `path`, each key searched for after
    /// the line of the previous one. An empty path yields the first
    /// non-blank line.
    fn line_of(&self, path: &[&str]) -> Option<usize> {
        let lines: Vec<&str> = self.content.lines().collect();
        let mut from = 0;
        let mut found = lines
            .iter()
            .position(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'));
        for key in path {
            let index = lines
                .iter()
                .enumerate()
                .skip(from)
                .find(|(_, line)| declares_key(line, key))
                .map(|(index, _)| index)?;
            found = Some(index);
            from = index + 1;
        }
        found.map(|index| index + 1)
    }
}

/// Whether `line` is a mapping entry for `key`, plain or quoted.
fn declares_key(line: &str, key: &str) -> bool {
    let line = line.trim_start();
    [format!("{}:", key), format!("\"{}\":", key), format!("'{}':", key)]
        .iter()
        .any(|prefix| line.starts_with(prefix.as_str()))
}

/// Splits a selector body into base declarations and mode overrides.
fn split_body(
    source: &Source<'_>,
    selector: &str,
    body: &Mapping,
) -> Result<(Declarations, Vec<(Condition, Declarations)>), ParseError> {
    let mut base = Declarations::new();
    let mut overrides = Vec::new();

    for (key, value) in body {
        let property = scalar_text(key).ok_or_else(|| {
            source.error(
                &[selector],
                format!("property names in '{}' must be strings", selector),
            )
        })?;
        let raw = property.trim();
        let property = raw.to_ascii_lowercase();

        match property.as_str() {
            "light" | "dark" => {
                let mode_body = value.as_mapping().ok_or_else(|| {
                    source.error(
                        &[selector, raw],
                        format!("'{}' in '{}' must be a mapping", property, selector),
                    )
                })?;
                let mut declarations = Declarations::new();
                for (mode_key, mode_value) in mode_body {
                    let name = scalar_text(mode_key).ok_or_else(|| {
                        source.error(
                            &[selector, raw],
                            format!("property names in '{}' must be strings", selector),
                        )
                    })?;
                    let name_raw = name.trim();
                    let value =
                        property_value(source, &[selector, raw, name_raw], selector, mode_value)?;
                    declarations.set(name_raw.to_ascii_lowercase(), value);
                }
                overrides.push((Condition::when(property), declarations));
            }
            _ => {
                let value = property_value(source, &[selector, raw], selector, value)?;
                base.set(property, value);
            }
        }
    }
    Ok((base, overrides))
}

fn property_value(
    source: &Source<'_>,
    path: &[&str],
    selector: &str,
    value: &Value,
) -> Result<String, ParseError> {
    scalar_text(value)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            let property = path.last().copied().unwrap_or_default();
            source.error(
                path,
                format!(
                    "property '{}' of '{}' must be a non-empty scalar, got {}",
                    property,
                    selector,
                    kind_of(value)
                ),
            )
        })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
