//! Style layers and their source formats.
//!
//! A [`ThemeLayer`] is an ordered list of [`StyleRule`]s applied as one unit
//! during resolution. Layers come from two text formats:
//!
//! - **QSS/CSS** (`.qss`, `.css`): `selector { property: value; }` blocks.
//!   Conditional blocks use `@media (prefers-color-scheme: dark) { ... }` or
//!   `@context <name> { ... }`.
//! - **YAML** (`.yaml`, `.yml`): `selector: { property: value }` mappings with
//!   optional `light:` / `dark:` sub-mappings.
//!
//! Conditional blocks are flattened while parsing: each rule carries its own
//! optional [`Condition`], so resolution is a plain filter over a flat list.
//!
//! ```rust
//! use stylestack::{ThemeLayer, StyleContext};
//!
//! let layer = ThemeLayer::from_qss("chat", r#"
//! QLabel[role="user"] { background: #dcf8c6; }
//! @media (prefers-color-scheme: dark) {
//!     QLabel[role="user"] { background: #054740; }
//! }
//! "#).unwrap();
//!
//! assert_eq!(layer.rules().len(), 2);
//! assert!(layer.rules()[1].applies_to(&StyleContext::dark()));
//! ```

mod css;
mod rule;
mod yaml;

use std::path::{Path, PathBuf};

use crate::context::StyleContext;
use crate::error::{LayerLoadError, ParseError, StyleError};

pub use rule::{Condition, Declarations, InvalidCondition, StyleRule};

/// Source format of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerFormat {
    /// Qt stylesheet / CSS syntax.
    Qss,
    /// YAML mapping syntax.
    Yaml,
}

impl LayerFormat {
    /// Recognizes `qss`, `css`, `yaml` and `yml` (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "qss" | "css" => Some(LayerFormat::Qss),
            "yaml" | "yml" => Some(LayerFormat::Yaml),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// An ordered, named set of style rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeLayer {
    id: String,
    rules: Vec<StyleRule>,
    condition: Option<Condition>,
    source_path: Option<PathBuf>,
}

impl ThemeLayer {
    /// Creates an empty, unconditional layer.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rules: Vec::new(),
            condition: None,
            source_path: None,
        }
    }

    /// Parses layer text in the given format.
    pub fn parse(id: impl Into<String>, content: &str, format: LayerFormat) -> Result<Self, ParseError> {
        let id = id.into();
        let rules = match format {
            LayerFormat::Qss => css::parse_qss(&id, content)?,
            LayerFormat::Yaml => yaml::parse_yaml(&id, content)?,
        };
        Ok(Self {
            id,
            rules,
            condition: None,
            source_path: None,
        })
    }

    pub fn from_qss(id: impl Into<String>, content: &str) -> Result<Self, ParseError> {
        Self::parse(id, content, LayerFormat::Qss)
    }

    pub fn from_yaml(id: impl Into<String>, content: &str) -> Result<Self, ParseError> {
        Self::parse(id, content, LayerFormat::Yaml)
    }

    /// Loads a layer file. The id is the file stem and the format is chosen
    /// by extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StyleError> {
        let path = path.as_ref();
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("layer")
            .to_string();
        Self::from_file_named(id, path)
    }

    /// Loads a layer file under an explicit id, so parse errors name the
    /// layer the caller asked for.
    pub fn from_file_named<P: AsRef<Path>>(
        id: impl Into<String>,
        path: P,
    ) -> Result<Self, StyleError> {
        let path = path.as_ref();
        let format = LayerFormat::from_path(path).ok_or_else(|| {
            LayerLoadError::UnsupportedFormat {
                path: path.to_path_buf(),
            }
        })?;
        let content = std::fs::read_to_string(path).map_err(|e| LayerLoadError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut layer = Self::parse(id, &content, format)?;
        layer.source_path = Some(path.to_path_buf());
        Ok(layer)
    }

    /// Appends a rule, returning `self` for chaining.
    pub fn rule(mut self, rule: StyleRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn push(&mut self, rule: StyleRule) {
        self.rules.push(rule);
    }

    /// Gates the whole layer on `condition`, combining with any existing one.
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(match self.condition.take() {
            Some(existing) => existing.and(&condition),
            None => condition,
        });
        self
    }

    /// Renames the layer, returning `self` for chaining.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rules(&self) -> &[StyleRule] {
        &self.rules
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn applies_to(&self, context: &StyleContext) -> bool {
        self.condition
            .as_ref()
            .map_or(true, |condition| condition.matches(context))
    }
}
