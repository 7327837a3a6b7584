//! Error types for layer loading, parsing and resolution.
//!
//! Two kinds of failure abort a resolution: [`LayerLoadError`] (a layer source
//! is missing or unreadable) and [`ParseError`] (a rule is malformed). Both are
//! wrapped by [`StyleError`], which is what the engine surfaces to callers.
//!
//! [`ConflictWarning`] is not an error: it records that two unconditional
//! layers wrote the same selector/property pair, and never blocks resolution.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Error returned when a layer's rule syntax is malformed.
///
/// Identifies the offending layer and, when known, the 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Identifier of the layer that failed to parse.
    pub layer: String,
    /// 1-based line of the offending rule, if the layer came from text.
    pub line: Option<usize>,
    /// Human readable description of the problem.
    pub message: String,
}

impl ParseError {
    /// Creates a parse error for `layer`.
    pub fn new(layer: impl Into<String>, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "layer '{}' line {}: {}", self.layer, line, self.message),
            None => write!(f, "layer '{}': {}", self.layer, self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// Error returned when a layer source cannot be found or read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerLoadError {
    /// Directory does not exist or is not a directory.
    #[error("layer directory not found: {}", .path.display())]
    DirectoryNotFound { path: PathBuf },

    /// I/O failure while reading a layer file or walking a directory.
    #[error("failed to read \"{}\": {message}", .path.display())]
    Io { path: PathBuf, message: String },

    /// No layer registered under the requested name.
    #[error("layer not found: \"{name}\"")]
    NotFound { name: String },

    /// The file extension is not a recognized layer format.
    #[error("unsupported layer format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    /// Two registered directories provide a layer with the same name.
    #[error(
        "layer \"{name}\" is defined in more than one directory:\n  - {}\n  - {}",
        .existing.display(),
        .conflicting.display()
    )]
    Collision {
        name: String,
        existing: PathBuf,
        conflicting: PathBuf,
    },
}

/// Any failure that aborts loading or resolving a theme.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StyleError {
    #[error(transparent)]
    Load(#[from] LayerLoadError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Non-fatal diagnostic: a selector/property pair was written by two
/// unconditional layers. The later layer's value is the one kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictWarning {
    pub selector: String,
    pub property: String,
    /// Layer whose value was overwritten.
    pub earlier_layer: String,
    /// Layer whose value won.
    pub later_layer: String,
}

impl fmt::Display for ConflictWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' {{ {} }} set by '{}' is overridden by '{}'",
            self.selector, self.property, self.earlier_layer, self.later_layer
        )
    }
}

/// Result type for stylestack operations.
pub type Result<T> = std::result::Result<T, StyleError>;
