//! Layers embedded at compile time.
//!
//! | Name | Applies | Content |
//! |------|---------|---------|
//! | `base-light` | light mode (via the default stack) | widget palette for light backgrounds |
//! | `base-dark` | dark mode (via the default stack) | widget palette for dark backgrounds |
//! | `chat` | always, with dark overrides inside | chat bubbles and the send button |

use crate::error::ParseError;
use crate::layer::{LayerFormat, ThemeLayer};

/// Built-in layer sources as `(name, format, content)`.
pub const BUILTIN_LAYERS: &[(&str, LayerFormat, &str)] = &[
    (
        "base-light",
        LayerFormat::Qss,
        include_str!("../themes/base-light.qss"),
    ),
    (
        "base-dark",
        LayerFormat::Qss,
        include_str!("../themes/base-dark.qss"),
    ),
    ("chat", LayerFormat::Qss, include_str!("../themes/chat.qss")),
];

/// Parses every built-in layer.
pub fn builtin_layers() -> Result<Vec<ThemeLayer>, ParseError> {
    BUILTIN_LAYERS
        .iter()
        .map(|(name, format, content)| ThemeLayer::parse(*name, content, *format))
        .collect()
}
