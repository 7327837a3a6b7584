//! # Stylestack - Layered Stylesheet Resolution
//!
//! `stylestack` merges ordered style layers (a base palette, component
//! overrides, user tweaks) into one effective Qt-style stylesheet, for a
//! given light/dark context. Applying the result to widgets is left to the
//! caller; this crate stops at producing the text or structure.
//!
//! ## Core Concepts
//!
//! - [`ThemeLayer`]: Named, ordered list of [`StyleRule`]s, parsed from QSS/CSS
//!   or YAML, optionally gated by a [`Condition`]
//! - [`StyleContext`]: The active [`ColorMode`] plus named flags
//! - [`resolve`]: Deterministic merge where later layers win per property
//! - [`ResolvedStyleSheet`]: The flattened result, renderable as QSS
//! - [`LayerRegistry`]: Named layers from inline text, built-ins and directories
//! - [`ThemeEngine`]: Loads a [`ThemeStack`] once and re-applies it on theme switches
//!
//! ## Quick Start
//!
//! ```rust
//! use stylestack::{resolve, StyleContext, ThemeLayer};
//!
//! let base = ThemeLayer::from_qss("base", "QPushButton { background: white; color: black; }").unwrap();
//! let chat = ThemeLayer::from_qss("chat", r#"
//!     @media (prefers-color-scheme: dark) {
//!         QPushButton { background: #3c3f41; }
//!     }
//! "#).unwrap();
//!
//! let light = resolve(&[base.clone(), chat.clone()], &StyleContext::light()).unwrap();
//! assert_eq!(light.stylesheet.value("QPushButton", "background"), Some("white"));
//!
//! let dark = resolve(&[base, chat], &StyleContext::dark()).unwrap();
//! assert_eq!(dark.stylesheet.value("QPushButton", "background"), Some("#3c3f41"));
//! assert_eq!(dark.stylesheet.value("QPushButton", "color"), Some("black"));
//! ```
//!
//! ## Conditions
//!
//! Rules and whole layers can be gated on context names. In QSS,
//! `@media (prefers-color-scheme: dark)` gates on the mode and
//! `@context compact { ... }` on a flag; nested blocks require both. YAML
//! layers use `light:` and `dark:` sub-mappings inside a selector.
//!
//! ## No Global State
//!
//! There is no process-wide current theme. The context is a value passed to
//! [`resolve`] or [`ThemeEngine::apply`], and platform color mode detection is
//! a plain function ([`ModeDetector`]) that callers can replace.

mod builtin;
pub mod context;
pub mod engine;
mod error;
pub mod layer;
pub mod registry;
mod resolve;
pub mod settings;
mod sheet;

pub use builtin::{builtin_layers, BUILTIN_LAYERS};
pub use context::{
    detect_color_mode, mode_from_background, ColorMode, ModeDetector, StyleContext,
    ThemePreference, UnknownPreference,
};
pub use engine::{ActiveTheme, LayerRef, ThemeEngine, ThemeStack};
pub use error::{ConflictWarning, LayerLoadError, ParseError, Result, StyleError};
pub use layer::{Condition, Declarations, InvalidCondition, LayerFormat, StyleRule, ThemeLayer};
pub use registry::{LayerRegistry, LAYER_EXTENSIONS};
pub use resolve::{resolve, Resolution};
pub use settings::{Settings, SettingsError};
pub use sheet::ResolvedStyleSheet;
