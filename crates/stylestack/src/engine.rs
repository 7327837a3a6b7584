//! Theme engine: owns the loaded layers and the active stylesheet.
//!
//! The engine loads every layer named by its [`ThemeStack`] once, then
//! re-resolves them whenever the context changes. Every operation is
//! all-or-nothing: on failure the previously active stylesheet and context
//! stay in place and the error is returned.
//!
//! ```rust
//! use stylestack::{ColorMode, LayerRegistry, StyleContext, ThemeEngine, ThemeStack};
//!
//! let registry = LayerRegistry::with_builtin().unwrap();
//! let mut engine = ThemeEngine::new(registry, ThemeStack::default())
//!     .with_detector(|| ColorMode::Dark);
//!
//! engine.load().unwrap();
//! engine.apply(StyleContext::light()).unwrap();
//! engine.toggle().unwrap();
//! assert_eq!(engine.context().unwrap().mode(), ColorMode::Dark);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::{detect_color_mode, ModeDetector, StyleContext, ThemePreference};
use crate::error::{ConflictWarning, Result};
use crate::layer::{Condition, InvalidCondition, ThemeLayer};
use crate::registry::LayerRegistry;
use crate::resolve::resolve;
use crate::sheet::ResolvedStyleSheet;

/// A stack entry: a registry name, optionally gated on a condition.
///
/// Written as `name` or `name@condition`, e.g. `base-dark@dark` or
/// `compact@dark+compact`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LayerRef {
    pub name: String,
    pub when: Option<Condition>,
}

impl LayerRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            when: None,
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }
}

impl fmt::Display for LayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.when {
            Some(condition) => write!(f, "{}@{}", self.name, condition),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for LayerRef {
    type Err = InvalidCondition;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, condition) = match s.split_once('@') {
            Some((name, condition)) => (name, Some(condition.parse::<Condition>()?)),
            None => (s, None),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(InvalidCondition(s.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            when: condition,
        })
    }
}

impl TryFrom<String> for LayerRef {
    type Error = InvalidCondition;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LayerRef> for String {
    fn from(layer: LayerRef) -> Self {
        layer.to_string()
    }
}

/// The ordered list of layers the engine resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeStack {
    layers: Vec<LayerRef>,
}

impl ThemeStack {
    pub fn new(layers: Vec<LayerRef>) -> Self {
        Self { layers }
    }

    /// Builds a stack from `name[@condition]` strings.
    pub fn parse<I, S>(entries: I) -> std::result::Result<Self, InvalidCondition>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let layers = entries
            .into_iter()
            .map(|entry| entry.as_ref().parse())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { layers })
    }

    pub fn push(&mut self, layer: LayerRef) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[LayerRef] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Default for ThemeStack {
    /// The mode's base palette followed by the chat overrides.
    fn default() -> Self {
        Self::new(vec![
            LayerRef::new("base-light").when(Condition::light()),
            LayerRef::new("base-dark").when(Condition::dark()),
            LayerRef::new("chat"),
        ])
    }
}

/// The currently applied resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTheme {
    pub context: StyleContext,
    pub stylesheet: ResolvedStyleSheet,
    pub warnings: Vec<ConflictWarning>,
}

/// Loads a stack of layers and keeps the active stylesheet up to date.
#[derive(Debug)]
pub struct ThemeEngine {
    registry: LayerRegistry,
    stack: ThemeStack,
    detector: ModeDetector,
    layers: Option<Vec<ThemeLayer>>,
    active: Option<ActiveTheme>,
}

impl ThemeEngine {
    /// Creates an engine. Nothing is read until [`load`](Self::load) or the
    /// first apply.
    pub fn new(registry: LayerRegistry, stack: ThemeStack) -> Self {
        Self {
            registry,
            stack,
            detector: detect_color_mode,
            layers: None,
            active: None,
        }
    }

    /// Replaces the platform color mode detector used for
    /// [`ThemePreference::Auto`].
    pub fn with_detector(mut self, detector: ModeDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Loads every stack layer from the registry.
    ///
    /// Keeps previously loaded layers if any of them fails.
    pub fn load(&mut self) -> Result<()> {
        match self.load_layers() {
            Ok(layers) => {
                debug!(layers = layers.len(), "theme layers loaded");
                self.layers = Some(layers);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to load theme layers");
                Err(err)
            }
        }
    }

    fn load_layers(&mut self) -> Result<Vec<ThemeLayer>> {
        let mut layers = Vec::with_capacity(self.stack.len());
        for entry in self.stack.layers() {
            let mut layer = self.registry.get(&entry.name)?;
            if let Some(condition) = &entry.when {
                layer = layer.when(condition.clone());
            }
            layers.push(layer);
        }
        Ok(layers)
    }

    /// Resolves the loaded layers under `context` and makes the result active.
    pub fn apply(&mut self, context: StyleContext) -> Result<&ResolvedStyleSheet> {
        if self.layers.is_none() {
            self.load()?;
        }
        let layers = self.layers.as_deref().unwrap_or_default();
        let resolution = match resolve(layers, &context) {
            Ok(resolution) => resolution,
            Err(err) => {
                warn!(error = %err, mode = %context.mode(), "failed to apply theme");
                return Err(err.into());
            }
        };

        debug!(
            mode = %context.mode(),
            selectors = resolution.stylesheet.len(),
            warnings = resolution.warnings.len(),
            "theme applied"
        );
        let active = self.active.insert(ActiveTheme {
            context,
            stylesheet: resolution.stylesheet,
            warnings: resolution.warnings,
        });
        Ok(&active.stylesheet)
    }

    /// Applies a user preference, keeping the flags of the current context.
    pub fn apply_preference(&mut self, preference: ThemePreference) -> Result<&ResolvedStyleSheet> {
        let mode = preference.resolve(self.detector);
        let context = self
            .active
            .as_ref()
            .map(|active| active.context.clone().with_mode(mode))
            .unwrap_or_else(|| StyleContext::new(mode));
        self.apply(context)
    }

    /// Switches between light and dark.
    ///
    /// Before anything is applied, toggles away from the detected mode.
    pub fn toggle(&mut self) -> Result<&ResolvedStyleSheet> {
        let context = match &self.active {
            Some(active) => active.context.toggled(),
            None => StyleContext::new((self.detector)()).toggled(),
        };
        self.apply(context)
    }

    /// Re-reads every stack layer and re-applies the active context.
    ///
    /// The new layers are committed only if they also resolve cleanly.
    pub fn reload(&mut self) -> Result<&ResolvedStyleSheet> {
        let layers = match self.load_layers() {
            Ok(layers) => layers,
            Err(err) => {
                warn!(error = %err, "failed to reload theme layers");
                return Err(err);
            }
        };

        let context = self
            .active
            .as_ref()
            .map(|active| active.context.clone())
            .unwrap_or_else(|| StyleContext::new((self.detector)()));

        let resolution = match resolve(&layers, &context) {
            Ok(resolution) => resolution,
            Err(err) => {
                warn!(error = %err, "reloaded theme layers failed to resolve");
                return Err(err.into());
            }
        };

        debug!(layers = layers.len(), "theme reloaded");
        self.layers = Some(layers);
        let active = self.active.insert(ActiveTheme {
            context,
            stylesheet: resolution.stylesheet,
            warnings: resolution.warnings,
        });
        Ok(&active.stylesheet)
    }

    pub fn active(&self) -> Option<&ActiveTheme> {
        self.active.as_ref()
    }

    pub fn stylesheet(&self) -> Option<&ResolvedStyleSheet> {
        self.active.as_ref().map(|active| &active.stylesheet)
    }

    pub fn context(&self) -> Option<&StyleContext> {
        self.active.as_ref().map(|active| &active.context)
    }

    pub fn warnings(&self) -> &[ConflictWarning] {
        self.active
            .as_ref()
            .map(|active| active.warnings.as_slice())
            .unwrap_or(&[])
    }

    pub fn stack(&self) -> &ThemeStack {
        &self.stack
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    /// Mutable access to the registry. Changes take effect on the next
    /// [`load`](Self::load) or [`reload`](Self::reload).
    pub fn registry_mut(&mut self) -> &mut LayerRegistry {
        &mut self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ColorMode;
    use crate::error::{LayerLoadError, StyleError};
    use crate::layer::{Declarations, LayerFormat, StyleRule};

    fn registry() -> LayerRegistry {
        let mut registry = LayerRegistry::new();
        registry
            .add_inline("base", "QPushButton { background: white; }", LayerFormat::Qss)
            .unwrap();
        registry
            .add_inline("night", "QPushButton { background: black; }", LayerFormat::Qss)
            .unwrap();
        registry
    }

    fn stack() -> ThemeStack {
        ThemeStack::parse(["base", "night@dark"]).unwrap()
    }

    #[test]
    fn test_layer_ref_parse() {
        let plain: LayerRef = "chat".parse().unwrap();
        assert_eq!(plain, LayerRef::new("chat"));

        let gated: LayerRef = "compact@dark+compact".parse().unwrap();
        assert_eq!(gated.name, "compact");
        assert_eq!(gated.to_string(), "compact@compact+dark");

        assert!("@dark".parse::<LayerRef>().is_err());
        assert!("chat@".parse::<LayerRef>().is_err());
    }

    #[test]
    fn test_layer_ref_serde() {
        let json = serde_json::to_string(&LayerRef::new("base-dark").when(Condition::dark())).unwrap();
        assert_eq!(json, r#""base-dark@dark""#);
        let back: LayerRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back.when, Some(Condition::dark()));
    }

    #[test]
    fn test_default_stack() {
        let names: Vec<String> = ThemeStack::default()
            .layers()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(names, vec!["base-light@light", "base-dark@dark", "chat"]);
    }

    #[test]
    fn test_apply_light_and_dark() {
        let mut engine = ThemeEngine::new(registry(), stack());

        let sheet = engine.apply(StyleContext::light()).unwrap();
        assert_eq!(sheet.value("QPushButton", "background"), Some("white"));

        let sheet = engine.apply(StyleContext::dark()).unwrap();
        assert_eq!(sheet.value("QPushButton", "background"), Some("black"));
        assert_eq!(engine.context().unwrap().mode(), ColorMode::Dark);
    }

    #[test]
    fn test_conditional_stack_entry_has_no_conflict() {
        let mut engine = ThemeEngine::new(registry(), stack());
        engine.apply(StyleContext::dark()).unwrap();
        assert!(engine.warnings().is_empty());
    }

    #[test]
    fn test_toggle_keeps_flags() {
        let mut engine = ThemeEngine::new(registry(), stack());
        engine
            .apply(StyleContext::light().with_flag("compact"))
            .unwrap();
        engine.toggle().unwrap();

        let ctx = engine.context().unwrap();
        assert_eq!(ctx.mode(), ColorMode::Dark);
        assert!(ctx.is_active("compact"));
    }

    #[test]
    fn test_toggle_before_apply_uses_detector() {
        let mut engine = ThemeEngine::new(registry(), stack()).with_detector(|| ColorMode::Dark);
        engine.toggle().unwrap();
        assert_eq!(engine.context().unwrap().mode(), ColorMode::Light);
    }

    #[test]
    fn test_apply_preference_auto_uses_detector() {
        let mut engine = ThemeEngine::new(registry(), stack()).with_detector(|| ColorMode::Dark);
        let sheet = engine.apply_preference(ThemePreference::Auto).unwrap();
        assert_eq!(sheet.value("QPushButton", "background"), Some("black"));

        engine.apply_preference(ThemePreference::Light).unwrap();
        assert_eq!(engine.context().unwrap().mode(), ColorMode::Light);
    }

    #[test]
    fn test_missing_layer_keeps_previous_state() {
        let mut engine = ThemeEngine::new(registry(), stack());
        engine.apply(StyleContext::light()).unwrap();
        let before = engine.stylesheet().cloned();

        engine.stack.push(LayerRef::new("missing"));
        let err = engine.reload().unwrap_err();
        assert!(matches!(
            err,
            StyleError::Load(LayerLoadError::NotFound { .. })
        ));
        assert_eq!(engine.stylesheet().cloned(), before);
        assert_eq!(engine.context().unwrap().mode(), ColorMode::Light);
    }

    #[test]
    fn test_malformed_layer_keeps_previous_state() {
        let mut engine = ThemeEngine::new(registry(), stack());
        engine.apply(StyleContext::light()).unwrap();
        let before = engine.stylesheet().cloned();

        engine.registry_mut().add_layer(
            ThemeLayer::new("base")
                .rule(StyleRule::new("QLabel", Declarations::new()).declare("color", "")),
        );
        assert!(matches!(engine.reload(), Err(StyleError::Parse(_))));
        assert_eq!(engine.stylesheet().cloned(), before);

        // Loaded layers were not replaced either.
        let sheet = engine.apply(StyleContext::dark()).unwrap();
        assert_eq!(sheet.value("QPushButton", "background"), Some("black"));
    }

    #[test]
    fn test_builtin_default_stack() {
        let registry = LayerRegistry::with_builtin().unwrap();
        let mut engine = ThemeEngine::new(registry, ThemeStack::default());
        let light = engine.apply(StyleContext::light()).unwrap().clone();
        let dark = engine.apply(StyleContext::dark()).unwrap().clone();
        assert_ne!(light, dark);
        assert!(light.get("QMainWindow").is_some());
    }
}
