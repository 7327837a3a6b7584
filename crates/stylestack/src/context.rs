//! Resolution context: color mode, user preference and named flags.
//!
//! The active context is a plain value owned by the caller and threaded
//! through every resolution. There is no process-wide "current theme".
//!
//! ```rust
//! use stylestack::{ColorMode, StyleContext, ThemePreference};
//!
//! let pref: ThemePreference = "dark".parse().unwrap();
//! let mode = pref.resolve(|| ColorMode::Light);
//! let ctx = StyleContext::new(mode).with_flag("compact");
//!
//! assert!(ctx.is_active("dark"));
//! assert!(ctx.is_active("compact"));
//! assert!(!ctx.is_active("light"));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use dark_light::Mode as OsThemeMode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// The display mode a stylesheet is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Light background, dark text.
    Light,
    /// Dark background, light text.
    Dark,
}

impl ColorMode {
    /// Context name of this mode (`"light"` or `"dark"`).
    pub fn name(self) -> &'static str {
        match self {
            ColorMode::Light => "light",
            ColorMode::Dark => "dark",
        }
    }

    /// The opposite mode.
    pub fn toggled(self) -> Self {
        match self {
            ColorMode::Light => ColorMode::Dark,
            ColorMode::Dark => ColorMode::Light,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a theme preference string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown theme preference '{0}' (expected light, dark or auto)")]
pub struct UnknownPreference(pub String);

/// The user's persisted theme choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum ThemePreference {
    Light,
    Dark,
    /// Follow the operating system.
    #[default]
    Auto,
}

impl ThemePreference {
    /// Maps the preference to a concrete mode, consulting `detect` for `Auto`.
    pub fn resolve(self, detect: impl FnOnce() -> ColorMode) -> ColorMode {
        match self {
            ThemePreference::Light => ColorMode::Light,
            ThemePreference::Dark => ColorMode::Dark,
            ThemePreference::Auto => detect(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThemePreference::Light => "light",
            ThemePreference::Dark => "dark",
            ThemePreference::Auto => "auto",
        }
    }
}

impl From<ColorMode> for ThemePreference {
    fn from(mode: ColorMode) -> Self {
        match mode {
            ColorMode::Light => ThemePreference::Light,
            ColorMode::Dark => ThemePreference::Dark,
        }
    }
}

impl FromStr for ThemePreference {
    type Err = UnknownPreference;

    /// Case-insensitive; an empty string and `"system"` both mean `Auto`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ThemePreference::Light),
            "dark" => Ok(ThemePreference::Dark),
            "" | "auto" | "system" => Ok(ThemePreference::Auto),
            _ => Err(UnknownPreference(s.to_string())),
        }
    }
}

impl TryFrom<String> for ThemePreference {
    type Error = UnknownPreference;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of active context names a resolution runs under.
///
/// The color mode's name is always active; extra flags (e.g. `"compact"`)
/// can be added for layers conditioned on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StyleContext {
    mode: ColorMode,
    flags: BTreeSet<String>,
}

impl StyleContext {
    pub fn new(mode: ColorMode) -> Self {
        Self {
            mode,
            flags: BTreeSet::new(),
        }
    }

    pub fn light() -> Self {
        Self::new(ColorMode::Light)
    }

    pub fn dark() -> Self {
        Self::new(ColorMode::Dark)
    }

    /// Adds a named flag, returning `self` for chaining.
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag.into().to_ascii_lowercase());
        self
    }

    /// Replaces the color mode, keeping flags.
    pub fn with_mode(mut self, mode: ColorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Same flags, opposite color mode.
    pub fn toggled(&self) -> Self {
        self.clone().with_mode(self.mode.toggled())
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(|s| s.as_str())
    }

    /// Returns true if `name` is the active mode's name or a set flag.
    pub fn is_active(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(self.mode.name())
            || self.flags.contains(&name.to_ascii_lowercase())
    }
}

impl Default for StyleContext {
    fn default() -> Self {
        Self::light()
    }
}

/// A function that reports the platform's current color mode.
pub type ModeDetector = fn() -> ColorMode;

/// Asks the operating system for its preferred color mode.
///
/// Falls back to [`ColorMode::Light`] when the platform gives no answer.
pub fn detect_color_mode() -> ColorMode {
    match dark_light::detect() {
        Ok(OsThemeMode::Dark) => ColorMode::Dark,
        Ok(_) => ColorMode::Light,
        Err(err) => {
            debug!(error = %err, "color mode detection failed, assuming light");
            ColorMode::Light
        }
    }
}

/// Classifies a window background color by perceived luminance.
///
/// Useful when the toolkit exposes a palette but no explicit color scheme.
pub fn mode_from_background(red: u8, green: u8, blue: u8) -> ColorMode {
    let luminance =
        (0.299 * f64::from(red) + 0.587 * f64::from(green) + 0.114 * f64::from(blue)) / 255.0;
    if luminance < 0.5 {
        ColorMode::Dark
    } else {
        ColorMode::Light
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_parsing() {
        assert_eq!("Dark".parse(), Ok(ThemePreference::Dark));
        assert_eq!("light".parse(), Ok(ThemePreference::Light));
        assert_eq!("System".parse(), Ok(ThemePreference::Auto));
        assert_eq!("".parse(), Ok(ThemePreference::Auto));
        assert!("sepia".parse::<ThemePreference>().is_err());
    }

    #[test]
    fn test_preference_resolve_only_detects_for_auto() {
        assert_eq!(
            ThemePreference::Light.resolve(|| panic!("detector called")),
            ColorMode::Light
        );
        assert_eq!(ThemePreference::Auto.resolve(|| ColorMode::Dark), ColorMode::Dark);
    }

    #[test]
    fn test_preference_serde() {
        let json = serde_json::to_string(&ThemePreference::Dark).unwrap();
        assert_eq!(json, "\"dark\"");
        let parsed: ThemePreference = serde_json::from_str("\"System\"").unwrap();
        assert_eq!(parsed, ThemePreference::Auto);
        assert!(serde_json::from_str::<ThemePreference>("\"purple\"").is_err());
    }

    #[test]
    fn test_context_activity() {
        let ctx = StyleContext::dark().with_flag("Compact");
        assert!(ctx.is_active("dark"));
        assert!(ctx.is_active("DARK"));
        assert!(ctx.is_active("compact"));
        assert!(!ctx.is_active("light"));
    }

    #[test]
    fn test_context_toggle_keeps_flags() {
        let ctx = StyleContext::light().with_flag("compact").toggled();
        assert_eq!(ctx.mode(), ColorMode::Dark);
        assert!(ctx.is_active("compact"));
    }

    #[test]
    fn test_mode_from_background() {
        assert_eq!(mode_from_background(0x1e, 0x1e, 0x1e), ColorMode::Dark);
        assert_eq!(mode_from_background(0xf5, 0xf5, 0xf5), ColorMode::Light);
        assert_eq!(mode_from_background(0, 0, 255), ColorMode::Dark);
    }
}
