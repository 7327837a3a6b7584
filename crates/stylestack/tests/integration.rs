//! End-to-end tests: layer files on disk through the registry and engine.

use std::fs;

use stylestack::{
    resolve, ColorMode, Condition, Declarations, LayerRegistry, ParseError, Settings,
    StyleContext, StyleError, StyleRule, ThemeEngine, ThemeLayer, ThemePreference, ThemeStack,
};
use tempfile::TempDir;

fn button(bg: &str) -> StyleRule {
    StyleRule::new("Button", Declarations::new()).declare("bg", bg)
}

// ============================================================================
// Resolution scenarios
// ============================================================================

#[test]
fn dark_override_layer() {
    let layers = vec![
        ThemeLayer::new("base").rule(button("white")),
        ThemeLayer::new("night").rule(button("black")).when(Condition::dark()),
    ];

    let light = resolve(&layers, &StyleContext::light()).unwrap();
    assert_eq!(light.stylesheet.len(), 1);
    assert_eq!(light.stylesheet.value("Button", "bg"), Some("white"));

    let dark = resolve(&layers, &StyleContext::dark()).unwrap();
    assert_eq!(dark.stylesheet.len(), 1);
    assert_eq!(dark.stylesheet.value("Button", "bg"), Some("black"));
}

#[test]
fn disjoint_properties_merge_into_one_entry() {
    let layers = vec![
        ThemeLayer::new("a").rule(StyleRule::new("Label", Declarations::new()).declare("color", "black")),
        ThemeLayer::new("b").rule(StyleRule::new("Label", Declarations::new()).declare("border", "1px")),
    ];
    let result = resolve(&layers, &StyleContext::light()).unwrap();

    assert_eq!(result.stylesheet.len(), 1);
    assert_eq!(
        result.stylesheet.to_qss(),
        "Label {\n    color: black;\n    border: 1px;\n}\n"
    );
}

#[test]
fn qss_and_yaml_layers_mix() {
    let base = ThemeLayer::from_qss(
        "base",
        "QLabel { color: black; }\n@media (prefers-color-scheme: dark) { QLabel { color: #eee; } }",
    )
    .unwrap();
    let user = ThemeLayer::from_yaml("user", "QLabel:\n  font-size: 14px\n  dark:\n    color: \"#ddd\"\n")
        .unwrap();
    let layers = [base, user];

    let light = resolve(&layers, &StyleContext::light()).unwrap();
    assert_eq!(light.stylesheet.value("QLabel", "color"), Some("black"));
    assert_eq!(light.stylesheet.value("QLabel", "font-size"), Some("14px"));

    let dark = resolve(&layers, &StyleContext::dark()).unwrap();
    assert_eq!(dark.stylesheet.value("QLabel", "color"), Some("#ddd"));
    assert!(dark.warnings.is_empty());
}

#[test]
fn flag_gated_rules() {
    let layer = ThemeLayer::from_qss(
        "density",
        "QPushButton { padding: 6px; }\n@context compact { QPushButton { padding: 2px; } }",
    )
    .unwrap();
    let layers = [layer];

    let normal = resolve(&layers, &StyleContext::dark()).unwrap();
    assert_eq!(normal.stylesheet.value("QPushButton", "padding"), Some("6px"));

    let compact = resolve(&layers, &StyleContext::dark().with_flag("compact")).unwrap();
    assert_eq!(compact.stylesheet.value("QPushButton", "padding"), Some("2px"));
}

#[test]
fn missing_property_block_is_parse_error() {
    let err: ParseError = ThemeLayer::from_qss("broken", "QLabel { color: black; }\nQPushButton\n")
        .unwrap_err();
    assert_eq!(err.layer, "broken");
    assert!(err.line.is_some());
}

// ============================================================================
// Engine over files
// ============================================================================

fn theme_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("base.qss"),
        "QPushButton { background: white; color: black; }\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("night.yaml"),
        "QPushButton:\n  background: \"#202020\"\n  color: \"#f0f0f0\"\n",
    )
    .unwrap();
    dir
}

fn engine_for(dir: &TempDir) -> ThemeEngine {
    let mut registry = LayerRegistry::new();
    registry.add_dir(dir.path()).unwrap();
    let stack = ThemeStack::parse(["base", "night@dark"]).unwrap();
    ThemeEngine::new(registry, stack).with_detector(|| ColorMode::Light)
}

#[test]
fn engine_switches_modes() {
    let dir = theme_dir();
    let mut engine = engine_for(&dir);

    let light = engine.apply_preference(ThemePreference::Auto).unwrap().clone();
    assert_eq!(light.value("QPushButton", "background"), Some("white"));

    let dark = engine.toggle().unwrap();
    assert_eq!(dark.value("QPushButton", "background"), Some("#202020"));
    assert_eq!(dark.value("QPushButton", "color"), Some("#f0f0f0"));
}

#[test]
fn malformed_file_leaves_previous_stylesheet() {
    let dir = theme_dir();
    let mut engine = engine_for(&dir);
    let before = engine.apply(StyleContext::dark()).unwrap().clone();

    fs::write(dir.path().join("night.yaml"), "QPushButton: [not, a, map]\n").unwrap();
    let err = engine.reload().unwrap_err();

    assert!(matches!(err, StyleError::Parse(ref e) if e.layer == "night"));
    assert_eq!(engine.stylesheet(), Some(&before));
    assert_eq!(engine.context().map(StyleContext::mode), Some(ColorMode::Dark));
}

#[test]
fn reload_picks_up_edits() {
    let dir = theme_dir();
    let mut engine = engine_for(&dir);
    engine.apply(StyleContext::light()).unwrap();

    fs::write(dir.path().join("base.qss"), "QPushButton { background: ivory; }\n").unwrap();
    let sheet = engine.reload().unwrap();
    assert_eq!(sheet.value("QPushButton", "background"), Some("ivory"));
    assert_eq!(sheet.value("QPushButton", "color"), None);
}

#[test]
fn settings_drive_the_engine() {
    let themes = theme_dir();
    let config = TempDir::new().unwrap();
    let path = config.path().join("settings.json");
    fs::write(
        &path,
        format!(
            r#"{{"theme": "dark", "layer_dirs": [{:?}], "stack": ["base", "night@dark"]}}"#,
            themes.path().display().to_string()
        ),
    )
    .unwrap();

    let settings = Settings::load_from(&path);
    let mut registry = LayerRegistry::new();
    for dir in &settings.layer_dirs {
        registry.add_dir(dir).unwrap();
    }
    let mut engine = ThemeEngine::new(registry, settings.theme_stack());

    let sheet = engine.apply_preference(settings.theme).unwrap();
    assert_eq!(sheet.value("QPushButton", "background"), Some("#202020"));
}
