use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use stylestack::{
    detect_color_mode, resolve, ColorMode, LayerRegistry, Settings, StyleContext, ThemeEngine,
    ThemeLayer, ThemePreference, ThemeStack,
};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, OutputFormat, ResolveArgs, SourceArgs, ThemeAction};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stylesheet output stays clean on stdout.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("STYLESTACK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings_path = cli.settings.or_else(Settings::default_path);
    let settings = match &settings_path {
        Some(path) => Settings::load_from(path),
        None => Settings::default(),
    };

    match cli.command {
        Command::Resolve(args) => cmd_resolve(&settings, args),
        Command::Check { files } => cmd_check(&files),
        Command::Theme { action } => cmd_theme(
            settings,
            settings_path.as_deref(),
            action.unwrap_or(ThemeAction::Get),
        ),
        Command::List { sources } => cmd_list(&settings, &sources),
    }
}

/// Builds a registry from built-ins, saved directories and `--dir` flags.
///
/// Saved directories that no longer exist are skipped with a warning;
/// directories given on the command line must exist.
fn build_registry(settings: &Settings, sources: &SourceArgs) -> anyhow::Result<LayerRegistry> {
    let mut registry = if sources.no_builtin {
        LayerRegistry::new()
    } else {
        LayerRegistry::with_builtin().context("built-in layers failed to parse")?
    };

    for dir in &settings.layer_dirs {
        if let Err(err) = registry.add_dir(dir) {
            warn!(error = %err, "skipping saved layer directory");
        }
    }
    for dir in &sources.dirs {
        registry
            .add_dir(dir)
            .with_context(|| format!("cannot use --dir {}", dir.display()))?;
    }
    Ok(registry)
}

fn cmd_resolve(settings: &Settings, args: ResolveArgs) -> anyhow::Result<()> {
    let registry = build_registry(settings, &args.sources)?;
    let stack = if args.layers.is_empty() {
        settings.theme_stack()
    } else {
        ThemeStack::new(args.layers)
    };
    debug!(layers = stack.len(), "resolving stack");

    let preference = args.mode.unwrap_or(settings.theme);
    let context = args
        .flags
        .iter()
        .fold(StyleContext::new(preference.resolve(detect_color_mode)), |ctx, flag| {
            ctx.with_flag(flag.as_str())
        });

    let mut engine = ThemeEngine::new(registry, stack);
    engine.apply(context).context("failed to resolve theme")?;

    if args.warnings {
        for warning in engine.warnings() {
            eprintln!("warning: {}", warning);
        }
    }

    let Some(stylesheet) = engine.stylesheet() else {
        bail!("no stylesheet was produced");
    };
    match args.format {
        OutputFormat::Qss => print!("{}", stylesheet.to_qss()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(stylesheet)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(stylesheet)?),
    }
    Ok(())
}

fn cmd_check(files: &[PathBuf]) -> anyhow::Result<()> {
    let mut failed = 0;
    for path in files {
        match check_file(path) {
            Ok(rules) => println!("ok: {} ({} rules)", path.display(), rules),
            Err(err) => {
                failed += 1;
                println!("error: {}: {:#}", path.display(), err);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} files failed to parse", failed, files.len());
    }
    Ok(())
}

fn check_file(path: &Path) -> anyhow::Result<usize> {
    let layer = ThemeLayer::from_file(path)?;
    // Resolution also validates selectors and values the parser accepts.
    resolve(std::slice::from_ref(&layer), &StyleContext::light())?;
    Ok(layer.rules().len())
}

fn cmd_theme(
    mut settings: Settings,
    path: Option<&Path>,
    action: ThemeAction,
) -> anyhow::Result<()> {
    match action {
        ThemeAction::Get => {
            let mode = settings.theme.resolve(detect_color_mode);
            println!("{} ({})", settings.theme, mode);
            return Ok(());
        }
        ThemeAction::Set { preference } => settings.theme = preference,
        ThemeAction::Toggle => {
            let mode: ColorMode = settings.theme.resolve(detect_color_mode);
            settings.theme = ThemePreference::from(mode.toggled());
        }
    }

    let Some(path) = path else {
        bail!("no configuration directory available; pass --settings FILE");
    };
    settings
        .save_to(path)
        .with_context(|| format!("failed to save theme preference to {}", path.display()))?;
    println!("{}", settings.theme);
    Ok(())
}

fn cmd_list(settings: &Settings, sources: &SourceArgs) -> anyhow::Result<()> {
    let mut registry = build_registry(settings, sources)?;
    let layers = registry.describe().context("failed to scan layer directories")?;
    let width = layers.keys().map(String::len).max().unwrap_or(0);
    for (name, source) in layers {
        println!("{:<width$}  {}", name, source, width = width);
    }
    Ok(())
}
