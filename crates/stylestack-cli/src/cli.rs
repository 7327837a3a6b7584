//! Command line definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stylestack::{LayerRef, ThemePreference};

#[derive(Debug, Parser)]
#[command(name = "stylestack", version, about = "Resolve layered QSS themes for light and dark mode")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). STYLESTACK_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file to use instead of the default location.
    #[arg(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve a layer stack and print the effective stylesheet.
    Resolve(ResolveArgs),

    /// Parse layer files and report syntax errors.
    Check {
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },

    /// Show or change the persisted theme preference.
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },

    /// List the layers available for stacking.
    List {
        #[command(flatten)]
        sources: SourceArgs,
    },
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Additional directory of layer files (repeatable).
    #[arg(long = "dir", value_name = "DIR")]
    pub dirs: Vec<PathBuf>,

    /// Do not register the built-in layers.
    #[arg(long)]
    pub no_builtin: bool,
}

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Color mode: light, dark or auto. Defaults to the saved preference.
    #[arg(long, value_name = "MODE")]
    pub mode: Option<ThemePreference>,

    /// Activate a named context flag (repeatable).
    #[arg(long = "flag", value_name = "NAME")]
    pub flags: Vec<String>,

    #[command(flatten)]
    pub sources: SourceArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Qss)]
    pub format: OutputFormat,

    /// Print conflict warnings to stderr.
    #[arg(long)]
    pub warnings: bool,

    /// Layers to stack, lowest priority first, as NAME or NAME@CONDITION.
    /// Defaults to the saved stack.
    #[arg(value_name = "LAYER")]
    pub layers: Vec<LayerRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Qss,
    Json,
    Yaml,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ThemeAction {
    /// Print the saved preference and the mode it resolves to.
    Get,
    /// Save a preference: light, dark or auto.
    Set { preference: ThemePreference },
    /// Save the opposite of the currently effective mode.
    Toggle,
}
