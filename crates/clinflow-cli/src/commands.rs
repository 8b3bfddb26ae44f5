//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::ColorChoice;

/// Clinflow: run end-to-end clinical UI journeys
#[derive(Parser, Debug)]
#[command(name = "clinflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// YAML configuration file
    #[arg(short, long, global = true, env = "CLINFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenarios against the clinic
    Run(RunArgs),

    /// List available scenarios
    List(ListArgs),

    /// Show the effective configuration
    Config(ConfigArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunArgs {
    /// Scenarios to run, by name
    pub scenarios: Vec<String>,

    /// Run every scenario in the catalog
    #[arg(long, conflicts_with = "scenarios")]
    pub all: bool,

    /// Base URL of the clinic, overriding configuration
    #[arg(long)]
    pub base_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Directory for failure artifacts
    #[arg(long)]
    pub artifacts: Option<PathBuf>,

    /// Skip remaining scenarios after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Directory for the JSON and JUnit reports
    #[arg(long, default_value = "target/clinflow")]
    pub report_dir: PathBuf,

    /// Run against the in-process simulated clinic instead of a browser
    #[arg(long)]
    pub simulate: bool,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: ListFormat,
}

/// Scenario listing format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListFormat {
    /// One scenario per line
    #[default]
    Text,
    /// JSON array
    Json,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Only validate, print nothing on success
    #[arg(long)]
    pub check: bool,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
