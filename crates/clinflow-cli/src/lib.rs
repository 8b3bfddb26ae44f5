//! Clinflow CLI library
//!
//! Command-line interface for running clinical UI journeys.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod commands;
mod config;
mod error;
pub mod logging;
mod output;
pub mod runner;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, ListArgs, ListFormat, RunArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::ProgressReporter;
