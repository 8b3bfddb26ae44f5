//! Clinflow CLI: run end-to-end clinical UI journeys
//!
//! ## Usage
//!
//! ```bash
//! clinflow list                               # Show the scenario catalog
//! clinflow run bootstrap ensure-list          # Run scenarios in Chromium
//! clinflow run --all --simulate               # Run everything in-process
//! clinflow config --config clinflow.yaml      # Print effective configuration
//! ```

use clap::Parser;
use clinflow::{FlowConfig, Scenario};
use clinflow_cli::{
    logging, runner, Cli, CliConfig, CliError, CliResult, ColorChoice, Commands, ConfigArgs,
    ListArgs, ListFormat, RunArgs, Verbosity,
};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = build_config(&cli);
    logging::init(&config)?;

    let path = cli.config.as_deref();
    match &cli.command {
        Commands::Run(args) => run_scenarios(&config, path, args),
        Commands::List(args) => run_list(args),
        Commands::Config(args) => run_config(path, args),
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(ColorChoice::from(cli.color))
        .with_log_json(cli.log_json)
}

fn run_scenarios(config: &CliConfig, path: Option<&Path>, args: &RunArgs) -> CliResult<()> {
    let scenarios = runner::select_scenarios(&args.scenarios, args.all)?;
    let flow = runner::flow_config(path, args)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let written = runtime.block_on(runner::execute(config, flow, &scenarios, args))?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_list(args: &ListArgs) -> CliResult<()> {
    let catalog = Scenario::catalog();
    match args.format {
        ListFormat::Text => {
            let width = catalog.iter().map(|s| s.name().len()).max().unwrap_or(0);
            for scenario in &catalog {
                println!("{:<width$}  {}", scenario.name(), scenario.description());
            }
        }
        ListFormat::Json => {
            let entries: Vec<_> = catalog
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "name": s.name(),
                        "description": s.description(),
                        "stages": s.stages(),
                    })
                })
                .collect();
            let rendered = serde_json::to_string_pretty(&entries)
                .map_err(|e| CliError::invalid_argument(e.to_string()))?;
            println!("{rendered}");
        }
    }
    Ok(())
}

fn run_config(path: Option<&Path>, args: &ConfigArgs) -> CliResult<()> {
    let flow = FlowConfig::resolve(path)?;
    flow.validate()?;
    if !args.check {
        print!("{}", flow.to_redacted_yaml()?);
    }
    Ok(())
}
