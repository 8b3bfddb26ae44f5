//! Scenario selection and execution for the `run` command

use clinflow::mock::{ClinicOptions, SimulatedClinicFactory, SIMULATED_BASE_URL};
use clinflow::{FlowConfig, Reporter, Scenario, ScenarioRunner, SurfaceFactory};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::commands::RunArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;

/// Resolve scenario names against the catalog
///
/// # Errors
///
/// Returns an invalid-argument error for an unknown name or an empty
/// selection
pub fn select_scenarios(names: &[String], all: bool) -> CliResult<Vec<Scenario>> {
    if all {
        return Ok(Scenario::catalog());
    }
    if names.is_empty() {
        return Err(CliError::invalid_argument(
            "name at least one scenario or pass --all (see `clinflow list`)",
        ));
    }
    names
        .iter()
        .map(|name| {
            Scenario::by_name(name).ok_or_else(|| {
                CliError::invalid_argument(format!("unknown scenario '{name}'"))
            })
        })
        .collect()
}

/// Effective configuration: file, environment, then command-line flags
///
/// # Errors
///
/// Returns error if the configuration cannot be loaded or is invalid
pub fn flow_config(path: Option<&Path>, args: &RunArgs) -> CliResult<FlowConfig> {
    let mut config = FlowConfig::resolve(path)?;
    if let Some(url) = &args.base_url {
        config = config.with_base_url(url.clone());
    }
    if args.simulate {
        config = config.with_base_url(SIMULATED_BASE_URL);
    }
    if args.headed {
        config = config.with_headless(false);
    }
    if let Some(dir) = &args.artifacts {
        config = config.with_artifacts_dir(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn run_with<F: SurfaceFactory>(
    factory: F,
    config: FlowConfig,
    scenarios: &[Scenario],
    fail_fast: bool,
    progress: &mut ProgressReporter,
) -> Reporter {
    let runner = ScenarioRunner::new(factory, config).fail_fast(fail_fast);
    runner.run_all(scenarios, progress).await
}

#[cfg(feature = "browser")]
async fn run_in_browser(
    config: FlowConfig,
    scenarios: &[Scenario],
    fail_fast: bool,
    progress: &mut ProgressReporter,
) -> CliResult<Reporter> {
    let factory = clinflow::browser::ChromiumFactory::new(config.browser.clone());
    Ok(run_with(factory, config, scenarios, fail_fast, progress).await)
}

#[cfg(not(feature = "browser"))]
#[allow(clippy::unused_async)]
async fn run_in_browser(
    _config: FlowConfig,
    _scenarios: &[Scenario],
    _fail_fast: bool,
    _progress: &mut ProgressReporter,
) -> CliResult<Reporter> {
    Err(CliError::config(
        "browser support not compiled in; rebuild with --features browser or pass --simulate",
    ))
}

/// Run the selected scenarios and write reports to `args.report_dir`.
/// Returns the report paths.
///
/// # Errors
///
/// Returns [`CliError::ScenariosFailed`] if any scenario failed
pub async fn execute(
    cli: &CliConfig,
    config: FlowConfig,
    scenarios: &[Scenario],
    args: &RunArgs,
) -> CliResult<Vec<PathBuf>> {
    let mut progress = ProgressReporter::new(cli.color.should_color(), cli.verbosity.is_quiet());
    progress.info(&format!(
        "running {} scenario(s) against {}",
        scenarios.len(),
        config.base_url
    ));
    progress.start_progress(scenarios.len() as u64, "starting");

    let reporter = if args.simulate {
        let factory = SimulatedClinicFactory::new(ClinicOptions::default());
        run_with(factory, config, scenarios, args.fail_fast, &mut progress).await
    } else {
        run_in_browser(config, scenarios, args.fail_fast, &mut progress).await?
    };
    progress.finish();

    let written = reporter.write_reports(&args.report_dir)?;
    for path in &written {
        info!(path = %path.display(), "report written");
    }
    progress.summary(&reporter);

    if reporter.all_passed() {
        Ok(written)
    } else {
        Err(CliError::ScenariosFailed {
            failed: reporter.failed_count(),
            total: scenarios.len(),
        })
    }
}
