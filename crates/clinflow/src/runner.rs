//! Sequential scenario runner.
//!
//! Each scenario gets a fresh surface from the factory, a fresh session and
//! its own budget. Surfaces are closed whatever the outcome.

use std::time::Instant;
use tracing::{error, info, warn};

use crate::artifacts;
use crate::config::FlowConfig;
use crate::driver::{Surface, SurfaceFactory};
use crate::page::Page;
use crate::reporter::{Reporter, ScenarioReport};
use crate::scenario::Scenario;
use crate::session::Session;

/// Callbacks for progress display
pub trait RunObserver {
    /// A scenario is about to start
    fn started(&mut self, _scenario: &Scenario) {}

    /// A scenario finished (passed, failed or skipped)
    fn finished(&mut self, _report: &ScenarioReport) {}
}

/// Observer that does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl RunObserver for Silent {}

/// Runs scenarios one after another
#[derive(Debug)]
pub struct ScenarioRunner<F: SurfaceFactory> {
    factory: F,
    config: FlowConfig,
    fail_fast: bool,
}

impl<F: SurfaceFactory> ScenarioRunner<F> {
    /// Create a runner
    #[must_use]
    pub const fn new(factory: F, config: FlowConfig) -> Self {
        Self {
            factory,
            config,
            fail_fast: false,
        }
    }

    /// Skip remaining scenarios after the first failure
    #[must_use]
    pub const fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Run `scenarios` in order
    pub async fn run_all(&self, scenarios: &[Scenario], observer: &mut dyn RunObserver) -> Reporter {
        let mut reporter = Reporter::new("clinflow");
        let mut stop = false;
        for scenario in scenarios {
            let report = if stop {
                ScenarioReport::skipped(scenario.name())
            } else {
                observer.started(scenario);
                self.run_one(scenario).await
            };
            stop |= self.fail_fast && report.error.is_some();
            observer.finished(&report);
            reporter.add(report);
        }
        reporter
    }

    /// Run a single scenario on a fresh surface
    pub async fn run_one(&self, scenario: &Scenario) -> ScenarioReport {
        let started = Instant::now();
        let surface = match self.factory.open().await {
            Ok(surface) => surface,
            Err(e) => {
                error!(scenario = scenario.name(), error = %e, "could not open surface");
                return ScenarioReport::failed(scenario.name(), started.elapsed(), None, e.to_string());
            }
        };
        let page = Page::new(surface, self.config.base_url.clone(), self.config.timeouts);
        let mut session = Session::new(page);

        let outcome = scenario.run(&mut session, &self.config).await;
        let duration = started.elapsed();
        let (report, message) = match &outcome {
            Ok(_) => (ScenarioReport::passed(scenario.name(), duration), None),
            Err(e) => {
                error!(scenario = scenario.name(), stage = ?e.stage(), error = %e, "scenario failed");
                (
                    ScenarioReport::failed(scenario.name(), duration, e.stage(), e.to_string()),
                    Some(e.to_string()),
                )
            }
        };

        let written = match artifacts::capture(
            session.page(),
            &self.config.artifacts,
            scenario.name(),
            message.as_deref(),
        )
        .await
        {
            Ok(paths) => paths,
            Err(e) => {
                warn!(scenario = scenario.name(), error = %e, "could not write artifacts");
                Vec::new()
            }
        };

        let mut page = session.into_page();
        if let Err(e) = page.close().await {
            warn!(scenario = scenario.name(), error = %e, "could not close surface");
        }
        if outcome.is_ok() {
            info!(scenario = scenario.name(), "scenario passed");
        }
        report.with_artifacts(written)
    }
}

/// Open a surface from `factory` and close it again. Useful to fail early
/// when no browser is available.
///
/// # Errors
///
/// Returns the factory or close error
pub async fn smoke_check<F: SurfaceFactory>(factory: &F) -> crate::FlowResult<()> {
    let mut surface = factory.open().await?;
    surface.close().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use crate::mock::{ClinicOptions, SimulatedClinicFactory};
    use crate::reporter::ScenarioStatus;
    use crate::scenario::Stage;

    fn config(dir: &std::path::Path) -> FlowConfig {
        FlowConfig::default()
            .with_base_url(crate::mock::SIMULATED_BASE_URL)
            .with_timeouts(Timeouts::fast())
            .with_artifacts_dir(dir)
    }

    #[derive(Default)]
    struct Recorder {
        started: Vec<String>,
        finished: Vec<ScenarioStatus>,
    }

    impl RunObserver for Recorder {
        fn started(&mut self, scenario: &Scenario) {
            self.started.push(scenario.name().to_string());
        }

        fn finished(&mut self, report: &ScenarioReport) {
            self.finished.push(report.status);
        }
    }

    #[tokio::test]
    async fn test_run_bootstrap_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = ScenarioRunner::new(
            SimulatedClinicFactory::new(ClinicOptions::default()),
            config(tmp.path()),
        );
        let scenarios = vec![Scenario::by_name("bootstrap").unwrap()];
        let reporter = runner.run_all(&scenarios, &mut Silent).await;
        assert!(reporter.all_passed());
        assert!(reporter.scenarios()[0].artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_fail_fast_skips_rest() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config(tmp.path());
        cfg.credentials.password = "wrong".to_string();
        let runner = ScenarioRunner::new(SimulatedClinicFactory::new(ClinicOptions::default()), cfg)
            .fail_fast(true);
        let scenarios = vec![
            Scenario::by_name("bootstrap").unwrap(),
            Scenario::by_name("ensure-list").unwrap(),
        ];
        let mut recorder = Recorder::default();
        let reporter = runner.run_all(&scenarios, &mut recorder).await;

        assert_eq!(recorder.started, vec!["bootstrap".to_string()]);
        assert_eq!(
            recorder.finished,
            vec![ScenarioStatus::Failed, ScenarioStatus::Skipped]
        );
        let failed = &reporter.scenarios()[0];
        assert_eq!(failed.failed_stage, Some(Stage::Bootstrap));
        assert!(!failed.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_smoke_check() {
        smoke_check(&SimulatedClinicFactory::new(ClinicOptions::default()))
            .await
            .unwrap();
    }
}
