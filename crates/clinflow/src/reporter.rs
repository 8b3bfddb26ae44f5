//! Run reports.
//!
//! Collects one [`ScenarioReport`] per scenario and renders them as JSON
//! and as JUnit XML for CI.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::result::FlowResult;
use crate::scenario::Stage;

/// JSON report file name
pub const JSON_REPORT: &str = "clinflow-report.json";

/// JUnit report file name
pub const JUNIT_REPORT: &str = "clinflow-junit.xml";

/// Scenario outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    /// All stages passed
    Passed,
    /// A stage failed
    Failed,
    /// Not run (fail-fast)
    Skipped,
}

/// Outcome of one scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name
    pub name: String,
    /// Outcome
    pub status: ScenarioStatus,
    /// Wall-clock duration
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// Stage that failed
    pub failed_stage: Option<Stage>,
    /// Error message
    pub error: Option<String>,
    /// Failure artifacts written
    pub artifacts: Vec<PathBuf>,
}

impl ScenarioReport {
    /// Passed scenario
    #[must_use]
    pub fn passed(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            status: ScenarioStatus::Passed,
            duration,
            failed_stage: None,
            error: None,
            artifacts: Vec::new(),
        }
    }

    /// Failed scenario
    #[must_use]
    pub fn failed(
        name: impl Into<String>,
        duration: Duration,
        stage: Option<Stage>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            status: ScenarioStatus::Failed,
            duration,
            failed_stage: stage,
            error: Some(error.into()),
            artifacts: Vec::new(),
        }
    }

    /// Skipped scenario
    #[must_use]
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ScenarioStatus::Skipped,
            duration: Duration::ZERO,
            failed_stage: None,
            error: None,
            artifacts: Vec::new(),
        }
    }

    /// Attach artifact paths
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Vec<PathBuf>) -> Self {
        self.artifacts = artifacts;
        self
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Collected results of a run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reporter {
    suite_name: String,
    scenarios: Vec<ScenarioReport>,
}

impl Reporter {
    /// Create a reporter
    #[must_use]
    pub fn new(suite_name: impl Into<String>) -> Self {
        Self {
            suite_name: suite_name.into(),
            scenarios: Vec::new(),
        }
    }

    /// Add a scenario outcome
    pub fn add(&mut self, report: ScenarioReport) {
        self.scenarios.push(report);
    }

    /// All outcomes, in run order
    #[must_use]
    pub fn scenarios(&self) -> &[ScenarioReport] {
        &self.scenarios
    }

    fn count(&self, status: ScenarioStatus) -> usize {
        self.scenarios.iter().filter(|s| s.status == status).count()
    }

    /// Passed count
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(ScenarioStatus::Passed)
    }

    /// Failed count
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.count(ScenarioStatus::Failed)
    }

    /// Skipped count
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(ScenarioStatus::Skipped)
    }

    /// True when nothing failed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Sum of scenario durations
    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.scenarios.iter().map(|s| s.duration).sum()
    }

    /// JSON rendering
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn render_json(&self) -> FlowResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JUnit XML rendering
    #[must_use]
    pub fn render_junit(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            xml,
            r#"<testsuite name="{}" tests="{}" failures="{}" skipped="{}" time="{:.3}">"#,
            escape_xml(&self.suite_name),
            self.scenarios.len(),
            self.failed_count(),
            self.skipped_count(),
            self.total_duration().as_secs_f64()
        );
        for scenario in &self.scenarios {
            let _ = writeln!(
                xml,
                r#"  <testcase name="{}" classname="{}" time="{:.3}">"#,
                escape_xml(&scenario.name),
                escape_xml(&self.suite_name),
                scenario.duration.as_secs_f64()
            );
            match scenario.status {
                ScenarioStatus::Failed => {
                    let message = scenario.error.as_deref().unwrap_or("failed");
                    let stage = scenario
                        .failed_stage
                        .map_or_else(String::new, |s| format!(" type=\"{s}\""));
                    let _ = writeln!(
                        xml,
                        r#"    <failure message="{}"{stage}>{}</failure>"#,
                        escape_xml(message),
                        escape_xml(message)
                    );
                }
                ScenarioStatus::Skipped => xml.push_str("    <skipped/>\n"),
                ScenarioStatus::Passed => {}
            }
            for artifact in &scenario.artifacts {
                let _ = writeln!(
                    xml,
                    "    <system-out>[[ATTACHMENT|{}]]</system-out>",
                    escape_xml(&artifact.display().to_string())
                );
            }
            xml.push_str("  </testcase>\n");
        }
        xml.push_str("</testsuite>\n");
        xml
    }

    /// Write both reports into `dir`, returning their paths
    ///
    /// # Errors
    ///
    /// Returns error if the directory or files cannot be written
    pub fn write_reports(&self, dir: &Path) -> FlowResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let json = dir.join(JSON_REPORT);
        std::fs::write(&json, self.render_json()?)?;
        let junit = dir.join(JUNIT_REPORT);
        std::fs::write(&junit, self.render_junit())?;
        Ok(vec![json, junit])
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Reporter {
        let mut reporter = Reporter::new("clinflow");
        reporter.add(ScenarioReport::passed("bootstrap", Duration::from_millis(1200)));
        reporter.add(
            ScenarioReport::failed(
                "ensure-list",
                Duration::from_millis(800),
                Some(Stage::EnsureList),
                "Overlay 'text=\"New patient list\"' still visible after 10000ms",
            )
            .with_artifacts(vec![PathBuf::from("artifacts/ensure-list/screenshot.png")]),
        );
        reporter.add(ScenarioReport::skipped("full-journey"));
        reporter
    }

    mod count_tests {
        use super::*;

        #[test]
        fn test_counts() {
            let r = sample();
            assert_eq!(r.passed_count(), 1);
            assert_eq!(r.failed_count(), 1);
            assert_eq!(r.skipped_count(), 1);
            assert!(!r.all_passed());
            assert_eq!(r.total_duration(), Duration::from_millis(2000));
        }

        #[test]
        fn test_empty_reporter_passes() {
            assert!(Reporter::new("x").all_passed());
        }
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_junit_escapes_and_marks_stage() {
            let xml = sample().render_junit();
            assert!(xml.contains(r#"tests="3" failures="1" skipped="1""#));
            assert!(xml.contains(r#"type="ensure-list""#));
            assert!(xml.contains("&quot;New patient list&quot;"));
            assert!(xml.contains("<skipped/>"));
            assert!(xml.contains("[[ATTACHMENT|artifacts/ensure-list/screenshot.png]]"));
        }

        #[test]
        fn test_json_shape() {
            let json = sample().render_json().unwrap();
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["scenarios"][0]["status"], "passed");
            assert_eq!(value["scenarios"][0]["duration"], 1200);
            assert_eq!(value["scenarios"][1]["failed_stage"], "ensure-list");
        }

        #[test]
        fn test_write_reports() {
            let dir = tempfile::tempdir().unwrap();
            let paths = sample().write_reports(dir.path()).unwrap();
            assert_eq!(paths.len(), 2);
            assert!(paths.iter().all(|p| p.exists()));
        }

        #[test]
        fn test_escape_xml() {
            assert_eq!(escape_xml("<a & 'b'>"), "&lt;a &amp; &apos;b&apos;&gt;");
        }
    }
}
