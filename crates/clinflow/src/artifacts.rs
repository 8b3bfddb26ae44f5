//! Failure artifacts: screenshot, final URL and step log per scenario.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::{ArtifactSettings, ScreenshotPolicy};
use crate::driver::Surface;
use crate::page::Page;
use crate::result::FlowResult;

/// Screenshot file name
pub const SCREENSHOT_FILE: &str = "screenshot.png";

/// Context file name
pub const CONTEXT_FILE: &str = "context.json";

#[derive(Debug, Serialize)]
struct FailureContext<'a> {
    scenario: &'a str,
    url: Option<String>,
    error: Option<&'a str>,
    steps: Vec<String>,
}

/// Directory for one scenario's artifacts
#[must_use]
pub fn scenario_dir(root: &Path, scenario: &str) -> PathBuf {
    let safe: String = scenario
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    root.join(safe)
}

/// Whether anything should be captured for this outcome
#[must_use]
pub const fn should_capture(settings: &ArtifactSettings, failed: bool) -> bool {
    match settings.screenshots {
        ScreenshotPolicy::Always => true,
        ScreenshotPolicy::OnFailure => failed,
        ScreenshotPolicy::Never => failed && settings.step_log,
    }
}

/// Capture what the settings ask for. A surface that cannot screenshot
/// does not fail the capture.
///
/// # Errors
///
/// Returns error if the artifact files cannot be written
pub async fn capture<S: Surface>(
    page: &Page<S>,
    settings: &ArtifactSettings,
    scenario: &str,
    error: Option<&str>,
) -> FlowResult<Vec<PathBuf>> {
    let failed = error.is_some();
    if !should_capture(settings, failed) {
        return Ok(Vec::new());
    }
    let dir = scenario_dir(&settings.dir, scenario);
    tokio::fs::create_dir_all(&dir).await?;
    let mut written = Vec::new();

    if settings.screenshots != ScreenshotPolicy::Never {
        match page.screenshot().await {
            Ok(png) if !png.is_empty() => {
                let path = dir.join(SCREENSHOT_FILE);
                tokio::fs::write(&path, png).await?;
                written.push(path);
            }
            Ok(_) => {}
            Err(e) => warn!(scenario, error = %e, "screenshot failed"),
        }
    }

    if settings.step_log || failed {
        let context = FailureContext {
            scenario,
            url: page.current_url().await.ok(),
            error,
            steps: if settings.step_log { page.step_log() } else { Vec::new() },
        };
        let path = dir.join(CONTEXT_FILE);
        tokio::fs::write(&path, serde_json::to_vec_pretty(&context)?).await?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use crate::mock::{ClinicOptions, SimulatedClinic};

    fn settings(dir: &Path, screenshots: ScreenshotPolicy) -> ArtifactSettings {
        ArtifactSettings {
            dir: dir.to_path_buf(),
            screenshots,
            step_log: true,
        }
    }

    #[test]
    fn test_scenario_dir_sanitized() {
        let dir = scenario_dir(Path::new("/tmp/a"), "full journey/1");
        assert_eq!(dir, PathBuf::from("/tmp/a/full_journey_1"));
    }

    #[test]
    fn test_policy() {
        let dir = Path::new("x");
        assert!(!should_capture(&settings(dir, ScreenshotPolicy::OnFailure), false));
        assert!(should_capture(&settings(dir, ScreenshotPolicy::OnFailure), true));
        assert!(should_capture(&settings(dir, ScreenshotPolicy::Always), false));
        assert!(should_capture(&settings(dir, ScreenshotPolicy::Never), true));
    }

    #[tokio::test]
    async fn test_capture_on_failure_writes_files() {
        let tmp = tempfile::tempdir().unwrap();
        let clinic = SimulatedClinic::new(ClinicOptions::default());
        let base = clinic.base_url().to_string();
        let mut page = Page::new(clinic, base, Timeouts::fast());
        page.goto("/login.htm").await.unwrap();

        let written = capture(
            &page,
            &settings(tmp.path(), ScreenshotPolicy::OnFailure),
            "bootstrap",
            Some("boom"),
        )
        .await
        .unwrap();
        assert_eq!(written.len(), 2);
        let context = std::fs::read_to_string(tmp.path().join("bootstrap").join(CONTEXT_FILE)).unwrap();
        assert!(context.contains("login.htm"));
        assert!(context.contains("boom"));
    }

    #[tokio::test]
    async fn test_no_capture_on_pass() {
        let tmp = tempfile::tempdir().unwrap();
        let clinic = SimulatedClinic::new(ClinicOptions::default());
        let base = clinic.base_url().to_string();
        let page = Page::new(clinic, base, Timeouts::fast());
        let written = capture(&page, &settings(tmp.path(), ScreenshotPolicy::OnFailure), "ok", None)
            .await
            .unwrap();
        assert!(written.is_empty());
    }
}
