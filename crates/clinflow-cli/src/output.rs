//! Output formatting and progress reporting

use clinflow::{Reporter, RunObserver, Scenario, ScenarioReport, ScenarioStatus};
use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for scenario execution
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Option<ProgressBar>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: None,
            use_color,
            quiet,
        }
    }

    /// Start a progress bar over `total` scenarios
    pub fn start_progress(&mut self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        self.progress_bar = Some(pb);
    }

    /// Finish progress bar
    pub fn finish(&self) {
        if let Some(ref pb) = self.progress_bar {
            pb.finish_and_clear();
        }
    }

    fn line(&self, prefix: &str, message: &str) {
        let text = format!("{prefix} {message}");
        match self.progress_bar {
            Some(ref pb) => pb.suspend(|| {
                let _ = self.term.write_line(&text);
            }),
            None => {
                let _ = self.term.write_line(&text);
            }
        }
    }

    fn prefix(&self, glyph: &str, plain: &str, paint: fn(&str) -> String) -> String {
        if self.use_color {
            paint(glyph)
        } else {
            plain.to_string()
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("✓", "PASS", |g| style(g).green().bold().to_string());
        self.line(&prefix, message);
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        let prefix = self.prefix("✗", "FAIL", |g| style(g).red().bold().to_string());
        self.line(&prefix, message);
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("⚠", "SKIP", |g| style(g).yellow().bold().to_string());
        self.line(&prefix, message);
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = self.prefix("ℹ", "INFO", |g| style(g).blue().bold().to_string());
        self.line(&prefix, message);
    }

    /// Print run summary
    pub fn summary(&self, reporter: &Reporter) {
        let failed = reporter.failed_count();
        if self.quiet && failed == 0 {
            return;
        }
        let passed = reporter.passed_count();
        let skipped = reporter.skipped_count();
        let total = reporter.scenarios().len();
        let secs = reporter.total_duration().as_secs_f64();

        let _ = self.term.write_line("");
        if self.use_color {
            let passed_style = Style::new().green().bold();
            let failed_style = Style::new().red().bold();
            let status = if failed > 0 {
                failed_style.apply_to("FAILED")
            } else {
                passed_style.apply_to("PASSED")
            };
            let _ = self.term.write_line(&format!(
                "{status} {total} scenario(s) in {secs:.2}s ({} passed, {} failed, {} skipped)",
                passed_style.apply_to(passed),
                failed_style.apply_to(failed),
                Style::new().yellow().apply_to(skipped),
            ));
        } else {
            let status = if failed > 0 { "FAILED" } else { "PASSED" };
            let _ = self.term.write_line(&format!(
                "{status} {total} scenario(s) in {secs:.2}s ({passed} passed, {failed} failed, {skipped} skipped)"
            ));
        }
    }
}

fn seconds(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

impl RunObserver for ProgressReporter {
    fn started(&mut self, scenario: &Scenario) {
        if let Some(ref pb) = self.progress_bar {
            pb.set_message(scenario.name().to_string());
        }
    }

    fn finished(&mut self, report: &ScenarioReport) {
        match report.status {
            ScenarioStatus::Passed => {
                self.success(&format!("{} ({})", report.name, seconds(report.duration)));
            }
            ScenarioStatus::Failed => {
                let stage = report
                    .failed_stage
                    .map(|s| format!(" at {s}"))
                    .unwrap_or_default();
                self.failure(&format!(
                    "{}{stage}: {}",
                    report.name,
                    report.error.as_deref().unwrap_or("unknown error")
                ));
                for path in &report.artifacts {
                    self.info(&format!("artifact {}", path.display()));
                }
            }
            ScenarioStatus::Skipped => self.warning(&format!("{} skipped", report.name)),
        }
        if let Some(ref pb) = self.progress_bar {
            pb.inc(1);
        }
    }
}
