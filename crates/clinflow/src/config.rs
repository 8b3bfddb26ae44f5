//! Execution configuration.
//!
//! Resolution order: built-in defaults, then an optional YAML file, then
//! `CLINFLOW_*` environment variables. Callers (the CLI) apply their own
//! overrides last and call [`FlowConfig::validate`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::result::{FlowError, FlowResult};
use crate::wait::{DEFAULT_NAVIGATION_TIMEOUT_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_STEP_TIMEOUT_MS};

/// Environment variable overriding the base URL
pub const ENV_BASE_URL: &str = "CLINFLOW_BASE_URL";
/// Environment variable overriding the username
pub const ENV_USERNAME: &str = "CLINFLOW_USERNAME";
/// Environment variable overriding the password
pub const ENV_PASSWORD: &str = "CLINFLOW_PASSWORD";
/// Environment variable overriding headless mode (`true`/`false`)
pub const ENV_HEADLESS: &str = "CLINFLOW_HEADLESS";

/// Administrative account used for the journeys
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Account name
    pub username: String,
    /// Account secret
    pub password: String,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Copy with the password replaced by a marker, for display
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            username: self.username.clone(),
            password: "********".to_string(),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("admin", "Admin123")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Time budgets, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Default per-step budget
    pub step_ms: u64,
    /// Budget for slow UI transitions (visit start/end)
    pub long_step_ms: u64,
    /// Budget for URL transitions after submit/confirm
    pub navigation_ms: u64,
    /// Default whole-scenario budget
    pub scenario_ms: u64,
    /// Interval between polls
    pub poll_interval_ms: u64,
    /// Fixed delay for a table to re-render after a search
    pub settle_ms: u64,
    /// Window for optional affordances such as confirmation dialogs
    pub optional_probe_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            step_ms: DEFAULT_STEP_TIMEOUT_MS,
            long_step_ms: 30_000,
            navigation_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            scenario_ms: 60_000,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            settle_ms: 1_000,
            optional_probe_ms: 2_000,
        }
    }
}

impl Timeouts {
    /// Compressed budgets for the in-process simulation
    #[must_use]
    pub const fn fast() -> Self {
        Self {
            step_ms: 1_500,
            long_step_ms: 2_000,
            navigation_ms: 2_000,
            scenario_ms: 20_000,
            poll_interval_ms: 10,
            settle_ms: 80,
            optional_probe_ms: 250,
        }
    }

    /// Per-step budget
    #[must_use]
    pub const fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }

    /// Long step budget
    #[must_use]
    pub const fn long_step(&self) -> Duration {
        Duration::from_millis(self.long_step_ms)
    }

    /// Navigation budget
    #[must_use]
    pub const fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    /// Scenario budget
    #[must_use]
    pub const fn scenario(&self) -> Duration {
        Duration::from_millis(self.scenario_ms)
    }

    /// Poll interval
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Settle delay
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Optional-affordance probe window
    #[must_use]
    pub const fn optional_probe(&self) -> Duration {
        Duration::from_millis(self.optional_probe_ms)
    }
}

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a window
    pub headless: bool,
    /// Chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Window width
    pub viewport_width: u32,
    /// Window height
    pub viewport_height: u32,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
            viewport_width: 1280,
            viewport_height: 800,
        }
    }
}

/// When to capture screenshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreenshotPolicy {
    /// Never
    Never,
    /// Only for failed scenarios
    #[default]
    OnFailure,
    /// For every scenario
    Always,
}

/// Failure-artifact settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Output directory
    pub dir: PathBuf,
    /// Screenshot policy
    pub screenshots: ScreenshotPolicy,
    /// Write the step log next to failure screenshots
    pub step_log: bool,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("target/clinflow/artifacts"),
            screenshots: ScreenshotPolicy::OnFailure,
            step_log: true,
        }
    }
}

/// The patient list the journeys ensure and join
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListSettings {
    /// List name
    pub name: String,
    /// List description
    pub description: String,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            name: "Pacientes offline".to_string(),
            description: "Lista de pacientes atendidos en modo offline.".to_string(),
        }
    }
}

/// Complete execution configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Application base address, without trailing slash
    pub base_url: String,
    /// Login account
    pub credentials: Credentials,
    /// Location picked when present
    pub preferred_location: String,
    /// Time budgets
    pub timeouts: Timeouts,
    /// Browser launch settings
    pub browser: BrowserSettings,
    /// Failure artifacts
    pub artifacts: ArtifactSettings,
    /// Patient list fixture
    pub patient_list: ListSettings,
    /// Visit type used by the visit stages
    pub visit_type: String,
    /// Simulated visit duration before ending it
    pub visit_dwell_ms: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost/openmrs".to_string(),
            credentials: Credentials::default(),
            preferred_location: "Outpatient Clinic".to_string(),
            timeouts: Timeouts::default(),
            browser: BrowserSettings::default(),
            artifacts: ArtifactSettings::default(),
            patient_list: ListSettings::default(),
            visit_type: "Offline Visit".to_string(),
            visit_dwell_ms: 10_000,
        }
    }
}

impl FlowConfig {
    /// Defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML; missing keys take defaults
    ///
    /// # Errors
    ///
    /// Returns error on malformed YAML
    pub fn from_yaml_str(yaml: &str) -> FlowResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load a YAML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> FlowResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FlowError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Defaults, then `path` if given, then the environment
    ///
    /// # Errors
    ///
    /// Returns error if the file or an environment value is invalid
    pub fn resolve(path: Option<&Path>) -> FlowResult<Self> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.with_env(|key| std::env::var(key).ok())
    }

    /// Apply `CLINFLOW_*` overrides read through `lookup`
    ///
    /// # Errors
    ///
    /// Returns error if a boolean variable is not `true`/`false`
    pub fn with_env<F>(mut self, lookup: F) -> FlowResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(user) = lookup(ENV_USERNAME) {
            self.credentials.username = user;
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.credentials.password = password;
        }
        if let Some(headless) = lookup(ENV_HEADLESS) {
            self.browser.headless = headless.parse().map_err(|_| {
                FlowError::config(format!("{ENV_HEADLESS} must be true or false, got {headless:?}"))
            })?;
        }
        Ok(self)
    }

    /// Set the base URL (trailing slashes dropped)
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the time budgets
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.browser.headless = headless;
        self
    }

    /// Set the artifacts directory
    #[must_use]
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts.dir = dir.into();
        self
    }

    /// Set the visit dwell
    #[must_use]
    pub const fn with_visit_dwell(mut self, dwell: Duration) -> Self {
        self.visit_dwell_ms = dwell.as_millis() as u64;
        self
    }

    /// Visit dwell as a duration
    #[must_use]
    pub const fn visit_dwell(&self) -> Duration {
        Duration::from_millis(self.visit_dwell_ms)
    }

    /// Check internal consistency
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found
    pub fn validate(&self) -> FlowResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(FlowError::config("base_url must not be empty"));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(FlowError::config(format!(
                "base_url must be http(s), got {:?}",
                self.base_url
            )));
        }
        let t = &self.timeouts;
        let budgets = [
            ("step_ms", t.step_ms),
            ("long_step_ms", t.long_step_ms),
            ("navigation_ms", t.navigation_ms),
            ("scenario_ms", t.scenario_ms),
            ("poll_interval_ms", t.poll_interval_ms),
        ];
        if let Some((name, _)) = budgets.iter().find(|(_, v)| *v == 0) {
            return Err(FlowError::config(format!("timeouts.{name} must be positive")));
        }
        if t.step_ms > t.scenario_ms {
            return Err(FlowError::config(
                "timeouts.step_ms must not exceed timeouts.scenario_ms",
            ));
        }
        if self.patient_list.name.trim().is_empty() {
            return Err(FlowError::config("patient_list.name must not be empty"));
        }
        Ok(())
    }

    /// YAML rendering with the password redacted
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_redacted_yaml(&self) -> FlowResult<String> {
        let mut shown = self.clone();
        shown.credentials = self.credentials.redacted();
        Ok(serde_yaml_ng::to_string(&shown)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    mod defaults_tests {
        use super::*;

        #[test]
        fn test_defaults_validate() {
            let config = FlowConfig::default();
            assert!(config.validate().is_ok());
            assert_eq!(config.base_url, "http://localhost/openmrs");
            assert_eq!(config.timeouts.step(), Duration::from_secs(10));
            assert_eq!(config.preferred_location, "Outpatient Clinic");
        }

        #[test]
        fn test_fast_timeouts_validate() {
            let config = FlowConfig::default().with_timeouts(Timeouts::fast());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_debug_redacts_password() {
            let debug = format!("{:?}", Credentials::default());
            assert!(!debug.contains("Admin123"));
            assert!(debug.contains("admin"));
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let yaml = "base_url: https://emr.example.org/openmrs\ntimeouts:\n  step_ms: 5000\n";
            let config = FlowConfig::from_yaml_str(yaml).unwrap();
            assert_eq!(config.base_url, "https://emr.example.org/openmrs");
            assert_eq!(config.timeouts.step_ms, 5000);
            assert_eq!(config.timeouts.navigation_ms, DEFAULT_NAVIGATION_TIMEOUT_MS);
            assert_eq!(config.visit_type, "Offline Visit");
        }

        #[test]
        fn test_screenshot_policy_kebab_case() {
            let yaml = "artifacts:\n  screenshots: always\n";
            let config = FlowConfig::from_yaml_str(yaml).unwrap();
            assert_eq!(config.artifacts.screenshots, ScreenshotPolicy::Always);
            let yaml = "artifacts:\n  screenshots: on-failure\n";
            let config = FlowConfig::from_yaml_str(yaml).unwrap();
            assert_eq!(config.artifacts.screenshots, ScreenshotPolicy::OnFailure);
        }

        #[test]
        fn test_load_from_file() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("clinflow.yaml");
            std::fs::write(&path, "preferred_location: Pharmacy\n").unwrap();
            let config = FlowConfig::load(&path).unwrap();
            assert_eq!(config.preferred_location, "Pharmacy");
        }

        #[test]
        fn test_missing_file_is_config_error() {
            let result = FlowConfig::load(Path::new("/nonexistent/clinflow.yaml"));
            assert!(matches!(result, Err(FlowError::Config { .. })));
        }

        #[test]
        fn test_redacted_yaml_hides_password() {
            let yaml = FlowConfig::default().to_redacted_yaml().unwrap();
            assert!(!yaml.contains("Admin123"));
            assert!(yaml.contains("********"));
        }
    }

    mod env_tests {
        use super::*;

        fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
            let map: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
            move |key| map.get(key).cloned()
        }

        #[test]
        fn test_env_overrides() {
            let config = FlowConfig::default()
                .with_env(env(&[
                    (ENV_BASE_URL, "http://qa.local/openmrs"),
                    (ENV_PASSWORD, "s3cret"),
                    (ENV_HEADLESS, "false"),
                ]))
                .unwrap();
            assert_eq!(config.base_url, "http://qa.local/openmrs");
            assert_eq!(config.credentials.password, "s3cret");
            assert_eq!(config.credentials.username, "admin");
            assert!(!config.browser.headless);
        }

        #[test]
        fn test_bad_headless_value() {
            let result = FlowConfig::default().with_env(env(&[(ENV_HEADLESS, "maybe")]));
            assert!(matches!(result, Err(FlowError::Config { .. })));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_rejects_empty_base_url() {
            let config = FlowConfig::default().with_base_url("");
            assert!(config.validate().is_err());
        }

        #[test]
        fn test_rejects_zero_timeout() {
            let mut config = FlowConfig::default();
            config.timeouts.poll_interval_ms = 0;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("poll_interval_ms"));
        }

        #[test]
        fn test_step_must_fit_in_scenario() {
            let mut config = FlowConfig::default();
            config.timeouts.step_ms = config.timeouts.scenario_ms + 1;
            assert!(config.validate().is_err());
        }

        #[test]
        fn test_base_url_trailing_slash_trimmed() {
            let config = FlowConfig::default().with_base_url("http://host/openmrs/");
            assert_eq!(config.base_url, "http://host/openmrs");
        }
    }
}
