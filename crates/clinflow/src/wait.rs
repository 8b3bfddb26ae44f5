//! Wait mechanisms
//!
//! Bounded polling for a surface that renders asynchronously. Nothing here
//! touches the surface; [`crate::Page`] drives a [`Poller`] and decides what
//! each tick checks.

use regex::Regex;
use std::fmt;
use std::time::{Duration, Instant};

use crate::driver::ElementSnapshot;
use crate::result::{FlowError, FlowResult};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default per-step timeout (10 seconds)
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 10_000;

/// Default navigation wait (60 seconds)
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 60_000;

/// Default polling interval (100ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

// =============================================================================
// CONDITIONS
// =============================================================================

/// State an element must reach before a primitive proceeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Present in the document, any visibility
    Attached,
    /// Present and visible
    Visible,
    /// Present, visible and enabled
    Actionable,
    /// Present and enabled, any visibility
    Enabled,
    /// Present and checked
    Checked,
}

impl Condition {
    /// Test a snapshot
    #[must_use]
    pub fn holds(&self, element: &ElementSnapshot) -> bool {
        match self {
            Self::Attached => true,
            Self::Visible => element.visible,
            Self::Actionable => element.is_actionable(),
            Self::Enabled => element.enabled,
            Self::Checked => element.is_checked(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Attached => "attached",
            Self::Visible => "visible",
            Self::Actionable => "visible and enabled",
            Self::Enabled => "enabled",
            Self::Checked => "checked",
        };
        f.write_str(name)
    }
}

/// Outcome of probing for an optional affordance.
///
/// A plain boolean would fold "never rendered" and "rendered but never
/// became visible" together; the second is often a genuine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// A visible match was observed within the window
    Present,
    /// Nothing matched for the whole window
    Absent,
    /// Matches existed but never became visible
    Undetermined,
}

impl Presence {
    /// Definitely present
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }
}

// =============================================================================
// URL PATTERNS
// =============================================================================

/// Expected shape of the current URL
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// URL must match
    Matches(Regex),
    /// URL must not match
    NotMatches(Regex),
}

impl UrlPattern {
    /// URL must match `pattern`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern does not compile
    pub fn matching(pattern: &str) -> FlowResult<Self> {
        compile(pattern).map(Self::Matches)
    }

    /// URL must not match `pattern`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the pattern does not compile
    pub fn not_matching(pattern: &str) -> FlowResult<Self> {
        compile(pattern).map(Self::NotMatches)
    }

    /// Test a URL
    #[must_use]
    pub fn test(&self, url: &str) -> bool {
        match self {
            Self::Matches(re) => re.is_match(url),
            Self::NotMatches(re) => !re.is_match(url),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matches(re) => write!(f, "URL matching /{}/", re.as_str()),
            Self::NotMatches(re) => write!(f, "URL not matching /{}/", re.as_str()),
        }
    }
}

fn compile(pattern: &str) -> FlowResult<Regex> {
    Regex::new(pattern).map_err(|e| FlowError::config(format!("invalid URL pattern: {e}")))
}

// =============================================================================
// POLLER
// =============================================================================

/// Bounded poll loop.
///
/// ```ignore
/// let mut poller = Poller::new(timeout, interval);
/// loop {
///     if check().await? { return Ok(()); }
///     if !poller.tick().await { return Err(timeout_error); }
/// }
/// ```
///
/// The check always runs at least once and once more after the final
/// sleep, so a condition that becomes true right at the deadline is seen.
#[derive(Debug)]
pub struct Poller {
    start: Instant,
    timeout: Duration,
    interval: Duration,
    attempts: u32,
}

impl Poller {
    /// Create a poller
    #[must_use]
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            start: Instant::now(),
            timeout,
            interval: interval.max(Duration::from_millis(1)),
            attempts: 1,
        }
    }

    /// Sleep until the next attempt. Returns `false` once the budget is
    /// spent.
    pub async fn tick(&mut self) -> bool {
        let elapsed = self.start.elapsed();
        if elapsed >= self.timeout {
            return false;
        }
        let remaining = self.timeout - elapsed;
        tokio::time::sleep(self.interval.min(remaining)).await;
        self.attempts += 1;
        true
    }

    /// Time since the poller started
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Number of checks performed so far
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Budget in milliseconds
    #[must_use]
    pub fn budget_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod condition_tests {
        use super::*;

        #[test]
        fn test_checked_ignores_visibility() {
            let radio = ElementSnapshot {
                visible: false,
                checked: Some(true),
                ..ElementSnapshot::default()
            };
            assert!(Condition::Checked.holds(&radio));
            assert!(!Condition::Visible.holds(&radio));
            assert!(Condition::Attached.holds(&radio));
        }

        #[test]
        fn test_enabled_ignores_visibility() {
            let button = ElementSnapshot {
                visible: false,
                enabled: true,
                ..ElementSnapshot::default()
            };
            assert!(Condition::Enabled.holds(&button));
            assert!(!Condition::Actionable.holds(&button));
        }
    }

    mod url_pattern_tests {
        use super::*;

        #[test]
        fn test_chart_url() {
            let p = UrlPattern::matching(r"/spa/patient/[^/]+/chart").unwrap();
            assert!(p.test("http://localhost/openmrs/spa/patient/8c1f-42/chart"));
            assert!(!p.test("http://localhost/openmrs/spa/patient-registration"));
        }

        #[test]
        fn test_not_login() {
            let p = UrlPattern::not_matching(r"/login\.htm$").unwrap();
            assert!(!p.test("http://localhost/openmrs/login.htm"));
            assert!(p.test("http://localhost/openmrs/index.htm"));
            assert!(p.to_string().contains("not matching"));
        }
    }

    mod poller_tests {
        use super::*;

        #[tokio::test]
        async fn test_poller_expires() {
            let mut poller = Poller::new(Duration::from_millis(30), Duration::from_millis(10));
            let mut ticks = 0;
            while poller.tick().await {
                ticks += 1;
                assert!(ticks < 100, "poller never expired");
            }
            assert!(poller.elapsed() >= Duration::from_millis(30));
            assert!(poller.attempts() >= 2);
        }

        #[tokio::test]
        async fn test_zero_budget_allows_single_check() {
            let mut poller = Poller::new(Duration::ZERO, Duration::from_millis(10));
            assert_eq!(poller.attempts(), 1);
            assert!(!poller.tick().await);
        }
    }
}
