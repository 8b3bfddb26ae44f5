//! Action primitives.
//!
//! [`Page`] owns one [`Surface`] and turns its one-shot queries into bounded,
//! polled operations. Every primitive re-resolves its [`Locator`] on each
//! poll; nothing caches element handles across renders.
//!
//! Failure shape is uniform:
//!
//! - nothing ever matched the locator: [`FlowError::NotFound`]
//! - something matched but never reached the required state:
//!   [`FlowError::Timeout`]
//!
//! Each timeout is capped by the time left before the page deadline (the
//! scenario budget), so one slow step cannot consume the whole scenario.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::Timeouts;
use crate::driver::{ElementSnapshot, Surface};
use crate::locator::{Locator, Position, TextMatch};
use crate::result::{FlowError, FlowResult};
use crate::wait::{Condition, Poller, Presence, UrlPattern};

/// Upper bound on retained step-log lines
const STEP_LOG_CAPACITY: usize = 500;

/// Primitive operations over a target surface
#[derive(Debug)]
pub struct Page<S: Surface> {
    surface: S,
    base_url: String,
    timeouts: Timeouts,
    deadline: Option<Instant>,
    steps: VecDeque<String>,
}

impl<S: Surface> Page<S> {
    /// Wrap a surface. `base_url` is joined with every [`Page::goto`] path.
    #[must_use]
    pub fn new(surface: S, base_url: impl Into<String>, timeouts: Timeouts) -> Self {
        Self {
            surface,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeouts,
            deadline: None,
            steps: VecDeque::new(),
        }
    }

    /// Cap all subsequent waits at `deadline`
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Time budgets in effect
    #[must_use]
    pub const fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Steps performed so far, oldest first
    #[must_use]
    pub fn step_log(&self) -> Vec<String> {
        self.steps.iter().cloned().collect()
    }

    /// Underlying surface
    #[must_use]
    pub const fn surface(&self) -> &S {
        &self.surface
    }

    /// Underlying surface, mutably
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// Release the surface
    pub fn into_surface(self) -> S {
        self.surface
    }

    /// `requested`, shortened to what is left before the deadline
    #[must_use]
    pub fn budget(&self, requested: Duration) -> Duration {
        match self.deadline {
            Some(deadline) => requested.min(deadline.saturating_duration_since(Instant::now())),
            None => requested,
        }
    }

    fn step_budget(&self, locator: &Locator) -> Duration {
        self.budget(locator.timeout().unwrap_or_else(|| self.timeouts.step()))
    }

    fn poller(&self, timeout: Duration) -> Poller {
        Poller::new(timeout, self.timeouts.poll_interval())
    }

    fn record(&mut self, step: String) {
        debug!(step = %step, "primitive");
        if self.steps.len() == STEP_LOG_CAPACITY {
            self.steps.pop_front();
        }
        self.steps.push_back(step);
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    /// Absolute URL for an application path
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Navigate to `path` under the base URL
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Navigation`] if the surface cannot load it
    pub async fn goto(&mut self, path: &str) -> FlowResult<()> {
        let url = self.url_for(path);
        self.record(format!("goto {url}"));
        self.surface
            .navigate(&url)
            .await
            .map_err(|e| match e {
                nav @ FlowError::Navigation { .. } => nav,
                other => FlowError::Navigation {
                    url: url.clone(),
                    message: other.to_string(),
                },
            })
    }

    /// Current URL
    ///
    /// # Errors
    ///
    /// Returns error if the surface cannot report it
    pub async fn current_url(&self) -> FlowResult<String> {
        self.surface.current_url().await
    }

    // =========================================================================
    // RESOLUTION
    // =========================================================================

    /// Poll until the element addressed by `locator` satisfies `condition`.
    /// Returns its match index and the snapshot that satisfied it.
    ///
    /// # Errors
    ///
    /// [`FlowError::NotFound`] if nothing ever matched, otherwise
    /// [`FlowError::Timeout`]
    pub async fn resolve(
        &self,
        locator: &Locator,
        condition: Condition,
        timeout: Duration,
    ) -> FlowResult<(usize, ElementSnapshot)> {
        let mut poller = self.poller(timeout);
        let mut seen = 0usize;
        loop {
            let matches = self.surface.query(locator).await?;
            seen = seen.max(matches.len());
            if let Some(index) = locator.position().resolve(matches.len()) {
                if let Some(element) = matches.into_iter().nth(index) {
                    if condition.holds(&element) {
                        return Ok((index, element));
                    }
                }
            }
            if !poller.tick().await {
                break;
            }
        }
        let ms = poller.elapsed().as_millis() as u64;
        if seen == 0 {
            return Err(FlowError::NotFound {
                locator: locator.to_string(),
                ms,
            });
        }
        let ambiguity = if locator.position() == Position::Only && seen > 1 {
            format!(" (ambiguous: up to {seen} matches, expected exactly one)")
        } else {
            String::new()
        };
        Err(FlowError::Timeout {
            condition: format!("{locator} to be {condition}{ambiguity}"),
            ms: poller.budget_ms(),
        })
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Click once the element is visible and enabled
    ///
    /// # Errors
    ///
    /// Returns error if the element is never actionable or the click fails
    pub async fn click(&mut self, locator: &Locator) -> FlowResult<()> {
        self.record(format!("click {locator}"));
        let (index, _) = self
            .resolve(locator, Condition::Actionable, self.step_budget(locator))
            .await?;
        self.surface.click(locator, index).await
    }

    /// Replace the value of a text input
    ///
    /// # Errors
    ///
    /// Returns error if the element is never actionable or the fill fails
    pub async fn fill(&mut self, locator: &Locator, text: &str) -> FlowResult<()> {
        self.record(format!("fill {locator} with {text:?}"));
        let (index, _) = self
            .resolve(locator, Condition::Actionable, self.step_budget(locator))
            .await?;
        self.surface.fill(locator, index, text).await
    }

    /// Press a key on the element
    ///
    /// # Errors
    ///
    /// Returns error if the element is never actionable or the key fails
    pub async fn press(&mut self, locator: &Locator, key: &str) -> FlowResult<()> {
        self.record(format!("press {key} on {locator}"));
        let (index, _) = self
            .resolve(locator, Condition::Actionable, self.step_budget(locator))
            .await?;
        self.surface.press(locator, index, key).await
    }

    /// Check a radio or checkbox and wait until it reports checked.
    /// Visibility is not required: styled controls hide the native input.
    ///
    /// # Errors
    ///
    /// Returns error if the element never attaches or never becomes checked
    pub async fn check(&mut self, locator: &Locator) -> FlowResult<()> {
        self.record(format!("check {locator}"));
        let budget = self.step_budget(locator);
        let (index, element) = self.resolve(locator, Condition::Enabled, budget).await?;
        if !element.is_checked() {
            self.surface.check(locator, index).await?;
        }
        self.resolve(locator, Condition::Checked, self.step_budget(locator))
            .await
            .map(|_| ())
    }

    /// Sleep, capped by the deadline
    pub async fn sleep(&mut self, duration: Duration) {
        let duration = self.budget(duration);
        if duration.is_zero() {
            return;
        }
        self.record(format!("sleep {}ms", duration.as_millis()));
        tokio::time::sleep(duration).await;
    }

    // =========================================================================
    // WAITS
    // =========================================================================

    /// Wait until visible
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::NotFound`] or [`FlowError::Timeout`]
    pub async fn wait_visible(&mut self, locator: &Locator) -> FlowResult<ElementSnapshot> {
        self.wait_visible_within(locator, self.step_budget(locator)).await
    }

    /// Wait until visible, with an explicit budget
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::NotFound`] or [`FlowError::Timeout`]
    pub async fn wait_visible_within(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> FlowResult<ElementSnapshot> {
        self.record(format!("wait visible {locator}"));
        let timeout = self.budget(timeout);
        self.resolve(locator, Condition::Visible, timeout)
            .await
            .map(|(_, element)| element)
    }

    /// Wait until enabled
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::NotFound`] or [`FlowError::Timeout`]
    pub async fn wait_enabled(&mut self, locator: &Locator) -> FlowResult<ElementSnapshot> {
        self.record(format!("wait enabled {locator}"));
        self.resolve(locator, Condition::Enabled, self.step_budget(locator))
            .await
            .map(|(_, element)| element)
    }

    /// Wait until nothing addressed by `locator` is visible. An absent
    /// element counts as hidden. Hidden must hold on two polls in a row, so
    /// a single blank frame during a re-render does not pass.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Timeout`] if it stays visible
    pub async fn wait_hidden(&mut self, locator: &Locator) -> FlowResult<()> {
        self.wait_hidden_within(locator, self.step_budget(locator)).await
    }

    /// Wait until hidden, with an explicit budget
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Timeout`] if it stays visible
    pub async fn wait_hidden_within(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> FlowResult<()> {
        self.record(format!("wait hidden {locator}"));
        let stable = self.timeouts.poll_interval();
        self.hidden_for(locator, self.budget(timeout), stable).await
    }

    /// Poll until `locator` has been continuously hidden for `stable`
    async fn hidden_for(
        &mut self,
        locator: &Locator,
        timeout: Duration,
        stable: Duration,
    ) -> FlowResult<()> {
        let mut poller = self.poller(timeout);
        let mut hidden_since: Option<Instant> = None;
        loop {
            if self.is_visible(locator).await? {
                hidden_since = None;
            } else {
                let since = *hidden_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= stable {
                    return Ok(());
                }
            }
            if !poller.tick().await {
                return Err(FlowError::Timeout {
                    condition: format!("{locator} to be hidden"),
                    ms: poller.budget_ms(),
                });
            }
        }
    }

    /// Wait for an overlay to close. The overlay must stay hidden for the
    /// settle delay and still be hidden afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::StaleOverlay`] if it is still visible at the
    /// end of the step budget
    pub async fn wait_overlay_closed(&mut self, overlay: &Locator) -> FlowResult<()> {
        self.record(format!("wait overlay closed {overlay}"));
        let budget = self.step_budget(overlay);
        let stable = self.timeouts.settle();
        let stale = |ms| FlowError::StaleOverlay {
            overlay: overlay.to_string(),
            ms,
        };
        match self.hidden_for(overlay, budget, stable).await {
            Err(FlowError::Timeout { ms, .. }) => return Err(stale(ms)),
            Err(e) => return Err(e),
            Ok(()) => {}
        }
        if self.is_visible(overlay).await? {
            return Err(stale(budget.as_millis() as u64));
        }
        Ok(())
    }

    /// Wait until the current URL satisfies `pattern`
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Timeout`] naming the last URL observed
    pub async fn wait_for_url(&mut self, pattern: &UrlPattern, timeout: Duration) -> FlowResult<String> {
        self.record(format!("wait for {pattern}"));
        let mut poller = self.poller(self.budget(timeout));
        loop {
            let url = self.surface.current_url().await?;
            if pattern.test(&url) {
                return Ok(url);
            }
            if !poller.tick().await {
                return Err(FlowError::Timeout {
                    condition: format!("{pattern} (last URL: {url})"),
                    ms: poller.budget_ms(),
                });
            }
        }
    }

    // =========================================================================
    // ASSERTIONS
    // =========================================================================

    /// Assert the document text contains `text`, retrying for a step
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::AssertionFailed`] if it never does
    pub async fn assert_contains(&mut self, text: &TextMatch) -> FlowResult<()> {
        self.record(format!("assert body contains {text}"));
        let mut poller = self.poller(self.budget(self.timeouts.step()));
        loop {
            let body = self.surface.body_text().await?;
            if body_contains(&body, text) {
                return Ok(());
            }
            if !poller.tick().await {
                return Err(FlowError::assertion(format!(
                    "page text never contained {text} within {}ms",
                    poller.budget_ms()
                )));
            }
        }
    }

    /// Assert a radio or checkbox is checked, retrying for a step
    ///
    /// # Errors
    ///
    /// [`FlowError::NotFound`] if absent, [`FlowError::AssertionFailed`] if
    /// never checked
    pub async fn assert_checked(&mut self, locator: &Locator) -> FlowResult<()> {
        self.record(format!("assert checked {locator}"));
        match self
            .resolve(locator, Condition::Checked, self.step_budget(locator))
            .await
        {
            Ok(_) => Ok(()),
            Err(FlowError::Timeout { ms, .. }) => Err(FlowError::assertion(format!(
                "{locator} was not checked within {ms}ms"
            ))),
            Err(e) => Err(e),
        }
    }

    /// Assert the current URL satisfies `pattern`, retrying for a step
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::AssertionFailed`] naming the URL observed
    pub async fn assert_url(&mut self, pattern: &UrlPattern) -> FlowResult<()> {
        let timeout = self.timeouts.step();
        match self.wait_for_url(pattern, timeout).await {
            Err(FlowError::Timeout { condition, .. }) => {
                Err(FlowError::assertion(format!("expected {condition}")))
            }
            other => other.map(|_| ()),
        }
    }

    /// Assert nothing addressed by `locator` is visible right now
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::AssertionFailed`] if something is
    pub async fn assert_not_visible(&mut self, locator: &Locator) -> FlowResult<()> {
        self.record(format!("assert not visible {locator}"));
        if self.is_visible(locator).await? {
            return Err(FlowError::assertion(format!("{locator} is still visible")));
        }
        Ok(())
    }

    // =========================================================================
    // INSTANT CHECKS
    // =========================================================================

    /// Number of current matches, ignoring position
    ///
    /// # Errors
    ///
    /// Returns error if the surface query fails
    pub async fn count(&self, locator: &Locator) -> FlowResult<usize> {
        Ok(self.surface.query(locator).await?.len())
    }

    /// Whether the addressed element is visible right now. With
    /// [`Position::Only`] any visible match counts.
    ///
    /// # Errors
    ///
    /// Returns error if the surface query fails
    pub async fn is_visible(&self, locator: &Locator) -> FlowResult<bool> {
        let matches = self.surface.query(locator).await?;
        Ok(match locator.position() {
            Position::Only => matches.iter().any(|m| m.visible),
            position => position
                .resolve(matches.len())
                .and_then(|i| matches.get(i))
                .is_some_and(|m| m.visible),
        })
    }

    /// Snapshot of the addressed element right now, if resolvable
    ///
    /// # Errors
    ///
    /// Returns error if the surface query fails
    pub async fn snapshot(&self, locator: &Locator) -> FlowResult<Option<ElementSnapshot>> {
        let matches = self.surface.query(locator).await?;
        Ok(locator
            .position()
            .resolve(matches.len())
            .and_then(|i| matches.into_iter().nth(i)))
    }

    /// Watch for an optional affordance for `window`
    ///
    /// # Errors
    ///
    /// Returns error if the surface query fails
    pub async fn probe(&mut self, locator: &Locator, window: Duration) -> FlowResult<Presence> {
        self.record(format!("probe {locator}"));
        let mut poller = self.poller(self.budget(window));
        let mut seen = false;
        loop {
            let matches = self.surface.query(locator).await?;
            seen |= !matches.is_empty();
            let visible = match locator.position() {
                Position::Only => matches.iter().any(|m| m.visible),
                position => position
                    .resolve(matches.len())
                    .and_then(|i| matches.get(i))
                    .is_some_and(|m| m.visible),
            };
            if visible {
                return Ok(Presence::Present);
            }
            if !poller.tick().await {
                return Ok(if seen {
                    Presence::Undetermined
                } else {
                    Presence::Absent
                });
            }
        }
    }

    // =========================================================================
    // DIAGNOSTICS
    // =========================================================================

    /// Document text right now
    ///
    /// # Errors
    ///
    /// Returns error if the surface cannot report it
    pub async fn body_text(&self) -> FlowResult<String> {
        self.surface.body_text().await
    }

    /// PNG screenshot
    ///
    /// # Errors
    ///
    /// Returns error if capture fails
    pub async fn screenshot(&self) -> FlowResult<Vec<u8>> {
        self.surface.screenshot().await
    }

    /// Close the surface
    ///
    /// # Errors
    ///
    /// Returns error if the surface fails to close
    pub async fn close(&mut self) -> FlowResult<()> {
        self.surface.close().await
    }
}

fn body_contains(body: &str, text: &TextMatch) -> bool {
    match text {
        TextMatch::Pattern(re) => re.is_match(body),
        TextMatch::Contains(_) => text.matches(body),
        TextMatch::Exact(needle) => crate::locator::normalize_whitespace(body).contains(needle.as_str()),
        TextMatch::ExactIgnoreCase(needle) => crate::locator::normalize_whitespace(body)
            .to_lowercase()
            .contains(&needle.to_lowercase()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locator::Role;
    use crate::mock::{ClinicOptions, SimulatedClinic};

    fn page() -> Page<SimulatedClinic> {
        let clinic = SimulatedClinic::new(ClinicOptions::default());
        let base = clinic.base_url().to_string();
        Page::new(clinic, base, Timeouts::fast())
    }

    mod navigation_tests {
        use super::*;

        #[test]
        fn test_url_join() {
            let page = page();
            assert!(page.url_for("/login.htm").ends_with("/openmrs/login.htm"));
            assert!(page.url_for("spa").ends_with("/openmrs/spa"));
        }

        #[tokio::test]
        async fn test_goto_records_step() {
            let mut page = page();
            page.goto("/login.htm").await.unwrap();
            assert!(page.step_log()[0].starts_with("goto "));
            assert!(page.current_url().await.unwrap().ends_with("/login.htm"));
        }
    }

    mod resolution_tests {
        use super::*;

        #[tokio::test]
        async fn test_missing_element_is_not_found() {
            let mut page = page();
            page.goto("/login.htm").await.unwrap();
            let loc = Locator::role(Role::Button, TextMatch::exact("Nope"))
                .with_timeout(Duration::from_millis(60));
            let err = page.click(&loc).await.unwrap_err();
            assert!(matches!(err, FlowError::NotFound { .. }));
        }

        #[tokio::test]
        async fn test_waits_through_render_delay() {
            let mut page = page();
            page.goto("/login.htm").await.unwrap();
            let snap = page.wait_visible(&Locator::id("username")).await.unwrap();
            assert!(snap.visible);
        }

        #[tokio::test]
        async fn test_hidden_element_times_out() {
            let mut page = page();
            page.goto("/login.htm").await.unwrap();
            page.wait_visible(&Locator::id("username")).await.unwrap();
            let hidden = Locator::id("login-error").with_timeout(Duration::from_millis(60));
            // error banner is rendered but hidden until a failed attempt
            let err = page.wait_visible(&hidden).await.unwrap_err();
            assert!(matches!(err, FlowError::Timeout { .. }));
        }

        #[tokio::test]
        async fn test_deadline_caps_budget() {
            let mut page = page();
            page.set_deadline(Some(Instant::now()));
            assert_eq!(page.budget(Duration::from_secs(5)), Duration::ZERO);
            page.set_deadline(None);
            assert_eq!(page.budget(Duration::from_secs(5)), Duration::from_secs(5));
        }
    }

    mod probe_tests {
        use super::*;

        #[tokio::test]
        async fn test_probe_absent() {
            let mut page = page();
            page.goto("/login.htm").await.unwrap();
            let presence = page
                .probe(
                    &Locator::role(Role::Button, TextMatch::exact_ci("Confirm")),
                    Duration::from_millis(60),
                )
                .await
                .unwrap();
            assert_eq!(presence, Presence::Absent);
        }

        #[tokio::test]
        async fn test_probe_undetermined_for_hidden() {
            let mut page = page();
            page.goto("/login.htm").await.unwrap();
            page.wait_visible(&Locator::id("username")).await.unwrap();
            let presence = page
                .probe(&Locator::id("login-error"), Duration::from_millis(60))
                .await
                .unwrap();
            assert_eq!(presence, Presence::Undetermined);
        }
    }

    mod overlay_tests {
        use super::*;
        use async_trait::async_trait;

        /// One dialog that unmounts at `gone_at` and, when `back_at` is
        /// set, mounts again (a re-render of a dialog that never closed)
        struct BlinkingDialog {
            gone_at: Instant,
            back_at: Option<Instant>,
        }

        impl BlinkingDialog {
            fn new(blank: Duration, comes_back: bool) -> Self {
                let now = Instant::now();
                Self {
                    gone_at: now,
                    back_at: comes_back.then(|| now + blank),
                }
            }
        }

        #[async_trait]
        impl Surface for BlinkingDialog {
            async fn navigate(&mut self, _url: &str) -> FlowResult<()> {
                Ok(())
            }
            async fn current_url(&self) -> FlowResult<String> {
                Ok("http://clinic/openmrs/spa/home".to_string())
            }
            async fn query(&self, _locator: &Locator) -> FlowResult<Vec<ElementSnapshot>> {
                let now = Instant::now();
                let mounted = now < self.gone_at || self.back_at.is_some_and(|b| now >= b);
                Ok(if mounted {
                    vec![ElementSnapshot {
                        role: Some("dialog".to_string()),
                        visible: true,
                        enabled: true,
                        ..ElementSnapshot::default()
                    }]
                } else {
                    Vec::new()
                })
            }
            async fn click(&mut self, _locator: &Locator, _index: usize) -> FlowResult<()> {
                Ok(())
            }
            async fn fill(&mut self, _l: &Locator, _i: usize, _text: &str) -> FlowResult<()> {
                Ok(())
            }
            async fn press(&mut self, _l: &Locator, _i: usize, _key: &str) -> FlowResult<()> {
                Ok(())
            }
            async fn check(&mut self, _locator: &Locator, _index: usize) -> FlowResult<()> {
                Ok(())
            }
            async fn body_text(&self) -> FlowResult<String> {
                Ok(String::new())
            }
            async fn screenshot(&self) -> FlowResult<Vec<u8>> {
                Ok(Vec::new())
            }
        }

        fn dialog() -> Locator {
            Locator::any_role(Role::Dialog).with_timeout(Duration::from_millis(400))
        }

        #[tokio::test]
        async fn test_rerender_blank_frame_is_not_a_close() {
            let surface = BlinkingDialog::new(Duration::from_millis(30), true);
            let mut page = Page::new(surface, "http://clinic/openmrs", Timeouts::fast());
            let err = page.wait_overlay_closed(&dialog()).await.unwrap_err();
            assert!(matches!(err, FlowError::StaleOverlay { .. }), "got {err:?}");
        }

        #[tokio::test]
        async fn test_closed_overlay_passes() {
            let surface = BlinkingDialog::new(Duration::from_millis(30), false);
            let mut page = Page::new(surface, "http://clinic/openmrs", Timeouts::fast());
            page.wait_overlay_closed(&dialog()).await.unwrap();
        }

        #[tokio::test]
        async fn test_wait_hidden_outlasts_single_blank_poll() {
            let surface = BlinkingDialog::new(Duration::from_millis(5), true);
            let mut page = Page::new(surface, "http://clinic/openmrs", Timeouts::fast());
            let err = page
                .wait_hidden_within(&dialog(), Duration::from_millis(100))
                .await
                .unwrap_err();
            assert!(matches!(err, FlowError::Timeout { .. }));
        }
    }

    mod step_log_tests {
        use super::*;

        #[test]
        fn test_step_log_keeps_newest() {
            let mut page = page();
            for i in 0..STEP_LOG_CAPACITY + 10 {
                page.record(format!("step {i}"));
            }
            let log = page.step_log();
            assert_eq!(log.len(), STEP_LOG_CAPACITY);
            assert_eq!(log[0], "step 10");
            assert_eq!(log[STEP_LOG_CAPACITY - 1], format!("step {}", STEP_LOG_CAPACITY + 9));
        }
    }

    mod assertion_tests {
        use super::*;

        #[tokio::test]
        async fn test_assert_contains_fails_as_assertion() {
            let mut page = page();
            page.goto("/login.htm").await.unwrap();
            page.set_deadline(Some(Instant::now() + Duration::from_millis(80)));
            let err = page
                .assert_contains(&TextMatch::contains("no such words"))
                .await
                .unwrap_err();
            assert!(matches!(err, FlowError::AssertionFailed { .. }));
        }

        #[test]
        fn test_body_contains_modes() {
            let body = "Welcome to\n  OpenMRS";
            assert!(body_contains(body, &TextMatch::contains("openmrs")));
            assert!(body_contains(body, &TextMatch::exact("to OpenMRS")));
            assert!(!body_contains(body, &TextMatch::exact("to openmrs")));
            assert!(body_contains(body, &TextMatch::exact_ci("TO OPENMRS")));
        }
    }
}
