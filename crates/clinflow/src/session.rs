//! Session bootstrap.
//!
//! ```text
//! Unauthenticated ──login──▶ Authenticated ──/spa──▶ LocationPending
//!                                                        │ pick radio
//!                                                        ▼
//!          Ready ◀──confirm, URL /spa/home── LocationSelected
//! ```
//!
//! Workflows take `&mut ReadySession`, and the only ways to get one are a
//! completed [`Session::bootstrap`] or [`Session::ready`], which refuses
//! unless both login and location confirmation completed.

use std::fmt;
use std::ops::{Deref, DerefMut};
use tracing::{info, info_span, Instrument};

use crate::config::Credentials;
use crate::driver::Surface;
use crate::locator::{Locator, Role, TextMatch};
use crate::page::Page;
use crate::result::{FlowError, FlowResult};
use crate::wait::UrlPattern;

/// Prompt shown by the location picker
pub const LOCATION_PROMPT: &str = "Select your location from the list below";

/// Bootstrap phase, carried by [`FlowError::Bootstrap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapPhase {
    /// Credentials submitted, waiting to leave the login page
    Login,
    /// Loading the application shell
    OpenShell,
    /// Picking a location
    SelectLocation,
    /// Confirming the location
    Confirm,
}

impl fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Login => "login",
            Self::OpenShell => "open-shell",
            Self::SelectLocation => "select-location",
            Self::Confirm => "confirm-location",
        })
    }
}

/// Authentication state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No login yet
    Unauthenticated,
    /// Login completed
    Authenticated,
}

/// Location state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationState {
    /// Picker not completed
    Unselected,
    /// Location confirmed
    Selected(String),
}

/// One authenticated, location-bound context over a surface
#[derive(Debug)]
pub struct Session<S: Surface> {
    page: Page<S>,
    auth: AuthState,
    location: LocationState,
}

impl<S: Surface> Session<S> {
    /// Fresh, unauthenticated session
    #[must_use]
    pub const fn new(page: Page<S>) -> Self {
        Self {
            page,
            auth: AuthState::Unauthenticated,
            location: LocationState::Unselected,
        }
    }

    /// Authentication state
    #[must_use]
    pub const fn auth(&self) -> AuthState {
        self.auth
    }

    /// Location state
    #[must_use]
    pub const fn location(&self) -> &LocationState {
        &self.location
    }

    /// Page access for diagnostics (screenshots, step log). Workflows go
    /// through [`ReadySession`].
    pub fn page_mut(&mut self) -> &mut Page<S> {
        &mut self.page
    }

    /// Page access for diagnostics
    #[must_use]
    pub const fn page(&self) -> &Page<S> {
        &self.page
    }

    /// Release the page
    pub fn into_page(self) -> Page<S> {
        self.page
    }

    /// Log in through the legacy login form.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Bootstrap`] with phase `login` if the form is
    /// missing or the URL never leaves `/login.htm`
    pub async fn login(&mut self, credentials: &Credentials) -> FlowResult<AuthenticatedSession<'_, S>> {
        let span = info_span!("login", user = %credentials.username);
        self.submit_login(credentials)
            .instrument(span)
            .await
            .map_err(|e| e.in_phase(BootstrapPhase::Login))?;
        self.auth = AuthState::Authenticated;
        info!(phase = %BootstrapPhase::Login, "authenticated");
        Ok(AuthenticatedSession { session: self })
    }

    async fn submit_login(&mut self, credentials: &Credentials) -> FlowResult<()> {
        let page = &mut self.page;
        page.goto("/login.htm").await?;
        let username = Locator::id("username");
        page.wait_visible(&username).await?;
        page.fill(&username, &credentials.username).await?;
        page.fill(&Locator::id("password"), &credentials.password).await?;
        page.click(&Locator::role(Role::Button, TextMatch::contains("Log In")))
            .await?;
        let away = UrlPattern::not_matching(r"/login\.htm$")?;
        let timeout = page.timeouts().navigation();
        page.wait_for_url(&away, timeout).await?;
        Ok(())
    }

    /// Pick and confirm a location. Chooses the radio whose name contains
    /// `preferred` if there is one, else the first radio.
    ///
    /// # Errors
    ///
    /// [`FlowError::InvalidState`] before login; otherwise
    /// [`FlowError::Bootstrap`] carrying the phase that failed
    pub async fn select_location(&mut self, preferred: &str) -> FlowResult<String> {
        if self.auth != AuthState::Authenticated {
            return Err(FlowError::invalid_state(
                "location selection requires an authenticated session",
            ));
        }
        let page = &mut self.page;

        page.goto("/spa")
            .await
            .map_err(|e| e.in_phase(BootstrapPhase::OpenShell))?;
        page.wait_visible(&Locator::text(TextMatch::contains(LOCATION_PROMPT)))
            .await
            .map_err(|e| e.in_phase(BootstrapPhase::OpenShell))?;
        info!(phase = %BootstrapPhase::OpenShell, "location picker shown");

        let chosen = pick_location(page, preferred)
            .await
            .map_err(|e| e.in_phase(BootstrapPhase::SelectLocation))?;
        info!(phase = %BootstrapPhase::SelectLocation, location = %chosen, "location picked");

        confirm_location(page)
            .await
            .map_err(|e| e.in_phase(BootstrapPhase::Confirm))?;
        info!(phase = %BootstrapPhase::Confirm, location = %chosen, "location confirmed");

        self.location = LocationState::Selected(chosen.clone());
        Ok(chosen)
    }

    /// Full bootstrap: login, location pick, confirm.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Bootstrap`] naming the phase that failed; no
    /// ready session is produced in that case
    pub async fn bootstrap(
        &mut self,
        credentials: &Credentials,
        preferred_location: &str,
    ) -> FlowResult<ReadySession<'_, S>> {
        self.login(credentials).await?;
        self.select_location(preferred_location).await?;
        self.ready()
    }

    /// Ready handle for a session that already completed bootstrap
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidState`] otherwise
    pub fn ready(&mut self) -> FlowResult<ReadySession<'_, S>> {
        let selected = matches!(self.location, LocationState::Selected(_));
        if self.auth == AuthState::Authenticated && selected {
            return Ok(ReadySession { session: self });
        }
        Err(FlowError::invalid_state(format!(
            "session is not ready (auth: {:?}, location: {:?})",
            self.auth, self.location
        )))
    }
}

async fn pick_location<S: Surface>(page: &mut Page<S>, preferred: &str) -> FlowResult<String> {
    let preferred_radio = Locator::role(Role::Radio, TextMatch::contains(preferred)).first();
    let any_radio = Locator::any_role(Role::Radio).first();
    // radios render together; once any is there, the preferred one is too
    page.wait_enabled(&any_radio).await?;
    let radio = if page.count(&preferred_radio).await? > 0 {
        preferred_radio
    } else {
        any_radio
    };
    page.check(&radio).await?;
    let chosen = page
        .snapshot(&radio)
        .await?
        .map(|radio| radio.name)
        .unwrap_or_default();
    Ok(chosen)
}

async fn confirm_location<S: Surface>(page: &mut Page<S>) -> FlowResult<()> {
    let confirm = Locator::role(Role::Button, TextMatch::exact_ci("Confirm"));
    page.wait_enabled(&confirm).await?;
    page.click(&confirm).await?;
    let home = UrlPattern::matching(r"/spa/home")?;
    let timeout = page.timeouts().navigation();
    page.wait_for_url(&home, timeout).await?;
    Ok(())
}

/// Session after login only. Enough for the legacy landing checks.
#[derive(Debug)]
pub struct AuthenticatedSession<'a, S: Surface> {
    session: &'a mut Session<S>,
}

impl<S: Surface> AuthenticatedSession<'_, S> {
    /// Assert the landing page carries the product name
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::AssertionFailed`] if it never does
    pub async fn assert_landing(&mut self) -> FlowResult<()> {
        self.session
            .page
            .assert_contains(&TextMatch::contains("OpenMRS"))
            .await
    }
}

impl<S: Surface> Deref for AuthenticatedSession<'_, S> {
    type Target = Page<S>;

    fn deref(&self) -> &Self::Target {
        &self.session.page
    }
}

impl<S: Surface> DerefMut for AuthenticatedSession<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session.page
    }
}

/// Authenticated, location-bound session; the only handle workflows accept
#[derive(Debug)]
pub struct ReadySession<'a, S: Surface> {
    session: &'a mut Session<S>,
}

impl<S: Surface> ReadySession<'_, S> {
    /// Confirmed location name
    #[must_use]
    pub fn location(&self) -> &str {
        match &self.session.location {
            LocationState::Selected(name) => name,
            LocationState::Unselected => "",
        }
    }
}

impl<S: Surface> Deref for ReadySession<'_, S> {
    type Target = Page<S>;

    fn deref(&self) -> &Self::Target {
        &self.session.page
    }
}

impl<S: Surface> DerefMut for ReadySession<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.session.page
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use crate::mock::{ClinicOptions, SimulatedClinic};

    fn session(options: ClinicOptions) -> Session<SimulatedClinic> {
        let clinic = SimulatedClinic::new(options);
        let base = clinic.base_url().to_string();
        Session::new(Page::new(clinic, base, Timeouts::fast()))
    }

    mod login_tests {
        use super::*;

        #[tokio::test]
        async fn test_login_authenticates() {
            let mut session = session(ClinicOptions::default());
            let mut auth = session.login(&Credentials::default()).await.unwrap();
            auth.assert_landing().await.unwrap();
            assert_eq!(session.auth(), AuthState::Authenticated);
            assert!(session.ready().is_err());
        }

        #[tokio::test]
        async fn test_wrong_password_fails_in_login_phase() {
            let mut session = session(ClinicOptions::default());
            let err = session
                .login(&Credentials::new("admin", "wrong"))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                FlowError::Bootstrap {
                    phase: BootstrapPhase::Login,
                    ..
                }
            ));
            assert_eq!(session.auth(), AuthState::Unauthenticated);
        }
    }

    mod location_tests {
        use super::*;

        #[tokio::test]
        async fn test_select_location_requires_login() {
            let mut session = session(ClinicOptions::default());
            let err = session.select_location("Pharmacy").await.unwrap_err();
            assert!(matches!(err, FlowError::InvalidState { .. }));
        }

        #[tokio::test]
        async fn test_bootstrap_picks_preferred() {
            let mut session = session(ClinicOptions::default());
            let ready = session
                .bootstrap(&Credentials::default(), "Pharmacy")
                .await
                .unwrap();
            assert_eq!(ready.location(), "Pharmacy");
        }

        #[tokio::test]
        async fn test_bootstrap_falls_back_to_first_radio() {
            let mut session = session(ClinicOptions::default());
            let ready = session
                .bootstrap(&Credentials::default(), "Nowhere Ward")
                .await
                .unwrap();
            assert_eq!(ready.location(), "Inpatient Ward");
        }

        #[tokio::test]
        async fn test_broken_confirm_yields_no_ready_session() {
            let mut session = session(ClinicOptions {
                confirm_location_broken: true,
                ..ClinicOptions::default()
            });
            let err = session
                .bootstrap(&Credentials::default(), "Outpatient Clinic")
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                FlowError::Bootstrap {
                    phase: BootstrapPhase::Confirm,
                    ..
                }
            ));
            assert_eq!(session.location(), &LocationState::Unselected);
            assert!(session.ready().is_err());
        }
    }
}
