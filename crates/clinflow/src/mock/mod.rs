//! In-process simulation of the clinical application.
//!
//! [`SimulatedClinic`] implements [`Surface`] over a small model of the
//! login page, location picker, home search, patient lists, registration
//! form and patient chart. Pages render after a short delay and list
//! searches settle asynchronously, so waiting logic is exercised for real.
//! Server-side data lives in a [`ClinicBackend`] shared by every surface a
//! [`SimulatedClinicFactory`] opens.

mod backend;
mod dom;
mod views;

pub use backend::{ClinicBackend, StoredList, StoredPatient};

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::driver::{ElementSnapshot, Surface, SurfaceFactory};
use crate::locator::Locator;
use crate::result::{FlowError, FlowResult};
use views::{Control, PageState};

/// Base URL the simulation answers on
pub const SIMULATED_BASE_URL: &str = "http://clinic.test/openmrs";

/// Backend handle shared between surfaces
pub type SharedBackend = Arc<Mutex<ClinicBackend>>;

/// Overlays that can be made to stick open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    /// "New patient list" panel
    NewList,
    /// "Add patient to list" modal
    AddToList,
    /// End-visit confirmation dialog
    EndVisit,
}

/// Behaviour switches for the simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicOptions {
    /// Delay before a newly loaded page renders
    pub render_delay: Duration,
    /// Delay before a list search shows its rows
    pub search_settle: Duration,
    /// Show a confirmation dialog after "Register patient"
    pub confirm_on_register: bool,
    /// Registration form renders only the birth-date Yes/No pair
    pub single_yes_tab: bool,
    /// The list search input is visible
    pub list_search_interactive: bool,
    /// The list search region is mounted but hidden
    pub list_search_region_hidden: bool,
    /// "Create list" closes the panel without creating anything
    pub break_list_creation: bool,
    /// The location "Confirm" button does nothing
    pub confirm_location_broken: bool,
    /// An overlay that never closes
    pub stale_overlay: Option<Overlay>,
    /// The "Date of Birth Known?" pair renders this long after the
    /// registration page opens
    pub birth_date_pair_delay: Duration,
    /// Clicking a sex label does not select the radio
    pub sex_label_inert: bool,
}

impl Default for ClinicOptions {
    fn default() -> Self {
        Self {
            render_delay: Duration::from_millis(30),
            search_settle: Duration::from_millis(20),
            confirm_on_register: false,
            single_yes_tab: false,
            list_search_interactive: true,
            list_search_region_hidden: false,
            break_list_creation: false,
            confirm_location_broken: false,
            stale_overlay: None,
            birth_date_pair_delay: Duration::ZERO,
            sex_label_inert: false,
        }
    }
}

/// PNG returned by [`SimulatedClinic::screenshot`] (1x1 transparent)
const BLANK_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// One browser context against the simulated clinic
#[derive(Debug)]
pub struct SimulatedClinic {
    backend: SharedBackend,
    options: ClinicOptions,
    state: PageState,
    closed: bool,
}

impl SimulatedClinic {
    /// Standalone clinic with its own empty backend
    #[must_use]
    pub fn new(options: ClinicOptions) -> Self {
        Self::with_backend(Arc::new(Mutex::new(ClinicBackend::default())), options)
    }

    /// Clinic over an existing backend
    #[must_use]
    pub fn with_backend(backend: SharedBackend, options: ClinicOptions) -> Self {
        Self {
            backend,
            options,
            state: PageState::new(SIMULATED_BASE_URL),
            closed: false,
        }
    }

    /// Base URL to configure the page with
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.state.base_url
    }

    /// Shared backend
    #[must_use]
    pub fn backend(&self) -> SharedBackend {
        Arc::clone(&self.backend)
    }

    /// Whether [`Surface::close`] was called
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn lock(&self) -> FlowResult<MutexGuard<'_, ClinicBackend>> {
        self.backend
            .lock()
            .map_err(|_| FlowError::surface("clinic backend lock poisoned"))
    }

    fn ensure_open(&self) -> FlowResult<()> {
        if self.closed {
            return Err(FlowError::surface("surface already closed"));
        }
        Ok(())
    }

    /// Control of the `index`-th match, if it may be interacted with
    fn target(&self, locator: &Locator, index: usize, needs_visible: bool) -> FlowResult<Control> {
        self.ensure_open()?;
        let backend = self.lock()?;
        let dom = views::render(&self.state, &backend, &self.options);
        let hits = dom.query(locator);
        let node = *hits
            .get(index)
            .ok_or_else(|| FlowError::surface(format!("no match #{index} for {locator}")))?;
        let element = dom
            .element(node)
            .ok_or_else(|| FlowError::surface(format!("stale element for {locator}")))?;
        if needs_visible && !dom.is_visible(node) {
            return Err(FlowError::surface(format!("{locator} is not visible")));
        }
        if !element.enabled {
            return Err(FlowError::surface(format!("{locator} is disabled")));
        }
        Ok(element.control.clone())
    }
}

#[async_trait]
impl Surface for SimulatedClinic {
    async fn navigate(&mut self, url: &str) -> FlowResult<()> {
        self.ensure_open()?;
        let backend = Arc::clone(&self.backend);
        let backend = backend
            .lock()
            .map_err(|_| FlowError::surface("clinic backend lock poisoned"))?;
        views::navigate(&mut self.state, &backend, &self.options, url)
    }

    async fn current_url(&self) -> FlowResult<String> {
        self.ensure_open()?;
        Ok(self.state.url.clone())
    }

    async fn query(&self, locator: &Locator) -> FlowResult<Vec<ElementSnapshot>> {
        self.ensure_open()?;
        let backend = self.lock()?;
        let dom = views::render(&self.state, &backend, &self.options);
        Ok(dom.query(locator).into_iter().map(|i| dom.snapshot(i)).collect())
    }

    async fn click(&mut self, locator: &Locator, index: usize) -> FlowResult<()> {
        let control = self.target(locator, index, true)?;
        let backend = Arc::clone(&self.backend);
        let mut backend = backend
            .lock()
            .map_err(|_| FlowError::surface("clinic backend lock poisoned"))?;
        views::activate(&mut self.state, &mut backend, &self.options, &control)
    }

    async fn fill(&mut self, locator: &Locator, index: usize, text: &str) -> FlowResult<()> {
        let control = self.target(locator, index, true)?;
        views::fill(&mut self.state, &control, text)
    }

    async fn press(&mut self, locator: &Locator, index: usize, key: &str) -> FlowResult<()> {
        let control = self.target(locator, index, true)?;
        views::press(&mut self.state, &self.options, &control, key)
    }

    async fn check(&mut self, locator: &Locator, index: usize) -> FlowResult<()> {
        let control = self.target(locator, index, false)?;
        let backend = Arc::clone(&self.backend);
        let mut backend = backend
            .lock()
            .map_err(|_| FlowError::surface("clinic backend lock poisoned"))?;
        views::check(&mut self.state, &mut backend, &self.options, &control)
    }

    async fn body_text(&self) -> FlowResult<String> {
        self.ensure_open()?;
        let backend = self.lock()?;
        Ok(views::render(&self.state, &backend, &self.options).body_text())
    }

    async fn screenshot(&self) -> FlowResult<Vec<u8>> {
        self.ensure_open()?;
        Ok(BLANK_PNG.to_vec())
    }

    async fn close(&mut self) -> FlowResult<()> {
        self.closed = true;
        Ok(())
    }
}

/// Opens [`SimulatedClinic`] surfaces over one shared backend
#[derive(Debug, Clone)]
pub struct SimulatedClinicFactory {
    backend: SharedBackend,
    options: ClinicOptions,
}

impl SimulatedClinicFactory {
    /// Factory over a fresh, empty backend
    #[must_use]
    pub fn new(options: ClinicOptions) -> Self {
        Self {
            backend: Arc::new(Mutex::new(ClinicBackend::default())),
            options,
        }
    }

    /// Shared backend, for seeding data and inspecting results
    #[must_use]
    pub fn backend(&self) -> SharedBackend {
        Arc::clone(&self.backend)
    }
}

#[async_trait]
impl SurfaceFactory for SimulatedClinicFactory {
    type Surface = SimulatedClinic;

    async fn open(&self) -> FlowResult<SimulatedClinic> {
        Ok(SimulatedClinic::with_backend(
            Arc::clone(&self.backend),
            self.options.clone(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::locator::{Role, TextMatch};

    async fn settled(clinic: &mut SimulatedClinic, path: &str) {
        clinic
            .navigate(&format!("{SIMULATED_BASE_URL}{path}"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
    }

    #[tokio::test]
    async fn test_page_renders_after_delay() {
        let mut clinic = SimulatedClinic::new(ClinicOptions::default());
        clinic
            .navigate(&format!("{SIMULATED_BASE_URL}/login.htm"))
            .await
            .unwrap();
        assert!(clinic.query(&Locator::id("username")).await.unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(clinic.query(&Locator::id("username")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_confirm_rejects_click() {
        let mut clinic = SimulatedClinic::new(ClinicOptions::default());
        settled(&mut clinic, "/login.htm").await;
        clinic.fill(&Locator::id("username"), 0, "admin").await.unwrap();
        clinic.fill(&Locator::id("password"), 0, "Admin123").await.unwrap();
        clinic
            .click(&Locator::role(Role::Button, TextMatch::exact("Log In")), 0)
            .await
            .unwrap();
        settled(&mut clinic, "/spa").await;
        let confirm = Locator::role(Role::Button, TextMatch::exact("Confirm"));
        let snap = clinic.query(&confirm).await.unwrap();
        assert!(!snap[0].enabled);
        assert!(clinic.click(&confirm, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_closed_surface_refuses_work() {
        let mut clinic = SimulatedClinic::new(ClinicOptions::default());
        clinic.close().await.unwrap();
        assert!(clinic.is_closed());
        assert!(clinic.current_url().await.is_err());
    }

    #[tokio::test]
    async fn test_factory_shares_backend() {
        let factory = SimulatedClinicFactory::new(ClinicOptions::default());
        factory.backend().lock().unwrap().seed_list("Shared", "");
        let clinic = factory.open().await.unwrap();
        assert_eq!(clinic.backend().lock().unwrap().list_count("shared"), 1);
    }
}
