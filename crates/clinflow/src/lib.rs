//! Clinflow: workflow orchestration for end-to-end clinical UI journeys
//!
//! Clinflow drives an OpenMRS-style web application through the journeys a
//! clinician performs: log in, pick a session location, make sure a patient
//! list exists, register a patient, find them again, add them to the list
//! and open and close a visit. Journeys are composed from stages into named
//! [`Scenario`]s and executed by a [`ScenarioRunner`] that writes JSON and
//! JUnit reports plus failure artifacts.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    CLINFLOW Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Scenario   │    │ Workflows  │    │ Page       │            │
//! │   │ (stages)   │───►│ ensure /   │───►│ (bounded   │──► Surface │
//! │   │            │    │ register / │    │  waits)    │            │
//! │   └────────────┘    │ chart      │    └────────────┘            │
//! │                     └────────────┘                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`Surface`] is anything that can render the application: Chromium
//! over CDP (feature `browser`) or the in-process [`mock::SimulatedClinic`].

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

mod artifacts;
mod config;
mod driver;
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
mod locator;
mod page;
#[allow(clippy::format_push_string)]
mod reporter;
mod result;
mod runner;
mod wait;

/// Chromium over the Chrome DevTools Protocol
#[cfg(feature = "browser")]
pub mod browser;

/// Patient chart workflows: search, add to list, start and end visits
pub mod chart;

/// Idempotent patient-list provisioning
pub mod ensure;

/// In-process simulation of the clinical application
pub mod mock;

/// Patient registration form
pub mod registration;

/// Stage composition and scenario execution
pub mod scenario;

/// Login and session-location bootstrap
pub mod session;

pub use artifacts::{capture, scenario_dir, should_capture, CONTEXT_FILE, SCREENSHOT_FILE};
pub use config::{
    ArtifactSettings, BrowserSettings, Credentials, FlowConfig, ListSettings, ScreenshotPolicy,
    Timeouts, ENV_BASE_URL, ENV_HEADLESS, ENV_PASSWORD, ENV_USERNAME,
};
pub use driver::{ElementSnapshot, Surface, SurfaceFactory};
pub use ensure::{ensure_patient_list, EnsureOutcome, ListLookup, MatchMode, PatientList};
pub use locator::{normalize_whitespace, Locator, Position, Role, Target, TextMatch};
pub use page::Page;
pub use registration::{register_patient, NamePrefixes, PatientIdentity, RegistrationRequest, Sex};
pub use reporter::{Reporter, ScenarioReport, ScenarioStatus, JSON_REPORT, JUNIT_REPORT};
pub use result::{FlowError, FlowResult};
pub use runner::{smoke_check, RunObserver, ScenarioRunner, Silent};
pub use scenario::{JourneyContext, JourneySummary, Scenario, Stage};
pub use session::{
    AuthState, AuthenticatedSession, BootstrapPhase, LocationState, ReadySession, Session,
};
pub use wait::{
    Condition, Poller, Presence, UrlPattern, DEFAULT_NAVIGATION_TIMEOUT_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_STEP_TIMEOUT_MS,
};

/// Everything a journey author usually needs
pub mod prelude {
    pub use super::chart::{add_patient_to_list, end_visit, search_patient, start_visit};
    pub use super::config::*;
    pub use super::driver::*;
    pub use super::ensure::{ensure_patient_list, EnsureOutcome, MatchMode, PatientList};
    pub use super::locator::*;
    pub use super::page::*;
    pub use super::registration::{
        register_patient, NamePrefixes, PatientIdentity, RegistrationRequest, Sex,
    };
    pub use super::result::*;
    pub use super::scenario::{Scenario, Stage};
    pub use super::session::{ReadySession, Session};
    pub use super::wait::*;
}
