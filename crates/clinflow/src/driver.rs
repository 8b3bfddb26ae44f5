//! Target surface adapter trait.
//!
//! The application under test is an opaque remote UI. Everything this crate
//! knows about it flows through [`Surface`]: navigation, URL read-back, element
//! snapshots for a [`Locator`], and interactions addressed by
//! `(locator, match index)`.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Surface (async trait)                                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────┐        ┌──────────────────────────┐  │
//! │  │  ChromiumSurface   │        │  SimulatedClinic         │  │
//! │  │  (feature=browser) │        │  (in-process model,      │  │
//! │  │  CDP via           │        │   used by tests)         │  │
//! │  │  chromiumoxide     │        │                          │  │
//! │  └────────────────────┘        └──────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Adapters never wait: a query is one snapshot. Polling and timeouts belong
//! to [`crate::Page`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::locator::Locator;
use crate::result::FlowResult;

/// Point-in-time view of one matched element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSnapshot {
    /// Computed ARIA role, if any
    pub role: Option<String>,
    /// Accessible name
    pub name: String,
    /// Text content (whitespace-collapsed)
    pub text: String,
    /// Rendered with a non-empty box and not hidden
    pub visible: bool,
    /// Not disabled
    pub enabled: bool,
    /// Checked state for radios and checkboxes
    pub checked: Option<bool>,
    /// `aria-selected` for tabs and options
    pub selected: Option<bool>,
}

impl ElementSnapshot {
    /// Visible and enabled
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        self.visible && self.enabled
    }

    /// Checked (radio/checkbox); `false` when not applicable
    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.checked.unwrap_or(false)
    }

    /// Selected (tab); `false` when not applicable
    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected.unwrap_or(false)
    }
}

/// Abstract remote UI.
///
/// Implementations must return matches in document order; the
/// [`crate::locator::Position`] of a locator is resolved by the caller
/// against that order, and the resolved index is passed back to the
/// interaction methods.
#[async_trait]
pub trait Surface: Send + Sync {
    /// Navigate to an absolute URL and wait for the load to settle
    async fn navigate(&mut self, url: &str) -> FlowResult<()>;

    /// Current URL
    async fn current_url(&self) -> FlowResult<String>;

    /// All elements currently matching `locator`, ignoring its position
    async fn query(&self, locator: &Locator) -> FlowResult<Vec<ElementSnapshot>>;

    /// Click the `index`-th match
    async fn click(&mut self, locator: &Locator, index: usize) -> FlowResult<()>;

    /// Replace the value of the `index`-th match
    async fn fill(&mut self, locator: &Locator, index: usize, text: &str) -> FlowResult<()>;

    /// Press a key (e.g. `"Enter"`) on the `index`-th match
    async fn press(&mut self, locator: &Locator, index: usize, key: &str) -> FlowResult<()>;

    /// Check a radio or checkbox, bypassing visibility (labels often
    /// cover the native control)
    async fn check(&mut self, locator: &Locator, index: usize) -> FlowResult<()>;

    /// Visible text of the whole document
    async fn body_text(&self) -> FlowResult<String>;

    /// PNG screenshot of the viewport; empty when unsupported
    async fn screenshot(&self) -> FlowResult<Vec<u8>>;

    /// Release the surface
    async fn close(&mut self) -> FlowResult<()> {
        Ok(())
    }
}

/// Opens a fresh surface per scenario
#[async_trait]
pub trait SurfaceFactory: Send + Sync {
    /// Surface type produced
    type Surface: Surface;

    /// Open a new, exclusively owned surface
    async fn open(&self) -> FlowResult<Self::Surface>;
}
