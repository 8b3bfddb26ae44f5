//! Idempotent resource ensurer for patient lists.
//!
//! After [`ensure_patient_list`] returns, a list with the requested name is
//! visible in the listing; it was created only if the lookup found no
//! matching row at call time. Lists are never deleted here.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ListSettings;
use crate::driver::Surface;
use crate::locator::{Locator, Role, TextMatch};
use crate::page::Page;
use crate::result::{FlowError, FlowResult};
use crate::session::ReadySession;
use crate::wait::Presence;

/// Listing path under the base URL
pub const PATIENT_LISTS_PATH: &str = "/spa/home/patient-lists";

/// A named patient list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientList {
    /// Display name, the lookup key
    pub name: String,
    /// Free-text description
    pub description: String,
}

impl PatientList {
    /// Create a list descriptor
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl From<&ListSettings> for PatientList {
    fn from(settings: &ListSettings) -> Self {
        Self::new(settings.name.clone(), settings.description.clone())
    }
}

/// How an existing row is recognised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    /// Name cell equals the list name, ignoring case
    #[default]
    Exact,
    /// Row name contains the list name, ignoring case
    Substring,
}

/// What the lookup could establish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListLookup {
    /// Empty state: no search region, so no lists at all
    NoSearchRegion,
    /// Search region present but its input not usable; absence unconfirmed
    SearchNotInteractive {
        /// A matching row was visible anyway
        row_visible: bool,
    },
    /// Search performed
    Searched {
        /// A matching row was visible after the settle delay
        row_visible: bool,
    },
}

impl ListLookup {
    /// Whether a matching row was seen
    #[must_use]
    pub const fn found(&self) -> bool {
        match self {
            Self::NoSearchRegion => false,
            Self::SearchNotInteractive { row_visible } | Self::Searched { row_visible } => {
                *row_visible
            }
        }
    }
}

/// Result of ensuring a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnsureOutcome {
    /// Row found, nothing changed
    AlreadyPresent,
    /// List created and verified
    Created,
}

fn search_region() -> Locator {
    Locator::role(Role::Search, TextMatch::contains("Search this list"))
}

fn search_input() -> Locator {
    Locator::any_role(Role::Searchbox).within(search_region()).first()
}

fn row_locator(name: &str, mode: MatchMode) -> Locator {
    match mode {
        MatchMode::Exact => Locator::role(Role::Cell, TextMatch::exact_ci(name)).first(),
        MatchMode::Substring => Locator::role(Role::Row, TextMatch::contains(name)).first(),
    }
}

fn overlay_header() -> Locator {
    Locator::text(TextMatch::contains("New patient list")).first()
}

/// Make sure a patient list named `list.name` exists.
///
/// # Errors
///
/// [`FlowError::StaleOverlay`] if the creation overlay never closes,
/// [`FlowError::AssertionFailed`] if the created list never shows up, and
/// primitive errors for missing listing affordances
pub async fn ensure_patient_list<S: Surface>(
    session: &mut ReadySession<'_, S>,
    list: &PatientList,
    mode: MatchMode,
) -> FlowResult<EnsureOutcome> {
    let page: &mut Page<S> = session;
    open_all_lists(page).await?;

    let lookup = lookup(page, &list.name, mode).await?;
    if lookup.found() {
        info!(list = %list.name, "patient list already present");
        return Ok(EnsureOutcome::AlreadyPresent);
    }
    info!(list = %list.name, ?lookup, "patient list not found, creating");

    create(page, list).await?;

    lookup_again(page, &list.name, mode).await?;
    let row = row_locator(&list.name, mode);
    match page.wait_visible(&row).await {
        Ok(_) => {
            info!(list = %list.name, "patient list created");
            Ok(EnsureOutcome::Created)
        }
        Err(FlowError::NotFound { .. } | FlowError::Timeout { .. }) => Err(FlowError::assertion(
            format!("creation did not take effect: no row for list {:?}", list.name),
        )),
        Err(e) => Err(e),
    }
}

async fn open_all_lists<S: Surface>(page: &mut Page<S>) -> FlowResult<()> {
    page.goto(PATIENT_LISTS_PATH).await?;
    let tab = Locator::role(Role::Tab, TextMatch::exact_ci("All lists"));
    let current = page.wait_visible(&tab).await?;
    if !current.is_selected() {
        page.click(&tab).await?;
    }
    Ok(())
}

/// Look the list up in the listing currently shown
///
/// # Errors
///
/// Returns error if the surface query or search interaction fails
pub async fn lookup<S: Surface>(
    page: &mut Page<S>,
    name: &str,
    mode: MatchMode,
) -> FlowResult<ListLookup> {
    let window = page.timeouts().optional_probe();
    let row = row_locator(name, mode);
    let input = search_input();
    let interactive = match page.probe(&search_region(), window).await? {
        Presence::Absent => return Ok(ListLookup::NoSearchRegion),
        Presence::Undetermined => false,
        Presence::Present => page.is_visible(&input).await?,
    };
    if !interactive {
        warn!(list = %name, "list search not interactive, cannot confirm absence");
        let row_visible = page.is_visible(&row).await?;
        return Ok(ListLookup::SearchNotInteractive { row_visible });
    }
    page.fill(&input, name).await?;
    page.press(&input, "Enter").await?;
    let settle = page.timeouts().settle();
    page.sleep(settle).await;
    let row_visible = page.is_visible(&row).await?;
    Ok(ListLookup::Searched { row_visible })
}

async fn lookup_again<S: Surface>(page: &mut Page<S>, name: &str, mode: MatchMode) -> FlowResult<()> {
    let outcome = lookup(page, name, mode).await?;
    if outcome == ListLookup::NoSearchRegion {
        warn!(list = %name, "listing still empty after creation");
    }
    Ok(())
}

async fn create<S: Surface>(page: &mut Page<S>, list: &PatientList) -> FlowResult<()> {
    page.click(&Locator::role(Role::Button, TextMatch::exact_ci("New list")))
        .await?;
    let header = overlay_header();
    page.wait_visible(&header).await?;
    page.fill(
        &Locator::role(Role::Textbox, TextMatch::contains("List name")),
        &list.name,
    )
    .await?;
    page.fill(
        &Locator::role(
            Role::Textbox,
            TextMatch::contains("Describe the purpose of this list"),
        ),
        &list.description,
    )
    .await?;
    page.click(&Locator::role(Role::Button, TextMatch::exact_ci("Create list")))
        .await?;
    page.wait_overlay_closed(&header).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod lookup_tests {
        use super::*;

        #[test]
        fn test_found_only_when_row_visible() {
            assert!(!ListLookup::NoSearchRegion.found());
            assert!(!ListLookup::SearchNotInteractive { row_visible: false }.found());
            assert!(ListLookup::SearchNotInteractive { row_visible: true }.found());
            assert!(ListLookup::Searched { row_visible: true }.found());
        }

        #[test]
        fn test_exact_row_matches_whole_cell() {
            let row = row_locator("Pacientes offline", MatchMode::Exact);
            assert!(row.to_string().contains("role=cell"));
            let crate::locator::Target::Role { name: Some(name), .. } = row.target() else {
                panic!("expected role target");
            };
            assert!(name.matches("pacientes OFFLINE"));
            assert!(!name.matches("Pacientes offline 2"));
        }

        #[test]
        fn test_substring_row_matches_longer_names() {
            let row = row_locator("offline", MatchMode::Substring);
            let crate::locator::Target::Role { name: Some(name), .. } = row.target() else {
                panic!("expected role target");
            };
            assert!(name.matches("Pacientes offline Lista de pacientes"));
        }
    }

    mod conversion_tests {
        use super::*;

        #[test]
        fn test_from_settings() {
            let list = PatientList::from(&ListSettings::default());
            assert_eq!(list.name, "Pacientes offline");
            assert!(list.description.starts_with("Lista de pacientes"));
        }

        #[test]
        fn test_match_mode_default_is_exact() {
            assert_eq!(MatchMode::default(), MatchMode::Exact);
        }
    }
}
