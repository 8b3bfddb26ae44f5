//! Chart workflows: find a patient, add them to a list, start and end a
//! visit.

use std::time::Duration;
use tracing::info;

use crate::driver::Surface;
use crate::locator::{Locator, Role, TextMatch};
use crate::registration::{PatientIdentity, CHART_URL_PATTERN};
use crate::result::{FlowError, FlowResult};
use crate::session::ReadySession;
use crate::wait::UrlPattern;

/// Home path under the base URL
pub const HOME_PATH: &str = "/spa/home";

/// Question shown by the end-visit confirmation dialog
pub const END_VISIT_PROMPT: &str = "Are you sure you want to end this active visit?";

fn end_visit_button() -> Locator {
    Locator::role(Role::Button, TextMatch::exact_ci("End visit")).first()
}

fn start_visit_button() -> Locator {
    Locator::role(Role::Button, TextMatch::contains("Start a visit")).first()
}

/// Find a registered patient through the home search and open their chart.
///
/// # Errors
///
/// Returns [`FlowError::AssertionFailed`] if the search never lists the
/// patient or the chart lacks their names
pub async fn search_patient<S: Surface>(
    session: &mut ReadySession<'_, S>,
    identity: &PatientIdentity,
) -> FlowResult<String> {
    info!(given = %identity.given_name, "searching patient");
    session.goto(HOME_PATH).await?;
    session.assert_url(&UrlPattern::matching(HOME_PATH)?).await?;

    session.click(&Locator::test_id("searchPatientIcon")).await?;
    let search_bar = Locator::test_id("patientSearchBar");
    session.fill(&search_bar, &identity.given_name).await?;
    session.press(&search_bar, "Enter").await?;
    session
        .assert_contains(&TextMatch::exact(identity.given_name.clone()))
        .await?;

    session
        .click(&Locator::text(TextMatch::contains(identity.given_name.clone())).first())
        .await?;
    let timeout = session.timeouts().navigation();
    let chart_url = session
        .wait_for_url(&UrlPattern::matching(CHART_URL_PATTERN)?, timeout)
        .await?;
    session
        .assert_contains(&TextMatch::exact(identity.given_name.clone()))
        .await?;
    session
        .assert_contains(&TextMatch::exact(identity.family_name.clone()))
        .await?;
    Ok(chart_url)
}

/// Add the patient whose chart is open to the list named `list_name`.
///
/// # Errors
///
/// [`FlowError::StaleOverlay`] if the modal never closes,
/// [`FlowError::AssertionFailed`] if the list checkbox does not check
pub async fn add_patient_to_list<S: Surface>(
    session: &mut ReadySession<'_, S>,
    list_name: &str,
) -> FlowResult<()> {
    info!(list = %list_name, "adding patient to list");
    let banner = Locator::role(Role::Banner, TextMatch::contains("patient banner"));
    session
        .click(
            &Locator::role(Role::Button, TextMatch::exact_ci("Actions"))
                .within(banner)
                .first(),
        )
        .await?;
    session
        .click(&Locator::role(Role::MenuItem, TextMatch::exact_ci("Add to list")))
        .await?;

    let heading = Locator::role(Role::Heading, TextMatch::exact_ci("Add patient to list"));
    session.wait_visible(&heading).await?;
    session
        .fill(
            &Locator::role(Role::Searchbox, TextMatch::contains("Search for a list")),
            list_name,
        )
        .await?;
    session
        .click(&Locator::text(TextMatch::exact(list_name)).first())
        .await?;
    session
        .assert_checked(&Locator::role(Role::Checkbox, TextMatch::exact(list_name)).first())
        .await?;
    session
        .click(&Locator::role(Role::Button, TextMatch::exact_ci("Add to list")))
        .await?;
    session.wait_overlay_closed(&heading).await
}

/// Start a visit of `visit_type` on the open chart.
///
/// # Errors
///
/// [`FlowError::InvalidState`] if a visit is already active; primitive
/// errors if the form or the end-visit affordance never appear
pub async fn start_visit<S: Surface>(
    session: &mut ReadySession<'_, S>,
    visit_type: &str,
) -> FlowResult<()> {
    let start = start_visit_button();
    let ready = session.wait_visible(&start).await;
    if session.is_visible(&end_visit_button()).await? {
        return Err(FlowError::invalid_state(
            "a visit is already active for this patient",
        ));
    }
    ready?;
    info!(visit_type = %visit_type, "starting visit");
    session.click(&start).await?;
    session
        .wait_visible(&Locator::text(TextMatch::exact("Visit Type")).first())
        .await?;
    session
        .click(&Locator::text(TextMatch::exact(visit_type)).first())
        .await?;
    session
        .assert_checked(&Locator::role(Role::Radio, TextMatch::exact(visit_type)))
        .await?;
    session
        .click(&Locator::role(Role::Button, TextMatch::exact_ci("Start visit")))
        .await?;
    let long = session.timeouts().long_step();
    session.wait_visible_within(&end_visit_button(), long).await?;
    info!("visit active");
    Ok(())
}

/// End the active visit after `dwell`.
///
/// # Errors
///
/// [`FlowError::StaleOverlay`] if the confirmation dialog never closes,
/// [`FlowError::AssertionFailed`] if an end-visit affordance remains
pub async fn end_visit<S: Surface>(
    session: &mut ReadySession<'_, S>,
    dwell: Duration,
) -> FlowResult<()> {
    if !dwell.is_zero() {
        info!(dwell_ms = dwell.as_millis() as u64, "visit in progress");
        session.sleep(dwell).await;
    }
    session.click(&end_visit_button()).await?;

    let dialog = Locator::any_role(Role::Dialog)
        .with_text(TextMatch::contains(END_VISIT_PROMPT))
        .first();
    session.wait_visible(&dialog).await?;
    session
        .click(
            &Locator::role(Role::Button, TextMatch::exact_ci("End Visit"))
                .within(dialog.clone())
                .first(),
        )
        .await?;
    session.wait_overlay_closed(&dialog).await?;

    let long = session.timeouts().long_step();
    session.wait_visible_within(&start_visit_button(), long).await?;
    session.assert_not_visible(&end_visit_button()).await?;
    info!("visit ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_visit_button_is_case_insensitive() {
        let loc = end_visit_button();
        let crate::locator::Target::Role { name: Some(name), .. } = loc.target() else {
            panic!("expected role target");
        };
        assert!(name.matches("End Visit"));
        assert!(name.matches("End visit"));
        assert!(!name.matches("End visit now"));
    }

    #[test]
    fn test_start_button_distinct_from_submit() {
        let loc = start_visit_button();
        let crate::locator::Target::Role { name: Some(name), .. } = loc.target() else {
            panic!("expected role target");
        };
        assert!(name.matches("Start a visit"));
        assert!(!name.matches("Start visit"));
    }
}
