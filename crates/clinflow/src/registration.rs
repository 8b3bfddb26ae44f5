//! Form workflow executor: patient registration.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::driver::Surface;
use crate::locator::{Locator, Role, TextMatch};
use crate::result::{FlowError, FlowResult};
use crate::session::ReadySession;
use crate::wait::{Presence, UrlPattern};

/// Registration form path under the base URL
pub const REGISTRATION_PATH: &str = "/spa/patient-registration";

/// Chart URL shape; the captured segment is the patient id
pub const CHART_URL_PATTERN: &str = r"/spa/patient/([^/]+)/chart";

/// Length of the random name suffix
pub const SUFFIX_LEN: usize = 5;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random lowercase alphanumeric suffix of [`SUFFIX_LEN`] characters
#[must_use]
pub fn random_suffix() -> String {
    let mut value = Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(SUFFIX_LEN);
    for _ in 0..SUFFIX_LEN {
        suffix.push(char::from(BASE36[(value % 36) as usize]));
        value /= 36;
    }
    suffix
}

/// Given/family name prefixes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamePrefixes {
    /// Given name prefix
    pub given: String,
    /// Family name prefix
    pub family: String,
}

impl NamePrefixes {
    /// Create prefixes
    #[must_use]
    pub fn new(given: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            given: given.into(),
            family: family.into(),
        }
    }

    /// `(given, family)` sharing one random suffix
    #[must_use]
    pub fn synthesize(&self) -> (String, String) {
        self.with_suffix(&random_suffix())
    }

    /// `(given, family)` with an explicit suffix
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> (String, String) {
        (
            format!("{}{suffix}", self.given),
            format!("{}{suffix}", self.family),
        )
    }
}

impl Default for NamePrefixes {
    fn default() -> Self {
        Self::new("TestName", "TestLast")
    }
}

/// Administrative sex as labelled in the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sex {
    /// Male
    #[default]
    Male,
    /// Female
    Female,
    /// Other
    Other,
    /// Unknown
    Unknown,
}

impl Sex {
    /// Form label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse a label, ignoring case
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        [Self::Male, Self::Female, Self::Other, Self::Unknown]
            .into_iter()
            .find(|sex| sex.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which "Yes" affirmation a step means.
///
/// The form has one Yes/No tab pair per "is this known?" question and they
/// share the accessible name "Yes". In document order index 0 is
/// "name known" and index 1 is "birth date known". Some form versions
/// render a single pair; then both affirmations target index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AffirmationTab {
    /// The patient's name is known
    NameKnown,
    /// The birth date is known
    BirthDateKnown,
}

impl AffirmationTab {
    /// Ordinal among `yes_count` "Yes" tabs
    #[must_use]
    pub const fn resolve(&self, yes_count: usize) -> usize {
        match self {
            Self::NameKnown => 0,
            Self::BirthDateKnown if yes_count >= 2 => 1,
            Self::BirthDateKnown => 0,
        }
    }
}

/// What to register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Name prefixes
    pub prefixes: NamePrefixes,
    /// Sex
    pub sex: Sex,
    /// Date of birth
    pub birth_date: NaiveDate,
}

impl RegistrationRequest {
    /// Request with the given prefixes and defaults otherwise
    #[must_use]
    pub fn with_prefixes(prefixes: NamePrefixes) -> Self {
        Self {
            prefixes,
            ..Self::default()
        }
    }

    /// Set the sex
    #[must_use]
    pub const fn sex(mut self, sex: Sex) -> Self {
        self.sex = sex;
        self
    }

    /// Set the date of birth
    #[must_use]
    pub const fn born(mut self, birth_date: NaiveDate) -> Self {
        self.birth_date = birth_date;
        self
    }
}

impl Default for RegistrationRequest {
    fn default() -> Self {
        Self {
            prefixes: NamePrefixes::default(),
            sex: Sex::Male,
            birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default(),
        }
    }
}

/// A registered patient as observed on the chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientIdentity {
    /// Given name
    pub given_name: String,
    /// Family name
    pub family_name: String,
    /// Sex
    pub sex: Sex,
    /// Date of birth
    pub birth_date: NaiveDate,
    /// Chart URL reached after submit
    pub chart_url: String,
}

impl PatientIdentity {
    /// Patient id segment of the chart URL
    #[must_use]
    pub fn patient_uuid(&self) -> Option<&str> {
        let start = self.chart_url.find("/spa/patient/")? + "/spa/patient/".len();
        let rest = &self.chart_url[start..];
        let end = rest.find('/')?;
        let id = &rest[..end];
        (!id.is_empty()).then_some(id)
    }

    /// "Given Family"
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }
}

/// Count the "Yes" tabs right before the birth-date affirmation. A second
/// pair may still be rendering, so a single tab is only trusted once the
/// optional-affordance window has passed without a second one.
async fn yes_tab_count<S: Surface>(
    session: &mut ReadySession<'_, S>,
    yes: &Locator,
) -> FlowResult<usize> {
    let count = session.count(yes).await?;
    if count >= 2 {
        return Ok(count);
    }
    let window = session.timeouts().optional_probe();
    match session.probe(&yes.clone().nth(1), window).await? {
        Presence::Present => Ok(session.count(yes).await?.max(2)),
        Presence::Absent | Presence::Undetermined => session.count(yes).await,
    }
}

/// Register a patient with synthesized unique names.
///
/// # Errors
///
/// Returns [`FlowError::AssertionFailed`] if the sex radio is not checked
/// after clicking its label (nothing is submitted then), and primitive
/// errors for missing fields or a chart URL that never appears
pub async fn register_patient<S: Surface>(
    session: &mut ReadySession<'_, S>,
    request: &RegistrationRequest,
) -> FlowResult<PatientIdentity> {
    let (given, family) = request.prefixes.synthesize();
    info!(given = %given, family = %family, "registering patient");

    session.goto(REGISTRATION_PATH).await?;
    session
        .wait_visible(&Locator::text(TextMatch::contains("1. Basic Info")).first())
        .await?;

    let yes = Locator::role(Role::Tab, TextMatch::exact_ci("Yes"));
    session.wait_visible(&yes.clone().first()).await?;
    let yes_count = session.count(&yes).await?;

    session
        .click(&yes.clone().nth(AffirmationTab::NameKnown.resolve(yes_count)))
        .await?;
    session
        .fill(&Locator::role(Role::Textbox, TextMatch::contains("First Name")), &given)
        .await?;
    session
        .fill(&Locator::role(Role::Textbox, TextMatch::contains("Family Name")), &family)
        .await?;

    let sex_group = Locator::role(Role::Group, TextMatch::contains("Sex"));
    session
        .click(
            &Locator::text(TextMatch::exact_ci(request.sex.label()))
                .within(sex_group.clone())
                .first(),
        )
        .await?;
    session
        .assert_checked(
            &Locator::role(Role::Radio, TextMatch::exact_ci(request.sex.label())).within(sex_group),
        )
        .await?;

    let yes_count = yes_tab_count(session, &yes).await?;
    session
        .click(&yes.nth(AffirmationTab::BirthDateKnown.resolve(yes_count)))
        .await?;
    let dob = request.birth_date;
    session
        .fill(
            &Locator::role(Role::SpinButton, TextMatch::contains("day")),
            &format!("{:02}", dob.day()),
        )
        .await?;
    session
        .fill(
            &Locator::role(Role::SpinButton, TextMatch::contains("month")),
            &format!("{:02}", dob.month()),
        )
        .await?;
    session
        .fill(
            &Locator::role(Role::SpinButton, TextMatch::contains("year")),
            &format!("{:04}", dob.year()),
        )
        .await?;

    session
        .click(&Locator::role(Role::Button, TextMatch::contains("Register patient")))
        .await?;

    let confirm = Locator::role(Role::Button, TextMatch::exact_ci("Confirm")).first();
    let window = session.timeouts().optional_probe();
    match session.probe(&confirm, window).await? {
        Presence::Present => session.click(&confirm).await?,
        Presence::Undetermined => warn!("confirmation dialog rendered but never visible, proceeding"),
        Presence::Absent => {}
    }

    let chart = UrlPattern::matching(CHART_URL_PATTERN)?;
    let timeout = session.timeouts().navigation();
    let chart_url = session.wait_for_url(&chart, timeout).await?;
    session.assert_contains(&TextMatch::exact(given.clone())).await?;
    session.assert_contains(&TextMatch::exact(family.clone())).await?;

    let identity = PatientIdentity {
        given_name: given,
        family_name: family,
        sex: request.sex,
        birth_date: dob,
        chart_url,
    };
    if identity.patient_uuid().is_none() {
        return Err(FlowError::assertion(format!(
            "chart URL has no patient id: {}",
            identity.chart_url
        )));
    }
    info!(patient = ?identity.patient_uuid(), "patient registered");
    Ok(identity)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    mod affirmation_tests {
        use super::*;

        #[test]
        fn test_two_tabs_map_to_distinct_ordinals() {
            assert_eq!(AffirmationTab::NameKnown.resolve(2), 0);
            assert_eq!(AffirmationTab::BirthDateKnown.resolve(2), 1);
        }

        #[test]
        fn test_single_tab_shared() {
            assert_eq!(AffirmationTab::NameKnown.resolve(1), 0);
            assert_eq!(AffirmationTab::BirthDateKnown.resolve(1), 0);
        }
    }

    mod identity_tests {
        use super::*;

        fn identity(url: &str) -> PatientIdentity {
            PatientIdentity {
                given_name: "TestNameab12c".to_string(),
                family_name: "TestLastab12c".to_string(),
                sex: Sex::Male,
                birth_date: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                chart_url: url.to_string(),
            }
        }

        #[test]
        fn test_patient_uuid_from_chart_url() {
            let id = identity("http://localhost/openmrs/spa/patient/5f2c-99a1/chart/Patient%20Summary");
            assert_eq!(id.patient_uuid(), Some("5f2c-99a1"));
            assert_eq!(id.full_name(), "TestNameab12c TestLastab12c");
        }

        #[test]
        fn test_patient_uuid_absent() {
            assert_eq!(identity("http://localhost/openmrs/spa/home").patient_uuid(), None);
        }

        #[test]
        fn test_default_request() {
            let req = RegistrationRequest::default();
            assert_eq!(req.birth_date, NaiveDate::from_ymd_opt(1990, 1, 1).unwrap());
            assert_eq!(req.prefixes.given, "TestName");
            assert_eq!(req.sex, Sex::Male);
        }

        #[test]
        fn test_sex_labels_round_trip() {
            assert_eq!(Sex::from_label("female"), Some(Sex::Female));
            assert_eq!(Sex::from_label("x"), None);
        }
    }

    mod suffix_tests {
        use super::*;

        #[test]
        fn test_suffixes_do_not_collide_in_practice() {
            let suffixes: HashSet<String> = (0..200).map(|_| random_suffix()).collect();
            assert_eq!(suffixes.len(), 200);
        }

        proptest! {
            #[test]
            fn prop_synthesized_names_share_suffix(given in "[A-Za-z]{1,12}", family in "[A-Za-z]{1,12}") {
                let prefixes = NamePrefixes::new(given.clone(), family.clone());
                let (g, f) = prefixes.synthesize();
                let gs = g.strip_prefix(&given).unwrap();
                let fs = f.strip_prefix(&family).unwrap();
                prop_assert_eq!(gs, fs);
                prop_assert_eq!(gs.len(), SUFFIX_LEN);
                prop_assert!(gs.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
            }
        }
    }
}
