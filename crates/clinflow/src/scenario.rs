//! Scenario composer.
//!
//! A [`Scenario`] is an ordered list of [`Stage`]s run against one
//! [`Session`] under a single time budget. Data produced by one stage (the
//! registered patient, the list outcome) is carried forward in a
//! [`JourneyContext`]. The first failing stage ends the scenario and is
//! named in the returned [`FlowError::Stage`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, info_span, Instrument};

use crate::chart::{add_patient_to_list, end_visit, search_patient, start_visit};
use crate::config::FlowConfig;
use crate::driver::Surface;
use crate::ensure::{ensure_patient_list, EnsureOutcome, MatchMode, PatientList};
use crate::locator::TextMatch;
use crate::registration::{register_patient, NamePrefixes, PatientIdentity, RegistrationRequest};
use crate::result::{FlowError, FlowResult};
use crate::session::Session;

/// One step of a journey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Log in on the legacy form and check the landing page
    LegacyLogin,
    /// Login plus location confirmation
    Bootstrap,
    /// Ensure the configured patient list exists
    EnsureList,
    /// Register a new patient
    RegisterPatient,
    /// Find the registered patient through search
    SearchPatient,
    /// Add the registered patient to the configured list
    AddToList,
    /// Start a visit on the chart
    StartVisit,
    /// End the active visit
    EndVisit,
}

impl Stage {
    /// Stable kebab-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LegacyLogin => "legacy-login",
            Self::Bootstrap => "bootstrap",
            Self::EnsureList => "ensure-list",
            Self::RegisterPatient => "register-patient",
            Self::SearchPatient => "search-patient",
            Self::AddToList => "add-to-list",
            Self::StartVisit => "start-visit",
            Self::EndVisit => "end-visit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data threaded between stages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyContext {
    /// Location confirmed by bootstrap
    pub location: Option<String>,
    /// Outcome of the list ensurer
    pub list_outcome: Option<EnsureOutcome>,
    /// Patient registered in this run
    pub patient: Option<PatientIdentity>,
    /// Stages completed, in order
    pub completed: Vec<Stage>,
}

impl JourneyContext {
    fn patient(&self, stage: Stage) -> FlowResult<&PatientIdentity> {
        self.patient.as_ref().ok_or_else(|| {
            FlowError::invalid_state(format!("{stage} needs a patient registered earlier in the journey"))
        })
    }
}

/// What a successful scenario produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneySummary {
    /// Scenario name
    pub scenario: String,
    /// Context at the end of the run
    pub context: JourneyContext,
    /// Wall-clock duration
    pub duration: Duration,
}

/// Prefixes for journeys that later search for the registered patient
fn search_prefixes() -> NamePrefixes {
    NamePrefixes::new("SearchTestName", "SearchTestLast")
}

/// A named journey
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    description: String,
    stages: Vec<Stage>,
    timeout: Option<Duration>,
    prefixes: NamePrefixes,
    match_mode: MatchMode,
}

impl Scenario {
    /// Create a scenario with the default budget
    #[must_use]
    pub fn new(name: impl Into<String>, stages: Vec<Stage>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            stages,
            timeout: None,
            prefixes: NamePrefixes::default(),
            match_mode: MatchMode::default(),
        }
    }

    /// Set the description
    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Override the scenario budget
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the name prefixes used by registration
    #[must_use]
    pub fn with_prefixes(mut self, prefixes: NamePrefixes) -> Self {
        self.prefixes = prefixes;
        self
    }

    /// Set how the list ensurer recognises an existing list
    #[must_use]
    pub const fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// Name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Name prefixes used by registration
    #[must_use]
    pub const fn prefixes(&self) -> &NamePrefixes {
        &self.prefixes
    }

    /// Stages in order
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Budget, falling back to the configured scenario timeout
    #[must_use]
    pub fn budget(&self, config: &FlowConfig) -> Duration {
        self.timeout.unwrap_or_else(|| config.timeouts.scenario())
    }

    /// Built-in journeys
    #[must_use]
    pub fn catalog() -> Vec<Self> {
        use Stage::{
            AddToList, Bootstrap, EndVisit, EnsureList, LegacyLogin, RegisterPatient,
            SearchPatient, StartVisit,
        };
        vec![
            Self::new("legacy-login", vec![LegacyLogin])
                .describe("Log in on the legacy form and check the landing page"),
            Self::new("bootstrap", vec![Bootstrap])
                .describe("Log in and confirm a location"),
            Self::new("ensure-list", vec![Bootstrap, EnsureList])
                .describe("Make sure the configured patient list exists"),
            Self::new("register-patient", vec![Bootstrap, RegisterPatient])
                .describe("Register a patient with unique names")
                .with_timeout(Duration::from_secs(120)),
            Self::new("register-and-search", vec![Bootstrap, RegisterPatient, SearchPatient])
                .describe("Register a patient, then find them through search")
                .with_prefixes(search_prefixes())
                .with_timeout(Duration::from_secs(120)),
            Self::new(
                "full-journey",
                vec![
                    Bootstrap,
                    EnsureList,
                    RegisterPatient,
                    SearchPatient,
                    AddToList,
                    StartVisit,
                    EndVisit,
                ],
            )
            .describe("List, registration, search, list membership and a visit")
            .with_prefixes(search_prefixes())
            .with_timeout(Duration::from_secs(150)),
        ]
    }

    /// Look up a built-in journey
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        Self::catalog().into_iter().find(|s| s.name == name)
    }

    /// Run every stage in order under the scenario budget. The budget also
    /// caps each step's own timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::Stage`] naming the stage that failed or was
    /// running when the budget expired
    pub async fn run<S: Surface>(
        &self,
        session: &mut Session<S>,
        config: &FlowConfig,
    ) -> FlowResult<JourneySummary> {
        let started = Instant::now();
        let budget = self.budget(config);
        session.page_mut().set_deadline(Some(started + budget));

        let mut context = JourneyContext::default();
        let mut current = None;
        let span = info_span!("scenario", name = %self.name);
        let outcome = tokio::time::timeout(
            budget,
            self.execute(session, config, &mut context, &mut current)
                .instrument(span),
        )
        .await;
        session.page_mut().set_deadline(None);

        match outcome {
            Ok(Ok(())) => {
                info!(scenario = %self.name, elapsed_ms = started.elapsed().as_millis() as u64, "scenario passed");
                Ok(JourneySummary {
                    scenario: self.name.clone(),
                    context,
                    duration: started.elapsed(),
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                let stage = current.or_else(|| self.stages.first().copied());
                let timeout = FlowError::Timeout {
                    condition: format!("scenario '{}' to finish", self.name),
                    ms: budget.as_millis() as u64,
                };
                Err(match stage {
                    Some(stage) => timeout.in_stage(stage),
                    None => timeout,
                })
            }
        }
    }

    async fn execute<S: Surface>(
        &self,
        session: &mut Session<S>,
        config: &FlowConfig,
        context: &mut JourneyContext,
        current: &mut Option<Stage>,
    ) -> FlowResult<()> {
        for &stage in &self.stages {
            *current = Some(stage);
            let span = info_span!("stage", stage = %stage);
            info!(parent: &span, "stage started");
            self.run_stage(stage, session, config, context)
                .instrument(span.clone())
                .await
                .map_err(|e| e.in_stage(stage))?;
            info!(parent: &span, "stage passed");
            context.completed.push(stage);
        }
        Ok(())
    }

    async fn run_stage<S: Surface>(
        &self,
        stage: Stage,
        session: &mut Session<S>,
        config: &FlowConfig,
        context: &mut JourneyContext,
    ) -> FlowResult<()> {
        match stage {
            Stage::LegacyLogin => {
                let mut auth = session.login(&config.credentials).await?;
                auth.assert_landing().await
            }
            Stage::Bootstrap => {
                let ready = session
                    .bootstrap(&config.credentials, &config.preferred_location)
                    .await?;
                context.location = Some(ready.location().to_string());
                Ok(())
            }
            Stage::EnsureList => {
                let list = PatientList::from(&config.patient_list);
                let mut ready = session.ready()?;
                let outcome = ensure_patient_list(&mut ready, &list, self.match_mode).await?;
                ready.assert_contains(&TextMatch::exact(list.name)).await?;
                context.list_outcome = Some(outcome);
                Ok(())
            }
            Stage::RegisterPatient => {
                let request = RegistrationRequest::with_prefixes(self.prefixes.clone());
                let mut ready = session.ready()?;
                context.patient = Some(register_patient(&mut ready, &request).await?);
                Ok(())
            }
            Stage::SearchPatient => {
                let patient = context.patient(stage)?;
                let mut ready = session.ready()?;
                search_patient(&mut ready, patient).await.map(|_| ())
            }
            Stage::AddToList => {
                let mut ready = session.ready()?;
                add_patient_to_list(&mut ready, &config.patient_list.name).await
            }
            Stage::StartVisit => {
                context.patient(stage)?;
                let mut ready = session.ready()?;
                start_visit(&mut ready, &config.visit_type).await
            }
            Stage::EndVisit => {
                let mut ready = session.ready()?;
                end_visit(&mut ready, config.visit_dwell()).await
            }
        }
    }
}
