//! Pages of the simulated clinic: routing, rendering and interaction.

use chrono::NaiveDate;
use std::time::{Duration, Instant};

use crate::mock::backend::ClinicBackend;
use crate::mock::dom::{Dom, SimElement};
use crate::mock::{ClinicOptions, Overlay};
use crate::registration::Sex;
use crate::result::{FlowError, FlowResult};
use crate::session::LOCATION_PROMPT;

/// The two "is this known?" questions of the registration form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Question {
    Name,
    BirthDate,
}

/// What interacting with an element does
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Control {
    Inert,
    // login
    Username,
    Password,
    LogIn,
    // location picker
    Location(String),
    ConfirmLocation,
    // home search
    SearchIcon,
    SearchBar,
    SearchResult(String),
    // patient lists
    ListsTab(ListsTab),
    ListSearch,
    NewList,
    NewListName,
    NewListDescription,
    CreateList,
    CancelNewList,
    // registration
    Affirm { question: Question, yes: bool },
    GivenName,
    FamilyName,
    SexOption(Sex),
    BirthDay,
    BirthMonth,
    BirthYear,
    RegisterPatient,
    ConfirmRegistration,
    CancelRegistration,
    // chart
    Actions,
    MenuAddToList,
    AddListSearch,
    ListOption(String),
    SubmitAddToList,
    CancelAddToList,
    StartAVisit,
    VisitType(String),
    SubmitVisit,
    DiscardVisit,
    EndVisit,
    ConfirmEndVisit,
    CancelEndVisit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListsTab {
    Starred,
    All,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct NewListForm {
    name: String,
    description: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ListsView {
    tab: ListsTab,
    query: String,
    applied: Option<(String, Instant)>,
    form: Option<NewListForm>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RegistrationForm {
    name_known: bool,
    dob_known: bool,
    given: String,
    family: String,
    sex: Option<Sex>,
    day: String,
    month: String,
    year: String,
    confirming: bool,
    invalid: bool,
    opened: Option<Instant>,
}

impl RegistrationForm {
    fn birth_date(&self) -> Option<NaiveDate> {
        let day = self.day.trim().parse().ok()?;
        let month = self.month.trim().parse().ok()?;
        let year = self.year.trim().parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    }

    fn complete(&self) -> Option<(Sex, NaiveDate)> {
        if self.given.trim().is_empty() || self.family.trim().is_empty() || !self.dob_known {
            return None;
        }
        Some((self.sex?, self.birth_date()?))
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct AddToListModal {
    query: String,
    checked: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct ChartView {
    patient: String,
    menu_open: bool,
    add_modal: Option<AddToListModal>,
    visit_form: Option<Option<String>>,
    end_dialog: bool,
}

/// Page currently shown
#[derive(Debug, Clone)]
pub(crate) enum View {
    Blank,
    Login {
        username: String,
        password: String,
        failed: bool,
    },
    LegacyHome,
    LocationPicker {
        chosen: Option<String>,
    },
    Home {
        search_open: bool,
        query: String,
        submitted: Option<String>,
    },
    PatientLists(ListsView),
    Registration(RegistrationForm),
    Chart(ChartView),
    NotFound,
}

impl View {
    fn login() -> Self {
        Self::Login {
            username: String::new(),
            password: String::new(),
            failed: false,
        }
    }
}

/// Per-surface state: what a browser context would hold
#[derive(Debug, Clone)]
pub(crate) struct PageState {
    pub base_url: String,
    pub url: String,
    pub view: View,
    pub ready_at: Instant,
    pub authenticated: bool,
    pub location: Option<String>,
}

impl PageState {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            url: "about:blank".to_string(),
            view: View::Blank,
            ready_at: Instant::now(),
            authenticated: false,
            location: None,
        }
    }

    pub fn rendered(&self) -> bool {
        Instant::now() >= self.ready_at
    }

    fn show(&mut self, path: &str, view: View, delay: Duration) {
        self.url = format!("{}{path}", self.base_url);
        self.view = view;
        self.ready_at = Instant::now() + delay;
    }

    fn rerender(&mut self, delay: Duration) {
        self.ready_at = Instant::now() + delay;
    }
}

// =============================================================================
// ROUTING
// =============================================================================

/// Load `url`, following the application's redirects
pub(crate) fn navigate(
    state: &mut PageState,
    backend: &ClinicBackend,
    options: &ClinicOptions,
    url: &str,
) -> FlowResult<()> {
    let Some(path) = url.strip_prefix(&state.base_url) else {
        return Err(FlowError::Navigation {
            url: url.to_string(),
            message: "host unreachable".to_string(),
        });
    };
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let delay = options.render_delay;

    if path == "/login.htm" {
        state.show("/login.htm", View::login(), delay);
        return Ok(());
    }
    if !state.authenticated {
        state.show("/login.htm", View::login(), delay);
        return Ok(());
    }
    match path {
        "" | "/" | "/index.htm" => {
            state.show("/index.htm", View::LegacyHome, delay);
            return Ok(());
        }
        _ => {}
    }
    if state.location.is_none() {
        let chosen = None;
        state.show("/spa/login/location", View::LocationPicker { chosen }, delay);
        return Ok(());
    }
    let path = path.trim_end_matches('/');
    let view = match path {
        "/spa" | "/spa/home" => {
            state.show(
                "/spa/home",
                View::Home {
                    search_open: false,
                    query: String::new(),
                    submitted: None,
                },
                delay,
            );
            return Ok(());
        }
        "/spa/home/patient-lists" => View::PatientLists(ListsView {
            tab: ListsTab::Starred,
            query: String::new(),
            applied: None,
            form: None,
        }),
        "/spa/patient-registration" => View::Registration(RegistrationForm {
            name_known: options.single_yes_tab,
            opened: Some(Instant::now()),
            ..RegistrationForm::default()
        }),
        _ => match chart_patient(path) {
            Some(id) if backend.patient(id).is_some() => View::Chart(ChartView {
                patient: id.to_string(),
                menu_open: false,
                add_modal: None,
                visit_form: None,
                end_dialog: false,
            }),
            _ => View::NotFound,
        },
    };
    state.show(path, view, delay);
    Ok(())
}

fn chart_patient(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/spa/patient/")?;
    let (id, tail) = rest.split_once('/')?;
    tail.starts_with("chart").then_some(id)
}

// =============================================================================
// RENDERING
// =============================================================================

pub(crate) fn render(state: &PageState, backend: &ClinicBackend, options: &ClinicOptions) -> Dom {
    let mut dom = Dom::default();
    if !state.rendered() {
        return dom;
    }
    match &state.view {
        View::Blank => {}
        View::Login { failed, .. } => render_login(&mut dom, *failed),
        View::LegacyHome => {
            dom.add(None, SimElement::role("heading", "Welcome to OpenMRS").with_text("Welcome to OpenMRS"));
            dom.add(None, SimElement::text("Logged in as Super User (admin)"));
        }
        View::LocationPicker { chosen } => render_location_picker(&mut dom, backend, chosen.as_deref()),
        View::Home {
            search_open,
            submitted,
            ..
        } => render_home(&mut dom, backend, *search_open, submitted.as_deref()),
        View::PatientLists(lists) => render_lists(&mut dom, backend, options, lists),
        View::Registration(form) => render_registration(&mut dom, options, form),
        View::Chart(chart) => render_chart(&mut dom, backend, chart),
        View::NotFound => {
            dom.add(None, SimElement::text("Page not found"));
        }
    }
    dom
}

fn render_login(dom: &mut Dom, failed: bool) {
    dom.add(None, SimElement::role("heading", "Login").with_text("Log in to OpenMRS"));
    dom.add(
        None,
        SimElement::role("textbox", "Username").dom_id("username").control(Control::Username),
    );
    dom.add(
        None,
        SimElement::role("textbox", "Password").dom_id("password").control(Control::Password),
    );
    dom.add(None, SimElement::button("Log In", Control::LogIn));
    dom.add(
        None,
        SimElement::text("Invalid username/password. Please try again.")
            .dom_id("login-error")
            .shown(failed),
    );
}

fn render_location_picker(dom: &mut Dom, backend: &ClinicBackend, chosen: Option<&str>) {
    dom.add(None, SimElement::text(LOCATION_PROMPT));
    let group = dom.add(None, SimElement::role("radiogroup", "Locations"));
    for location in backend.locations() {
        dom.add(
            Some(group),
            SimElement::role("radio", location.clone())
                .checked(chosen == Some(location.as_str()))
                .control(Control::Location(location.clone())),
        );
        dom.add(
            Some(group),
            SimElement::text(location.clone()).control(Control::Location(location.clone())),
        );
    }
    dom.add(
        None,
        SimElement::button("Confirm", Control::ConfirmLocation).enabled(chosen.is_some()),
    );
}

fn render_home(dom: &mut Dom, backend: &ClinicBackend, search_open: bool, submitted: Option<&str>) {
    dom.add(None, SimElement::role("heading", "Home").with_text("Home"));
    dom.add(
        None,
        SimElement::role("button", "Search patient")
            .test_id("searchPatientIcon")
            .control(Control::SearchIcon),
    );
    if !search_open {
        return;
    }
    dom.add(
        None,
        SimElement::role("searchbox", "Search for a patient by name or identifier number")
            .test_id("patientSearchBar")
            .control(Control::SearchBar),
    );
    let Some(query) = submitted else {
        return;
    };
    let results = dom.add(None, SimElement::role("region", "Search results"));
    let hits = backend.search_patients(query);
    if hits.is_empty() {
        dom.add(Some(results), SimElement::text("Sorry, no patient charts were found"));
    }
    for patient in hits {
        dom.add(
            Some(results),
            SimElement::role("link", patient.display_name())
                .with_text(patient.display_name())
                .control(Control::SearchResult(patient.uuid.clone())),
        );
    }
}

fn render_lists(dom: &mut Dom, backend: &ClinicBackend, options: &ClinicOptions, view: &ListsView) {
    dom.add(None, SimElement::role("heading", "Patient lists").with_text("Patient lists"));
    dom.add(None, SimElement::button("New list", Control::NewList));
    let tabs = dom.add(None, SimElement::role("tablist", "List filter"));
    dom.add(
        Some(tabs),
        SimElement::role("tab", "Starred lists")
            .with_text("Starred lists")
            .selected(view.tab == ListsTab::Starred)
            .control(Control::ListsTab(ListsTab::Starred)),
    );
    dom.add(
        Some(tabs),
        SimElement::role("tab", "All lists")
            .with_text("All lists")
            .selected(view.tab == ListsTab::All)
            .control(Control::ListsTab(ListsTab::All)),
    );

    if view.tab == ListsTab::Starred || backend.lists().is_empty() {
        dom.add(None, SimElement::text("There are no patient lists to display"));
    } else {
        let search = dom.add(
            None,
            SimElement::role("search", "Search this list").shown(!options.list_search_region_hidden),
        );
        dom.add(
            Some(search),
            SimElement::role("searchbox", "Search this list")
                .shown(options.list_search_interactive && !options.list_search_region_hidden)
                .control(Control::ListSearch),
        );
        let table = dom.add(None, SimElement::role("table", "Patient lists"));
        let filter = match &view.applied {
            Some((_, ready)) if Instant::now() < *ready => None,
            Some((query, _)) => Some(query.to_lowercase()),
            None => Some(String::new()),
        };
        match filter {
            None => {
                dom.add(Some(table), SimElement::text("Loading..."));
            }
            Some(filter) => {
                for list in backend
                    .lists()
                    .iter()
                    .filter(|l| l.name.to_lowercase().contains(&filter))
                {
                    let row = dom.add(
                        Some(table),
                        SimElement::role("row", format!("{} {}", list.name, list.description)),
                    );
                    dom.add(
                        Some(row),
                        SimElement::role("cell", list.name.clone()).with_text(list.name.clone()),
                    );
                    dom.add(
                        Some(row),
                        SimElement::role("cell", list.description.clone())
                            .with_text(list.description.clone()),
                    );
                }
            }
        }
    }

    if view.form.is_some() {
        let panel = dom.add(None, SimElement::role("complementary", "New list panel"));
        dom.add(Some(panel), SimElement::text("New patient list"));
        dom.add(
            Some(panel),
            SimElement::role("textbox", "List name").control(Control::NewListName),
        );
        dom.add(
            Some(panel),
            SimElement::role("textbox", "Describe the purpose of this list in a few words")
                .control(Control::NewListDescription),
        );
        dom.add(Some(panel), SimElement::button("Create list", Control::CreateList));
        dom.add(Some(panel), SimElement::button("Cancel", Control::CancelNewList));
    }
}

fn affirmation(dom: &mut Dom, label: &str, question: Question, known: bool) {
    let group = dom.add(None, SimElement::role("group", label));
    dom.add(
        Some(group),
        SimElement::role("tab", "Yes")
            .with_text("Yes")
            .selected(known)
            .control(Control::Affirm { question, yes: true }),
    );
    dom.add(
        Some(group),
        SimElement::role("tab", "No")
            .with_text("No")
            .selected(!known)
            .control(Control::Affirm { question, yes: false }),
    );
}

fn render_registration(dom: &mut Dom, options: &ClinicOptions, form: &RegistrationForm) {
    dom.add(None, SimElement::role("heading", "1. Basic Info").with_text("1. Basic Info"));
    dom.add(None, SimElement::text("2. Contact Details"));

    if !options.single_yes_tab {
        affirmation(dom, "Patient's Name is Known?", Question::Name, form.name_known);
    }
    if form.name_known {
        dom.add(None, SimElement::role("textbox", "First Name").control(Control::GivenName));
        dom.add(None, SimElement::role("textbox", "Family Name").control(Control::FamilyName));
    }

    let sex = dom.add(None, SimElement::role("group", "Sex"));
    for option in [Sex::Male, Sex::Female, Sex::Other, Sex::Unknown] {
        dom.add(
            Some(sex),
            SimElement::role("radio", option.label())
                .checked(form.sex == Some(option))
                .shown(false)
                .control(Control::SexOption(option)),
        );
        let label = if options.sex_label_inert {
            Control::Inert
        } else {
            Control::SexOption(option)
        };
        dom.add(Some(sex), SimElement::text(option.label()).control(label));
    }

    let dob_pair_rendered = form
        .opened
        .map_or(true, |opened| opened.elapsed() >= options.birth_date_pair_delay);
    if dob_pair_rendered {
        affirmation(dom, "Date of Birth Known?", Question::BirthDate, form.dob_known);
    }
    if dob_pair_rendered && form.dob_known {
        dom.add(None, SimElement::role("spinbutton", "Day of birth").control(Control::BirthDay));
        dom.add(None, SimElement::role("spinbutton", "Month of birth").control(Control::BirthMonth));
        dom.add(None, SimElement::role("spinbutton", "Year of birth").control(Control::BirthYear));
    }

    dom.add(None, SimElement::button("Register patient", Control::RegisterPatient));
    if form.invalid {
        dom.add(None, SimElement::text("Please fill all required fields"));
    }
    if form.confirming {
        let dialog = dom.add(None, SimElement::role("dialog", "Confirm registration"));
        dom.add(Some(dialog), SimElement::text("Register this patient?"));
        dom.add(Some(dialog), SimElement::button("Confirm", Control::ConfirmRegistration));
        dom.add(Some(dialog), SimElement::button("Cancel", Control::CancelRegistration));
    }
}

fn render_chart(dom: &mut Dom, backend: &ClinicBackend, chart: &ChartView) {
    let Some(patient) = backend.patient(&chart.patient) else {
        dom.add(None, SimElement::text("Patient not found"));
        return;
    };
    let banner = dom.add(None, SimElement::role("banner", "patient banner"));
    dom.add(
        Some(banner),
        SimElement::role("heading", patient.display_name()).with_text(patient.display_name()),
    );
    dom.add(
        Some(banner),
        SimElement::text(format!(
            "{}, {}",
            patient.sex,
            patient.birth_date.format("%d-%b-%Y")
        )),
    );
    dom.add(Some(banner), SimElement::button("Actions", Control::Actions));
    if chart.menu_open {
        let menu = dom.add(Some(banner), SimElement::role("menu", "Actions"));
        dom.add(
            Some(menu),
            SimElement::role("menuitem", "Add to list")
                .with_text("Add to list")
                .control(Control::MenuAddToList),
        );
        dom.add(
            Some(menu),
            SimElement::role("menuitem", "Edit patient details").with_text("Edit patient details"),
        );
    }

    let active = backend.has_active_visit(&patient.uuid);
    if active {
        let visit = patient.visits.last().cloned().unwrap_or_default();
        dom.add(None, SimElement::text(format!("Active Visit: {visit}")));
        dom.add(None, SimElement::button("End visit", Control::EndVisit));
    } else {
        dom.add(None, SimElement::button("Start a visit", Control::StartAVisit));
    }

    if let Some(selected) = &chart.visit_form {
        let form = dom.add(None, SimElement::role("form", "Visit form"));
        dom.add(Some(form), SimElement::text("Visit Type"));
        for visit_type in backend.visit_types() {
            dom.add(
                Some(form),
                SimElement::role("radio", visit_type.clone())
                    .checked(selected.as_deref() == Some(visit_type.as_str()))
                    .shown(false)
                    .control(Control::VisitType(visit_type.clone())),
            );
            dom.add(
                Some(form),
                SimElement::text(visit_type.clone()).control(Control::VisitType(visit_type.clone())),
            );
        }
        dom.add(
            Some(form),
            SimElement::button("Start visit", Control::SubmitVisit).enabled(selected.is_some()),
        );
        dom.add(Some(form), SimElement::button("Discard", Control::DiscardVisit));
    }

    if let Some(modal) = &chart.add_modal {
        let dialog = dom.add(None, SimElement::role("dialog", "Add patient to list"));
        dom.add(
            Some(dialog),
            SimElement::role("heading", "Add patient to list").with_text("Add patient to list"),
        );
        dom.add(
            Some(dialog),
            SimElement::role("searchbox", "Search for a list").control(Control::AddListSearch),
        );
        let query = modal.query.to_lowercase();
        for list in backend
            .lists()
            .iter()
            .filter(|l| l.name.to_lowercase().contains(&query))
        {
            let checked = modal.checked.contains(&list.name) || list.members.contains(&patient.uuid);
            dom.add(
                Some(dialog),
                SimElement::role("checkbox", list.name.clone())
                    .checked(checked)
                    .shown(false)
                    .control(Control::ListOption(list.name.clone())),
            );
            dom.add(
                Some(dialog),
                SimElement::text(list.name.clone()).control(Control::ListOption(list.name.clone())),
            );
        }
        dom.add(Some(dialog), SimElement::button("Add to list", Control::SubmitAddToList));
        dom.add(Some(dialog), SimElement::button("Cancel", Control::CancelAddToList));
    }

    if chart.end_dialog {
        let dialog = dom.add(None, SimElement::role("dialog", "End active visit"));
        dom.add(
            Some(dialog),
            SimElement::text("Are you sure you want to end this active visit?"),
        );
        dom.add(Some(dialog), SimElement::button("Cancel", Control::CancelEndVisit));
        dom.add(Some(dialog), SimElement::button("End Visit", Control::ConfirmEndVisit));
    }
}

// =============================================================================
// INTERACTION
// =============================================================================

fn unsupported(control: &Control, action: &str) -> FlowError {
    FlowError::surface(format!("cannot {action} element {control:?}"))
}

/// Click (or check) the element carrying `control`
pub(crate) fn activate(
    state: &mut PageState,
    backend: &mut ClinicBackend,
    options: &ClinicOptions,
    control: &Control,
) -> FlowResult<()> {
    let delay = options.render_delay;
    let mut next: Option<(String, View)> = None;
    let mut rerender = false;

    match (&mut state.view, control) {
        (_, Control::Inert) => {}
        (View::Login { username, password, failed }, Control::LogIn) => {
            if backend.authenticate(username, password) {
                state.authenticated = true;
                next = Some(("/index.htm".to_string(), View::LegacyHome));
            } else {
                *failed = true;
            }
        }
        (View::LocationPicker { chosen }, Control::Location(name)) => *chosen = Some(name.clone()),
        (View::LocationPicker { chosen }, Control::ConfirmLocation) => {
            if let (Some(location), false) = (chosen.clone(), options.confirm_location_broken) {
                state.location = Some(location);
                next = Some((
                    "/spa/home".to_string(),
                    View::Home {
                        search_open: false,
                        query: String::new(),
                        submitted: None,
                    },
                ));
            }
        }
        (View::Home { search_open, .. }, Control::SearchIcon) => *search_open = !*search_open,
        (View::Home { .. }, Control::SearchResult(id)) => next = Some(chart_view(id)),
        (View::PatientLists(lists), Control::ListsTab(tab)) => {
            lists.tab = *tab;
            lists.applied = None;
        }
        (View::PatientLists(lists), Control::NewList) => lists.form = Some(NewListForm::default()),
        (View::PatientLists(lists), Control::CancelNewList) => lists.form = None,
        (View::PatientLists(lists), Control::CreateList) => {
            if let Some(form) = &lists.form {
                if !form.name.trim().is_empty() {
                    if !options.break_list_creation {
                        backend.create_list(form.name.trim(), form.description.trim());
                    }
                    if options.stale_overlay != Some(Overlay::NewList) {
                        lists.form = None;
                    }
                }
            }
        }
        (View::Registration(form), Control::Affirm { question, yes }) => match question {
            Question::Name => form.name_known = *yes || options.single_yes_tab,
            Question::BirthDate => {
                form.dob_known = *yes;
                if options.single_yes_tab {
                    form.name_known = true;
                }
            }
        },
        (View::Registration(form), Control::SexOption(sex)) => form.sex = Some(*sex),
        (View::Registration(form), Control::RegisterPatient) => match form.complete() {
            None => form.invalid = true,
            Some(_) if options.confirm_on_register => {
                form.invalid = false;
                form.confirming = true;
                rerender = true;
            }
            Some((sex, dob)) => next = Some(register(backend, form, sex, dob)),
        },
        (View::Registration(form), Control::ConfirmRegistration) => {
            if let Some((sex, dob)) = form.complete() {
                next = Some(register(backend, form, sex, dob));
            }
        }
        (View::Registration(form), Control::CancelRegistration) => form.confirming = false,
        (View::Chart(chart), Control::Actions) => chart.menu_open = !chart.menu_open,
        (View::Chart(chart), Control::MenuAddToList) => {
            chart.menu_open = false;
            chart.add_modal = Some(AddToListModal::default());
        }
        (View::Chart(chart), Control::ListOption(name)) => {
            if let Some(modal) = &mut chart.add_modal {
                if let Some(pos) = modal.checked.iter().position(|n| n == name) {
                    modal.checked.remove(pos);
                } else {
                    modal.checked.push(name.clone());
                }
            }
        }
        (View::Chart(chart), Control::SubmitAddToList) => {
            if let Some(modal) = &chart.add_modal {
                for list in &modal.checked {
                    backend.add_member(list, &chart.patient);
                }
                if options.stale_overlay != Some(Overlay::AddToList) {
                    chart.add_modal = None;
                }
            }
        }
        (View::Chart(chart), Control::CancelAddToList) => chart.add_modal = None,
        (View::Chart(chart), Control::StartAVisit) => chart.visit_form = Some(None),
        (View::Chart(chart), Control::VisitType(name)) => {
            if let Some(selected) = &mut chart.visit_form {
                *selected = Some(name.clone());
            }
        }
        (View::Chart(chart), Control::SubmitVisit) => {
            if let Some(Some(visit_type)) = chart.visit_form.take() {
                backend.start_visit(&chart.patient, &visit_type);
                rerender = true;
            }
        }
        (View::Chart(chart), Control::DiscardVisit) => chart.visit_form = None,
        (View::Chart(chart), Control::EndVisit) => chart.end_dialog = true,
        (View::Chart(chart), Control::CancelEndVisit) => chart.end_dialog = false,
        (View::Chart(chart), Control::ConfirmEndVisit) => {
            backend.end_visit(&chart.patient);
            if options.stale_overlay != Some(Overlay::EndVisit) {
                chart.end_dialog = false;
            }
            rerender = true;
        }
        (_, other) => return Err(unsupported(other, "click")),
    }

    if let Some((path, view)) = next {
        state.show(&path, view, delay);
    } else if rerender {
        state.rerender(delay);
    }
    Ok(())
}

/// Check a radio or checkbox; already-checked controls stay checked
pub(crate) fn check(
    state: &mut PageState,
    backend: &mut ClinicBackend,
    options: &ClinicOptions,
    control: &Control,
) -> FlowResult<()> {
    if let (View::Chart(chart), Control::ListOption(name)) = (&state.view, control) {
        if chart
            .add_modal
            .as_ref()
            .is_some_and(|m| m.checked.contains(name))
        {
            return Ok(());
        }
    }
    match control {
        Control::Location(_) | Control::SexOption(_) | Control::VisitType(_) | Control::ListOption(_) => {
            activate(state, backend, options, control)
        }
        other => Err(unsupported(other, "check")),
    }
}

fn chart_view(patient: &str) -> (String, View) {
    (
        format!("/spa/patient/{patient}/chart/Patient%20Summary"),
        View::Chart(ChartView {
            patient: patient.to_string(),
            menu_open: false,
            add_modal: None,
            visit_form: None,
            end_dialog: false,
        }),
    )
}

fn register(backend: &mut ClinicBackend, form: &RegistrationForm, sex: Sex, dob: NaiveDate) -> (String, View) {
    let id = backend.register(form.given.trim(), form.family.trim(), sex, dob);
    chart_view(&id)
}

/// Replace the value of the input carrying `control`
pub(crate) fn fill(state: &mut PageState, control: &Control, text: &str) -> FlowResult<()> {
    let value = text.to_string();
    match (&mut state.view, control) {
        (View::Login { username, .. }, Control::Username) => *username = value,
        (View::Login { password, .. }, Control::Password) => *password = value,
        (View::Home { query, .. }, Control::SearchBar) => *query = value,
        (View::PatientLists(lists), Control::ListSearch) => lists.query = value,
        (View::PatientLists(lists), Control::NewListName) => {
            if let Some(form) = &mut lists.form {
                form.name = value;
            }
        }
        (View::PatientLists(lists), Control::NewListDescription) => {
            if let Some(form) = &mut lists.form {
                form.description = value;
            }
        }
        (View::Registration(form), Control::GivenName) => form.given = value,
        (View::Registration(form), Control::FamilyName) => form.family = value,
        (View::Registration(form), Control::BirthDay) => form.day = value,
        (View::Registration(form), Control::BirthMonth) => form.month = value,
        (View::Registration(form), Control::BirthYear) => form.year = value,
        (View::Chart(chart), Control::AddListSearch) => {
            if let Some(modal) = &mut chart.add_modal {
                modal.query = value;
            }
        }
        (_, other) => return Err(unsupported(other, "fill")),
    }
    Ok(())
}

/// Press `key` on the element carrying `control`
pub(crate) fn press(state: &mut PageState, options: &ClinicOptions, control: &Control, key: &str) -> FlowResult<()> {
    if key != "Enter" {
        return Ok(());
    }
    match (&mut state.view, control) {
        (View::Home { query, submitted, .. }, Control::SearchBar) => *submitted = Some(query.clone()),
        (View::PatientLists(lists), Control::ListSearch) => {
            lists.applied = Some((lists.query.clone(), Instant::now() + options.search_settle));
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_patient_path() {
        assert_eq!(chart_patient("/spa/patient/abc-1/chart"), Some("abc-1"));
        assert_eq!(chart_patient("/spa/patient/abc-1/chart/Patient%20Summary"), Some("abc-1"));
        assert_eq!(chart_patient("/spa/patient/abc-1"), None);
        assert_eq!(chart_patient("/spa/home"), None);
    }

    #[test]
    fn test_unauthenticated_redirects_to_login() {
        let mut state = PageState::new("http://clinic.test/openmrs");
        let backend = ClinicBackend::default();
        navigate(&mut state, &backend, &ClinicOptions::default(), "http://clinic.test/openmrs/spa/home")
            .unwrap_or_default();
        assert!(state.url.ends_with("/login.htm"));
    }

    #[test]
    fn test_foreign_host_is_navigation_error() {
        let mut state = PageState::new("http://clinic.test/openmrs");
        let backend = ClinicBackend::default();
        let result = navigate(&mut state, &backend, &ClinicOptions::default(), "http://elsewhere/");
        assert!(matches!(result, Err(FlowError::Navigation { .. })));
    }

    #[test]
    fn test_incomplete_registration_marks_invalid() {
        let form = RegistrationForm {
            given: "A".to_string(),
            family: "B".to_string(),
            sex: Some(Sex::Male),
            dob_known: true,
            day: "31".to_string(),
            month: "02".to_string(),
            year: "1990".to_string(),
            ..RegistrationForm::default()
        };
        assert!(form.complete().is_none());
        let form = RegistrationForm {
            day: "01".to_string(),
            ..form
        };
        assert!(form.complete().is_some());
    }
}
