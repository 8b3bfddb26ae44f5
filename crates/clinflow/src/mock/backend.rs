//! Server-side state of the simulated clinic, shared by every surface
//! opened against it.

use chrono::NaiveDate;
use std::collections::HashSet;
use uuid::Uuid;

use crate::registration::Sex;

/// A stored patient list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredList {
    /// Name
    pub name: String,
    /// Description
    pub description: String,
    /// Member patient ids
    pub members: Vec<String>,
}

/// A stored patient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPatient {
    /// Patient id, as it appears in the chart URL
    pub uuid: String,
    /// Given name
    pub given_name: String,
    /// Family name
    pub family_name: String,
    /// Sex
    pub sex: Sex,
    /// Date of birth
    pub birth_date: NaiveDate,
    /// Visit types started, oldest first
    pub visits: Vec<String>,
}

impl StoredPatient {
    /// "Given Family"
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.given_name, self.family_name)
    }
}

/// Clinic data
#[derive(Debug, Clone)]
pub struct ClinicBackend {
    username: String,
    password: String,
    locations: Vec<String>,
    visit_types: Vec<String>,
    lists: Vec<StoredList>,
    patients: Vec<StoredPatient>,
    active_visits: HashSet<String>,
    lists_created: usize,
}

impl Default for ClinicBackend {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "Admin123".to_string(),
            locations: ["Inpatient Ward", "Outpatient Clinic", "Pharmacy"]
                .map(String::from)
                .to_vec(),
            visit_types: ["Facility Visit", "Offline Visit", "Home Visit"]
                .map(String::from)
                .to_vec(),
            lists: Vec::new(),
            patients: Vec::new(),
            active_visits: HashSet::new(),
            lists_created: 0,
        }
    }
}

impl ClinicBackend {
    /// Whether the credentials are accepted
    #[must_use]
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }

    /// Login locations, in display order
    #[must_use]
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// Visit types, in display order
    #[must_use]
    pub fn visit_types(&self) -> &[String] {
        &self.visit_types
    }

    /// All lists, oldest first
    #[must_use]
    pub fn lists(&self) -> &[StoredList] {
        &self.lists
    }

    /// Lists whose name equals `name`, ignoring case
    #[must_use]
    pub fn list_count(&self, name: &str) -> usize {
        self.lists
            .iter()
            .filter(|l| l.name.eq_ignore_ascii_case(name))
            .count()
    }

    /// Lists created through the UI
    #[must_use]
    pub const fn lists_created(&self) -> usize {
        self.lists_created
    }

    /// Insert a list directly, bypassing the UI
    pub fn seed_list(&mut self, name: impl Into<String>, description: impl Into<String>) {
        self.lists.push(StoredList {
            name: name.into(),
            description: description.into(),
            members: Vec::new(),
        });
    }

    pub(crate) fn create_list(&mut self, name: &str, description: &str) {
        self.seed_list(name, description);
        self.lists_created += 1;
    }

    /// Whether `patient` belongs to the list named `list`
    #[must_use]
    pub fn is_member(&self, list: &str, patient: &str) -> bool {
        self.lists
            .iter()
            .any(|l| l.name == list && l.members.iter().any(|m| m == patient))
    }

    pub(crate) fn add_member(&mut self, list: &str, patient: &str) {
        if let Some(stored) = self.lists.iter_mut().find(|l| l.name == list) {
            if !stored.members.iter().any(|m| m == patient) {
                stored.members.push(patient.to_string());
            }
        }
    }

    /// All patients, oldest first
    #[must_use]
    pub fn patients(&self) -> &[StoredPatient] {
        &self.patients
    }

    /// Patient by id
    #[must_use]
    pub fn patient(&self, uuid: &str) -> Option<&StoredPatient> {
        self.patients.iter().find(|p| p.uuid == uuid)
    }

    /// Patients whose display name contains `query`, ignoring case
    #[must_use]
    pub fn search_patients(&self, query: &str) -> Vec<&StoredPatient> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }
        self.patients
            .iter()
            .filter(|p| p.display_name().to_lowercase().contains(&query))
            .collect()
    }

    pub(crate) fn register(
        &mut self,
        given_name: &str,
        family_name: &str,
        sex: Sex,
        birth_date: NaiveDate,
    ) -> String {
        let uuid = Uuid::new_v4().to_string();
        self.patients.push(StoredPatient {
            uuid: uuid.clone(),
            given_name: given_name.to_string(),
            family_name: family_name.to_string(),
            sex,
            birth_date,
            visits: Vec::new(),
        });
        uuid
    }

    /// Whether the patient has an active visit
    #[must_use]
    pub fn has_active_visit(&self, patient: &str) -> bool {
        self.active_visits.contains(patient)
    }

    pub(crate) fn start_visit(&mut self, patient: &str, visit_type: &str) {
        if let Some(stored) = self.patients.iter_mut().find(|p| p.uuid == patient) {
            stored.visits.push(visit_type.to_string());
            self.active_visits.insert(patient.to_string());
        }
    }

    pub(crate) fn end_visit(&mut self, patient: &str) {
        self.active_visits.remove(patient);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_count_ignores_case() {
        let mut backend = ClinicBackend::default();
        backend.seed_list("Pacientes offline", "");
        backend.create_list("PACIENTES OFFLINE", "");
        assert_eq!(backend.list_count("pacientes offline"), 2);
        assert_eq!(backend.lists_created(), 1);
    }

    #[test]
    fn test_search_needs_query() {
        let mut backend = ClinicBackend::default();
        let dob = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default();
        backend.register("TestNameabcde", "TestLastabcde", Sex::Male, dob);
        assert!(backend.search_patients("  ").is_empty());
        assert_eq!(backend.search_patients("testnameab").len(), 1);
    }

    #[test]
    fn test_visit_lifecycle() {
        let mut backend = ClinicBackend::default();
        let dob = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap_or_default();
        let id = backend.register("A", "B", Sex::Female, dob);
        backend.start_visit(&id, "Offline Visit");
        assert!(backend.has_active_visit(&id));
        backend.end_visit(&id);
        assert!(!backend.has_active_visit(&id));
        assert_eq!(backend.patient(&id).map(|p| p.visits.len()), Some(1));
    }
}
