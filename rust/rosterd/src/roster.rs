use crate::db;
use crate::error::RosterError;
use crate::exchange::{self, ImportSummary, ReportSummary};
use crate::student::{non_empty, Status, Student, StudentFields, StudentForm};
use anyhow::Context;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(i64),
    Declined,
}

/// Check a form and turn it into storable fields. Checks run in form order
/// and the first failure wins.
pub fn validate(form: &StudentForm) -> Result<StudentFields, RosterError> {
    let first_name = form.first_name.trim();
    if first_name.is_empty() {
        return Err(RosterError::validation("firstName", "First name is required"));
    }
    let last_name = form.last_name.trim();
    if last_name.is_empty() {
        return Err(RosterError::validation("lastName", "Last name is required"));
    }
    let email = form.email.trim();
    if email.is_empty() {
        return Err(RosterError::validation("email", "Email is required"));
    }
    if !email.contains('@') || !email.contains('.') {
        return Err(RosterError::validation(
            "email",
            "Please enter a valid email address",
        ));
    }

    let date_of_birth = non_empty(&form.date_of_birth);
    if let Some(dob) = date_of_birth.as_deref() {
        if NaiveDate::parse_from_str(dob, "%Y-%m-%d").is_err() {
            return Err(RosterError::validation(
                "dateOfBirth",
                "Please enter date in YYYY-MM-DD format",
            ));
        }
    }

    let status = match non_empty(&form.status) {
        None => Status::Active,
        Some(s) => s
            .parse::<Status>()
            .map_err(|e| RosterError::validation("status", e.to_string()))?,
    };

    Ok(StudentFields {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: email.to_string(),
        phone: non_empty(&form.phone),
        date_of_birth,
        address: non_empty(&form.address),
        status,
        enrollment_date: None,
    })
}

/// Session controller: the store handle plus whichever record is loaded
/// into the edit form.
pub struct Roster {
    conn: Connection,
    selected: Option<i64>,
}

impl Roster {
    pub fn new(conn: Connection) -> Self {
        Roster {
            conn,
            selected: None,
        }
    }

    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        let conn = db::open_db(workspace)
            .with_context(|| format!("failed to open roster in {}", workspace.display()))?;
        Ok(Roster::new(conn))
    }

    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    pub fn list(&self) -> Result<Vec<Student>, RosterError> {
        Ok(db::list_students(&self.conn)?)
    }

    pub fn search(&self, term: &str) -> Result<Vec<Student>, RosterError> {
        let term = term.trim();
        if term.is_empty() {
            return self.list();
        }
        Ok(db::search_students(&self.conn, term)?)
    }

    pub fn get(&self, id: i64) -> Result<Student, RosterError> {
        Ok(db::get_student(&self.conn, id)?)
    }

    pub fn select(&mut self, id: i64) -> Result<StudentForm, RosterError> {
        let student = db::get_student(&self.conn, id)?;
        self.selected = Some(id);
        Ok(StudentForm::from(&student))
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    pub fn add(&mut self, form: &StudentForm) -> Result<i64, RosterError> {
        let fields = validate(form)?;
        let id = db::insert_student(&self.conn, &fields)?;
        info!(student_id = id, "student added");
        self.selected = None;
        Ok(id)
    }

    pub fn update(&mut self, form: &StudentForm) -> Result<i64, RosterError> {
        let id = self.selected.ok_or(RosterError::NoSelection)?;
        let fields = validate(form)?;
        db::update_student(&self.conn, id, &fields)?;
        info!(student_id = id, "student updated");
        self.selected = None;
        Ok(id)
    }

    /// Remove the selected record. Nothing happens unless the user confirmed.
    pub fn delete(&mut self, confirmed: bool) -> Result<DeleteOutcome, RosterError> {
        let id = self.selected.ok_or(RosterError::NoSelection)?;
        if !confirmed {
            return Ok(DeleteOutcome::Declined);
        }
        let res = db::delete_student(&self.conn, id);
        // A vanished row can't stay selected either way.
        self.selected = None;
        res?;
        info!(student_id = id, "student deleted");
        Ok(DeleteOutcome::Deleted(id))
    }

    pub fn export_csv(&self, path: &Path) -> Result<usize, RosterError> {
        exchange::export_csv(&self.conn, path).map_err(RosterError::Io)
    }

    pub fn import_csv(&self, path: &Path) -> Result<ImportSummary, RosterError> {
        exchange::import_csv(&self.conn, path).map_err(RosterError::Io)
    }

    pub fn generate_report(&self, path: &Path) -> Result<ReportSummary, RosterError> {
        exchange::generate_report(&self.conn, path).map_err(RosterError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::memory_db;

    fn form(first: &str, last: &str, email: &str) -> StudentForm {
        StudentForm {
            first_name: first.into(),
            last_name: last.into(),
            email: email.into(),
            ..StudentForm::default()
        }
    }

    fn field_of(e: RosterError) -> &'static str {
        match e {
            RosterError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn validate_reports_first_failing_field() {
        assert_eq!(field_of(validate(&form(" ", "", "")).unwrap_err()), "firstName");
        assert_eq!(field_of(validate(&form("Ana", "", "")).unwrap_err()), "lastName");
        assert_eq!(field_of(validate(&form("Ana", "Lee", "")).unwrap_err()), "email");
        assert_eq!(
            field_of(validate(&form("Ana", "Lee", "ana@example")).unwrap_err()),
            "email"
        );
        assert_eq!(
            field_of(validate(&form("Ana", "Lee", "ana.example.com")).unwrap_err()),
            "email"
        );

        let mut f = form("Ana", "Lee", "ana@example.com");
        f.date_of_birth = "01/02/2003".into();
        assert_eq!(field_of(validate(&f).unwrap_err()), "dateOfBirth");
        f.date_of_birth = "2003-02-30".into();
        assert_eq!(field_of(validate(&f).unwrap_err()), "dateOfBirth");

        let mut f = form("Ana", "Lee", "ana@example.com");
        f.status = "Alumni".into();
        assert_eq!(field_of(validate(&f).unwrap_err()), "status");
    }

    #[test]
    fn validate_trims_and_normalizes_optionals() {
        let mut f = form("  Ana ", " Lee", " ana@example.com ");
        f.phone = "   ".into();
        f.date_of_birth = "2003-02-01".into();
        f.status = String::new();
        let v = validate(&f).expect("valid");
        assert_eq!(v.first_name, "Ana");
        assert_eq!(v.last_name, "Lee");
        assert_eq!(v.email, "ana@example.com");
        assert_eq!(v.phone, None);
        assert_eq!(v.date_of_birth.as_deref(), Some("2003-02-01"));
        assert_eq!(v.status, Status::Active);
    }

    #[test]
    fn add_then_select_round_trips_form() {
        let mut roster = Roster::new(memory_db());
        let submitted = StudentForm {
            first_name: "Ana".into(),
            last_name: "Lee".into(),
            email: "ana@example.com".into(),
            phone: "555-0100".into(),
            date_of_birth: "2004-05-06".into(),
            address: "1 Main St\nApt 2".into(),
            status: "Graduated".into(),
        };
        let id = roster.add(&submitted).expect("add");
        assert_eq!(roster.selected(), None);

        let loaded = roster.select(id).expect("select");
        assert_eq!(loaded, submitted);
        assert_eq!(roster.selected(), Some(id));
    }

    #[test]
    fn scenario_add_single_student_lists_one_row() {
        let mut roster = Roster::new(memory_db());
        roster
            .add(&form("Ana", "Lee", "ana@example.com"))
            .expect("add");
        let rows = roster.list().expect("list");
        assert_eq!(rows.len(), 1);
        let s = &rows[0];
        assert_eq!(
            (
                s.last_name.as_str(),
                s.first_name.as_str(),
                s.email.as_str(),
                s.phone.as_deref().unwrap_or(""),
                s.status.as_str()
            ),
            ("Lee", "Ana", "ana@example.com", "", "Active")
        );
        assert_eq!(s.enrollment_date.as_deref(), Some(db::today().as_str()));
    }

    #[test]
    fn duplicate_email_add_is_rejected() {
        let mut roster = Roster::new(memory_db());
        roster.add(&form("Ana", "Lee", "ana@example.com")).expect("first");
        let e = roster
            .add(&form("Anna", "Li", "ana@example.com"))
            .expect_err("second");
        assert_eq!(e.code(), "email_exists");
        assert_eq!(roster.list().expect("list").len(), 1);
    }

    #[test]
    fn update_requires_selection_and_keeps_it_on_conflict() {
        let mut roster = Roster::new(memory_db());
        let a = roster.add(&form("Ana", "Lee", "ana@example.com")).expect("a");
        roster.add(&form("Bo", "Kim", "bo@example.com")).expect("b");

        let e = roster.update(&form("Ana", "Lee", "x@example.com")).expect_err("none");
        assert!(matches!(e, RosterError::NoSelection));

        roster.select(a).expect("select");
        let e = roster
            .update(&form("Ana", "Lee", "bo@example.com"))
            .expect_err("conflict");
        assert!(matches!(e, RosterError::UniqueViolation { .. }));
        assert_eq!(roster.selected(), Some(a));

        let id = roster
            .update(&form("Ana", "Lee-Park", "ana@example.com"))
            .expect("update");
        assert_eq!(id, a);
        assert_eq!(roster.selected(), None);
        assert_eq!(roster.get(a).expect("get").last_name, "Lee-Park");
    }

    #[test]
    fn delete_needs_selection_and_confirmation() {
        let mut roster = Roster::new(memory_db());
        let a = roster.add(&form("Ana", "Lee", "ana@example.com")).expect("a");

        assert!(matches!(roster.delete(true), Err(RosterError::NoSelection)));

        roster.select(a).expect("select");
        assert_eq!(roster.delete(false).expect("declined"), DeleteOutcome::Declined);
        assert_eq!(roster.selected(), Some(a));
        assert!(roster.get(a).is_ok());

        assert_eq!(roster.delete(true).expect("deleted"), DeleteOutcome::Deleted(a));
        assert!(matches!(roster.get(a), Err(RosterError::NotFound(_))));
        assert_eq!(roster.selected(), None);
    }

    #[test]
    fn select_missing_keeps_previous_selection() {
        let mut roster = Roster::new(memory_db());
        let a = roster.add(&form("Ana", "Lee", "ana@example.com")).expect("a");
        roster.select(a).expect("select");
        assert!(matches!(roster.select(a + 100), Err(RosterError::NotFound(_))));
        assert_eq!(roster.selected(), Some(a));
        roster.clear();
        assert_eq!(roster.selected(), None);
    }

    #[test]
    fn empty_search_equals_list() {
        let mut roster = Roster::new(memory_db());
        roster.add(&form("Zoe", "Adams", "z@example.com")).expect("1");
        roster.add(&form("Ana", "Lee", "ana@example.com")).expect("2");
        roster.add(&form("Bo", "Kim", "bo@school.org")).expect("3");
        assert_eq!(roster.search("").expect("empty"), roster.list().expect("list"));
        assert_eq!(roster.search("   ").expect("blank"), roster.list().expect("list"));

        let hits = roster.search("example").expect("term");
        let names: Vec<&str> = hits.iter().map(|s| s.first_name.as_str()).collect();
        assert_eq!(names, vec!["Zoe", "Ana"]);
    }
}
