use crate::student::{Status, Student, StudentFields};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

pub const DB_FILE_NAME: &str = "student_management.db";

const STUDENT_COLUMNS: &str = "student_id, first_name, last_name, email, phone, date_of_birth,
     enrollment_date, address, status";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already exists: {email}")]
    UniqueViolation { email: String },
    #[error("student {0} not found")]
    NotFound(i64),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: i64,
    pub active: i64,
    pub inactive: i64,
    pub graduated: i64,
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)?;
    initialize(&conn)?;
    debug!(path = %db_path.display(), "opened roster store");
    Ok(conn)
}

/// Create the roster schema if it is missing. Safe to call on every start.
pub fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            student_id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            phone TEXT,
            date_of_birth DATE,
            enrollment_date DATE DEFAULT CURRENT_DATE,
            address TEXT,
            status TEXT NOT NULL DEFAULT 'Active'
                CHECK(status IN ('Active', 'Inactive', 'Graduated'))
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(last_name, first_name)",
        [],
    )?;

    // Tables written by older builds carry no status CHECK; blank means the default.
    let fixed = conn.execute(
        "UPDATE students SET status = 'Active' WHERE status IS NULL OR TRIM(status) = ''",
        [],
    )?;
    if fixed > 0 {
        debug!(rows = fixed, "defaulted blank student statuses to Active");
    }
    Ok(())
}

/// Decode a stored status. Anything outside the enumeration can only come
/// from a legacy table and reads as `Inactive`, matching how the report
/// counts it.
fn stored_status(id: i64, raw: Option<String>) -> Status {
    let raw = raw.unwrap_or_default();
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Status::Active;
    }
    trimmed.parse().unwrap_or_else(|_| {
        warn!(student_id = id, status = %raw, "unknown stored status, reading as Inactive");
        Status::Inactive
    })
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let id: i64 = row.get(0)?;
    Ok(Student {
        id,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        date_of_birth: row.get(5)?,
        enrollment_date: row.get(6)?,
        address: row.get(7)?,
        status: stored_status(id, row.get(8)?),
    })
}

fn map_write_error(e: rusqlite::Error, email: &str) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::UniqueViolation {
                email: email.to_string(),
            }
        }
        _ => StoreError::Sqlite(e),
    }
}

pub fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

pub fn insert_student(conn: &Connection, fields: &StudentFields) -> Result<i64, StoreError> {
    let enrollment_date = fields.enrollment_date.clone().unwrap_or_else(today);
    conn.execute(
        "INSERT INTO students(
           first_name,
           last_name,
           email,
           phone,
           date_of_birth,
           enrollment_date,
           address,
           status
         ) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            fields.first_name,
            fields.last_name,
            fields.email,
            fields.phone,
            fields.date_of_birth,
            enrollment_date,
            fields.address,
            fields.status,
        ],
    )
    .map_err(|e| map_write_error(e, &fields.email))?;
    Ok(conn.last_insert_rowid())
}

/// Replace every editable column of an existing row. The enrollment date is
/// left untouched.
pub fn update_student(conn: &Connection, id: i64, fields: &StudentFields) -> Result<(), StoreError> {
    let changed = conn
        .execute(
            "UPDATE students
             SET first_name = ?1,
                 last_name = ?2,
                 email = ?3,
                 phone = ?4,
                 date_of_birth = ?5,
                 address = ?6,
                 status = ?7
             WHERE student_id = ?8",
            params![
                fields.first_name,
                fields.last_name,
                fields.email,
                fields.phone,
                fields.date_of_birth,
                fields.address,
                fields.status,
                id,
            ],
        )
        .map_err(|e| map_write_error(e, &fields.email))?;
    if changed == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

pub fn delete_student(conn: &Connection, id: i64) -> Result<(), StoreError> {
    let changed = conn.execute("DELETE FROM students WHERE student_id = ?", [id])?;
    if changed == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

pub fn get_student(conn: &Connection, id: i64) -> Result<Student, StoreError> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = ?");
    conn.query_row(&sql, [id], student_from_row)
        .optional()?
        .ok_or(StoreError::NotFound(id))
}

pub fn list_students(conn: &Connection) -> Result<Vec<Student>, StoreError> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS} FROM students ORDER BY last_name, first_name, student_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Substring match over name, email and phone using the store's `LIKE`
/// collation (ASCII case-insensitive).
pub fn search_students(conn: &Connection, term: &str) -> Result<Vec<Student>, StoreError> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS}
         FROM students
         WHERE first_name LIKE ?1 ESCAPE '\\'
            OR last_name LIKE ?1 ESCAPE '\\'
            OR email LIKE ?1 ESCAPE '\\'
            OR phone LIKE ?1 ESCAPE '\\'
         ORDER BY last_name, first_name, student_id"
    );
    let pattern = like_pattern(term);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([&pattern], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn status_counts(conn: &Connection) -> Result<StatusCounts, StoreError> {
    let mut counts = StatusCounts::default();
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM students GROUP BY status")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let status: Option<String> = row.get(0)?;
        let n: i64 = row.get(1)?;
        counts.total += n;
        match status.as_deref().and_then(|s| s.parse::<Status>().ok()) {
            Some(Status::Active) => counts.active += n,
            Some(Status::Inactive) => counts.inactive += n,
            Some(Status::Graduated) => counts.graduated += n,
            None => {}
        }
    }
    Ok(counts)
}
