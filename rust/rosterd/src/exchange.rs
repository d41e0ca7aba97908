use crate::db::{self, StatusCounts};
use crate::error::RosterError;
use crate::roster;
use crate::student::{Student, StudentForm};
use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CSV_HEADERS: [&str; 9] = [
    "ID",
    "First Name",
    "Last Name",
    "Email",
    "Phone",
    "Date of Birth",
    "Enrollment Date",
    "Address",
    "Status",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub read: usize,
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRow {
    /// 1-based data row, header excluded.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    pub generated_at: String,
    /// `total - active`, the figure printed in the report.
    pub inactive: i64,
    pub counts: StatusCounts,
}

#[derive(Debug, Deserialize)]
struct CsvStudentRow {
    #[serde(rename = "First Name", default)]
    first_name: String,
    #[serde(rename = "Last Name", default)]
    last_name: String,
    #[serde(rename = "Email", default)]
    email: String,
    #[serde(rename = "Phone", default)]
    phone: String,
    #[serde(rename = "Date of Birth", default)]
    date_of_birth: String,
    #[serde(rename = "Enrollment Date", default)]
    enrollment_date: String,
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Status", default)]
    status: String,
}

fn staging_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".writing");
    PathBuf::from(s)
}

/// Write through a sibling staging file and rename it over `path` once the
/// body is complete.
fn write_atomically<F>(path: &Path, body: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut File) -> anyhow::Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let tmp = staging_path(path);
    let mut file = File::create(&tmp)
        .with_context(|| format!("failed to create output file {}", path.display()))?;
    let written = body(&mut file).and_then(|_| {
        file.flush()
            .with_context(|| format!("failed to flush {}", path.display()))
    });
    drop(file);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move output into place at {}", path.display()))?;
    Ok(())
}

pub fn export_csv(conn: &Connection, path: &Path) -> anyhow::Result<usize> {
    let students = db::list_students(conn).context("failed to read students")?;
    write_atomically(path, |file| {
        let mut w = csv::Writer::from_writer(file);
        w.write_record(CSV_HEADERS)
            .context("failed to write CSV header")?;
        for s in &students {
            let id = s.id.to_string();
            w.write_record([
                id.as_str(),
                s.first_name.as_str(),
                s.last_name.as_str(),
                s.email.as_str(),
                s.phone.as_deref().unwrap_or(""),
                s.date_of_birth.as_deref().unwrap_or(""),
                s.enrollment_date.as_deref().unwrap_or(""),
                s.address.as_deref().unwrap_or(""),
                s.status.as_str(),
            ])
            .with_context(|| format!("failed to write student {}", s.id))?;
        }
        w.flush().context("failed to flush CSV writer")?;
        Ok(())
    })?;
    info!(path = %path.display(), rows = students.len(), "exported students");
    Ok(students.len())
}

fn import_row(conn: &Connection, row: CsvStudentRow) -> Result<i64, RosterError> {
    let form = StudentForm {
        first_name: row.first_name,
        last_name: row.last_name,
        email: row.email,
        phone: row.phone,
        date_of_birth: row.date_of_birth,
        address: row.address,
        status: row.status,
    };
    let mut fields = roster::validate(&form)?;
    let enrollment_date = row.enrollment_date.trim();
    if NaiveDate::parse_from_str(enrollment_date, "%Y-%m-%d").is_ok() {
        fields.enrollment_date = Some(enrollment_date.to_string());
    }
    Ok(db::insert_student(conn, &fields)?)
}

/// Insert every row that validates and does not collide on email. Rejected
/// rows are reported in the summary; rows already inserted stay inserted.
pub fn import_csv(conn: &Connection, path: &Path) -> anyhow::Result<ImportSummary> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let summary = rdr.deserialize::<CsvStudentRow>().try_fold(
        ImportSummary::default(),
        |mut acc, record| -> anyhow::Result<ImportSummary> {
            acc.read += 1;
            let outcome = match record {
                Ok(row) => import_row(conn, row),
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => {
                    return Err(anyhow!(e))
                        .with_context(|| format!("failed to read {}", path.display()));
                }
                Err(e) => Err(RosterError::validation("row", e.to_string())),
            };
            match outcome {
                Ok(_) => acc.imported += 1,
                Err(e @ (RosterError::Validation { .. } | RosterError::UniqueViolation { .. })) => {
                    debug!(row = acc.read, error = %e, "import row skipped");
                    acc.skipped.push(SkippedRow {
                        row: acc.read,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    return Err(anyhow!(e)).with_context(|| format!("import stopped at row {}", acc.read));
                }
            }
            Ok(acc)
        },
    )?;

    info!(
        path = %path.display(),
        imported = summary.imported,
        read = summary.read,
        "imported students"
    );
    Ok(summary)
}

fn render_report(generated_at: &str, counts: &StatusCounts, students: &[Student]) -> String {
    let mut out = String::new();
    out.push_str("STUDENT MANAGEMENT SYSTEM REPORT\n");
    out.push_str(&"=".repeat(40));
    out.push_str("\n\n");
    out.push_str(&format!("Generated on: {}\n\n", generated_at));
    out.push_str(&format!("Total: {}\n", counts.total));
    out.push_str(&format!("Active: {}\n", counts.active));
    // Inactive is everything not Active, Graduated included.
    out.push_str(&format!("Inactive: {}\n\n", counts.total - counts.active));
    out.push_str("STUDENT LIST:\n");
    out.push_str(&"-".repeat(20));
    out.push('\n');
    for s in students {
        out.push_str(&format!(
            "{} - {} ({})\n",
            s.display_name(),
            s.email,
            s.status
        ));
    }
    out
}

pub fn generate_report(conn: &Connection, path: &Path) -> anyhow::Result<ReportSummary> {
    let counts = db::status_counts(conn).context("failed to count students")?;
    let students = db::list_students(conn).context("failed to read students")?;
    let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let text = render_report(&generated_at, &counts, &students);

    write_atomically(path, |file| {
        file.write_all(text.as_bytes())
            .with_context(|| format!("failed to write report {}", path.display()))
    })?;
    info!(path = %path.display(), total = counts.total, "report generated");

    Ok(ReportSummary {
        generated_at,
        inactive: counts.total - counts.active,
        counts,
    })
}
