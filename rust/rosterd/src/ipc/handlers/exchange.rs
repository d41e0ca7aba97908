use super::{required_str, roster};
use crate::ipc::error::{ok, roster_err};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match roster(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };
    match roster.export_csv(&path) {
        Ok(row_count) => ok(
            &req.id,
            json!({ "path": path.to_string_lossy(), "rowCount": row_count }),
        ),
        Err(e) => roster_err(&req.id, &e),
    }
}

fn handle_import_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match roster(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };
    let summary = match roster.import_csv(&path) {
        Ok(s) => s,
        Err(e) => return roster_err(&req.id, &e),
    };
    match roster.list() {
        Ok(students) => ok(
            &req.id,
            json!({
                "imported": summary.imported,
                "read": summary.read,
                "skipped": summary.skipped,
                "students": students,
            }),
        ),
        Err(e) => roster_err(&req.id, &e),
    }
}

fn handle_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match roster(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(resp) => return resp,
    };
    match roster.generate_report(&path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "path": path.to_string_lossy(),
                "generatedAt": summary.generated_at,
                "total": summary.counts.total,
                "active": summary.counts.active,
                "inactive": summary.inactive,
                "graduated": summary.counts.graduated,
                "statusCounts": {
                    "Active": summary.counts.active,
                    "Inactive": summary.counts.inactive,
                    "Graduated": summary.counts.graduated,
                },
            }),
        ),
        Err(e) => roster_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.exportCsv" => Some(handle_export_csv(state, req)),
        "students.importCsv" => Some(handle_import_csv(state, req)),
        "report.generate" => Some(handle_report(state, req)),
        _ => None,
    }
}
