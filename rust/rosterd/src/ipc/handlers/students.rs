use super::roster;
use crate::ipc::error::{err, ok, roster_err};
use crate::ipc::types::{AppState, Request};
use crate::roster::{DeleteOutcome, Roster};
use crate::student::StudentForm;
use serde_json::json;

fn student_id(req: &Request) -> Result<i64, serde_json::Value> {
    let v = req.params.get("studentId");
    v.and_then(|v| v.as_i64())
        .or_else(|| v.and_then(|v| v.as_str()).and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| err(&req.id, "bad_params", "missing studentId", None))
}

fn form_params(req: &Request) -> Result<StudentForm, serde_json::Value> {
    if req.params.is_null() {
        return Ok(StudentForm::default());
    }
    serde_json::from_value(req.params.clone()).map_err(|e| {
        err(
            &req.id,
            "bad_params",
            format!("invalid student form: {e}"),
            None,
        )
    })
}

/// Re-read the full list after a write so the caller renders committed state.
fn refreshed(roster: &Roster, req: &Request, mut result: serde_json::Value) -> serde_json::Value {
    match roster.list() {
        Ok(students) => {
            result["students"] = json!(students);
            ok(&req.id, result)
        }
        Err(e) => roster_err(&req.id, &e),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match roster(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    match roster.list() {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => roster_err(&req.id, &e),
    }
}

fn handle_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match roster(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let term = req
        .params
        .get("term")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    match roster.search(term) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => roster_err(&req.id, &e),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match roster(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let id = match student_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match roster.get(id) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => roster_err(&req.id, &e),
    }
}

fn handle_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match roster(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let id = match student_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match roster.select(id) {
        Ok(form) => ok(&req.id, json!({ "studentId": id, "form": form })),
        Err(e) => roster_err(&req.id, &e),
    }
}

fn handle_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match roster(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    roster.clear();
    ok(&req.id, json!({ "form": StudentForm::default() }))
}

fn handle_validate(req: &Request) -> serde_json::Value {
    let form = match form_params(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match crate::roster::validate(&form) {
        Ok(_) => ok(&req.id, json!({ "valid": true })),
        Err(e) => roster_err(&req.id, &e),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match roster(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let form = match form_params(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match roster.add(&form) {
        Ok(id) => refreshed(
            roster,
            req,
            json!({ "studentId": id, "form": StudentForm::default() }),
        ),
        Err(e) => roster_err(&req.id, &e),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match roster(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let form = match form_params(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    match roster.update(&form) {
        Ok(id) => refreshed(
            roster,
            req,
            json!({ "studentId": id, "form": StudentForm::default() }),
        ),
        Err(e) => roster_err(&req.id, &e),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let roster = match roster(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let confirmed = req
        .params
        .get("confirm")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    match roster.delete(confirmed) {
        Ok(DeleteOutcome::Deleted(id)) => refreshed(
            roster,
            req,
            json!({ "deleted": true, "studentId": id, "form": StudentForm::default() }),
        ),
        Ok(DeleteOutcome::Declined) => ok(
            &req.id,
            json!({ "deleted": false, "studentId": roster.selected() }),
        ),
        Err(e) => roster_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_list(state, req)),
        "students.search" => Some(handle_search(state, req)),
        "students.get" => Some(handle_get(state, req)),
        "students.select" => Some(handle_select(state, req)),
        "students.clear" => Some(handle_clear(state, req)),
        "students.validate" => Some(handle_validate(req)),
        "students.create" => Some(handle_create(state, req)),
        "students.update" => Some(handle_update(state, req)),
        "students.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
