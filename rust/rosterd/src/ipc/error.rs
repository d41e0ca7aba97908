use serde_json::json;

use crate::error::RosterError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn roster_err(id: &str, e: &RosterError) -> serde_json::Value {
    let details = match e {
        RosterError::Validation { field, .. } => Some(json!({ "field": field })),
        RosterError::UniqueViolation { email } => Some(json!({ "email": email })),
        RosterError::NotFound(student_id) => Some(json!({ "studentId": student_id })),
        _ => None,
    };
    err(id, e.code(), e.to_string(), details)
}
