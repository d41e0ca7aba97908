pub mod core;
pub mod exchange;
pub mod students;

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::roster::Roster;

pub(crate) fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub(crate) fn roster<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut Roster, serde_json::Value> {
    state
        .roster
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}
