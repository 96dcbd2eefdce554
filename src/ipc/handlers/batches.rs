use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, respond, workspace};
use crate::ipc::types::{AppState, Request};
use crate::roster::Roster;
use serde_json::json;
use tracing::warn;

/// A roster that cannot be read degrades to no batches plus a warning, so the
/// GUI can still start and show the problem.
fn batches_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let ws = workspace(state)?;
    match Roster::load(&ws.roster_path()) {
        Ok(roster) => Ok(json!({ "batches": roster.batch_names() })),
        Err(e) => {
            warn!(error = %e, "roster unavailable, listing no batches");
            let warning = HandlerErr::from(e);
            Ok(json!({
                "batches": [],
                "warning": {
                    "code": warning.code,
                    "message": warning.message,
                    "details": warning.details,
                }
            }))
        }
    }
}

fn batches_roster(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let ws = workspace(state)?;
    let batch = get_required_str(params, "batch")?;
    let roster = Roster::load(&ws.roster_path())?;
    Ok(json!({
        "batch": batch,
        "students": roster.students(&batch),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "batches.list" => Some(respond(&req.id, batches_list(state))),
        "batches.roster" => Some(respond(&req.id, batches_roster(state, &req.params))),
        _ => None,
    }
}
