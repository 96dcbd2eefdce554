use crate::attendance_log::AttendanceLog;
use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, respond, workspace};
use crate::ipc::types::{AppState, Request};
use crate::model::{format_date, parse_iso_date, Status, SubmittedMark};
use crate::roster::Roster;
use crate::writer;
use serde_json::json;
use std::collections::HashMap;

/// Roster for `batch` with whatever is already recorded for `date`, so the
/// GUI can prefill its toggles and warn before a resubmission.
fn attendance_day_open(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let ws = workspace(state)?;
    let batch = get_required_str(params, "batch")?;
    let date = parse_iso_date(&get_required_str(params, "date")?)?;

    let roster = Roster::load(&ws.roster_path())?;
    let log = AttendanceLog::load(&ws.log_path(), &roster)?;
    let batch_key = batch.trim();

    let mut recorded: HashMap<&str, Status> = HashMap::new();
    for r in log.for_day(batch_key, date) {
        recorded.entry(r.roll.as_str()).or_insert(r.status);
    }

    let students: Vec<serde_json::Value> = roster
        .students(batch_key)
        .iter()
        .map(|s| {
            json!({
                "roll": s.roll,
                "name": s.name,
                "status": recorded.get(s.roll.as_str()),
            })
        })
        .collect();

    Ok(json!({
        "batch": batch_key,
        "date": format_date(date),
        "exists": !recorded.is_empty(),
        "students": students,
    }))
}

fn attendance_submit(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let ws = workspace(state)?;
    let date = get_required_str(params, "date")?;
    let batch = get_required_str(params, "batch")?;
    let Some(records_json) = params.get("records") else {
        return Err(HandlerErr::bad_params("missing records"));
    };
    let marks: Vec<SubmittedMark> = serde_json::from_value(records_json.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid records: {e}")))?;
    let overwrite = params
        .get("overwrite")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let outcome = writer::submit(ws, &date, &batch, &marks, overwrite)?;
    Ok(json!({
        "saved": true,
        "overwritten": outcome.overwritten,
        "recordsWritten": outcome.records_written,
        "message": outcome.message,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.dayOpen" => Some(respond(&req.id, attendance_day_open(state, &req.params))),
        "attendance.submit" => Some(respond(&req.id, attendance_submit(state, &req.params))),
        _ => None,
    }
}
