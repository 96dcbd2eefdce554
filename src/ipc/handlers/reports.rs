use crate::ipc::error::HandlerErr;
use crate::ipc::helpers::{get_required_str, respond, workspace};
use crate::ipc::types::{AppState, Request};
use crate::report::{self, ReportTable};
use serde_json::json;
use std::path::PathBuf;

fn report_json(table: &ReportTable) -> Result<serde_json::Value, HandlerErr> {
    let mut v = serde_json::to_value(table).map_err(|e| HandlerErr {
        code: "internal",
        message: e.to_string(),
        details: None,
    })?;
    v["columns"] = json!(table.columns());
    Ok(v)
}

fn reports_build(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let batch = get_required_str(params, "batch")?;
    let table = report::build_report(workspace(state)?, &batch)?;
    let result = report_json(&table)?;
    state.last_report = Some(table);
    Ok(result)
}

fn reports_export_csv(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let out_path = match params.get("outPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => return Err(HandlerErr::bad_params("missing outPath")),
    };
    if let Some(batch) = params.get("batch").and_then(|v| v.as_str()) {
        let table = report::build_report(workspace(state)?, batch)?;
        state.last_report = Some(table);
    }
    let Some(table) = state.last_report.as_ref() else {
        return Err(HandlerErr {
            code: "no_report",
            message: "build a report before exporting".to_string(),
            details: None,
        });
    };
    table.export_csv(&out_path)?;
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "batch": table.batch,
        "rowsExported": table.rows.len(),
    }))
}

fn reports_heatmap_model(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let batch = get_required_str(params, "batch")?;
    let table = report::build_report(workspace(state)?, &batch)?;
    let students: Vec<serde_json::Value> = table
        .rows
        .iter()
        .zip(table.presence_matrix())
        .map(|(row, values)| {
            json!({
                "roll": row.roll,
                "name": row.name,
                "values": values,
            })
        })
        .collect();
    Ok(json!({
        "batch": table.batch,
        "dates": table.dates,
        "hasAttendance": table.has_attendance,
        "students": students,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.build" => Some(respond(&req.id, reports_build(state, &req.params))),
        "reports.exportCsv" => Some(respond(&req.id, reports_export_csv(state, &req.params))),
        "reports.heatmapModel" => Some(respond(&req.id, reports_heatmap_model(state, &req.params))),
        _ => None,
    }
}
