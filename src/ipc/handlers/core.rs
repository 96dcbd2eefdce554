use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::{BootstrapSummary, Workspace};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

/// Bootstraps `path` and makes it the active workspace. A previously built
/// report belongs to the old workspace and is dropped.
pub fn select_workspace(state: &mut AppState, path: PathBuf) -> anyhow::Result<BootstrapSummary> {
    let ws = Workspace::new(path);
    let summary = ws.bootstrap()?;
    info!(
        path = %ws.dir().display(),
        roster_created = summary.roster_created,
        log_created = summary.log_created,
        "workspace selected"
    );
    state.workspace = Some(ws);
    state.last_report = None;
    Ok(summary)
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|w| w.dir().to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match select_workspace(state, path.clone()) {
        Ok(summary) => {
            let ws = state.workspace.as_ref();
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "rosterPath": ws.map(|w| w.roster_path().to_string_lossy().to_string()),
                    "logPath": ws.map(|w| w.log_path().to_string_lossy().to_string()),
                    "rosterCreated": summary.roster_created,
                    "logCreated": summary.log_created,
                }),
            )
        }
        Err(e) => err(&req.id, "workspace_open_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
