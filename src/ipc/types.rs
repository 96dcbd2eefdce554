use serde::Deserialize;

use crate::report::ReportTable;
use crate::store::Workspace;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything the sidecar remembers between requests.
#[derive(Debug, Default)]
pub struct AppState {
    pub workspace: Option<Workspace>,
    /// The most recent successful `reports.build`, for `reports.exportCsv`.
    pub last_report: Option<ReportTable>,
}
