use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

use crate::attendance_log::AttendanceLog;
use crate::error::{CoreError, CoreResult};
use crate::model::{format_date, Status, Student};
use crate::roster::Roster;
use crate::store::{replace_file, Workspace};

pub const LEADING_COLUMNS: [&str; 2] = ["roll_no", "student_name"];
pub const TRAILING_COLUMNS: [&str; 4] = ["present_count", "absent_count", "total", "percent"];

/// 1-decimal rounding, half away from zero for the non-negative values used
/// here: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub roll: String,
    pub name: String,
    /// One cell per entry of `ReportTable::dates`; `None` when nothing was recorded.
    pub cells: Vec<Option<Status>>,
    pub present_count: usize,
    pub absent_count: usize,
    pub total: usize,
    pub percent: f64,
}

impl ReportRow {
    fn new(student: &Student, cells: Vec<Option<Status>>) -> Self {
        let present_count = cells.iter().filter(|c| **c == Some(Status::Present)).count();
        let absent_count = cells.iter().filter(|c| **c == Some(Status::Absent)).count();
        let total = present_count + absent_count;
        let percent = if total == 0 {
            0.0
        } else {
            round_off_1_decimal(present_count as f64 / total as f64 * 100.0)
        };
        ReportRow {
            roll: student.roll.clone(),
            name: student.name.clone(),
            cells,
            present_count,
            absent_count,
            total,
            percent,
        }
    }
}

/// Per-student summary of one batch. Rows follow roster order; `dates` are
/// ascending ISO dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTable {
    pub batch: String,
    pub dates: Vec<String>,
    pub rows: Vec<ReportRow>,
    /// False when the batch has no log rows yet; the table is still complete.
    pub has_attendance: bool,
    /// Rolls with log rows for this batch that are no longer on the roster.
    pub unmatched_rolls: Vec<String>,
}

impl ReportTable {
    pub fn columns(&self) -> Vec<String> {
        LEADING_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.dates.iter().cloned())
            .chain(TRAILING_COLUMNS.iter().map(|c| c.to_string()))
            .collect()
    }

    /// Presence matrix for the heatmap view: 1.0 present, 0.0 absent,
    /// `None` unrecorded.
    pub fn presence_matrix(&self) -> Vec<Vec<Option<f64>>> {
        self.rows
            .iter()
            .map(|row| {
                row.cells
                    .iter()
                    .map(|c| {
                        c.map(|s| match s {
                            Status::Present => 1.0,
                            Status::Absent => 0.0,
                        })
                    })
                    .collect()
            })
            .collect()
    }

    pub fn write_csv<W: std::io::Write>(&self, out: W) -> csv::Result<()> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(self.columns())?;
        for row in &self.rows {
            let mut record = Vec::with_capacity(self.dates.len() + 6);
            record.push(row.roll.clone());
            record.push(row.name.clone());
            record.extend(
                row.cells
                    .iter()
                    .map(|c| c.map(|s| s.as_str().to_string()).unwrap_or_default()),
            );
            record.push(row.present_count.to_string());
            record.push(row.absent_count.to_string());
            record.push(row.total.to_string());
            record.push(format!("{:.1}", row.percent));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn export_csv(&self, out_path: &Path) -> CoreResult<()> {
        if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        let mut buf = Vec::new();
        self.write_csv(&mut buf)
            .map_err(|e| CoreError::io(out_path, e.into()))?;
        replace_file(out_path, &buf)?;
        info!(batch = %self.batch, path = %out_path.display(), rows = self.rows.len(), "exported report");
        Ok(())
    }
}

/// Loads the current roster and log from `ws` and summarises `batch`.
pub fn build_report(ws: &Workspace, batch: &str) -> CoreResult<ReportTable> {
    let roster = Roster::load(&ws.roster_path())?;
    let students = roster.students(batch);
    if students.is_empty() {
        return Err(CoreError::NoRoster(batch.trim().to_string()));
    }
    let log = AttendanceLog::load(&ws.log_path(), &roster)?;
    build_from(batch, students, &log)
}

pub fn build_from(batch: &str, students: &[Student], log: &AttendanceLog) -> CoreResult<ReportTable> {
    let batch = batch.trim();
    if students.is_empty() {
        return Err(CoreError::NoRoster(batch.to_string()));
    }

    let mut dates: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut pivot: HashMap<&str, BTreeMap<NaiveDate, Status>> = HashMap::new();
    let mut duplicates = 0usize;
    for r in log.for_batch(batch) {
        dates.insert(r.date);
        let cells = pivot.entry(r.roll.as_str()).or_default();
        if cells.contains_key(&r.date) {
            duplicates += 1;
            continue;
        }
        cells.insert(r.date, r.status);
    }
    if duplicates > 0 {
        warn!(batch, duplicates, "duplicate log rows for the same roll and date; kept first");
    }

    let rows = students
        .iter()
        .map(|s| {
            let recorded = pivot.get(s.roll.as_str());
            let cells = dates
                .iter()
                .map(|d| recorded.and_then(|m| m.get(d)).copied())
                .collect();
            ReportRow::new(s, cells)
        })
        .collect();

    let on_roster: HashSet<&str> = students.iter().map(|s| s.roll.as_str()).collect();
    let mut unmatched_rolls: Vec<String> = pivot
        .keys()
        .filter(|roll| !on_roster.contains(*roll))
        .map(|roll| roll.to_string())
        .collect();
    unmatched_rolls.sort();

    Ok(ReportTable {
        batch: batch.to_string(),
        dates: dates.into_iter().map(format_date).collect(),
        rows,
        has_attendance: !pivot.is_empty(),
        unmatched_rolls,
    })
}
