use std::collections::HashSet;
use tracing::info;

use crate::attendance_log::AttendanceLog;
use crate::error::{CoreError, CoreResult};
use crate::model::{format_date, normalize_roll, parse_iso_date, AttendanceRecord, SubmittedMark};
use crate::roster::Roster;
use crate::store::Workspace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub overwritten: bool,
    pub records_written: usize,
    pub message: String,
}

/// Commits one day's marks for a batch.
///
/// An existing submission for the same `(date, batch)` is a `Conflict` unless
/// `overwrite` is set, in which case every old row for that pair is dropped
/// before the new ones are appended. A blank submitted name is filled from the
/// roster. Nothing is written on any error.
pub fn submit(
    ws: &Workspace,
    date: &str,
    batch: &str,
    marks: &[SubmittedMark],
    overwrite: bool,
) -> CoreResult<SubmitOutcome> {
    let day = parse_iso_date(date)?;
    let batch = batch.trim();
    let checked = validate_marks(batch, marks)?;

    let roster = Roster::load(&ws.roster_path())?;
    let new_records = checked
        .into_iter()
        .map(|(roll, m)| {
            let name = match m.name.trim() {
                "" => roster.name_for_roll(batch, &roll).unwrap_or_default(),
                given => given,
            }
            .to_string();
            AttendanceRecord {
                roll,
                name,
                status: m.status,
                date: day,
                batch: batch.to_string(),
            }
        })
        .collect::<Vec<_>>();

    let path = ws.log_path();
    let mut log = AttendanceLog::load(&path, &roster)?;
    let date_key = format_date(day);

    let overwritten = log.has_day(batch, day);
    if overwritten {
        if !overwrite {
            return Err(CoreError::Conflict {
                batch: batch.to_string(),
                date: date_key,
            });
        }
        let removed = log.remove_day(batch, day);
        info!(batch, date = %date_key, removed, "replacing existing attendance");
    }

    let records_written = new_records.len();
    log.append(new_records);
    log.save(&path)?;

    let verb = if overwritten { "overwritten" } else { "saved" };
    Ok(SubmitOutcome {
        overwritten,
        records_written,
        message: format!("Attendance for {batch} on {date_key} has been {verb}."),
    })
}

fn validate_marks<'a>(
    batch: &str,
    marks: &'a [SubmittedMark],
) -> CoreResult<Vec<(String, &'a SubmittedMark)>> {
    if batch.is_empty() {
        return Err(CoreError::InvalidSubmission("batch name is empty".to_string()));
    }
    if marks.is_empty() {
        return Err(CoreError::InvalidSubmission("no records to save".to_string()));
    }
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(marks.len());
    for m in marks {
        let roll = normalize_roll(&m.roll);
        if roll.is_empty() {
            return Err(CoreError::InvalidSubmission("record with empty roll".to_string()));
        }
        if !seen.insert(roll.clone()) {
            return Err(CoreError::InvalidSubmission(format!(
                "roll {roll:?} appears more than once"
            )));
        }
        out.push((roll, m));
    }
    Ok(out)
}
