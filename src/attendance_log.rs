use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::model::{format_date, normalize_roll, parse_iso_date, AttendanceRecord, Status};
use crate::roster::Roster;
use crate::store::replace_file;

pub const LOG_COLUMNS: [&str; 5] = ["roll_no", "student_name", "status", "date", "batch"];

/// Older logs carry `date,batch,student_name,status` and no roll column.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    roll_no: Option<String>,
    student_name: String,
    status: String,
    date: String,
    batch: String,
}

impl RawRow {
    fn validate(self, roll: String) -> Result<AttendanceRecord, String> {
        let status: Status = self.status.parse()?;
        let date = parse_iso_date(&self.date).map_err(|e| e.to_string())?;
        Ok(AttendanceRecord {
            roll,
            name: self.student_name.trim().to_string(),
            status,
            date,
            batch: self.batch.trim().to_string(),
        })
    }
}

/// In-memory copy of the attendance log file, in file order.
#[derive(Debug, Clone, Default)]
pub struct AttendanceLog {
    records: Vec<AttendanceRecord>,
}

impl AttendanceLog {
    #[cfg(test)]
    pub fn from_records(records: Vec<AttendanceRecord>) -> Self {
        AttendanceLog { records }
    }

    /// Reads and validates every row. A missing or zero-byte file is an empty
    /// log; any row that fails validation makes the whole file `MalformedStore`.
    /// `roster` resolves rolls for rows written in the roll-less layout.
    pub fn load(path: &Path, roster: &Roster) -> CoreResult<AttendanceLog> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "attendance log missing, using empty log");
                return Ok(AttendanceLog::default());
            }
            Err(e) => return Err(CoreError::io(path, e)),
        };
        let log =
            AttendanceLog::decode(&bytes, roster).map_err(|m| CoreError::malformed(path, m))?;
        debug!(path = %path.display(), rows = log.records.len(), "loaded attendance log");
        Ok(log)
    }

    /// Decodes the log. Rows without a `roll_no` column get their roll from the
    /// roster by student name; a name the roster does not know is kept as its
    /// own roll so the row still shows up as unmatched.
    pub fn decode(bytes: &[u8], roster: &Roster) -> Result<AttendanceLog, String> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(bytes);
        let legacy = !rdr
            .headers()
            .map_err(|e| format!("header: {e}"))?
            .iter()
            .any(|h| h == "roll_no");

        let mut records = Vec::new();
        let mut unresolved = 0usize;
        for (idx, row) in rdr.deserialize::<RawRow>().enumerate() {
            let row_no = idx + 1;
            let raw = row.map_err(|e| format!("row {row_no}: {e}"))?;
            let roll = if legacy {
                let name = raw.student_name.trim();
                if name.is_empty() {
                    return Err(format!("row {row_no}: empty student_name"));
                }
                match roster.roll_for_name(&raw.batch, name) {
                    Some(roll) => roll.to_string(),
                    None => {
                        unresolved += 1;
                        name.to_string()
                    }
                }
            } else {
                normalize_roll(raw.roll_no.as_deref().unwrap_or_default())
            };
            if roll.is_empty() {
                return Err(format!("row {row_no}: empty roll_no"));
            }
            let record = raw.validate(roll).map_err(|e| format!("row {row_no}: {e}"))?;
            records.push(record);
        }
        if legacy && !records.is_empty() {
            info!(rows = records.len(), "read attendance log without roll_no column");
        }
        if unresolved > 0 {
            warn!(unresolved, "log rows name students missing from the roster");
        }
        Ok(AttendanceLog { records })
    }

    /// Rewrites the whole file in the `LOG_COLUMNS` layout.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let bytes = encode(&self.records).map_err(|e| CoreError::io(path, e))?;
        replace_file(path, &bytes)?;
        info!(path = %path.display(), rows = self.records.len(), "wrote attendance log");
        Ok(())
    }

    #[cfg(test)]
    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    pub fn for_batch<'a>(&'a self, batch: &'a str) -> impl Iterator<Item = &'a AttendanceRecord> {
        self.records.iter().filter(move |r| r.batch == batch)
    }

    pub fn for_day<'a>(
        &'a self,
        batch: &'a str,
        date: NaiveDate,
    ) -> impl Iterator<Item = &'a AttendanceRecord> {
        self.for_batch(batch).filter(move |r| r.date == date)
    }

    pub fn has_day(&self, batch: &str, date: NaiveDate) -> bool {
        self.for_day(batch, date).next().is_some()
    }

    /// Drops every record of `(batch, date)` and returns how many went.
    pub fn remove_day(&mut self, batch: &str, date: NaiveDate) -> usize {
        let before = self.records.len();
        self.records.retain(|r| !(r.batch == batch && r.date == date));
        before - self.records.len()
    }

    pub fn append(&mut self, records: impl IntoIterator<Item = AttendanceRecord>) {
        self.records.extend(records);
    }
}

/// Serializes records as CSV with the `LOG_COLUMNS` header.
pub fn encode(records: &[AttendanceRecord]) -> std::io::Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(LOG_COLUMNS)?;
    for r in records {
        let date = format_date(r.date);
        wtr.write_record([
            r.roll.as_str(),
            r.name.as_str(),
            r.status.as_str(),
            date.as_str(),
            r.batch.as_str(),
        ])?;
    }
    wtr.into_inner().map_err(|e| e.into_error())
}
