use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub roll: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Present,
    Absent,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Present => "Present",
            Status::Absent => "Absent",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Present" => Ok(Status::Present),
            "Absent" => Ok(Status::Absent),
            other => Err(format!("status must be Present or Absent, got {other:?}")),
        }
    }
}

/// One row of the attendance log. `(roll, date, batch)` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub roll: String,
    pub name: String,
    pub status: Status,
    pub date: NaiveDate,
    pub batch: String,
}

/// A roll as it appears in JSON: a string, or a number some tools emit for
/// purely numeric rolls. Numbers keep their literal digits.
#[derive(Deserialize)]
#[serde(untagged)]
pub enum RollValue {
    Text(String),
    Number(serde_json::Number),
}

impl RollValue {
    pub fn into_string(self) -> String {
        match self {
            RollValue::Text(s) => s,
            RollValue::Number(n) => n.to_string(),
        }
    }
}

pub fn deserialize_roll<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    RollValue::deserialize(d).map(RollValue::into_string)
}

/// One student's mark inside a day's submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmittedMark {
    #[serde(deserialize_with = "deserialize_roll")]
    pub roll: String,
    #[serde(default)]
    pub name: String,
    pub status: Status,
}

/// Roll numbers are compared as trimmed strings so "007" never collapses to 7.
pub fn normalize_roll(raw: &str) -> String {
    raw.trim().to_string()
}

/// Parses a canonical `YYYY-MM-DD` calendar date. Non-padded forms such as
/// `2024-1-5` are rejected so the log only ever holds one spelling per day.
pub fn parse_iso_date(raw: &str) -> CoreResult<NaiveDate> {
    let t = raw.trim();
    let date = NaiveDate::parse_from_str(t, DATE_FORMAT)
        .map_err(|_| CoreError::InvalidDate(raw.to_string()))?;
    if date.format(DATE_FORMAT).to_string() != t {
        return Err(CoreError::InvalidDate(raw.to_string()));
    }
    Ok(date)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_iso_date_rejects_bad_calendar_days() {
        assert!(parse_iso_date("2024-02-29").is_ok());
        assert!(matches!(
            parse_iso_date("2023-02-29"),
            Err(CoreError::InvalidDate(_))
        ));
        assert!(parse_iso_date("2024-13-01").is_err());
        assert!(parse_iso_date("01/03/2024").is_err());
        assert!(parse_iso_date("2024-3-1").is_err());
        assert!(parse_iso_date("").is_err());
    }

    #[test]
    fn parse_iso_date_tolerates_surrounding_whitespace() {
        let d = parse_iso_date(" 2024-03-01 ").expect("date");
        assert_eq!(format_date(d), "2024-03-01");
    }

    #[test]
    fn status_parses_only_literal_values() {
        assert_eq!("Present".parse::<Status>(), Ok(Status::Present));
        assert_eq!("Absent".parse::<Status>(), Ok(Status::Absent));
        assert!("present".parse::<Status>().is_err());
        assert!("P".parse::<Status>().is_err());
    }

    #[test]
    fn submitted_mark_reads_status_from_json() {
        let m: SubmittedMark =
            serde_json::from_value(serde_json::json!({ "roll": "007", "status": "Absent" }))
                .expect("mark");
        assert_eq!(m.roll, "007");
        assert_eq!(m.name, "");
        assert_eq!(m.status, Status::Absent);
    }

    #[test]
    fn submitted_mark_accepts_numeric_roll() {
        let m: SubmittedMark =
            serde_json::from_value(serde_json::json!({ "roll": 2461001, "status": "Present" }))
                .expect("mark");
        assert_eq!(m.roll, "2461001");

        let bad = serde_json::from_value::<SubmittedMark>(
            serde_json::json!({ "roll": true, "status": "Present" }),
        );
        assert!(bad.is_err());
    }
}
