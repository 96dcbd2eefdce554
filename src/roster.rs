use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::model::{normalize_roll, RollValue, Student};

const SAMPLE_BATCHES: [(&str, [&str; 4]); 3] = [
    ("CS-101 (Section A)", ["Alice", "Bob", "Charlie", "David"]),
    ("CS-102 (Section B)", ["Eve", "Frank", "Grace", "Heidi"]),
    ("MATH-201", ["Ivan", "Judy", "Mallory", "Trent"]),
];

/// A roster entry is either `{roll, name}` or, in older files, a bare name.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Student { roll: RollValue, name: String },
    NameOnly(String),
}

/// Snapshot of the roster file: batch name to students in file order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    batches: BTreeMap<String, Vec<Student>>,
}

impl Roster {
    /// Reads the roster file. A missing file is an empty roster; a file that
    /// does not parse is `MalformedStore`.
    pub fn load(path: &Path) -> CoreResult<Roster> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "roster file missing, using empty roster");
                return Ok(Roster::default());
            }
            Err(e) => return Err(CoreError::io(path, e)),
        };
        let roster = Roster::parse(&text).map_err(|m| CoreError::malformed(path, m))?;
        debug!(path = %path.display(), batches = roster.batches.len(), "loaded roster");
        Ok(roster)
    }

    pub fn parse(text: &str) -> Result<Roster, String> {
        if text.trim().is_empty() {
            return Ok(Roster::default());
        }
        let raw: BTreeMap<String, Vec<RawEntry>> =
            serde_json::from_str(text).map_err(|e| e.to_string())?;

        let mut batches = BTreeMap::new();
        for (batch, entries) in raw {
            let mut seen = HashSet::new();
            let mut students = Vec::with_capacity(entries.len());
            for (idx, entry) in entries.into_iter().enumerate() {
                let (roll, name) = match entry {
                    RawEntry::Student { roll, name } => (normalize_roll(&roll.into_string()), name),
                    RawEntry::NameOnly(name) => ((idx + 1).to_string(), name),
                };
                if roll.is_empty() {
                    return Err(format!("batch {batch:?} entry {} has an empty roll", idx + 1));
                }
                if !seen.insert(roll.clone()) {
                    return Err(format!("batch {batch:?} lists roll {roll:?} more than once"));
                }
                students.push(Student {
                    roll,
                    name: name.trim().to_string(),
                });
            }
            let name = batch.trim().to_string();
            if batches.insert(name.clone(), students).is_some() {
                return Err(format!("batch {name:?} is listed more than once"));
            }
        }
        Ok(Roster { batches })
    }

    /// Batch names in sorted order.
    pub fn batch_names(&self) -> Vec<String> {
        self.batches.keys().cloned().collect()
    }

    /// Students of `batch` in file order; empty when the batch is unknown.
    pub fn students(&self, batch: &str) -> &[Student] {
        self.batches
            .get(batch.trim())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Roll of the first student in `batch` whose name matches exactly after
    /// trimming.
    pub fn roll_for_name(&self, batch: &str, name: &str) -> Option<&str> {
        let name = name.trim();
        self.students(batch)
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.roll.as_str())
    }

    pub fn name_for_roll(&self, batch: &str, roll: &str) -> Option<&str> {
        self.students(batch)
            .iter()
            .find(|s| s.roll == roll)
            .map(|s| s.name.as_str())
    }
}

pub fn sample_roster_json() -> serde_json::Result<String> {
    let sample: BTreeMap<&str, Vec<Student>> = SAMPLE_BATCHES
        .iter()
        .map(|(batch, names)| {
            let students = names
                .iter()
                .enumerate()
                .map(|(i, name)| Student {
                    roll: (i + 1).to_string(),
                    name: name.to_string(),
                })
                .collect();
            (*batch, students)
        })
        .collect();
    serde_json::to_string_pretty(&sample)
}
