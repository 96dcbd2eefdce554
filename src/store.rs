use anyhow::Context;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::attendance_log;
use crate::error::{CoreError, CoreResult};
use crate::roster;

pub const ROSTER_FILE: &str = "batches.json";
pub const LOG_FILE: &str = "attendance.csv";

/// The directory that holds one roster file and one attendance log.
#[derive(Debug, Clone)]
pub struct Workspace {
    dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapSummary {
    pub roster_created: bool,
    pub log_created: bool,
}

impl Workspace {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Workspace { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn roster_path(&self) -> PathBuf {
        self.dir.join(ROSTER_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    /// Creates the directory and any missing store file. Existing files are
    /// never touched, so calling this on every open is safe.
    pub fn bootstrap(&self) -> anyhow::Result<BootstrapSummary> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create workspace {}", self.dir.display()))?;

        let roster_path = self.roster_path();
        let roster_created = !roster_path.exists();
        if roster_created {
            let body = roster::sample_roster_json().context("failed to serialize sample roster")?;
            replace_file(&roster_path, body.as_bytes())?;
            info!(path = %roster_path.display(), "created sample roster");
        }

        let log_path = self.log_path();
        let log_created = !log_path.exists();
        if log_created {
            let body = attendance_log::encode(&[])?;
            replace_file(&log_path, &body)?;
            info!(path = %log_path.display(), "created empty attendance log");
        }

        Ok(BootstrapSummary {
            roster_created,
            log_created,
        })
    }
}

/// Writes `bytes` to a sibling temp file and renames it over `path`, so a
/// crash mid-write leaves the previous file in place.
pub fn replace_file(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    let tmp = stage_file(path, bytes)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        CoreError::io(path, e)
    })
}

/// Writes and syncs the temp file that `replace_file` would rename over
/// `path`, and returns its location. The caller owns the rename.
pub fn stage_file(path: &Path, bytes: &[u8]) -> CoreResult<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.writing"));

    let mut out = File::create(&tmp).map_err(|e| CoreError::io(&tmp, e))?;
    out.write_all(bytes).map_err(|e| CoreError::io(&tmp, e))?;
    out.sync_all().map_err(|e| CoreError::io(&tmp, e))?;
    Ok(tmp)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static SEQ: AtomicUsize = AtomicUsize::new(0);

    pub fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos(),
            SEQ.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }
}
