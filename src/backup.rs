use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::store::{stage_file, Workspace, LOG_FILE, ROSTER_FILE};

const MANIFEST_ENTRY: &str = "manifest.json";
pub const BUNDLE_FORMAT_V1: &str = "attendd-workspace-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub files_restored: usize,
}

fn data_entry(file_name: &str) -> String {
    format!("data/{file_name}")
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub fn export_workspace_bundle(ws: &Workspace, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let mut files = Vec::new();
    for name in [ROSTER_FILE, LOG_FILE] {
        let path = ws.dir().join(name);
        if !path.is_file() {
            return Err(anyhow!("workspace file not found: {}", path.display()));
        }
        let bytes =
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        files.push((name, bytes));
    }

    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create output file {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let checksums: serde_json::Map<String, serde_json::Value> = files
        .iter()
        .map(|(name, bytes)| (data_entry(name), json!(sha256_hex(bytes))))
        .collect();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "sha256": checksums,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for (name, bytes) in &files {
        zip.start_file(data_entry(name), opts)
            .with_context(|| format!("failed to start {name} entry"))?;
        zip.write_all(bytes)
            .with_context(|| format!("failed to write {name} entry"))?;
    }
    zip.finish().context("failed to finalize zip bundle")?;

    info!(path = %out_path.display(), "exported workspace bundle");
    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: files.len() + 1,
    })
}

/// Restores both store files from a bundle. Every checksum is verified and
/// both files are staged before the workspace is touched; if an install step
/// fails, files already installed are put back as they were.
pub fn import_workspace_bundle(in_path: &Path, ws: &Workspace) -> anyhow::Result<ImportSummary> {
    if !is_zip_file(in_path)? {
        return Err(anyhow!(
            "not a workspace bundle: {}",
            in_path.display()
        ));
    }
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }

    let mut verified = Vec::new();
    for name in [ROSTER_FILE, LOG_FILE] {
        let entry = data_entry(name);
        let mut bytes = Vec::new();
        archive
            .by_name(&entry)
            .with_context(|| format!("bundle missing {entry}"))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read {entry}"))?;
        let expected = manifest
            .get("sha256")
            .and_then(|m| m.get(&entry))
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("manifest has no checksum for {entry}"))?;
        if sha256_hex(&bytes) != expected {
            return Err(anyhow!("checksum mismatch for {entry}"));
        }
        verified.push((name, bytes));
    }

    std::fs::create_dir_all(ws.dir())
        .with_context(|| format!("failed to create workspace {}", ws.dir().display()))?;
    install_all(ws, &verified)?;

    info!(path = %in_path.display(), "imported workspace bundle");
    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        files_restored: verified.len(),
    })
}

struct Staged {
    target: PathBuf,
    tmp: PathBuf,
    previous: Option<Vec<u8>>,
}

fn install_all(ws: &Workspace, files: &[(&str, Vec<u8>)]) -> anyhow::Result<()> {
    let mut staged: Vec<Staged> = Vec::with_capacity(files.len());
    for (name, bytes) in files {
        let target = ws.dir().join(name);
        let previous = if target.is_file() {
            let bytes = std::fs::read(&target)
                .with_context(|| format!("failed to read {}", target.display()))?;
            Some(bytes)
        } else {
            None
        };
        match stage_file(&target, bytes) {
            Ok(tmp) => staged.push(Staged { target, tmp, previous }),
            Err(e) => {
                discard(&staged);
                return Err(e.into());
            }
        }
    }

    for (idx, s) in staged.iter().enumerate() {
        if let Err(e) = std::fs::rename(&s.tmp, &s.target) {
            discard(&staged[idx..]);
            roll_back(&staged[..idx]);
            return Err(anyhow!(e).context(format!("failed to install {}", s.target.display())));
        }
    }
    Ok(())
}

fn discard(staged: &[Staged]) {
    for s in staged {
        let _ = std::fs::remove_file(&s.tmp);
    }
}

fn roll_back(installed: &[Staged]) {
    for s in installed {
        let restored = match &s.previous {
            Some(bytes) => std::fs::write(&s.target, bytes),
            None => std::fs::remove_file(&s.target),
        };
        if let Err(e) = restored {
            warn!(path = %s.target.display(), error = %e, "could not restore file after failed import");
        }
    }
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.display()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::temp_dir;
    use std::io::Cursor;

    #[test]
    fn zip_export_and_import_roundtrip() {
        let src = Workspace::new(temp_dir("attendd-backup-src"));
        src.bootstrap().expect("bootstrap");
        let log_body = "roll_no,student_name,status,date,batch\n1,Ivan,Present,2024-01-01,MATH-201\n";
        std::fs::write(src.log_path(), log_body).expect("write log");

        let out_dir = temp_dir("attendd-backup-out");
        let bundle = out_dir.join("workspace.attendd.zip");
        let export = export_workspace_bundle(&src, &bundle).expect("export");
        assert_eq!(export.bundle_format, BUNDLE_FORMAT_V1);
        assert_eq!(export.entry_count, 3);

        let dst = Workspace::new(temp_dir("attendd-backup-dst"));
        let import = import_workspace_bundle(&bundle, &dst).expect("import");
        assert_eq!(import.files_restored, 2);
        assert_eq!(std::fs::read_to_string(dst.log_path()).expect("log"), log_body);
        assert_eq!(
            std::fs::read(dst.roster_path()).expect("roster"),
            std::fs::read(src.roster_path()).expect("roster")
        );

        for d in [src.dir(), dst.dir(), out_dir.as_path()] {
            let _ = std::fs::remove_dir_all(d);
        }
    }

    #[test]
    fn tampered_entry_is_rejected_without_touching_workspace() {
        let out_dir = temp_dir("attendd-backup-tamper");
        let bundle = out_dir.join("bad.zip");
        {
            let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
            let opts = FileOptions::default();
            let manifest = json!({
                "format": BUNDLE_FORMAT_V1,
                "sha256": {
                    "data/batches.json": sha256_hex(b"{}"),
                    "data/attendance.csv": sha256_hex(b"original"),
                }
            });
            zip.start_file(MANIFEST_ENTRY, opts).expect("manifest");
            zip.write_all(manifest.to_string().as_bytes()).expect("write");
            zip.start_file("data/batches.json", opts).expect("roster");
            zip.write_all(b"{}").expect("write");
            zip.start_file("data/attendance.csv", opts).expect("log");
            zip.write_all(b"tampered").expect("write");
            let cursor = zip.finish().expect("finish");
            std::fs::write(&bundle, cursor.into_inner()).expect("save bundle");
        }

        let dst = Workspace::new(temp_dir("attendd-backup-tamper-dst"));
        std::fs::write(dst.roster_path(), "keep").expect("seed");
        let e = import_workspace_bundle(&bundle, &dst).expect_err("checksum");
        assert!(e.to_string().contains("checksum mismatch"));
        assert_eq!(std::fs::read_to_string(dst.roster_path()).expect("read"), "keep");

        let _ = std::fs::remove_dir_all(out_dir);
        let _ = std::fs::remove_dir_all(dst.dir());
    }

    #[test]
    fn failed_install_restores_files_already_replaced() {
        let src = Workspace::new(temp_dir("attendd-backup-partial-src"));
        src.bootstrap().expect("bootstrap");
        let out_dir = temp_dir("attendd-backup-partial-out");
        let bundle = out_dir.join("workspace.attendd.zip");
        export_workspace_bundle(&src, &bundle).expect("export");

        let dst = Workspace::new(temp_dir("attendd-backup-partial-dst"));
        std::fs::write(dst.roster_path(), "keep").expect("seed roster");
        std::fs::create_dir_all(dst.log_path().join("blocker")).expect("block log path");

        let e = import_workspace_bundle(&bundle, &dst).expect_err("log cannot be installed");
        assert!(e.to_string().contains("attendance.csv"), "{e:#}");
        assert_eq!(std::fs::read_to_string(dst.roster_path()).expect("read"), "keep");
        assert!(!dst.dir().join("batches.json.writing").exists());
        assert!(!dst.dir().join("attendance.csv.writing").exists());

        for d in [src.dir(), dst.dir(), out_dir.as_path()] {
            let _ = std::fs::remove_dir_all(d);
        }
    }

    #[test]
    fn non_zip_input_is_refused() {
        let dir = temp_dir("attendd-backup-nonzip");
        let p = dir.join("plain.csv");
        std::fs::write(&p, "roll_no\n").expect("write");
        let e = import_workspace_bundle(&p, &Workspace::new(dir.join("ws"))).expect_err("not zip");
        assert!(e.to_string().contains("not a workspace bundle"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
