use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendd");
    let mut child = Command::new(exe)
        .env_remove("ATTENDD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn error_code(v: &serde_json::Value) -> Option<&str> {
    v.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("attendd-router-smoke");
    let bundle_out = workspace.join("smoke.attendd.zip");
    let csv_out = workspace.join("exports/smoke-report.csv");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["result"]["workspacePath"].is_null());

    let early = request(&mut stdin, &mut reader, "2", "batches.list", json!({}));
    assert_eq!(error_code(&early), Some("no_workspace"));

    let selected = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["result"]["rosterCreated"], json!(true));
    assert_eq!(selected["result"]["logCreated"], json!(true));

    let batches = request(&mut stdin, &mut reader, "4", "batches.list", json!({}));
    assert_eq!(
        batches["result"]["batches"],
        json!(["CS-101 (Section A)", "CS-102 (Section B)", "MATH-201"])
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "5",
        "batches.roster",
        json!({ "batch": "MATH-201" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.dayOpen",
        json!({ "batch": "MATH-201", "date": "2024-09-03" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.submit",
        json!({
            "batch": "MATH-201",
            "date": "2024-09-03",
            "records": [
                { "roll": "1", "name": "Ivan", "status": "Present" },
                { "roll": "2", "name": "Judy", "status": "Absent" }
            ]
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "reports.build",
        json!({ "batch": "MATH-201" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "reports.exportCsv",
        json!({ "outPath": csv_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "reports.heatmapModel",
        json!({ "batch": "MATH-201" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "backup.exportWorkspaceBundle",
        json!({ "outPath": bundle_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12",
        "backup.importWorkspaceBundle",
        json!({ "inPath": bundle_out.to_string_lossy() }),
    );

    writeln!(stdin, "{{\"id\":\"13\",\"method\":\"reports.build\",\"params\":{{\"batch\":\"MATH-201\"}}}}")
        .expect("write raw request");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read raw response");
    let raw: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(raw["ok"], json!(true));

    writeln!(stdin, "not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json response");
    let bad: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(error_code(&bad), Some("bad_json"));

    let unknown = {
        let payload = json!({ "id": "14", "method": "students.create", "params": {} });
        writeln!(stdin, "{}", payload).expect("write");
        stdin.flush().expect("flush");
        let mut line = String::new();
        reader.read_line(&mut line).expect("read");
        serde_json::from_str::<serde_json::Value>(line.trim()).expect("json")
    };
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    assert!(csv_out.is_file());
    assert!(bundle_out.is_file());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
