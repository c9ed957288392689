//! CLI tests for the faultop collector binary.

use std::process::Command;

fn run_faultop(args: &[&str]) -> (std::process::ExitStatus, String) {
    let exe = env!("CARGO_BIN_EXE_faultop");
    let output = Command::new(exe).args(args).output().expect("run faultop");
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    (output.status, text)
}

#[test]
fn help_prints_usage_and_exits_cleanly() {
    let (status, text) = run_faultop(&["--help"]);
    assert!(status.success());
    assert!(text.contains("--injectors"), "usage missing: {text}");
}

#[test]
fn unparseable_configuration_is_fatal() {
    let (status, text) = run_faultop(&["--injectors", "/nonexistent/injectors.json"]);
    assert!(!status.success());
    assert!(text.contains("injector configuration"), "unexpected output: {text}");
}

#[test]
fn configuration_with_no_valid_specs_is_fatal() {
    assert_cmd::Command::new(env!("CARGO_BIN_EXE_faultop"))
        .args(["--injectors", r#"[{"type": "Disk", "tag": "nope"}]"#])
        .assert()
        .failure();
}

#[test]
fn tiny_run_writes_a_labeled_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("dataset.csv");
    let (status, text) = run_faultop(&[
        "--injectors",
        r#"[{"type": "Memory", "tag": "mem_cli", "items_for_loop": 8}]"#,
        "--normal-obs",
        "1",
        "--injection-obs",
        "1",
        "--pause-ms",
        "1",
        "--out",
        out.to_str().unwrap(),
    ]);
    assert!(status.success(), "run failed: {text}");

    let data = std::fs::read_to_string(&out).expect("dataset written");
    let lines: Vec<&str> = data.lines().collect();
    // header + one normal row + one injected row
    assert_eq!(lines.len(), 3, "unexpected dataset: {data}");
    assert!(lines[0].starts_with("time_ms,datetime"));
    assert!(lines[1].ends_with("None"));
    assert!(lines[2].contains("[mem_cli]MemoryStressInjector"));
}
