use std::process::{Command, Stdio};

fn importer() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sky-importer"));
    cmd.stdin(Stdio::null()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn missing_table_is_a_usage_error() {
    let output = importer().arg("events.json").output().expect("spawn importer");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--table"), "stderr: {stderr}");
}

#[test]
fn unreachable_server_fails_before_reading_input() {
    let output = importer()
        .args(["--host", "127.0.0.1", "--port", "1", "--table", "users"])
        .args(["--request-timeout", "2", "does-not-exist.json"])
        .output()
        .expect("spawn importer");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("server is not running"), "stderr: {stderr}");
    assert!(!stderr.contains("does-not-exist.json"), "stderr: {stderr}");
}
