//! End-to-end tests that run the `session-lock` binary as separate processes.

use std::fs;
use std::io::{BufRead, BufReader};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

const LOCK_FAILURE: i32 = 4;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_session-lock"))
}

fn run(args: &[&str]) -> Output {
    bin().args(args).output().unwrap()
}

/// Start a holder and block until it reports the lock as acquired.
fn spawn_holder(session: &Path) -> (Child, PathBuf) {
    spawn_holder_with(session, &[])
}

fn spawn_holder_with(session: &Path, extra_args: &[&str]) -> (Child, PathBuf) {
    let mut child = bin()
        .arg("hold")
        .arg(session)
        .args(["--hold-ms", "30000"])
        .args(extra_args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let mut line = String::new();
    BufReader::new(child.stdout.as_mut().unwrap())
        .read_line(&mut line)
        .unwrap();
    let lock_path = line
        .trim()
        .strip_prefix("acquired ")
        .unwrap_or_else(|| panic!("unexpected holder output: {:?}", line))
        .into();
    (child, lock_path)
}

fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}

fn dead_pid() -> u32 {
    let mut child = Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

#[test]
fn contended_lock_times_out_across_processes_and_symlinks() {
    let dir = TempDir::new().unwrap();
    let real = dir.path().join("real");
    fs::create_dir(&real).unwrap();
    let link = dir.path().join("link");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let (mut holder, lock_path) = spawn_holder(&real.join("s.jsonl"));
    assert!(lock_path.exists());

    let output = bin()
        .arg("hold")
        .arg(link.join("s.jsonl"))
        .args(["--timeout-ms", "50", "--hold-ms", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(LOCK_FAILURE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("session file locked"), "stderr: {}", stderr);

    holder.kill().unwrap();
    holder.wait().unwrap();

    // The killed holder's lock is reclaimed as a dead-pid lock
    let output = bin()
        .arg("hold")
        .arg(link.join("s.jsonl"))
        .args(["--timeout-ms", "5000", "--hold-ms", "0"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("released"));
    assert!(!lock_path.exists());
}

#[test]
fn sigterm_releases_held_lock() {
    let dir = TempDir::new().unwrap();
    let (mut holder, lock_path) = spawn_holder(&dir.path().join("s.jsonl"));

    let rc = unsafe { libc::kill(holder.id() as libc::pid_t, libc::SIGTERM) };
    assert_eq!(rc, 0);

    assert!(wait_until(|| !lock_path.exists()));
    let status = holder.wait().unwrap();
    assert!(status.success());
}

#[test]
fn signal_default_releases_lock_then_dies_by_signal() {
    let dir = TempDir::new().unwrap();
    let (mut holder, lock_path) =
        spawn_holder_with(&dir.path().join("s.jsonl"), &["--signal-default"]);

    let rc = unsafe { libc::kill(holder.id() as libc::pid_t, libc::SIGTERM) };
    assert_eq!(rc, 0);

    let status = holder.wait().unwrap();
    assert_eq!(status.signal(), Some(libc::SIGTERM));
    assert!(!lock_path.exists());
}

#[test]
fn dangling_alias_and_target_contend_across_processes() {
    let dir = TempDir::new().unwrap();
    let alias = dir.path().join("b.jsonl");
    std::os::unix::fs::symlink("a.jsonl", &alias).unwrap();

    let (mut holder, lock_path) = spawn_holder(&alias);
    assert!(lock_path.ends_with("a.jsonl.lock"));
    fs::write(&alias, "{}\n").unwrap();

    for path in [&alias, &dir.path().join("a.jsonl")] {
        let output = bin()
            .arg("hold")
            .arg(path)
            .args(["--timeout-ms", "50", "--hold-ms", "0"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(LOCK_FAILURE));
    }

    holder.kill().unwrap();
    holder.wait().unwrap();
}

#[test]
fn released_lock_can_be_acquired_again() {
    let dir = TempDir::new().unwrap();
    let session = dir.path().join("s.jsonl");
    let session_arg = session.to_str().unwrap();

    for _ in 0..2 {
        let output = run(&["hold", session_arg, "--timeout-ms", "100", "--hold-ms", "0"]);
        assert!(output.status.success());
    }
    assert!(!dir.path().join("s.jsonl.lock").exists());
}

#[test]
fn max_hold_prints_timeout_plus_grace() {
    let output = run(&["max-hold", "--timeout-ms", "600000"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "720000");

    let output = run(&["max-hold", "--timeout-ms", "1000"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "121000");
}

#[test]
fn scan_reports_and_cleans_dead_pid_lock() {
    let dir = TempDir::new().unwrap();
    let lock_path = dir.path().join("s.jsonl.lock");
    fs::write(
        &lock_path,
        format!(
            "{{\"pid\": {}, \"createdAt\": \"{}\"}}",
            dead_pid(),
            chrono::Utc::now().to_rfc3339()
        ),
    )
    .unwrap();
    let dir_arg = dir.path().to_str().unwrap();

    let output = run(&["scan", dir_arg, "--json"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["locks"][0]["stale"], true);
    assert_eq!(report["locks"][0]["staleReasons"][0], "dead-pid");
    assert!(report["cleaned"].as_array().unwrap().is_empty());
    assert!(lock_path.exists());

    let output = run(&["scan", dir_arg, "--clean"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Removed: 1 stale lock(s)"));
    assert!(!lock_path.exists());
}

#[test]
fn scan_of_missing_directory_is_empty() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing");

    let output = run(&["scan", missing.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No lock files found"));
}

#[test]
fn config_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("lock.yaml");
    fs::write(&config_path, "timeout_ms: 1234\n").unwrap();

    let output = run(&["config", "--config", config_path.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("timeout_ms: 1234"));
}

#[test]
fn invalid_config_is_a_user_error() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("lock.yaml");
    fs::write(&config_path, "stale_ms: 0\n").unwrap();

    let output = run(&["config", "--config", config_path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("stale_ms"));
}
