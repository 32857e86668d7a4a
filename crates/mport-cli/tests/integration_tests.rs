use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

/// Test context that runs the built `mport` binary against an isolated
/// `$HOME`, so a stray config file never leaks in from the host.
struct TestContext {
    #[allow(dead_code)]
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        Self { temp_dir }
    }

    fn mport_cmd(&self) -> Command {
        let bin_path: PathBuf = env!("CARGO_BIN_EXE_mport").into();
        let mut cmd = Command::new(bin_path);
        cmd.env("HOME", self.temp_dir.path());
        cmd
    }
}

#[test]
fn help_command_lists_usage() {
    let ctx = TestContext::new();
    let output = ctx.mport_cmd().arg("--help").output().expect("failed to run mport");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
}

#[test]
fn version_flag_prints_and_exits_zero() {
    let ctx = TestContext::new();
    let output = ctx.mport_cmd().arg("-v").output().expect("failed to run mport");
    assert!(output.status.success());
}

#[test]
fn version_compare_subcommand_is_terse_and_pure() {
    let ctx = TestContext::new();
    let output = ctx
        .mport_cmd()
        .args(["version", "-t", "1.2", "1.10"])
        .output()
        .expect("failed to run mport");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "<");
}

#[test]
fn unknown_subcommand_exits_nonzero() {
    let ctx = TestContext::new();
    let output = ctx
        .mport_cmd()
        .arg("not-a-real-command")
        .output()
        .expect("failed to run mport");
    assert!(!output.status.success());
}
