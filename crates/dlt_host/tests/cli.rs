use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

fn looptest(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_axidma-looptest"))
        .args(args)
        .output()
        .expect("failed to launch axidma-looptest")
}

#[test]
fn help_prints_usage_and_succeeds() {
    let out = looptest(&["-h"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Usage: axidma-looptest"));
    assert!(stdout.contains("-t <DMA tx channel>"));
    assert!(stdout.contains("-r <DMA rx channel>"));
    assert!(stdout.contains("-s <Output size>"));
}

#[test]
fn conflicting_sizes_fail_with_usage() {
    let out = looptest(&["-s", "4096", "-o", "1.0"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage:"));
}

#[test]
fn lone_channel_flags_fail_with_usage() {
    for args in [["-t", "0"], ["-r", "1"]] {
        let out = looptest(&args);
        assert!(!out.status.success(), "{:?} was accepted", args);
        assert!(String::from_utf8_lossy(&out.stderr).contains("Usage:"));
    }
}

#[test]
fn zero_size_is_a_validation_error() {
    let out = looptest(&["--loopback", "-s", "0"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("nonzero"));
}

#[test]
fn short_loopback_run_exits_cleanly() {
    let out = looptest(&[
        "--loopback",
        "--packets",
        "10",
        "--interval-us",
        "500",
        "--edge-timeout-ms",
        "50",
        "--status-interval",
        "0",
        "-q",
    ]);
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

#[test]
fn huge_output_size_is_refused_before_allocation() {
    let out = looptest(&["--loopback", "-o", "1000000"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("byte limit"));
}

#[test]
fn sigterm_stops_lanes_and_prints_report() {
    let child = Command::new(env!("CARGO_BIN_EXE_axidma-looptest"))
        .args([
            "--loopback",
            "--interval-us",
            "500",
            "--edge-timeout-ms",
            "20",
            "--status-interval",
            "0",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to launch axidma-looptest");

    thread::sleep(Duration::from_millis(500));
    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();
    let out = child.wait_with_output().unwrap();

    let log = format!(
        "{}{}",
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    );
    assert!(out.status.success(), "status {:?}, log:\n{}", out.status, log);
    assert!(log.contains("Interrupted, stopping lanes"));
    assert!(log.contains("service time over"));
}
