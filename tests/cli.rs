use std::net::TcpListener;
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

const TIMEOUT: Duration = Duration::from_secs(30);

fn run_rescuescan(args: &[&str]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_rescuescan"))
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    match child.wait_timeout(TIMEOUT).unwrap() {
        Some(_) => child.wait_with_output().unwrap(),
        None => {
            child.kill().unwrap();
            panic!("rescuescan did not finish within {TIMEOUT:?}");
        }
    }
}

#[test]
fn help_lists_rescue_options() {
    let output = run_rescuescan(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--tcp-ports"));
    assert!(stdout.contains("--udp-ports"));
}

#[test]
fn unknown_flag_is_rejected() {
    let output = run_rescuescan(&["--definitely-not-a-flag"]);
    assert!(!output.status.success());
}

#[test]
fn no_valid_targets_aborts() {
    let output = run_rescuescan(&["--no-config", "--no-banner", "-a", "not-an-ip"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn loopback_is_reported_live() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port().to_string();

    let output = run_rescuescan(&[
        "--no-config",
        "--no-output",
        "-g",
        "-t",
        "500",
        "-a",
        "127.0.0.1",
        "--tcp-ports",
        &port,
        "--udp-ports=",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    // ICMP may be unavailable in the test environment; either way the host is live.
    let line = stdout
        .lines()
        .find(|line| line.starts_with("127.0.0.1,"))
        .unwrap_or_else(|| panic!("no record for 127.0.0.1 in {stdout:?}"));
    assert!(
        line == "127.0.0.1,Alive,ICMP,-" || line == format!("127.0.0.1,Dead,TCP,{port}"),
        "unexpected record {line:?}"
    );
}
