//! Phase 1 reachability check backed by the system `ping` binary.
use std::net::Ipv4Addr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;
use tokio::time;

use super::error::ProbeError;
use super::Reachability;
use crate::config::clamp_timeout;

/// Extra time granted to the helper process on top of its own deadline.
const SPAWN_SLACK: Duration = Duration::from_millis(500);

/// Sends a single ICMP echo through the platform `ping` helper.
///
/// Raw ICMP sockets need privileges on most systems, the helper does not.
#[derive(Debug, Clone)]
pub struct IcmpProbe {
    program: String,
    timeout: Duration,
}

impl IcmpProbe {
    /// Uses the `ping` found on `PATH`. A zero `timeout` is raised to
    /// [`MIN_TIMEOUT`](crate::config::MIN_TIMEOUT).
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self::with_program("ping", timeout)
    }

    /// Uses `program` instead of `ping`; it must accept the same flags.
    #[must_use]
    pub fn with_program(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout: clamp_timeout(timeout),
        }
    }

    fn command(&self, target: Ipv4Addr) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(ping_args(target, self.timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Reachability for IcmpProbe {
    fn method(&self) -> &'static str {
        "ICMP"
    }

    async fn probe(&self, target: Ipv4Addr) -> Result<(), ProbeError> {
        let deadline = self.timeout + SPAWN_SLACK;
        let status = time::timeout(deadline, self.command(target).status())
            .await
            .map_err(|_| ProbeError::Timeout(deadline))?
            .map_err(ProbeError::Spawn)?;

        debug!("{} {target} exited with {status}", self.program);

        if status.success() {
            Ok(())
        } else {
            Err(ProbeError::Unanswered)
        }
    }
}

#[cfg(target_os = "windows")]
fn ping_args(target: Ipv4Addr, timeout: Duration) -> Vec<String> {
    let millis = timeout.as_millis().max(1);
    vec![
        "-n".to_owned(),
        "1".to_owned(),
        "-w".to_owned(),
        millis.to_string(),
        target.to_string(),
    ]
}

// BSD-derived pings take the -W wait time in milliseconds
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly"
))]
fn ping_args(target: Ipv4Addr, timeout: Duration) -> Vec<String> {
    let millis = timeout.as_millis().max(1);
    vec![
        "-c".to_owned(),
        "1".to_owned(),
        "-W".to_owned(),
        millis.to_string(),
        target.to_string(),
    ]
}

#[cfg(not(any(
    target_os = "windows",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly"
)))]
fn ping_args(target: Ipv4Addr, timeout: Duration) -> Vec<String> {
    // iputils -W takes whole seconds; round up so short timeouts still wait
    let secs = timeout.as_millis().div_ceil(1000).max(1);
    vec![
        "-c".to_owned(),
        "1".to_owned(),
        "-W".to_owned(),
        secs.to_string(),
        target.to_string(),
    ]
}
