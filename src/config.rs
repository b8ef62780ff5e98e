//! Immutable per-run configuration shared by the orchestrator and the probers.
use std::num::{NonZeroU8, NonZeroUsize};
use std::time::Duration;

use crate::ports::PortSet;

/// Ports tried over TCP when a host ignores the reachability probe.
pub const DEFAULT_TCP_PORTS: &str = "21,22,25,80,110,143,443,465,587,993,995,\
    8080,8443,9443,10443,2222,4353,4433,500,1701,4500,1194,1494,2598,17777,17778,161,162";

/// Ports tried over UDP; these all have a protocol-shaped payload.
pub const DEFAULT_UDP_PORTS: &str = "53,123,161,500";

/// Smallest accepted per-operation timeout. A zero timeout is raised to it.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Snapshot of every tunable for one discovery run.
///
/// Built once and owned by the [`Discovery`](crate::scanner::Discovery) run;
/// probers copy the fields they need when they are constructed.
/// `concurrency`, `timeout` and `udp_retries` can never be zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Maximum number of targets probed at the same time, per phase.
    pub concurrency: NonZeroUsize,
    /// Bound on every individual network operation.
    pub timeout: Duration,
    /// Pause honoured once between the reachability and rescue phases.
    pub interphase_delay: Duration,
    /// TCP rescue ports. Empty disables TCP rescue.
    pub tcp_ports: PortSet,
    /// UDP rescue ports. Empty disables UDP rescue.
    pub udp_ports: PortSet,
    /// Send attempts per UDP port before giving up on it.
    pub udp_retries: NonZeroU8,
    /// Pause after each UDP send, before the receive window opens.
    pub udp_send_delay: Duration,
    /// How long to wait for a reply after each UDP send.
    pub udp_receive_window: Duration,
    /// `udp_send_delay` is shifted by a uniform value in `-jitter..=jitter`.
    pub udp_jitter: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: NonZeroUsize::new(50).unwrap_or(NonZeroUsize::MIN),
            timeout: Duration::from_secs(2),
            interphase_delay: Duration::ZERO,
            tcp_ports: PortSet::parse(DEFAULT_TCP_PORTS),
            udp_ports: PortSet::parse(DEFAULT_UDP_PORTS),
            udp_retries: NonZeroU8::new(2).unwrap_or(NonZeroU8::MIN),
            udp_send_delay: Duration::from_millis(50),
            udp_receive_window: Duration::from_secs(1),
            udp_jitter: Duration::from_millis(25),
        }
    }
}

impl RunConfig {
    /// Sets the concurrency cap. Zero is corrected to one.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = NonZeroUsize::new(concurrency).unwrap_or(NonZeroUsize::MIN);
        self
    }

    /// Sets the per-operation timeout. Zero is corrected to [`MIN_TIMEOUT`].
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = clamp_timeout(timeout);
        self
    }

    /// Sets the pause between the two phases; zero disables it.
    #[must_use]
    pub const fn with_interphase_delay(mut self, delay: Duration) -> Self {
        self.interphase_delay = delay;
        self
    }

    /// Sets the TCP rescue ports.
    #[must_use]
    pub fn with_tcp_ports(mut self, ports: PortSet) -> Self {
        self.tcp_ports = ports;
        self
    }

    /// Sets the UDP rescue ports.
    #[must_use]
    pub fn with_udp_ports(mut self, ports: PortSet) -> Self {
        self.udp_ports = ports;
        self
    }

    /// Sets the UDP attempts per port. Zero is corrected to one.
    #[must_use]
    pub fn with_udp_retries(mut self, retries: u8) -> Self {
        self.udp_retries = NonZeroU8::new(retries).unwrap_or(NonZeroU8::MIN);
        self
    }

    /// Sets the UDP pacing: delay after each send, receive window and jitter.
    #[must_use]
    pub const fn with_udp_timing(
        mut self,
        send_delay: Duration,
        receive_window: Duration,
        jitter: Duration,
    ) -> Self {
        self.udp_send_delay = send_delay;
        self.udp_receive_window = receive_window;
        self.udp_jitter = jitter;
        self
    }

    /// Whether any rescue protocol is enabled at all.
    #[must_use]
    pub fn rescue_enabled(&self) -> bool {
        !self.tcp_ports.is_empty() || !self.udp_ports.is_empty()
    }

    /// Upper bound on the time one UDP port can take, ignoring socket slack.
    #[must_use]
    pub fn udp_port_budget(&self) -> Duration {
        (self.udp_send_delay + self.udp_receive_window + self.udp_jitter)
            * u32::from(self.udp_retries.get())
    }
}

/// Raises a zero timeout to [`MIN_TIMEOUT`].
#[must_use]
pub const fn clamp_timeout(timeout: Duration) -> Duration {
    if timeout.is_zero() {
        MIN_TIMEOUT
    } else {
        timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_port_lists() {
        let config = RunConfig::default();

        assert_eq!(config.concurrency.get(), 50);
        assert_eq!(config.tcp_ports.len(), 28);
        assert_eq!(config.udp_ports.to_vec(), vec![53, 123, 161, 500]);
        assert!(config.rescue_enabled());
    }

    #[test]
    fn zero_values_are_corrected_to_one() {
        let config = RunConfig::default()
            .with_concurrency(0)
            .with_udp_retries(0);

        assert_eq!(config.concurrency.get(), 1);
        assert_eq!(config.udp_retries.get(), 1);
    }

    #[test]
    fn zero_timeout_is_raised_to_the_minimum() {
        let config = RunConfig::default().with_timeout(Duration::ZERO);
        assert_eq!(config.timeout, MIN_TIMEOUT);

        let config = RunConfig::default().with_timeout(Duration::from_millis(750));
        assert_eq!(config.timeout, Duration::from_millis(750));
    }

    #[test]
    fn empty_port_sets_disable_rescue() {
        let config = RunConfig::default()
            .with_tcp_ports(PortSet::default())
            .with_udp_ports(PortSet::default());

        assert!(!config.rescue_enabled());
    }

    #[test]
    fn udp_budget_scales_with_retries() {
        let config = RunConfig::default()
            .with_udp_retries(3)
            .with_udp_timing(
                Duration::from_millis(10),
                Duration::from_millis(100),
                Duration::from_millis(5),
            );

        assert_eq!(config.udp_port_budget(), Duration::from_millis(345));
    }
}
