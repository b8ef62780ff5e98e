//! UDP rescue: send protocol-shaped payloads and wait for any datagram back.
//!
//! UDP gives no handshake, so silence is ambiguous. Each port gets up to
//! `retries` attempts; every attempt uses a fresh socket, sends the payload
//! for that port, sleeps `send_delay ± jitter` and then opens a receive
//! window. Only datagrams whose source is the probed address count.
use std::net::{Ipv4Addr, SocketAddr};
use std::num::NonZeroU8;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use rand::Rng;
use tokio::net::UdpSocket;
use tokio::time::{self, Instant};

use super::error::ProbeError;
use super::payload::payload_for;
use super::{PortProbe, ProbeOutcome, Protocol};
use crate::config::{clamp_timeout, RunConfig};
use crate::ports::PortSet;

const RECV_BUFFER_LEN: usize = 1500;

/// Rescue prober sending [`payload_for`] datagrams with retries and pacing.
#[derive(Debug, Clone)]
pub struct UdpProbe {
    timeout: Duration,
    retries: NonZeroU8,
    send_delay: Duration,
    receive_window: Duration,
    jitter: Duration,
}

impl UdpProbe {
    /// `timeout` bounds each send and each read inside the receive window;
    /// zero is raised to [`MIN_TIMEOUT`](crate::config::MIN_TIMEOUT).
    #[must_use]
    pub const fn new(
        timeout: Duration,
        retries: NonZeroU8,
        send_delay: Duration,
        receive_window: Duration,
        jitter: Duration,
    ) -> Self {
        Self {
            timeout: clamp_timeout(timeout),
            retries,
            send_delay,
            receive_window,
            jitter,
        }
    }

    /// Takes the timeout and every UDP setting from `config`.
    #[must_use]
    pub const fn from_config(config: &RunConfig) -> Self {
        Self::new(
            config.timeout,
            config.udp_retries,
            config.udp_send_delay,
            config.udp_receive_window,
            config.udp_jitter,
        )
    }

    /// Tries one port until a reply arrives or the attempts run out.
    async fn scan_port(&self, socket: SocketAddr) -> Result<(), ProbeError> {
        let payload = payload_for(socket.port());
        let tries = self.retries.get();

        for nr_try in 1..=tries {
            match self.attempt(socket, &payload).await {
                Ok(true) => {
                    debug!("UDP reply from {socket} after {nr_try} tries");
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => debug!("UDP attempt {nr_try} to {socket} failed: {e}"),
            }
        }

        Err(ProbeError::NoReply { attempts: tries })
    }

    /// A single send / pace / listen cycle on a socket private to it.
    ///
    /// `Ok(false)` means the window closed without a matching datagram.
    async fn attempt(&self, target: SocketAddr, payload: &[u8]) -> Result<bool, ProbeError> {
        let udp_socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;

        time::timeout(self.timeout, udp_socket.send_to(payload, target))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        time::sleep(self.pace()).await;

        self.listen(&udp_socket, target).await
    }

    /// Waits out the receive window, discarding datagrams from other hosts.
    ///
    /// Each read is additionally capped by the socket timeout, so a long
    /// window is served by several bounded reads.
    async fn listen(&self, udp_socket: &UdpSocket, target: SocketAddr) -> Result<bool, ProbeError> {
        let deadline = Instant::now() + self.receive_window;
        let mut buf = [0u8; RECV_BUFFER_LEN];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }

            match time::timeout(remaining.min(self.timeout), udp_socket.recv_from(&mut buf)).await {
                Ok(Ok((size, from))) if from.ip() == target.ip() => {
                    debug!("Received {size} bytes from {from}");
                    return Ok(true);
                }
                Ok(Ok((_, from))) => debug!("Ignoring datagram from unrelated host {from}"),
                Ok(Err(e)) => return Err(ProbeError::from_io(e, self.timeout)),
                Err(_) => {}
            }
        }
    }

    /// `send_delay` shifted by a uniform offset in `-jitter..=jitter`.
    fn pace(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.send_delay;
        }
        let low = self.send_delay.saturating_sub(self.jitter);
        let high = self.send_delay + self.jitter;
        rand::rng().random_range(low..=high)
    }
}

#[async_trait]
impl PortProbe for UdpProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }

    async fn probe(&self, target: Ipv4Addr, ports: &PortSet) -> ProbeOutcome {
        let mut outcome = ProbeOutcome::default();

        for port in ports.iter() {
            let socket = SocketAddr::from((target, port));
            outcome.record(port, self.scan_port(socket).await);
        }

        outcome
    }
}
