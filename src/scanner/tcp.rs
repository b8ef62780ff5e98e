//! TCP rescue: a completed handshake on any listed port proves the host exists.
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;

use super::error::ProbeError;
use super::{PortProbe, ProbeOutcome, Protocol};
use crate::config::clamp_timeout;
use crate::ports::PortSet;

/// One bounded connect attempt per port, no retries.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    /// A zero `timeout` is raised to [`MIN_TIMEOUT`](crate::config::MIN_TIMEOUT).
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout: clamp_timeout(timeout),
        }
    }

    /// Performs the connection to the socket with timeout.
    ///
    /// A port only counts once the three-way handshake completes; the stream
    /// is shut down again straight away.
    async fn connect(&self, socket: SocketAddr) -> Result<(), ProbeError> {
        let mut stream = time::timeout(self.timeout, TcpStream::connect(socket))
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
            .map_err(|e| ProbeError::from_io(e, self.timeout))?;

        debug!("Connection was successful, shutting down stream {socket}");
        if let Err(e) = stream.shutdown().await {
            debug!("Shutdown stream error {e}");
        }
        Ok(())
    }
}

#[async_trait]
impl PortProbe for TcpProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    async fn probe(&self, target: Ipv4Addr, ports: &PortSet) -> ProbeOutcome {
        let mut outcome = ProbeOutcome::default();

        for port in ports.iter() {
            let socket = SocketAddr::from((target, port));
            outcome.record(port, self.connect(socket).await);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn listening_port_is_a_hit() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = closed_port().await;

        let probe = TcpProbe::new(Duration::from_millis(500));
        let ports: PortSet = vec![open, closed].into_iter().collect();
        let outcome = probe.probe(Ipv4Addr::LOCALHOST, &ports).await;

        assert_eq!(outcome.hits().to_vec(), vec![open]);
        assert!(matches!(outcome.result(closed), Some(Err(ProbeError::Refused))));
    }

    #[tokio::test]
    async fn no_listeners_means_no_hits() {
        let ports: PortSet = vec![closed_port().await].into_iter().collect();

        let outcome = TcpProbe::new(Duration::from_millis(200))
            .probe(Ipv4Addr::LOCALHOST, &ports)
            .await;

        assert!(outcome.hits().is_empty());
        assert_eq!(outcome.attempted(), 1);
    }

    #[test]
    fn zero_timeout_is_raised_to_the_minimum() {
        assert_eq!(TcpProbe::new(Duration::ZERO).timeout, crate::config::MIN_TIMEOUT);
    }

    #[tokio::test]
    async fn empty_port_set_probes_nothing() {
        let outcome = TcpProbe::new(Duration::from_millis(200))
            .probe(Ipv4Addr::LOCALHOST, &PortSet::default())
            .await;

        assert_eq!(outcome.attempted(), 0);
    }
}
