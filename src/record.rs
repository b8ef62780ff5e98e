//! The per-host rows produced by a discovery run.
use std::fmt;
use std::net::Ipv4Addr;

use serde::{Serialize, Serializer};

use crate::ports::PortSet;

/// Outcome of the reachability phase for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde_derive::Serialize)]
pub enum Status {
    /// Answered the reachability probe.
    Alive,
    /// Ignored the reachability probe; only listed when rescued.
    Dead,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alive => f.write_str("Alive"),
            Self::Dead => f.write_str("Dead"),
        }
    }
}

/// Which probe proved the host exists.
///
/// Alive hosts carry the name of the reachability method; dead hosts carry
/// the rescue protocol(s) that answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescueSource {
    /// Found by the named reachability method, e.g. `ICMP`.
    Reachability(&'static str),
    /// Answered on TCP only.
    Tcp,
    /// Answered on UDP only.
    Udp,
    /// Answered on both protocols.
    TcpUdp,
}

impl fmt::Display for RescueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachability(method) => f.write_str(method),
            Self::Tcp => f.write_str("TCP"),
            Self::Udp => f.write_str("UDP"),
            Self::TcpUdp => f.write_str("TCP+UDP"),
        }
    }
}

impl Serialize for RescueSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One output row. Every address appears at most once per run.
#[derive(Debug, Clone, PartialEq, Eq, serde_derive::Serialize)]
pub struct HostRecord {
    /// The host.
    pub address: Ipv4Addr,
    /// Whether it answered the reachability probe.
    pub status: Status,
    /// What proved it live.
    pub source: RescueSource,
    /// Matched ports, e.g. `22,443` or `TCP:22,443 | UDP:53`; `-` when no
    /// rescue was attempted.
    pub detail: String,
}

impl HostRecord {
    /// Record for a host that answered `method`.
    #[must_use]
    pub fn alive(address: Ipv4Addr, method: &'static str) -> Self {
        Self {
            address,
            status: Status::Alive,
            source: RescueSource::Reachability(method),
            detail: "-".to_owned(),
        }
    }

    /// Record for a host that failed reachability; `None` when neither
    /// protocol produced a hit.
    #[must_use]
    pub fn rescued(address: Ipv4Addr, tcp: &PortSet, udp: &PortSet) -> Option<Self> {
        let (source, detail) = match (tcp.is_empty(), udp.is_empty()) {
            (true, true) => return None,
            (false, true) => (RescueSource::Tcp, tcp.to_string()),
            (true, false) => (RescueSource::Udp, udp.to_string()),
            (false, false) => (RescueSource::TcpUdp, format!("TCP:{tcp} | UDP:{udp}")),
        };

        Some(Self {
            address,
            status: Status::Dead,
            source,
            detail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: Ipv4Addr = Ipv4Addr::new(192, 0, 2, 7);

    #[test]
    fn alive_record_names_the_reachability_method() {
        let record = HostRecord::alive(HOST, "ICMP");

        assert_eq!(record.status.to_string(), "Alive");
        assert_eq!(record.source.to_string(), "ICMP");
        assert_eq!(record.detail, "-");
    }

    #[test]
    fn no_hits_means_no_record() {
        assert_eq!(HostRecord::rescued(HOST, &PortSet::default(), &PortSet::default()), None);
    }

    #[test]
    fn single_protocol_detail_is_a_plain_port_list() {
        let record = HostRecord::rescued(HOST, &PortSet::parse("443 22"), &PortSet::default()).unwrap();
        assert_eq!(record.source, RescueSource::Tcp);
        assert_eq!(record.detail, "22,443");

        let record = HostRecord::rescued(HOST, &PortSet::default(), &PortSet::parse("123")).unwrap();
        assert_eq!(record.source, RescueSource::Udp);
        assert_eq!(record.detail, "123");
    }

    #[test]
    fn both_protocols_are_labelled() {
        let record =
            HostRecord::rescued(HOST, &PortSet::parse("443,22"), &PortSet::parse("53")).unwrap();

        assert_eq!(record.status, Status::Dead);
        assert_eq!(record.source.to_string(), "TCP+UDP");
        assert_eq!(record.detail, "TCP:22,443 | UDP:53");
    }

    #[test]
    fn serializes_with_display_names() {
        let record = HostRecord::rescued(HOST, &PortSet::parse("22"), &PortSet::parse("53")).unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["address"], "192.0.2.7");
        assert_eq!(json["status"], "Dead");
        assert_eq!(json["source"], "TCP+UDP");
    }
}
