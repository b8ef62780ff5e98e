//! This crate exposes the internal functionality of the rescuescan host
//! discovery tool.
//!
//! Plenty of hosts drop ICMP echo requests while still serving traffic.
//! rescuescan therefore works in two phases:
//!
//! 1. **Reachability**: every target is pinged once. Hosts that answer are
//!    recorded as alive.
//! 2. **Rescue**: every host that did not answer is probed again with TCP
//!    connects and protocol-shaped UDP datagrams against a small list of
//!    well known ports. Any answer marks the host live, recorded as `Dead`
//!    together with the ports that gave it away.
//!
//! Hosts that stay silent in both phases are left out of the records and
//! only counted in the [`Summary`](crate::scanner::Summary).
//!
//! ## Architecture Overview
//!
//! The run is driven by [`Discovery`](crate::scanner::Discovery), which is
//! configured through a [`RunConfig`](crate::config::RunConfig). The probes
//! sit behind the [`Reachability`](crate::scanner::Reachability) and
//! [`PortProbe`](crate::scanner::PortProbe) traits, so they can be swapped
//! for other implementations, or for scripted ones in tests.
//!
//! ## Basic Usage Example
//!
//! ```rust,no_run
//! use std::net::Ipv4Addr;
//! use std::time::Duration;
//!
//! use rescuescan::config::RunConfig;
//! use rescuescan::ports::PortSet;
//! use rescuescan::scanner::Discovery;
//!
//! #[tokio::main]
//! async fn main() {
//!     let targets: Vec<Ipv4Addr> = (1..=20).map(|i| Ipv4Addr::new(192, 168, 1, i)).collect();
//!
//!     let config = RunConfig::default()
//!         .with_concurrency(64)
//!         .with_timeout(Duration::from_millis(800))
//!         .with_tcp_ports(PortSet::parse("22,80,443,3389"))
//!         .with_udp_ports(PortSet::parse("53,161"));
//!
//!     let mut discovery = Discovery::new(config);
//!     let report = discovery.run(&targets).await;
//!
//!     for record in &report.records {
//!         println!("{} {} {} {}", record.address, record.status, record.source, record.detail);
//!     }
//!     println!("{} live hosts", report.summary.total_live());
//! }
//! ```
#![allow(clippy::needless_doctest_main)]
#![warn(missing_docs)]

pub mod tui;

pub mod input;

pub mod config;

pub mod ports;

pub mod scanner;

pub mod record;

pub mod address;

pub mod output;
