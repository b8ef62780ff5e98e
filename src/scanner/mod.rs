//! Core discovery behaviour: a reachability sweep followed by a rescue pass.
//!
//! [`Discovery`] first runs a [`Reachability`] probe against every target.
//! Targets that fail it are handed to the TCP and UDP [`PortProbe`]s, and
//! only those with at least one answering port make it into the result.
//! Both phases share the same concurrency cap and the rescue phase never
//! starts before the reachability phase is complete.
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::{stream, StreamExt};
use itertools::Itertools;
use log::{debug, info};

use crate::config::RunConfig;
use crate::ports::PortSet;
use crate::record::{HostRecord, RescueSource};

pub mod error;
pub mod payload;
pub mod reachability;
pub mod tcp;
pub mod udp;

pub use error::ProbeError;
pub use reachability::IcmpProbe;
pub use tcp::TcpProbe;
pub use udp::UdpProbe;

/// A cheap existence check for one host.
#[async_trait]
pub trait Reachability: Send + Sync {
    /// Name shown as the rescue source of hosts found by this probe.
    fn method(&self) -> &'static str;

    /// `Ok(())` only when the host positively answered in time.
    async fn probe(&self, target: Ipv4Addr) -> Result<(), ProbeError>;
}

/// A per-port rescue probe for hosts that failed the reachability check.
#[async_trait]
pub trait PortProbe: Send + Sync {
    /// Protocol used, for logging.
    fn protocol(&self) -> Protocol;

    /// Probes every port in `ports`. A failure on one port never stops the others.
    async fn probe(&self, target: Ipv4Addr, ports: &PortSet) -> ProbeOutcome;
}

/// Transport used by a [`PortProbe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// TCP connect.
    Tcp,
    /// UDP datagram.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("TCP"),
            Self::Udp => f.write_str("UDP"),
        }
    }
}

/// Per-port results of one [`PortProbe`] run against one target.
#[derive(Debug, Default)]
pub struct ProbeOutcome {
    results: BTreeMap<u16, Result<(), ProbeError>>,
}

impl ProbeOutcome {
    /// Stores the result for `port`, replacing any earlier one.
    pub fn record(&mut self, port: u16, result: Result<(), ProbeError>) {
        self.results.insert(port, result);
    }

    /// Ports that answered, ascending.
    #[must_use]
    pub fn hits(&self) -> PortSet {
        self.results
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(&port, _)| port)
            .collect()
    }

    /// Result for `port`, if it was probed.
    #[must_use]
    pub fn result(&self, port: u16) -> Option<&Result<(), ProbeError>> {
        self.results.get(&port)
    }

    /// Number of ports that were probed.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.results.len()
    }

    /// Ports whose probe could not run at all, as opposed to staying silent.
    pub fn failures(&self) -> impl Iterator<Item = (u16, &ProbeError)> {
        self.results.iter().filter_map(|(&port, result)| match result {
            Err(e) if !e.is_negative() => Some((port, e)),
            _ => None,
        })
    }
}

/// Where a [`Discovery`] run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started.
    Idle,
    /// Pinging targets.
    ReachabilityRunning,
    /// Every target classified alive or dead.
    ReachabilityDone,
    /// Probing dead targets over TCP and UDP.
    RescueRunning,
    /// Every dead target probed.
    RescueDone,
    /// Records built and sorted.
    Merged,
    /// Run finished.
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::ReachabilityRunning => "reachability",
            Self::ReachabilityDone => "reachability done",
            Self::RescueRunning => "rescue",
            Self::RescueDone => "rescue done",
            Self::Merged => "merged",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Progress notification: `done` of `total` targets finished in `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Phase the notification belongs to.
    pub phase: Phase,
    /// Targets finished so far.
    pub done: usize,
    /// Targets in this phase.
    pub total: usize,
}

type ProgressCallback = Box<dyn Fn(Progress) + Send + Sync>;

/// Counters computed alongside the record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde_derive::Serialize)]
pub struct Summary {
    /// Unique targets probed.
    pub targets: usize,
    /// Targets that answered the reachability probe.
    pub alive: usize,
    /// Dead targets rescued over TCP only.
    pub rescued_tcp: usize,
    /// Dead targets rescued over UDP only.
    pub rescued_udp: usize,
    /// Dead targets rescued over both protocols.
    pub rescued_both: usize,
    /// Dead hosts with no rescue hit. They are not part of the records.
    pub unresponsive: usize,
    /// Wall time of the run; serialised in milliseconds.
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

impl Summary {
    /// Dead targets rescued by any protocol.
    #[must_use]
    pub const fn rescued(&self) -> usize {
        self.rescued_tcp + self.rescued_udp + self.rescued_both
    }

    /// Every host in the records.
    #[must_use]
    pub const fn total_live(&self) -> usize {
        self.alive + self.rescued()
    }
}

/// Final output of one run: records sorted by address, plus counters.
#[derive(Debug, Clone, serde_derive::Serialize)]
pub struct DiscoveryReport {
    /// Counters for the run.
    pub summary: Summary,
    /// One row per live host, sorted by address.
    pub records: Vec<HostRecord>,
}

/// Drives one discovery run over a fixed target set.
///
/// ```rust,no_run
/// # use std::net::Ipv4Addr;
/// use rescuescan::config::RunConfig;
/// use rescuescan::scanner::Discovery;
///
/// # async fn run() {
/// let targets = vec![Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(192, 168, 1, 2)];
/// let mut discovery = Discovery::new(RunConfig::default().with_concurrency(100));
/// let report = discovery.run(&targets).await;
///
/// for record in &report.records {
///     println!("{} {} {} {}", record.address, record.status, record.source, record.detail);
/// }
/// # }
/// ```
pub struct Discovery {
    config: RunConfig,
    reachability: Box<dyn Reachability>,
    tcp: Box<dyn PortProbe>,
    udp: Box<dyn PortProbe>,
    on_progress: Option<ProgressCallback>,
    phase: Phase,
}

impl fmt::Debug for Discovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Discovery")
            .field("config", &self.config)
            .field("method", &self.reachability.method())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl Discovery {
    /// Uses the system `ping` for reachability and socket-based TCP/UDP rescue.
    #[must_use]
    pub fn new(config: RunConfig) -> Self {
        let reachability = Box::new(IcmpProbe::new(config.timeout));
        let tcp = Box::new(TcpProbe::new(config.timeout));
        let udp = Box::new(UdpProbe::from_config(&config));
        Self::with_probers(config, reachability, tcp, udp)
    }

    /// Uses the given probers instead of the network-backed ones.
    #[must_use]
    pub fn with_probers(
        config: RunConfig,
        reachability: Box<dyn Reachability>,
        tcp: Box<dyn PortProbe>,
        udp: Box<dyn PortProbe>,
    ) -> Self {
        Self {
            config,
            reachability,
            tcp,
            udp,
            on_progress: None,
            phase: Phase::Idle,
        }
    }

    /// Registers a callback invoked after every finished target and on
    /// every phase change.
    #[must_use]
    pub fn on_progress(mut self, callback: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// The configuration this run uses.
    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Current phase; [`Phase::Done`] once `run` has returned.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Name of the reachability method, as shown in `Source` for alive hosts.
    #[must_use]
    pub fn method(&self) -> &'static str {
        self.reachability.method()
    }

    /// Runs both phases to completion and returns the merged records.
    ///
    /// Duplicate targets are probed once. Never fails: unreachable networks
    /// simply produce an empty report.
    pub async fn run(&mut self, targets: &[Ipv4Addr]) -> DiscoveryReport {
        let started = Instant::now();
        let targets: Vec<Ipv4Addr> = targets.iter().copied().unique().collect();

        debug!(
            "Start discovery.\nConcurrency {}\nTargets {}\nTCP rescue ports {}\nUDP rescue ports {} (up to {:?} each)",
            self.config.concurrency,
            targets.len(),
            self.config.tcp_ports.len(),
            self.config.udp_ports.len(),
            self.config.udp_port_budget()
        );

        self.enter(Phase::ReachabilityRunning, targets.len());
        let (alive, dead) = self.reachability_phase(&targets).await;
        self.enter(Phase::ReachabilityDone, targets.len());
        info!("Reachability complete: {} alive, {} dead", alive.len(), dead.len());

        let rescued = if self.config.rescue_enabled() && !dead.is_empty() {
            if !self.config.interphase_delay.is_zero() {
                debug!("Waiting {:?} before the rescue phase", self.config.interphase_delay);
                tokio::time::sleep(self.config.interphase_delay).await;
            }
            self.enter(Phase::RescueRunning, dead.len());
            let rescued = self.rescue_phase(&dead).await;
            self.enter(Phase::RescueDone, dead.len());
            rescued
        } else {
            debug!("Skipping rescue phase");
            Vec::new()
        };

        let method = self.reachability.method();
        let mut summary = Summary {
            targets: targets.len(),
            alive: alive.len(),
            unresponsive: dead.len() - rescued.len(),
            ..Summary::default()
        };
        for record in &rescued {
            match record.source {
                RescueSource::Tcp => summary.rescued_tcp += 1,
                RescueSource::Udp => summary.rescued_udp += 1,
                RescueSource::TcpUdp => summary.rescued_both += 1,
                RescueSource::Reachability(_) => {}
            }
        }

        let records = merge(&alive, method, rescued);
        self.enter(Phase::Merged, records.len());

        summary.elapsed = started.elapsed();
        self.enter(Phase::Done, records.len());
        info!(
            "Discovery complete: {} live hosts ({} via {method}, {} rescued) in {:.2}s",
            summary.total_live(),
            summary.alive,
            summary.rescued(),
            summary.elapsed.as_secs_f64()
        );

        DiscoveryReport { summary, records }
    }

    /// Splits `targets` into (alive, dead). Probe errors count as dead.
    async fn reachability_phase(&self, targets: &[Ipv4Addr]) -> (Vec<Ipv4Addr>, Vec<Ipv4Addr>) {
        let prober = &*self.reachability;
        let total = targets.len();
        let mut alive = Vec::new();
        let mut dead = Vec::new();

        let mut results = stream::iter(targets.iter().copied())
            .map(|target| async move { (target, prober.probe(target).await) })
            .buffer_unordered(self.config.concurrency.get());

        while let Some((target, result)) = results.next().await {
            match result {
                Ok(()) => alive.push(target),
                Err(e) => {
                    if e.is_negative() {
                        debug!("{target} is unreachable: {e}");
                    } else {
                        debug!("{target} could not be checked, treating as unreachable: {e}");
                    }
                    dead.push(target);
                }
            }
            self.report(Phase::ReachabilityRunning, alive.len() + dead.len(), total);
        }

        (alive, dead)
    }

    /// Runs the enabled rescue probes against every dead target.
    ///
    /// Returns one record per target that answered on at least one port.
    async fn rescue_phase(&self, dead: &[Ipv4Addr]) -> Vec<HostRecord> {
        let total = dead.len();
        let mut done = 0;
        let mut rescued = Vec::new();

        let mut results = stream::iter(dead.iter().copied())
            .map(|target| async move {
                let (tcp, udp) = futures::join!(
                    self.rescue_with(&*self.tcp, target, &self.config.tcp_ports),
                    self.rescue_with(&*self.udp, target, &self.config.udp_ports),
                );
                (target, tcp, udp)
            })
            .buffer_unordered(self.config.concurrency.get());

        while let Some((target, tcp, udp)) = results.next().await {
            done += 1;
            if let Some(record) = HostRecord::rescued(target, &tcp, &udp) {
                debug!("Rescued {target}: {}", record.detail);
                rescued.push(record);
            }
            self.report(Phase::RescueRunning, done, total);
        }

        rescued
    }

    /// Runs one rescue protocol and reduces it to the ports that answered.
    async fn rescue_with(&self, prober: &dyn PortProbe, target: Ipv4Addr, ports: &PortSet) -> PortSet {
        if ports.is_empty() {
            return PortSet::default();
        }

        let outcome = prober.probe(target, ports).await;
        for (port, e) in outcome.failures() {
            debug!("{} probe of {target}:{port} could not run: {e}", prober.protocol());
        }
        outcome.hits()
    }

    fn enter(&mut self, phase: Phase, total: usize) {
        debug!("Discovery phase: {} -> {phase}", self.phase);
        self.phase = phase;
        let done = match phase {
            Phase::ReachabilityRunning | Phase::RescueRunning => 0,
            _ => total,
        };
        self.report(phase, done, total);
    }

    fn report(&self, phase: Phase, done: usize, total: usize) {
        if let Some(callback) = &self.on_progress {
            callback(Progress { phase, done, total });
        }
    }
}

/// Builds the final record set: every alive target plus every rescued one,
/// sorted by address.
fn merge(alive: &[Ipv4Addr], method: &'static str, rescued: Vec<HostRecord>) -> Vec<HostRecord> {
    alive
        .iter()
        .map(|&address| HostRecord::alive(address, method))
        .chain(rescued)
        .sorted_by_key(|record| record.address)
        .collect()
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}
