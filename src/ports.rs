//! Parsing and holding the sets of ports used by the rescue pass.
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;

const LOWEST_PORT_NUMBER: u16 = 1;
const TOP_PORT_NUMBER: u16 = 65535;

/// An ascending, deduplicated set of ports in `1..=65535`.
///
/// An empty set is valid and disables the protocol it is attached to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet(BTreeSet<u16>);

impl PortSet {
    /// Parses a human port expression such as `"22, 80;443 8000-8010"`.
    ///
    /// Tokens are separated by commas, semicolons or whitespace. Each token
    /// is either a single port or an inclusive `low-high` range. Tokens that
    /// do not parse, fall outside `1..=65535`, or describe a reversed range
    /// are dropped; parsing never fails.
    ///
    /// ```rust
    /// # use rescuescan::ports::PortSet;
    /// let ports = PortSet::parse("80,22,1000-1002,abc,70000,5-3");
    /// assert_eq!(ports.to_vec(), vec![22, 80, 1000, 1001, 1002]);
    /// ```
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut ports = BTreeSet::new();

        for part in input.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
            if part.is_empty() {
                continue;
            }

            if part.contains('-') {
                if let Some((start, end)) = parse_port_range(part) {
                    ports.extend(start..=end);
                }
            } else if let Some(port) = parse_single_port(part) {
                ports.insert(port);
            }
        }

        Self(ports)
    }

    /// Returns true when no port is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of ports in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates the ports in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }

    /// Returns true when `port` is in the set.
    #[must_use]
    pub fn contains(&self, port: u16) -> bool {
        self.0.contains(&port)
    }

    /// The ports as an ascending vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u16> {
        self.iter().collect()
    }
}

impl FromStr for PortSet {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl FromIterator<u16> for PortSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|&port| port >= LOWEST_PORT_NUMBER).collect())
    }
}

/// Renders as a comma list, e.g. `22,80,443`.
impl fmt::Display for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join(","))
    }
}

fn parse_port_range(range_str: &str) -> Option<(u16, u16)> {
    let (start, end) = range_str.split_once('-')?;
    let start = parse_single_port(start)?;
    let end = parse_single_port(end)?;

    (start <= end).then_some((start, end))
}

fn parse_single_port(port_str: &str) -> Option<u16> {
    // u16 parsing already rejects anything above TOP_PORT_NUMBER
    let port: u16 = port_str.parse().ok()?;

    (LOWEST_PORT_NUMBER..=TOP_PORT_NUMBER)
        .contains(&port)
        .then_some(port)
}
