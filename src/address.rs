//! Provides functions to expand input IPv4 addresses, CIDRs or files into targets.
use std::net::Ipv4Addr;
use std::str::FromStr;

use cidr_utils::cidr::{Ipv4Cidr, Ipv4Inet};
use itertools::Itertools;
use log::debug;
use tokio::fs;

use crate::input::Opts;
use crate::warning;

/// Expands every entry of `input.addresses` into a sorted, deduplicated
/// list of targets.
///
/// An entry is a dotted quad, an IPv4 network (host bits are tolerated, so
/// `10.0.0.7/30` covers `10.0.0.4`-`10.0.0.7`), or a path to a file holding
/// one such entry per line.
///
/// ```rust
/// # use rescuescan::input::Opts;
/// # use rescuescan::address::parse_addresses;
/// # tokio_test();
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn tokio_test() {
/// let opts = Opts {
///     addresses: vec!["192.168.0.0/30".to_owned()],
///     ..Opts::default()
/// };
///
/// let ips = parse_addresses(&opts).await;
/// assert_eq!(ips.len(), 4);
/// # }
/// ```
pub async fn parse_addresses(input: &Opts) -> Vec<Ipv4Addr> {
    let mut ips = Vec::new();

    for address in &input.addresses {
        let address = address.trim();
        if address.is_empty() {
            continue;
        }

        if let Some(parsed) = parse_address(address) {
            ips.extend(parsed);
            continue;
        }

        match fs::read_to_string(address).await {
            Ok(content) => ips.extend(read_ips_from_file(address, &content, input)),
            Err(e) => {
                debug!("{address} is neither an address nor a readable file: {e}");
                warning!(
                    format!("Target {address:?} could not be parsed."),
                    input.greppable,
                    input.accessible
                );
            }
        }
    }

    ips.into_iter().sorted().dedup().collect()
}

/// Given a string, parse it as an IPv4 address or network.
///
/// ```rust
/// # use rescuescan::address::parse_address;
/// let ips = parse_address("10.0.0.1").unwrap();
/// assert_eq!(ips.count(), 1);
/// assert!(parse_address("not-an-ip").is_none());
/// ```
#[must_use]
pub fn parse_address(address: &str) -> Option<impl Iterator<Item = Ipv4Addr>> {
    let cidr = if address.contains('/') {
        Ipv4Inet::from_str(address).ok()?.network()
    } else {
        Ipv4Cidr::new_host(Ipv4Addr::from_str(address).ok()?)
    };

    Some(cidr.iter().map(|inet| inet.address()))
}

/// Expands the lines of a target file. Nested file references are not followed.
fn read_ips_from_file(path: &str, content: &str, input: &Opts) -> Vec<Ipv4Addr> {
    let mut ips = Vec::new();

    for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
        match parse_address(line) {
            Some(parsed) => ips.extend(parsed),
            None => warning!(
                format!("Skipping {line:?} in {path}: not an IPv4 address or network."),
                input.greppable,
                input.accessible
            ),
        }
    }

    ips
}

#[cfg(test)]
mod tests {
    use super::{parse_address, parse_addresses, Opts};
    use std::io::Write;
    use std::net::Ipv4Addr;

    fn opts(addresses: &[&str]) -> Opts {
        Opts {
            addresses: addresses.iter().map(|&a| a.to_owned()).collect(),
            ..Opts::default()
        }
    }

    #[tokio::test]
    async fn parse_correct_addresses() {
        let ips = parse_addresses(&opts(&["127.0.0.1", "192.168.0.0/30"])).await;

        assert_eq!(
            ips,
            [
                Ipv4Addr::new(127, 0, 0, 1),
                Ipv4Addr::new(192, 168, 0, 0),
                Ipv4Addr::new(192, 168, 0, 1),
                Ipv4Addr::new(192, 168, 0, 2),
                Ipv4Addr::new(192, 168, 0, 3)
            ]
        );
    }

    #[tokio::test]
    async fn host_bits_in_network_are_tolerated() {
        let ips = parse_addresses(&opts(&["10.0.0.7/30"])).await;

        assert_eq!(ips.first(), Some(&Ipv4Addr::new(10, 0, 0, 4)));
        assert_eq!(ips.last(), Some(&Ipv4Addr::new(10, 0, 0, 7)));
    }

    #[tokio::test]
    async fn duplicates_are_removed() {
        let ips = parse_addresses(&opts(&["10.0.0.1", "10.0.0.0/31", "10.0.0.1"])).await;

        assert_eq!(ips, [Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(10, 0, 0, 1)]);
    }

    #[tokio::test]
    async fn parse_correct_and_incorrect_addresses() {
        let ips = parse_addresses(&opts(&["127.0.0.1", "im_wrong", "300.10.1.1", "::1"])).await;

        assert_eq!(ips, [Ipv4Addr::new(127, 0, 0, 1)]);
    }

    #[tokio::test]
    async fn parse_targets_file() {
        let mut file = std::env::temp_dir();
        file.push(format!("rescuescan-targets-{}.txt", std::process::id()));
        {
            let mut handle = std::fs::File::create(&file).unwrap();
            writeln!(handle, "10.1.1.1\n\n  10.2.2.0/31  \nnot-an-ip\n10.1.1.1").unwrap();
        }

        let ips = parse_addresses(&opts(&[file.to_str().unwrap()])).await;
        std::fs::remove_file(&file).unwrap();

        assert_eq!(
            ips,
            [
                Ipv4Addr::new(10, 1, 1, 1),
                Ipv4Addr::new(10, 2, 2, 0),
                Ipv4Addr::new(10, 2, 2, 1)
            ]
        );
    }

    #[test]
    fn single_address_is_one_target() {
        let ips: Vec<_> = parse_address("172.16.5.4").unwrap().collect();
        assert_eq!(ips, [Ipv4Addr::new(172, 16, 5, 4)]);
    }

    #[test]
    fn malformed_networks_are_rejected() {
        assert!(parse_address("10.0.0.0/33").is_none());
        assert!(parse_address("10.0.0/24").is_none());
    }
}
