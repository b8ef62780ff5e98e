//! Provides a means to read, parse and hold configuration options for runs.
use std::convert::Infallible;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde_derive::Deserialize;

use crate::config::{RunConfig, DEFAULT_TCP_PORTS, DEFAULT_UDP_PORTS};
use crate::ports::PortSet;

/// File format used to persist the records.
#[derive(Deserialize, Debug, ValueEnum, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `IP,Status,Source,Detail` rows.
    Csv,
    /// Summary, records and start time as one object.
    Json,
}

/// Value parser for port expressions. Never rejects input; bad tokens are dropped.
#[allow(clippy::unnecessary_wraps)]
fn parse_port_set(input: &str) -> Result<PortSet, Infallible> {
    Ok(PortSet::parse(input))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "rescuescan",
    version = env!("CARGO_PKG_VERSION"),
    max_term_width = 120,
    help_template = "{bin} {version}\n{about}\n\nUSAGE:\n    {usage}\n\nOPTIONS:\n{options}",
)]
#[allow(clippy::struct_excessive_bools)]
/// Finds live hosts: pings every target, then rescues the silent ones with
/// TCP connects and UDP probes.
pub struct Opts {
    /// A comma-delimited list of IPv4 addresses, CIDRs, or files containing them (one per line).
    #[arg(short, long, value_delimiter = ',')]
    pub addresses: Vec<String>,

    /// Maximum number of hosts probed at once.
    #[arg(short, long, alias = "threads", default_value = "50")]
    pub concurrency: usize,

    /// The timeout in milliseconds for each ping, connect, send or read. 0 is raised to 1.
    #[arg(short, long, default_value = "2000")]
    pub timeout: u64,

    /// Pause in milliseconds between the ping phase and the rescue phase.
    #[arg(short, long, default_value = "0")]
    pub delay: u64,

    /// TCP ports tried on hosts that ignore ping. Examples: 22,80,443 or 1-1024. Empty disables TCP rescue.
    #[arg(long, value_parser = parse_port_set, default_value = DEFAULT_TCP_PORTS)]
    pub tcp_ports: PortSet,

    /// UDP ports tried on hosts that ignore ping. Empty disables UDP rescue.
    #[arg(long, value_parser = parse_port_set, default_value = DEFAULT_UDP_PORTS)]
    pub udp_ports: PortSet,

    /// Send attempts per UDP port. If set to 0, rescuescan will correct it to 1.
    #[arg(long, default_value = "2")]
    pub udp_retries: u8,

    /// Milliseconds to wait after each UDP send before listening.
    #[arg(long, default_value = "50")]
    pub udp_send_delay: u64,

    /// Milliseconds to listen for a UDP reply after each send.
    #[arg(long, default_value = "1000")]
    pub udp_receive_window: u64,

    /// Random +/- milliseconds applied to the UDP send delay.
    #[arg(long, default_value = "25")]
    pub udp_jitter: u64,

    /// Where to write the live hosts.
    #[arg(short, long, default_value = "live_ips.csv")]
    pub output: PathBuf,

    /// Format of the output file.
    #[arg(long, value_enum, ignore_case = true, default_value = "csv")]
    pub format: OutputFormat,

    /// Do not write an output file.
    #[arg(long)]
    pub no_output: bool,

    /// Greppable mode. Only output the records, one per line.
    #[arg(short, long)]
    pub greppable: bool,

    /// Accessible mode. Turns off features which negatively affect screen readers.
    #[arg(long)]
    pub accessible: bool,

    /// Hide the banner
    #[arg(long)]
    pub no_banner: bool,

    /// Whether to ignore the configuration file or not.
    #[arg(short, long)]
    pub no_config: bool,

    /// Custom path to config file
    #[arg(long, value_parser)]
    pub config_path: Option<PathBuf>,

    /// Automatically ups the ULIMIT with the value you provided.
    #[arg(short, long)]
    pub ulimit: Option<u64>,
}

#[cfg(not(tarpaulin_include))]
impl Opts {
    /// Parses the process arguments.
    pub fn read() -> Self {
        Self::parse()
    }

    /// Reads the command line arguments into an Opts struct and merge
    /// values found within the user configuration file.
    pub fn merge(&mut self, config: &Config) {
        if !self.no_config {
            self.merge_required(config);
            self.merge_optional(config);
        }
    }

    fn merge_required(&mut self, config: &Config) {
        macro_rules! merge_required {
            ($($field: ident),+) => {
                $(
                    if let Some(e) = &config.$field {
                        self.$field = e.clone();
                    }
                )+
            }
        }

        merge_required!(
            addresses, concurrency, timeout, delay, udp_retries, udp_send_delay,
            udp_receive_window, udp_jitter, output, format, greppable, accessible
        );
    }

    fn merge_optional(&mut self, config: &Config) {
        macro_rules! merge_optional {
            ($($field: ident),+) => {
                $(
                    if config.$field.is_some() {
                        self.$field = config.$field.clone();
                    }
                )+
            }
        }

        // Port lists are expressions in the file too
        if let Some(ports) = &config.tcp_ports {
            self.tcp_ports = PortSet::parse(ports);
        }
        if let Some(ports) = &config.udp_ports {
            self.udp_ports = PortSet::parse(ports);
        }

        merge_optional!(ulimit);
    }

    /// Freezes the options into the configuration handed to the discovery run.
    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        RunConfig::default()
            .with_concurrency(self.concurrency)
            .with_timeout(Duration::from_millis(self.timeout))
            .with_interphase_delay(Duration::from_millis(self.delay))
            .with_tcp_ports(self.tcp_ports.clone())
            .with_udp_ports(self.udp_ports.clone())
            .with_udp_retries(self.udp_retries)
            .with_udp_timing(
                Duration::from_millis(self.udp_send_delay),
                Duration::from_millis(self.udp_receive_window),
                Duration::from_millis(self.udp_jitter),
            )
    }
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            addresses: vec![],
            concurrency: 50,
            timeout: 2000,
            delay: 0,
            tcp_ports: PortSet::parse(DEFAULT_TCP_PORTS),
            udp_ports: PortSet::parse(DEFAULT_UDP_PORTS),
            udp_retries: 2,
            udp_send_delay: 50,
            udp_receive_window: 1000,
            udp_jitter: 25,
            output: PathBuf::from("live_ips.csv"),
            format: OutputFormat::Csv,
            no_output: false,
            greppable: true,
            accessible: false,
            no_banner: false,
            no_config: true,
            config_path: None,
            ulimit: None,
        }
    }
}

/// Struct used to deserialize the options specified within our config file.
/// These will be further merged with our command line arguments in order to
/// generate the final Opts struct.
#[cfg(not(tarpaulin_include))]
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    addresses: Option<Vec<String>>,
    concurrency: Option<usize>,
    timeout: Option<u64>,
    delay: Option<u64>,
    tcp_ports: Option<String>,
    udp_ports: Option<String>,
    udp_retries: Option<u8>,
    udp_send_delay: Option<u64>,
    udp_receive_window: Option<u64>,
    udp_jitter: Option<u64>,
    output: Option<PathBuf>,
    format: Option<OutputFormat>,
    greppable: Option<bool>,
    accessible: Option<bool>,
    ulimit: Option<u64>,
}

#[cfg(not(tarpaulin_include))]
impl Config {
    /// Reads the configuration file with TOML format and parses it into a
    /// Config struct. A missing file is the same as an empty one.
    ///
    /// # Format
    ///
    /// addresses = ["10.0.0.0/24", "targets.txt"]
    /// concurrency = 100
    /// tcp_ports = "22,80,443,8000-8100"
    /// udp_ports = "53,123"
    /// format = "json"
    ///
    pub fn read(custom_config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let config_path = match custom_config_path {
            Some(path) => path,
            None => match default_config_path() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing {}", config_path.display()))
    }

    fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Constructs default path to config toml, `None` when there is no home directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    let mut config_path = dirs::home_dir()?;
    config_path.push(".rescuescan.toml");
    Some(config_path)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::{CommandFactory, Parser};
    use parameterized::parameterized;

    use super::{Config, Opts, OutputFormat};
    use crate::ports::PortSet;

    impl Config {
        fn sample() -> Self {
            Self {
                addresses: Some(vec!["127.0.0.1".to_owned()]),
                concurrency: Some(200),
                timeout: Some(1_000),
                tcp_ports: Some("22, 80".to_owned()),
                udp_retries: Some(4),
                format: Some(OutputFormat::Json),
                greppable: Some(true),
                accessible: Some(true),
                ulimit: Some(5_000),
                ..Self::default()
            }
        }
    }

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }

    #[parameterized(input = {
        vec!["rescuescan", "-a", "10.0.0.1"],
        vec!["rescuescan", "-a", "10.0.0.1", "--tcp-ports", "443,22"],
        vec!["rescuescan", "-a", "10.0.0.1", "--tcp-ports", ""],
        vec!["rescuescan", "-a", "10.0.0.1", "--tcp-ports", "abc,70000"],
    }, expected = {
        vec![21, 22, 25, 80, 110, 143, 161, 162, 443, 465, 500, 587, 993, 995, 1194, 1494, 1701,
             2222, 2598, 4353, 4433, 4500, 8080, 8443, 9443, 10443, 17777, 17778],
        vec![22, 443],
        vec![],
        vec![],
    })]
    fn tcp_ports_are_parsed_best_effort(input: Vec<&str>, expected: Vec<u16>) {
        let opts = Opts::parse_from(input);
        assert_eq!(opts.tcp_ports.to_vec(), expected);
    }

    #[test]
    fn addresses_are_split_on_commas() {
        let opts = Opts::parse_from(["rescuescan", "-a", "10.0.0.1,10.0.1.0/24,hosts.txt"]);
        assert_eq!(opts.addresses, ["10.0.0.1", "10.0.1.0/24", "hosts.txt"]);
    }

    #[test]
    fn threads_alias_sets_concurrency() {
        let opts = Opts::parse_from(["rescuescan", "--threads", "7"]);
        assert_eq!(opts.concurrency, 7);
    }

    #[test]
    fn run_config_carries_every_option() {
        let opts = Opts::parse_from([
            "rescuescan",
            "-c", "0",
            "-t", "750",
            "-d", "300",
            "--udp-ports", "161",
            "--udp-retries", "0",
            "--udp-send-delay", "5",
            "--udp-receive-window", "250",
            "--udp-jitter", "1",
        ]);
        let config = opts.run_config();

        assert_eq!(config.concurrency.get(), 1);
        assert_eq!(config.timeout, Duration::from_millis(750));
        assert_eq!(config.interphase_delay, Duration::from_millis(300));
        assert_eq!(config.udp_ports, PortSet::parse("161"));
        assert_eq!(config.udp_retries.get(), 1);
        assert_eq!(config.udp_send_delay, Duration::from_millis(5));
        assert_eq!(config.udp_receive_window, Duration::from_millis(250));
        assert_eq!(config.udp_jitter, Duration::from_millis(1));
    }

    #[test]
    fn zero_timeout_from_cli_or_config_is_raised() {
        let opts = Opts::parse_from(["rescuescan", "-t", "0"]);
        assert_eq!(opts.run_config().timeout, crate::config::MIN_TIMEOUT);

        let mut opts = Opts {
            no_config: false,
            ..Opts::default()
        };
        opts.merge(&Config {
            timeout: Some(0),
            ..Config::default()
        });
        assert_eq!(opts.run_config().timeout, crate::config::MIN_TIMEOUT);
    }

    #[test]
    fn opts_no_merge_when_config_is_ignored() {
        let mut opts = Opts::default();
        let config = Config::sample();

        opts.merge(&config);

        assert_eq!(opts.addresses, vec![] as Vec<String>);
        assert_eq!(opts.concurrency, 50);
        assert_eq!(opts.format, OutputFormat::Csv);
    }

    #[test]
    fn opts_merge_required_arguments() {
        let mut opts = Opts::default();
        let config = Config::sample();

        opts.merge_required(&config);

        assert_eq!(opts.addresses, config.addresses.unwrap());
        assert_eq!(opts.concurrency, 200);
        assert_eq!(opts.timeout, 1_000);
        assert_eq!(opts.udp_retries, 4);
        assert_eq!(opts.format, OutputFormat::Json);
        assert!(opts.accessible);
        assert_eq!(opts.delay, 0);
    }

    #[test]
    fn opts_merge_optional_arguments() {
        let mut opts = Opts::default();
        let config = Config::sample();

        opts.merge_optional(&config);

        assert_eq!(opts.tcp_ports.to_vec(), vec![22, 80]);
        assert_eq!(opts.udp_ports, PortSet::parse("53,123,161,500"));
        assert_eq!(opts.ulimit, Some(5_000));
    }

    #[test]
    fn config_file_parses_from_toml() {
        let config = Config::parse(
            r#"
            addresses = ["10.0.0.0/24"]
            concurrency = 10
            udp_ports = ""
            format = "json"
            "#,
        )
        .unwrap();

        let mut opts = Opts {
            no_config: false,
            ..Opts::default()
        };
        opts.merge(&config);

        assert_eq!(opts.addresses, ["10.0.0.0/24"]);
        assert_eq!(opts.concurrency, 10);
        assert!(opts.udp_ports.is_empty());
        assert_eq!(opts.format, OutputFormat::Json);
    }

    #[test]
    fn unknown_config_value_is_an_error() {
        assert!(Config::parse("concurrency = \"lots\"").is_err());
    }
}
