#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::doc_markdown, clippy::if_not_else, clippy::non_ascii_literal)]

use std::sync::Mutex;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use rescuescan::address::parse_addresses;
use rescuescan::input::{Config, Opts};
use rescuescan::output::{print_records, print_summary, write_report};
use rescuescan::scanner::{Discovery, Phase, Progress};
use rescuescan::tui::print_opening;
use rescuescan::{detail, output, warning};

#[cfg(unix)]
const RESERVED_FILE_DESCRIPTORS: u64 = 64;
/// A rescue worker holds one TCP and one UDP socket at the same time; a ping
/// worker holds the helper's pipes.
#[cfg(unix)]
const FILE_DESCRIPTORS_PER_WORKER: u64 = 3;

#[tokio::main]
#[cfg(not(tarpaulin_include))]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut opts: Opts = Opts::read();
    if !opts.no_config {
        let config = Config::read(opts.config_path.clone())?;
        opts.merge(&config);
    }

    debug!("Main() `opts` arguments are {opts:?}");

    if !opts.no_banner {
        print_opening(opts.greppable, opts.accessible);
    }

    let ips = parse_addresses(&opts).await;

    if ips.is_empty() {
        warning!(
            "No valid IPs or subnets found, aborting.",
            opts.greppable,
            opts.accessible
        );
        std::process::exit(1);
    }

    #[cfg(unix)]
    let concurrency = infer_concurrency(&opts, adjust_ulimit_size(&opts));
    #[cfg(not(unix))]
    let concurrency = opts.concurrency;

    let run_config = opts.run_config().with_concurrency(concurrency);

    detail!(
        format!("Total targets: {}", ips.len()),
        opts.greppable,
        opts.accessible
    );
    detail!(
        format!(
            "Concurrency: {} | Timeout: {}ms | TCP rescue ports: {} | UDP rescue ports: {}",
            run_config.concurrency,
            opts.timeout,
            run_config.tcp_ports.len(),
            run_config.udp_ports.len()
        ),
        opts.greppable,
        opts.accessible
    );

    let started_at = Utc::now();
    let mut discovery = Discovery::new(run_config).on_progress(progress_reporter(&opts));
    let report = discovery.run(&ips).await;

    print_records(&report.records, opts.greppable, opts.accessible);
    if !opts.greppable {
        print_summary(&report.summary, discovery.method(), opts.accessible);
    }

    if !opts.no_output {
        if write_report(&opts.output, opts.format, &report, started_at)? {
            output!(
                format!("Live IP details saved to {}", opts.output.display()),
                opts.greppable,
                opts.accessible
            );
        } else {
            detail!(
                "No live hosts found, nothing written.",
                opts.greppable,
                opts.accessible
            );
        }
    }

    Ok(())
}

/// One progress bar per running phase; hidden for greppable or accessible runs.
fn progress_reporter(opts: &Opts) -> impl Fn(Progress) + Send + Sync + 'static {
    let hidden = opts.greppable || opts.accessible;
    let current: Mutex<Option<ProgressBar>> = Mutex::new(None);

    move |progress: Progress| {
        let Ok(mut current) = current.lock() else {
            return;
        };

        match progress.phase {
            Phase::ReachabilityRunning | Phase::RescueRunning => {
                let bar = current.get_or_insert_with(|| new_bar(progress, hidden));
                bar.set_position(progress.done as u64);
            }
            _ => {
                if let Some(bar) = current.take() {
                    bar.finish_and_clear();
                }
            }
        }
    }
}

fn new_bar(progress: Progress, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(progress.total as u64);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.green} {msg:<12} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
    ) {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.set_message(progress.phase.to_string());
    bar
}

#[cfg(unix)]
fn adjust_ulimit_size(opts: &Opts) -> u64 {
    use rlimit::Resource;

    if let Some(limit) = opts.ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            detail!(
                format!("Automatically increasing ulimit value to {limit}."),
                opts.greppable,
                opts.accessible
            );
        } else {
            warning!(
                "ERROR. Failed to set ulimit value.",
                opts.greppable,
                opts.accessible
            );
        }
    }

    Resource::NOFILE.get().map_or(u64::MAX, |(soft, _)| soft)
}

/// Lowers the concurrency when the open file limit cannot sustain it.
#[cfg(unix)]
fn infer_concurrency(opts: &Opts, ulimit: u64) -> usize {
    let wanted = opts.concurrency as u64;
    let affordable = ulimit.saturating_sub(RESERVED_FILE_DESCRIPTORS) / FILE_DESCRIPTORS_PER_WORKER;

    if affordable >= wanted {
        return opts.concurrency;
    }

    warning!(
        format!(
            "File limit {ulimit} is too low for concurrency {wanted}, using {}. Consider upping with --ulimit.",
            affordable.max(1)
        ),
        opts.greppable,
        opts.accessible
    );
    usize::try_from(affordable.max(1)).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    #[cfg(unix)]
    use super::infer_concurrency;
    use rescuescan::input::Opts;

    #[test]
    #[cfg(unix)]
    fn concurrency_is_kept_when_ulimit_allows_it() {
        let opts = Opts {
            concurrency: 50,
            ..Opts::default()
        };
        assert_eq!(infer_concurrency(&opts, 1024), 50);
    }

    #[test]
    #[cfg(unix)]
    fn concurrency_is_lowered_to_fit_the_ulimit() {
        let opts = Opts {
            concurrency: 500,
            ..Opts::default()
        };
        assert_eq!(infer_concurrency(&opts, 364), 100);
    }

    #[test]
    #[cfg(unix)]
    fn tiny_ulimit_still_leaves_one_worker() {
        let opts = Opts {
            concurrency: 500,
            ..Opts::default()
        };
        assert_eq!(infer_concurrency(&opts, 10), 1);
    }
}
