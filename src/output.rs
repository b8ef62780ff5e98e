//! Rendering and persisting the records of a finished run.
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use serde_derive::Serialize;

use crate::input::OutputFormat;
use crate::record::{HostRecord, Status};
use crate::scanner::{DiscoveryReport, Summary};

const HEADERS: [&str; 4] = ["IP", "Status", "Source", "Detail"];

/// Prints the records as an aligned table, or as CSV-ish lines when greppable.
pub fn print_records(records: &[HostRecord], greppable: bool, accessible: bool) {
    if greppable {
        for record in records {
            println!(
                "{},{},{},{}",
                record.address, record.status, record.source, record.detail
            );
        }
        return;
    }

    let widths = column_widths(records);
    let header = format_row(&HEADERS, &widths);
    if accessible {
        println!("{header}");
    } else {
        println!("{}", header.bold());
    }

    for record in records {
        let row = format_row(
            &[
                &record.address.to_string(),
                &record.status.to_string(),
                &record.source.to_string(),
                &record.detail,
            ],
            &widths,
        );
        if accessible {
            println!("{row}");
        } else {
            println!("{}", paint(row, record.status));
        }
    }
}

/// Prints the run counters.
pub fn print_summary(summary: &Summary, method: &str, accessible: bool) {
    let lines = [
        format!("Targets: {}", summary.targets),
        format!("Alive from {method}: {}", summary.alive),
        format!(
            "Alive from rescue: {} (TCP {}, UDP {}, TCP+UDP {})",
            summary.rescued(),
            summary.rescued_tcp,
            summary.rescued_udp,
            summary.rescued_both
        ),
        format!("No answer at all: {}", summary.unresponsive),
        format!(
            "Total live hosts: {} in {:.2}s",
            summary.total_live(),
            summary.elapsed.as_secs_f64()
        ),
    ];

    for line in lines {
        crate::output!(line, false, accessible);
    }
}

fn paint(row: String, status: Status) -> ColoredString {
    match status {
        Status::Alive => row.green(),
        Status::Dead => row.yellow(),
    }
}

fn column_widths(records: &[HostRecord]) -> [usize; 4] {
    let mut widths = HEADERS.map(str::len);
    for record in records {
        let cells = [
            record.address.to_string().len(),
            record.status.to_string().len(),
            record.source.to_string().len(),
            record.detail.len(),
        ];
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell);
        }
    }
    widths
}

fn format_row(cells: &[&str; 4], widths: &[usize; 4]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_owned()
}

#[derive(Serialize)]
struct JsonReport<'a> {
    started_at: DateTime<Utc>,
    #[serde(flatten)]
    report: &'a DiscoveryReport,
}

/// Writes the report to `path`. Nothing is written for an empty record set.
///
/// Returns whether a file was written.
pub fn write_report(
    path: &Path,
    format: OutputFormat,
    report: &DiscoveryReport,
    started_at: DateTime<Utc>,
) -> anyhow::Result<bool> {
    if report.records.is_empty() {
        return Ok(false);
    }

    match format {
        OutputFormat::Csv => write_csv_file_atomic(path, &report.records)?,
        OutputFormat::Json => write_json_file_atomic(
            path,
            &JsonReport {
                started_at,
                report,
            },
        )?,
    }
    Ok(true)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn write_csv_file_atomic(path: &Path, records: &[HostRecord]) -> anyhow::Result<()> {
    let tmp = tmp_path(path);
    let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    let mut wtr = csv::Writer::from_writer(BufWriter::new(file));

    wtr.write_record(HEADERS)?;
    for record in records {
        wtr.write_record([
            record.address.to_string(),
            record.status.to_string(),
            record.source.to_string(),
            record.detail.clone(),
        ])?;
    }
    wtr.flush()?;
    drop(wtr);

    fs::rename(&tmp, path).with_context(|| format!("moving output to {}", path.display()))?;
    Ok(())
}

fn write_json_file_atomic(path: &Path, value: &JsonReport<'_>) -> anyhow::Result<()> {
    let tmp = tmp_path(path);
    let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, value)?;
    w.flush()?;
    drop(w);

    fs::rename(&tmp, path).with_context(|| format!("moving output to {}", path.display()))?;
    Ok(())
}
