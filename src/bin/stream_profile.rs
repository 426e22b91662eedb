//! Stream profile: RSS and throughput while streaming large results.
//!
//! Runs a one-command CYPHER batch returning 1K, 10K, 100K and 1M identical
//! rows through the compact and compat writers into a byte-counting sink.
//! The RSS delta should stay flat as the row count grows.
//!
//! Run: cargo run --release --bin stream_profile

use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use graphbatch::query::{QueryResult, Row};
use graphbatch::{Batch, BatchSession, MemoryGraph, OutputFormat, ResultWriter, RowsExecutor, Value};
use serde_json::json;
use sysinfo::{ProcessRefreshKind, RefreshKind, System};

const QUERY: &str = "MATCH (n) RETURN n.id, n.name, n.score";

// ── Sink ───────────────────────────────────────────────────────────────

#[derive(Default)]
struct CountingSink {
    bytes: u64,
}

impl Write for CountingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ── Rows ───────────────────────────────────────────────────────────────

fn constant_row() -> Row {
    let mut row = Row::new();
    row.insert("n.id".to_string(), Value::Integer(42));
    row.insert("n.name".to_string(), Value::String("constant".to_string()));
    row.insert("n.score".to_string(), Value::Float(0.5));
    row
}

fn executor(rows: u64) -> RowsExecutor {
    RowsExecutor::new().on(QUERY, move |_, _| {
        let columns = vec!["n.id".to_string(), "n.name".to_string(), "n.score".to_string()];
        Ok(QueryResult::new(columns, (0..rows).map(|_| Ok(constant_row()))))
    })
}

// ── RSS measurement ────────────────────────────────────────────────────

fn process_rss() -> Result<u64> {
    let mut sys = System::new_with_specifics(RefreshKind::new().with_processes(ProcessRefreshKind::everything()));
    sys.refresh_all();
    let pid = sysinfo::get_current_pid().map_err(anyhow::Error::msg)?;
    Ok(sys.process(pid).map(|p| p.memory()).unwrap_or(0))
}

struct Sample {
    bytes: u64,
    elapsed: Duration,
    rss_delta: u64,
}

fn measure(rows: u64, format: &OutputFormat) -> Result<Sample> {
    // Let OS settle RSS from prior allocations
    std::thread::sleep(Duration::from_millis(100));
    let baseline = process_rss()?;

    let mut graph = MemoryGraph::new();
    let executor = executor(rows);
    let batch = Batch::from_json(json!([["CYPHER", null, {"query": QUERY}]]))?;
    let mut writer = ResultWriter::new(CountingSink::default(), format);

    let started = Instant::now();
    let report = BatchSession::new(&mut graph, &executor)
        .run(&batch, &mut writer)
        .with_context(|| format!("streaming {} rows", rows))?;
    let elapsed = started.elapsed();
    anyhow::ensure!(report.rows == rows, "expected {} rows, streamed {}", rows, report.rows);

    let after = process_rss()?;
    Ok(Sample { bytes: writer.into_inner().bytes, elapsed, rss_delta: after.saturating_sub(baseline) })
}

// ── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).with_writer(io::stderr).init();

    println!("graphbatch stream profile (process RSS delta)");
    println!("=============================================");
    println!();
    println!(
        "{:<10} {:<8} {:>12} {:>10} {:>12} {:>10}",
        "Rows", "Mode", "Output (MB)", "Time (ms)", "Rows/s", "RSS (MB)"
    );
    println!("{:-<67}", "");

    let formats = [("compact", OutputFormat::compact()), ("compat", OutputFormat::compat("http://localhost:7474/db/data/"))];
    for rows in [1_000u64, 10_000, 100_000, 1_000_000] {
        for (name, format) in &formats {
            eprint!("Measuring {} {}... ", rows, name);
            let sample = measure(rows, format)?;

            let secs = sample.elapsed.as_secs_f64();
            let rate = if secs > 0.0 { format!("{:.0}", rows as f64 / secs) } else { "N/A".to_string() };
            println!(
                "{:<10} {:<8} {:>12.1} {:>10} {:>12} {:>10.1}",
                rows,
                name,
                sample.bytes as f64 / (1024.0 * 1024.0),
                sample.elapsed.as_millis(),
                rate,
                sample.rss_delta as f64 / (1024.0 * 1024.0),
            );
            eprintln!("done");
        }
    }

    println!();
    println!("Note: RSS is sampled after each run; a flat column means rows were not retained.");
    Ok(())
}
