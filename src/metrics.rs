//! Performance metrics for batch execution
//!
//! Lightweight, thread-safe counters shared (behind `Arc`) by every session
//! of a database. Tracks:
//! - command latencies with percentiles (p50, p95, p99)
//! - slow commands
//! - per-opcode counts and latency sums
//! - committed vs rolled-back batches
//! - entities written and query rows streamed
//!
//! All counters are `AtomicU64`; only the latency window and the slow
//! command list sit behind a mutex. Memory is bounded by
//! `LATENCY_WINDOW_SIZE` and `MAX_SLOW_COMMANDS`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::interpreter::Outcome;
use crate::protocol::Opcode;

/// Number of recent command latencies kept for percentiles
const LATENCY_WINDOW_SIZE: usize = 1000;

/// Slow commands kept for reporting
const MAX_SLOW_COMMANDS: usize = 10;

/// Commands at or above this many milliseconds are recorded as slow
pub const SLOW_COMMAND_THRESHOLD_MS: u64 = 100;

const OPCODES: usize = Opcode::ALL.len();

pub struct Metrics {
    // ========================================================================
    // Commands
    // ========================================================================
    command_count: AtomicU64,
    slow_command_count: AtomicU64,
    /// Rolling window of recent latencies, microseconds
    latencies_us: Mutex<VecDeque<u64>>,
    /// Sum of the window, for the average
    latency_sum_us: AtomicU64,
    op_counts: [AtomicU64; OPCODES],
    op_latency_sums_us: [AtomicU64; OPCODES],

    // ========================================================================
    // Batches
    // ========================================================================
    batches_committed: AtomicU64,
    batches_rolled_back: AtomicU64,
    entities_written: AtomicU64,
    rows_streamed: AtomicU64,

    slow_commands: Mutex<VecDeque<SlowCommand>>,
    started_at: Instant,
}

/// A command that took at least `SLOW_COMMAND_THRESHOLD_MS`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SlowCommand {
    pub opcode: &'static str,
    pub duration_ms: u64,
    /// When it finished, ms since metrics started
    pub timestamp_ms: u64,
}

/// Per-opcode statistics
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OperationStat {
    pub opcode: &'static str,
    pub count: u64,
    pub avg_us: u64,
}

/// Point-in-time copy of every metric
#[derive(Clone, Debug, Default, Serialize)]
pub struct MetricsSnapshot {
    pub command_count: u64,
    pub slow_command_count: u64,
    pub command_p50_us: u64,
    pub command_p95_us: u64,
    pub command_p99_us: u64,
    pub command_avg_us: u64,

    pub batches_committed: u64,
    pub batches_rolled_back: u64,
    pub entities_written: u64,
    pub rows_streamed: u64,

    pub top_slow_commands: Vec<SlowCommand>,
    pub uptime_secs: u64,
    /// Opcodes seen so far, most frequent first
    pub op_stats: Vec<OperationStat>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            command_count: AtomicU64::new(0),
            slow_command_count: AtomicU64::new(0),
            latencies_us: Mutex::new(VecDeque::with_capacity(LATENCY_WINDOW_SIZE)),
            latency_sum_us: AtomicU64::new(0),
            op_counts: std::array::from_fn(|_| AtomicU64::new(0)),
            op_latency_sums_us: std::array::from_fn(|_| AtomicU64::new(0)),
            batches_committed: AtomicU64::new(0),
            batches_rolled_back: AtomicU64::new(0),
            entities_written: AtomicU64::new(0),
            rows_streamed: AtomicU64::new(0),
            slow_commands: Mutex::new(VecDeque::with_capacity(MAX_SLOW_COMMANDS)),
            started_at: Instant::now(),
        }
    }

    /// Record one executed command. O(1) amortized.
    pub fn record_command(&self, opcode: Opcode, duration: Duration, outcome: Outcome) {
        let us = micros(duration);
        self.command_count.fetch_add(1, Ordering::Relaxed);
        self.op_counts[opcode as usize].fetch_add(1, Ordering::Relaxed);
        self.op_latency_sums_us[opcode as usize].fetch_add(us, Ordering::Relaxed);
        self.entities_written.fetch_add(outcome.entities, Ordering::Relaxed);
        self.rows_streamed.fetch_add(outcome.rows, Ordering::Relaxed);

        {
            let mut latencies = locked(&self.latencies_us);
            if latencies.len() >= LATENCY_WINDOW_SIZE {
                if let Some(old) = latencies.pop_front() {
                    self.latency_sum_us.fetch_sub(old, Ordering::Relaxed);
                }
            }
            latencies.push_back(us);
            self.latency_sum_us.fetch_add(us, Ordering::Relaxed);
        }

        let ms = us / 1000;
        if ms >= SLOW_COMMAND_THRESHOLD_MS {
            self.slow_command_count.fetch_add(1, Ordering::Relaxed);
            let slow = SlowCommand {
                opcode: opcode.as_str(),
                duration_ms: ms,
                timestamp_ms: self.started_at.elapsed().as_millis() as u64,
            };
            let mut slow_commands = locked(&self.slow_commands);
            if slow_commands.len() >= MAX_SLOW_COMMANDS {
                slow_commands.pop_front();
            }
            slow_commands.push_back(slow);
        }
    }

    /// Record how a batch ended
    pub fn record_batch(&self, committed: bool) {
        let counter = if committed { &self.batches_committed } else { &self.batches_rolled_back };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// O(LATENCY_WINDOW_SIZE) for the percentile sort
    pub fn snapshot(&self) -> MetricsSnapshot {
        let (p50, p95, p99, avg) = {
            let latencies = locked(&self.latencies_us);
            if latencies.is_empty() {
                (0, 0, 0, 0)
            } else {
                let mut sorted: Vec<u64> = latencies.iter().copied().collect();
                sorted.sort_unstable();
                let len = sorted.len();
                (
                    sorted[len * 50 / 100],
                    sorted[len * 95 / 100],
                    sorted.get(len * 99 / 100).copied().unwrap_or(sorted[len - 1]),
                    self.latency_sum_us.load(Ordering::Relaxed) / len as u64,
                )
            }
        };

        MetricsSnapshot {
            command_count: self.command_count.load(Ordering::Relaxed),
            slow_command_count: self.slow_command_count.load(Ordering::Relaxed),
            command_p50_us: p50,
            command_p95_us: p95,
            command_p99_us: p99,
            command_avg_us: avg,
            batches_committed: self.batches_committed.load(Ordering::Relaxed),
            batches_rolled_back: self.batches_rolled_back.load(Ordering::Relaxed),
            entities_written: self.entities_written.load(Ordering::Relaxed),
            rows_streamed: self.rows_streamed.load(Ordering::Relaxed),
            top_slow_commands: locked(&self.slow_commands).iter().cloned().collect(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            op_stats: self.op_stats(),
        }
    }

    fn op_stats(&self) -> Vec<OperationStat> {
        let mut stats: Vec<OperationStat> = Opcode::ALL
            .iter()
            .filter_map(|op| {
                let count = self.op_counts[*op as usize].load(Ordering::Relaxed);
                (count > 0).then(|| OperationStat {
                    opcode: op.as_str(),
                    count,
                    avg_us: self.op_latency_sums_us[*op as usize].load(Ordering::Relaxed) / count,
                })
            })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count));
        stats
    }
}
