//! BatchSession - one batch, one transaction, one response document
//!
//! Protocol:
//! 1. reject the batch up front if it writes and the session is read-only
//! 2. begin the transaction, open the outer array
//! 3. per command: open its array, dispatch, close it (flushes the sink)
//! 4. commit if every command succeeded, otherwise roll back
//! 5. always close whatever arrays are still open and flush
//!
//! Bytes flushed before a failure stay flushed. The error is still returned,
//! so the transport can signal it out of band; the document it sent is
//! syntactically complete either way.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;

use crate::context::Context;
use crate::error::{GraphError, Result};
use crate::graph::GraphStore;
use crate::interpreter::{Interpreter, Outcome};
use crate::metrics::Metrics;
use crate::protocol::Batch;
use crate::query::QueryExecutor;
use crate::writer::ResultWriter;

/// Access mode for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Mutating opcodes are rejected
    ReadOnly,
    #[default]
    ReadWrite,
}

impl AccessMode {
    /// Parse access mode from string
    pub fn parse(s: &str) -> Self {
        match s {
            "ro" | "readonly" | "read-only" => AccessMode::ReadOnly,
            _ => AccessMode::ReadWrite,
        }
    }

    /// Convert to wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::ReadOnly => "ro",
            AccessMode::ReadWrite => "rw",
        }
    }

    /// Check if write operations are allowed
    pub fn is_write(&self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    pub access_mode: AccessMode,
}

impl SessionOptions {
    pub fn read_only() -> Self {
        Self { access_mode: AccessMode::ReadOnly }
    }
}

/// Totals for one committed batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub commands: usize,
    pub entities: u64,
    pub rows: u64,
}

pub struct BatchSession<'a> {
    store: &'a mut dyn GraphStore,
    executor: &'a dyn QueryExecutor,
    options: SessionOptions,
    metrics: Option<Arc<Metrics>>,
}

impl<'a> BatchSession<'a> {
    pub fn new(store: &'a mut dyn GraphStore, executor: &'a dyn QueryExecutor) -> Self {
        Self { store, executor, options: SessionOptions::default(), metrics: None }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Check if write operations are allowed
    pub fn can_write(&self) -> bool {
        self.options.access_mode.is_write()
    }

    /// Run `batch`, writing one array per command into `writer`
    pub fn run<W: Write>(&mut self, batch: &Batch, writer: &mut ResultWriter<W>) -> Result<BatchReport> {
        if !self.can_write() && batch.has_writes() {
            return Err(GraphError::ReadOnlyMode);
        }

        let started = Instant::now();
        let depth = writer.depth();
        self.store.begin_tx()?;

        let mut context = Context::new();
        let executed = writer.start_array().and_then(|()| self.run_commands(batch, &mut context, writer));

        let result = match executed {
            Ok(report) => self.store.commit_tx().map(|()| {
                tracing::info!(
                    commands = report.commands,
                    entities = report.entities,
                    rows = report.rows,
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "Batch committed"
                );
                report
            }),
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "Batch aborted, rolling back");
                if let Err(rollback) = self.store.rollback_tx() {
                    tracing::error!(error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.record_batch(result.is_ok());
        }

        let finalized = writer.unwind(depth);
        if let Err(err) = &finalized {
            tracing::error!(error = %err, "Failed to finalize batch output");
        }
        let report = result?;
        finalized?;
        Ok(report)
    }

    fn run_commands<W: Write>(
        &mut self,
        batch: &Batch,
        context: &mut Context,
        writer: &mut ResultWriter<W>,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        for (index, command) in batch.commands().iter().enumerate() {
            let started = Instant::now();
            writer.start_array()?;
            let outcome: Outcome = Interpreter::new(&mut *self.store, self.executor, context, writer).execute(command)?;
            writer.end_array()?;

            let elapsed = started.elapsed();
            tracing::debug!(
                index,
                opcode = command.opcode.as_str(),
                entities = outcome.entities,
                rows = outcome.rows,
                elapsed_us = elapsed.as_micros() as u64,
                "Command executed"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_command(command.opcode, elapsed, outcome);
            }
            report.commands += 1;
            report.entities += outcome.entities;
            report.rows += outcome.rows;
        }
        Ok(report)
    }
}
