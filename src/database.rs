//! Database - a store shared between threads
//!
//! Wraps one `GraphStore` behind an `RwLock`. A batch holds the write lock
//! from `begin_tx` to the last byte of its response, so batches against the
//! same store never interleave and unique get-or-create is atomic across
//! them. Stats readers take the read lock.

use std::io::Write;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::graph::GraphStore;
use crate::metrics::Metrics;
use crate::protocol::Batch;
use crate::query::QueryExecutor;
use crate::session::{BatchReport, BatchSession, SessionOptions};
use crate::writer::ResultWriter;

pub struct Database {
    store: RwLock<Box<dyn GraphStore>>,
    executor: Box<dyn QueryExecutor>,
    metrics: Option<Arc<Metrics>>,
}

impl Database {
    pub fn new(store: Box<dyn GraphStore>, executor: Box<dyn QueryExecutor>) -> Self {
        Self { store: RwLock::new(store), executor, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.metrics.as_ref()
    }

    /// Run one batch under the write lock
    pub fn execute<W: Write>(
        &self,
        batch: &Batch,
        options: &SessionOptions,
        writer: &mut ResultWriter<W>,
    ) -> Result<BatchReport> {
        let mut store = self.write_store();
        let mut session = BatchSession::new(&mut **store, &*self.executor).with_options(options.clone());
        if let Some(metrics) = &self.metrics {
            session = session.with_metrics(Arc::clone(metrics));
        }
        session.run(batch, writer)
    }

    /// Read-only access to the store, e.g. for stats
    pub fn with_store_read<R>(&self, f: impl FnOnce(&dyn GraphStore) -> R) -> R {
        let store = self.read_store();
        f(&**store)
    }

    // A panic mid-batch leaves the store inside an open transaction; the
    // next writer rolls it back before running anything.
    fn write_store(&self) -> RwLockWriteGuard<'_, Box<dyn GraphStore>> {
        match self.store.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Store lock poisoned, rolling back interrupted batch");
                let mut guard = poisoned.into_inner();
                if let Err(err) = guard.rollback_tx() {
                    tracing::debug!(error = %err, "No interrupted transaction to roll back");
                }
                self.store.clear_poison();
                guard
            }
        }
    }

    fn read_store(&self) -> RwLockReadGuard<'_, Box<dyn GraphStore>> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }
}
