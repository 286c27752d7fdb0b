use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::Sender;
use tracing::{debug, info};

use crate::lock_manager::{LockManagerA, LockManagerB};
use crate::storage::{MultiVersionStorage, SingleVersionStorage, Store};
use crate::transaction::Transaction;
use crate::types::{CCMode, TxnId};
use crate::worker_pool::{Job, WorkerPool};

use super::occ::Validation;
use super::{locking, mvcc, occ, serial, Shared};

/// Tunables for a processor instance.
#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig {
    /// Worker threads executing transaction bodies.
    pub workers: usize,
    /// Size of the dense key range, pre-initialized to value 0.
    pub num_keys: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            workers: 8,
            num_keys: 1_000_000,
        }
    }
}

/// A transaction processor running one concurrency-control protocol.
///
/// Construction starts the scheduler thread and the worker pool; clients
/// [`submit`](Self::submit) transactions and collect them back, in terminal
/// state, from [`next_result`](Self::next_result).
pub struct TxnProcessor {
    mode: CCMode,
    shared: Arc<Shared>,
    scheduler: Option<JoinHandle<()>>,
    pool: WorkerPool,
}

impl TxnProcessor {
    pub fn new(mode: CCMode) -> Self {
        Self::with_config(mode, ProcessorConfig::default())
    }

    pub fn with_config(mode: CCMode, config: ProcessorConfig) -> Self {
        let store = if mode.is_multi_version() {
            Store::Multi(MultiVersionStorage::new(config.num_keys))
        } else {
            Store::Single(SingleVersionStorage::new(config.num_keys))
        };
        let shared = Arc::new(Shared::new(store));
        let pool = WorkerPool::new(config.workers.max(1));
        let jobs = pool.sender();

        let scheduler = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("txnlab-scheduler".to_string())
                .spawn(move || run_scheduler(mode, &shared, &jobs))
                .expect("failed to spawn scheduler thread")
        };

        info!(%mode, workers = config.workers, num_keys = config.num_keys, "processor started");
        TxnProcessor {
            mode,
            shared,
            scheduler: Some(scheduler),
            pool,
        }
    }

    pub fn mode(&self) -> CCMode {
        self.mode
    }

    /// Hands a transaction to the processor, returning the id it was admitted
    /// under. Ids are strictly increasing across the processor's lifetime.
    pub fn submit(&self, txn: Transaction) -> TxnId {
        self.shared.admit(Box::new(txn))
    }

    /// Returns the next transaction to reach a terminal state, blocking until
    /// one is available. Ownership transfers back to the caller.
    pub fn next_result(&self) -> Transaction {
        loop {
            if let Some(txn) = self.shared.results.pop() {
                return *txn;
            }
            std::thread::sleep(Duration::from_micros(1));
        }
    }

    /// Non-blocking variant of [`next_result`](Self::next_result).
    pub fn try_next_result(&self) -> Option<Transaction> {
        self.shared.results.pop().map(|txn| *txn)
    }

    /// Stops the scheduler at its next iteration and joins all threads.
    /// Transactions still in flight are dropped, not completed.
    pub fn shutdown(&mut self) {
        if self.scheduler.is_none() {
            return;
        }
        self.shared.stop();
        if let Some(handle) = self.scheduler.take() {
            handle.join().expect("scheduler thread panicked");
        }
        self.pool.shutdown();
        info!(mode = %self.mode, "processor stopped");
    }
}

impl Drop for TxnProcessor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_scheduler(mode: CCMode, shared: &Arc<Shared>, jobs: &Sender<Job>) {
    debug!(%mode, "scheduler running");
    match mode {
        CCMode::Serial => serial::run(shared),
        CCMode::LockingA => locking::run::<LockManagerA>(shared, jobs),
        CCMode::LockingB => locking::run::<LockManagerB>(shared, jobs),
        CCMode::OccSerialForward => occ::run_serial(shared, jobs, Validation::Forward),
        CCMode::OccSerialBackward => occ::run_serial(shared, jobs, Validation::Backward),
        CCMode::OccParallelForward => occ::run_parallel(shared, jobs, Validation::Forward),
        CCMode::OccParallelBackward => occ::run_parallel(shared, jobs, Validation::Backward),
        CCMode::MvccTo => mvcc::run_mvto(shared, jobs),
        CCMode::Mvcc2pl => mvcc::run_mv2pl(shared, jobs),
    }
    debug!(%mode, "scheduler stopped");
}
