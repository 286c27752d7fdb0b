use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::queue::SegQueue;
use tracing::{debug, error, trace};

use crate::history::{ActiveSet, CommittedHistory, CommittedTxn};
use crate::storage::{SingleVersionStorage, Store};
use crate::transaction::{Transaction, TxnStatus};
use crate::types::{Key, TxnId};

mod locking;
mod mvcc;
mod occ;
mod serial;
#[allow(clippy::module_inception)]
mod processor;

pub use processor::{ProcessorConfig, TxnProcessor};

/// State shared between the scheduler thread, the workers, and the client
/// handle.
pub(crate) struct Shared {
    store: Store,
    /// Incoming transaction requests, in submission order.
    requests: SegQueue<Box<Transaction>>,
    /// Transactions whose bodies have run but whose fate is undecided.
    completed: SegQueue<Box<Transaction>>,
    /// Terminal transactions waiting for the client to collect them.
    results: SegQueue<Box<Transaction>>,
    history: CommittedHistory,
    active: ActiveSet,
    next_id: AtomicU64,
    stopped: AtomicBool,
}

impl Shared {
    pub fn new(store: Store) -> Self {
        Shared {
            store,
            requests: SegQueue::new(),
            completed: SegQueue::new(),
            results: SegQueue::new(),
            history: CommittedHistory::new(),
            active: ActiveSet::new(),
            next_id: AtomicU64::new(1),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(SeqCst)
    }

    pub fn stop(&self) {
        self.stopped.store(true, SeqCst);
    }

    fn fresh_id(&self) -> TxnId {
        self.next_id.fetch_add(1, SeqCst)
    }

    /// Assigns the next id and queues the transaction for the scheduler.
    pub fn admit(&self, mut txn: Box<Transaction>) -> TxnId {
        let id = self.fresh_id();
        txn.set_id(id);
        trace!(id, "transaction admitted");
        self.requests.push(txn);
        id
    }

    /// Re-admits a transaction that failed validation: accumulated reads and
    /// writes are discarded and it retries under a fresh, larger id.
    pub fn readmit(&self, mut txn: Box<Transaction>) {
        let old_id = txn.id();
        let id = self.fresh_id();
        txn.reset_for_retry(id);
        debug!(old_id, new_id = id, "validation failed, re-admitting");
        self.requests.push(txn);
    }

    pub fn publish(&self, txn: Box<Transaction>) {
        debug_assert!(txn.status().is_terminal());
        trace!(id = txn.id(), status = ?txn.status(), "result published");
        self.results.push(txn);
    }

    /// Appends the transaction to the committed history. The append order is
    /// the canonical commit order OCC validators check against.
    pub fn record_commit(&self, txn: &Transaction) {
        self.history.push(Arc::new(CommittedTxn {
            id: txn.id(),
            write_keys: txn.writes().keys().copied().collect(),
        }));
    }
}

/// Backoff used by every polling loop when a queue comes up empty.
pub(crate) fn idle() {
    std::thread::sleep(Duration::from_micros(50));
}

/// Reads every key in `read_set ∪ write_set` into the transaction's read
/// buffer. Runs before the body in all single-version protocols.
pub(crate) fn execute_reads(storage: &SingleVersionStorage, txn: &mut Transaction) {
    let keys: Vec<Key> = txn.read_set().union(txn.write_set()).copied().collect();
    for key in keys {
        if let Some(value) = storage.read(key) {
            txn.record_read(key, value);
        }
    }
}

/// Full worker-side execution for the 2PL and OCC-serial paths: snapshot,
/// read, run the body, hand back to the scheduler.
pub(crate) fn worker_execute(shared: &Shared, mut txn: Box<Transaction>) {
    let storage = shared.store.single();
    txn.snapshot_start(storage.clock(), shared.history.len());
    execute_reads(storage, &mut txn);
    txn.run_body();
    shared.completed.push(txn);
}

/// Writes the transaction's buffered writes out to single-version storage.
pub(crate) fn apply_writes(storage: &SingleVersionStorage, txn: &Transaction) {
    for (&key, &value) in txn.writes() {
        storage.write(key, value, txn.id());
    }
}

/// Maps a completed transaction's status to its commit decision. Any other
/// status here is a programming error in an engine and kills the process:
/// a panic would only unwind the one worker thread it happens on, leaving
/// the scheduler running against corrupted state.
pub(crate) fn completed_verdict(txn: &Transaction) -> bool {
    match txn.status() {
        TxnStatus::CompletedCommit => true,
        TxnStatus::CompletedAbort => false,
        other => {
            error!(
                id = txn.id(),
                status = ?other,
                "completed transaction has invalid status"
            );
            eprintln!(
                "completed transaction {} has invalid status {:?}",
                txn.id(),
                other
            );
            std::process::abort();
        }
    }
}
