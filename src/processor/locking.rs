use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crossbeam::channel::Sender;

use crate::lock_manager::LockTable;
use crate::transaction::{Transaction, TxnStatus};
use crate::types::TxnId;
use crate::worker_pool::Job;

use super::{apply_writes, completed_verdict, idle, worker_execute, Shared};

/// Requests every lock the transaction declared. Keys in both sets take only
/// the exclusive lock; queueing a shared request of our own in front of it
/// would block the transaction on itself.
///
/// Returns true iff every lock was granted immediately.
pub(crate) fn acquire_locks<L: LockTable>(lm: &mut L, txn: &Transaction) -> bool {
    let mut blocked = false;
    for &key in txn.read_set() {
        if txn.write_set().contains(&key) {
            continue;
        }
        if !lm.read_lock(txn.id(), key) {
            blocked = true;
        }
    }
    for &key in txn.write_set() {
        if !lm.write_lock(txn.id(), key) {
            blocked = true;
        }
    }
    !blocked
}

/// Releases every lock the transaction held, moving transactions whose last
/// pending lock this freed from the waiting table onto the ready queue.
pub(crate) fn release_locks<L: LockTable>(
    lm: &mut L,
    txn: &Transaction,
    waiting: &mut HashMap<TxnId, Box<Transaction>>,
    ready: &mut VecDeque<Box<Transaction>>,
) {
    let read_only_keys = txn
        .read_set()
        .iter()
        .filter(|k| !txn.write_set().contains(*k));
    let all_keys = read_only_keys.chain(txn.write_set().iter());
    for &key in all_keys {
        for freed in lm.release(txn.id(), key) {
            if let Some(t) = waiting.remove(&freed) {
                ready.push_back(t);
            }
        }
    }
}

/// Strict 2PL over single-version storage: growing phase at admission on the
/// scheduler thread, execution on a worker, shrinking phase after the commit
/// decision. Writes are applied before any lock is released, so readers only
/// ever observe committed state.
pub(crate) fn run<L: LockTable>(shared: &Arc<Shared>, jobs: &Sender<Job>) {
    let mut lm = L::default();
    let mut waiting: HashMap<TxnId, Box<Transaction>> = HashMap::new();
    let mut ready: VecDeque<Box<Transaction>> = VecDeque::new();

    while !shared.stopped() {
        let mut progress = false;

        if let Some(txn) = shared.requests.pop() {
            progress = true;
            if acquire_locks(&mut lm, &txn) {
                ready.push_back(txn);
            } else {
                waiting.insert(txn.id(), txn);
            }
        }

        while let Some(mut txn) = shared.completed.pop() {
            progress = true;
            if completed_verdict(&txn) {
                let storage = shared.store.single();
                apply_writes(storage, &txn);
                shared.record_commit(&txn);
                txn.set_status(TxnStatus::Committed);
            } else {
                txn.set_status(TxnStatus::Aborted);
            }
            release_locks(&mut lm, &txn, &mut waiting, &mut ready);
            shared.publish(txn);
        }

        while let Some(txn) = ready.pop_front() {
            progress = true;
            let shared = Arc::clone(shared);
            jobs.send(Box::new(move || worker_execute(&shared, txn)))
                .expect("worker pool disconnected");
        }

        if !progress {
            idle();
        }
    }
}
