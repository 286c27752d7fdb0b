use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crossbeam::channel::Sender;

use crate::lock_manager::LockManagerB;
use crate::storage::MultiVersionStorage;
use crate::transaction::{Transaction, TxnStatus};
use crate::types::Key;
use crate::worker_pool::Job;

use super::locking::{acquire_locks, release_locks};
use super::{completed_verdict, idle, Shared};

/// Reads the given keys from the version chains, taking and dropping each
/// per-key mutex in turn.
fn mv_reads(storage: &MultiVersionStorage, txn: &mut Transaction, keys: Vec<Key>) {
    for key in keys {
        let value = storage.lock(key).read(txn.id());
        if let Some(value) = value {
            txn.record_read(key, value);
        }
    }
}

/// MVCC timestamp ordering. The scheduler only feeds workers; each worker
/// runs the whole read/execute/check/write pipeline for one transaction.
pub(crate) fn run_mvto(shared: &Arc<Shared>, jobs: &Sender<Job>) {
    while !shared.stopped() {
        if let Some(txn) = shared.requests.pop() {
            let shared = Arc::clone(shared);
            jobs.send(Box::new(move || mvto_task(&shared, txn)))
                .expect("worker pool disconnected");
        } else {
            idle();
        }
    }
}

fn mvto_task(shared: &Shared, mut txn: Box<Transaction>) {
    let storage = shared.store.multi();
    // Timestamp ordering tracks readers through `max_read_ts`, so only the
    // declared read set goes through the read path.
    let keys: Vec<Key> = txn.read_set().iter().copied().collect();
    mv_reads(storage, &mut txn, keys);
    txn.run_body();

    if !completed_verdict(&txn) {
        txn.set_status(TxnStatus::Aborted);
        shared.publish(txn);
        return;
    }

    // Take every write-set mutex in ascending key order, then check all keys
    // before writing any. Ascending order keeps concurrent writers from
    // deadlocking on each other's partial lock sets.
    let mut guards: Vec<_> = txn
        .write_set()
        .iter()
        .map(|&key| (key, storage.lock(key)))
        .collect();
    let valid = guards
        .iter()
        .all(|(_, chain)| chain.check_write_ts(txn.id()));

    if valid {
        for (key, chain) in guards.iter_mut() {
            if let Some(&value) = txn.writes().get(key) {
                chain.write(value, txn.id());
            }
        }
        drop(guards);
        shared.record_commit(&txn);
        txn.set_status(TxnStatus::Committed);
        shared.publish(txn);
    } else {
        drop(guards);
        shared.readmit(txn);
    }
}

/// Strict 2PL over multi-version storage: admission and lock release follow
/// the 2PL scheduler, but workers install writes as new versions. Once a
/// transaction holds its locks nothing can abort it except its own body.
pub(crate) fn run_mv2pl(shared: &Arc<Shared>, jobs: &Sender<Job>) {
    let mut lm = LockManagerB::default();
    let mut waiting: HashMap<crate::types::TxnId, Box<Transaction>> = HashMap::new();
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

        // Workers decide the terminal status; the scheduler's job is the
        // shrinking phase and the result hand-off.
        while let Some(txn) = shared.completed.pop() {
            progress = true;
            release_locks(&mut lm, &txn, &mut waiting, &mut ready);
            shared.publish(txn);
        }

        while let Some(txn) = ready.pop_front() {
            progress = true;
            let shared = Arc::clone(shared);
            jobs.send(Box::new(move || mv2pl_task(&shared, txn)))
                .expect("worker pool disconnected");
        }

        if !progress {
            idle();
        }
    }
}

fn mv2pl_task(shared: &Shared, mut txn: Box<Transaction>) {
    let storage = shared.store.multi();
    // Locks are already held for both sets, so the executor reads everything
    // the body may consult, write-set keys included.
    let keys: Vec<Key> = txn.read_set().union(txn.write_set()).copied().collect();
    mv_reads(storage, &mut txn, keys);
    txn.run_body();

    if completed_verdict(&txn) {
        let mut guards: Vec<_> = txn
            .write_set()
            .iter()
            .map(|&key| (key, storage.lock(key)))
            .collect();
        debug_assert!(
            guards
                .iter()
                .all(|(_, chain)| chain.check_write_version(txn.id())),
            "exclusive locks should make write-version conflicts impossible"
        );
        for (key, chain) in guards.iter_mut() {
            if let Some(&value) = txn.writes().get(key) {
                chain.write(value, txn.id());
            }
        }
        drop(guards);
        shared.record_commit(&txn);
        txn.set_status(TxnStatus::Committed);
    } else {
        txn.set_status(TxnStatus::Aborted);
    }
    shared.completed.push(txn);
}
