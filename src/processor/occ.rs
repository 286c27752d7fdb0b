use std::sync::Arc;

use crossbeam::channel::Sender;

use crate::history::{ActiveTxn, CommittedTxn};
use crate::storage::SingleVersionStorage;
use crate::transaction::{Transaction, TxnStatus};
use crate::worker_pool::Job;

use super::{apply_writes, completed_verdict, idle, worker_execute, Shared};

/// Which validation rule an OCC engine applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Validation {
    Forward,
    Backward,
}

/// Forward rule: every key the transaction touched must have been last
/// written at or before the clock snapshot taken when execution started.
pub(crate) fn forward_valid(storage: &SingleVersionStorage, txn: &Transaction) -> bool {
    txn.read_set()
        .union(txn.write_set())
        .all(|&key| txn.start_ts() >= storage.timestamp(key))
}

/// Backward rule: no transaction that committed after this one started may
/// have written a key this one read. The slice starting at `start_idx` is
/// exactly the set of commits that happened since the snapshot.
pub(crate) fn backward_valid(history: &[Arc<CommittedTxn>], txn: &Transaction) -> bool {
    let from = txn.start_idx().min(history.len());
    history[from..]
        .iter()
        .all(|rec| rec.write_keys.iter().all(|k| !txn.read_set().contains(k)))
}

/// Check against concurrently validating transactions: anything an earlier
/// validator writes could invalidate what we read or clobber what we are
/// about to write.
pub(crate) fn clear_of_validators(finish: &[Arc<ActiveTxn>], txn: &Transaction) -> bool {
    finish.iter().all(|other| {
        other
            .write_keys
            .iter()
            .all(|k| !txn.read_set().contains(k) && !txn.write_set().contains(k))
    })
}

/// OCC with serial validation: bodies run on workers, but validation and
/// commit happen one at a time on the scheduler thread.
pub(crate) fn run_serial(shared: &Arc<Shared>, jobs: &Sender<Job>, validation: Validation) {
    while !shared.stopped() {
        let mut progress = false;

        if let Some(txn) = shared.requests.pop() {
            progress = true;
            let shared = Arc::clone(shared);
            jobs.send(Box::new(move || worker_execute(&shared, txn)))
                .expect("worker pool disconnected");
        }

        while let Some(mut txn) = shared.completed.pop() {
            progress = true;
            if !completed_verdict(&txn) {
                txn.set_status(TxnStatus::Aborted);
                shared.publish(txn);
                continue;
            }
            let valid = match validation {
                Validation::Forward => forward_valid(shared.store.single(), &txn),
                Validation::Backward => backward_valid(&shared.history.snapshot(), &txn),
            };
            if valid {
                apply_writes(shared.store.single(), &txn);
                shared.record_commit(&txn);
                txn.set_status(TxnStatus::Committed);
                shared.publish(txn);
            } else {
                shared.readmit(txn);
            }
        }

        if !progress {
            idle();
        }
    }
}

/// OCC with parallel validation: the whole pipeline runs on workers and the
/// scheduler thread only feeds them.
pub(crate) fn run_parallel(shared: &Arc<Shared>, jobs: &Sender<Job>, validation: Validation) {
    while !shared.stopped() {
        if let Some(txn) = shared.requests.pop() {
            let shared = Arc::clone(shared);
            jobs.send(Box::new(move || parallel_task(&shared, txn, validation)))
                .expect("worker pool disconnected");
        } else {
            idle();
        }
    }
}

fn parallel_task(shared: &Shared, mut txn: Box<Transaction>, validation: Validation) {
    let storage = shared.store.single();
    txn.snapshot_start(storage.clock(), shared.history.len());
    super::execute_reads(storage, &mut txn);
    txn.run_body();

    if !completed_verdict(&txn) {
        txn.set_status(TxnStatus::Aborted);
        shared.publish(txn);
        return;
    }

    // Snapshotting the validators ahead of us and registering ourselves is
    // the one critical section of this protocol.
    let entry = Arc::new(ActiveTxn {
        id: txn.id(),
        write_keys: txn.write_set().iter().copied().collect(),
    });
    let entry_id = entry.id;
    let finish = shared.active.snapshot_and_insert(entry);

    let valid = match validation {
        Validation::Forward => forward_valid(storage, &txn),
        Validation::Backward => backward_valid(&shared.history.snapshot(), &txn),
    } && clear_of_validators(&finish, &txn);

    if valid {
        apply_writes(storage, &txn);
        shared.record_commit(&txn);
        txn.set_status(TxnStatus::Committed);
        shared.publish(txn);
    } else {
        shared.readmit(txn);
    }
    shared.active.remove(entry_id);
}
