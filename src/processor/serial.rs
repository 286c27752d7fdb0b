use crate::transaction::TxnStatus;

use super::{apply_writes, completed_verdict, execute_reads, idle, Shared};

/// Serial execution: one transaction at a time, inline on the scheduler
/// thread. An abort is terminal here; there is nothing to retry against.
pub(crate) fn run(shared: &Shared) {
    while !shared.stopped() {
        let Some(mut txn) = shared.requests.pop() else {
            idle();
            continue;
        };
        let storage = shared.store.single();
        txn.snapshot_start(storage.clock(), shared.history.len());
        execute_reads(storage, &mut txn);
        txn.run_body();

        if completed_verdict(&txn) {
            apply_writes(storage, &txn);
            shared.record_commit(&txn);
            txn.set_status(TxnStatus::Committed);
        } else {
            txn.set_status(TxnStatus::Aborted);
        }
        shared.publish(txn);
    }
}
