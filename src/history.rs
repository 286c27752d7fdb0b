use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::types::{Key, TxnId};

/// What validators need to know about a committed transaction: who it was and
/// which keys it wrote.
#[derive(Debug)]
pub(crate) struct CommittedTxn {
    pub id: TxnId,
    pub write_keys: BTreeSet<Key>,
}

/// Append-only commit history. Appends go through an RCU swap so validators
/// read point-in-time snapshots without taking a lock; the append order is the
/// canonical commit order.
pub(crate) struct CommittedHistory {
    inner: ArcSwap<Vec<Arc<CommittedTxn>>>,
}

impl CommittedHistory {
    pub fn new() -> Self {
        CommittedHistory {
            inner: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn push(&self, record: Arc<CommittedTxn>) {
        self.inner.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(record.clone());
            next
        });
    }

    /// A consistent snapshot; entries only ever grow from the front.
    pub fn snapshot(&self) -> Arc<Vec<Arc<CommittedTxn>>> {
        self.inner.load_full()
    }
}

/// A transaction currently inside parallel-OCC validation.
#[derive(Debug)]
pub(crate) struct ActiveTxn {
    pub id: TxnId,
    pub write_keys: BTreeSet<Key>,
}

/// The set of transactions validating right now. Snapshot-then-insert is the
/// one critical section the parallel OCC variants share.
pub(crate) struct ActiveSet {
    inner: Mutex<Vec<Arc<ActiveTxn>>>,
}

impl ActiveSet {
    pub fn new() -> Self {
        ActiveSet {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Returns the transactions that entered validation before `entry`, and
    /// registers `entry` as validating, atomically.
    pub fn snapshot_and_insert(&self, entry: Arc<ActiveTxn>) -> Vec<Arc<ActiveTxn>> {
        let mut guard = self.inner.lock().expect("Can't handle poisoned locks!");
        let finish = guard.clone();
        guard.push(entry);
        finish
    }

    pub fn remove(&self, id: TxnId) {
        let mut guard = self.inner.lock().expect("Can't handle poisoned locks!");
        guard.retain(|t| t.id != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: TxnId, keys: &[Key]) -> Arc<CommittedTxn> {
        Arc::new(CommittedTxn {
            id,
            write_keys: keys.iter().copied().collect(),
        })
    }

    #[test]
    fn history_append_preserves_order() {
        let history = CommittedHistory::new();
        assert_eq!(history.len(), 0);
        history.push(record(1, &[5]));
        history.push(record(2, &[6]));
        let snap = history.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].id, 1);
        assert_eq!(snap[1].id, 2);
    }

    #[test]
    fn snapshot_is_stable_across_later_pushes() {
        let history = CommittedHistory::new();
        history.push(record(1, &[]));
        let snap = history.snapshot();
        history.push(record(2, &[]));
        assert_eq!(snap.len(), 1);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn active_set_snapshot_excludes_self_and_later_entries() {
        let active = ActiveSet::new();
        let first = Arc::new(ActiveTxn {
            id: 1,
            write_keys: BTreeSet::from([9]),
        });
        let finish = active.snapshot_and_insert(first);
        assert!(finish.is_empty());

        let second = Arc::new(ActiveTxn {
            id: 2,
            write_keys: BTreeSet::new(),
        });
        let finish = active.snapshot_and_insert(second);
        assert_eq!(finish.len(), 1);
        assert_eq!(finish[0].id, 1);

        active.remove(1);
        let third = Arc::new(ActiveTxn {
            id: 3,
            write_keys: BTreeSet::new(),
        });
        let finish = active.snapshot_and_insert(third);
        assert_eq!(finish.len(), 1);
        assert_eq!(finish[0].id, 2);
    }
}
