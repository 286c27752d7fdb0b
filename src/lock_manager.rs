use std::collections::{HashMap, VecDeque};

use crate::types::{Key, TxnId};

/// Lock state of a key, as reported by [`LockTable::status`]. Requests are
/// only ever SHARED or EXCLUSIVE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Unlocked,
    Shared,
    Exclusive,
}

#[derive(Debug, Clone, Copy)]
struct LockRequest {
    mode: LockMode,
    txn: TxnId,
}

/// Interface shared by the two lock-manager variants.
///
/// `read_lock`/`write_lock` return true iff the lock is granted immediately;
/// otherwise the request is queued and the transaction's pending counter is
/// incremented. `release` removes the request and returns the transactions
/// whose pending counters reached zero, for the scheduler to move onto its
/// ready queue.
pub trait LockTable: Default {
    fn read_lock(&mut self, txn: TxnId, key: Key) -> bool;
    fn write_lock(&mut self, txn: TxnId, key: Key) -> bool;
    fn release(&mut self, txn: TxnId, key: Key) -> Vec<TxnId>;
    fn status(&self, key: Key) -> (LockMode, Vec<TxnId>);
    /// How many keys `txn` is still waiting on.
    fn pending(&self, txn: TxnId) -> usize;
}

#[derive(Default)]
struct TableState {
    lock_table: HashMap<Key, VecDeque<LockRequest>>,
    txn_waits: HashMap<TxnId, usize>,
}

impl TableState {
    /// Decrements `txn`'s pending counter, recording it in `ready` when the
    /// counter reaches zero.
    fn grant(&mut self, txn: TxnId, ready: &mut Vec<TxnId>) {
        let count = self
            .txn_waits
            .get_mut(&txn)
            .expect("waiting transaction has no pending counter");
        *count -= 1;
        if *count == 0 {
            self.txn_waits.remove(&txn);
            ready.push(txn);
        }
    }

    /// Removes `txn`'s first request on `key`, returning the removed mode and
    /// whether it sat at the head of the queue.
    fn remove(&mut self, txn: TxnId, key: Key) -> Option<(LockMode, bool)> {
        let queue = self.lock_table.get_mut(&key)?;
        let pos = queue.iter().position(|r| r.txn == txn)?;
        let request = queue.remove(pos).expect("position came from this queue");
        if queue.is_empty() {
            self.lock_table.remove(&key);
        }
        Some((request.mode, pos == 0))
    }
}

/// Variant A: every lock is exclusive. A request is granted iff it is alone
/// in the key's FIFO.
#[derive(Default)]
pub struct LockManagerA {
    state: TableState,
}

impl LockTable for LockManagerA {
    fn write_lock(&mut self, txn: TxnId, key: Key) -> bool {
        let queue = self.state.lock_table.entry(key).or_default();
        queue.push_back(LockRequest {
            mode: LockMode::Exclusive,
            txn,
        });
        if queue.len() == 1 {
            true
        } else {
            *self.state.txn_waits.entry(txn).or_insert(0) += 1;
            false
        }
    }

    fn read_lock(&mut self, txn: TxnId, key: Key) -> bool {
        // Exclusive-only: reads take the same lock as writes.
        self.write_lock(txn, key)
    }

    fn release(&mut self, txn: TxnId, key: Key) -> Vec<TxnId> {
        let mut ready = Vec::new();
        let Some((_, was_head)) = self.state.remove(txn, key) else {
            return ready;
        };
        if was_head {
            // The new head, if any, becomes the holder.
            let next = self
                .state
                .lock_table
                .get(&key)
                .and_then(|q| q.front())
                .map(|r| r.txn);
            if let Some(next) = next {
                self.state.grant(next, &mut ready);
            }
        }
        ready
    }

    fn status(&self, key: Key) -> (LockMode, Vec<TxnId>) {
        match self.state.lock_table.get(&key).and_then(|q| q.front()) {
            Some(head) => (LockMode::Exclusive, vec![head.txn]),
            None => (LockMode::Unlocked, Vec::new()),
        }
    }

    fn pending(&self, txn: TxnId) -> usize {
        self.state.txn_waits.get(&txn).copied().unwrap_or(0)
    }
}

/// Variant B: shared/exclusive locks. Shared requests are granted when no
/// exclusive request sits ahead of them; exclusive requests only when alone.
/// FIFO is strict, so a later shared request never passes a waiting
/// exclusive one.
#[derive(Default)]
pub struct LockManagerB {
    state: TableState,
}

impl LockTable for LockManagerB {
    fn write_lock(&mut self, txn: TxnId, key: Key) -> bool {
        let queue = self.state.lock_table.entry(key).or_default();
        queue.push_back(LockRequest {
            mode: LockMode::Exclusive,
            txn,
        });
        if queue.len() == 1 {
            true
        } else {
            *self.state.txn_waits.entry(txn).or_insert(0) += 1;
            false
        }
    }

    fn read_lock(&mut self, txn: TxnId, key: Key) -> bool {
        let queue = self.state.lock_table.entry(key).or_default();
        let blocked = queue.iter().any(|r| r.mode == LockMode::Exclusive);
        queue.push_back(LockRequest {
            mode: LockMode::Shared,
            txn,
        });
        if blocked {
            *self.state.txn_waits.entry(txn).or_insert(0) += 1;
            false
        } else {
            true
        }
    }

    fn release(&mut self, txn: TxnId, key: Key) -> Vec<TxnId> {
        let mut ready = Vec::new();
        let Some((mode, was_head)) = self.state.remove(txn, key) else {
            return ready;
        };
        if !was_head {
            // Still waiting, or a shared holder behind the head; either way
            // nothing new becomes grantable.
            return ready;
        }
        let grants: Vec<TxnId> = {
            let Some(queue) = self.state.lock_table.get(&key) else {
                return ready;
            };
            let head = *queue.front().expect("empty queues are removed");
            match mode {
                // Promote the maximal shared prefix, or the single exclusive
                // request now at the head.
                LockMode::Exclusive if head.mode == LockMode::Exclusive => vec![head.txn],
                LockMode::Exclusive => queue
                    .iter()
                    .take_while(|r| r.mode == LockMode::Shared)
                    .map(|r| r.txn)
                    .collect(),
                // The departing shared head frees a waiting exclusive only if
                // no shared holder remains in front of it.
                LockMode::Shared if head.mode == LockMode::Exclusive => vec![head.txn],
                LockMode::Shared => Vec::new(),
                LockMode::Unlocked => unreachable!("requests are never UNLOCKED"),
            }
        };
        for t in grants {
            self.state.grant(t, &mut ready);
        }
        ready
    }

    fn status(&self, key: Key) -> (LockMode, Vec<TxnId>) {
        let Some(queue) = self.state.lock_table.get(&key) else {
            return (LockMode::Unlocked, Vec::new());
        };
        match queue.front() {
            None => (LockMode::Unlocked, Vec::new()),
            Some(head) if head.mode == LockMode::Exclusive => {
                (LockMode::Exclusive, vec![head.txn])
            }
            Some(_) => {
                let owners = queue
                    .iter()
                    .take_while(|r| r.mode == LockMode::Shared)
                    .map(|r| r.txn)
                    .collect();
                (LockMode::Shared, owners)
            }
        }
    }

    fn pending(&self, txn: TxnId) -> usize {
        self.state.txn_waits.get(&txn).copied().unwrap_or(0)
    }
}
