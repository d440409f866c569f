use std::{
    collections::{HashMap, HashSet},
    sync::{Condvar, Mutex},
};

use log::debug;

use super::{wait_for_graph::WaitForGraph, Transaction};
use crate::{error::DbError, storage::page_id::HeapPageID, types::DbResult};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Lock {
    XLock,
    SLock,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn to_lock(&self) -> Lock {
        match self {
            Permission::ReadOnly => Lock::SLock,
            Permission::ReadWrite => Lock::XLock,
        }
    }
}

enum Grant {
    Acquired,
    // the transactions whose locks block the request
    Blocked(HashSet<Transaction>),
}

struct LockTable {
    s_holders: HashMap<HeapPageID, HashSet<Transaction>>,
    x_holders: HashMap<HeapPageID, Transaction>,

    hold_pages: HashMap<Transaction, HashSet<HeapPageID>>,

    wait_for: WaitForGraph,
}

impl LockTable {
    fn new() -> Self {
        Self {
            s_holders: HashMap::new(),
            x_holders: HashMap::new(),
            hold_pages: HashMap::new(),
            wait_for: WaitForGraph::new(),
        }
    }

    /// Try to grant the request without waiting.
    ///
    /// Grant rules:
    /// - A transaction holding X on the page is granted any request on it.
    /// - S is granted while no other transaction holds X.
    /// - X is granted while no other transaction holds any lock. A holder of
    ///   S asking for X (an upgrade) is granted iff it is the sole holder,
    ///   and is otherwise blocked on every other S-holder.
    fn try_grant(&mut self, tx: &Transaction, lock: &Lock, pid: &HeapPageID) -> Grant {
        if let Some(holder) = self.x_holders.get(pid) {
            if holder == tx {
                return Grant::Acquired;
            }
            let mut holders = HashSet::new();
            holders.insert(holder.clone());
            return Grant::Blocked(holders);
        }

        match lock {
            Lock::SLock => {
                self.s_holders
                    .entry(*pid)
                    .or_insert_with(HashSet::new)
                    .insert(tx.clone());
            }
            Lock::XLock => {
                let others: HashSet<Transaction> = self
                    .s_holders
                    .get(pid)
                    .map(|holders| holders.iter().filter(|t| *t != tx).cloned().collect())
                    .unwrap_or_default();
                if !others.is_empty() {
                    return Grant::Blocked(others);
                }

                self.s_holders.remove(pid);
                self.x_holders.insert(*pid, tx.clone());
            }
        }

        self.hold_pages
            .entry(tx.clone())
            .or_insert_with(HashSet::new)
            .insert(*pid);
        Grant::Acquired
    }

    fn remove_entries(&mut self, tx: &Transaction, pid: &HeapPageID) {
        if let Some(holders) = self.s_holders.get_mut(pid) {
            holders.remove(tx);
            if holders.is_empty() {
                self.s_holders.remove(pid);
            }
        }

        if self.x_holders.get(pid) == Some(tx) {
            self.x_holders.remove(pid);
        }
    }

    fn holds(&self, tx: &Transaction, pid: &HeapPageID) -> bool {
        if self.x_holders.get(pid) == Some(tx) {
            return true;
        }
        self.s_holders
            .get(pid)
            .map(|holders| holders.contains(tx))
            .unwrap_or(false)
    }
}

/// Page-level shared/exclusive lock table.
///
/// The lock table, the waits-for graph and the condition variable used for
/// blocking are protected by a single monitor lock. Every release wakes all
/// waiters, which re-validate their grant preconditions.
pub struct LockManager {
    table: Mutex<LockTable>,
    waiters: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(LockTable::new()),
            waiters: Condvar::new(),
        }
    }

    /// Block until `tx` holds a lock of at least `lock` strength on `pid`.
    ///
    /// When the request cannot be granted, an edge from `tx` to every
    /// blocking holder is added to the waits-for graph; a cycle through `tx`
    /// fails the request with a `Deadlock` error and leaves no residual
    /// edges. The caller must treat `Deadlock` as a mandatory abort of `tx`.
    pub fn acquire(&self, tx: &Transaction, lock: &Lock, pid: &HeapPageID) -> DbResult {
        let mut table = self.table.lock().unwrap();
        loop {
            let holders = match table.try_grant(tx, lock, pid) {
                Grant::Acquired => return Ok(()),
                Grant::Blocked(holders) => holders,
            };

            for holder in &holders {
                table.wait_for.add_edge(tx.get_id(), holder.get_id());
            }

            if table.wait_for.has_cycle_from(tx.get_id()) {
                table.wait_for.remove_waiter(tx.get_id());
                let err = DbError::deadlock(&format!(
                    "deadlock detected, args: {:?}, {:?}, {:?}",
                    tx, lock, pid
                ));
                err.show_backtrace();
                return Err(err);
            }

            debug!("{:?} waits for {:?} on {:?}", tx, holders, pid);
            table = self.waiters.wait(table).unwrap();
            table.wait_for.remove_waiter(tx.get_id());
        }
    }

    /// Release any lock `tx` holds on `pid` and wake all waiters. Releasing
    /// a lock the transaction does not hold is a no-op.
    pub fn release(&self, tx: &Transaction, pid: &HeapPageID) {
        let mut table = self.table.lock().unwrap();
        table.remove_entries(tx, pid);
        if let Some(pages) = table.hold_pages.get_mut(tx) {
            pages.remove(pid);
            if pages.is_empty() {
                table.hold_pages.remove(tx);
            }
        }
        self.waiters.notify_all();
    }

    /// Release every lock `tx` holds and wake all waiters.
    pub fn release_all(&self, tx: &Transaction) {
        let mut table = self.table.lock().unwrap();
        if let Some(pages) = table.hold_pages.remove(tx) {
            for pid in pages {
                table.remove_entries(tx, &pid);
            }
        }
        table.wait_for.remove_waiter(tx.get_id());
        self.waiters.notify_all();
    }

    pub fn holds(&self, tx: &Transaction, pid: &HeapPageID) -> bool {
        self.table.lock().unwrap().holds(tx, pid)
    }

    /// The pages `tx` currently holds a lock on.
    pub fn holding_pages(&self, tx: &Transaction) -> HashSet<HeapPageID> {
        self.table
            .lock()
            .unwrap()
            .hold_pages
            .get(tx)
            .cloned()
            .unwrap_or_default()
    }
}
