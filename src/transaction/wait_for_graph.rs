use std::collections::{HashMap, HashSet};

use super::TransactionID;

/// Directed graph with an edge from each waiting transaction to every
/// transaction that holds a lock the waiter is blocked on. A cycle is a
/// deadlock.
pub(crate) struct WaitForGraph {
    // key: transaction id, value: the transactions that the key transaction is waiting for
    graph: HashMap<TransactionID, HashSet<TransactionID>>,
}

impl WaitForGraph {
    pub(crate) fn new() -> Self {
        Self {
            graph: HashMap::new(),
        }
    }

    pub(crate) fn add_edge(&mut self, from: TransactionID, to: TransactionID) {
        self.graph
            .entry(from)
            .or_insert_with(HashSet::new)
            .insert(to);
    }

    /// Drop every outgoing edge of `tid`. A transaction waits in at most one
    /// place at a time, so this removes exactly the edges it added.
    pub(crate) fn remove_waiter(&mut self, tid: TransactionID) {
        self.graph.remove(&tid);
    }

    /// Check whether `start` sits on a cycle, following outgoing edges only.
    pub(crate) fn has_cycle_from(&self, start: TransactionID) -> bool {
        let mut visited = HashSet::new();
        let mut path = HashSet::new();
        self.is_cyclic(start, &mut visited, &mut path)
    }

    fn is_cyclic(
        &self,
        tid: TransactionID,
        visited: &mut HashSet<TransactionID>,
        path: &mut HashSet<TransactionID>,
    ) -> bool {
        visited.insert(tid);
        path.insert(tid);

        if let Some(waiting_for) = self.graph.get(&tid) {
            for &next in waiting_for {
                if path.contains(&next) {
                    return true;
                }
                if !visited.contains(&next) && self.is_cyclic(next, visited, path) {
                    return true;
                }
            }
        }

        path.remove(&tid);
        false
    }
}
