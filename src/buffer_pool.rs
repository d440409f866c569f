use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, RwLock,
    },
};

use log::debug;

use crate::{
    catalog::Catalog,
    error::{DbError, Kind},
    storage::{
        page::HeapPage,
        page_id::HeapPageID,
        tuple::{Tuple, WrappedTuple},
    },
    transaction::{LockManager, Permission, Transaction},
    types::{DbResult, Pod, ResultPod},
    utils::HandyRwLock,
};

pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default page capacity of the buffer pool.
pub const DEFAULT_PAGES: usize = 50;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

struct PoolState {
    buffer: HashMap<HeapPageID, Pod<HeapPage>>,

    // least recently used page at the front
    lru: VecDeque<HeapPageID>,
}

impl PoolState {
    fn touch(&mut self, pid: &HeapPageID) {
        self.lru.retain(|p| p != pid);
        self.lru.push_back(*pid);
    }

    fn remove(&mut self, pid: &HeapPageID) {
        self.buffer.remove(pid);
        self.lru.retain(|p| p != pid);
    }

    /// Drop the least recently used clean page. A clean page needs no
    /// flush, it is simply forgotten. Dirty pages are pinned until their
    /// transaction completes (NO-STEAL).
    fn evict_page(&mut self) -> DbResult {
        let clean = self
            .lru
            .iter()
            .find(|pid| self.buffer[*pid].rl().dirtied_by().is_none())
            .copied();

        match clean {
            Some(pid) => {
                debug!("evicting page {:?}", pid);
                self.remove(&pid);
                Ok(())
            }
            None => Err(DbError::storage("buffer pool full of dirty pages")),
        }
    }
}

/// Bounded cache of heap pages.
///
/// Every page access goes through the lock manager first, so a caller
/// never observes page state without holding a lock of the requested
/// strength. Pages dirtied by a transaction are written back at commit
/// and dropped at abort; locks are released only after that.
pub struct BufferPool {
    state: Mutex<PoolState>,

    capacity: usize,

    lock_manager: Arc<LockManager>,

    catalog: Arc<Catalog>,
}

impl BufferPool {
    pub fn new(capacity: usize, catalog: Arc<Catalog>, lock_manager: Arc<LockManager>) -> Self {
        Self {
            state: Mutex::new(PoolState {
                buffer: HashMap::new(),
                lru: VecDeque::new(),
            }),
            capacity,
            lock_manager,
            catalog,
        }
    }

    /// Change the process-wide page size. Only meaningful before any page
    /// I/O has happened; tests use it to force small pages.
    pub fn set_page_size(page_size: usize) {
        PAGE_SIZE.store(page_size, Ordering::Relaxed);
    }

    pub fn get_page_size() -> usize {
        PAGE_SIZE.load(Ordering::Relaxed)
    }

    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    /// The count of pages currently cached.
    pub fn cached_count(&self) -> usize {
        self.state.lock().unwrap().buffer.len()
    }

    /// Retrieve the specified page with the associated permissions. Will
    /// acquire a lock and may block if that lock is held by another
    /// transaction.
    ///
    /// The retrieved page is looked up in the cache; on a miss the page is
    /// read from its store, evicting the least recently used clean page
    /// when the cache is at capacity.
    pub fn get_page(
        &self,
        tx: &Transaction,
        perm: Permission,
        pid: &HeapPageID,
    ) -> ResultPod<HeapPage> {
        self.lock_manager
            .acquire(tx, &perm.to_lock(), pid)
            .map_err(|e| {
                if e.kind() == Kind::Deadlock {
                    DbError::aborted(&format!("{} must abort: {}", tx, e))
                } else {
                    e
                }
            })?;

        let mut state = self.state.lock().unwrap();
        if let Some(page_rc) = state.buffer.get(pid).cloned() {
            state.touch(pid);
            return Ok(page_rc);
        }

        debug!("page {:?} not cached, loading it from disk", pid);
        let table = self.catalog.get_table(pid.table_id)?;
        let page = table.read_page(pid)?;

        if state.buffer.len() >= self.capacity {
            state.evict_page()?;
        }

        let page_rc = Arc::new(RwLock::new(page));
        state.buffer.insert(*pid, page_rc.clone());
        state.lru.push_back(*pid);
        Ok(page_rc)
    }

    /// Add the tuple to the specified table on behalf of `tx`, acquiring a
    /// write lock on every page the operation touches. The affected pages
    /// are marked dirty and kept in the cache so that future requests see
    /// up-to-date images.
    pub fn insert_tuple(&self, tx: &Transaction, table_id: u32, tuple: &Tuple) -> DbResult {
        let table = self.catalog.get_table(table_id)?;
        let dirtied = table.insert_tuple(tx, tuple, self)?;
        self.install_dirty_pages(tx, dirtied)
    }

    /// Remove the tuple from the page it lives on, on behalf of `tx`.
    pub fn delete_tuple(&self, tx: &Transaction, tuple: &WrappedTuple) -> DbResult {
        let table = self.catalog.get_table(tuple.get_pid().table_id)?;
        let dirtied = table.delete_tuple(tx, tuple, self)?;
        self.install_dirty_pages(tx, dirtied)
    }

    fn install_dirty_pages(&self, tx: &Transaction, pages: Vec<Pod<HeapPage>>) -> DbResult {
        let mut state = self.state.lock().unwrap();
        for page_rc in pages {
            let pid = {
                let mut page = page_rc.wl();
                page.set_dirty(Some(tx.clone()));
                page.get_pid()
            };

            // replace any stale image of the page
            state.buffer.insert(pid, page_rc);
            state.touch(&pid);
        }

        while state.buffer.len() > self.capacity {
            state.evict_page()?;
        }
        Ok(())
    }

    /// Commit or abort `tx`.
    ///
    /// Commit writes every page `tx` dirtied to its store and clears the
    /// dirty markers; abort drops those pages so the next read refetches
    /// the on-disk image. The transaction's locks are released only after
    /// the pages are dealt with.
    pub fn transaction_complete(&self, tx: &Transaction, commit: bool) -> DbResult {
        if commit {
            self.flush_pages(tx)?;
        } else {
            self.discard_pages(tx);
        }

        self.lock_manager.release_all(tx);
        Ok(())
    }

    /// Write every page dirtied by `tx` to its store and mark it clean.
    pub fn flush_pages(&self, tx: &Transaction) -> DbResult {
        let state = self.state.lock().unwrap();
        for page_rc in state.buffer.values() {
            let mut page = page_rc.wl();
            if page.dirtied_by() == Some(tx) {
                let table = self.catalog.get_table(page.get_pid().table_id)?;
                table.write_page(&page)?;
                page.set_dirty(None);
            }
        }
        Ok(())
    }

    fn discard_pages(&self, tx: &Transaction) {
        let mut state = self.state.lock().unwrap();
        let dirtied: Vec<HeapPageID> = state
            .buffer
            .iter()
            .filter(|(_, page_rc)| page_rc.rl().dirtied_by() == Some(tx))
            .map(|(pid, _)| *pid)
            .collect();

        for pid in dirtied {
            debug!("discarding page {:?} dirtied by {:?}", pid, tx);
            state.remove(&pid);
        }
    }

    /// Flush all dirty pages to disk.
    ///
    /// NB: writes uncommitted data when a transaction is still running,
    /// which breaks the NO-STEAL policy; test use only.
    pub fn flush_all_pages(&self) -> DbResult {
        let state = self.state.lock().unwrap();
        for page_rc in state.buffer.values() {
            let mut page = page_rc.wl();
            if page.dirtied_by().is_some() {
                let table = self.catalog.get_table(page.get_pid().table_id)?;
                table.write_page(&page)?;
                page.set_dirty(None);
            }
        }
        Ok(())
    }

    /// Remove the specific page id from the cache, keeping any lock on it
    /// intact. Needed to ensure the cache does not keep a rolled back page.
    pub fn discard_page(&self, pid: &HeapPageID) {
        self.state.lock().unwrap().remove(pid);
    }

    /// Release the lock `tx` holds on a single page before end of
    /// transaction. This breaks two-phase locking; callers must know no
    /// data on the page was read or written.
    pub fn release_page(&self, tx: &Transaction, pid: &HeapPageID) {
        self.lock_manager.release(tx, pid);
    }

    pub fn holds(&self, tx: &Transaction, pid: &HeapPageID) -> bool {
        self.lock_manager.holds(tx, pid)
    }
}
