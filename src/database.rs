use std::sync::Arc;

use crate::{
    buffer_pool::{BufferPool, DEFAULT_PAGES},
    catalog::Catalog,
    storage::table::PageStore,
    transaction::LockManager,
};

/// Everything a client needs to talk to the engine. Cheap to clone; all
/// components are shared behind `Arc`s, so clones can cross threads.
#[derive(Clone)]
pub struct Database {
    catalog: Arc<Catalog>,
    lock_manager: Arc<LockManager>,
    buffer_pool: Arc<BufferPool>,
}

impl Database {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PAGES)
    }

    /// A database whose buffer pool holds at most `capacity` pages.
    pub fn with_capacity(capacity: usize) -> Self {
        let catalog = Arc::new(Catalog::new());
        let lock_manager = Arc::new(LockManager::new());
        let buffer_pool = Arc::new(BufferPool::new(
            capacity,
            Arc::clone(&catalog),
            Arc::clone(&lock_manager),
        ));
        Self {
            catalog,
            lock_manager,
            buffer_pool,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    pub fn add_table(&self, table: Arc<dyn PageStore>) {
        self.catalog.add_table(table);
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
