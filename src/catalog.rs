use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use crate::{error::DbError, storage::table::PageStore, utils::HandyRwLock};

/// Registry of the page stores backing each table.
pub struct Catalog {
    tables: RwLock<HashMap<u32, Arc<dyn PageStore>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_table(&self, table: Arc<dyn PageStore>) {
        self.tables.wl().insert(table.get_id(), table);
    }

    pub fn get_table(&self, table_id: u32) -> Result<Arc<dyn PageStore>, DbError> {
        self.tables
            .rl()
            .get(&table_id)
            .cloned()
            .ok_or_else(|| DbError::storage(&format!("table {} not found", table_id)))
    }
}
