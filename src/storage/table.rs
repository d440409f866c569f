use core::fmt;
use std::{
    collections::hash_map::DefaultHasher,
    fs::{File, OpenOptions},
    hash::{Hash, Hasher},
    io::{Read, Seek, SeekFrom, Write},
    sync::{Mutex, MutexGuard},
};

use log::debug;

use crate::{
    buffer_pool::BufferPool,
    error::DbError,
    storage::{
        page::HeapPage,
        page_id::HeapPageID,
        schema::Schema,
        tuple::{Tuple, WrappedTuple},
    },
    transaction::{Permission, Transaction},
    types::{DbResult, Pod},
    utils::HandyRwLock,
};

/// Backing store of pages for one table.
///
/// Implementations do the slot-level work; page access flows back through
/// the buffer pool they are handed, so locking and caching stay in one
/// place. The pages returned by `insert_tuple`/`delete_tuple` are the
/// authoritative set the pool marks dirty.
pub trait PageStore: Send + Sync {
    fn get_id(&self) -> u32;

    /// Read the page image from disk, bypassing any cache. Faults when the
    /// page is out of range.
    fn read_page(&self, pid: &HeapPageID) -> Result<HeapPage, DbError>;

    fn write_page(&self, page: &HeapPage) -> DbResult;

    /// The count of pages in the backing file.
    fn pages_count(&self) -> usize;

    fn insert_tuple(
        &self,
        tx: &Transaction,
        tuple: &Tuple,
        pool: &BufferPool,
    ) -> Result<Vec<Pod<HeapPage>>, DbError>;

    fn delete_tuple(
        &self,
        tx: &Transaction,
        tuple: &WrappedTuple,
        pool: &BufferPool,
    ) -> Result<Vec<Pod<HeapPage>>, DbError>;
}

/// Heap-organized table, pages stored one after another in a single file.
pub struct HeapTable {
    file_path: String,

    pub schema: Schema,

    file: Mutex<File>,

    table_id: u32,
}

impl fmt::Display for HeapTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<HeapTable, file: {}, id: {}>",
            self.file_path, self.table_id
        )
    }
}

impl HeapTable {
    pub fn new(file_path: &str, schema: &Schema) -> Result<Self, DbError> {
        File::create(file_path).map_err(|e| DbError::io("create table file", &e))?;

        let f = OpenOptions::new()
            .write(true)
            .read(true)
            .open(file_path)
            .map_err(|e| DbError::io("open table file", &e))?;

        let mut hasher = DefaultHasher::new();
        file_path.hash(&mut hasher);
        let table_id = hasher.finish() as u32;

        Ok(Self {
            file_path: file_path.to_string(),
            schema: schema.clone(),
            file: Mutex::new(f),
            table_id,
        })
    }

    fn get_file(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap()
    }

    /// Grow the file to hold `pages` pages. Growing is zero-filling and
    /// never shrinks, so concurrent appenders cannot clobber each other.
    fn extend_to(&self, pages: usize) -> DbResult {
        let file = self.get_file();
        let target = (pages * BufferPool::get_page_size()) as u64;
        let current = file.metadata().unwrap().len();
        if current < target {
            file.set_len(target)
                .map_err(|e| DbError::io("extend table file", &e))?;
        }
        Ok(())
    }

    /// All live tuples of the table, read under `ReadOnly` permission.
    pub fn tuples(
        &self,
        tx: &Transaction,
        pool: &BufferPool,
    ) -> Result<Vec<WrappedTuple>, DbError> {
        let mut result = Vec::new();
        for page_index in 0..self.pages_count() {
            let pid = HeapPageID::new(self.table_id, page_index as u32);
            let page_rc = pool.get_page(tx, Permission::ReadOnly, &pid)?;
            result.extend(page_rc.rl().tuples());
        }
        Ok(result)
    }

    pub fn tuples_count(&self, tx: &Transaction, pool: &BufferPool) -> Result<usize, DbError> {
        Ok(self.tuples(tx, pool)?.len())
    }
}

impl PageStore for HeapTable {
    fn get_id(&self) -> u32 {
        self.table_id
    }

    fn read_page(&self, pid: &HeapPageID) -> Result<HeapPage, DbError> {
        let page_size = BufferPool::get_page_size();
        let start_pos = pid.page_index as usize * page_size;

        let mut file = self.get_file();
        file.seek(SeekFrom::Start(start_pos as u64))
            .map_err(|e| DbError::io("seek", &e))?;

        let mut buf = vec![0; page_size];
        file.read_exact(&mut buf)
            .map_err(|e| DbError::io(&format!("read page {}", pid), &e))?;
        Ok(HeapPage::new(pid, &buf, &self.schema))
    }

    fn write_page(&self, page: &HeapPage) -> DbResult {
        let pid = page.get_pid();
        debug!("flushing page {:?}", pid);

        let page_size = BufferPool::get_page_size();
        let start_pos = pid.page_index as usize * page_size;

        let mut file = self.get_file();
        file.seek(SeekFrom::Start(start_pos as u64))
            .map_err(|e| DbError::io("seek", &e))?;
        file.write_all(&page.get_page_data())
            .map_err(|e| DbError::io(&format!("write page {}", pid), &e))?;
        file.flush().map_err(|e| DbError::io("flush", &e))?;
        Ok(())
    }

    fn pages_count(&self) -> usize {
        let file_size = self.get_file().metadata().unwrap().len() as usize;
        let page_size = BufferPool::get_page_size();
        (file_size + page_size - 1) / page_size
    }

    /// Add the tuple to the first page with room, under an X-lock on every
    /// page inspected. When the table is packed, a fresh page is appended
    /// at the end of the file.
    fn insert_tuple(
        &self,
        tx: &Transaction,
        tuple: &Tuple,
        pool: &BufferPool,
    ) -> Result<Vec<Pod<HeapPage>>, DbError> {
        for page_index in 0..self.pages_count() {
            let pid = HeapPageID::new(self.table_id, page_index as u32);
            let page_rc = pool.get_page(tx, Permission::ReadWrite, &pid)?;

            let has_room = page_rc.rl().empty_slots_count() > 0;
            if has_room {
                page_rc.wl().insert_tuple(tuple)?;
                return Ok(vec![page_rc]);
            }
        }

        let pid = HeapPageID::new(self.table_id, self.pages_count() as u32);
        debug!("table {} is packed, appending page {:?}", self.table_id, pid);
        self.extend_to(pid.page_index as usize + 1)?;

        let page_rc = pool.get_page(tx, Permission::ReadWrite, &pid)?;
        page_rc.wl().insert_tuple(tuple)?;
        Ok(vec![page_rc])
    }

    fn delete_tuple(
        &self,
        tx: &Transaction,
        tuple: &WrappedTuple,
        pool: &BufferPool,
    ) -> Result<Vec<Pod<HeapPage>>, DbError> {
        let pid = tuple.get_pid();
        let page_rc = pool.get_page(tx, Permission::ReadWrite, &pid)?;
        page_rc.wl().delete_tuple(tuple.get_slot_number())?;
        Ok(vec![page_rc])
    }
}
