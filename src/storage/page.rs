use bit_vec::BitVec;

use crate::{
    buffer_pool::BufferPool,
    error::DbError,
    storage::{
        page_id::HeapPageID,
        schema::Schema,
        tuple::{Tuple, WrappedTuple},
    },
    transaction::Transaction,
    types::DbResult,
};

/// In-memory image of one fixed-size on-disk heap page.
///
/// Layout: a slot-occupancy bitmap followed by `slot_count` fixed-size
/// tuple slots, zero-padded to the page size.
#[derive(Debug)]
pub struct HeapPage {
    pid: HeapPageID,

    schema: Schema,

    pub slot_count: usize,

    // indicate slots' status: true means occupied, false means empty
    header: BitVec<u32>,

    // all tuples (include empty slots)
    tuples: Vec<Tuple>,

    // the transaction that first dirtied this page since its last clean
    // state, if any
    dirty_by: Option<Transaction>,
}

impl HeapPage {
    pub fn new(pid: &HeapPageID, bytes: &[u8], schema: &Schema) -> Self {
        let slot_count = Self::calculate_slots_count(schema);
        let header_size = Self::calculate_header_size(slot_count);

        let mut tuples = Vec::new();
        for i in 0..slot_count {
            let start = header_size + i * schema.get_tuple_size();
            let end = start + schema.get_tuple_size();
            tuples.push(Tuple::from_bytes(&bytes[start..end], schema));
        }

        Self {
            pid: *pid,
            schema: schema.clone(),
            slot_count,
            header: BitVec::from_bytes(&bytes[..header_size]),
            tuples,
            dirty_by: None,
        }
    }

    /// Retrieve the maximum number of tuples this page can hold.
    pub fn calculate_slots_count(schema: &Schema) -> usize {
        let bits_per_tuple_including_header = schema.get_tuple_size() * 8 + 1;
        BufferPool::get_page_size() * 8 / bits_per_tuple_including_header
    }

    fn calculate_header_size(slot_count: usize) -> usize {
        (slot_count + 7) / 8
    }

    pub fn get_pid(&self) -> HeapPageID {
        self.pid
    }

    /// Serialize the page back to its on-disk image.
    pub fn get_page_data(&self) -> Vec<u8> {
        let mut data = self.header.to_bytes();
        for tuple in &self.tuples {
            data.append(&mut tuple.to_bytes());
        }
        data.resize(BufferPool::get_page_size(), 0);
        data
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        self.header.get(slot).unwrap_or(false)
    }

    pub fn empty_slots_count(&self) -> usize {
        (0..self.slot_count).filter(|i| !self.is_slot_used(*i)).count()
    }

    pub fn tuples_count(&self) -> usize {
        self.slot_count - self.empty_slots_count()
    }

    /// Put the tuple into the first empty slot, returning the slot number.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Result<usize, DbError> {
        for i in 0..self.slot_count {
            if !self.is_slot_used(i) {
                self.tuples[i] = tuple.clone();
                self.header.set(i, true);
                return Ok(i);
            }
        }
        Err(DbError::storage(&format!(
            "no empty slot on page {}",
            self.pid
        )))
    }

    pub fn delete_tuple(&mut self, slot: usize) -> DbResult {
        if slot >= self.slot_count || !self.is_slot_used(slot) {
            return Err(DbError::storage(&format!(
                "slot {} of page {} is not occupied",
                slot, self.pid
            )));
        }
        self.header.set(slot, false);
        Ok(())
    }

    /// Live tuples on this page, wrapped with their location.
    pub fn tuples(&self) -> Vec<WrappedTuple> {
        (0..self.slot_count)
            .filter(|i| self.is_slot_used(*i))
            .map(|i| WrappedTuple::new(self.tuples[i].clone(), i, self.pid))
            .collect()
    }

    pub fn set_dirty(&mut self, tx: Option<Transaction>) {
        self.dirty_by = tx;
    }

    pub fn dirtied_by(&self) -> Option<&Transaction> {
        self.dirty_by.as_ref()
    }

    pub fn get_schema(&self) -> &Schema {
        &self.schema
    }
}

pub fn empty_page_data() -> Vec<u8> {
    vec![0; BufferPool::get_page_size()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{schema::small_int_schema, tuple::Cell};

    #[test]
    fn test_slot_accounting() {
        let schema = small_int_schema(2);
        let pid = HeapPageID::new(1, 0);
        let mut page = HeapPage::new(&pid, &empty_page_data(), &schema);

        assert_eq!(page.empty_slots_count(), page.slot_count);

        let slot = page.insert_tuple(&Tuple::new_int_tuple(42, 2)).unwrap();
        assert_eq!(slot, 0);
        assert_eq!(page.tuples_count(), 1);

        page.delete_tuple(slot).unwrap();
        assert_eq!(page.tuples_count(), 0);
        assert!(page.delete_tuple(slot).is_err());
    }

    #[test]
    fn test_page_image_preserves_tuples() {
        let schema = small_int_schema(3);
        let pid = HeapPageID::new(1, 0);
        let mut page = HeapPage::new(&pid, &empty_page_data(), &schema);

        for v in 0..5 {
            page.insert_tuple(&Tuple::new_int_tuple(v, 3)).unwrap();
        }

        let data = page.get_page_data();
        assert_eq!(data.len(), BufferPool::get_page_size());

        let reread = HeapPage::new(&pid, &data, &schema);
        assert_eq!(reread.tuples_count(), 5);
        assert_eq!(reread.tuples()[2].get_cell(0), Cell::Int64(2));
    }
}
