use std::sync::Arc;

use heap_db::{
    storage::{page::HeapPage, schema::small_int_schema, tuple::Cell, tuple::Tuple},
    transaction::Transaction,
    utils, Database, HeapTable, PageStore,
};
use rand::Rng;

/// # Conduct the initialization
///
/// - Setting up log configurations.
pub fn setup() {
    utils::init_log();
}

/// Rows one page can hold for a table of `columns` Int64 columns.
pub fn rows_per_page(columns: usize) -> usize {
    HeapPage::calculate_slots_count(&small_int_schema(columns))
}

/// Create a heap table filled with `rows` random rows of `columns` Int64
/// columns, register it in the database catalog, and flush it to disk.
///
/// # Arguments:
///
/// - int_rows: This is a reference used to return all inserted data. Only
///   works when it's not None.
pub fn new_random_heap_table(
    file_path: &str,
    columns: usize,
    rows: usize,
    db: &Database,
    int_rows: Option<&mut Vec<Vec<i64>>>,
) -> Arc<HeapTable> {
    let schema = small_int_schema(columns);
    let table_rc = Arc::new(HeapTable::new(file_path, &schema).unwrap());
    db.add_table(table_rc.clone());

    let mut rng = rand::thread_rng();
    let mut tuples = Vec::new();
    for _ in 0..rows {
        let value = rng.gen_range(i64::MIN, i64::MAX);
        tuples.push(Tuple::new_int_tuple(value, columns));
    }

    if let Some(int_rows) = int_rows {
        for t in tuples.iter() {
            let mut row = Vec::new();
            for i in 0..columns {
                match t.get_cell(i) {
                    Cell::Int64(v) => row.push(v),
                    _ => panic!("unexpected cell type"),
                }
            }
            int_rows.push(row);
        }
    }

    let write_tx = Transaction::new();
    for t in tuples.iter() {
        db.buffer_pool()
            .insert_tuple(&write_tx, table_rc.get_id(), t)
            .unwrap();
    }
    write_tx.commit(db).unwrap();

    table_rc
}
