use heap_db::{
    buffer_pool::BufferPool,
    error::Kind,
    storage::{page_id::HeapPageID, tuple::Tuple},
    transaction::{Permission, Transaction},
    utils::HandyRwLock,
    Database, PageStore,
};

mod test_utils;
use test_utils::{new_random_heap_table, rows_per_page, setup};

#[test]
fn test_cache_is_bounded() {
    setup();
    BufferPool::set_page_size(1024);

    let setup_db = Database::new();
    let rows = 4 * rows_per_page(2);
    let table = new_random_heap_table("./bp_bounded.db", 2, rows, &setup_db, None);

    // a fresh pool with room for 2 of the table's 4 pages
    let db = Database::with_capacity(2);
    db.add_table(table.clone());

    let tx = Transaction::new();
    assert_eq!(table.tuples_count(&tx, db.buffer_pool()).unwrap(), rows);
    assert!(db.buffer_pool().cached_count() <= 2);
    tx.commit(&db).unwrap();
}

#[test]
fn test_no_steal_eviction() {
    setup();
    BufferPool::set_page_size(1024);

    let setup_db = Database::new();
    let rows = 3 * rows_per_page(2);
    let table = new_random_heap_table("./bp_no_steal.db", 2, rows, &setup_db, None);

    let db = Database::with_capacity(2);
    db.add_table(table.clone());

    let tx = Transaction::new();

    // dirty two pages by deleting one tuple from each
    for page_index in 0..2 {
        let pid = HeapPageID::new(table.get_id(), page_index);
        let page_rc = db
            .buffer_pool()
            .get_page(&tx, Permission::ReadWrite, &pid)
            .unwrap();
        let victim = { page_rc.rl().tuples()[0].clone() };
        db.buffer_pool().delete_tuple(&tx, &victim).unwrap();
    }

    // both cached pages carry uncommitted data, the pool must refuse to
    // evict either of them
    let pid = HeapPageID::new(table.get_id(), 2);
    let err = db
        .buffer_pool()
        .get_page(&tx, Permission::ReadOnly, &pid)
        .unwrap_err();
    assert_eq!(err.kind(), Kind::Storage);
    assert!(err.to_string().contains("full of dirty pages"));

    tx.abort(&db).unwrap();
}

#[test]
fn test_commit_writes_dirty_pages() {
    setup();
    BufferPool::set_page_size(1024);

    let db = Database::new();
    let table = new_random_heap_table("./bp_commit.db", 2, 2, &db, None);
    let pid = HeapPageID::new(table.get_id(), 0);

    let tx = Transaction::new();
    db.buffer_pool()
        .insert_tuple(&tx, table.get_id(), &Tuple::new_int_tuple(42, 2))
        .unwrap();

    // the mutation must not hit the disk before the commit
    assert_eq!(table.read_page(&pid).unwrap().tuples_count(), 2);

    tx.commit(&db).unwrap();
    assert_eq!(table.read_page(&pid).unwrap().tuples_count(), 3);

    // the cached image is clean again
    let tx_2 = Transaction::new();
    let page_rc = db
        .buffer_pool()
        .get_page(&tx_2, Permission::ReadOnly, &pid)
        .unwrap();
    assert!(page_rc.rl().dirtied_by().is_none());
    tx_2.commit(&db).unwrap();
}

#[test]
fn test_abort_discards_dirty_pages() {
    setup();
    BufferPool::set_page_size(1024);

    let db = Database::new();
    let table = new_random_heap_table("./bp_abort.db", 2, 2, &db, None);
    let pid = HeapPageID::new(table.get_id(), 0);

    let tx = Transaction::new();
    db.buffer_pool()
        .insert_tuple(&tx, table.get_id(), &Tuple::new_int_tuple(7, 2))
        .unwrap();
    tx.abort(&db).unwrap();

    // locks are gone and nothing in the cache belongs to the transaction
    assert!(!db.buffer_pool().holds(&tx, &pid));
    assert!(db.lock_manager().holding_pages(&tx).is_empty());

    // the next reader sees the pre-mutation image
    let tx_2 = Transaction::new();
    assert_eq!(table.tuples_count(&tx_2, db.buffer_pool()).unwrap(), 2);
    tx_2.commit(&db).unwrap();
}

#[test]
fn test_insert_then_delete_leaves_table_unchanged() {
    setup();
    BufferPool::set_page_size(1024);

    let db = Database::new();
    let table = new_random_heap_table("./bp_insert_delete.db", 2, 5, &db, None);

    let tx = Transaction::new();
    let marker = Tuple::new_int_tuple(99, 2);
    db.buffer_pool()
        .insert_tuple(&tx, table.get_id(), &marker)
        .unwrap();

    let inserted = table
        .tuples(&tx, db.buffer_pool())
        .unwrap()
        .into_iter()
        .find(|t| t.get_cells() == marker.get_cells())
        .unwrap();
    db.buffer_pool().delete_tuple(&tx, &inserted).unwrap();
    tx.commit(&db).unwrap();

    let tx_2 = Transaction::new();
    assert_eq!(table.tuples_count(&tx_2, db.buffer_pool()).unwrap(), 5);
    tx_2.commit(&db).unwrap();
}

#[test]
fn test_flush_all_pages() {
    setup();
    BufferPool::set_page_size(1024);

    let db = Database::new();
    let table = new_random_heap_table("./bp_flush_all.db", 2, 2, &db, None);
    let pid = HeapPageID::new(table.get_id(), 0);

    let tx = Transaction::new();
    db.buffer_pool()
        .insert_tuple(&tx, table.get_id(), &Tuple::new_int_tuple(5, 2))
        .unwrap();

    db.buffer_pool().flush_all_pages().unwrap();
    assert_eq!(table.read_page(&pid).unwrap().tuples_count(), 3);

    tx.commit(&db).unwrap();
}

#[test]
fn test_discard_page_keeps_lock() {
    setup();
    BufferPool::set_page_size(1024);

    let db = Database::new();
    let table = new_random_heap_table("./bp_discard.db", 2, 2, &db, None);
    let pid = HeapPageID::new(table.get_id(), 0);

    let tx = Transaction::new();
    db.buffer_pool()
        .get_page(&tx, Permission::ReadOnly, &pid)
        .unwrap();
    assert_eq!(db.buffer_pool().cached_count(), 1);

    db.buffer_pool().discard_page(&pid);
    assert_eq!(db.buffer_pool().cached_count(), 0);
    assert!(db.buffer_pool().holds(&tx, &pid));

    db.buffer_pool().release_page(&tx, &pid);
    assert!(!db.buffer_pool().holds(&tx, &pid));
}

#[test]
fn test_missing_table_is_reported() {
    setup();
    BufferPool::set_page_size(1024);

    let db = Database::new();
    let tx = Transaction::new();
    let pid = HeapPageID::new(424242, 0);
    let err = db
        .buffer_pool()
        .get_page(&tx, Permission::ReadOnly, &pid)
        .unwrap_err();
    assert_eq!(err.kind(), Kind::Storage);
}

#[test]
fn test_read_past_end_of_table_is_reported() {
    setup();
    BufferPool::set_page_size(1024);

    let db = Database::new();
    let table = new_random_heap_table("./bp_out_of_range.db", 2, 2, &db, None);

    let tx = Transaction::new();
    let pid = HeapPageID::new(table.get_id(), 99);
    let err = db
        .buffer_pool()
        .get_page(&tx, Permission::ReadOnly, &pid)
        .unwrap_err();
    assert_eq!(err.kind(), Kind::Io);

    // the lock survives the failed read, the caller decides what to do
    assert!(db.buffer_pool().holds(&tx, &pid));
    tx.abort(&db).unwrap();
}
