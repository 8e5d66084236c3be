#![cfg(feature = "sqlite")]
use clipseq_core::StoreImpl;
use tempfile::tempdir;

#[test]
fn auto_migrate_applies_every_migration() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("mig.db");
    let store = StoreImpl::new_with(&db, true).expect("store");
    let status = store.migration_status().unwrap();
    assert_eq!(status.current, status.latest);
    assert!(status.pending.is_empty());

    let conn = rusqlite::Connection::open(&db).unwrap();
    let has_count: i64 = conn
        .query_row(
            "SELECT COUNT(1) FROM pragma_table_info('items') WHERE name='count'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(has_count, 1, "count column missing");
    let has_index: i64 = conn
        .query_row(
            "SELECT COUNT(1) FROM sqlite_master WHERE type='index' AND name='idx_items_kind_text'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(has_index, 1, "lookup index missing");
}

#[test]
fn manual_mode_applies_base_schema_then_migrate_all() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("manual.db");
    let store = StoreImpl::new_with(&db, false).expect("store");
    let status = store.migration_status().unwrap();
    assert_eq!(status.current, 1);
    assert!(status.pending.iter().any(|p| p.starts_with("0002")));

    store.migrate_all().unwrap();
    let status = store.migration_status().unwrap();
    assert_eq!(status.current, status.latest);
    assert!(status.pending.is_empty());
}
