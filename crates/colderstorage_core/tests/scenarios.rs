//! End-to-end tests through the public `Database` API.

use colderstorage_core::{
    Config, CoreError, Cursor, Database, ErrorKind, ResourceKind, SqlError, Type, Value,
};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tempfile::tempdir;

fn small_config() -> Config {
    Config::new()
        .block_size(128)
        .target_sst_size(512)
        .num_memtable_limit(1)
        .compaction_trigger(4)
}

fn scan_all(db: &Database, lower: &[u8], upper: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    db.scan(lower, upper)
        .unwrap()
        .map(Result::unwrap)
        .collect()
}

fn keys(entries: &[(Vec<u8>, Vec<u8>)]) -> Vec<&[u8]> {
    entries.iter().map(|(k, _)| k.as_slice()).collect()
}

#[test]
fn inclusive_range_scan() {
    let temp = tempdir().unwrap();
    let db = Database::open(temp.path()).unwrap();
    for (key, value) in [
        ("apple", "red"),
        ("banana", "yellow"),
        ("cherry", "dark red"),
        ("date", "brown"),
        ("elderberry", "purple"),
    ] {
        db.put(key.as_bytes(), value.as_bytes()).unwrap();
    }

    let entries = scan_all(&db, b"banana", b"date");
    assert_eq!(
        entries,
        vec![
            (b"banana".to_vec(), b"yellow".to_vec()),
            (b"cherry".to_vec(), b"dark red".to_vec()),
            (b"date".to_vec(), b"brown".to_vec()),
        ]
    );

    // Bounds that are not keys themselves.
    let entries = scan_all(&db, b"b", b"d");
    assert_eq!(keys(&entries), vec![&b"banana"[..], &b"cherry"[..]]);

    assert!(scan_all(&db, b"date", b"banana").is_empty());
    assert!(!db.detect_leaks());
}

#[test]
fn put_get_delete_get() {
    let temp = tempdir().unwrap();
    let db = Database::open(temp.path()).unwrap();

    db.put(b"key", b"value").unwrap();
    assert_eq!(db.get(b"key").unwrap(), Some(b"value".to_vec()));
    db.delete(b"key").unwrap();
    assert_eq!(db.get(b"key").unwrap(), None);

    // Deleting again, or deleting what never existed, is fine.
    db.delete(b"key").unwrap();
    db.delete(b"never").unwrap();
    assert_eq!(db.get(b"never").unwrap(), None);
}

#[test]
fn select_from_missing_table_fails_cleanly() {
    let temp = tempdir().unwrap();
    let mut db = Database::open(temp.path()).unwrap();

    let err = db.execute("SELECT * FROM missing_table").unwrap_err();
    assert!(matches!(
        err,
        CoreError::Sql(SqlError::TableNotFound(ref name)) if name == "missing_table"
    ));
    assert_eq!(err.kind(), ErrorKind::Statement);
    assert!(!err.to_string().is_empty());

    let payload = colderstorage_codec::encode_error(err.kind(), &err.to_string());
    let decoded = colderstorage_codec::decode_error(&payload).unwrap();
    assert_eq!(decoded.kind, ErrorKind::Statement);
    assert!(!decoded.message.is_empty());

    assert!(db.active_cursor().is_none());
    assert_eq!(db.fetch().unwrap(), None);
    assert!(!db.detect_leaks());
}

#[test]
fn data_survives_reopen() {
    let temp = tempdir().unwrap();
    {
        let mut db = Database::open_with_config(temp.path(), small_config()).unwrap();
        for i in 0..200u32 {
            db.put(format!("k{i:04}").as_bytes(), &i.to_le_bytes()).unwrap();
        }
        db.delete(b"k0007").unwrap();
        db.execute("CREATE TABLE t (id INTEGER, name TEXT)").unwrap();
        db.execute("INSERT INTO t VALUES (1, 'one'), (2, 'two')").unwrap();
        db.close().unwrap();
    }

    let mut db = Database::open_with_config(temp.path(), small_config()).unwrap();
    assert_eq!(db.get(b"k0199").unwrap(), Some(199u32.to_le_bytes().to_vec()));
    assert_eq!(db.get(b"k0007").unwrap(), None);
    assert_eq!(scan_all(&db, b"k", b"l").len(), 199);

    assert_eq!(db.list_tables(), vec!["t".to_string()]);
    let rows = db.execute("SELECT name FROM t WHERE id = 2").unwrap().commit().unwrap();
    assert_eq!(rows, vec![vec![Value::Text("two".into())]]);

    // Row ids keep counting after reopen.
    db.execute("INSERT INTO t VALUES (3, 'three')").unwrap();
    let rows = db.execute("SELECT id FROM t").unwrap().commit().unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Integer(1)],
            vec![Value::Integer(2)],
            vec![Value::Integer(3)],
        ]
    );
}

#[test]
fn unsynced_writes_survive_drop_through_the_wal() {
    let temp = tempdir().unwrap();
    {
        let db = Database::open(temp.path()).unwrap();
        db.put(b"a", b"1").unwrap();
        // Dropped without an explicit close.
    }
    let db = Database::open(temp.path()).unwrap();
    assert_eq!(db.get(b"a").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn second_open_of_same_path_is_locked() {
    let temp = tempdir().unwrap();
    let mut first = Database::open(temp.path()).unwrap();
    let err = Database::open(temp.path()).unwrap_err();
    assert!(matches!(err, CoreError::DatabaseLocked));
    assert_eq!(err.kind(), ErrorKind::Locked);

    first.close().unwrap();
    let second = Database::open(temp.path()).unwrap();
    assert!(second.is_open());
}

#[test]
fn scan_cursor_exhausts_and_closes() {
    let temp = tempdir().unwrap();
    let db = Database::open(temp.path()).unwrap();
    db.put(b"only", b"one").unwrap();

    let mut cursor = db.scan(b"a", b"z").unwrap();
    assert!(cursor.is_valid());
    assert_eq!(cursor.key(), Some(&b"only"[..]));
    cursor.next().unwrap();
    assert!(!cursor.is_valid());
    assert_eq!(cursor.key(), None);
    cursor.next().unwrap();
    assert!(!cursor.is_valid());

    assert_eq!(db.tracker().outstanding(ResourceKind::ScanCursor), 1);
    cursor.close();
    assert_eq!(db.tracker().outstanding(ResourceKind::ScanCursor), 0);
}

#[test]
fn cursor_sees_data_as_of_creation() {
    let temp = tempdir().unwrap();
    let db = Database::open(temp.path()).unwrap();
    db.put(b"a", b"1").unwrap();
    db.put(b"c", b"3").unwrap();

    let cursor = db.scan(b"a", b"z").unwrap();
    db.put(b"b", b"2").unwrap();
    db.delete(b"c").unwrap();

    let entries: Vec<_> = cursor.map(Result::unwrap).collect();
    assert_eq!(keys(&entries), vec![&b"a"[..], &b"c"[..]]);
}

#[test]
fn leaked_cursor_is_reported_at_close() {
    let temp = tempdir().unwrap();
    let mut db = Database::open(temp.path()).unwrap();
    db.put(b"k", b"v").unwrap();

    let leaked = db.scan(b"a", b"z").unwrap();
    assert!(db.detect_leaks());
    db.close().unwrap();
    drop(leaked);

    // The leak stays visible after the cursor is gone.
    assert!(db.detect_leaks());
}

#[test]
fn closed_cursors_leave_no_leaks() {
    let temp = tempdir().unwrap();
    let mut db = Database::open(temp.path()).unwrap();
    db.execute("CREATE TABLE t (n INTEGER)").unwrap();
    db.execute("INSERT INTO t VALUES (1)").unwrap();
    db.execute("SELECT * FROM t").unwrap();
    db.scan(b"", b"z").unwrap().close();

    // The active statement cursor is closed by the database itself.
    db.close().unwrap();
    assert!(!db.detect_leaks());
}

#[test]
fn last_statement_wins() {
    let temp = tempdir().unwrap();
    let mut db = Database::open(temp.path()).unwrap();
    db.execute("CREATE TABLE t (n INTEGER, s TEXT)").unwrap();
    db.execute("INSERT INTO t VALUES (1, 'a'), (2, 'b'), (3, 'c')").unwrap();

    db.execute("SELECT n FROM t").unwrap();
    assert_eq!(db.fetch().unwrap(), Some(vec![Value::Integer(1)]));

    db.execute("SELECT s FROM t WHERE n > 1").unwrap();
    assert_eq!(
        db.cursor_schema().map(|s| s.column(0).map(|c| c.ty)),
        Some(Some(Type::Text))
    );
    assert_eq!(db.fetch().unwrap(), Some(vec![Value::Text("b".into())]));
    assert_eq!(db.fetch().unwrap(), Some(vec![Value::Text("c".into())]));
    assert_eq!(db.fetch().unwrap(), None);
    assert_eq!(db.tracker().outstanding(ResourceKind::ResultCursor), 0);
}

#[test]
fn update_and_delete_rows() {
    let temp = tempdir().unwrap();
    let mut db = Database::open(temp.path()).unwrap();
    db.execute("CREATE TABLE items (id INTEGER, price REAL, note TEXT)").unwrap();
    db.execute("INSERT INTO items VALUES (1, 1.5, NULL), (2, 2.5, 'x'), (3, 3.5, NULL)")
        .unwrap();

    let affected = db
        .execute("UPDATE items SET price = 9 WHERE note IS NULL")
        .unwrap()
        .commit()
        .unwrap();
    assert_eq!(affected, vec![vec![Value::Integer(2)]]);

    let affected = db
        .execute("DELETE FROM items WHERE id = 2")
        .unwrap()
        .commit()
        .unwrap();
    assert_eq!(affected, vec![vec![Value::Integer(1)]]);

    let rows = db.execute("SELECT id, price FROM items").unwrap().commit().unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Integer(1), Value::Real(9.0)],
            vec![Value::Integer(3), Value::Real(9.0)],
        ]
    );
}

#[test]
fn drop_table_removes_rows_and_name() {
    let temp = tempdir().unwrap();
    let mut db = Database::open(temp.path()).unwrap();
    db.execute("CREATE TABLE t (n INTEGER)").unwrap();
    db.execute("INSERT INTO t VALUES (1)").unwrap();
    db.execute("DROP TABLE t").unwrap();
    assert!(db.list_tables().is_empty());
    assert!(db.display_table("t").is_none());

    // A new table of the same name starts empty.
    db.execute("CREATE TABLE t (n INTEGER)").unwrap();
    let rows = db.execute("SELECT * FROM t").unwrap().commit().unwrap();
    assert!(rows.is_empty());
}

#[test]
fn flushes_and_compaction_keep_latest_values() {
    let temp = tempdir().unwrap();
    let db = Database::open_with_config(temp.path(), small_config()).unwrap();
    for round in 0..4u8 {
        for i in 0..64u8 {
            db.put(&[b'k', i], &[round; 16]).unwrap();
        }
    }
    for i in (0..64u8).step_by(2) {
        db.delete(&[b'k', i]).unwrap();
    }
    assert!(db.stats().flushes > 0);

    db.compact().unwrap();
    let info = db.info();
    assert_eq!(info.store.frozen_memtables, 0);
    assert!(db.stats().compactions > 0);

    let entries = scan_all(&db, b"k", b"l");
    assert_eq!(entries.len(), 32);
    assert!(entries.iter().all(|(k, v)| k[1] % 2 == 1 && v == &vec![3u8; 16]));
}

#[test]
fn raw_keys_are_not_visible_to_tables() {
    let temp = tempdir().unwrap();
    let mut db = Database::open(temp.path()).unwrap();
    db.put(b"t", b"not a table").unwrap();
    assert!(db.list_tables().is_empty());
    assert!(db.execute("SELECT * FROM t").is_err());
}

#[test]
fn failed_freeze_does_not_lose_committed_rows() {
    let temp = tempdir().unwrap();
    let config = small_config().compaction_trigger(0);
    let mut db = Database::open_with_config(temp.path(), config.clone()).unwrap();
    db.execute("CREATE TABLE t (s TEXT)").unwrap();

    // Occupy the log path the next memtable would use.
    let next = db.info().store.memtable_id + 1;
    let blocker = temp.path().join(format!("{next:06}.wal"));
    std::fs::create_dir(&blocker).unwrap();

    let first = format!("first-{}", "x".repeat(5000));
    db.execute(&format!("INSERT INTO t VALUES ('{first}')")).unwrap();
    assert!(db.stats().errors >= 1);

    std::fs::remove_dir(&blocker).unwrap();
    db.execute("INSERT INTO t VALUES ('second')").unwrap();

    let expected = vec![vec![Value::Text(first)], vec![Value::Text("second".into())]];
    let rows = db.execute("SELECT * FROM t").unwrap().commit().unwrap();
    assert_eq!(rows, expected);
    db.close().unwrap();

    let mut db = Database::open_with_config(temp.path(), config).unwrap();
    let rows = db.execute("SELECT * FROM t").unwrap().commit().unwrap();
    assert_eq!(rows, expected);
}

fn open_small(path: &Path) -> Database {
    Database::open_with_config(path, small_config()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn scan_matches_a_sorted_map(
        ops in prop::collection::vec(
            (prop::collection::vec(any::<u8>(), 1..6), prop::option::of(prop::collection::vec(any::<u8>(), 0..24))),
            1..120,
        ),
        lower in prop::collection::vec(any::<u8>(), 0..4),
        upper in prop::collection::vec(any::<u8>(), 0..4),
    ) {
        let temp = tempdir().unwrap();
        let db = open_small(temp.path());
        let mut model = BTreeMap::new();
        for (key, value) in ops {
            match value {
                Some(value) => {
                    db.put(&key, &value).unwrap();
                    model.insert(key, value);
                }
                None => {
                    db.delete(&key).unwrap();
                    model.remove(&key);
                }
            }
        }

        let expected: Vec<_> = if lower <= upper {
            model
                .range(lower.clone()..=upper.clone())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        } else {
            Vec::new()
        };
        prop_assert_eq!(scan_all(&db, &lower, &upper), expected);

        for (key, value) in &model {
            prop_assert_eq!(db.get(key).unwrap(), Some(value.clone()));
        }
    }
}
