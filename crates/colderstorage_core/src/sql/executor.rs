//! Statement execution against the catalog and the row namespace.

use super::ast::{CompareOp, Expr, Projection, Statement};
use super::error::SqlError;
use super::parser::parse;
use crate::batch::WriteBatch;
use crate::catalog::{encode_next_table_id, Catalog, TableMeta};
use crate::cursor::{ResultCursor, RowSource};
use crate::error::{CoreError, CoreResult};
use crate::iterator::{BoundedIterator, KvIterator};
use crate::keyspace::{catalog_key, row_bounds, row_key, NEXT_TABLE_ID_KEY};
use crate::lsm::LsmStore;
use crate::tracker::{ResourceKind, ResourceTracker};
use colderstorage_codec::{decode_row, encode_row, Column, Row, Schema, Type, Value};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Parses and runs one statement.
///
/// Mutations are committed as a single write batch before the result cursor
/// is returned; a failed statement writes nothing and leaves `catalog`
/// unchanged.
pub(crate) fn execute(
    store: &LsmStore,
    catalog: &mut Catalog,
    tracker: &Arc<ResourceTracker>,
    sql: &str,
) -> CoreResult<ResultCursor> {
    let statement = parse(sql)?;
    let output = match statement {
        Statement::CreateTable {
            name,
            columns,
            if_not_exists,
        } => create_table(store, catalog, name, columns, if_not_exists)?,
        Statement::DropTable { name, if_exists } => drop_table(store, catalog, &name, if_exists)?,
        Statement::Insert {
            table,
            columns,
            rows,
        } => insert(store, catalog, &table, columns, rows)?,
        Statement::Select {
            table,
            projection,
            filter,
            limit,
        } => select(store, catalog, &table, &projection, filter.as_ref(), limit)?,
        Statement::Update {
            table,
            assignments,
            filter,
        } => update(store, catalog, &table, assignments, filter.as_ref())?,
        Statement::Delete { table, filter } => delete(store, catalog, &table, filter.as_ref())?,
    };

    let guard = tracker.acquire(ResourceKind::ResultCursor);
    Ok(match output {
        Output::Empty => ResultCursor::materialized(Schema::empty(), Vec::new(), guard),
        Output::Affected(n) => ResultCursor::materialized(
            Schema::from_pairs([("rows_affected", Type::Integer)]),
            vec![vec![Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))]],
            guard,
        ),
        Output::Rows(schema, source) => ResultCursor::new(schema, source, guard),
    })
}

enum Output {
    Empty,
    Affected(u64),
    Rows(Schema, Box<dyn RowSource>),
}

fn lookup<'a>(catalog: &'a Catalog, table: &str) -> CoreResult<&'a TableMeta> {
    catalog
        .get(table)
        .ok_or_else(|| SqlError::TableNotFound(table.to_string()).into())
}

fn column_index(meta: &TableMeta, column: &str) -> CoreResult<usize> {
    meta.schema.index_of(column).ok_or_else(|| {
        SqlError::ColumnNotFound {
            table: meta.name.clone(),
            column: column.to_string(),
        }
        .into()
    })
}

fn create_table(
    store: &LsmStore,
    catalog: &mut Catalog,
    name: String,
    columns: Vec<Column>,
    if_not_exists: bool,
) -> CoreResult<Output> {
    if catalog.contains(&name) {
        if if_not_exists {
            return Ok(Output::Empty);
        }
        return Err(SqlError::TableExists(name).into());
    }
    let mut seen = HashSet::new();
    for column in &columns {
        if !seen.insert(column.name.to_lowercase()) {
            return Err(SqlError::DuplicateColumn(column.name.clone()).into());
        }
    }

    let meta = TableMeta {
        id: catalog.peek_table_id()?,
        name,
        next_row_id: 0,
        schema: Schema::new(columns),
    };
    let mut batch = WriteBatch::new();
    batch.put(meta.key(), meta.encode()?);
    batch.put(NEXT_TABLE_ID_KEY.to_vec(), encode_next_table_id(meta.id));
    store.write(&batch)?;

    debug!(table = %meta.name, id = meta.id, "table created");
    catalog.insert(meta);
    Ok(Output::Empty)
}

fn drop_table(
    store: &LsmStore,
    catalog: &mut Catalog,
    name: &str,
    if_exists: bool,
) -> CoreResult<Output> {
    let Some(meta) = catalog.get(name) else {
        if if_exists {
            return Ok(Output::Empty);
        }
        return Err(SqlError::TableNotFound(name.to_string()).into());
    };

    let mut batch = WriteBatch::new();
    for (key, _) in stored_rows(store, meta)? {
        batch.delete(key);
    }
    batch.delete(catalog_key(name));
    store.write(&batch)?;

    debug!(table = %name, rows = batch.len() - 1, "table dropped");
    catalog.remove(name);
    Ok(Output::Empty)
}

fn insert(
    store: &LsmStore,
    catalog: &mut Catalog,
    table: &str,
    columns: Option<Vec<String>>,
    rows: Vec<Vec<Value>>,
) -> CoreResult<Output> {
    let mut meta = lookup(catalog, table)?.clone();
    let targets: Vec<usize> = match &columns {
        Some(names) => {
            let mut seen = HashSet::new();
            let mut targets = Vec::with_capacity(names.len());
            for name in names {
                let index = column_index(&meta, name)?;
                if !seen.insert(index) {
                    return Err(SqlError::DuplicateColumn(name.clone()).into());
                }
                targets.push(index);
            }
            targets
        }
        None => (0..meta.schema.len()).collect(),
    };

    let mut batch = WriteBatch::new();
    let count = rows.len() as u64;
    for values in rows {
        if values.len() != targets.len() {
            return Err(SqlError::ArityMismatch {
                expected: targets.len(),
                found: values.len(),
            }
            .into());
        }
        let mut row = vec![Value::Null; meta.schema.len()];
        for (&index, value) in targets.iter().zip(values) {
            row[index] = coerce(&meta.schema.columns()[index], value)?;
        }
        let row_id = meta.next_row_id;
        meta.next_row_id = row_id
            .checked_add(1)
            .ok_or_else(|| CoreError::invalid_argument("row id space exhausted"))?;
        batch.put(row_key(meta.id, row_id), encode_row(&row)?);
    }
    batch.put(meta.key(), meta.encode()?);
    store.write(&batch)?;

    debug!(table = %meta.name, rows = count, "rows inserted");
    catalog.update(meta);
    Ok(Output::Affected(count))
}

fn select(
    store: &LsmStore,
    catalog: &Catalog,
    table: &str,
    projection: &Projection,
    filter: Option<&Expr>,
    limit: Option<u64>,
) -> CoreResult<Output> {
    let meta = lookup(catalog, table)?;
    let indices: Vec<usize> = match projection {
        Projection::All => (0..meta.schema.len()).collect(),
        Projection::Columns(names) => names
            .iter()
            .map(|name| column_index(meta, name))
            .collect::<CoreResult<_>>()?,
    };
    let filter = filter.map(|expr| Predicate::bind(expr, meta)).transpose()?;
    let schema = Schema::new(
        indices
            .iter()
            .map(|&i| meta.schema.columns()[i].clone())
            .collect(),
    );

    let (lower, upper) = row_bounds(meta.id);
    let source = TableScan {
        rows: store.scan(&lower, &upper)?,
        width: meta.schema.len(),
        filter,
        indices,
        remaining: limit,
    };
    Ok(Output::Rows(schema, Box::new(source)))
}

fn update(
    store: &LsmStore,
    catalog: &Catalog,
    table: &str,
    assignments: Vec<(String, Value)>,
    filter: Option<&Expr>,
) -> CoreResult<Output> {
    let meta = lookup(catalog, table)?;
    let mut seen = HashSet::new();
    let mut bound = Vec::with_capacity(assignments.len());
    for (name, value) in assignments {
        let index = column_index(meta, &name)?;
        if !seen.insert(index) {
            return Err(SqlError::DuplicateColumn(name).into());
        }
        bound.push((index, coerce(&meta.schema.columns()[index], value)?));
    }
    let filter = filter.map(|expr| Predicate::bind(expr, meta)).transpose()?;

    let mut batch = WriteBatch::new();
    for (key, mut row) in stored_rows(store, meta)? {
        if filter.as_ref().map_or(true, |p| p.matches(&row)) {
            for (index, value) in &bound {
                row[*index] = value.clone();
            }
            batch.put(key, encode_row(&row)?);
        }
    }
    store.write(&batch)?;

    debug!(table = %meta.name, rows = batch.len(), "rows updated");
    Ok(Output::Affected(batch.len() as u64))
}

fn delete(
    store: &LsmStore,
    catalog: &Catalog,
    table: &str,
    filter: Option<&Expr>,
) -> CoreResult<Output> {
    let meta = lookup(catalog, table)?;
    let filter = filter.map(|expr| Predicate::bind(expr, meta)).transpose()?;

    let mut batch = WriteBatch::new();
    for (key, row) in stored_rows(store, meta)? {
        if filter.as_ref().map_or(true, |p| p.matches(&row)) {
            batch.delete(key);
        }
    }
    store.write(&batch)?;

    debug!(table = %meta.name, rows = batch.len(), "rows deleted");
    Ok(Output::Affected(batch.len() as u64))
}

/// Every row of a table with its engine key.
fn stored_rows(store: &LsmStore, meta: &TableMeta) -> CoreResult<Vec<(Vec<u8>, Row)>> {
    let (lower, upper) = row_bounds(meta.id);
    let mut it = store.scan(&lower, &upper)?;
    let mut rows = Vec::new();
    while it.is_valid() {
        let row = decode_stored_row(it.value().unwrap_or_default(), meta.schema.len())?;
        rows.push((it.key().to_vec(), row));
        it.next()?;
    }
    Ok(rows)
}

fn decode_stored_row(bytes: &[u8], width: usize) -> CoreResult<Row> {
    let row = decode_row(bytes)?;
    if row.len() != width {
        return Err(CoreError::invalid_format(format!(
            "stored row has {} values, table has {width} columns",
            row.len()
        )));
    }
    Ok(row)
}

/// Fits a literal to a column: null always fits, integers widen to real.
fn coerce(column: &Column, value: Value) -> CoreResult<Value> {
    match (column.ty, value) {
        (_, Value::Null) => Ok(Value::Null),
        (Type::Real, Value::Integer(n)) => Ok(Value::Real(n as f64)),
        (ty, value) if value.value_type() == ty => Ok(value),
        (ty, value) => Err(SqlError::type_mismatch(format!(
            "column {} is {ty}, got {}",
            column.name,
            value.value_type()
        ))
        .into()),
    }
}

/// Streams the rows of a `SELECT` from a storage snapshot.
struct TableScan {
    rows: BoundedIterator,
    width: usize,
    filter: Option<Predicate>,
    indices: Vec<usize>,
    remaining: Option<u64>,
}

impl RowSource for TableScan {
    fn next_row(&mut self) -> CoreResult<Option<Row>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }
        while self.rows.is_valid() {
            let row = decode_stored_row(self.rows.value().unwrap_or_default(), self.width)?;
            self.rows.next()?;
            if self.filter.as_ref().map_or(true, |p| p.matches(&row)) {
                if let Some(n) = self.remaining.as_mut() {
                    *n -= 1;
                }
                return Ok(Some(self.indices.iter().map(|&i| row[i].clone()).collect()));
            }
        }
        Ok(None)
    }
}

/// A `WHERE` clause with columns resolved to positions.
#[derive(Debug)]
enum Predicate {
    Compare {
        index: usize,
        op: CompareOp,
        value: Value,
    },
    IsNull {
        index: usize,
        negated: bool,
    },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Resolves columns and rejects comparisons that can never be made.
    fn bind(expr: &Expr, meta: &TableMeta) -> CoreResult<Self> {
        Ok(match expr {
            Expr::Compare { column, op, value } => {
                let index = column_index(meta, column)?;
                let ty = meta.schema.columns()[index].ty;
                if !comparable(ty, value.value_type()) {
                    return Err(SqlError::type_mismatch(format!(
                        "cannot compare {ty} column {column} with {}",
                        value.value_type()
                    ))
                    .into());
                }
                Self::Compare {
                    index,
                    op: *op,
                    value: value.clone(),
                }
            }
            Expr::IsNull { column, negated } => Self::IsNull {
                index: column_index(meta, column)?,
                negated: *negated,
            },
            Expr::And(a, b) => Self::And(Box::new(Self::bind(a, meta)?), Box::new(Self::bind(b, meta)?)),
            Expr::Or(a, b) => Self::Or(Box::new(Self::bind(a, meta)?), Box::new(Self::bind(b, meta)?)),
            Expr::Not(inner) => Self::Not(Box::new(Self::bind(inner, meta)?)),
        })
    }

    fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Compare { index, op, value } => match compare(&row[*index], value) {
                Some(ordering) => match op {
                    CompareOp::Eq => ordering == Ordering::Equal,
                    CompareOp::Ne => ordering != Ordering::Equal,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Ge => ordering != Ordering::Less,
                },
                None => false,
            },
            Self::IsNull { index, negated } => row[*index].is_null() != *negated,
            Self::And(a, b) => a.matches(row) && b.matches(row),
            Self::Or(a, b) => a.matches(row) || b.matches(row),
            Self::Not(inner) => !inner.matches(row),
        }
    }
}

fn comparable(column: Type, literal: Type) -> bool {
    let numeric = |t| matches!(t, Type::Integer | Type::Real);
    column == Type::Null
        || literal == Type::Null
        || column == literal
        || (numeric(column) && numeric(literal))
}

/// Orders two values; `None` when either is null or a real is NaN.
fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Integer(a), Value::Real(b)) => (*a as f64).partial_cmp(b),
        (Value::Real(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Real(a), Value::Real(b)) => a.partial_cmp(b),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Blob(a), Value::Blob(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::stats::DatabaseStats;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _temp: TempDir,
        store: LsmStore,
        catalog: Catalog,
        tracker: Arc<ResourceTracker>,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = tempdir().unwrap();
            let store = LsmStore::open(temp.path(), Config::default(), Arc::new(DatabaseStats::new())).unwrap();
            Self {
                _temp: temp,
                store,
                catalog: Catalog::default(),
                tracker: ResourceTracker::new(),
            }
        }

        fn run(&mut self, sql: &str) -> CoreResult<Vec<Row>> {
            execute(&self.store, &mut self.catalog, &self.tracker, sql)?.commit()
        }

        fn sql_error(&mut self, sql: &str) -> SqlError {
            match self.run(sql) {
                Err(CoreError::Sql(e)) => e,
                other => panic!("{sql}: expected a statement error, got {other:?}"),
            }
        }
    }

    fn affected(n: i64) -> Vec<Row> {
        vec![vec![Value::Integer(n)]]
    }

    #[test]
    fn create_insert_select() {
        let mut f = Fixture::new();
        assert!(f.run("CREATE TABLE people (name TEXT, age INTEGER, height REAL)").unwrap().is_empty());
        assert_eq!(
            f.run("INSERT INTO people VALUES ('ann', 31, 1.7), ('bob', NULL, 2)").unwrap(),
            affected(2)
        );
        assert_eq!(
            f.run("SELECT name, height FROM people").unwrap(),
            vec![
                vec![Value::Text("ann".into()), Value::Real(1.7)],
                vec![Value::Text("bob".into()), Value::Real(2.0)],
            ]
        );
        assert_eq!(
            f.run("select * from PEOPLE where age >= 30").unwrap(),
            vec![vec![Value::Text("ann".into()), Value::Integer(31), Value::Real(1.7)]]
        );
    }

    #[test]
    fn filters_limits_and_nulls() {
        let mut f = Fixture::new();
        f.run("CREATE TABLE t (n INTEGER, s TEXT)").unwrap();
        f.run("INSERT INTO t (n) VALUES (1), (2), (3), (4)").unwrap();
        f.run("INSERT INTO t (s, n) VALUES ('x', 5)").unwrap();

        assert_eq!(f.run("SELECT n FROM t WHERE s IS NULL LIMIT 2").unwrap(), vec![
            vec![Value::Integer(1)],
            vec![Value::Integer(2)]
        ]);
        assert_eq!(f.run("SELECT n FROM t WHERE s IS NOT NULL").unwrap(), vec![vec![Value::Integer(5)]]);
        // Comparisons against null never hold.
        assert!(f.run("SELECT n FROM t WHERE s = 'x' AND s != 'x'").unwrap().is_empty());
        assert_eq!(f.run("SELECT n FROM t WHERE s <> 'y'").unwrap().len(), 1);
        assert_eq!(
            f.run("SELECT n FROM t WHERE n < 2 OR (n > 3 AND NOT n = 5)").unwrap(),
            vec![vec![Value::Integer(1)], vec![Value::Integer(4)]]
        );
        assert_eq!(f.run("SELECT n FROM t WHERE n > 2.5").unwrap().len(), 3);
        assert!(f.run("SELECT * FROM t LIMIT 0").unwrap().is_empty());
    }

    #[test]
    fn update_and_delete() {
        let mut f = Fixture::new();
        f.run("CREATE TABLE kv (k TEXT, v INTEGER)").unwrap();
        f.run("INSERT INTO kv VALUES ('a', 1), ('b', 2), ('c', 3)").unwrap();

        assert_eq!(f.run("UPDATE kv SET v = 20 WHERE k = 'b'").unwrap(), affected(1));
        assert_eq!(f.run("DELETE FROM kv WHERE v < 3").unwrap(), affected(1));
        assert_eq!(
            f.run("SELECT * FROM kv").unwrap(),
            vec![
                vec![Value::Text("b".into()), Value::Integer(20)],
                vec![Value::Text("c".into()), Value::Integer(3)],
            ]
        );
        assert_eq!(f.run("DELETE FROM kv").unwrap(), affected(2));
        assert_eq!(f.run("UPDATE kv SET v = 1").unwrap(), affected(0));
    }

    #[test]
    fn drop_removes_rows_and_entry() {
        let mut f = Fixture::new();
        f.run("CREATE TABLE gone (x INTEGER)").unwrap();
        f.run("INSERT INTO gone VALUES (1), (2)").unwrap();
        f.run("DROP TABLE gone").unwrap();
        assert!(!f.catalog.contains("gone"));
        assert_eq!(f.sql_error("SELECT * FROM gone"), SqlError::TableNotFound("gone".into()));
        assert!(f.run("DROP TABLE IF EXISTS gone").unwrap().is_empty());

        f.run("CREATE TABLE gone (x INTEGER)").unwrap();
        assert!(f.run("SELECT * FROM gone").unwrap().is_empty());
        assert_eq!(f.catalog.get("gone").map(|m| m.id), Some(1));
    }

    #[test]
    fn statement_errors_have_no_effect() {
        let mut f = Fixture::new();
        f.run("CREATE TABLE t (n INTEGER, r REAL)").unwrap();

        assert_eq!(f.sql_error("CREATE TABLE T (x TEXT)"), SqlError::TableExists("T".into()));
        assert!(f.run("CREATE TABLE IF NOT EXISTS t (x TEXT)").unwrap().is_empty());
        assert!(matches!(f.sql_error("CREATE TABLE d (a INTEGER, A TEXT)"), SqlError::DuplicateColumn(_)));
        assert!(matches!(f.sql_error("SELECT missing FROM t"), SqlError::ColumnNotFound { .. }));
        assert!(matches!(f.sql_error("INSERT INTO t VALUES ('text', 1.0)"), SqlError::TypeMismatch(_)));
        assert_eq!(
            f.sql_error("INSERT INTO t VALUES (1)"),
            SqlError::ArityMismatch { expected: 2, found: 1 }
        );
        assert!(matches!(f.sql_error("INSERT INTO t VALUES (1, 1.0), (2)"), SqlError::ArityMismatch { .. }));
        assert!(matches!(f.sql_error("SELECT * FROM t WHERE n = 'one'"), SqlError::TypeMismatch(_)));
        assert!(matches!(f.sql_error("UPDATE t SET n = 1, n = 2"), SqlError::DuplicateColumn(_)));
        assert!(matches!(f.sql_error("SELEKT 1"), SqlError::Parse(_)));

        assert!(f.run("SELECT * FROM t").unwrap().is_empty());
        assert!(!f.catalog.contains("d"));
    }

    #[test]
    fn failed_log_append_writes_nothing() {
        use std::sync::atomic::Ordering;

        let mut f = Fixture::new();
        f.run("CREATE TABLE t (s TEXT)").unwrap();
        f.run("INSERT INTO t VALUES ('kept')").unwrap();
        let fail = f.store.use_flaky_wal();

        fail.store(true, Ordering::SeqCst);
        assert!(matches!(f.run("INSERT INTO t VALUES ('lost')"), Err(CoreError::Storage(_))));
        assert!(matches!(f.run("CREATE TABLE u (n INTEGER)"), Err(CoreError::Storage(_))));
        assert!(matches!(f.run("DELETE FROM t"), Err(CoreError::Storage(_))));
        assert!(!f.catalog.contains("u"));
        assert_eq!(f.catalog.get("t").map(|m| m.next_row_id), Some(1));

        fail.store(false, Ordering::SeqCst);
        f.run("INSERT INTO t VALUES ('next')").unwrap();
        assert_eq!(
            f.run("SELECT * FROM t").unwrap(),
            vec![vec![Value::Text("kept".into())], vec![Value::Text("next".into())]]
        );
        f.run("CREATE TABLE u (n INTEGER)").unwrap();
        assert_eq!(f.catalog.get("u").map(|m| m.id), Some(1));
    }

    #[test]
    fn select_is_a_snapshot() {
        let mut f = Fixture::new();
        f.run("CREATE TABLE t (n INTEGER)").unwrap();
        f.run("INSERT INTO t VALUES (1), (2)").unwrap();
        let mut cursor = execute(&f.store, &mut f.catalog, &f.tracker, "SELECT * FROM t").unwrap();
        f.run("INSERT INTO t VALUES (3)").unwrap();
        assert_eq!(cursor.commit().unwrap().len(), 2);
        assert!(!f.tracker.detect_leaks());
    }

    #[test]
    fn nan_never_matches() {
        let mut f = Fixture::new();
        f.run("CREATE TABLE r (x REAL)").unwrap();
        f.run("INSERT INTO r VALUES (1.0)").unwrap();
        let t = TableMeta {
            id: 0,
            name: "r".into(),
            next_row_id: 0,
            schema: Schema::from_pairs([("x", Type::Real)]),
        };
        let p = Predicate::bind(
            &Expr::Compare {
                column: "x".into(),
                op: CompareOp::Ne,
                value: Value::Real(f64::NAN),
            },
            &t,
        )
        .unwrap();
        assert!(!p.matches(&vec![Value::Real(1.0)]));
        assert!(!p.matches(&vec![Value::Real(f64::NAN)]));
    }
}
