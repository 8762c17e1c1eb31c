//! Statement and catalog commands.

use super::open;
use crate::Format;
use colderstorage_core::{Row, Schema, Value};
use serde_json::{Map, Number};
use std::fmt::Write as _;
use std::path::Path;

type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Runs the sql command.
pub fn run(path: &Path, statement: &str, format: Format) -> CmdResult {
    let mut db = open(path, true)?;
    let cursor = db.execute(statement)?;
    let schema = cursor.schema().clone();
    let rows = cursor.commit()?;
    db.close()?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&to_json(&schema, &rows))?),
        Format::Text => print!("{}", to_text(&schema, &rows)),
    }
    Ok(())
}

/// Runs the tables command.
pub fn tables(path: &Path) -> CmdResult {
    let mut db = open(path, false)?;
    for name in db.list_tables() {
        println!("{name}");
    }
    db.close()?;
    Ok(())
}

/// Runs the describe command.
pub fn describe(path: &Path, table: &str) -> CmdResult {
    let mut db = open(path, false)?;
    let schema = db.display_table(table);
    db.close()?;

    let schema = schema.ok_or_else(|| format!("Table not found: {table}"))?;
    for column in schema.columns() {
        println!("{}\t{}", column.name, column.ty);
    }
    Ok(())
}

/// Renders rows as a tab-separated table with a header line.
///
/// Statements without columns render as nothing.
fn to_text(schema: &Schema, rows: &[Row]) -> String {
    let mut out = String::new();
    if schema.is_empty() {
        return out;
    }
    let header: Vec<&str> = schema.names().collect();
    out.push_str(&header.join("\t"));
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = row.iter().map(text_cell).collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
    out
}

fn text_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => hex(b, "X'", "'"),
    }
}

/// Renders rows as an array of objects keyed by column name.
fn to_json(schema: &Schema, rows: &[Row]) -> serde_json::Value {
    let objects = rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for (name, value) in schema.names().zip(row) {
                object.insert(name.to_string(), json_cell(value));
            }
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::Value::Array(objects)
}

fn json_cell(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => (*i).into(),
        // JSON has no NaN or infinities.
        Value::Real(r) => Number::from_f64(*r)
            .map_or_else(|| serde_json::Value::String(r.to_string()), serde_json::Value::Number),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Blob(b) => serde_json::Value::String(hex(b, "", "")),
    }
}

fn hex(bytes: &[u8], prefix: &str, suffix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + bytes.len() * 2 + suffix.len());
    out.push_str(prefix);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out.push_str(suffix);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use colderstorage_core::Type;
    use serde_json::json;

    fn sample() -> (Schema, Vec<Row>) {
        let schema = Schema::from_pairs([("id", Type::Integer), ("data", Type::Blob), ("score", Type::Real)]);
        let rows = vec![
            vec![Value::Integer(1), Value::Blob(vec![0xab, 0x01]), Value::Real(0.5)],
            vec![Value::Integer(2), Value::Null, Value::Real(f64::NAN)],
        ];
        (schema, rows)
    }

    #[test]
    fn text_output() {
        let (schema, rows) = sample();
        assert_eq!(
            to_text(&schema, &rows),
            "id\tdata\tscore\n1\tX'ab01'\t0.5\n2\tNULL\tNaN\n"
        );
        assert_eq!(to_text(&Schema::empty(), &[]), "");
    }

    #[test]
    fn json_output() {
        let (schema, rows) = sample();
        assert_eq!(
            to_json(&schema, &rows),
            json!([
                {"id": 1, "data": "ab01", "score": 0.5},
                {"id": 2, "data": null, "score": "NaN"},
            ])
        );
    }

    #[test]
    fn statements_against_a_directory() {
        let temp = tempfile::tempdir().unwrap();
        run(temp.path(), "CREATE TABLE t (n INTEGER)", Format::Text).unwrap();
        run(temp.path(), "INSERT INTO t VALUES (1)", Format::Json).unwrap();
        tables(temp.path()).unwrap();
        describe(temp.path(), "t").unwrap();
        assert!(describe(temp.path(), "missing").is_err());
        assert!(run(temp.path(), "SELECT * FROM missing", Format::Text).is_err());
    }
}
