//! Reading tables from JSON

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::{IndexMap, IndexSet};

use crate::model::{Record, Table, Value};

/// Read a table from a JSON file. See [`read_table`].
pub fn read_table_file<S: AsRef<str>>(path: &Path, columns: &[S]) -> Result<Table> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open JSON file: {}", path.display()))?;
    read_table(BufReader::new(file), columns)
}

/// Read a table from a JSON array of objects (a single object is accepted too).
///
/// With `columns` empty the key order is detected from the records, which
/// sorts it lexicographically. A column is read as dates only when every
/// non-null value in it is an ISO date or datetime string; otherwise its
/// strings are kept as they are.
pub fn read_table<R: Read, S: AsRef<str>>(reader: R, columns: &[S]) -> Result<Table> {
    let json: serde_json::Value =
        serde_json::from_reader(reader).context("Failed to parse JSON input")?;

    let items = match json {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(_) => vec![json],
        _ => bail!("JSON input must be an array or object"),
    };

    let mut records: Vec<Record> = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let Some(record) = Record::from_json(item) else {
            bail!("Item {} is not a JSON object", i);
        };
        records.push(record);
    }

    let temporal = temporal_columns(&records);
    if !temporal.is_empty() {
        for record in &mut records {
            *record = record
                .iter()
                .map(|(k, v)| match temporal.contains(k.as_str()) {
                    true => (k.clone(), detect_temporal(v)),
                    false => (k.clone(), v.clone()),
                })
                .collect();
        }
    }

    if columns.is_empty() {
        Ok(Table::detect(records))
    } else {
        Table::with_key_order(columns, records).context("Invalid column list")
    }
}

/// Parse a command-line literal: JSON scalars as themselves, anything else as a string
pub fn parse_literal(text: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json @ (serde_json::Value::Null
        | serde_json::Value::Bool(_)
        | serde_json::Value::Number(_)
        | serde_json::Value::String(_))) => detect_temporal(&Value::from(json)),
        _ => detect_temporal(&Value::String(text.to_string())),
    }
}

/// Columns whose non-null values are all date strings, or all datetime strings
fn temporal_columns(records: &[Record]) -> IndexSet<String> {
    let mut kinds: IndexMap<&str, Option<&'static str>> = IndexMap::new();
    for record in records {
        for (key, value) in record.iter().filter(|(_, v)| !v.is_null()) {
            let kind = match detect_temporal(value) {
                parsed @ (Value::Date(_) | Value::DateTime(_)) => Some(parsed.type_name()),
                _ => None,
            };
            let seen = kinds.entry(key.as_str()).or_insert(kind);
            if *seen != kind {
                *seen = None;
            }
        }
    }
    kinds
        .into_iter()
        .filter(|(_, kind)| kind.is_some())
        .map(|(key, _)| key.to_string())
        .collect()
}

fn detect_temporal(value: &Value) -> Value {
    let Value::String(s) = value else {
        return value.clone();
    };
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Value::Date(date);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Value::DateTime(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Value::DateTime(dt);
    }
    value.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::Content;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_with_explicit_columns() {
        let input = r#"[{"b": 1, "a": "x"}, {"a": "y"}]"#;
        let table = read_table(input.as_bytes(), &["b", "a"]).unwrap();
        assert_eq!(table.key_order(), vec!["b", "a"]);
        assert_eq!(table.record_count(), 2);
    }

    #[test]
    fn test_read_detects_sorted_order() {
        let input = r#"[{"b": 1, "a": "x"}, {"c": null}]"#;
        let table = read_table::<_, &str>(input.as_bytes(), &[]).unwrap();
        assert_eq!(table.key_order(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_read_single_object_and_dates() {
        let input = r#"{"day": "2024-03-01", "at": "2024-03-01T10:00:00", "n": 1.5}"#;
        let table = read_table(input.as_bytes(), &["day", "at", "n"]).unwrap();
        let record = table.record(0).unwrap();
        assert!(matches!(record.value("day"), Value::Date(_)));
        assert!(matches!(record.value("at"), Value::DateTime(_)));
        assert_eq!(record.value("n"), &Value::Float(1.5));
    }

    #[test]
    fn test_mixed_string_column_stays_text() {
        let input = r#"[
            {"d": "2024-01-01", "t": "2024-01-01"},
            {"d": "n/a", "t": "2024-01-01T09:30:00"},
            {"d": null},
            {"e": "2024-02-01"}
        ]"#;
        let table = read_table(input.as_bytes(), &["d", "e", "t"]).unwrap();
        let records = table.records();
        assert_eq!(records[0].value("d"), &Value::from("2024-01-01"));
        assert_eq!(records[1].value("d"), &Value::from("n/a"));
        assert_eq!(records[1].value("t"), &Value::from("2024-01-01T09:30:00"));
        assert!(matches!(records[3].value("e"), Value::Date(_)));

        let sorted = table
            .pipeline()
            .sort(vec![crate::ops::SortKey::asc("d")])
            .execute()
            .unwrap();
        assert_eq!(sorted.record(2).unwrap().value("d"), &Value::from("2024-01-01"));
    }

    #[test]
    fn test_encoded_dates_read_back_as_dates() {
        let input = r#"[{"day": "2024-03-01", "n": 1}, {"day": "2024-03-02", "n": 2}]"#;
        let table = read_table(input.as_bytes(), &["day", "n"]).unwrap();
        let encoded = table.encode_text().unwrap();
        assert_eq!(
            encoded,
            r#"[{"day":"2024-03-01","n":1},{"day":"2024-03-02","n":2}]"#
        );
        let again = read_table(encoded.as_bytes(), &["day", "n"]).unwrap();
        assert_eq!(again.records(), table.records());
        assert!(matches!(again.record(0).unwrap().value("day"), Value::Date(_)));
    }

    #[test]
    fn test_read_rejects_non_objects() {
        let err = read_table::<_, &str>(r#"[1, 2]"#.as_bytes(), &[]).unwrap_err();
        assert!(err.to_string().contains("not a JSON object"));
        assert!(read_table::<_, &str>("42".as_bytes(), &[]).is_err());
        assert!(read_table(r#"[{"a": 1}]"#.as_bytes(), &["a", "a"]).is_err());
    }

    #[test]
    fn test_read_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"a": 1}}]"#).unwrap();
        let table = read_table_file(file.path(), &["a"]).unwrap();
        assert_eq!(table.record_count(), 1);
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse_literal("42"), Value::Int(42));
        assert_eq!(parse_literal("true"), Value::Bool(true));
        assert_eq!(parse_literal("Eng"), Value::from("Eng"));
        assert_eq!(parse_literal("\"42\""), Value::from("42"));
        assert!(matches!(parse_literal("2024-01-02"), Value::Date(_)));
        assert_eq!(parse_literal("[1]"), Value::from("[1]"));
    }
}
