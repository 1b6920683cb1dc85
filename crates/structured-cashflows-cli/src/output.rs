//! Output formatting: json, table, csv, and minimal single-value modes.

use serde_json::Value;
use std::io;
use tabled::{builder::Builder, Table};

use crate::OutputFormat;

pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => print_table(value),
        OutputFormat::Csv => print_csv(value),
        OutputFormat::Minimal => print_minimal(value),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("JSON serialization error: {e}"),
    }
}

fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            // Computation envelopes render their result section plus warnings.
            let body = map.get("result").unwrap_or(value);
            match body {
                Value::Object(fields) => print_field_table(fields),
                Value::Array(rows) => print_row_table(rows),
                other => println!("{other}"),
            }
            if let Some(Value::Array(warnings)) = map.get("warnings") {
                if !warnings.is_empty() {
                    println!("\nWarnings:");
                    for warning in warnings {
                        if let Value::String(s) = warning {
                            println!("  - {s}");
                        }
                    }
                }
            }
        }
        Value::Array(rows) => print_row_table(rows),
        other => println!("{other}"),
    }
}

fn print_field_table(fields: &serde_json::Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, value) in fields {
        builder.push_record([key.as_str(), scalar(value).as_str()]);
    }
    println!("{}", Table::from(builder));
}

fn print_row_table(rows: &[Value]) {
    if rows.is_empty() {
        println!("(empty)");
        return;
    }
    match rows.first() {
        Some(Value::Object(first)) => {
            let headers: Vec<String> = first.keys().cloned().collect();
            let mut builder = Builder::default();
            builder.push_record(&headers);
            for row in rows {
                if let Value::Object(map) = row {
                    let record: Vec<String> = headers
                        .iter()
                        .map(|h| map.get(h).map(scalar).unwrap_or_default())
                        .collect();
                    builder.push_record(record);
                }
            }
            println!("{}", Table::from(builder));
        }
        _ => {
            for row in rows {
                println!("{}", scalar(row));
            }
        }
    }
}

fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    let body = value
        .as_object()
        .and_then(|map| map.get("result"))
        .unwrap_or(value);

    match body {
        Value::Object(fields) => {
            let _ = writer.write_record(["field", "value"]);
            for (key, val) in fields {
                let _ = writer.write_record([key.as_str(), scalar(val).as_str()]);
            }
        }
        Value::Array(rows) => {
            if let Some(Value::Object(first)) = rows.first() {
                let headers: Vec<&str> = first.keys().map(String::as_str).collect();
                let _ = writer.write_record(&headers);
                for row in rows {
                    if let Value::Object(map) = row {
                        let record: Vec<String> = headers
                            .iter()
                            .map(|h| map.get(*h).map(scalar).unwrap_or_default())
                            .collect();
                        let _ = writer.write_record(&record);
                    }
                }
            } else {
                for row in rows {
                    let _ = writer.write_record([scalar(row)]);
                }
            }
        }
        other => {
            let _ = writer.write_record([scalar(other)]);
        }
    }

    let _ = writer.flush();
}

/// Print just the headline number from the output.
fn print_minimal(value: &Value) {
    let body = value
        .as_object()
        .and_then(|map| map.get("result"))
        .unwrap_or(value);

    let priority_keys = [
        "price",
        "wal",
        "unallocated_funds",
        "discount_factor",
        "rate",
        "vector",
    ];

    if let Value::Object(map) = body {
        for key in priority_keys {
            if let Some(val) = map.get(key) {
                if !val.is_null() {
                    println!("{}", scalar(val));
                    return;
                }
            }
        }
        if let Some(metrics) = map.get("metrics") {
            if let Some(wal) = metrics.get("wal") {
                println!("{}", scalar(wal));
                return;
            }
        }
        if let Some((key, val)) = map.iter().next() {
            println!("{key}: {}", scalar(val));
            return;
        }
    }

    println!("{}", scalar(body));
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
