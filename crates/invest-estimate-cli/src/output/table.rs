use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{cell, ROW_FIELDS};

/// Format output as tables: headline fields first, then one table per
/// row-per-year or row-per-part section, then warnings.
pub fn print_table(value: &Value) {
    let Some(envelope) = value.as_object() else {
        println!("{}", cell(value));
        return;
    };

    match envelope.get("result") {
        Some(Value::Object(result)) => print_sections(result),
        Some(other) => println!("{}", cell(other)),
        None => print_sections(envelope),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_sections(result: &Map<String, Value>) {
    println!("{}", field_table(result));

    for (key, val) in result {
        match val {
            Value::Array(rows) if ROW_FIELDS.contains(&key.as_str()) => {
                println!("\n{}:", title(key));
                println!("{}", row_table(rows));
            }
            // Indicator sets carry their own cash-flow table
            Value::Object(inner) if inner.contains_key("cash_flows") => {
                println!("\n{}:", title(key));
                print_sections(inner);
            }
            _ => {}
        }
    }
}

/// Field/Value table of the scalar fields. Cost items show their total.
fn field_table(map: &Map<String, Value>) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        let rendered = match val {
            Value::Array(_) => continue,
            Value::Object(inner) if inner.contains_key("cash_flows") => continue,
            Value::Object(inner) => match inner.get("total") {
                Some(total) => cell(total),
                None => cell(val),
            },
            other => cell(other),
        };
        builder.push_record([key.clone(), rendered]);
    }
    builder.build()
}

fn row_table(rows: &[Value]) -> Table {
    let mut builder = Builder::default();
    let headers: Vec<String> = match rows.first() {
        Some(Value::Object(first)) => first.keys().cloned().collect(),
        _ => vec!["value".to_string()],
    };
    builder.push_record(headers.clone());

    for item in rows {
        let row: Vec<String> = match item {
            Value::Object(map) => headers
                .iter()
                .map(|h| map.get(h.as_str()).map(cell).unwrap_or_default())
                .collect(),
            other => vec![cell(other)],
        };
        builder.push_record(row);
    }
    builder.build()
}

fn title(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}
