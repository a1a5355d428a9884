use serde_json::Value;
use std::io;

use super::{cell, result_of, ROW_FIELDS};

/// Write the result's detail rows (overview, schedule or cash-flow table)
/// as CSV; results without rows become two-column field,value CSV.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());
    let result = result_of(value);

    match detail_rows(result) {
        Some(rows) => write_rows(&mut wtr, rows),
        None => {
            let _ = wtr.write_record(["field", "value"]);
            if let Value::Object(map) = result {
                for (key, val) in map {
                    let _ = wtr.write_record([key.as_str(), &cell(val)]);
                }
            } else {
                let _ = wtr.write_record(["value", &cell(result)]);
            }
        }
    }

    let _ = wtr.flush();
}

/// First row array in the result, looking one level down for the
/// pre-tax indicator set.
fn detail_rows(result: &Value) -> Option<&[Value]> {
    let scopes = [Some(result), result.get("pre_tax")];
    for scope in scopes.into_iter().flatten() {
        for field in ROW_FIELDS {
            if let Some(Value::Array(rows)) = scope.get(field) {
                return Some(rows);
            }
        }
    }
    None
}

fn write_rows<W: io::Write>(wtr: &mut csv::Writer<W>, rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            let _ = wtr.write_record([&cell(item)]);
        }
        return;
    };

    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(cell).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&row);
        }
    }
}
