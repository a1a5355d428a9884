pub mod csv_out;
pub mod json;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => json::print_json(value),
        OutputFormat::Yaml => json::print_yaml(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

/// Array fields that hold the row-per-year or row-per-part detail of a
/// result, in the order they are looked for.
pub(crate) const ROW_FIELDS: [&str; 4] = ["overview", "schedule", "rows", "cash_flows"];

/// Render a scalar cell; nested values fall back to compact JSON.
pub(crate) fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// The `result` object of an output envelope, or the value itself.
pub(crate) fn result_of(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cell_formats_scalars() {
        assert_eq!(cell(&json!("10104.97")), "10104.97");
        assert_eq!(cell(&json!(3)), "3");
        assert_eq!(cell(&Value::Null), "");
        assert_eq!(cell(&json!({"status": "unrecovered"})), r#"{"status":"unrecovered"}"#);
    }

    #[test]
    fn test_result_of_unwraps_envelope() {
        let envelope = json!({"result": {"npv": "12"}, "warnings": []});
        assert_eq!(result_of(&envelope), &json!({"npv": "12"}));
        let bare = json!({"npv": "12"});
        assert_eq!(result_of(&bare), &bare);
    }
}
