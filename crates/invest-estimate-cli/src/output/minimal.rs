use serde_json::Value;

use super::{cell, result_of};

/// Paths to the headline figure of each command's result, by priority.
const HEADLINE_PATHS: [&[&str]; 6] = [
    &["part_g", "total"],
    &["total_interest"],
    &["total_payment"],
    &["pre_tax", "npv"],
    &["part", "total"],
    &["npv"],
];

/// Print just the headline figure of the output.
pub fn print_minimal(value: &Value) {
    println!("{}", headline(result_of(value)));
}

fn headline(result: &Value) -> String {
    for path in HEADLINE_PATHS {
        if let Some(found) = lookup(result, path) {
            if !found.is_null() {
                return cell(found);
            }
        }
    }

    match result {
        Value::Object(map) => match map.iter().next() {
            Some((key, val)) => format!("{}: {}", key, cell(val)),
            None => String::new(),
        },
        other => cell(other),
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_estimate_headline_is_total_funding() {
        let result = json!({"part_a": {"total": "7500"}, "part_g": {"total": "10104.97"}});
        assert_eq!(headline(&result), "10104.97");
    }

    #[test]
    fn test_interest_headline() {
        let result = json!({"loan_amount": "7000", "total_interest": "514.451"});
        assert_eq!(headline(&result), "514.451");
    }

    #[test]
    fn test_fallback_to_first_field() {
        let result = json!({"discount_rate": "0.08"});
        assert_eq!(headline(&result), "discount_rate: 0.08");
    }
}
