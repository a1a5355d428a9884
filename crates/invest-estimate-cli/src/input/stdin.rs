use serde_json::Value;
use std::io::{self, Read};

/// Read a piped JSON or YAML document from stdin.
/// Returns None when stdin is an interactive terminal or empty.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    parse_document(&buffer)
}

fn parse_document(text: &str) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(Some(serde_json::from_str(trimmed)?));
    }
    Ok(Some(serde_yaml::from_str(trimmed)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_input_is_none() {
        assert!(parse_document("  \n").unwrap().is_none());
    }

    #[test]
    fn test_json_and_yaml_agree() {
        let json = parse_document(r#"{"loan_amount": "7000", "term_years": 10}"#)
            .unwrap()
            .unwrap();
        let yaml = parse_document("loan_amount: \"7000\"\nterm_years: 10\n")
            .unwrap()
            .unwrap();
        assert_eq!(json, yaml);
    }
}
