pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Load a command's input from `--input`, else from piped stdin.
///
/// Returns `Ok(None)` when neither is available so the caller can fall
/// back to its individual flags.
pub fn load<T: DeserializeOwned>(
    path: Option<&str>,
) -> Result<Option<T>, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return Ok(Some(file::read_document(path)?));
    }
    match stdin::read_stdin()? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}
