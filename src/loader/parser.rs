use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Parses a JSON file into a given type `T`.
///
/// - `Error::IoError` if the file cannot be read.
/// - `Error::CorruptState` if the content is not valid JSON for `T`.
pub fn parse_json_file<T: DeserializeOwned>(file_path: impl AsRef<Path>) -> Result<T> {
    let data = fs::read_to_string(file_path.as_ref())?;
    parse_json_str(&data)
}

pub fn parse_json_str<T: DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| Error::corrupt(format!("malformed network document: {}", e), None))
}

/// Writes `value` as pretty-printed JSON, replacing the file if it exists.
pub fn write_json_file<T: Serialize>(file_path: impl AsRef<Path>, value: &T) -> Result<()> {
    let data = serde_json::to_string_pretty(value)?;
    fs::write(file_path.as_ref(), data)?;
    Ok(())
}
