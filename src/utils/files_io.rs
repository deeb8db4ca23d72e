// src/utils/files_io.rs
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::utils::error::StorageError;

/// Reads a JSON document from `path`.
///
/// Files written by the earlier tooling are UTF-16 with a byte-order mark; those are
/// decoded transparently. Anything else is read as UTF-8 (an optional UTF-8 BOM is skipped).
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, StorageError> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    let text = decode_text(&bytes)
        .map_err(|e| StorageError::InvalidEncoding(format!("{}: {}", path.display(), e)))?;

    serde_json::from_str(&text)
        .map_err(|e| StorageError::SerializationError(format!("{}: {}", path.display(), e)))
}

/// Writes `value` as UTF-8 JSON indented with four spaces.
/// The file is replaced wholesale; an interrupted write may leave it truncated.
pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(path: P, value: &T) -> Result<(), StorageError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;

    fs::write(path, buf)?;
    Ok(())
}

fn decode_text(bytes: &[u8]) -> Result<String, String> {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8(rest.to_vec()).map_err(|e| e.to_string()),
        _ => String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string()),
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> Result<String, String> {
    if bytes.len() % 2 != 0 {
        return Err("odd number of bytes in UTF-16 stream".to_string());
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[test]
    fn round_trips_utf8_with_four_space_indent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let value = json!([{"company_name": "ŻYWIEC", "date": "2020-01-02"}]);

        write_json(&path, &value).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n    {"), "expected 4-space indent, got:\n{}", raw);
        let back: Value = load_json(&path).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn reads_utf16_le_with_bom() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.json");
        let mut bytes = vec![0xFF, 0xFE];
        for unit in r#"{"company_name": "ŁÓDŹ"}"#.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        fs::write(&path, bytes).unwrap();

        let back: Value = load_json(&path).unwrap();
        assert_eq!(back["company_name"], "ŁÓDŹ");
    }

    #[test]
    fn reports_broken_json_as_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "[{").unwrap();

        let err = load_json::<Value, _>(&path).unwrap_err();
        assert!(matches!(err, StorageError::SerializationError(_)));
    }
}
