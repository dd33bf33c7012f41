//! Record Access - the JSON document holding the artifact's version
//!
//! Reads are always allowed. Writes only happen inside an increment's
//! snapshot window (see `increment`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use thiserror::Error;

use crate::format::{self, Version};

pub const VERSION_FIELD: &str = "version";
const DEFAULT_INDENT: &str = "  ";

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Version record not found at {}: {source}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Version record at {} has no usable version field: {reason}", path.display())]
    VersionFieldMissing { path: PathBuf, reason: String },

    #[error("Failed to write version record at {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolve the current version: the override if given, otherwise the
/// record's version field.
pub fn current_version(
    override_version: Option<&Version>,
    location: &Path,
) -> Result<Version, RecordError> {
    match override_version {
        Some(version) => Ok(version.clone()),
        None => read_version(location),
    }
}

/// Read and validate the version field of the record at `location`.
pub fn read_version(location: &Path) -> Result<Version, RecordError> {
    let bytes = fs::read(location).map_err(|source| RecordError::NotFound {
        path: location.to_path_buf(),
        source,
    })?;
    version_from_bytes(location, &bytes)
}

pub fn version_from_bytes(location: &Path, bytes: &[u8]) -> Result<Version, RecordError> {
    let missing = |reason: String| RecordError::VersionFieldMissing {
        path: location.to_path_buf(),
        reason,
    };

    let doc: Value = serde_json::from_slice(bytes).map_err(|e| missing(format!("not JSON: {e}")))?;
    let raw = doc
        .get(VERSION_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| missing("no string \"version\" field".to_string()))?;

    if !format::validate(raw) {
        return Err(missing(format!("'{raw}' is not a valid version")));
    }
    format::parse(raw).map_err(|e| missing(e.to_string()))
}

/// Re-render `original` with its version field replaced by `version`.
///
/// Every other field keeps its value and position. The indentation unit and
/// trailing newline of `original` are reused.
pub fn with_version_field(
    location: &Path,
    original: &[u8],
    version: &Version,
) -> Result<Vec<u8>, RecordError> {
    let missing = |reason: String| RecordError::VersionFieldMissing {
        path: location.to_path_buf(),
        reason,
    };

    let mut doc: Value =
        serde_json::from_slice(original).map_err(|e| missing(format!("not JSON: {e}")))?;
    let fields = doc
        .as_object_mut()
        .ok_or_else(|| missing("record is not a JSON object".to_string()))?;
    fields.insert(VERSION_FIELD.to_string(), Value::String(version.to_string()));

    let text = String::from_utf8_lossy(original);
    let indent = detect_indent(&text);

    let mut out = Vec::with_capacity(original.len() + 8);
    let formatter = PrettyFormatter::with_indent(indent.as_bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    doc.serialize(&mut ser)
        .map_err(|e| missing(format!("cannot serialize record: {e}")))?;

    if text.ends_with('\n') {
        out.push(b'\n');
    }
    Ok(out)
}

/// Write `version` into the record at `location`, starting from `original`.
pub fn write_version(
    location: &Path,
    original: &[u8],
    version: &Version,
) -> Result<(), RecordError> {
    let rendered = with_version_field(location, original, version)?;
    fs::write(location, rendered).map_err(|source| RecordError::Write {
        path: location.to_path_buf(),
        source,
    })
}

fn detect_indent(text: &str) -> &str {
    text.lines()
        .skip(1)
        .find_map(|line| {
            let body = line.trim_start_matches([' ', '\t']);
            let width = line.len() - body.len();
            (width > 0 && !body.is_empty()).then(|| &line[..width])
        })
        .unwrap_or(DEFAULT_INDENT)
}
