// ro-core/src/store/atomic.rs
// ============================================================================
// Module: Atomic Artifact Store (C2)
// Description: Write-rename JSON/text/JSONL persistence with directory
//              fsync for durability.
// Purpose: Guarantee every artifact write is all-or-nothing: a reader never
//          observes a partially-written file.
// Dependencies: std::fs, serde, crate::core::codec
// ============================================================================

//! ## Overview
//! Every artifact write in this system goes through [`write_json_atomic`]
//! or [`append_jsonl_line`]. Both write to a temporary sibling file, fsync
//! it, rename it onto the final path, then fsync the parent directory so
//! the rename itself survives a crash. JSON artifacts get a 2-space indent
//! and a trailing newline; JSONL appends are one canonical-JSON line with a
//! trailing newline.

use std::fs;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::canonical_json_bytes;
use crate::core::error::OrchError;
use crate::core::error::OrchErrorCode;

/// Recursively and idempotently ensures `dir` exists.
///
/// # Errors
/// Returns [`OrchErrorCode::WriteFailed`] if directory creation fails.
pub fn ensure_dir(dir: &Path) -> Result<(), OrchError> {
    fs::create_dir_all(dir).map_err(|err| {
        OrchError::new(
            OrchErrorCode::WriteFailed,
            format!("failed to create directory {}: {err}", dir.display()),
        )
    })
}

/// Builds a temporary sibling path for an atomic write: `${final}.tmp.${pid}.${nanos}`.
fn tmp_path(final_path: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut name = final_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(&format!(".tmp.{pid}.{nanos}"));
    final_path.with_file_name(name)
}

/// Fsyncs the parent directory of `path`, best-effort.
///
/// Not fsyncing the parent directory would leave the rename itself
/// unpersisted after a crash on some filesystems; this call makes a
/// best-effort attempt and never fails the caller's operation.
fn fsync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

/// Writes raw bytes to `path` atomically via tmp-then-rename.
///
/// # Errors
/// Returns [`OrchErrorCode::WriteFailed`] if any step of the write fails.
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<(), OrchError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let tmp = tmp_path(path);
    let write_result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();
    if let Err(err) = write_result {
        let _ = fs::remove_file(&tmp);
        return Err(OrchError::new(
            OrchErrorCode::WriteFailed,
            format!("atomic write to {} failed: {err}", path.display()),
        ));
    }
    fsync_parent_dir(path);
    Ok(())
}

/// Serializes `value` as indented JSON with a trailing newline and writes
/// it to `path` atomically.
///
/// # Errors
/// Returns [`OrchErrorCode::InvalidJson`] if serialization fails, or
/// [`OrchErrorCode::WriteFailed`] if the atomic write fails.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), OrchError> {
    let mut bytes = serde_json::to_vec_pretty(value).map_err(|err| {
        OrchError::new(
            OrchErrorCode::InvalidJson,
            format!("failed to serialize JSON artifact: {err}"),
        )
    })?;
    bytes.push(b'\n');
    write_bytes_atomic(path, &bytes)
}

/// Reads and deserializes a JSON artifact from `path`.
///
/// # Errors
/// Returns [`OrchErrorCode::NotFound`] if the file does not exist, or
/// [`OrchErrorCode::InvalidJson`] if it does not parse.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, OrchError> {
    let bytes = fs::read(path).map_err(|err| {
        OrchError::new(
            OrchErrorCode::NotFound,
            format!("failed to read {}: {err}", path.display()),
        )
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        OrchError::new(
            OrchErrorCode::InvalidJson,
            format!("failed to parse {} as JSON: {err}", path.display()),
        )
    })
}

/// Appends one canonical-JSON line (with trailing newline) to the JSONL
/// file at `path`, creating it if necessary.
///
/// This relies on `O_APPEND` semantics providing atomicity for a single
/// write call; concurrent appenders must still hold the run-lock, per the
/// concurrency model.
///
/// # Errors
/// Returns [`OrchErrorCode::WriteFailed`] if the append fails.
pub fn append_jsonl_line<T: Serialize>(path: &Path, value: &T) -> Result<(), OrchError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let mut line = canonical_json_bytes(value)?;
    line.push(b'\n');
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            OrchError::new(
                OrchErrorCode::WriteFailed,
                format!("failed to open {} for append: {err}", path.display()),
            )
        })?;
    file.write_all(&line).map_err(|err| {
        OrchError::new(
            OrchErrorCode::WriteFailed,
            format!("failed to append to {}: {err}", path.display()),
        )
    })?;
    file.sync_all().map_err(|err| {
        OrchError::new(
            OrchErrorCode::WriteFailed,
            format!("failed to sync {}: {err}", path.display()),
        )
    })?;
    Ok(())
}

/// Reads every line of a JSONL file, deserializing each.
///
/// # Errors
/// Returns [`OrchErrorCode::InvalidJsonl`] if any non-empty line fails to
/// parse.
pub fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, OrchError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path).map_err(|err| {
        OrchError::new(
            OrchErrorCode::NotFound,
            format!("failed to read {}: {err}", path.display()),
        )
    })?;
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|err| {
                OrchError::new(
                    OrchErrorCode::InvalidJsonl,
                    format!("failed to parse JSONL line in {}: {err}", path.display()),
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions and debug output.
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )]
    use super::*;
    use serde_json::json;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.json");
        write_json_atomic(&path, &json!({"a": 1})).expect("write");
        let value: serde_json::Value = read_json(&path).expect("read");
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn write_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manifest.json");
        write_json_atomic(&path, &json!({"a": 1})).expect("write");
        let entries: Vec<_> = fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(Result::ok)
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn append_jsonl_accumulates_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("audit.jsonl");
        append_jsonl_line(&path, &json!({"n": 1})).expect("append 1");
        append_jsonl_line(&path, &json!({"n": 2})).expect("append 2");
        let values: Vec<serde_json::Value> = read_jsonl(&path).expect("read");
        assert_eq!(values, vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[test]
    fn read_jsonl_missing_file_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.jsonl");
        let values: Vec<serde_json::Value> = read_jsonl(&path).expect("read");
        assert!(values.is_empty());
    }
}
