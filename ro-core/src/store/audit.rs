// ro-core/src/store/audit.rs
// ============================================================================
// Module: Audit Log (C14)
// Description: Append-only, best-effort JSONL audit trail.
// Purpose: Record every state-changing operation's reason and inputs
//          digest without ever failing the operation it describes.
// Dependencies: serde_json, time, crate::core, crate::store::atomic
// ============================================================================

//! ## Overview
//! [`append_audit_record`] never returns an error: per spec §7, "Audit/
//! telemetry failures are logged but do not fail primary operations." A
//! failure to append is only surfaced as a `tracing::warn!` diagnostic.

use std::path::Path;

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::RunId;
use crate::core::artifacts::AuditRecord;

use super::atomic::append_jsonl_line;

/// Appends one audit record to the JSONL audit log at `path`.
///
/// `extra` is merged into the record as additional kind-specific fields.
/// Failures are swallowed and only logged; callers never need to handle an
/// error from this function.
pub fn append_audit_record(
    path: &Path,
    kind: &str,
    run_id: &RunId,
    reason: &str,
    inputs_digest: &str,
    extra: Value,
) {
    let mut fields = std::collections::BTreeMap::new();
    if let Value::Object(map) = extra {
        for (k, v) in map {
            fields.insert(k, v);
        }
    }
    let record = AuditRecord {
        ts: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        kind: kind.to_string(),
        run_id: run_id.clone(),
        reason: reason.to_string(),
        inputs_digest: inputs_digest.to_string(),
        extra: fields,
    };
    if let Err(err) = append_jsonl_line(path, &record) {
        tracing::warn!(error = %err, kind, "failed to append audit record");
    }
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
    use crate::store::atomic::read_jsonl;

    #[test]
    fn append_audit_record_persists_a_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs/audit.jsonl");
        append_audit_record(
            &path,
            "manifest_write",
            &RunId::new("run_1"),
            "advance",
            "sha256:abc",
            serde_json::json!({"prev_revision": 1, "new_revision": 2}),
        );
        let records: Vec<AuditRecord> = read_jsonl(&path).expect("read");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, "manifest_write");
        assert_eq!(records[0].extra.get("new_revision"), Some(&serde_json::json!(2)));
    }
}
