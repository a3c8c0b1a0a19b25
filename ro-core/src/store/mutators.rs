// ro-core/src/store/mutators.rs
// ============================================================================
// Module: Manifest/Gates Mutators (C6)
// Description: RFC-7396 merge-patch mutation of manifest.json and
//              gates.json with immutable-field rejection, optimistic
//              revision locking, and audit-log append.
// Purpose: The only sanctioned way to change manifest or gates state; every
//          other component reads these documents but writes through here.
// Dependencies: serde_json, time, crate::core, crate::store::atomic,
//               crate::store::audit
// ============================================================================

//! ## Overview
//! [`manifest_write`] and [`gates_write`] apply an RFC 7396 JSON Merge Patch
//! to the current document, bump its revision by exactly one, and append an
//! audit record. Both reject patches that touch an immutable field and
//! patches whose `expected_revision` does not match the document's current
//! revision (`REVISION_MISMATCH`), giving optimistic concurrency control on
//! top of the run-lock's pessimistic exclusion.

use std::path::Path;

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::GatesDocument;
use crate::core::Manifest;
use crate::core::error::OrchError;
use crate::core::error::OrchErrorCode;
use crate::core::inputs_digest;

use super::atomic::read_json;
use super::atomic::write_json_atomic;
use super::audit::append_audit_record;

fn now_iso() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

/// Applies an RFC 7396 JSON Merge Patch: `null` deletes a key, objects
/// recurse, any other value (including arrays) replaces wholesale.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch_obj) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    let Value::Object(target_obj) = target else {
        unreachable!("just ensured target is an object")
    };
    for (key, value) in patch_obj {
        if value.is_null() {
            target_obj.remove(key);
        } else {
            let entry = target_obj.entry(key.clone()).or_insert(Value::Null);
            merge_patch(entry, value);
        }
    }
}

/// Returns the dotted paths within `patch` that touch one of `immutable`'s
/// top-level field names.
fn immutable_violations(patch: &Value, immutable: &[&str]) -> Vec<String> {
    let Value::Object(map) = patch else {
        return Vec::new();
    };
    immutable
        .iter()
        .filter(|field| map.contains_key(**field))
        .map(|field| (*field).to_string())
        .collect()
}

/// Applies `patch` to `manifest.json` at `path`.
///
/// # Errors
/// - [`OrchErrorCode::NotFound`] / [`OrchErrorCode::InvalidJson`] reading
///   the current document.
/// - [`OrchErrorCode::ImmutableField`] if `patch` touches an immutable
///   field.
/// - [`OrchErrorCode::RevisionMismatch`] if `expected_revision` is supplied
///   and does not match.
/// - [`OrchErrorCode::WriteFailed`] if the atomic write fails.
pub fn manifest_write(
    path: &Path,
    audit_log_path: &Path,
    patch: &Value,
    expected_revision: Option<u64>,
    reason: &str,
) -> Result<Manifest, OrchError> {
    let violations = immutable_violations(patch, Manifest::IMMUTABLE_FIELDS);
    if !violations.is_empty() {
        return Err(OrchError::with_details(
            OrchErrorCode::ImmutableField,
            "patch touches one or more immutable manifest fields",
            serde_json::json!({ "fields": violations }),
        ));
    }

    let mut current: Value = read_json(path)?;
    let current_manifest: Manifest = serde_json::from_value(current.clone()).map_err(|err| {
        OrchError::new(
            OrchErrorCode::SchemaValidationFailed,
            format!("manifest.json failed to parse as manifest.v1: {err}"),
        )
    })?;

    if let Some(expected) = expected_revision {
        if expected != current_manifest.revision {
            return Err(OrchError::with_details(
                OrchErrorCode::RevisionMismatch,
                "expected_revision does not match the current manifest revision",
                serde_json::json!({
                    "expected": expected,
                    "actual": current_manifest.revision,
                }),
            ));
        }
    }

    let prev_revision = current_manifest.revision;
    let patch_digest = inputs_digest(patch)?;

    merge_patch(&mut current, patch);
    let obj = current.as_object_mut().ok_or_else(|| {
        OrchError::new(OrchErrorCode::SchemaValidationFailed, "patched manifest is no longer a JSON object")
    })?;
    obj.insert(
        "revision".to_string(),
        Value::from(prev_revision.saturating_add(1)),
    );
    obj.insert("updated_at".to_string(), Value::from(now_iso()));

    let new_manifest: Manifest = serde_json::from_value(current).map_err(|err| {
        OrchError::new(
            OrchErrorCode::SchemaValidationFailed,
            format!("patched manifest failed schema validation: {err}"),
        )
    })?;

    write_json_atomic(path, &new_manifest)?;

    append_audit_record(
        audit_log_path,
        "manifest_write",
        &new_manifest.run_id,
        reason,
        patch_digest.as_str(),
        serde_json::json!({
            "prev_revision": prev_revision,
            "new_revision": new_manifest.revision,
        }),
    );

    Ok(new_manifest)
}

/// Applies a per-gate `update` object to `gates.json` at `path`.
///
/// `update` is a map of gate id (`"A"`..`"F"`) to a merge-patch fragment
/// for that gate's entry. Rejects the write if any gate's resulting status
/// is not `not_run` but carries no `checked_at`, or if a hard gate's status
/// is `warn` (only soft gates may warn).
///
/// # Errors
/// Same categories as [`manifest_write`], plus
/// [`OrchErrorCode::SchemaValidationFailed`] for the `checked_at`/`warn`
/// invariants.
pub fn gates_write(
    path: &Path,
    audit_log_path: &Path,
    update: &Value,
    computed_inputs_digest: &str,
    expected_revision: Option<u64>,
    reason: &str,
) -> Result<GatesDocument, OrchError> {
    let mut current: Value = read_json(path)?;
    let current_doc: GatesDocument = serde_json::from_value(current.clone()).map_err(|err| {
        OrchError::new(
            OrchErrorCode::SchemaValidationFailed,
            format!("gates.json failed to parse as gates.v1: {err}"),
        )
    })?;

    if let Some(expected) = expected_revision {
        if expected != current_doc.revision {
            return Err(OrchError::with_details(
                OrchErrorCode::RevisionMismatch,
                "expected_revision does not match the current gates revision",
                serde_json::json!({
                    "expected": expected,
                    "actual": current_doc.revision,
                }),
            ));
        }
    }

    let prev_revision = current_doc.revision;
    let patch_digest = inputs_digest(update)?;

    let gate_field_of = |id: &str| -> Option<&'static str> {
        match id {
            "A" => Some("a"),
            "B" => Some("b"),
            "C" => Some("c"),
            "D" => Some("d"),
            "E" => Some("e"),
            "F" => Some("f"),
            _ => None,
        }
    };

    if let Value::Object(updates) = update {
        let obj = current.as_object_mut().ok_or_else(|| {
            OrchError::new(OrchErrorCode::SchemaValidationFailed, "gates document is no longer a JSON object")
        })?;
        for (gate_id, patch) in updates {
            let field = gate_field_of(gate_id).ok_or_else(|| {
                OrchError::with_details(
                    OrchErrorCode::InvalidArgs,
                    "unknown gate id in gates_write update",
                    serde_json::json!({ "gate_id": gate_id }),
                )
            })?;
            let entry = obj.entry(field.to_string()).or_insert(Value::Null);
            merge_patch(entry, patch);
        }
        obj.insert(
            "revision".to_string(),
            Value::from(prev_revision.saturating_add(1)),
        );
        obj.insert("updated_at".to_string(), Value::from(now_iso()));
        obj.insert(
            "inputs_digest".to_string(),
            Value::from(computed_inputs_digest),
        );
    }

    let new_doc: GatesDocument = serde_json::from_value(current).map_err(|err| {
        OrchError::new(
            OrchErrorCode::SchemaValidationFailed,
            format!("patched gates document failed schema validation: {err}"),
        )
    })?;

    for gate in [&new_doc.a, &new_doc.b, &new_doc.c, &new_doc.d, &new_doc.e, &new_doc.f] {
        use crate::core::GateClass;
        use crate::core::GateStatus;
        if gate.status != GateStatus::NotRun && gate.checked_at.is_none() {
            return Err(OrchError::with_details(
                OrchErrorCode::SchemaValidationFailed,
                "a gate with status != not_run must have checked_at set",
                serde_json::json!({ "gate_id": gate.id.as_str() }),
            ));
        }
        if gate.class == GateClass::Hard && gate.status == GateStatus::Warn {
            return Err(OrchError::with_details(
                OrchErrorCode::SchemaValidationFailed,
                "a hard gate may not carry a warn status",
                serde_json::json!({ "gate_id": gate.id.as_str() }),
            ));
        }
    }

    write_json_atomic(path, &new_doc)?;

    append_audit_record(
        audit_log_path,
        "gates_write",
        &new_doc.run_id,
        reason,
        patch_digest.as_str(),
        serde_json::json!({
            "prev_revision": prev_revision,
            "new_revision": new_doc.revision,
        }),
    );

    Ok(new_doc)
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
    use crate::core::ManifestArtifactPaths;
    use crate::core::ManifestArtifacts;
    use crate::core::ManifestLimits;
    use crate::core::ManifestQuery;
    use crate::core::ManifestStage;
    use crate::core::QuerySensitivity;
    use crate::core::RunId;
    use crate::core::RunMode;
    use crate::core::RunStatus;
    use crate::core::StageName;

    fn sample_manifest() -> Manifest {
        Manifest {
            schema_version: "manifest.v1".to_string(),
            run_id: RunId::new("run_1"),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            revision: 1,
            updated_at: "2026-01-01T00:00:00Z".to_string(),
            artifacts: ManifestArtifacts {
                root: "/tmp/run_1".to_string(),
                paths: ManifestArtifactPaths {
                    manifest: "manifest.json".to_string(),
                    gates: "gates.json".to_string(),
                    perspectives: "perspectives.json".to_string(),
                },
            },
            mode: RunMode::Standard,
            status: RunStatus::Created,
            query: ManifestQuery {
                text: "example".to_string(),
                constraints: None,
                sensitivity: QuerySensitivity::Normal,
            },
            stage: ManifestStage {
                current: StageName::new("init"),
                started_at: "2026-01-01T00:00:00Z".to_string(),
                last_progress_at: None,
                history: Vec::new(),
            },
            limits: ManifestLimits {
                max_wave1_agents: 5,
                max_wave2_agents: 3,
                max_summary_kb: 10,
                max_total_summary_kb: 50,
                max_review_iterations: 2,
            },
            metrics: Default::default(),
            failures: Vec::new(),
        }
    }

    #[test]
    fn manifest_write_bumps_revision_and_rejects_immutable_patch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest_path = dir.path().join("manifest.json");
        let audit_path = dir.path().join("logs/audit.jsonl");
        write_json_atomic(&manifest_path, &sample_manifest()).expect("seed manifest");

        let updated = manifest_write(
            &manifest_path,
            &audit_path,
            &serde_json::json!({"status": "running"}),
            Some(1),
            "advance",
        )
        .expect("patch applies");
        assert_eq!(updated.revision, 2);
        assert_eq!(updated.status, RunStatus::Running);

        let err = manifest_write(
            &manifest_path,
            &audit_path,
            &serde_json::json!({"run_id": "run_2"}),
            Some(2),
            "attempt mutation",
        )
        .expect_err("must reject immutable field patch");
        assert_eq!(err.code, OrchErrorCode::ImmutableField);
    }

    #[test]
    fn manifest_write_rejects_revision_mismatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manifest_path = dir.path().join("manifest.json");
        let audit_path = dir.path().join("logs/audit.jsonl");
        write_json_atomic(&manifest_path, &sample_manifest()).expect("seed manifest");

        let err = manifest_write(
            &manifest_path,
            &audit_path,
            &serde_json::json!({"status": "running"}),
            Some(99),
            "advance",
        )
        .expect_err("must reject stale expected_revision");
        assert_eq!(err.code, OrchErrorCode::RevisionMismatch);
    }

    #[test]
    fn gates_write_requires_checked_at_when_status_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gates_path = dir.path().join("gates.json");
        let audit_path = dir.path().join("logs/audit.jsonl");
        write_json_atomic(
            &gates_path,
            &GatesDocument::fresh(RunId::new("run_1"), "2026-01-01T00:00:00Z"),
        )
        .expect("seed gates");

        let err = gates_write(
            &gates_path,
            &audit_path,
            &serde_json::json!({"A": {"status": "pass"}}),
            "sha256:deadbeef",
            Some(1),
            "evaluate gate a",
        )
        .expect_err("must require checked_at");
        assert_eq!(err.code, OrchErrorCode::SchemaValidationFailed);
    }

    #[test]
    fn gates_write_applies_valid_update() {
        let dir = tempfile::tempdir().expect("tempdir");
        let gates_path = dir.path().join("gates.json");
        let audit_path = dir.path().join("logs/audit.jsonl");
        write_json_atomic(
            &gates_path,
            &GatesDocument::fresh(RunId::new("run_1"), "2026-01-01T00:00:00Z"),
        )
        .expect("seed gates");

        let updated = gates_write(
            &gates_path,
            &audit_path,
            &serde_json::json!({"A": {"status": "pass", "checked_at": "2026-01-01T00:01:00Z"}}),
            "sha256:deadbeef",
            Some(1),
            "evaluate gate a",
        )
        .expect("update applies");
        assert_eq!(updated.revision, 2);
        assert_eq!(updated.a.status, crate::core::GateStatus::Pass);
    }
}
