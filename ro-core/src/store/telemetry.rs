// ro-core/src/store/telemetry.rs
// ============================================================================
// Module: Telemetry (C14)
// Description: Strictly sequential, indexed telemetry event stream.
// Purpose: Unlike the audit log, telemetry must never silently skip or
//          reorder: every event's seq strictly exceeds the stream's prior
//          maximum.
// Dependencies: serde_json, time, crate::core, crate::store::atomic
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::RunId;
use crate::core::artifacts::TelemetryEvent;
use crate::core::artifacts::TelemetryIndex;
use crate::core::error::OrchError;
use crate::core::error::OrchErrorCode;

use super::atomic::append_jsonl_line;
use super::atomic::read_json;
use super::atomic::write_json_atomic;

/// Appends a telemetry event, allocating the next sequence number unless
/// `seq` is supplied, in which case it must strictly exceed the index's
/// current maximum.
///
/// # Errors
/// Returns [`OrchErrorCode::InvalidState`] if a caller-supplied `seq` does
/// not strictly exceed the current maximum, or propagates write failures.
pub fn telemetry_append(
    stream_path: &Path,
    index_path: &Path,
    run_id: &RunId,
    event_type: &str,
    payload: BTreeMap<String, serde_json::Value>,
    seq: Option<u64>,
) -> Result<TelemetryEvent, OrchError> {
    let index: TelemetryIndex = if index_path.exists() {
        read_json(index_path)?
    } else {
        TelemetryIndex::default()
    };

    let next_seq = match seq {
        Some(supplied) if supplied > index.max_seq => supplied,
        Some(supplied) => {
            return Err(OrchError::with_details(
                OrchErrorCode::InvalidState,
                "telemetry seq must strictly exceed the stream's current maximum",
                serde_json::json!({ "supplied": supplied, "max_seq": index.max_seq }),
            ));
        }
        None => index.max_seq + 1,
    };

    let event = TelemetryEvent {
        schema_version: "telemetry.event.v1".to_string(),
        run_id: run_id.clone(),
        seq: next_seq,
        ts: OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default(),
        event_type: event_type.to_string(),
        payload,
    };

    append_jsonl_line(stream_path, &event)?;
    write_json_atomic(index_path, &TelemetryIndex { max_seq: next_seq })?;
    Ok(event)
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
    use super::super::atomic::read_jsonl;

    #[test]
    fn telemetry_append_allocates_increasing_seqs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stream = dir.path().join("logs/telemetry.jsonl");
        let index = dir.path().join("logs/telemetry.index.json");
        let run_id = RunId::new("run_1");

        let first =
            telemetry_append(&stream, &index, &run_id, "tick_started", BTreeMap::new(), None)
                .expect("first append");
        let second =
            telemetry_append(&stream, &index, &run_id, "tick_finished", BTreeMap::new(), None)
                .expect("second append");
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);

        let events: Vec<TelemetryEvent> = read_jsonl(&stream).expect("read");
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn telemetry_append_rejects_backdated_seq() {
        let dir = tempfile::tempdir().expect("tempdir");
        let stream = dir.path().join("logs/telemetry.jsonl");
        let index = dir.path().join("logs/telemetry.index.json");
        let run_id = RunId::new("run_1");

        telemetry_append(&stream, &index, &run_id, "tick_started", BTreeMap::new(), Some(5))
            .expect("seeded append");
        let err =
            telemetry_append(&stream, &index, &run_id, "tick_started", BTreeMap::new(), Some(3))
                .expect_err("must reject backdated seq");
        assert_eq!(err.code, OrchErrorCode::InvalidState);
    }
}
