// ro-core/src/gates/retry.rs
// ============================================================================
// Module: Retry Controller (C13)
// Description: Bounded per-gate retry counters with caps and directive
//              passthrough.
// Purpose: Give every gate a fixed retry budget (`GATE_RETRY_CAPS_V1`) and a
//          single place that decides whether one more attempt is allowed.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! [`retry_cap`] is the table from spec §4.5: `A=0, B=2, C=1, D=1, E=3,
//! F=0`. [`record_retry`] is the pure decision function the tick
//! orchestrator calls before writing `retry/retry-directives.json`: given
//! the manifest's current `metrics.retry_counts` bag, it either returns the
//! next attempt number (and the metrics patch to persist it) or
//! [`OrchErrorCode::RetryCapExhausted`] once the gate's cap is hit.

use std::collections::BTreeMap;

use serde_json::Value;
use serde_json::json;

use crate::core::error::OrchError;
use crate::core::error::OrchErrorCode;

/// Per-gate retry caps, `GATE_RETRY_CAPS_V1` from spec §4.5.
pub const GATE_RETRY_CAPS_V1: &[(&str, u32)] =
    &[("A", 0), ("B", 2), ("C", 1), ("D", 1), ("E", 3), ("F", 0)];

/// Returns the retry cap for `gate_id`, or `None` if `gate_id` is unknown.
#[must_use]
pub fn retry_cap(gate_id: &str) -> Option<u32> {
    GATE_RETRY_CAPS_V1
        .iter()
        .find(|(id, _)| *id == gate_id)
        .map(|(_, cap)| *cap)
}

/// The outcome of a successful retry admission: the next attempt number and
/// the `manifest.metrics` merge-patch fragment recording it.
pub struct RetryAdmission {
    /// Attempt number this retry represents (1-indexed).
    pub attempt: u32,
    /// Merge-patch fragment for `manifest.metrics`, ready for
    /// [`crate::store::mutators::manifest_write`].
    pub metrics_patch: Value,
}

/// Decides whether one more retry of `gate_id` is admissible given the
/// manifest's current `metrics` bag, and if so, returns the patch recording
/// it.
///
/// `metrics` is read, never mutated in place; callers persist the returned
/// `metrics_patch` through [`crate::store::mutators::manifest_write`].
///
/// # Errors
/// - [`OrchErrorCode::InvalidArgs`] if `gate_id` has no entry in
///   [`GATE_RETRY_CAPS_V1`].
/// - [`OrchErrorCode::RetryCapExhausted`] if the gate's retry cap has
///   already been reached.
pub fn record_retry(
    metrics: &BTreeMap<String, Value>,
    gate_id: &str,
    change_note: &str,
    ts: &str,
) -> Result<RetryAdmission, OrchError> {
    let cap = retry_cap(gate_id).ok_or_else(|| {
        OrchError::with_details(
            OrchErrorCode::InvalidArgs,
            "unknown gate id for retry admission",
            json!({ "gate_id": gate_id }),
        )
    })?;

    let current_count = metrics
        .get("retry_counts")
        .and_then(Value::as_object)
        .and_then(|counts| counts.get(gate_id))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    if current_count >= u64::from(cap) {
        return Err(OrchError::with_details(
            OrchErrorCode::RetryCapExhausted,
            format!("gate {gate_id} retry cap ({cap}) exhausted"),
            json!({ "gate_id": gate_id, "cap": cap, "attempted": current_count + 1 }),
        ));
    }

    let attempt = u32::try_from(current_count + 1).unwrap_or(u32::MAX);

    let mut retry_counts = metrics
        .get("retry_counts")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    retry_counts.insert(gate_id.to_string(), json!(attempt));

    let mut retry_history: Vec<Value> = metrics
        .get("retry_history")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    retry_history.push(json!({
        "gate_id": gate_id,
        "attempt": attempt,
        "change_note": change_note,
        "ts": ts,
    }));

    Ok(RetryAdmission {
        attempt,
        metrics_patch: json!({
            "retry_counts": Value::Object(retry_counts),
            "retry_history": retry_history,
        }),
    })
}
