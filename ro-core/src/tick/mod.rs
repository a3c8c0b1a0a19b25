// ro-core/src/tick/mod.rs
// ============================================================================
// Module: Tick Orchestrator Primitives (C12)
// Description: The cross-phase discipline every tick must observe:
//              pause/cancel checks, watchdog timeouts, tick caps, progress
//              heartbeats, and the panic-catch boundary around a work unit.
// Purpose: Give the three tick phases (pre-pivot, post-pivot,
//          post-summaries) one shared set of guards instead of each
//          reimplementing them.
// Dependencies: crate::core, time
// ============================================================================

//! ## Overview
//! This module holds the orchestrator-wide mechanics from spec §4.9's
//! "Cross-phase discipline": [`watchdog_check`] against
//! [`STAGE_TIMEOUTS_SECONDS`], [`check_tick_cap`] against
//! [`DEFAULT_TICK_CAPS`], [`check_runnable`] for the pause/cancel gate, and
//! [`run_work_unit`] as the `std::panic::catch_unwind` boundary that turns a
//! panicking work unit into a `_THREW`-suffixed error envelope. The three
//! concrete phase loops (`orchestrator_tick_live`,
//! `orchestrator_tick_post_pivot`, `orchestrator_tick_post_summaries`)
//! compose these primitives with the actual work units (`runAgent`,
//! citation fetches, file I/O) in the tool-call dispatcher, which is the
//! layer that has access to those side effects.

use std::panic::UnwindSafe;

use serde_json::Value;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::artifacts::RunStatus;
use crate::core::artifacts::TickLedgerRecord;
use crate::core::error::OrchError;
use crate::core::error::OrchErrorCode;
use crate::core::identifiers::StageName;

/// Per-stage time budgets, in seconds, from spec §4.9.
pub const STAGE_TIMEOUTS_SECONDS: &[(&str, u64)] = &[
    ("init", 120),
    ("wave1", 600),
    ("pivot", 120),
    ("wave2", 600),
    ("citations", 600),
    ("summaries", 600),
    ("synthesis", 600),
    ("review", 300),
    ("finalize", 120),
];

/// Default tick caps per orchestrator phase (spec §4.9: "default 5-10
/// depending on phase").
pub const DEFAULT_TICK_CAPS: &[(&str, u32)] = &[
    ("pre_pivot", 10),
    ("post_pivot", 8),
    ("post_summaries", 6),
];

/// Returns the time budget for `stage`, or `None` for an unknown stage name
/// (the watchdog then has nothing to check against).
#[must_use]
pub fn stage_timeout_seconds(stage: &str) -> Option<u64> {
    STAGE_TIMEOUTS_SECONDS
        .iter()
        .find(|(name, _)| *name == stage)
        .map(|(_, seconds)| *seconds)
}

/// Returns the default tick cap for `phase`, or `None` for an unknown
/// phase.
#[must_use]
pub fn tick_cap(phase: &str) -> Option<u32> {
    DEFAULT_TICK_CAPS
        .iter()
        .find(|(name, _)| *name == phase)
        .map(|(_, cap)| *cap)
}

fn parse_ts(ts: &str) -> Result<OffsetDateTime, OrchError> {
    OffsetDateTime::parse(ts, &Rfc3339).map_err(|err| {
        OrchError::with_details(
            OrchErrorCode::InvalidArgs,
            format!("invalid ISO-8601 timestamp: {err}"),
            json!({ "ts": ts }),
        )
    })
}

/// Checks `stage`'s elapsed time against its budget in
/// [`STAGE_TIMEOUTS_SECONDS`], called before and after every tick per spec
/// §4.9.
///
/// # Errors
/// [`OrchErrorCode::WatchdogTimeout`] if `now - started_at` exceeds the
/// stage's budget. A stage absent from the timeout table is never flagged.
pub fn watchdog_check(stage: &str, started_at: &str, now: &str) -> Result<(), OrchError> {
    let Some(budget) = stage_timeout_seconds(stage) else {
        return Ok(());
    };
    let started = parse_ts(started_at)?;
    let now_ts = parse_ts(now)?;
    let elapsed = (now_ts - started).whole_seconds().max(0);
    let elapsed = u64::try_from(elapsed).unwrap_or(u64::MAX);
    if elapsed > budget {
        return Err(OrchError::with_details(
            OrchErrorCode::WatchdogTimeout,
            format!("stage {stage} exceeded its {budget}s budget"),
            json!({ "stage": stage, "elapsed_seconds": elapsed, "budget_seconds": budget }),
        ));
    }
    Ok(())
}

/// Returns the manifest merge-patch fragment a progress heartbeat writes
/// between work units (spec §4.9: "patch `manifest.stage.last_progress_at`,
/// bump revision" — the revision bump itself happens in
/// [`crate::store::mutators::manifest_write`]).
#[must_use]
pub fn progress_heartbeat_patch(now: &str) -> Value {
    json!({ "stage": { "last_progress_at": now } })
}

/// Checks `status` against the pause/cancel gate evaluated at tick entry.
///
/// # Errors
/// [`OrchErrorCode::Paused`] or [`OrchErrorCode::Cancelled`] if the run is
/// in that state; `Ok(())` otherwise.
pub fn check_runnable(status: RunStatus) -> Result<(), OrchError> {
    match status {
        RunStatus::Paused => Err(OrchError::new(OrchErrorCode::Paused, "run is paused")),
        RunStatus::Cancelled => Err(OrchError::new(OrchErrorCode::Cancelled, "run was cancelled")),
        _ => Ok(()),
    }
}

/// Checks `tick_index` (0-based, the index of the tick about to run)
/// against `cap`.
///
/// # Errors
/// [`OrchErrorCode::TickCapExceeded`] if `tick_index >= cap`.
pub fn check_tick_cap(phase: &str, tick_index: u64, cap: u32) -> Result<(), OrchError> {
    if tick_index >= u64::from(cap) {
        return Err(OrchError::with_details(
            OrchErrorCode::TickCapExceeded,
            format!("phase {phase} exceeded its tick cap of {cap}"),
            json!({ "phase": phase, "tick_index": tick_index, "cap": cap }),
        ));
    }
    Ok(())
}

fn panic_payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "work unit panicked with a non-string payload".to_string()
    }
}

/// Runs `work`, the tick orchestrator's `catch_unwind` boundary.
///
/// A work unit that panics never propagates the panic to the caller;
/// instead this returns an error envelope whose `code` is
/// `"{OP_NAME}_THREW"` (spec: "converted into an error whose code carries
/// the `_THREW` suffix"). `op_name` identifies the work unit, e.g.
/// `"wave_output_ingest"`.
///
/// # Errors
/// Returns the work unit's own error envelope unchanged when it returns
/// `Err`, or a synthesized `_THREW` envelope when it panics.
pub fn run_work_unit<T>(op_name: &str, work: impl FnOnce() -> Result<T, OrchError> + UnwindSafe) -> Result<T, Value> {
    match std::panic::catch_unwind(work) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(err.to_envelope()),
        Err(payload) => {
            let message = panic_payload_message(payload.as_ref());
            Err(json!({
                "code": format!("{}_THREW", op_name.to_uppercase()),
                "message": message,
                "details": null,
            }))
        }
    }
}

/// Builds a [`TickLedgerRecord`] for append via
/// [`crate::store::ticks::tick_ledger_append`].
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn build_tick_ledger_record(
    index: u64,
    phase: &str,
    stage_before: &str,
    stage_after: &str,
    status_before: RunStatus,
    status_after: RunStatus,
    result: &str,
    inputs_digest: &str,
    artifacts: Vec<String>,
) -> TickLedgerRecord {
    TickLedgerRecord {
        index,
        phase: phase.to_string(),
        stage_before: StageName::new(stage_before),
        stage_after: StageName::new(stage_after),
        status_before: format!("{status_before:?}").to_lowercase(),
        status_after: format!("{status_after:?}").to_lowercase(),
        result: result.to_string(),
        inputs_digest: inputs_digest.to_string(),
        artifacts,
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

    #[test]
    fn watchdog_allows_elapsed_time_within_budget() {
        watchdog_check("wave1", "2026-01-01T00:00:00Z", "2026-01-01T00:05:00Z")
            .expect("5 minutes is within wave1's 600s budget");
    }

    #[test]
    fn watchdog_flags_overrun() {
        let err = watchdog_check("pivot", "2026-01-01T00:00:00Z", "2026-01-01T00:05:00Z")
            .expect_err("5 minutes exceeds pivot's 120s budget");
        assert_eq!(err.code, OrchErrorCode::WatchdogTimeout);
    }

    #[test]
    fn unknown_stage_is_never_flagged() {
        watchdog_check("unknown", "2026-01-01T00:00:00Z", "2099-01-01T00:00:00Z")
            .expect("unknown stages have no budget to exceed");
    }

    #[test]
    fn paused_run_is_rejected() {
        let err = check_runnable(RunStatus::Paused).expect_err("paused run must not tick");
        assert_eq!(err.code, OrchErrorCode::Paused);
    }

    #[test]
    fn tick_cap_exceeded_is_flagged() {
        let err = check_tick_cap("pre_pivot", 10, 10).expect_err("tick 10 is the 11th tick at cap 10");
        assert_eq!(err.code, OrchErrorCode::TickCapExceeded);
    }

    #[test]
    fn panicking_work_unit_yields_threw_suffixed_code() {
        let result: Result<(), Value> = run_work_unit("wave_output_ingest", || {
            panic!("boom");
        });
        let envelope = result.expect_err("panic must be caught");
        assert_eq!(envelope["code"], json!("WAVE_OUTPUT_INGEST_THREW"));
    }

    #[test]
    fn erroring_work_unit_passes_its_own_envelope_through() {
        let result: Result<(), Value> = run_work_unit("wave_output_ingest", || {
            Err(OrchError::new(OrchErrorCode::InvalidArgs, "bad input"))
        });
        let envelope = result.expect_err("propagates the error");
        assert_eq!(envelope["code"], json!("INVALID_ARGS"));
    }
}
