// ro-toolsurface/src/ops/control.rs
// ============================================================================
// Module: Stage/Fallback/Telemetry/Tick Operations
// Description: `stage_advance`, `fallback_offer`, `telemetry_append`,
//              `tick_ledger_append`, `watchdog_check`.
// Purpose: Compose C11 (stage engine), C12 (tick orchestrator primitives),
//          and C14 (audit/telemetry) for the tool-call surface.
// Dependencies: ro-core
// ============================================================================

use std::collections::BTreeMap;

use ro_core::OrchError;
use ro_core::core::GatesDocument;
use ro_core::core::Manifest;
use ro_core::core::RunId;
use ro_core::core::RunStatus;
use ro_core::core::artifacts::ManifestFailure;
use ro_core::core::artifacts::RevisionAction;
use ro_core::stage::StageAdvanceInput;
use ro_core::stage::stage_advance;
use ro_core::store::manifest_write;
use ro_core::store::ticks::tick_ledger_append;
use ro_core::store::write_bytes_atomic;
use ro_core::tick;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::ops::now_iso;
use crate::ops::parse_args;
use crate::ops::to_value;
use crate::paths;
use crate::router::ToolRouter;

/// `stage_advance` arguments.
#[derive(Debug, Deserialize)]
struct StageAdvanceArgs {
    run_id: String,
    manifest: Manifest,
    gates: GatesDocument,
    #[serde(default)]
    requested_next: Option<String>,
    reason: String,
    #[serde(default)]
    pivot_wave2_required: Option<bool>,
    #[serde(default)]
    revision_action: Option<RevisionAction>,
    #[serde(default)]
    summary_pack_present: bool,
}

/// `stage_advance`: runs [`stage_advance`](ro_core::stage::stage_advance)
/// over the supplied manifest/gates snapshot and persists the resulting
/// manifest patch via [`manifest_write`], per spec §4.8.
///
/// # Errors
/// Propagates [`stage_advance`](ro_core::stage::stage_advance)'s
/// prerequisite/gate-blocked errors, or [`manifest_write`]'s error
/// categories when persisting.
pub fn stage_advance_op(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: StageAdvanceArgs = parse_args(args)?;
    let now = now_iso();
    let outcome = stage_advance(&StageAdvanceInput {
        manifest: &args.manifest,
        gates: &args.gates,
        requested_next: args.requested_next.as_deref(),
        reason: &args.reason,
        pivot_wave2_required: args.pivot_wave2_required,
        revision_action: args.revision_action,
        summary_pack_present: args.summary_pack_present,
        now: &now,
    })?;

    let run_root = router.run_root(&RunId::new(args.run_id));
    let manifest = manifest_write(
        &paths::fixed(&run_root, paths::MANIFEST),
        &paths::fixed(&run_root, paths::AUDIT_LOG),
        &outcome.manifest_patch,
        Some(args.manifest.revision),
        &args.reason,
    )?;

    Ok(json!({
        "to": outcome.to.as_str(),
        "inputs_digest": outcome.inputs_digest,
        "manifest": to_value(&manifest)?,
    }))
}

/// `fallback_offer` arguments.
#[derive(Debug, Deserialize)]
struct FallbackOfferArgs {
    run_id: String,
    manifest: Manifest,
    code: String,
    source: String,
    message: String,
    /// Best-effort markdown summary of whatever work survived; written to
    /// `logs/fallback-summary.md` verbatim.
    summary_markdown: String,
}

/// `fallback_offer`: on a hard-gate failure, writes `logs/fallback-summary.md`
/// and patches the manifest to `status=failed` with a structured
/// [`ManifestFailure`] entry, per spec's "on any hard-gate failure"
/// user-visible behavior.
///
/// # Errors
/// [`ro_core::OrchErrorCode::WriteFailed`] if the fallback summary cannot be
/// written, or [`manifest_write`]'s error categories when persisting the
/// failure.
pub fn fallback_offer(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: FallbackOfferArgs = parse_args(args)?;
    let run_root = router.run_root(&RunId::new(args.run_id));
    let now = now_iso();

    write_bytes_atomic(&paths::fixed(&run_root, paths::FALLBACK_SUMMARY), args.summary_markdown.as_bytes())?;

    let failure = ManifestFailure {
        code: args.code,
        source: args.source,
        message: args.message,
        ts: now,
    };
    let mut failures = args.manifest.failures.clone();
    failures.push(failure);

    let patch = json!({ "status": RunStatus::Failed, "failures": failures });
    let manifest = manifest_write(
        &paths::fixed(&run_root, paths::MANIFEST),
        &paths::fixed(&run_root, paths::AUDIT_LOG),
        &patch,
        Some(args.manifest.revision),
        "fallback_offer",
    )?;

    Ok(json!({
        "fallback_summary_md": paths::FALLBACK_SUMMARY,
        "manifest": to_value(&manifest)?,
    }))
}

/// `telemetry_append` arguments.
#[derive(Debug, Deserialize)]
struct TelemetryAppendArgs {
    run_id: String,
    event_type: String,
    #[serde(default)]
    payload: BTreeMap<String, Value>,
    #[serde(default)]
    seq: Option<u64>,
}

/// `telemetry_append`: runs [`ro_core::store::telemetry::telemetry_append`],
/// per spec §4.11 (C14).
///
/// # Errors
/// Propagates [`ro_core::store::telemetry::telemetry_append`]'s error
/// categories.
pub fn telemetry_append_op(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: TelemetryAppendArgs = parse_args(args)?;
    let run_root = router.run_root(&RunId::new(args.run_id.clone()));
    let event = ro_core::store::telemetry::telemetry_append(
        &paths::fixed(&run_root, paths::TELEMETRY_STREAM),
        &paths::fixed(&run_root, paths::TELEMETRY_INDEX),
        &RunId::new(args.run_id),
        &args.event_type,
        args.payload,
        args.seq,
    )?;
    to_value(&event)
}

/// `tick_ledger_append` arguments.
#[derive(Debug, Deserialize)]
struct TickLedgerAppendArgs {
    run_id: String,
    index: u64,
    phase: String,
    stage_before: String,
    stage_after: String,
    status_before: RunStatus,
    status_after: RunStatus,
    result: String,
    inputs_digest: String,
    #[serde(default)]
    artifacts: Vec<String>,
}

/// `tick_ledger_append`: builds a tick-ledger record via
/// [`tick::build_tick_ledger_record`] and persists it via
/// [`tick_ledger_append`](ro_core::store::ticks::tick_ledger_append), per
/// spec §4.12 (C12).
///
/// # Errors
/// Propagates [`tick_ledger_append`](ro_core::store::ticks::tick_ledger_append)'s
/// error categories.
pub fn tick_ledger_append_op(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: TickLedgerAppendArgs = parse_args(args)?;
    let run_root = router.run_root(&RunId::new(args.run_id));
    let record = tick::build_tick_ledger_record(
        args.index,
        &args.phase,
        &args.stage_before,
        &args.stage_after,
        args.status_before,
        args.status_after,
        &args.result,
        &args.inputs_digest,
        args.artifacts,
    );
    tick_ledger_append(&paths::fixed(&run_root, paths::TICK_LEDGER), &record)?;
    to_value(&record)
}

/// `watchdog_check` arguments.
#[derive(Debug, Deserialize)]
struct WatchdogCheckArgs {
    stage: String,
    started_at: String,
}

/// `watchdog_check`: runs [`tick::watchdog_check`] against the stage's
/// configured timeout, per spec §4.12.
///
/// # Errors
/// [`ro_core::OrchErrorCode::WatchdogTimeout`] if the stage has overrun its
/// budget.
pub fn watchdog_check_op(_router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: WatchdogCheckArgs = parse_args(args)?;
    let now = now_iso();
    tick::watchdog_check(&args.stage, &args.started_at, &now)?;
    Ok(json!({ "ok": true }))
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
    fn watchdog_check_rejects_an_overrun_stage() {
        let err = watchdog_check_op(
            &ToolRouter::for_tests(),
            json!({ "stage": "wave1", "started_at": "2020-01-01T00:00:00Z" }),
        )
        .expect_err("a stage started in 2020 has long since timed out");
        assert_eq!(err.code, ro_core::OrchErrorCode::WatchdogTimeout);
    }
}
