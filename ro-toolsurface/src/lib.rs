// ro-toolsurface/src/lib.rs
// ============================================================================
// Module: Tool-Call Surface
// Description: The `(name, json) -> {ok:true,...} | {ok:false,error:{...}}`
//              dispatcher every external caller (CLI, host integration)
//              drives, plus the tick orchestrator's concrete phase loops.
// Purpose: Bind ro-core's pure domain functions and ro-citations' network
//          operations to the side effects (disk, the clock, `runAgent`) that
//          only this layer is allowed to touch.
// Dependencies: ro-core, ro-config, ro-citations, serde, serde_json,
//               thiserror, time, tracing
// ============================================================================

//! ## Overview
//! `ro-toolsurface` implements spec §6: one operation per named tool call,
//! each a thin wrapper over a [`ro_core`] or [`ro_citations`] function,
//! fronted by [`dispatch`]. [`tick`] composes those operations with
//! [`RunAgentDriver`] into the three concrete tick-phase loops spec §4.9
//! describes in the abstract. [`fixtures`] covers the supplemental
//! operator-facing operations (fixture replay, regression runs, quality
//! audits, dry-run seeding) that round out the control plane for operators
//! who are not driving it tick by tick.
//!
//! Module map:
//! - [`router`]: [`ToolRouter`], the per-process handle bundling resolved
//!   configuration, run-root resolution, and citation endpoints.
//! - [`paths`]: run-root-relative artifact paths, named once so every
//!   operation agrees on where an artifact lives.
//! - [`ops`]: one module per operation family, each a `(&ToolRouter, Value)
//!   -> Result<Value, OrchError>` wrapper.
//! - [`tick`]: the three tick-phase loops and the `RunAgentDriver`
//!   abstraction over the external `runAgent` collaborator.
//! - [`fixtures`]: fixture replay, regression runs, quality audits, and
//!   dry-run seeding.

pub mod fixtures;
pub mod ops;
pub mod paths;
pub mod router;
pub mod tick;

pub use router::ToolRouter;
pub use router::ToolRouterConfig;
pub use tick::AgentOutput;
pub use tick::RunAgentDriver;

use ro_core::OrchError;
use ro_core::OrchErrorCode;
use ro_core::tick::run_work_unit;
use serde_json::Value;
use serde_json::json;

/// Every operation name this surface answers, per spec §6.
pub const OPERATIONS: &[&str] = &[
    "run_init",
    "manifest_patch",
    "gates_patch",
    "stage_advance",
    "retry_record",
    "wave1_plan",
    "wave_output_ingest",
    "wave_output_validate",
    "pivot_decide",
    "citations_extract_urls",
    "citations_normalize",
    "citations_validate",
    "citations_render_md",
    "summary_pack_build",
    "synthesis_write",
    "review_factory_run",
    "revision_control",
    "gate_a_evaluate",
    "gate_b_evaluate",
    "gate_c_evaluate",
    "gate_d_evaluate",
    "gate_e_evaluate",
    "gate_f_evaluate",
    "fallback_offer",
    "telemetry_append",
    "tick_ledger_append",
    "watchdog_check",
    "fixture_replay",
    "regression_run",
    "quality_audit",
    "dry_run_seed",
];

/// Routes one tool call by name to its operation, applying the panic-catch
/// boundary from [`ro_core::tick::run_work_unit`] and wrapping the result in
/// the `{ok:true,...}` / `{ok:false,error:{...}}` envelope spec §6
/// mandates.
///
/// An unrecognized `name` yields `{ok:false,error:{code:"NOT_FOUND",...}}`
/// rather than a panic, since the name itself is caller-supplied input.
#[must_use]
pub fn dispatch(router: &ToolRouter, name: &str, args: Value) -> Value {
    let outcome: Result<Value, Value> = run_work_unit(name, || route(router, name, args));
    match outcome {
        Ok(value) => json!({ "ok": true, "result": value }),
        Err(envelope) => json!({ "ok": false, "error": envelope }),
    }
}

#[allow(
    clippy::too_many_lines,
    reason = "a single flat match is the clearest way to express the tool-call surface's name -> handler table"
)]
fn route(router: &ToolRouter, name: &str, args: Value) -> Result<Value, OrchError> {
    match name {
        "run_init" => ops::run::run_init(router, args),
        "manifest_patch" => ops::run::manifest_patch(router, args),
        "gates_patch" => ops::gates::gates_patch(router, args),
        "stage_advance" => ops::control::stage_advance_op(router, args),
        "retry_record" => ops::run::retry_record(router, args),
        "wave1_plan" => ops::wave::wave1_plan(router, args),
        "wave_output_ingest" => ops::wave::wave_output_ingest(router, args),
        "wave_output_validate" => ops::wave::wave_output_validate(router, args),
        "pivot_decide" => ops::wave::pivot_decide_op(router, args),
        "citations_extract_urls" => ops::citations::citations_extract_urls(router, args),
        "citations_normalize" => ops::citations::citations_normalize(router, args),
        "citations_validate" => ops::citations::citations_validate(router, args),
        "citations_render_md" => ops::citations::citations_render_md(router, args),
        "summary_pack_build" => ops::research::summary_pack_build_op(router, args),
        "synthesis_write" => ops::research::synthesis_write_op(router, args),
        "review_factory_run" => ops::research::review_factory_run_op(router, args),
        "revision_control" => ops::research::revision_control_op(router, args),
        "gate_a_evaluate" => ops::gates::gate_a_evaluate(router, args),
        "gate_b_evaluate" => ops::gates::gate_b_evaluate(router, args),
        "gate_c_evaluate" => ops::gates::gate_c_evaluate(router, args),
        "gate_d_evaluate" => ops::gates::gate_d_evaluate(router, args),
        "gate_e_evaluate" => ops::gates::gate_e_evaluate(router, args),
        "gate_f_evaluate" => ops::gates::gate_f_evaluate(router, args),
        "fallback_offer" => ops::control::fallback_offer(router, args),
        "telemetry_append" => ops::control::telemetry_append_op(router, args),
        "tick_ledger_append" => ops::control::tick_ledger_append_op(router, args),
        "watchdog_check" => ops::control::watchdog_check_op(router, args),
        "fixture_replay" => fixtures::fixture_replay(router, args),
        "regression_run" => fixtures::regression_run(router, args),
        "quality_audit" => fixtures::quality_audit(router, args),
        "dry_run_seed" => fixtures::dry_run_seed(router, args),
        other => Err(OrchError::with_details(
            OrchErrorCode::NotFound,
            format!("unknown tool call: {other}"),
            json!({ "name": other, "known_operations": OPERATIONS }),
        )),
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
    fn dispatch_reports_unknown_operation() {
        let router = ToolRouter::for_tests();
        let envelope = dispatch(&router, "not_a_real_op", json!({}));
        assert_eq!(envelope["ok"], json!(false));
        assert_eq!(envelope["error"]["code"], json!("NOT_FOUND"));
    }

    #[test]
    fn every_declared_operation_name_is_routed() {
        let router = ToolRouter::for_tests();
        for name in OPERATIONS {
            let envelope = dispatch(&router, name, json!({}));
            assert_ne!(
                envelope["error"]["code"],
                json!("NOT_FOUND"),
                "operation {name} is declared but not routed"
            );
        }
    }
}
