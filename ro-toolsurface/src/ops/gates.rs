// ro-toolsurface/src/ops/gates.rs
// ============================================================================
// Module: Gate Operations
// Description: `gates_patch` and `gate_a_evaluate`..`gate_f_evaluate`.
// Purpose: Evaluate Gates A-F over caller-supplied artifacts and persist the
//          result through `gates_write`.
// Dependencies: ro-core
// ============================================================================

use ro_core::OrchError;
use ro_core::core::CitationRecord;
use ro_core::core::ManifestLimits;
use ro_core::core::PerspectivesDocument;
use ro_core::core::RetryDirectivesFile;
use ro_core::core::RunId;
use ro_core::core::ScopeDocument;
use ro_core::core::SummaryPack;
use ro_core::core::UrlMap;
use ro_core::core::WaveOutputMeta;
use ro_core::core::WavePlan;
use ro_core::core::artifacts::Perspective;
use ro_core::core::inputs_digest;
use ro_core::gates::GateEvaluation;
use ro_core::gates::evaluators::WaveOutputForReview;
use ro_core::gates::evaluators::evaluate_gate_a;
use ro_core::gates::evaluators::evaluate_gate_b;
use ro_core::gates::evaluators::evaluate_gate_c;
use ro_core::gates::evaluators::evaluate_gate_d;
use ro_core::gates::evaluators::evaluate_gate_e;
use ro_core::gates::evaluators::evaluate_gate_f;
use ro_core::store::gates_write;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::ops::now_iso;
use crate::ops::parse_args;
use crate::ops::to_value;
use crate::paths;
use crate::router::ToolRouter;

/// `gates_patch` arguments: a raw per-gate merge-patch map, for callers
/// that already hold a [`GateEvaluation`] (used internally by the
/// `gate_*_evaluate` operations, and exposed directly for the `fallback`
/// and pivot paths that write Gate F/C outside the normal evaluators).
#[derive(Debug, Deserialize)]
struct GatesPatchArgs {
    run_id: String,
    update: Value,
    #[serde(default)]
    expected_revision: Option<u64>,
    reason: String,
}

/// `gates_patch`: applies a per-gate merge patch to `gates.json` via
/// [`gates_write`].
///
/// # Errors
/// Propagates [`gates_write`]'s error categories.
pub fn gates_patch(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: GatesPatchArgs = parse_args(args)?;
    let run_root = router.run_root(&RunId::new(args.run_id));
    let digest = inputs_digest(&args.update)?;
    let gates = gates_write(
        &paths::fixed(&run_root, paths::GATES),
        &paths::fixed(&run_root, paths::AUDIT_LOG),
        &args.update,
        digest.as_str(),
        args.expected_revision,
        &args.reason,
    )?;
    to_value(&gates)
}

/// Persists a single gate's [`GateEvaluation`] under `letter` (`"a"`..`"f"`)
/// and returns the updated gates document.
fn persist(
    router: &ToolRouter,
    run_id: String,
    letter: &str,
    evaluation: &GateEvaluation,
    expected_revision: Option<u64>,
    reason: &str,
) -> Result<Value, OrchError> {
    let run_root = router.run_root(&RunId::new(run_id));
    let checked_at = now_iso();
    let update = json!({ letter: evaluation.to_patch(&checked_at) });
    let digest = inputs_digest(&update)?;
    let gates = gates_write(
        &paths::fixed(&run_root, paths::GATES),
        &paths::fixed(&run_root, paths::AUDIT_LOG),
        &update,
        digest.as_str(),
        expected_revision,
        reason,
    )?;
    to_value(&gates)
}

/// `gate_a_evaluate` arguments.
#[derive(Debug, Deserialize)]
struct GateAArgs {
    run_id: String,
    scope: ScopeDocument,
    perspectives: PerspectivesDocument,
    plan: WavePlan,
    limits: ManifestLimits,
    #[serde(default)]
    expected_revision: Option<u64>,
}

/// `gate_a_evaluate`: runs [`evaluate_gate_a`] and persists the result.
///
/// # Errors
/// Propagates [`gates_write`]'s error categories.
pub fn gate_a_evaluate(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: GateAArgs = parse_args(args)?;
    let evaluation = evaluate_gate_a(&args.scope, &args.perspectives, &args.plan, &args.limits);
    persist(router, args.run_id, "a", &evaluation, args.expected_revision, "gate_a_evaluate")
}

/// One wave-1 output supplied to `gate_b_evaluate`.
#[derive(Debug, Deserialize)]
struct GateBOutputArg {
    perspective: Perspective,
    meta: WaveOutputMeta,
    markdown: String,
}

/// `gate_b_evaluate` arguments.
#[derive(Debug, Deserialize)]
struct GateBArgs {
    run_id: String,
    outputs: Vec<GateBOutputArg>,
    retry_directives: RetryDirectivesFile,
    #[serde(default)]
    expected_revision: Option<u64>,
}

/// `gate_b_evaluate`: runs [`evaluate_gate_b`] and persists the result.
///
/// # Errors
/// Propagates [`gates_write`]'s error categories.
pub fn gate_b_evaluate(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: GateBArgs = parse_args(args)?;
    let outputs: Vec<WaveOutputForReview<'_>> = args
        .outputs
        .iter()
        .map(|o| WaveOutputForReview {
            perspective: &o.perspective,
            meta: &o.meta,
            markdown: &o.markdown,
        })
        .collect();
    let evaluation = evaluate_gate_b(&outputs, &args.retry_directives);
    persist(router, args.run_id, "b", &evaluation, args.expected_revision, "gate_b_evaluate")
}

/// `gate_c_evaluate` arguments.
#[derive(Debug, Deserialize)]
struct GateCArgs {
    run_id: String,
    url_map: UrlMap,
    citations: Vec<CitationRecord>,
    #[serde(default)]
    expected_revision: Option<u64>,
}

/// `gate_c_evaluate`: runs [`evaluate_gate_c`] and persists the result.
///
/// # Errors
/// Propagates [`gates_write`]'s error categories.
pub fn gate_c_evaluate(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: GateCArgs = parse_args(args)?;
    let evaluation = evaluate_gate_c(&args.url_map, &args.citations);
    persist(router, args.run_id, "c", &evaluation, args.expected_revision, "gate_c_evaluate")
}

/// `gate_d_evaluate` arguments.
#[derive(Debug, Deserialize)]
struct GateDArgs {
    run_id: String,
    pack: SummaryPack,
    expected_perspective_count: usize,
    limits: ManifestLimits,
    #[serde(default)]
    expected_revision: Option<u64>,
}

/// `gate_d_evaluate`: runs [`evaluate_gate_d`] and persists the result.
///
/// # Errors
/// Propagates [`gates_write`]'s error categories.
pub fn gate_d_evaluate(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: GateDArgs = parse_args(args)?;
    let evaluation = evaluate_gate_d(&args.pack, args.expected_perspective_count, &args.limits);
    persist(router, args.run_id, "d", &evaluation, args.expected_revision, "gate_d_evaluate")
}

/// `gate_e_evaluate` arguments.
#[derive(Debug, Deserialize)]
struct GateEArgs {
    run_id: String,
    synthesis_markdown: String,
    cited_cids: Vec<String>,
    validated_citation_count: usize,
    #[serde(default)]
    expected_revision: Option<u64>,
}

/// `gate_e_evaluate`: runs [`evaluate_gate_e`] and persists the result.
///
/// # Errors
/// Propagates [`gates_write`]'s error categories.
pub fn gate_e_evaluate(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: GateEArgs = parse_args(args)?;
    let evaluation = evaluate_gate_e(&args.synthesis_markdown, &args.cited_cids, args.validated_citation_count);
    persist(router, args.run_id, "e", &evaluation, args.expected_revision, "gate_e_evaluate")
}

/// `gate_f_evaluate` arguments.
#[derive(Debug, Deserialize)]
struct GateFArgs {
    run_id: String,
    run_failed: bool,
    fallback_summary_present: bool,
    final_synthesis_present: bool,
    #[serde(default)]
    expected_revision: Option<u64>,
}

/// `gate_f_evaluate`: runs [`evaluate_gate_f`] and, if it reports a hygiene
/// failure, persists it. A clean evaluation (`status: not_run`) is returned
/// to the caller without being written, per [`evaluate_gate_f`]'s contract.
///
/// # Errors
/// Propagates [`gates_write`]'s error categories.
pub fn gate_f_evaluate(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: GateFArgs = parse_args(args)?;
    let evaluation = evaluate_gate_f(args.run_failed, args.fallback_summary_present, args.final_synthesis_present);
    if evaluation.status == ro_core::core::GateStatus::NotRun {
        let checked_at = now_iso();
        return Ok(json!({ "f": evaluation.to_patch(&checked_at), "persisted": false }));
    }
    persist(router, args.run_id, "f", &evaluation, args.expected_revision, "gate_f_evaluate")
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
    use ro_core::core::QuerySensitivity;
    use ro_core::core::artifacts::WavePlanEntry;

    fn limits() -> ManifestLimits {
        ManifestLimits {
            max_wave1_agents: 6,
            max_wave2_agents: 4,
            max_summary_kb: 32,
            max_total_summary_kb: 256,
            max_review_iterations: 3,
        }
    }

    #[test]
    fn gate_a_evaluate_persists_a_fail_when_entries_are_missing() {
        let router = ToolRouter::for_tests();
        let run_id = crate::ops::run::run_init(&router, json!({ "query_text": "x" }))
            .expect("init")["run_id"]
            .as_str()
            .expect("run_id is a string")
            .to_string();

        let scope = ScopeDocument {
            query_text: "x".to_string(),
            constraints: None,
            sensitivity: QuerySensitivity::Normal,
        };
        let perspectives = PerspectivesDocument { perspectives: Vec::new() };
        let plan = WavePlan {
            inputs_digest: "digest".to_string(),
            entries: Vec::<WavePlanEntry>::new(),
        };

        let result = gate_a_evaluate(
            &router,
            json!({
                "run_id": run_id,
                "scope": scope,
                "perspectives": perspectives,
                "plan": plan,
                "limits": limits(),
                "expected_revision": 1,
            }),
        )
        .expect("gate_a_evaluate succeeds");
        assert_eq!(result["a"]["status"], json!("fail"));
    }

    #[test]
    fn gate_f_evaluate_reports_not_run_without_persisting_when_clean() {
        let router = ToolRouter::for_tests();
        let result = gate_f_evaluate(
            &router,
            json!({
                "run_id": "run_does_not_exist",
                "run_failed": false,
                "fallback_summary_present": false,
                "final_synthesis_present": true,
            }),
        )
        .expect("gate_f_evaluate succeeds without touching disk");
        assert_eq!(result["persisted"], json!(false));
    }
}
