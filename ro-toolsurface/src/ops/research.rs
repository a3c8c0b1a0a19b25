// ro-toolsurface/src/ops/research.rs
// ============================================================================
// Module: Summary/Synthesis/Review Operations
// Description: `summary_pack_build`, `synthesis_write`, `review_factory_run`,
//              `revision_control`.
// Purpose: Drive C10's summary/synthesis/review pipeline from JSON tool
//          calls.
// Dependencies: ro-core
// ============================================================================

use ro_core::OrchError;
use ro_core::core::CitationRecord;
use ro_core::core::ManifestLimits;
use ro_core::core::artifacts::GateStatus;
use ro_core::core::artifacts::ReviewBundle;
use ro_core::core::identifiers::PerspectiveId;
use ro_core::research::review::RevisionControlInput;
use ro_core::research::review::revision_control;
use ro_core::research::review::review_factory_run;
use ro_core::research::summary::SummaryInput;
use ro_core::research::summary::summary_pack_build;
use ro_core::research::synthesis::synthesis_write;
use serde::Deserialize;
use serde_json::Value;

use crate::ops::now_iso;
use crate::ops::parse_args;
use crate::ops::to_value;
use crate::router::ToolRouter;

/// One perspective's validated output, as supplied to `summary_pack_build`.
#[derive(Debug, Deserialize)]
struct SummaryInputArg {
    perspective_id: String,
    markdown: String,
    #[serde(default)]
    cited: Vec<String>,
}

/// `summary_pack_build` arguments.
#[derive(Debug, Deserialize)]
struct SummaryPackBuildArgs {
    expected: Vec<String>,
    inputs: Vec<SummaryInputArg>,
    limits: ManifestLimits,
}

/// `summary_pack_build`: runs [`summary_pack_build`](ro_core::research::summary::summary_pack_build)
/// over the expected perspective set and the outputs actually produced, per
/// spec §4.9.
///
/// # Errors
/// Never fails; missing perspectives are recorded, not rejected (Gate D is
/// the enforcement point).
pub fn summary_pack_build_op(_router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: SummaryPackBuildArgs = parse_args(args)?;
    let expected: Vec<PerspectiveId> = args.expected.into_iter().map(PerspectiveId::new).collect();
    let ids: Vec<PerspectiveId> = args.inputs.iter().map(|i| PerspectiveId::new(i.perspective_id.clone())).collect();
    let inputs: Vec<SummaryInput<'_>> = args
        .inputs
        .iter()
        .zip(&ids)
        .map(|(i, id)| SummaryInput {
            perspective_id: id,
            markdown: &i.markdown,
            cited: i.cited.clone(),
        })
        .collect();
    let pack = summary_pack_build(&expected, &inputs, &args.limits);
    to_value(&pack)
}

/// `synthesis_write` arguments.
#[derive(Debug, Deserialize)]
struct SynthesisWriteArgs {
    pack: ro_core::core::artifacts::SummaryPack,
    citations: Vec<CitationRecord>,
}

/// `synthesis_write`: runs [`synthesis_write`](ro_core::research::synthesis::synthesis_write)
/// over the summary pack and validated citations.
///
/// # Errors
/// Never fails; synthesis assembly is a pure, total function of its input.
pub fn synthesis_write_op(_router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: SynthesisWriteArgs = parse_args(args)?;
    let markdown = synthesis_write(&args.pack, &args.citations);
    Ok(serde_json::json!({ "markdown": markdown }))
}

/// `review_factory_run` arguments.
#[derive(Debug, Deserialize)]
struct ReviewFactoryRunArgs {
    synthesis_markdown: String,
    #[serde(default)]
    cited_cids: Vec<String>,
    validated_citation_count: usize,
}

/// `review_factory_run`: runs [`review_factory_run`](ro_core::research::review::review_factory_run)
/// over a synthesis draft, per spec §4.9.
///
/// # Errors
/// Never fails; an unacceptable draft is reported as findings, not a
/// tool-call error.
pub fn review_factory_run_op(_router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: ReviewFactoryRunArgs = parse_args(args)?;
    let now = now_iso();
    let review = review_factory_run(&args.synthesis_markdown, &args.cited_cids, args.validated_citation_count, &now);
    to_value(&review)
}

/// `revision_control` arguments.
#[derive(Debug, Deserialize)]
struct RevisionControlArgs {
    review: ReviewBundle,
    gate_e_status: GateStatus,
    current_iteration: u32,
    max_review_iterations: u32,
}

/// `revision_control`: runs [`revision_control`](ro_core::research::review::revision_control)'s
/// three-way advance/revise/escalate branch, per spec §4.9.
///
/// # Errors
/// Never fails; the branch is total over its input.
pub fn revision_control_op(_router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: RevisionControlArgs = parse_args(args)?;
    let directives = revision_control(&RevisionControlInput {
        review: &args.review,
        gate_e_status: args.gate_e_status,
        current_iteration: args.current_iteration,
        max_review_iterations: args.max_review_iterations,
    });
    to_value(&directives)
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
    fn summary_pack_build_records_missing_perspectives() {
        let result = summary_pack_build_op(
            &ToolRouter::for_tests(),
            json!({
                "expected": ["p1", "p2"],
                "inputs": [{ "perspective_id": "p1", "markdown": "hello", "cited": [] }],
                "limits": limits(),
            }),
        )
        .expect("builds");
        assert_eq!(result["missing_perspectives"], json!(["p2"]));
    }

    #[test]
    fn revision_control_escalates_at_the_cap() {
        let review = ReviewBundle {
            decision: ro_core::core::artifacts::ReviewDecision::ChangesRequired,
            findings: vec!["uncited claim".to_string()],
            reviewed_at: "2026-01-01T00:00:00Z".to_string(),
        };
        let result = revision_control_op(
            &ToolRouter::for_tests(),
            json!({
                "review": review,
                "gate_e_status": "fail",
                "current_iteration": 3,
                "max_review_iterations": 3,
            }),
        )
        .expect("decides");
        assert_eq!(result["action"], json!("escalate"));
    }
}
