// ro-toolsurface/src/ops/wave.rs
// ============================================================================
// Module: Wave / Pivot Operations
// Description: `wave1_plan`, `wave_output_ingest`, `wave_output_validate`,
//              `pivot_decide`.
// Purpose: Persist the wave plan and wave outputs, and run the pivot
//          decider over them.
// Dependencies: ro-core
// ============================================================================

use ro_core::OrchError;
use ro_core::core::Gap;
use ro_core::core::Perspective;
use ro_core::core::PerspectivesDocument;
use ro_core::core::RunId;
use ro_core::core::ScopeDocument;
use ro_core::core::WaveOutputMeta;
use ro_core::core::WavePlan;
use ro_core::core::WavePlanEntry;
use ro_core::core::identifiers::PerspectiveId;
use ro_core::gates::evaluators::WaveOutputForReview;
use ro_core::gates::evaluators::validate_wave_output;
use ro_core::gates::pivot::PivotInput;
use ro_core::gates::pivot::pivot_decide;
use ro_core::store::read_json;
use ro_core::store::write_json_atomic;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::ops::now_iso;
use crate::ops::parse_args;
use crate::ops::to_value;
use crate::paths;
use crate::router::ToolRouter;

/// `wave1_plan` arguments: the perspectives to plan for this run.
#[derive(Debug, Deserialize)]
struct Wave1PlanArgs {
    run_id: String,
    perspectives: Vec<Perspective>,
}

/// Renders the literal prompt text handed to the agent driver for one
/// perspective, per spec §4.3's "## Scope Contract" requirement (checked
/// verbatim by [`ro_core::gates::evaluators::evaluate_gate_a`]).
#[must_use]
pub(crate) fn build_prompt_md(scope: &ScopeDocument, perspective: &Perspective) -> String {
    let sections = perspective.prompt_contract.must_include_sections.join(", ");
    format!(
        "## Scope Contract\n{}\n\n## Perspective\n{} ({:?} track)\n\n## Instructions\nProduce cited findings as agent type \"{}\". \
         Stay within {} words and {} distinct sources. Include these sections: {sections}.\n",
        scope.query_text,
        perspective.title,
        perspective.track,
        perspective.agent_type,
        perspective.prompt_contract.max_words,
        perspective.prompt_contract.max_sources,
    )
}

/// `wave1_plan`: persists `perspectives.json` and `wave_plan.json` from a
/// caller-supplied perspective set, per spec §4.3. Each plan entry's
/// `prompt_md` is the literal prompt text the agent driver receives (not a
/// path), rendered from the run's `operator/scope.json`.
///
/// # Errors
/// [`ro_core::OrchErrorCode::NotFound`] if `operator/scope.json` has not
/// been written yet (it is created by `run_init`). Otherwise propagates
/// [`write_json_atomic`] failures.
pub fn wave1_plan(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: Wave1PlanArgs = parse_args(args)?;
    let run_root = router.run_root(&RunId::new(args.run_id));
    let scope: ScopeDocument = read_json(&paths::fixed(&run_root, paths::SCOPE))?;

    let entries: Vec<WavePlanEntry> = args
        .perspectives
        .iter()
        .map(|p| WavePlanEntry {
            perspective_id: p.id.clone(),
            gap_id: None,
            output_md: format!("{}/{}.md", paths::WAVE_OUTPUTS_DIR, p.id.as_str()),
            prompt_md: build_prompt_md(&scope, p),
        })
        .collect();
    let inputs_digest = ro_core::core::inputs_digest(&entries)?;

    let perspectives_doc = PerspectivesDocument { perspectives: args.perspectives };
    write_json_atomic(&paths::fixed(&run_root, paths::PERSPECTIVES), &perspectives_doc)?;

    let wave_plan = WavePlan {
        inputs_digest: inputs_digest.as_str().to_string(),
        entries,
    };
    write_json_atomic(&paths::fixed(&run_root, paths::WAVE_PLAN), &wave_plan)?;

    Ok(json!({
        "perspectives": to_value(&perspectives_doc)?,
        "wave_plan": to_value(&wave_plan)?,
    }))
}

/// `wave_output_ingest` arguments.
#[derive(Debug, Deserialize)]
struct WaveOutputIngestArgs {
    run_id: String,
    perspective_id: String,
    agent_type: String,
    markdown: String,
    prompt_digest: String,
    #[serde(default)]
    retry_count: u32,
}

/// `wave_output_ingest`: writes a wave output's markdown to `waves/<id>.md`
/// and returns its [`WaveOutputMeta`], per spec §4.3.
///
/// # Errors
/// [`ro_core::OrchErrorCode::PathTraversal`] if `perspective_id` escapes the
/// run root, or a write failure.
pub fn wave_output_ingest(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: WaveOutputIngestArgs = parse_args(args)?;
    let run_root = router.run_root(&RunId::new(args.run_id));
    let perspective_id = PerspectiveId::new(args.perspective_id);
    let output_path = paths::wave_output(&run_root, &perspective_id)?;
    let output_md = format!("{}/{}.md", paths::WAVE_OUTPUTS_DIR, perspective_id.as_str());

    ro_core::store::ensure_dir(&run_root.join(paths::WAVE_OUTPUTS_DIR))?;
    ro_core::store::write_bytes_atomic(&output_path, args.markdown.as_bytes())?;

    let meta = WaveOutputMeta {
        perspective_id,
        agent_type: args.agent_type,
        output_md,
        prompt_digest: args.prompt_digest,
        created_at: now_iso(),
        retry_count: args.retry_count,
    };
    to_value(&meta)
}

/// `wave_output_validate` arguments: an ingested output re-checked against
/// its [`ro_core::artifacts::PromptContract`].
#[derive(Debug, Deserialize)]
struct WaveOutputValidateArgs {
    perspective: Perspective,
    meta: WaveOutputMeta,
    markdown: String,
}

/// `wave_output_validate`: runs [`validate_wave_output`] and returns the
/// violations found (empty when the output is clean).
///
/// # Errors
/// [`ro_core::OrchErrorCode::MismatchedPerspectiveId`] if `meta.perspective_id`
/// does not match `perspective.id`. Otherwise never returns an error; an
/// invalid output is reported as violations, not a tool-call failure (Gate B
/// is what blocks the run).
pub fn wave_output_validate(_router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: WaveOutputValidateArgs = parse_args(args)?;
    if args.perspective.id != args.meta.perspective_id {
        return Err(OrchError::new(
            ro_core::OrchErrorCode::MismatchedPerspectiveId,
            format!(
                "wave output meta perspective_id {} does not match perspective {}",
                args.meta.perspective_id, args.perspective.id
            ),
        ));
    }
    let output = WaveOutputForReview {
        perspective: &args.perspective,
        meta: &args.meta,
        markdown: &args.markdown,
    };
    let violations = validate_wave_output(&output);
    let codes: Vec<&'static str> = violations.iter().map(ro_core::gates::evaluators::WaveOutputViolation::code).collect();
    Ok(json!({ "violations": codes, "clean": codes.is_empty() }))
}

/// `pivot_decide` arguments: each wave-1 output's markdown, and optional
/// explicit gaps overriding the parsed "## Gaps" sections.
#[derive(Debug, Deserialize)]
struct PivotDecideArgs {
    outputs: Vec<PivotOutputArg>,
    #[serde(default)]
    explicit_gaps: Option<Vec<Gap>>,
}

/// One wave-1 output supplied to `pivot_decide`.
#[derive(Debug, Deserialize)]
struct PivotOutputArg {
    output_path: String,
    perspective_id: String,
    markdown: String,
}

/// `pivot_decide`: runs [`pivot_decide`] (the core function) over the
/// supplied outputs, per spec §4.6.
///
/// # Errors
/// Propagates [`pivot_decide`]'s gap-parsing and duplicate-id errors.
pub fn pivot_decide_op(_router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: PivotDecideArgs = parse_args(args)?;
    let perspective_ids: Vec<PerspectiveId> = args
        .outputs
        .iter()
        .map(|o| PerspectiveId::new(o.perspective_id.clone()))
        .collect();
    let inputs: Vec<PivotInput<'_>> = args
        .outputs
        .iter()
        .zip(&perspective_ids)
        .map(|(o, id)| PivotInput {
            output_path: &o.output_path,
            perspective_id: id,
            markdown: &o.markdown,
        })
        .collect();
    let decision = pivot_decide(&inputs, args.explicit_gaps)?;
    to_value(&decision)
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

    fn perspective_json(id: &str) -> Value {
        json!({
            "id": id,
            "title": "Standard track",
            "track": "standard",
            "agent_type": "general",
            "prompt_contract": {
                "max_words": 2000,
                "max_sources": 10,
                "tool_budget": 5,
                "must_include_sections": ["Findings", "Sources", "Gaps"],
            },
        })
    }

    fn meta_json(perspective_id: &str) -> Value {
        json!({
            "perspective_id": perspective_id,
            "agent_type": "general",
            "output_md": "waves/p1.md",
            "prompt_digest": "sha256:deadbeef",
            "created_at": "2026-01-01T00:00:00Z",
            "retry_count": 0,
        })
    }

    #[test]
    fn wave_output_validate_rejects_mismatched_perspective_id() {
        let err = wave_output_validate(
            &ToolRouter::for_tests(),
            json!({
                "perspective": perspective_json("p1"),
                "meta": meta_json("p2"),
                "markdown": "## Findings\n\n## Sources\n\n## Gaps\n",
            }),
        )
        .expect_err("mismatched perspective id must be rejected");
        assert_eq!(err.code, ro_core::OrchErrorCode::MismatchedPerspectiveId);
    }

    #[test]
    fn wave_output_validate_accepts_matching_perspective_id() {
        let result = wave_output_validate(
            &ToolRouter::for_tests(),
            json!({
                "perspective": perspective_json("p1"),
                "meta": meta_json("p1"),
                "markdown": "## Findings\n\n## Sources\n\n## Gaps\n",
            }),
        )
        .expect("matching perspective id is accepted");
        assert_eq!(result["clean"], json!(true));
    }

    #[test]
    fn pivot_decide_op_parses_gaps_from_markdown() {
        let markdown = "# Output\n\n## Gaps\n- (P0) missing revenue breakdown\n";
        let result = pivot_decide_op(
            &ToolRouter::for_tests(),
            json!({
                "outputs": [{
                    "output_path": "waves/p1.md",
                    "perspective_id": "p1",
                    "markdown": markdown,
                }],
            }),
        )
        .expect("decides");
        assert_eq!(result["decision"]["wave2_required"], json!(true));
    }
}
