// ro-toolsurface/src/fixtures.rs
// ============================================================================
// Module: Operator Fixture Operations
// Description: `fixture_replay`, `regression_run`, `quality_audit`,
//              `dry_run_seed` — the supplemental operations that round out
//              the control plane for operators who are not driving the
//              pipeline tick by tick.
// Purpose: Let an operator seed a deterministic run, replay one recorded
//          wave output against the current validators, drive a whole run
//          end-to-end against a canned agent for regression testing, and
//          audit a run's artifacts for soft-gate and retry health without
//          mutating anything.
// Dependencies: ro-core, ro-citations
// ============================================================================

use std::path::Path;

use ro_citations::build_url_map;
use ro_citations::extract_urls;
use ro_citations::validate_dry_run;
use ro_core::OrchError;
use ro_core::core::CitationRecord;
use ro_core::core::GatesDocument;
use ro_core::core::Manifest;
use ro_core::core::RunId;
use ro_core::core::artifacts::GateStatus;
use ro_core::core::artifacts::Perspective;
use ro_core::core::artifacts::PerspectiveTrack;
use ro_core::core::artifacts::PromptContract;
use ro_core::core::artifacts::WaveOutputMeta;
use ro_core::core::identifiers::PerspectiveId;
use ro_core::gates::evaluators::WaveOutputForReview;
use ro_core::gates::evaluators::validate_wave_output;
use ro_core::store::read_json;
use ro_core::store::write_json_atomic;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::ops;
use crate::ops::now_iso;
use crate::ops::parse_args;
use crate::ops::to_value;
use crate::paths;
use crate::router::ToolRouter;
use crate::tick::AgentOutput;
use crate::tick::RunAgentDriver;
use crate::tick::orchestrator_run_post_pivot;
use crate::tick::orchestrator_run_post_summaries;
use crate::tick::orchestrator_run_pre_pivot;

fn read_manifest(run_root: &Path) -> Result<Manifest, OrchError> {
    read_json(&run_root.join(paths::MANIFEST))
}

fn read_gates(run_root: &Path) -> Result<GatesDocument, OrchError> {
    read_json(&run_root.join(paths::GATES))
}

/// `fixture_replay` arguments: one previously recorded wave output to
/// re-ingest and re-validate against the current validators.
#[derive(Debug, Deserialize)]
struct FixtureReplayArgs {
    run_id: String,
    perspective: Perspective,
    agent_type: String,
    markdown: String,
    prompt_digest: String,
}

/// `fixture_replay`: re-ingests a recorded `(perspective, markdown)` pair
/// through [`ops::wave::wave_output_ingest`] and immediately re-validates
/// it, so a fixture captured from a real agent run can be replayed against
/// today's prompt-contract rules without invoking `runAgent` again.
///
/// # Errors
/// Propagates [`ops::wave::wave_output_ingest`]'s path-containment and
/// write-failure categories.
pub fn fixture_replay(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: FixtureReplayArgs = parse_args(args)?;
    let ingested = ops::wave::wave_output_ingest(
        router,
        json!({
            "run_id": args.run_id,
            "perspective_id": args.perspective.id.as_str(),
            "agent_type": args.agent_type,
            "markdown": args.markdown,
            "prompt_digest": args.prompt_digest,
        }),
    )?;
    let meta: WaveOutputMeta = serde_json::from_value(ingested.clone())?;
    let output = WaveOutputForReview {
        perspective: &args.perspective,
        meta: &meta,
        markdown: &args.markdown,
    };
    let violations = validate_wave_output(&output);
    let codes: Vec<&'static str> = violations.iter().map(ro_core::gates::evaluators::WaveOutputViolation::code).collect();
    Ok(json!({
        "meta": to_value(&meta)?,
        "violations": codes,
        "clean": codes.is_empty(),
    }))
}

/// `dry_run_seed` arguments: a query and the perspectives to seed wave-1
/// with, each paired with its canned output markdown.
#[derive(Debug, Deserialize)]
struct DryRunSeedArgs {
    query_text: String,
    perspectives: Vec<DryRunPerspectiveArg>,
}

/// One seeded perspective: a `(perspective, markdown)` pair that
/// `dry_run_seed` ingests verbatim instead of invoking `runAgent`.
#[derive(Debug, Deserialize)]
struct DryRunPerspectiveArg {
    id: String,
    title: String,
    markdown: String,
}

/// `dry_run_seed`: creates a fresh `no_web`-sensitivity run, seeds a wave-1
/// plan from `perspectives`, ingests each perspective's canned markdown,
/// and validates any URLs it contains through [`validate_dry_run`] (spec
/// §4.7's "all three steps skipped" dry-run mode) rather than the offline
/// or online ladders. Gives operators a deterministic, network-free run
/// to exercise gates C-F against.
///
/// # Errors
/// Propagates [`ops::run::run_init`] and [`ops::wave::wave1_plan`]'s error
/// categories.
pub fn dry_run_seed(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: DryRunSeedArgs = parse_args(args)?;

    let perspectives: Vec<Perspective> = args
        .perspectives
        .iter()
        .map(|p| Perspective {
            id: PerspectiveId::new(p.id.clone()),
            title: p.title.clone(),
            track: PerspectiveTrack::Standard,
            agent_type: "dry_run_fixture".to_string(),
            prompt_contract: PromptContract {
                max_words: 5000,
                max_sources: 20,
                tool_budget: 10,
                must_include_sections: vec!["Findings".to_string(), "Sources".to_string()],
            },
        })
        .collect();

    let created = ops::run::run_init(
        router,
        json!({ "query_text": args.query_text, "sensitivity": "no_web" }),
    )?;
    let run_id = created["run_id"].as_str().unwrap_or_default().to_string();

    ops::wave::wave1_plan(router, json!({ "run_id": run_id, "perspectives": perspectives }))?;

    let run_root = router.run_root(&RunId::new(run_id.clone()));
    let mut documents = Vec::new();
    for seeded in &args.perspectives {
        ops::wave::wave_output_ingest(
            router,
            json!({
                "run_id": run_id,
                "perspective_id": seeded.id,
                "agent_type": "dry_run_fixture",
                "markdown": seeded.markdown,
                "prompt_digest": "dry_run",
            }),
        )?;
        documents.push(seeded.markdown.clone());
    }

    let urls: Vec<String> = documents.iter().flat_map(|doc| extract_urls(doc)).collect();
    let url_map = build_url_map(&urls)?;
    write_json_atomic(&paths::fixed(&run_root, paths::URL_MAP), &url_map)?;

    let now = now_iso();
    let mut citations: Vec<CitationRecord> = Vec::new();
    for item in &url_map.items {
        let record = validate_dry_run(&item.normalized_url, &item.url_original, &item.cid, &now);
        ro_core::store::append_jsonl_line(&paths::fixed(&run_root, paths::CITATIONS), &record)?;
        citations.push(record);
    }

    Ok(json!({
        "run_id": run_id,
        "perspectives": to_value(&perspectives)?,
        "url_map": to_value(&url_map)?,
        "citations": to_value(&citations)?,
    }))
}

/// A deterministic `runAgent` stand-in for [`regression_run`]: every
/// perspective gets a fixed findings/sources/gaps skeleton instead of a
/// real model call, so the same run produces byte-identical artifacts on
/// every replay.
struct FixtureDriver;

impl RunAgentDriver for FixtureDriver {
    fn run_agent(
        &self,
        _run_id: &RunId,
        _stage: &str,
        _run_root: &Path,
        perspective_id: &PerspectiveId,
        _agent_type: &str,
        _prompt_md: &str,
        _output_md: &str,
    ) -> Result<AgentOutput, OrchError> {
        Ok(AgentOutput {
            markdown: format!(
                "## Findings\nRegression fixture output for {perspective_id}.\n\n## Sources\n- https://example.com/{perspective_id}\n\n## Gaps\n"
            ),
            agent_run_id: None,
            started_at: None,
            finished_at: None,
            error: None,
        })
    }
}

/// `regression_run` arguments: a run already seeded with a wave-1 plan
/// (typically via `wave1_plan`) and ready to be driven through every tick
/// phase with [`FixtureDriver`] standing in for `runAgent`.
#[derive(Debug, Deserialize)]
struct RegressionRunArgs {
    run_id: String,
}

/// `regression_run`: drives `run_id` through [`orchestrator_run_pre_pivot`],
/// [`orchestrator_run_post_pivot`], and [`orchestrator_run_post_summaries`]
/// in sequence using [`FixtureDriver`], stopping early if any phase fails
/// to advance. Exists so the whole pipeline's gate/stage wiring can be
/// regression-tested without a live agent or network access.
///
/// # Errors
/// Propagates whichever phase's tick/gate/stage errors first.
pub fn regression_run(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: RegressionRunArgs = parse_args(args)?;
    let driver = FixtureDriver;

    let pre_pivot = orchestrator_run_pre_pivot(router, &args.run_id, &driver)?;
    let post_pivot = orchestrator_run_post_pivot(router, &args.run_id, &driver)?;
    let post_summaries = orchestrator_run_post_summaries(router, &args.run_id)?;

    let run_root = router.run_root(&RunId::new(args.run_id.clone()));
    let manifest = read_manifest(&run_root)?;

    Ok(json!({
        "run_id": args.run_id,
        "final_stage": manifest.stage.current.as_str(),
        "final_status": to_value(&manifest.status)?,
        "pre_pivot": pre_pivot,
        "post_pivot": post_pivot,
        "post_summaries": post_summaries,
    }))
}

/// `quality_audit` arguments.
#[derive(Debug, Deserialize)]
struct QualityAuditArgs {
    run_id: String,
}

/// `quality_audit`: a read-only sweep over a run's manifest and gates,
/// surfacing soft-gate warnings, hard-gate failures, and retry counts in
/// one report, without mutating any artifact.
///
/// # Errors
/// [`ro_core::OrchErrorCode::NotFound`] if the run's manifest or gates are
/// missing.
pub fn quality_audit(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: QualityAuditArgs = parse_args(args)?;
    let run_root = router.run_root(&RunId::new(args.run_id.clone()));
    let manifest = read_manifest(&run_root)?;
    let gates = read_gates(&run_root)?;

    let all_gates = [&gates.a, &gates.b, &gates.c, &gates.d, &gates.e, &gates.f];
    let failing: Vec<&str> = all_gates
        .iter()
        .filter(|g| g.status == GateStatus::Fail)
        .map(|g| g.id.as_str())
        .collect();
    let warning_gates: Vec<&str> = all_gates
        .iter()
        .filter(|g| g.status == GateStatus::Warn || !g.warnings.is_empty())
        .map(|g| g.id.as_str())
        .collect();
    let not_run: Vec<&str> = all_gates
        .iter()
        .filter(|g| g.status == GateStatus::NotRun)
        .map(|g| g.id.as_str())
        .collect();

    let retry_counts = manifest.metrics.get("retry_counts").cloned().unwrap_or_else(|| json!({}));

    Ok(json!({
        "run_id": args.run_id,
        "stage": manifest.stage.current.as_str(),
        "status": to_value(&manifest.status)?,
        "gates_failing": failing,
        "gates_with_warnings": warning_gates,
        "gates_not_run": not_run,
        "retry_counts": retry_counts,
        "failures": to_value(&manifest.failures)?,
        "healthy": failing.is_empty() && manifest.failures.is_empty(),
    }))
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
    fn dry_run_seed_produces_blocked_citations() {
        let router = ToolRouter::for_tests();
        let result = dry_run_seed(
            &router,
            json!({
                "query_text": "what happened",
                "perspectives": [{
                    "id": "p1",
                    "title": "Overview",
                    "markdown": "## Findings\nSee https://example.com/a.\n\n## Sources\n- https://example.com/a\n\n## Gaps\n",
                }],
            }),
        )
        .expect("seeds a dry run");
        let citations = result["citations"].as_array().expect("citations array");
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0]["status"], json!("blocked"));
    }

    #[test]
    fn quality_audit_reports_a_freshly_seeded_run_as_unevaluated() {
        let router = ToolRouter::for_tests();
        let created = ops::run::run_init(&router, json!({ "query_text": "x" })).expect("init");
        let run_id = created["run_id"].as_str().expect("run_id is a string").to_string();

        let audit = quality_audit(&router, json!({ "run_id": run_id })).expect("audits");
        assert_eq!(audit["gates_not_run"].as_array().expect("array").len(), 6);
        assert_eq!(audit["healthy"], json!(true));
    }

    #[test]
    fn regression_run_drives_a_seeded_run_through_wave1() {
        let router = ToolRouter::for_tests();
        let created = ops::run::run_init(
            &router,
            json!({ "query_text": "what happened", "sensitivity": "no_web" }),
        )
        .expect("init");
        let run_id = created["run_id"].as_str().expect("run_id is a string").to_string();
        ops::wave::wave1_plan(
            &router,
            json!({
                "run_id": run_id,
                "perspectives": [{
                    "id": "p1",
                    "title": "Overview",
                    "track": "standard",
                    "agent_type": "research_agent",
                    "prompt_contract": {
                        "max_words": 5000,
                        "max_sources": 20,
                        "tool_budget": 10,
                        "must_include_sections": ["Findings", "Sources"],
                    },
                }],
            }),
        )
        .expect("plans wave1");

        let result = regression_run(&router, json!({ "run_id": run_id })).expect("runs");
        assert_eq!(result["final_stage"], json!("pivot"));
    }
}
