// ro-toolsurface/src/tick.rs
// ============================================================================
// Module: Tick Orchestrator (C12)
// Description: The `RunAgentDriver` collaborator contract and the three
//              concrete tick-phase loops spec §4.9 describes in the
//              abstract, plus their capped `orchestrator_run_*` wrappers.
// Purpose: Compose ro-core's pure stage/gate/pivot/summary functions with
//          the side effects (disk, the external agent driver) a tick
//          actually performs, under the run-lock and watchdog discipline
//          spec §4.9 mandates.
// Dependencies: ro-core, ro-citations
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use ro_core::OrchError;
use ro_core::OrchErrorCode;
use ro_core::core::GatesDocument;
use ro_core::core::Manifest;
use ro_core::core::PerspectivesDocument;
use ro_core::core::RetryDirectivesFile;
use ro_core::core::RunId;
use ro_core::core::RunStatus;
use ro_core::core::WavePlan;
use ro_core::core::artifacts::Gap;
use ro_core::core::artifacts::GapSource;
use ro_core::core::artifacts::Perspective;
use ro_core::core::artifacts::PerspectiveTrack;
use ro_core::core::artifacts::PivotDecision;
use ro_core::core::artifacts::PromptContract;
use ro_core::core::artifacts::SummaryPack;
use ro_core::core::artifacts::UrlMap;
use ro_core::core::artifacts::WaveOutputMeta;
use ro_core::core::artifacts::WavePlanEntry;
use ro_core::core::identifiers::PerspectiveId;
use ro_core::gates::evaluators::WaveOutputForReview;
use ro_core::gates::evaluators::validate_wave_output;
use ro_core::gates::pivot::PivotInput;
use ro_core::gates::pivot::pivot_decide;
use ro_core::store::RunLock;
use ro_core::store::read_json;
use ro_core::store::write_json_atomic;
use ro_core::tick::check_runnable;
use ro_core::tick::check_tick_cap;
use ro_core::tick::tick_cap;
use ro_core::tick::watchdog_check;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::ops;
use crate::ops::now_iso;
use crate::paths;
use crate::router::ToolRouter;

/// A lock lease this long, renewed by the caller's own heartbeat loop
/// (spec §4.9's "start heartbeat" step is the caller's responsibility
/// around suspension points; this module only acquires and releases).
const LEASE_SECONDS: u64 = 120;

/// The external agent driver's response, per spec §6: `{markdown,
/// agent_run_id?, started_at?, finished_at?, error?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    /// The rendered output markdown. Empty is treated as failure.
    pub markdown: String,
    /// The driver's own run id for this invocation, if it tracks one.
    #[serde(default)]
    pub agent_run_id: Option<String>,
    /// Driver-reported start timestamp.
    #[serde(default)]
    pub started_at: Option<String>,
    /// Driver-reported finish timestamp.
    #[serde(default)]
    pub finished_at: Option<String>,
    /// A structured error, if the driver failed outright.
    #[serde(default)]
    pub error: Option<Value>,
}

/// The external `runAgent` collaborator, per spec §6. Out of scope for this
/// crate to implement — callers (the CLI, a host integration, or a test
/// double) supply one.
pub trait RunAgentDriver {
    /// Invokes the agent for one perspective's wave output.
    ///
    /// # Errors
    /// Implementations may return an error for a transport-level failure;
    /// a driver-reported failure belongs in [`AgentOutput::error`] instead,
    /// since the orchestrator distinguishes the two (transport failure
    /// aborts the tick; a reported failure is `RUN_AGENT_FAILED`).
    fn run_agent(
        &self,
        run_id: &RunId,
        stage: &str,
        run_root: &Path,
        perspective_id: &PerspectiveId,
        agent_type: &str,
        prompt_md: &str,
        output_md: &str,
    ) -> Result<AgentOutput, OrchError>;
}

fn read_manifest(run_root: &Path) -> Result<Manifest, OrchError> {
    read_json(&paths::fixed(run_root, paths::MANIFEST))
}

fn read_gates(run_root: &Path) -> Result<GatesDocument, OrchError> {
    read_json(&paths::fixed(run_root, paths::GATES))
}

fn read_json_or_default<T: serde::de::DeserializeOwned + Default>(path: &Path) -> Result<T, OrchError> {
    if path.exists() {
        read_json(path)
    } else {
        Ok(T::default())
    }
}

/// Checks the run is runnable and not paused/cancelled, acquires the run
/// lock, and checks the current stage's watchdog budget. Entry discipline
/// shared by all three tick functions, per spec §4.9's "cross-phase
/// discipline".
fn enter_tick(run_root: &Path, manifest: &Manifest, reason: &str) -> Result<RunLock, OrchError> {
    check_runnable(manifest.status)?;
    let lock = RunLock::acquire(run_root, LEASE_SECONDS, reason)?;
    let now = now_iso();
    watchdog_check(manifest.stage.current.as_str(), &manifest.stage.started_at, &now)?;
    Ok(lock)
}

fn ensure_wave_output(
    router: &ToolRouter,
    driver: &dyn RunAgentDriver,
    run_id: &RunId,
    run_root: &Path,
    stage: &str,
    perspective: &Perspective,
    entry: &WavePlanEntry,
) -> Result<(WaveOutputMeta, String), OrchError> {
    let output_path = paths::wave_output(run_root, &entry.perspective_id)?;
    if !output_path.exists() {
        let prompt_digest = ro_core::core::sha256_hex_lower(entry.prompt_md.as_bytes());
        let agent_output = driver.run_agent(
            run_id,
            stage,
            run_root,
            &entry.perspective_id,
            &perspective.agent_type,
            &entry.prompt_md,
            &entry.output_md,
        )?;
        if agent_output.error.is_some() || agent_output.markdown.trim().is_empty() {
            return Err(OrchError::with_details(
                OrchErrorCode::RunAgentFailed,
                format!("runAgent failed for perspective {}", entry.perspective_id),
                json!({ "perspective_id": entry.perspective_id.as_str(), "error": agent_output.error }),
            ));
        }
        ops::wave::wave_output_ingest(
            router,
            json!({
                "run_id": run_id.as_str(),
                "perspective_id": entry.perspective_id.as_str(),
                "agent_type": perspective.agent_type,
                "markdown": agent_output.markdown,
                "prompt_digest": prompt_digest,
                "retry_count": 0,
            }),
        )?;
    }
    let markdown = std::fs::read_to_string(&output_path).map_err(|err| {
        OrchError::new(OrchErrorCode::NotFound, format!("failed to read wave output: {err}"))
    })?;
    let meta = WaveOutputMeta {
        perspective_id: entry.perspective_id.clone(),
        agent_type: perspective.agent_type.clone(),
        output_md: entry.output_md.clone(),
        prompt_digest: ro_core::core::sha256_hex_lower(markdown.as_bytes()),
        created_at: now_iso(),
        retry_count: 0,
    };
    Ok((meta, markdown))
}

/// One pre-pivot tick: runs every still-missing wave-1 agent, validates
/// every output, evaluates Gate B, and — if it passes — advances `init` (if
/// still there) and `wave1 → pivot`, per spec §4.9's "Pre-pivot" phase.
///
/// # Errors
/// [`OrchErrorCode::Paused`]/[`OrchErrorCode::Cancelled`] if the run is not
/// runnable; [`OrchErrorCode::RunAgentFailed`] if a driver call fails
/// outright; [`OrchErrorCode::RetryCapExhausted`] if a retryable violation
/// exhausts Gate B's retry budget; [`OrchErrorCode::GateBlocked`] if Gate B
/// still fails after retries are recorded.
pub fn orchestrator_tick_live(router: &ToolRouter, run_id: &str, driver: &dyn RunAgentDriver) -> Result<Value, OrchError> {
    let run_id = RunId::new(run_id);
    let run_root = router.run_root(&run_id);
    let mut manifest = read_manifest(&run_root)?;
    let _lock = enter_tick(&run_root, &manifest, "orchestrator_tick_live")?;

    let plan: WavePlan = read_json(&paths::fixed(&run_root, paths::WAVE_PLAN))?;
    let perspectives: PerspectivesDocument = read_json(&paths::fixed(&run_root, paths::PERSPECTIVES))?;

    if manifest.stage.current.as_str() == "init" {
        let scope: ro_core::core::ScopeDocument = read_json(&paths::fixed(&run_root, paths::SCOPE))?;
        ops::gates::gate_a_evaluate(
            router,
            json!({
                "run_id": run_id.as_str(),
                "scope": scope,
                "perspectives": perspectives,
                "plan": plan,
                "limits": manifest.limits,
            }),
        )?;

        let advanced = ops::control::stage_advance_op(
            router,
            json!({
                "run_id": run_id.as_str(),
                "manifest": manifest,
                "gates": read_gates(&run_root)?,
                "reason": "wave-1 plan ready",
            }),
        )?;
        manifest = serde_json::from_value(advanced["manifest"].clone())?;
    }

    let mut retry_directives: RetryDirectivesFile = read_json_or_default(&paths::fixed(&run_root, paths::RETRY_DIRECTIVES))?;

    let mut reviews = Vec::new();
    for entry in &plan.entries {
        let perspective = perspectives
            .perspectives
            .iter()
            .find(|p| p.id == entry.perspective_id)
            .ok_or_else(|| {
                OrchError::with_details(
                    OrchErrorCode::MissingArtifact,
                    format!("no perspective entry for {}", entry.perspective_id),
                    json!({ "perspective_id": entry.perspective_id.as_str() }),
                )
            })?;
        let (meta, markdown) = ensure_wave_output(router, driver, &run_id, &run_root, "wave1", perspective, entry)?;
        reviews.push((perspective.clone(), meta, markdown));
    }

    let owned = reviews
        .iter()
        .map(|(perspective, meta, markdown)| WaveOutputForReview { perspective, meta, markdown })
        .collect::<Vec<_>>();

    for output in &owned {
        let violations = validate_wave_output(output);
        if violations.is_empty() {
            continue;
        }
        let change_note = violations.iter().map(|v| v.code()).collect::<Vec<_>>().join(",");
        let admission = ops::run::retry_record(
            router,
            json!({ "gate_id": "B", "change_note": change_note, "metrics": BTreeMap::<String, Value>::new() }),
        )?;
        retry_directives.directives.push(ro_core::core::artifacts::RetryDirective {
            perspective_id: output.perspective.id.clone(),
            gate_id: "B".into(),
            change_note,
            attempt: admission["attempt"].as_u64().unwrap_or(1) as u32,
        });
    }
    write_json_atomic(&paths::fixed(&run_root, paths::RETRY_DIRECTIVES), &retry_directives)?;

    let gate_b = ops::gates::gate_b_evaluate(
        router,
        json!({
            "run_id": run_id.as_str(),
            "outputs": owned.iter().map(|o| json!({
                "perspective": o.perspective,
                "meta": o.meta,
                "markdown": o.markdown,
            })).collect::<Vec<_>>(),
            "retry_directives": retry_directives,
        }),
    )?;

    if gate_b["b"]["status"] != json!("pass") {
        return Ok(json!({ "stage": manifest.stage.current.as_str(), "gate_b": gate_b, "advanced": false }));
    }

    let gates = read_gates(&run_root)?;
    let advanced = ops::control::stage_advance_op(
        router,
        json!({
            "run_id": run_id.as_str(),
            "manifest": manifest,
            "gates": gates,
            "reason": "gate B passed",
        }),
    )?;
    Ok(json!({ "stage": advanced["to"], "gate_b": gate_b, "advanced": true }))
}

fn gap_perspective(gap: &Gap) -> Perspective {
    Perspective {
        id: PerspectiveId::new(format!("gap_{}", gap.gap_id.as_str())),
        title: format!("Gap follow-up: {}", gap.text),
        track: PerspectiveTrack::Independent,
        agent_type: "wave2_gap_follow_up".to_string(),
        prompt_contract: PromptContract {
            max_words: 1200,
            max_sources: 10,
            tool_budget: 5,
            must_include_sections: vec!["Findings".to_string(), "Sources".to_string()],
        },
    }
}

/// One post-pivot tick: resolves `pivot` (deciding and persisting
/// `pivot.json` if absent), then advances through `wave2` (if required) and
/// `citations`, per spec §4.9's "Post-pivot" phase.
///
/// # Errors
/// Same categories as [`orchestrator_tick_live`], plus whatever
/// [`ro_core::gates::pivot::pivot_decide`] and the citation ladder can
/// raise.
#[allow(clippy::too_many_lines, reason = "one tick drives three sequential stages; splitting would scatter the lock/watchdog discipline across helpers that each need it")]
pub fn orchestrator_tick_post_pivot(router: &ToolRouter, run_id: &str, driver: &dyn RunAgentDriver) -> Result<Value, OrchError> {
    let run_id = RunId::new(run_id);
    let run_root = router.run_root(&run_id);
    let mut manifest = read_manifest(&run_root)?;
    let _lock = enter_tick(&run_root, &manifest, "orchestrator_tick_post_pivot")?;

    if manifest.stage.current.as_str() == "pivot" {
        let pivot_path = paths::fixed(&run_root, paths::PIVOT);
        let decision = if pivot_path.exists() {
            read_json::<PivotDecision>(&pivot_path)?.decision
        } else {
            let plan: WavePlan = read_json(&paths::fixed(&run_root, paths::WAVE_PLAN))?;
            let documents: Vec<(PerspectiveId, String)> = plan
                .entries
                .iter()
                .map(|e| {
                    let markdown = std::fs::read_to_string(run_root.join(&e.output_md)).unwrap_or_default();
                    (e.perspective_id.clone(), markdown)
                })
                .collect();
            let inputs: Vec<PivotInput<'_>> = plan
                .entries
                .iter()
                .zip(&documents)
                .map(|(e, (id, markdown))| PivotInput { output_path: &e.output_md, perspective_id: id, markdown })
                .collect();
            let pivot = pivot_decide(&inputs, None)?;
            write_json_atomic(&pivot_path, &pivot)?;
            pivot.decision.clone()
        };

        let gates = read_gates(&run_root)?;
        let advanced = ops::control::stage_advance_op(
            router,
            json!({
                "run_id": run_id.as_str(),
                "manifest": manifest,
                "gates": gates,
                "pivot_wave2_required": decision.wave2_required,
                "reason": "pivot decided",
            }),
        )?;
        manifest = serde_json::from_value(advanced["manifest"].clone())?;
    }

    if manifest.stage.current.as_str() == "wave2" {
        let pivot: PivotDecision = read_json(&paths::fixed(&run_root, paths::PIVOT))?;
        let gaps: Vec<&Gap> = pivot
            .decision
            .wave2_gap_ids
            .iter()
            .filter_map(|id| pivot.gaps.iter().find(|g| &g.gap_id == id))
            .take(manifest.limits.max_wave2_agents as usize)
            .collect();

        let mut perspectives_doc: PerspectivesDocument =
            read_json_or_default(&paths::fixed(&run_root, paths::PERSPECTIVES))?;
        let mut entries = Vec::new();
        for gap in &gaps {
            let perspective = gap_perspective(gap);
            let prompt_md = format!(
                "## Scope Contract\nFollow up on gap: {}\n\n## Instructions\nAddress the above gap with cited evidence.\n",
                gap.text
            );
            let entry = WavePlanEntry {
                perspective_id: perspective.id.clone(),
                gap_id: Some(gap.gap_id.clone()),
                output_md: format!("{}/{}.md", paths::WAVE2_OUTPUTS_DIR, perspective.id.as_str()),
                prompt_md,
            };
            std::fs::create_dir_all(run_root.join(paths::WAVE2_OUTPUTS_DIR)).ok();
            ensure_wave_output(router, driver, &run_id, &run_root, "wave2", &perspective, &entry)?;
            if !perspectives_doc.perspectives.iter().any(|p| p.id == perspective.id) {
                perspectives_doc.perspectives.push(perspective);
            }
            entries.push(entry);
        }
        write_json_atomic(&paths::fixed(&run_root, paths::PERSPECTIVES), &perspectives_doc)?;
        let inputs_digest = ro_core::core::inputs_digest(&entries)?;
        let wave2_plan = WavePlan { inputs_digest: inputs_digest.as_str().to_string(), entries };
        write_json_atomic(&paths::fixed(&run_root, paths::WAVE2_PLAN), &wave2_plan)?;
        let entries = wave2_plan.entries;

        let gates = read_gates(&run_root)?;
        let advanced = ops::control::stage_advance_op(
            router,
            json!({
                "run_id": run_id.as_str(),
                "manifest": manifest,
                "gates": gates,
                "reason": format!("wave-2 complete ({} gap(s) addressed)", entries.len()),
            }),
        )?;
        manifest = serde_json::from_value(advanced["manifest"].clone())?;
    }

    if manifest.stage.current.as_str() == "citations" {
        let plan: WavePlan = read_json(&paths::fixed(&run_root, paths::WAVE_PLAN))?;
        let mut documents = Vec::new();
        for entry in &plan.entries {
            documents.push(std::fs::read_to_string(run_root.join(&entry.output_md)).unwrap_or_default());
        }
        let wave2_plan_path = paths::fixed(&run_root, paths::WAVE2_PLAN);
        if wave2_plan_path.exists() {
            let wave2_plan: WavePlan = read_json(&wave2_plan_path)?;
            for entry in &wave2_plan.entries {
                documents.push(std::fs::read_to_string(run_root.join(&entry.output_md)).unwrap_or_default());
            }
        }
        let extracted = ops::citations::citations_extract_urls(router, json!({ "markdown_documents": documents }))?;
        let urls: Vec<String> = extracted["urls"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        ro_core::store::write_bytes_atomic(
            &paths::fixed(&run_root, paths::EXTRACTED_URLS),
            urls.join("\n").as_bytes(),
        )?;
        let url_map_value = ops::citations::citations_normalize(router, json!({ "urls": urls }))?;
        let url_map: UrlMap = serde_json::from_value(url_map_value.clone())?;
        write_json_atomic(&paths::fixed(&run_root, paths::URL_MAP), &url_map)?;

        let mut citations = Vec::new();
        for item in &url_map.items {
            let record = ops::citations::citations_validate(
                router,
                json!({
                    "normalized_url": item.normalized_url,
                    "url_original": item.url_original,
                    "cid": item.cid,
                }),
            )?;
            ro_core::store::append_jsonl_line(&paths::fixed(&run_root, paths::CITATIONS), &record)?;
            citations.push(record);
        }
        let citation_records: Vec<ro_core::core::CitationRecord> =
            citations.into_iter().map(serde_json::from_value).collect::<Result<_, _>>()?;

        let rendered = ops::citations::citations_render_md(
            router,
            json!({ "records": citation_records }),
        )?;
        let rendered_markdown = rendered["markdown"].as_str().unwrap_or_default();
        ro_core::store::write_bytes_atomic(
            &paths::fixed(&run_root, paths::VALIDATED_CITATIONS),
            rendered_markdown.as_bytes(),
        )?;

        let gate_c = ops::gates::gate_c_evaluate(
            router,
            json!({ "run_id": run_id.as_str(), "url_map": url_map, "citations": citation_records }),
        )?;

        if gate_c["c"]["status"] == json!("pass") {
            let gates: GatesDocument = read_gates(&run_root)?;
            let advanced = ops::control::stage_advance_op(
                router,
                json!({
                    "run_id": run_id.as_str(),
                    "manifest": manifest,
                    "gates": gates,
                    "reason": "gate C passed",
                }),
            )?;
            return Ok(json!({ "stage": advanced["to"], "gate_c": gate_c, "advanced": true }));
        }
        return Ok(json!({ "stage": manifest.stage.current.as_str(), "gate_c": gate_c, "advanced": false }));
    }

    Ok(json!({ "stage": manifest.stage.current.as_str(), "advanced": false }))
}

/// One post-summaries tick: builds the summary pack, writes synthesis, runs
/// the review factory, and applies revision control, advancing through
/// `summaries → synthesis → review → {synthesis | finalize}`, per spec
/// §4.9's "Post-summaries" phase.
///
/// # Errors
/// Same categories as [`orchestrator_tick_live`].
#[allow(clippy::too_many_lines, reason = "one tick drives three sequential stages; splitting would scatter the lock/watchdog discipline across helpers that each need it")]
pub fn orchestrator_tick_post_summaries(router: &ToolRouter, run_id: &str) -> Result<Value, OrchError> {
    let run_id = RunId::new(run_id);
    let run_root = router.run_root(&run_id);
    let mut manifest = read_manifest(&run_root)?;
    let _lock = enter_tick(&run_root, &manifest, "orchestrator_tick_post_summaries")?;

    if manifest.stage.current.as_str() == "summaries" {
        let plan: WavePlan = read_json(&paths::fixed(&run_root, paths::WAVE_PLAN))?;
        let citations: Vec<ro_core::core::CitationRecord> =
            ro_core::store::read_jsonl(&paths::fixed(&run_root, paths::CITATIONS)).unwrap_or_default();
        let cited_by_perspective: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let inputs: Vec<Value> = plan
            .entries
            .iter()
            .map(|e| {
                json!({
                    "perspective_id": e.perspective_id.as_str(),
                    "markdown": std::fs::read_to_string(run_root.join(&e.output_md)).unwrap_or_default(),
                    "cited": cited_by_perspective.get(e.perspective_id.as_str()).cloned().unwrap_or_default(),
                })
            })
            .collect();
        let expected: Vec<String> = plan.entries.iter().map(|e| e.perspective_id.as_str().to_string()).collect();

        let pack_value = ops::research::summary_pack_build_op(
            router,
            json!({ "expected": expected, "inputs": inputs, "limits": manifest.limits }),
        )?;
        let pack: SummaryPack = serde_json::from_value(pack_value.clone())?;
        write_json_atomic(&paths::fixed(&run_root, paths::SUMMARY_PACK), &pack)?;

        let gate_d = ops::gates::gate_d_evaluate(
            router,
            json!({
                "run_id": run_id.as_str(),
                "pack": pack,
                "expected_perspective_count": plan.entries.len(),
                "limits": manifest.limits,
            }),
        )?;

        if gate_d["d"]["status"] != json!("pass") {
            return Ok(json!({ "stage": manifest.stage.current.as_str(), "gate_d": gate_d, "advanced": false }));
        }

        let gates = read_gates(&run_root)?;
        let advanced = ops::control::stage_advance_op(
            router,
            json!({
                "run_id": run_id.as_str(),
                "manifest": manifest,
                "gates": gates,
                "summary_pack_present": true,
                "reason": "gate D passed",
            }),
        )?;
        manifest = serde_json::from_value(advanced["manifest"].clone())?;
    }

    if manifest.stage.current.as_str() == "synthesis" {
        let pack: SummaryPack = read_json(&paths::fixed(&run_root, paths::SUMMARY_PACK))?;
        let citations: Vec<ro_core::core::CitationRecord> =
            ro_core::store::read_jsonl(&paths::fixed(&run_root, paths::CITATIONS)).unwrap_or_default();
        let synthesis = ops::research::synthesis_write_op(router, json!({ "pack": pack, "citations": citations }))?;
        let markdown = synthesis["markdown"].as_str().unwrap_or_default().to_string();
        ro_core::store::write_bytes_atomic(&paths::fixed(&run_root, paths::SYNTHESIS), markdown.as_bytes())?;

        let gates = read_gates(&run_root)?;
        let advanced = ops::control::stage_advance_op(
            router,
            json!({
                "run_id": run_id.as_str(),
                "manifest": manifest,
                "gates": gates,
                "reason": "synthesis drafted",
            }),
        )?;
        manifest = serde_json::from_value(advanced["manifest"].clone())?;
    }

    if manifest.stage.current.as_str() == "review" {
        let synthesis_markdown = std::fs::read_to_string(paths::fixed(&run_root, paths::SYNTHESIS)).unwrap_or_default();
        let citations: Vec<ro_core::core::CitationRecord> =
            ro_core::store::read_jsonl(&paths::fixed(&run_root, paths::CITATIONS)).unwrap_or_default();
        let cited_cids: Vec<String> = citations
            .iter()
            .filter(|c| synthesis_markdown.contains(&c.cid))
            .map(|c| c.cid.clone())
            .collect();
        let validated_citation_count =
            citations.iter().filter(|c| c.status == ro_core::core::CitationStatus::Valid).count();

        let review = ops::research::review_factory_run_op(
            router,
            json!({
                "synthesis_markdown": synthesis_markdown,
                "cited_cids": cited_cids,
                "validated_citation_count": validated_citation_count,
            }),
        )?;
        write_json_atomic(&paths::fixed(&run_root, paths::REVIEW), &review)?;

        let gate_e = ops::gates::gate_e_evaluate(
            router,
            json!({
                "run_id": run_id.as_str(),
                "synthesis_markdown": synthesis_markdown,
                "cited_cids": cited_cids,
                "validated_citation_count": validated_citation_count,
            }),
        )?;
        let gate_e_status: ro_core::core::artifacts::GateStatus = serde_json::from_value(gate_e["e"]["status"].clone())?;

        let gates: GatesDocument = read_gates(&run_root)?;
        let current_iteration = ro_core::stage::review_iteration_count(&manifest.stage.history) + 1;
        let directives = ops::research::revision_control_op(
            router,
            json!({
                "review": review,
                "gate_e_status": gate_e_status,
                "current_iteration": current_iteration,
                "max_review_iterations": manifest.limits.max_review_iterations,
            }),
        )?;
        write_json_atomic(&paths::fixed(&run_root, paths::REVISION_DIRECTIVES), &directives)?;
        let action: ro_core::core::artifacts::RevisionAction = serde_json::from_value(directives["action"].clone())?;

        let advanced = ops::control::stage_advance_op(
            router,
            json!({
                "run_id": run_id.as_str(),
                "manifest": manifest,
                "gates": gates,
                "revision_action": action,
                "reason": "revision control decided",
            }),
        )?;
        return Ok(json!({ "stage": advanced["to"], "gate_e": gate_e, "revision": directives, "advanced": true }));
    }

    Ok(json!({ "stage": manifest.stage.current.as_str(), "advanced": false }))
}

/// Drives [`orchestrator_tick_live`] until the run leaves `wave1` (reaches
/// `pivot`) or an error (including [`OrchErrorCode::TickCapExceeded`])
/// occurs.
///
/// # Errors
/// Propagates [`orchestrator_tick_live`]'s errors, plus
/// [`OrchErrorCode::TickCapExceeded`] once the pre-pivot tick cap is spent.
pub fn orchestrator_run_pre_pivot(router: &ToolRouter, run_id: &str, driver: &dyn RunAgentDriver) -> Result<Value, OrchError> {
    run_capped_loop(router, run_id, "pre_pivot", "pivot", |index| {
        check_tick_cap("pre_pivot", index, tick_cap("pre_pivot").unwrap_or(10))?;
        orchestrator_tick_live(router, run_id, driver)
    })
}

/// Drives [`orchestrator_tick_post_pivot`] until the run leaves `citations`
/// (reaches `summaries`) or an error occurs.
///
/// # Errors
/// Propagates [`orchestrator_tick_post_pivot`]'s errors, plus
/// [`OrchErrorCode::TickCapExceeded`] once the post-pivot tick cap is spent.
pub fn orchestrator_run_post_pivot(router: &ToolRouter, run_id: &str, driver: &dyn RunAgentDriver) -> Result<Value, OrchError> {
    run_capped_loop(router, run_id, "post_pivot", "summaries", |index| {
        check_tick_cap("post_pivot", index, tick_cap("post_pivot").unwrap_or(8))?;
        orchestrator_tick_post_pivot(router, run_id, driver)
    })
}

/// Drives [`orchestrator_tick_post_summaries`] until the run reaches
/// `finalize` or an error occurs.
///
/// # Errors
/// Propagates [`orchestrator_tick_post_summaries`]'s errors, plus
/// [`OrchErrorCode::TickCapExceeded`] once the post-summaries tick cap is
/// spent.
pub fn orchestrator_run_post_summaries(router: &ToolRouter, run_id: &str) -> Result<Value, OrchError> {
    run_capped_loop(router, run_id, "post_summaries", "finalize", |index| {
        check_tick_cap("post_summaries", index, tick_cap("post_summaries").unwrap_or(6))?;
        orchestrator_tick_post_summaries(router, run_id)
    })
}

fn run_capped_loop(
    router: &ToolRouter,
    run_id: &str,
    phase: &str,
    target_stage: &str,
    mut tick: impl FnMut(u64) -> Result<Value, OrchError>,
) -> Result<Value, OrchError> {
    let run_root = router.run_root(&RunId::new(run_id.to_string()));
    let mut index = 0_u64;
    loop {
        let result = tick(index)?;
        index += 1;
        let manifest = read_manifest(&run_root)?;
        if manifest.stage.current.as_str() == target_stage {
            return Ok(json!({ "phase": phase, "ticks": index, "result": result }));
        }
        if result["advanced"] == json!(false) {
            return Ok(json!({ "phase": phase, "ticks": index, "result": result }));
        }
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

    struct StubDriver;

    impl RunAgentDriver for StubDriver {
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
                    "## Findings\n{perspective_id} has no notable findings.\n\n## Sources\n- https://example.com/{perspective_id}\n\n## Gaps\n"
                ),
                agent_run_id: None,
                started_at: None,
                finished_at: None,
                error: None,
            })
        }
    }

    fn perspective(id: &str) -> Perspective {
        Perspective {
            id: PerspectiveId::new(id),
            title: id.to_string(),
            track: PerspectiveTrack::Standard,
            agent_type: "research_agent".to_string(),
            prompt_contract: PromptContract {
                max_words: 5000,
                max_sources: 20,
                tool_budget: 10,
                must_include_sections: vec!["Findings".to_string(), "Sources".to_string()],
            },
        }
    }

    #[test]
    fn orchestrator_tick_live_advances_to_pivot_on_a_clean_run() {
        let router = ToolRouter::for_tests();
        let created = ops::run::run_init(&router, json!({ "query_text": "what happened", "sensitivity": "no_web" }))
            .expect("init");
        let run_id = created["run_id"].as_str().expect("run_id is a string").to_string();

        ops::wave::wave1_plan(
            &router,
            json!({ "run_id": run_id, "perspectives": [perspective("p1")] }),
        )
        .expect("plans wave 1");

        let result = orchestrator_tick_live(&router, &run_id, &StubDriver).expect("tick succeeds");
        assert_eq!(result["stage"], json!("pivot"));
        assert_eq!(result["advanced"], json!(true));
    }
}
