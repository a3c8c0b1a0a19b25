// ro-core/src/stage/mod.rs
// ============================================================================
// Module: Stage Engine (C11)
// Description: The run's transition graph and the guarded `stage_advance`
//              decision function.
// Purpose: One place that knows which stage can follow which, what
//          artifacts and gate statuses a transition requires, and how to
//          disambiguate the two branch points (`pivot`, `review`).
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The stage graph, verbatim from spec §4.8:
//! ```text
//! init → wave1 → pivot → {wave2, citations} → (wave2 → citations) →
//!        summaries → synthesis → review → {synthesis, finalize}
//! ```
//! `pivot` and `review` are the only branch points; every other stage has
//! exactly one legal successor. [`stage_advance`] is a pure function over a
//! [`StageAdvanceInput`] snapshot — it never touches the filesystem, so the
//! tick orchestrator is responsible for actually persisting the manifest
//! patch it returns.

use serde_json::Value;
use serde_json::json;

use crate::core::artifacts::GateStatus;
use crate::core::artifacts::GatesDocument;
use crate::core::artifacts::Manifest;
use crate::core::artifacts::RevisionAction;
use crate::core::artifacts::RunStatus;
use crate::core::artifacts::StageHistoryEntry;
use crate::core::codec::inputs_digest;
use crate::core::error::OrchError;
use crate::core::error::OrchErrorCode;
use crate::core::identifiers::StageName;

/// Every stage name in the order `init` is expected to reach them.
pub const STAGE_NAMES: &[&str] = &[
    "init", "wave1", "pivot", "wave2", "citations", "summaries", "synthesis", "review",
    "finalize",
];

/// Returns the legal successor set for `current`, empty for `finalize`
/// (the only terminal stage).
#[must_use]
pub fn allowed_next(current: &str) -> &'static [&'static str] {
    match current {
        "init" => &["wave1"],
        "wave1" => &["pivot"],
        "pivot" => &["wave2", "citations"],
        "wave2" => &["citations"],
        "citations" => &["summaries"],
        "summaries" => &["synthesis"],
        "synthesis" => &["review"],
        "review" => &["synthesis", "finalize"],
        _ => &[],
    }
}

/// Inputs [`stage_advance`] needs beyond the manifest and gates themselves:
/// disambiguating artifacts for the two branch points, and prerequisite
/// artifact presence the gate statuses alone don't capture.
pub struct StageAdvanceInput<'a> {
    /// Current manifest.
    pub manifest: &'a Manifest,
    /// Current gates document.
    pub gates: &'a GatesDocument,
    /// Caller-supplied disambiguation, required only when the current stage
    /// has more than one legal successor.
    pub requested_next: Option<&'a str>,
    /// Reason recorded on the stage-history entry.
    pub reason: &'a str,
    /// Pivot decision's `wave2_required`, required when `current == pivot`.
    pub pivot_wave2_required: Option<bool>,
    /// Revision control's chosen action, required when `current == review`.
    pub revision_action: Option<RevisionAction>,
    /// Whether `summary_pack.json` exists, required for `summaries →
    /// synthesis`.
    pub summary_pack_present: bool,
    /// Current timestamp (ISO-8601), used for `stage.started_at` and the
    /// history entry.
    pub now: &'a str,
}

/// The outcome of a successful [`stage_advance`] call: the manifest patch
/// to persist via [`crate::store::mutators::manifest_write`], ready to be
/// merged under `expected_revision = manifest.revision`.
pub struct StageAdvanceOutcome {
    /// Stage the run is advancing to.
    pub to: StageName,
    /// `manifest` merge-patch fragment: `stage` and, when reaching
    /// `finalize`, `status`.
    pub manifest_patch: Value,
    /// Digest recorded on the stage-history entry and returned to the
    /// caller for audit purposes.
    pub inputs_digest: String,
}

fn gate_status(gates: &GatesDocument, id: &str) -> GateStatus {
    gates.get(id).map_or(GateStatus::NotRun, |g| g.status)
}

fn gate_blocked(stage: &str, gate_id: &str, status: GateStatus) -> OrchError {
    OrchError::with_details(
        OrchErrorCode::GateBlocked,
        format!("transition out of {stage} requires gate {gate_id} to pass"),
        json!({ "stage": stage, "gate_id": gate_id, "status": format!("{status:?}") }),
    )
}

/// Resolves the ambiguous successor of `current`, or errors when the
/// disambiguating artifact is missing or the decision blocks every legal
/// next stage.
fn disambiguate(current: &str, input: &StageAdvanceInput<'_>) -> Result<&'static str, OrchError> {
    match current {
        "pivot" => match input.pivot_wave2_required {
            Some(true) => Ok("wave2"),
            Some(false) => Ok("citations"),
            None => Err(OrchError::new(
                OrchErrorCode::MissingArtifact,
                "pivot decision is required to disambiguate the pivot stage",
            )),
        },
        "review" => match input.revision_action {
            Some(RevisionAction::Advance) => Ok("finalize"),
            Some(RevisionAction::Revise) => Ok("synthesis"),
            Some(RevisionAction::Escalate) => Err(OrchError::with_details(
                OrchErrorCode::GateBlocked,
                "revision control escalated; review-iteration cap reached",
                json!({ "stage": "review" }),
            )),
            None => Err(OrchError::new(
                OrchErrorCode::MissingArtifact,
                "a revision-control decision is required to disambiguate the review stage",
            )),
        },
        _ => Err(OrchError::new(
            OrchErrorCode::InvalidState,
            format!("{current} has exactly one legal successor; it is not ambiguous"),
        )),
    }
}

/// Checks the prerequisite artifacts and gate statuses for the transition
/// `from → to`, per spec §4.8 step 2.
fn check_prerequisites(from: &str, to: &str, input: &StageAdvanceInput<'_>) -> Result<(), OrchError> {
    match (from, to) {
        ("wave1", "pivot") => {
            let status = gate_status(input.gates, "B");
            if status != GateStatus::Pass {
                return Err(gate_blocked("wave1", "B", status));
            }
        }
        ("citations", "summaries") => {
            let status = gate_status(input.gates, "C");
            if status != GateStatus::Pass {
                return Err(gate_blocked("citations", "C", status));
            }
        }
        ("summaries", "synthesis") => {
            let status = gate_status(input.gates, "D");
            if status != GateStatus::Pass {
                return Err(gate_blocked("summaries", "D", status));
            }
            if !input.summary_pack_present {
                return Err(OrchError::with_details(
                    OrchErrorCode::MissingArtifact,
                    "summary_pack.json must exist before advancing to synthesis",
                    json!({ "artifact": "summary_pack.json" }),
                ));
            }
        }
        ("review", "finalize") => {
            let status = gate_status(input.gates, "E");
            if status != GateStatus::Pass {
                return Err(gate_blocked("review", "E", status));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Computes the next stage, applies its guards, and returns the manifest
/// patch needed to commit the transition, per spec §4.8.
///
/// # Errors
/// - [`OrchErrorCode::InvalidState`] if `current` is `finalize` (terminal).
/// - [`OrchErrorCode::RequestedNextNotAllowed`] if `requested_next` names a
///   stage that is not a legal successor of `current`.
/// - [`OrchErrorCode::MissingArtifact`] if an ambiguous stage's
///   disambiguating artifact (pivot decision, revision directives) is
///   absent, or a prerequisite artifact is missing.
/// - [`OrchErrorCode::GateBlocked`] if a required gate has not passed.
pub fn stage_advance(input: &StageAdvanceInput<'_>) -> Result<StageAdvanceOutcome, OrchError> {
    let current = input.manifest.stage.current.as_str();
    let candidates = allowed_next(current);
    if candidates.is_empty() {
        return Err(OrchError::with_details(
            OrchErrorCode::InvalidState,
            format!("{current} is a terminal stage with no successor"),
            json!({ "stage": current }),
        ));
    }

    let to = match input.requested_next {
        Some(requested) => {
            if !candidates.contains(&requested) {
                return Err(OrchError::with_details(
                    OrchErrorCode::RequestedNextNotAllowed,
                    format!("{requested} is not a legal successor of {current}"),
                    json!({ "current": current, "requested_next": requested, "allowed": candidates }),
                ));
            }
            requested
        }
        None if candidates.len() == 1 => candidates[0],
        None => disambiguate(current, input)?,
    };

    check_prerequisites(current, to, input)?;

    let digest_input = json!({
        "from": current,
        "to": to,
        "requested_next": input.requested_next,
        "manifest_revision": input.manifest.revision,
        "gates_revision": input.gates.revision,
        "gate_statuses": {
            "a": format!("{:?}", input.gates.a.status),
            "b": format!("{:?}", input.gates.b.status),
            "c": format!("{:?}", input.gates.c.status),
            "d": format!("{:?}", input.gates.d.status),
            "e": format!("{:?}", input.gates.e.status),
            "f": format!("{:?}", input.gates.f.status),
        },
    });
    let digest = inputs_digest(&digest_input)?;

    let mut history = input.manifest.stage.history.clone();
    history.push(StageHistoryEntry {
        from: StageName::new(current),
        to: StageName::new(to),
        ts: input.now.to_string(),
        reason: input.reason.to_string(),
        inputs_digest: digest.as_str().to_string(),
        gates_revision: input.gates.revision,
    });

    let status = if to == "finalize" {
        RunStatus::Completed
    } else {
        RunStatus::Running
    };

    Ok(StageAdvanceOutcome {
        to: StageName::new(to),
        manifest_patch: json!({
            "stage": {
                "current": to,
                "started_at": input.now,
                "history": history,
            },
            "status": status,
        }),
        inputs_digest: digest.as_str().to_string(),
    })
}

/// Counts `review → synthesis` transitions in `history`, the
/// `current_iteration` value revision control reasons over (spec §4.9).
#[must_use]
pub fn review_iteration_count(history: &[StageHistoryEntry]) -> u32 {
    u32::try_from(
        history
            .iter()
            .filter(|e| e.from.as_str() == "review" && e.to.as_str() == "synthesis")
            .count(),
    )
    .unwrap_or(u32::MAX)
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
    use crate::core::artifacts::GatesDocument;
    use crate::core::artifacts::Manifest;
    use crate::core::artifacts::ManifestArtifactPaths;
    use crate::core::artifacts::ManifestArtifacts;
    use crate::core::artifacts::ManifestLimits;
    use crate::core::artifacts::ManifestQuery;
    use crate::core::artifacts::ManifestStage;
    use crate::core::artifacts::QuerySensitivity;
    use crate::core::artifacts::RunMode;
    use crate::core::identifiers::RunId;

    fn fresh_manifest(stage: &str) -> Manifest {
        Manifest {
            schema_version: "manifest.v1".to_string(),
            run_id: RunId::new("run_1"),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            revision: 1,
            updated_at: "2026-01-01T00:00:00Z".to_string(),
            artifacts: ManifestArtifacts {
                root: "/runs/run_1".to_string(),
                paths: ManifestArtifactPaths {
                    manifest: "manifest.json".to_string(),
                    gates: "gates.json".to_string(),
                    perspectives: "perspectives.json".to_string(),
                },
            },
            mode: RunMode::Standard,
            status: RunStatus::Running,
            query: ManifestQuery {
                text: "example query".to_string(),
                constraints: None,
                sensitivity: QuerySensitivity::Normal,
            },
            stage: ManifestStage {
                current: StageName::new(stage),
                started_at: "2026-01-01T00:00:00Z".to_string(),
                last_progress_at: None,
                history: Vec::new(),
            },
            limits: ManifestLimits {
                max_wave1_agents: 5,
                max_wave2_agents: 3,
                max_summary_kb: 10,
                max_total_summary_kb: 50,
                max_review_iterations: 2,
            },
            metrics: std::collections::BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    fn fresh_gates() -> GatesDocument {
        GatesDocument::fresh(RunId::new("run_1"), "2026-01-01T00:00:00Z")
    }

    #[test]
    fn init_advances_to_wave1_unambiguously() {
        let manifest = fresh_manifest("init");
        let gates = fresh_gates();
        let outcome = stage_advance(&StageAdvanceInput {
            manifest: &manifest,
            gates: &gates,
            requested_next: None,
            reason: "plan ready",
            pivot_wave2_required: None,
            revision_action: None,
            summary_pack_present: false,
            now: "2026-01-01T00:01:00Z",
        })
        .expect("advances");
        assert_eq!(outcome.to.as_str(), "wave1");
    }

    #[test]
    fn wave1_to_pivot_requires_gate_b_pass() {
        let manifest = fresh_manifest("wave1");
        let gates = fresh_gates();
        let err = stage_advance(&StageAdvanceInput {
            manifest: &manifest,
            gates: &gates,
            requested_next: None,
            reason: "wave1 done",
            pivot_wave2_required: None,
            revision_action: None,
            summary_pack_present: false,
            now: "2026-01-01T00:01:00Z",
        })
        .expect_err("gate B has not run");
        assert_eq!(err.code, OrchErrorCode::GateBlocked);
    }

    #[test]
    fn pivot_requires_disambiguation() {
        let manifest = fresh_manifest("pivot");
        let gates = fresh_gates();
        let err = stage_advance(&StageAdvanceInput {
            manifest: &manifest,
            gates: &gates,
            requested_next: None,
            reason: "pivot decided",
            pivot_wave2_required: None,
            revision_action: None,
            summary_pack_present: false,
            now: "2026-01-01T00:01:00Z",
        })
        .expect_err("no pivot decision supplied");
        assert_eq!(err.code, OrchErrorCode::MissingArtifact);
    }

    #[test]
    fn pivot_routes_to_wave2_when_required() {
        let manifest = fresh_manifest("pivot");
        let gates = fresh_gates();
        let outcome = stage_advance(&StageAdvanceInput {
            manifest: &manifest,
            gates: &gates,
            requested_next: None,
            reason: "pivot decided",
            pivot_wave2_required: Some(true),
            revision_action: None,
            summary_pack_present: false,
            now: "2026-01-01T00:01:00Z",
        })
        .expect("routes to wave2");
        assert_eq!(outcome.to.as_str(), "wave2");
    }

    #[test]
    fn review_escalate_blocks_transition() {
        let manifest = fresh_manifest("review");
        let gates = fresh_gates();
        let err = stage_advance(&StageAdvanceInput {
            manifest: &manifest,
            gates: &gates,
            requested_next: None,
            reason: "review cap reached",
            pivot_wave2_required: None,
            revision_action: Some(RevisionAction::Escalate),
            summary_pack_present: false,
            now: "2026-01-01T00:01:00Z",
        })
        .expect_err("escalate must not advance");
        assert_eq!(err.code, OrchErrorCode::GateBlocked);
    }

    #[test]
    fn requested_next_outside_allowed_set_is_rejected() {
        let manifest = fresh_manifest("init");
        let gates = fresh_gates();
        let err = stage_advance(&StageAdvanceInput {
            manifest: &manifest,
            gates: &gates,
            requested_next: Some("finalize"),
            reason: "skip ahead",
            pivot_wave2_required: None,
            revision_action: None,
            summary_pack_present: false,
            now: "2026-01-01T00:01:00Z",
        })
        .expect_err("finalize is not a successor of init");
        assert_eq!(err.code, OrchErrorCode::RequestedNextNotAllowed);
    }

    #[test]
    fn finalize_is_terminal() {
        let manifest = fresh_manifest("finalize");
        let gates = fresh_gates();
        let err = stage_advance(&StageAdvanceInput {
            manifest: &manifest,
            gates: &gates,
            requested_next: None,
            reason: "done",
            pivot_wave2_required: None,
            revision_action: None,
            summary_pack_present: false,
            now: "2026-01-01T00:01:00Z",
        })
        .expect_err("finalize has no successor");
        assert_eq!(err.code, OrchErrorCode::InvalidState);
    }
}
