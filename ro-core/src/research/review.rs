// ro-core/src/research/review.rs
// ============================================================================
// Module: Reviewer Aggregation & Revision Control (C10)
// Description: Deterministic review-factory run over a synthesis draft and
//              the three-way revision control decision that follows it.
// Purpose: Replace an agent-driven reviewer with a reproducible reuse of
//          Gate E's hard-violation detection, then apply spec §4.9's
//          advance/revise/escalate branch.
// Dependencies: crate::core, crate::gates
// ============================================================================

use crate::core::artifacts::GateStatus;
use crate::core::artifacts::ReviewBundle;
use crate::core::artifacts::ReviewDecision;
use crate::core::artifacts::RevisionAction;
use crate::core::artifacts::RevisionDirectives;
use crate::gates::evaluators::evaluate_gate_e;

/// Runs the deterministic review factory over a synthesis draft.
///
/// The reviewer reuses [`evaluate_gate_e`]'s hard-violation detection
/// rather than an independent judgment call: a draft that would fail Gate E
/// is exactly a draft the review factory sends back for revision, so there
/// is no value in a second, separately-tuned pass/fail rule.
#[must_use]
pub fn review_factory_run(
    synthesis_markdown: &str,
    cited_cids: &[String],
    validated_citation_count: usize,
    reviewed_at: &str,
) -> ReviewBundle {
    let evaluation = evaluate_gate_e(synthesis_markdown, cited_cids, validated_citation_count);
    let decision = match evaluation.status {
        GateStatus::Pass => ReviewDecision::Pass,
        _ => ReviewDecision::ChangesRequired,
    };

    ReviewBundle {
        decision,
        findings: evaluation.warnings,
        reviewed_at: reviewed_at.to_string(),
    }
}

/// Inputs to [`revision_control`].
pub struct RevisionControlInput<'a> {
    /// The review bundle just produced by [`review_factory_run`].
    pub review: &'a ReviewBundle,
    /// Gate E's status for the same synthesis draft.
    pub gate_e_status: GateStatus,
    /// How many review iterations have completed, including this one.
    pub current_iteration: u32,
    /// The run's configured review-iteration cap (`manifest.limits.max_review_iterations`).
    pub max_review_iterations: u32,
}

/// Applies spec §4.9's three-way revision control branch:
///
/// 1. Review passed and Gate E passed → [`RevisionAction::Advance`].
/// 2. Otherwise, if the iteration cap is reached → [`RevisionAction::Escalate`].
/// 3. Otherwise → [`RevisionAction::Revise`], carrying the review's findings
///    forward as the next synthesis pass's change notes.
#[must_use]
pub fn revision_control(input: &RevisionControlInput<'_>) -> RevisionDirectives {
    let action = if input.review.decision == ReviewDecision::Pass
        && input.gate_e_status == GateStatus::Pass
    {
        RevisionAction::Advance
    } else if input.current_iteration >= input.max_review_iterations {
        RevisionAction::Escalate
    } else {
        RevisionAction::Revise
    };

    let findings = if action == RevisionAction::Advance {
        Vec::new()
    } else {
        input.review.findings.clone()
    };

    RevisionDirectives {
        action,
        current_iteration: input.current_iteration,
        findings,
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
    fn clean_synthesis_advances() {
        let markdown = "## Findings\nAll good cid_abc.\n\n## Citations\n- cid_abc\n";
        let review = review_factory_run(markdown, &["cid_abc".to_string()], 1, "2026-01-01T00:00:00Z");
        assert_eq!(review.decision, ReviewDecision::Pass);
        let directives = revision_control(&RevisionControlInput {
            review: &review,
            gate_e_status: GateStatus::Pass,
            current_iteration: 1,
            max_review_iterations: 3,
        });
        assert_eq!(directives.action, RevisionAction::Advance);
        assert!(directives.findings.is_empty());
    }

    #[test]
    fn uncited_claim_revises_under_cap() {
        let markdown = "## Findings\nRevenue grew 40%.\n\n## Citations\n";
        let review = review_factory_run(markdown, &[], 0, "2026-01-01T00:00:00Z");
        assert_eq!(review.decision, ReviewDecision::ChangesRequired);
        let directives = revision_control(&RevisionControlInput {
            review: &review,
            gate_e_status: GateStatus::Fail,
            current_iteration: 1,
            max_review_iterations: 3,
        });
        assert_eq!(directives.action, RevisionAction::Revise);
        assert!(!directives.findings.is_empty());
    }

    #[test]
    fn cap_reached_escalates() {
        let markdown = "## Findings\nRevenue grew 40%.\n\n## Citations\n";
        let review = review_factory_run(markdown, &[], 0, "2026-01-01T00:00:00Z");
        let directives = revision_control(&RevisionControlInput {
            review: &review,
            gate_e_status: GateStatus::Fail,
            current_iteration: 3,
            max_review_iterations: 3,
        });
        assert_eq!(directives.action, RevisionAction::Escalate);
    }
}
