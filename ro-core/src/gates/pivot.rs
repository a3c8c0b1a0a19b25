// ro-core/src/gates/pivot.rs
// ============================================================================
// Module: Pivot Decider (C8)
// Description: Deterministic gap extraction plus the Wave-2 requirement
//              rules that decide whether a second research wave runs.
// Purpose: Turn wave-1 outputs (and any explicit gaps) into a single,
//          reproducible decision of whether wave 2 is required and, if so,
//          which gaps it must address.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! [`pivot_decide`] implements spec §4.6. If the caller supplies no
//! explicit gaps, each wave-1 output's "Gaps" markdown section is parsed
//! for lines shaped `- (P[0-3]) <text>`. The four Wave-2 rules are
//! evaluated in order, first match wins; [`PivotDecisionOutcome::rule_hit`]
//! names exactly which one fired.

use std::collections::BTreeSet;

use serde_json::json;

use crate::core::artifacts::Gap;
use crate::core::artifacts::GapPriority;
use crate::core::artifacts::GapSource;
use crate::core::artifacts::PivotDecision;
use crate::core::artifacts::PivotDecisionOutcome;
use crate::core::error::OrchError;
use crate::core::error::OrchErrorCode;
use crate::core::identifiers::GapId;
use crate::core::identifiers::PerspectiveId;

/// One validated wave-1 output handed to the pivot decider.
pub struct PivotInput<'a> {
    /// Relative path of the output markdown, recorded in `wave1.outputs`.
    pub output_path: &'a str,
    /// Owning perspective id, used to derive parsed gap ids.
    pub perspective_id: &'a PerspectiveId,
    /// Output markdown text, scanned for a "Gaps" section when no explicit
    /// gaps are supplied.
    pub markdown: &'a str,
}

/// Parses the "## Gaps" section of `markdown` into [`Gap`] values.
///
/// # Errors
/// - [`OrchErrorCode::GapsSectionNotFound`] if no `## Gaps` heading exists.
/// - [`OrchErrorCode::GapsParseFailed`] if the section exists but contains
///   a non-blank line that does not match `- (P[0-3]) <text>`.
fn parse_gaps_section(
    perspective_id: &PerspectiveId,
    markdown: &str,
) -> Result<Vec<Gap>, OrchError> {
    let mut lines = markdown.lines();
    let found = loop {
        match lines.next() {
            Some(line) if line.trim() == "## Gaps" => break true,
            Some(_) => continue,
            None => break false,
        }
    };
    if !found {
        return Err(OrchError::with_details(
            OrchErrorCode::GapsSectionNotFound,
            "wave-1 output has no \"## Gaps\" section",
            json!({ "perspective_id": perspective_id.as_str() }),
        ));
    }

    let mut gaps = Vec::new();
    let mut ordinal = 0_u32;
    for line in lines {
        let trimmed = line.trim();
        if trimmed.starts_with("## ") {
            break;
        }
        if trimmed.is_empty() {
            continue;
        }
        let rest = trimmed.strip_prefix("- (").ok_or_else(|| gaps_parse_failed(perspective_id, trimmed))?;
        let (priority_token, rest) = rest
            .split_once(')')
            .ok_or_else(|| gaps_parse_failed(perspective_id, trimmed))?;
        let priority = GapPriority::parse(priority_token)
            .ok_or_else(|| gaps_parse_failed(perspective_id, trimmed))?;
        let text = rest.trim();
        if text.is_empty() {
            return Err(gaps_parse_failed(perspective_id, trimmed));
        }
        ordinal += 1;
        let tags = text
            .split_whitespace()
            .filter_map(|token| token.strip_prefix('#'))
            .map(str::to_string)
            .collect();
        gaps.push(Gap {
            gap_id: GapId::new(format!("gap_{perspective_id}_{ordinal}")),
            priority,
            text: text.to_string(),
            tags,
            source: GapSource::ParsedWave1,
        });
    }
    Ok(gaps)
}

fn gaps_parse_failed(perspective_id: &PerspectiveId, line: &str) -> OrchError {
    OrchError::with_details(
        OrchErrorCode::GapsParseFailed,
        "a line in the \"## Gaps\" section did not match \"- (P[0-3]) <text>\"",
        json!({ "perspective_id": perspective_id.as_str(), "line": line }),
    )
}

fn priority_rank(priority: GapPriority) -> u8 {
    match priority {
        GapPriority::P0 => 0,
        GapPriority::P1 => 1,
        GapPriority::P2 => 2,
        GapPriority::P3 => 3,
    }
}

/// Applies the Wave-2 requirement rules to an already-collected gap list,
/// first match wins.
fn decide(gaps: &[Gap]) -> PivotDecisionOutcome {
    let p0_count = gaps.iter().filter(|g| g.priority == GapPriority::P0).count();
    let p1_count = gaps.iter().filter(|g| g.priority == GapPriority::P1).count();
    let p2_count = gaps.iter().filter(|g| g.priority == GapPriority::P2).count();
    let total = gaps.len();

    let mut metrics = std::collections::BTreeMap::new();
    metrics.insert("p0_count".to_string(), json!(p0_count));
    metrics.insert("p1_count".to_string(), json!(p1_count));
    metrics.insert("p2_count".to_string(), json!(p2_count));
    metrics.insert("total_gaps".to_string(), json!(total));

    let (wave2_required, rule_hit, explanation) = if p0_count >= 1 {
        (
            true,
            "Wave2Required.P0",
            format!("{p0_count} P0 gap(s) present; wave 2 is required"),
        )
    } else if p1_count >= 2 {
        (
            true,
            "Wave2Required.P1",
            format!("{p1_count} P1 gaps present; wave 2 is required"),
        )
    } else if total >= 4 && (p1_count + p2_count) >= 3 {
        (
            true,
            "Wave2Required.Volume",
            format!(
                "{total} total gaps with {} P1/P2 gaps; wave 2 is required by volume",
                p1_count + p2_count
            ),
        )
    } else {
        (
            false,
            "Wave2Skip.NoGaps",
            "no gap combination met a Wave2Required rule".to_string(),
        )
    };

    let wave2_gap_ids = if wave2_required {
        let mut selected: Vec<&Gap> = gaps
            .iter()
            .filter(|g| matches!(g.priority, GapPriority::P0 | GapPriority::P1))
            .collect();
        if selected.is_empty() {
            selected = gaps.iter().take(3).collect();
        }
        let mut ids: Vec<GapId> = selected.into_iter().map(|g| g.gap_id.clone()).collect();
        ids.sort();
        ids
    } else {
        Vec::new()
    };

    PivotDecisionOutcome {
        wave2_required,
        rule_hit: rule_hit.to_string(),
        metrics,
        explanation,
        wave2_gap_ids,
    }
}

/// Builds the pivot decision from validated wave-1 outputs and optional
/// explicit gaps, per spec §4.6.
///
/// When `explicit_gaps` is `Some` (even if empty by caller's deliberate
/// choice, signalled by passing `Some(vec![])`), those gaps are used
/// as-is. When `None`, every output's "## Gaps" section is parsed.
///
/// # Errors
/// - [`OrchErrorCode::GapsSectionNotFound`] / [`OrchErrorCode::GapsParseFailed`]
///   propagated from [`parse_gaps_section`].
/// - [`OrchErrorCode::DuplicateGapId`] if two gaps share a `gap_id`.
pub fn pivot_decide(
    outputs: &[PivotInput<'_>],
    explicit_gaps: Option<Vec<Gap>>,
) -> Result<PivotDecision, OrchError> {
    let mut gaps = match explicit_gaps {
        Some(gaps) => gaps,
        None => {
            let mut collected = Vec::new();
            for output in outputs {
                collected.extend(parse_gaps_section(output.perspective_id, output.markdown)?);
            }
            collected
        }
    };

    let mut seen = BTreeSet::new();
    for gap in &gaps {
        if !seen.insert(gap.gap_id.clone()) {
            return Err(OrchError::with_details(
                OrchErrorCode::DuplicateGapId,
                "two gaps share a gap_id",
                json!({ "gap_id": gap.gap_id.as_str() }),
            ));
        }
    }

    gaps.sort_by(|a, b| {
        priority_rank(a.priority)
            .cmp(&priority_rank(b.priority))
            .then_with(|| a.gap_id.cmp(&b.gap_id))
    });

    let decision = decide(&gaps);

    Ok(PivotDecision {
        wave1_outputs: outputs.iter().map(|o| o.output_path.to_string()).collect(),
        gaps,
        decision,
    })
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

    fn gap(id: &str, priority: GapPriority) -> Gap {
        Gap {
            gap_id: GapId::new(id),
            priority,
            text: "example gap".to_string(),
            tags: Vec::new(),
            source: GapSource::Explicit,
        }
    }

    #[test]
    fn p0_gap_requires_wave2() {
        let gaps = vec![gap("gap_p1_1", GapPriority::P0), gap("gap_p1_2", GapPriority::P2)];
        let decision = pivot_decide(&[], Some(gaps)).expect("decides");
        assert!(decision.decision.wave2_required);
        assert_eq!(decision.decision.rule_hit, "Wave2Required.P0");
        assert_eq!(decision.decision.wave2_gap_ids, vec![GapId::new("gap_p1_1")]);
    }

    #[test]
    fn only_p3_gaps_skip_wave2() {
        let gaps = vec![gap("gap_p1_1", GapPriority::P3), gap("gap_p1_2", GapPriority::P3)];
        let decision = pivot_decide(&[], Some(gaps)).expect("decides");
        assert!(!decision.decision.wave2_required);
        assert_eq!(decision.decision.rule_hit, "Wave2Skip.NoGaps");
        assert!(decision.decision.wave2_gap_ids.is_empty());
    }

    #[test]
    fn two_p1_gaps_require_wave2() {
        let gaps = vec![
            gap("gap_p1_1", GapPriority::P1),
            gap("gap_p1_2", GapPriority::P1),
        ];
        let decision = pivot_decide(&[], Some(gaps)).expect("decides");
        assert!(decision.decision.wave2_required);
        assert_eq!(decision.decision.rule_hit, "Wave2Required.P1");
    }

    #[test]
    fn volume_rule_fires_on_four_gaps_with_three_p1_p2() {
        let gaps = vec![
            gap("gap_p1_1", GapPriority::P1),
            gap("gap_p1_2", GapPriority::P2),
            gap("gap_p1_3", GapPriority::P2),
            gap("gap_p1_4", GapPriority::P3),
        ];
        let decision = pivot_decide(&[], Some(gaps)).expect("decides");
        assert!(decision.decision.wave2_required);
        assert_eq!(decision.decision.rule_hit, "Wave2Required.Volume");
    }

    #[test]
    fn duplicate_gap_id_is_rejected() {
        let gaps = vec![gap("gap_p1_1", GapPriority::P0), gap("gap_p1_1", GapPriority::P1)];
        let err = pivot_decide(&[], Some(gaps)).expect_err("must reject duplicate gap id");
        assert_eq!(err.code, OrchErrorCode::DuplicateGapId);
    }

    #[test]
    fn parses_gaps_section_from_markdown() {
        let perspective_id = PerspectiveId::new("p1");
        let markdown = "## Findings\ntext\n\n## Gaps\n- (P0) missing data #economics\n- (P2) another gap\n\n## Sources\n- https://example.com\n";
        let input = PivotInput {
            output_path: "wave-1/p1.md",
            perspective_id: &perspective_id,
            markdown,
        };
        let decision = pivot_decide(&[input], None).expect("parses");
        assert_eq!(decision.gaps.len(), 2);
        assert_eq!(decision.gaps[0].gap_id.as_str(), "gap_p1_1");
        assert_eq!(decision.gaps[0].tags, vec!["economics".to_string()]);
    }

    #[test]
    fn missing_gaps_section_is_an_error() {
        let perspective_id = PerspectiveId::new("p1");
        let markdown = "## Findings\ntext\n";
        let input = PivotInput {
            output_path: "wave-1/p1.md",
            perspective_id: &perspective_id,
            markdown,
        };
        let err = pivot_decide(&[input], None).expect_err("must require a Gaps section");
        assert_eq!(err.code, OrchErrorCode::GapsSectionNotFound);
    }
}
