// ro-core/src/research/summary.rs
// ============================================================================
// Module: Summary Pack Assembly (C10, summary_pack_build)
// Description: Condenses validated wave outputs into a bounded summary pack.
// Purpose: Gate D checks the pack this module produces; boundedness
//          (per-entry and total KiB caps) is enforced here at construction
//          time rather than only detected afterward.
// Dependencies: crate::core
// ============================================================================

use crate::core::ManifestLimits;
use crate::core::artifacts::SummaryEntry;
use crate::core::artifacts::SummaryPack;
use crate::core::identifiers::PerspectiveId;

/// One perspective's validated output, as input to [`summary_pack_build`].
pub struct SummaryInput<'a> {
    /// Perspective this output belongs to.
    pub perspective_id: &'a PerspectiveId,
    /// Full wave output markdown to condense.
    pub markdown: &'a str,
    /// Citation cids this output referenced.
    pub cited: Vec<String>,
}

fn kib_len(text: &str) -> f64 {
    text.len() as f64 / 1024.0
}

/// Condenses `markdown` to at most `max_kb` KiB, taking whole lines from the
/// top until the next line would exceed the budget. Condensation prefers
/// losing trailing detail over truncating mid-line, which would risk
/// cutting a citation marker in half.
fn condense(markdown: &str, max_kb: u32) -> String {
    let budget_bytes = (f64::from(max_kb) * 1024.0) as usize;
    if markdown.len() <= budget_bytes {
        return markdown.to_string();
    }
    let mut out = String::new();
    for line in markdown.lines() {
        if out.len() + line.len() + 1 > budget_bytes {
            break;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Builds the summary pack from `expected` perspectives and the
/// [`SummaryInput`]s actually produced, per spec §4.5 (Gate D) and §4.9
/// ("Build summary pack").
///
/// Every expected perspective with no corresponding input is recorded in
/// `missing_perspectives` rather than causing an error; Gate D is the one
/// place that turns a non-empty `missing_perspectives` into a failure.
#[must_use]
pub fn summary_pack_build(
    expected: &[PerspectiveId],
    inputs: &[SummaryInput<'_>],
    limits: &ManifestLimits,
) -> SummaryPack {
    let mut entries = Vec::new();
    let mut missing_perspectives = Vec::new();

    for perspective_id in expected {
        match inputs.iter().find(|i| i.perspective_id == perspective_id) {
            Some(input) => {
                let condensed = condense(input.markdown, limits.max_summary_kb);
                entries.push(SummaryEntry {
                    perspective_id: perspective_id.clone(),
                    size_kb: kib_len(&condensed),
                    summary_md: condensed,
                    cited: input.cited.clone(),
                });
            }
            None => missing_perspectives.push(perspective_id.clone()),
        }
    }

    let total_size_kb = entries.iter().map(|e| e.size_kb).sum();

    SummaryPack {
        entries,
        total_size_kb,
        missing_perspectives,
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
    fn condenses_long_output_within_budget() {
        let perspective_id = PerspectiveId::new("p1");
        let long_markdown = "line one\n".repeat(500);
        let input = SummaryInput {
            perspective_id: &perspective_id,
            markdown: &long_markdown,
            cited: vec!["cid_abc".to_string()],
        };
        let limits = ManifestLimits {
            max_wave1_agents: 5,
            max_wave2_agents: 3,
            max_summary_kb: 1,
            max_total_summary_kb: 10,
            max_review_iterations: 2,
        };
        let pack = summary_pack_build(&[perspective_id.clone()], &[input], &limits);
        assert_eq!(pack.entries.len(), 1);
        assert!(pack.entries[0].size_kb <= 1.05);
        assert!(pack.missing_perspectives.is_empty());
    }

    #[test]
    fn missing_perspective_is_recorded_not_errored() {
        let present = PerspectiveId::new("p1");
        let missing = PerspectiveId::new("p2");
        let input = SummaryInput {
            perspective_id: &present,
            markdown: "short",
            cited: vec![],
        };
        let limits = ManifestLimits {
            max_wave1_agents: 5,
            max_wave2_agents: 3,
            max_summary_kb: 10,
            max_total_summary_kb: 50,
            max_review_iterations: 2,
        };
        let pack = summary_pack_build(&[present, missing.clone()], &[input], &limits);
        assert_eq!(pack.entries.len(), 1);
        assert_eq!(pack.missing_perspectives, vec![missing]);
    }
}
