// ro-core/src/gates/evaluators.rs
// ============================================================================
// Module: Gate Evaluators (C7)
// Description: Pure functions Artifacts -> GateEvaluation for Gates A-F.
// Purpose: Each evaluator is a deterministic function of the artifacts it
//          is handed; none of them perform I/O themselves.
// Dependencies: crate::core, crate::gates::GateEvaluation
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde_json::Value;
use serde_json::json;

use crate::core::ManifestLimits;
use crate::core::artifacts::CitationRecord;
use crate::core::artifacts::GateStatus;
use crate::core::artifacts::Perspective;
use crate::core::artifacts::PerspectivesDocument;
use crate::core::artifacts::RetryDirectivesFile;
use crate::core::artifacts::ScopeDocument;
use crate::core::artifacts::SummaryPack;
use crate::core::artifacts::UrlMap;
use crate::core::artifacts::WaveOutputMeta;
use crate::core::artifacts::WavePlan;

use super::GateEvaluation;

const SCOPE_CONTRACT_MARKER: &str = "## Scope Contract";

/// Gate A: scope + perspectives + wave-1 plan alignment.
///
/// Passes iff no warnings are emitted: every perspective has a wave-1 plan
/// entry, the plan's entry count stays within `max_wave1_agents`, every
/// entry's prompt includes the scope-contract marker heading, and the
/// scope's query text matches the one perspectives were derived from.
#[must_use]
pub fn evaluate_gate_a(
    scope: &ScopeDocument,
    perspectives: &PerspectivesDocument,
    plan: &WavePlan,
    limits: &ManifestLimits,
) -> GateEvaluation {
    let mut warnings = Vec::new();

    if plan.entries.len() as u32 > limits.max_wave1_agents {
        warnings.push(format!(
            "wave1 plan has {} entries, exceeding max_wave1_agents={}",
            plan.entries.len(),
            limits.max_wave1_agents
        ));
    }

    let plan_ids: BTreeSet<&str> = plan.entries.iter().map(|e| e.perspective_id.as_str()).collect();
    for perspective in &perspectives.perspectives {
        if !plan_ids.contains(perspective.id.as_str()) {
            warnings.push(format!(
                "perspective {} has no corresponding wave1 plan entry",
                perspective.id
            ));
        }
    }

    for entry in &plan.entries {
        if !entry.prompt_md.contains(SCOPE_CONTRACT_MARKER) {
            warnings.push(format!(
                "wave1 plan entry for {} is missing the {SCOPE_CONTRACT_MARKER} heading",
                entry.perspective_id
            ));
        }
    }

    if scope.query_text.trim().is_empty() {
        warnings.push("scope query_text is empty".to_string());
    }

    let status = if warnings.is_empty() {
        GateStatus::Pass
    } else {
        GateStatus::Fail
    };

    let mut metrics = BTreeMap::new();
    metrics.insert("perspective_count".to_string(), json!(perspectives.perspectives.len()));
    metrics.insert("plan_entry_count".to_string(), json!(plan.entries.len()));

    GateEvaluation {
        status,
        metrics,
        artifacts: vec!["operator/scope.json".to_string(), "perspectives.json".to_string(), "wave-1/wave1-plan.json".to_string()],
        warnings,
        notes: None,
    }
}

/// A single wave-1 output as seen by Gate B: its owning perspective, its
/// sidecar metadata, and the markdown text it produced.
pub struct WaveOutputForReview<'a> {
    /// Perspective the output belongs to.
    pub perspective: &'a Perspective,
    /// Sidecar metadata written alongside the markdown.
    pub meta: &'a WaveOutputMeta,
    /// Output markdown text.
    pub markdown: &'a str,
}

/// A retryable wave-output validation failure code, per spec §4.9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveOutputViolation {
    /// A `must_include_sections` heading is missing.
    MissingRequiredSection,
    /// The output exceeds `max_words`.
    TooManyWords,
    /// The "Sources" section did not parse as a list.
    MalformedSources,
    /// The output cites more than `max_sources` distinct sources.
    TooManySources,
}

impl WaveOutputViolation {
    /// Returns the wire code string for this violation.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingRequiredSection => "MISSING_REQUIRED_SECTION",
            Self::TooManyWords => "TOO_MANY_WORDS",
            Self::MalformedSources => "MALFORMED_SOURCES",
            Self::TooManySources => "TOO_MANY_SOURCES",
        }
    }
}

/// Validates one wave-1 output's markdown against its perspective's prompt
/// contract, returning every violation found (empty if the output is
/// clean).
#[must_use]
pub fn validate_wave_output(output: &WaveOutputForReview<'_>) -> Vec<WaveOutputViolation> {
    let mut violations = Vec::new();
    let contract = &output.perspective.prompt_contract;

    for heading in &contract.must_include_sections {
        let marker = format!("## {heading}");
        if !output.markdown.contains(&marker) {
            violations.push(WaveOutputViolation::MissingRequiredSection);
        }
    }

    let word_count = output.markdown.split_whitespace().count() as u32;
    if word_count > contract.max_words {
        violations.push(WaveOutputViolation::TooManyWords);
    }

    match extract_sources_section(output.markdown) {
        Some(sources) => {
            if sources.len() as u32 > contract.max_sources {
                violations.push(WaveOutputViolation::TooManySources);
            }
        }
        None if output.markdown.contains("## Sources") => {
            violations.push(WaveOutputViolation::MalformedSources);
        }
        None => {}
    }

    violations
}

/// Extracts the bullet lines under a `## Sources` heading, if present.
fn extract_sources_section(markdown: &str) -> Option<Vec<String>> {
    let mut lines = markdown.lines();
    loop {
        let line = lines.next()?;
        if line.trim() == "## Sources" {
            break;
        }
    }
    let mut items = Vec::new();
    for line in lines {
        let trimmed = line.trim();
        if trimmed.starts_with("## ") {
            break;
        }
        if let Some(rest) = trimmed.strip_prefix("- ") {
            if rest.trim().is_empty() {
                return None;
            }
            items.push(rest.trim().to_string());
        }
    }
    Some(items)
}

/// Gate B: wave-1 output contracts. Passes iff no output has a validation
/// violation and no retry directives remain pending.
#[must_use]
pub fn evaluate_gate_b(
    outputs: &[WaveOutputForReview<'_>],
    retry_directives: &RetryDirectivesFile,
) -> GateEvaluation {
    let mut warnings = Vec::new();
    let mut violation_counts: BTreeMap<&'static str, u32> = BTreeMap::new();

    for output in outputs {
        for violation in validate_wave_output(output) {
            *violation_counts.entry(violation.code()).or_insert(0) += 1;
            warnings.push(format!(
                "{}: {}",
                output.perspective.id,
                violation.code()
            ));
        }
    }

    if !retry_directives.directives.is_empty() {
        warnings.push(format!(
            "{} retry directive(s) still pending",
            retry_directives.directives.len()
        ));
    }

    let status = if warnings.is_empty() {
        GateStatus::Pass
    } else {
        GateStatus::Fail
    };

    let metrics = violation_counts
        .into_iter()
        .map(|(code, count)| (code.to_lowercase(), json!(count)))
        .collect();

    GateEvaluation {
        status,
        metrics,
        artifacts: outputs.iter().map(|o| o.meta.output_md.clone()).collect(),
        warnings,
        notes: None,
    }
}

/// Gate C: citation validation rates over the deduplicated URL map.
///
/// Passes iff `validated_url_rate >= 0.9`, `invalid_url_rate <= 0.1`, and
/// `uncategorized_url_rate == 0`. When no URLs were extracted, the gate
/// passes vacuously (the rate invariant is undefined at zero denominator).
#[must_use]
pub fn evaluate_gate_c(url_map: &UrlMap, citations: &[CitationRecord]) -> GateEvaluation {
    let total = url_map.items.len();
    let mut metrics = BTreeMap::new();

    if total == 0 {
        metrics.insert("validated_url_rate".to_string(), json!(0.0));
        metrics.insert("invalid_url_rate".to_string(), json!(0.0));
        metrics.insert("uncategorized_url_rate".to_string(), json!(0.0));
        return GateEvaluation {
            status: GateStatus::Pass,
            metrics,
            artifacts: vec!["citations/url-map.json".to_string()],
            warnings: Vec::new(),
            notes: Some("no URLs extracted".to_string()),
        };
    }

    let by_cid: BTreeMap<&str, &CitationRecord> =
        citations.iter().map(|c| (c.cid.as_str(), c)).collect();

    let mut validated = 0_usize;
    let mut invalid = 0_usize;
    for item in &url_map.items {
        match by_cid.get(item.cid.as_str()).map(|record| record.status) {
            Some(crate::core::artifacts::CitationStatus::Valid) => validated += 1,
            Some(crate::core::artifacts::CitationStatus::Invalid) => invalid += 1,
            _ => {}
        }
    }
    // Paywalled, blocked, mismatch, and missing records all count as
    // uncategorized, so the three rates always sum to exactly 1.
    let uncategorized = total - validated - invalid;

    let validated_url_rate = validated as f64 / total as f64;
    let invalid_url_rate = invalid as f64 / total as f64;
    let uncategorized_url_rate = uncategorized as f64 / total as f64;

    metrics.insert("validated_url_rate".to_string(), json!(validated_url_rate));
    metrics.insert("invalid_url_rate".to_string(), json!(invalid_url_rate));
    metrics.insert(
        "uncategorized_url_rate".to_string(),
        json!(uncategorized_url_rate),
    );

    let mut warnings = Vec::new();
    if validated_url_rate < 0.9 {
        warnings.push(format!("validated_url_rate {validated_url_rate:.3} below 0.9"));
    }
    if invalid_url_rate > 0.1 {
        warnings.push(format!("invalid_url_rate {invalid_url_rate:.3} above 0.1"));
    }
    if uncategorized > 0 {
        warnings.push(format!("{uncategorized} URL(s) not yet categorized"));
    }

    let status = if warnings.is_empty() {
        GateStatus::Pass
    } else {
        GateStatus::Fail
    };

    GateEvaluation {
        status,
        metrics,
        artifacts: vec![
            "citations/url-map.json".to_string(),
            "citations/citations.jsonl".to_string(),
        ],
        warnings,
        notes: None,
    }
}

/// Gate D: summary pack completeness and boundedness.
#[must_use]
pub fn evaluate_gate_d(
    pack: &SummaryPack,
    expected_perspective_count: usize,
    limits: &ManifestLimits,
) -> GateEvaluation {
    let mut warnings = Vec::new();

    let ratio = if expected_perspective_count == 0 {
        1.0
    } else {
        pack.entries.len() as f64 / expected_perspective_count as f64
    };
    if ratio < 0.9 {
        warnings.push(format!("summary_count_ratio {ratio:.3} below 0.9"));
    }
    if !pack.missing_perspectives.is_empty() {
        warnings.push(format!(
            "{} perspective(s) missing a summary entry",
            pack.missing_perspectives.len()
        ));
    }
    for entry in &pack.entries {
        if entry.size_kb > f64::from(limits.max_summary_kb) {
            warnings.push(format!(
                "{} summary is {:.1}KB, exceeding max_summary_kb={}",
                entry.perspective_id, entry.size_kb, limits.max_summary_kb
            ));
        }
    }
    if pack.total_size_kb > f64::from(limits.max_total_summary_kb) {
        warnings.push(format!(
            "summary pack total {:.1}KB exceeds max_total_summary_kb={}",
            pack.total_size_kb, limits.max_total_summary_kb
        ));
    }

    let status = if warnings.is_empty() {
        GateStatus::Pass
    } else {
        GateStatus::Fail
    };

    let mut metrics = BTreeMap::new();
    metrics.insert("summary_count_ratio".to_string(), json!(ratio));
    metrics.insert("total_size_kb".to_string(), json!(pack.total_size_kb));

    GateEvaluation {
        status,
        metrics,
        artifacts: vec!["summaries/summary-pack.json".to_string()],
        warnings,
        notes: None,
    }
}

/// Required markdown headings for a synthesis document, per Gate E.
pub const SYNTHESIS_REQUIRED_HEADINGS: &[&str] = &["Findings", "Citations"];

/// Counts numeric-claim lines (lines containing a digit) that carry no
/// citation marker (`cid_` or a Markdown footnote reference `[^`).
fn count_uncited_numeric_claims(markdown: &str) -> u32 {
    markdown
        .lines()
        .filter(|line| line.chars().any(|c| c.is_ascii_digit()))
        .filter(|line| !line.contains("cid_") && !line.contains("[^"))
        .count() as u32
}

/// Gate E: synthesis markdown contract plus citation utilization.
///
/// Hard pass condition: zero uncited numeric claims and every required
/// heading present. Soft warnings (non-blocking): citation utilization
/// below 0.6, or duplicate-citation rate above 0.2.
#[must_use]
pub fn evaluate_gate_e(
    synthesis_markdown: &str,
    cited_cids: &[String],
    validated_citation_count: usize,
) -> GateEvaluation {
    let mut hard_violations = Vec::new();
    let mut warnings = Vec::new();

    let uncited = count_uncited_numeric_claims(synthesis_markdown);
    if uncited > 0 {
        hard_violations.push(format!("{uncited} uncited numeric claim(s)"));
    }

    for heading in SYNTHESIS_REQUIRED_HEADINGS {
        let marker = format!("## {heading}");
        if !synthesis_markdown.contains(&marker) {
            hard_violations.push(format!("missing required heading: {heading}"));
        }
    }

    let distinct_cited: BTreeSet<&str> = cited_cids.iter().map(String::as_str).collect();
    let utilization = if validated_citation_count == 0 {
        0.0
    } else {
        distinct_cited.len() as f64 / validated_citation_count as f64
    };
    if utilization < 0.6 {
        warnings.push(format!("LOW_CITATION_UTILIZATION: {utilization:.3}"));
    }

    let duplicate_rate = if cited_cids.is_empty() {
        0.0
    } else {
        (cited_cids.len() - distinct_cited.len()) as f64 / cited_cids.len() as f64
    };
    if duplicate_rate > 0.2 {
        warnings.push(format!("HIGH_DUPLICATE_CITATION_RATE: {duplicate_rate:.3}"));
    }

    let status = if hard_violations.is_empty() {
        GateStatus::Pass
    } else {
        GateStatus::Fail
    };

    let mut metrics = BTreeMap::new();
    metrics.insert("uncited_numeric_claims".to_string(), json!(uncited));
    metrics.insert("citation_utilization".to_string(), json!(utilization));
    metrics.insert("duplicate_citation_rate".to_string(), json!(duplicate_rate));

    GateEvaluation {
        status,
        metrics,
        artifacts: vec!["synthesis/final-synthesis.md".to_string()],
        warnings: hard_violations.into_iter().chain(warnings).collect(),
        notes: None,
    }
}

/// Gate F: final bundle/fallback hygiene.
///
/// Gate F's pass rules are not specified upstream (see DESIGN.md's Open
/// Questions). This evaluator only ever detects and reports hygiene
/// *failures* — a missing fallback summary when the run failed, or a
/// missing final synthesis when the run completed — and otherwise leaves
/// the gate in its default `not_run` state rather than inventing a pass
/// rule. Callers that receive `status: NotRun` back should not write it
/// into `gates.json` (a no-op evaluation).
#[must_use]
pub fn evaluate_gate_f(
    run_failed: bool,
    fallback_summary_present: bool,
    final_synthesis_present: bool,
) -> GateEvaluation {
    let mut warnings = Vec::new();

    if run_failed && !fallback_summary_present {
        warnings.push("run status is failed but logs/fallback-summary.md is missing".to_string());
    }
    if !run_failed && !final_synthesis_present {
        warnings.push("run did not fail but synthesis/final-synthesis.md is missing".to_string());
    }

    let status = if warnings.is_empty() {
        GateStatus::NotRun
    } else {
        GateStatus::Fail
    };

    GateEvaluation {
        status,
        metrics: BTreeMap::new(),
        artifacts: vec![],
        warnings,
        notes: None,
    }
}

#[allow(dead_code)]
fn _unused(_: Value) {}

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
    use crate::core::artifacts::CitationStatus;
    use crate::core::artifacts::UrlMapItem;

    fn url_map_item(cid: &str) -> UrlMapItem {
        UrlMapItem {
            url_original: format!("https://example.com/{cid}"),
            normalized_url: format!("https://example.com/{cid}"),
            cid: cid.to_string(),
        }
    }

    fn citation(cid: &str, status: CitationStatus) -> CitationRecord {
        CitationRecord {
            normalized_url: format!("https://example.com/{cid}"),
            cid: cid.to_string(),
            url: format!("https://example.com/{cid}"),
            url_original: format!("https://example.com/{cid}"),
            status,
            checked_at: "2026-01-01T00:00:00Z".to_string(),
            found_by: Vec::new(),
            notes: None,
            http_status: None,
            title: None,
            publisher: None,
            evidence_snippet: None,
        }
    }

    #[test]
    fn gate_c_rates_sum_to_one_with_paywalled_and_blocked_records() {
        let url_map = UrlMap {
            items: vec![
                url_map_item("cid_valid"),
                url_map_item("cid_invalid"),
                url_map_item("cid_paywalled"),
                url_map_item("cid_blocked"),
                url_map_item("cid_mismatch"),
            ],
        };
        let citations = vec![
            citation("cid_valid", CitationStatus::Valid),
            citation("cid_invalid", CitationStatus::Invalid),
            citation("cid_paywalled", CitationStatus::Paywalled),
            citation("cid_blocked", CitationStatus::Blocked),
            citation("cid_mismatch", CitationStatus::Mismatch),
        ];

        let evaluation = evaluate_gate_c(&url_map, &citations);

        let validated = evaluation.metrics["validated_url_rate"].as_f64().expect("number");
        let invalid = evaluation.metrics["invalid_url_rate"].as_f64().expect("number");
        let uncategorized = evaluation.metrics["uncategorized_url_rate"].as_f64().expect("number");

        assert!((validated - 0.2).abs() < f64::EPSILON);
        assert!((invalid - 0.2).abs() < f64::EPSILON);
        assert!((uncategorized - 0.6).abs() < f64::EPSILON);
        assert!((validated + invalid + uncategorized - 1.0).abs() < f64::EPSILON);
    }
}
