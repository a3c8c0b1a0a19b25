// ro-toolsurface/src/paths.rs
// ============================================================================
// Module: Run-Root Paths
// Description: Names every artifact's path relative to a run root, once, so
//              every operation wrapper agrees on where it lives.
// Purpose: Keep path literals out of the `ops::*` modules.
// Dependencies: std::path, ro-core
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use ro_core::OrchError;
use ro_core::core::identifiers::PerspectiveId;
use ro_core::core::path::resolve_contained_path;

/// `manifest.json`, relative to a run root.
pub const MANIFEST: &str = "manifest.json";
/// `gates.json`, relative to a run root.
pub const GATES: &str = "gates.json";
/// `perspectives.json`, relative to a run root.
pub const PERSPECTIVES: &str = "perspectives.json";
/// `operator/scope.json`, relative to a run root.
pub const SCOPE: &str = "operator/scope.json";
/// `wave-1/wave1-plan.json`, relative to a run root.
pub const WAVE_PLAN: &str = "wave-1/wave1-plan.json";
/// `wave-2/wave2-plan.json`, relative to a run root.
pub const WAVE2_PLAN: &str = "wave-2/wave2-plan.json";
/// `pivot.json`, relative to a run root.
pub const PIVOT: &str = "pivot.json";
/// `citations/extracted-urls.txt`, relative to a run root.
pub const EXTRACTED_URLS: &str = "citations/extracted-urls.txt";
/// `citations/url-map.json`, relative to a run root.
pub const URL_MAP: &str = "citations/url-map.json";
/// `citations/citations.jsonl`, relative to a run root.
pub const CITATIONS: &str = "citations/citations.jsonl";
/// `citations/validated-citations.md`, relative to a run root.
pub const VALIDATED_CITATIONS: &str = "citations/validated-citations.md";
/// `summaries/summary-pack.json`, relative to a run root.
pub const SUMMARY_PACK: &str = "summaries/summary-pack.json";
/// `synthesis/final-synthesis.md`, relative to a run root.
pub const SYNTHESIS: &str = "synthesis/final-synthesis.md";
/// `review/review-bundle.json`, relative to a run root.
pub const REVIEW: &str = "review/review-bundle.json";
/// `review/revision-directives.json`, relative to a run root.
pub const REVISION_DIRECTIVES: &str = "review/revision-directives.json";
/// `retry/retry-directives.json`, relative to a run root.
pub const RETRY_DIRECTIVES: &str = "retry/retry-directives.json";
/// `logs/audit.jsonl`, relative to a run root.
pub const AUDIT_LOG: &str = "logs/audit.jsonl";
/// `logs/telemetry.jsonl`, relative to a run root.
pub const TELEMETRY_STREAM: &str = "logs/telemetry.jsonl";
/// `logs/telemetry.index.json`, relative to a run root.
pub const TELEMETRY_INDEX: &str = "logs/telemetry.index.json";
/// `logs/ticks.jsonl`, relative to a run root.
pub const TICK_LEDGER: &str = "logs/ticks.jsonl";
/// `wave-1/` subdirectory holding one output file per wave-1 perspective.
pub const WAVE_OUTPUTS_DIR: &str = "wave-1";
/// `wave-2/` subdirectory holding one output file per wave-2 gap follow-up.
pub const WAVE2_OUTPUTS_DIR: &str = "wave-2";
/// `logs/fallback-summary.md`, relative to a run root.
pub const FALLBACK_SUMMARY: &str = "logs/fallback-summary.md";

/// Resolves `relative` under `run_root`, for the fixed path constants this
/// module owns — these are never attacker-controlled, so this is infallible
/// in practice but still goes through the same containment check as
/// caller-supplied paths for uniformity.
#[must_use]
pub fn fixed(run_root: &Path, relative: &str) -> PathBuf {
    run_root.join(relative)
}

/// Resolves the wave-output markdown path for `perspective_id`, validating
/// the id does not escape `run_root` via [`resolve_contained_path`] — a
/// perspective id ultimately comes from a wave plan a caller can influence.
///
/// # Errors
/// [`ro_core::OrchErrorCode::PathTraversal`] if the id escapes the run root.
pub fn wave_output(run_root: &Path, perspective_id: &PerspectiveId) -> Result<PathBuf, OrchError> {
    let relative = format!("{WAVE_OUTPUTS_DIR}/{}.md", perspective_id.as_str());
    resolve_contained_path(run_root, &relative, "perspective_id")
}
