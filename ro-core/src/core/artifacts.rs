// ro-core/src/core/artifacts.rs
// ============================================================================
// Module: Run Artifact Schemas
// Description: Typed representations of every JSON artifact persisted under
//              a run root.
// Purpose: Give C6/C7/C9/C10/C11/C12 a single shared vocabulary for the
//          manifest, gates document, perspectives, wave plans, pivot
//          decision, url map, citations, summary pack, review bundle,
//          revision directives, telemetry, audit, tick ledger, and lock.
// Dependencies: serde, serde_json
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use super::identifiers::GapId;
use super::identifiers::GateId;
use super::identifiers::PerspectiveId;
use super::identifiers::RunId;
use super::identifiers::StageName;

// ============================================================================
// SECTION: Run manifest (manifest.v1)
// ============================================================================

/// Run mode, controlling defaults for wave sizing and review depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Smallest, fastest configuration.
    Quick,
    /// Default balance of coverage and cost.
    Standard,
    /// Maximum coverage, most wave-2 headroom.
    Deep,
}

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Manifest written, no ticks yet applied.
    Created,
    /// At least one tick has advanced the run.
    Running,
    /// Operator-requested suspension; ticks return `PAUSED`.
    Paused,
    /// A hard gate failed; `failures[]` holds the structured cause.
    Failed,
    /// Stage reached `finalize`.
    Completed,
    /// Operator-requested termination.
    Cancelled,
}

/// Sensitivity of the underlying query, governing citation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySensitivity {
    /// Ordinary query; online citation ladder permitted.
    Normal,
    /// Restricted query; same network posture as `Normal` but flagged.
    Restricted,
    /// Forces offline-fixture citation validation only.
    NoWeb,
}

/// `query` section of the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestQuery {
    /// The user's research question.
    pub text: String,
    /// Optional free-form constraints (date ranges, domains, etc).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Value>,
    /// Governs whether the online citation ladder may run.
    pub sensitivity: QuerySensitivity,
}

/// One entry in `manifest.stage.history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageHistoryEntry {
    /// Stage transitioned from.
    pub from: StageName,
    /// Stage transitioned to.
    pub to: StageName,
    /// ISO-8601 timestamp of the transition.
    pub ts: String,
    /// Human-readable reason supplied by the caller.
    pub reason: String,
    /// Digest of the inputs that justified this transition.
    pub inputs_digest: String,
    /// `gates.json` revision observed at decision time.
    pub gates_revision: u64,
}

/// `stage` section of the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestStage {
    /// Current stage name.
    pub current: StageName,
    /// ISO-8601 timestamp the current stage was entered.
    pub started_at: String,
    /// Last progress heartbeat timestamp, if any work unit has reported one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_progress_at: Option<String>,
    /// Ordered transition history.
    #[serde(default)]
    pub history: Vec<StageHistoryEntry>,
}

/// `limits` section of the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestLimits {
    /// Maximum wave-1 agents.
    pub max_wave1_agents: u32,
    /// Maximum wave-2 agents.
    pub max_wave2_agents: u32,
    /// Maximum per-perspective summary size, in KiB.
    pub max_summary_kb: u32,
    /// Maximum total summary pack size, in KiB.
    pub max_total_summary_kb: u32,
    /// Maximum review→synthesis iterations before escalation.
    pub max_review_iterations: u32,
}

/// A structured failure recorded when a hard gate fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFailure {
    /// Stable error code.
    pub code: String,
    /// Gate or component that raised the failure.
    pub source: String,
    /// Human-readable message.
    pub message: String,
    /// ISO-8601 timestamp.
    pub ts: String,
}

/// Paths section describing where a run's artifacts live, relative to
/// `artifacts.root`. Immutable once written by `run_init`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestArtifactPaths {
    /// Path to `manifest.json` itself, always `"manifest.json"`.
    pub manifest: String,
    /// Path to `gates.json`.
    pub gates: String,
    /// Path to `perspectives.json`.
    pub perspectives: String,
}

/// `artifacts` section of the manifest: the run root and its fixed layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestArtifacts {
    /// Absolute path to the run root directory.
    pub root: String,
    /// Fixed relative paths of well-known artifacts.
    pub paths: ManifestArtifactPaths,
}

/// The run manifest (`manifest.json`, schema `manifest.v1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version tag, immutable.
    pub schema_version: String,
    /// Run identifier, immutable.
    pub run_id: RunId,
    /// Creation timestamp, immutable.
    pub created_at: String,
    /// Monotonic revision counter, starts at 1.
    pub revision: u64,
    /// Last mutation timestamp.
    pub updated_at: String,
    /// Immutable artifact layout.
    pub artifacts: ManifestArtifacts,
    /// Run mode.
    pub mode: RunMode,
    /// Lifecycle status.
    pub status: RunStatus,
    /// The research query and its sensitivity.
    pub query: ManifestQuery,
    /// Stage machine state.
    pub stage: ManifestStage,
    /// Configured limits.
    pub limits: ManifestLimits,
    /// Arbitrary metrics bag (`retry_counts`, `retry_history`, ...).
    #[serde(default)]
    pub metrics: BTreeMap<String, Value>,
    /// Recorded hard-gate failures.
    #[serde(default)]
    pub failures: Vec<ManifestFailure>,
}

impl Manifest {
    /// The manifest field names that may never appear in a merge patch.
    pub const IMMUTABLE_FIELDS: &'static [&'static str] =
        &["schema_version", "run_id", "created_at", "artifacts"];
}

// ============================================================================
// SECTION: Gates document (gates.v1)
// ============================================================================

/// Severity class of a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateClass {
    /// Failing blocks the stage transition outright.
    Hard,
    /// Failing only produces a warning; never blocks.
    Soft,
}

/// Evaluation outcome of a single gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    /// Not yet evaluated.
    NotRun,
    /// Evaluated and satisfied.
    Pass,
    /// Evaluated and unsatisfied.
    Fail,
    /// Evaluated, unsatisfied, but non-blocking (soft gates only).
    Warn,
}

/// One gate's persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    /// Gate identifier (`"A"`..`"F"`).
    pub id: GateId,
    /// Human-readable name.
    pub name: String,
    /// Severity class.
    pub class: GateClass,
    /// Current status.
    pub status: GateStatus,
    /// Timestamp of the evaluation that produced this status. Required
    /// whenever `status != not_run`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<String>,
    /// Evaluation metrics (rates, counts) backing the pass/fail decision.
    #[serde(default)]
    pub metrics: BTreeMap<String, Value>,
    /// Relative POSIX paths to artifacts this evaluation inspected.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Non-blocking warnings surfaced alongside the status.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Free-form evaluator notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Gate {
    /// Builds a fresh gate in its `not_run` default state.
    #[must_use]
    pub fn not_run(id: &str, name: &str, class: GateClass) -> Self {
        Self {
            id: GateId::new(id),
            name: name.to_string(),
            class,
            status: GateStatus::NotRun,
            checked_at: None,
            metrics: BTreeMap::new(),
            artifacts: Vec::new(),
            warnings: Vec::new(),
            notes: None,
        }
    }
}

/// The gates document (`gates.json`, schema `gates.v1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatesDocument {
    /// Owning run id.
    pub run_id: RunId,
    /// Monotonic revision counter.
    pub revision: u64,
    /// Last mutation timestamp.
    pub updated_at: String,
    /// Digest of the inputs behind the most recent mutation.
    pub inputs_digest: String,
    /// Gate A: scope/perspective/wave-1-plan alignment.
    pub a: Gate,
    /// Gate B: wave-1 output contracts.
    pub b: Gate,
    /// Gate C: citation validation rates.
    pub c: Gate,
    /// Gate D: summary pack completeness/boundedness.
    pub d: Gate,
    /// Gate E: synthesis contract + citation utilization.
    pub e: Gate,
    /// Gate F: final bundle/fallback hygiene.
    pub f: Gate,
}

impl GatesDocument {
    /// Builds a fresh gates document with all six gates `not_run`.
    #[must_use]
    pub fn fresh(run_id: RunId, updated_at: impl Into<String>) -> Self {
        Self {
            run_id,
            revision: 1,
            updated_at: updated_at.into(),
            inputs_digest: String::new(),
            a: Gate::not_run("A", "scope_and_plan_alignment", GateClass::Hard),
            b: Gate::not_run("B", "wave1_output_contracts", GateClass::Hard),
            c: Gate::not_run("C", "citation_validation", GateClass::Hard),
            d: Gate::not_run("D", "summary_pack_boundedness", GateClass::Hard),
            e: Gate::not_run("E", "synthesis_contract", GateClass::Hard),
            f: Gate::not_run("F", "final_bundle_hygiene", GateClass::Hard),
        }
    }

    /// Returns the gate matching `id` (`"A"`..`"F"`), if any.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Gate> {
        match id {
            "A" => Some(&self.a),
            "B" => Some(&self.b),
            "C" => Some(&self.c),
            "D" => Some(&self.d),
            "E" => Some(&self.e),
            "F" => Some(&self.f),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Scope (scope.v1)
// ============================================================================

/// The operator-supplied research scope (`operator/scope.json`, schema
/// `scope.v1`), the document Gate A checks perspectives and the wave-1 plan
/// against for alignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeDocument {
    /// The research query text.
    pub query_text: String,
    /// Optional free-form constraints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Value>,
    /// Query sensitivity, mirrored from the manifest at run_init time.
    pub sensitivity: QuerySensitivity,
}

// ============================================================================
// SECTION: Perspectives (perspectives.v1)
// ============================================================================

/// Editorial stance a perspective is asked to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerspectiveTrack {
    /// The default, consensus-seeking stance.
    Standard,
    /// A stance that avoids relying on the standard track's sources.
    Independent,
    /// A stance that actively seeks disconfirming evidence.
    Contrarian,
}

/// Prompt-level constraints a perspective's output must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptContract {
    /// Maximum words in the rendered output markdown.
    pub max_words: u32,
    /// Maximum distinct sources the output may cite.
    pub max_sources: u32,
    /// Maximum tool invocations the agent driver may spend.
    pub tool_budget: u32,
    /// Markdown headings that must appear in the output.
    pub must_include_sections: Vec<String>,
}

/// One entry in `perspectives.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Perspective {
    /// Stable identifier, referenced by wave plan entries and gaps.
    pub id: PerspectiveId,
    /// Human-readable title shown in prompts and reports.
    pub title: String,
    /// Editorial track.
    pub track: PerspectiveTrack,
    /// Agent driver type to invoke for this perspective.
    pub agent_type: String,
    /// Contract the output markdown must satisfy.
    pub prompt_contract: PromptContract,
}

/// The perspectives document (`perspectives.json`, schema `perspectives.v1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerspectivesDocument {
    /// Ordered perspectives for this run.
    pub perspectives: Vec<Perspective>,
}

// ============================================================================
// SECTION: Wave plans
// ============================================================================

/// One entry in a wave plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WavePlanEntry {
    /// Perspective this entry drives (wave 1) or the gap-derived synthetic
    /// perspective id (wave 2).
    pub perspective_id: PerspectiveId,
    /// Gap this entry addresses, present only in wave-2 plans.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_id: Option<GapId>,
    /// Relative path the agent's markdown output will be written to.
    pub output_md: String,
    /// Prompt text handed to the agent driver.
    pub prompt_md: String,
}

/// A wave plan (`wave-1/wave1-plan.json` or `wave-2/wave2-plan.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WavePlan {
    /// Digest of the perspectives/gaps this plan was derived from.
    pub inputs_digest: String,
    /// Ordered plan entries.
    pub entries: Vec<WavePlanEntry>,
}

/// Sidecar metadata written alongside each wave output markdown file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveOutputMeta {
    /// Perspective that produced this output.
    pub perspective_id: PerspectiveId,
    /// Agent driver type invoked.
    pub agent_type: String,
    /// Relative path of the output markdown.
    pub output_md: String,
    /// Digest of the prompt text handed to the agent.
    pub prompt_digest: String,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// Number of times this entry has been retried.
    #[serde(default)]
    pub retry_count: u32,
}

// ============================================================================
// SECTION: Pivot decision (pivot_decision.v1)
// ============================================================================

/// Priority of an extracted or supplied gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapPriority {
    /// Highest priority; any P0 gap alone requires wave 2.
    P0,
    /// Second priority.
    P1,
    /// Third priority.
    P2,
    /// Lowest priority.
    P3,
}

impl GapPriority {
    /// Parses a bracketed priority token such as `"P0"`.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "P0" => Some(Self::P0),
            "P1" => Some(Self::P1),
            "P2" => Some(Self::P2),
            "P3" => Some(Self::P3),
            _ => None,
        }
    }
}

/// Where a gap came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSource {
    /// Supplied directly by the caller.
    Explicit,
    /// Parsed out of a wave-1 output's "Gaps" section.
    ParsedWave1,
}

/// One gap in the pivot decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gap {
    /// Stable identifier, `gap_<perspective_id>_<ordinal>` when parsed.
    pub gap_id: GapId,
    /// Priority bucket.
    pub priority: GapPriority,
    /// Gap description text.
    pub text: String,
    /// `#word` tokens extracted from the gap text.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Provenance of this gap.
    pub source: GapSource,
}

/// The `decision` object inside a pivot decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotDecisionOutcome {
    /// Whether a wave-2 pass is required.
    pub wave2_required: bool,
    /// Which rule matched (`"Wave2Required.P0"`, `"Wave2Skip.NoGaps"`, ...).
    pub rule_hit: String,
    /// Counts backing the rule evaluation (`p0_count`, `p1_count`, ...).
    pub metrics: BTreeMap<String, Value>,
    /// Human-readable explanation of the decision.
    pub explanation: String,
    /// Gap ids selected for wave 2, in sorted order.
    #[serde(default)]
    pub wave2_gap_ids: Vec<GapId>,
}

/// The pivot decision (`pivot.json`, schema `pivot_decision.v1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotDecision {
    /// Relative paths of the wave-1 outputs considered.
    pub wave1_outputs: Vec<String>,
    /// All extracted/supplied gaps, sorted by `(priority_rank, gap_id)`.
    pub gaps: Vec<Gap>,
    /// The rule evaluation outcome.
    pub decision: PivotDecisionOutcome,
}

// ============================================================================
// SECTION: Citation artifacts
// ============================================================================

/// One deduplicated URL map entry (`citations/url-map.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlMapItem {
    /// The exact URL text as first seen.
    pub url_original: String,
    /// The normalized URL.
    pub normalized_url: String,
    /// Content-addressed id derived from the normalized URL.
    pub cid: String,
}

/// The URL map document (`citations/url-map.json`, schema `url_map.v1`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UrlMap {
    /// Deduplicated items, one per distinct normalized URL.
    pub items: Vec<UrlMapItem>,
}

/// Validation outcome of a single normalized URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationStatus {
    /// Reachable and not paywalled/blocked.
    Valid,
    /// Reachable but behind a paywall or login.
    Paywalled,
    /// Every validation step failed to reach a conclusive answer.
    Blocked,
    /// The endpoint response did not agree with the requested URL.
    Mismatch,
    /// Unreachable, rejected, or otherwise not usable as a citation.
    Invalid,
}

/// One record in the citations stream (`citations/citations.jsonl`, record
/// `citation.v1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitationRecord {
    /// The normalized URL this record describes.
    pub normalized_url: String,
    /// Content-addressed id.
    pub cid: String,
    /// The (possibly redacted) URL to display.
    pub url: String,
    /// The exact URL text as first extracted.
    pub url_original: String,
    /// Validation outcome.
    pub status: CitationStatus,
    /// ISO-8601 timestamp of validation.
    pub checked_at: String,
    /// Which wave outputs referenced this URL.
    #[serde(default)]
    pub found_by: Vec<String>,
    /// Free-form notes, including ladder attempt traces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// HTTP status observed, when a direct fetch was attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Page title, when extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Publisher/site name, when extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// A short evidentiary excerpt from the page, when extracted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_snippet: Option<String>,
}

// ============================================================================
// SECTION: Summary / synthesis / review
// ============================================================================

/// One perspective's entry inside the summary pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryEntry {
    /// Perspective this summary condenses.
    pub perspective_id: PerspectiveId,
    /// Condensed markdown text.
    pub summary_md: String,
    /// Size of `summary_md` in KiB.
    pub size_kb: f64,
    /// Citation cids referenced by this summary.
    #[serde(default)]
    pub cited: Vec<String>,
}

/// The summary pack (`summaries/summary-pack.json`, schema
/// `summary_pack.v1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryPack {
    /// One entry per perspective with a validated wave output.
    pub entries: Vec<SummaryEntry>,
    /// Total size of all entries combined, in KiB.
    pub total_size_kb: f64,
    /// Perspectives that were expected but have no entry.
    #[serde(default)]
    pub missing_perspectives: Vec<PerspectiveId>,
}

/// Final review verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewDecision {
    /// Synthesis is acceptable as-is.
    Pass,
    /// Synthesis needs another revision pass.
    ChangesRequired,
}

/// The review bundle (`review/review-bundle.json`, schema
/// `review_bundle.v1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewBundle {
    /// Overall verdict.
    pub decision: ReviewDecision,
    /// Findings backing the verdict.
    #[serde(default)]
    pub findings: Vec<String>,
    /// ISO-8601 timestamp.
    pub reviewed_at: String,
}

/// Revision control's chosen next action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionAction {
    /// Move on to `finalize`.
    Advance,
    /// Write another synthesis draft and re-review.
    Revise,
    /// Review-loop cap hit; stay in `review` for operator intervention.
    Escalate,
}

/// Revision directives (`review/revision-directives.json`, schema
/// `revision_directives.v1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionDirectives {
    /// Chosen action.
    pub action: RevisionAction,
    /// Review iteration count this decision was based on.
    pub current_iteration: u32,
    /// Findings carried forward for the next synthesis pass.
    #[serde(default)]
    pub findings: Vec<String>,
}

// ============================================================================
// SECTION: Retry directives
// ============================================================================

/// One retry directive instructing the next tick to rerun a perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryDirective {
    /// Perspective to rerun.
    pub perspective_id: PerspectiveId,
    /// Gate whose failure triggered this retry.
    pub gate_id: GateId,
    /// Note appended to the perspective's prompt on rerun.
    pub change_note: String,
    /// Attempt number this directive represents.
    pub attempt: u32,
}

/// The retry directives file (`retry/retry-directives.json`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetryDirectivesFile {
    /// Pending directives for the next tick.
    pub directives: Vec<RetryDirective>,
}

// ============================================================================
// SECTION: Telemetry, audit, tick ledger
// ============================================================================

/// One telemetry event (`telemetry.event.v1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Schema version tag.
    pub schema_version: String,
    /// Owning run id.
    pub run_id: RunId,
    /// Strictly-increasing sequence number.
    pub seq: u64,
    /// ISO-8601 timestamp.
    pub ts: String,
    /// Event type discriminator.
    pub event_type: String,
    /// Free-form event payload.
    #[serde(default)]
    pub payload: BTreeMap<String, Value>,
}

/// The telemetry index (`logs/telemetry.index.json`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TelemetryIndex {
    /// Highest `seq` persisted so far.
    pub max_seq: u64,
}

/// One audit record (`logs/audit.jsonl`), intentionally free-form beyond
/// the required envelope fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// ISO-8601 timestamp.
    pub ts: String,
    /// Mutation kind (`"manifest_write"`, `"gates_write"`, ...).
    pub kind: String,
    /// Owning run id.
    pub run_id: RunId,
    /// Human-readable reason supplied by the caller.
    pub reason: String,
    /// Digest of the inputs behind this mutation.
    pub inputs_digest: String,
    /// Any additional kind-specific fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One tick ledger record (`logs/ticks.jsonl`, schema `tick_ledger.v1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickLedgerRecord {
    /// Monotonic index of this tick within the run.
    pub index: u64,
    /// Phase that executed this tick (canonical field per spec §9).
    pub phase: String,
    /// Stage before the tick ran.
    pub stage_before: StageName,
    /// Stage after the tick ran.
    pub stage_after: StageName,
    /// Status before the tick ran.
    pub status_before: String,
    /// Status after the tick ran.
    pub status_after: String,
    /// `"ok"` or an error code.
    pub result: String,
    /// Digest of this tick's effective inputs.
    pub inputs_digest: String,
    /// Relative paths of artifacts written during this tick.
    #[serde(default)]
    pub artifacts: Vec<String>,
}

/// The run lock file (`.run.lock`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLockPayload {
    /// Random holder id chosen at acquisition time.
    pub holder_id: String,
    /// ISO-8601 acquisition timestamp.
    pub acquired_at: String,
    /// ISO-8601 lease expiry; the lock is stale once `now >= this`.
    pub lease_expires_at: String,
    /// ISO-8601 timestamp of the most recent heartbeat renewal.
    pub last_heartbeat_at: String,
    /// Reason the lock was acquired, for contention diagnostics.
    pub reason: String,
}
