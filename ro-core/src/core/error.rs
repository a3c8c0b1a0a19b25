// ro-core/src/core/error.rs
// ============================================================================
// Module: Orchestrator Error Codes
// Description: Stable error codes and the top-level error type shared by
//              every crate in the workspace.
// Purpose: Ensure every fallible operation surfaces one of the canonical
//          codes rather than an ad-hoc message, so tool-call callers can
//          branch on `code` alone.
// Dependencies: serde_json, thiserror
// ============================================================================

//! ## Overview
//! Errors are tagged by stable string codes, never by exception hierarchies.
//! [`OrchErrorCode`] enumerates every code this system can produce;
//! [`OrchError`] pairs a code with a message and optional structured
//! `details` for the tool-call envelope.

use std::fmt;

use serde_json::Value;

// ============================================================================
// SECTION: Canonical error codes
// ============================================================================

/// One of the stable error codes a work unit may return.
///
/// The `Display` impl produces exactly the code string used on the wire
/// (e.g. `"PATH_TRAVERSAL"`), so callers can match on `code.to_string()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum OrchErrorCode {
    /// Caller-supplied arguments failed basic shape validation.
    InvalidArgs,
    /// The requested operation is not valid in the run's current state.
    InvalidState,
    /// A file that was expected to contain JSON did not parse as JSON.
    InvalidJson,
    /// A JSONL stream contained a line that did not parse as JSON.
    InvalidJsonl,
    /// A referenced artifact, run, or path does not exist.
    NotFound,
    /// An artifact failed structural or semantic schema validation.
    SchemaValidationFailed,
    /// A patch attempted to modify an immutable manifest field.
    ImmutableField,
    /// The caller's `expected_revision` did not match the current revision.
    RevisionMismatch,
    /// A path resolved outside the run root.
    PathTraversal,
    /// The run root is held by another holder's lease.
    RunLocked,
    /// An atomic write failed irrecoverably.
    WriteFailed,
    /// A wave plan would exceed its configured agent cap.
    WaveCapExceeded,
    /// A wave-2 operation was attempted before wave-1 validation completed.
    Wave1NotValidated,
    /// A wave-1 output failed its prompt contract.
    Wave1ContractNotMet,
    /// A wave output's perspective id did not match the requested plan entry.
    MismatchedPerspectiveId,
    /// Two gaps were parsed or supplied with the same `gap_id`.
    DuplicateGapId,
    /// A wave-1 output markdown had no "Gaps" heading.
    GapsSectionNotFound,
    /// A "Gaps" section existed but its lines did not parse.
    GapsParseFailed,
    /// A stage transition is blocked by a failing or unevaluated gate.
    GateBlocked,
    /// A stage transition's prerequisite artifact is missing.
    MissingArtifact,
    /// The caller's `requested_next` is not an allowed transition target.
    RequestedNextNotAllowed,
    /// A retryable failure requires a retry directive before proceeding.
    RetryRequired,
    /// A gate's retry budget was exhausted by this failure.
    RetryExhausted,
    /// A gate's retry cap was exceeded by this failure.
    RetryCapExhausted,
    /// The external agent driver reported failure or returned empty output.
    RunAgentFailed,
    /// A stage's time budget was exceeded.
    WatchdogTimeout,
    /// An `orchestrator_run_*` loop exceeded its tick cap.
    TickCapExceeded,
    /// The run is paused; the caller must resume it explicitly.
    Paused,
    /// The run was cancelled.
    Cancelled,
    /// A bundle failed structural validation.
    BundleInvalid,
    /// A value could not be parsed into the expected shape.
    ParseFailed,
    /// An upstream HTTP endpoint returned a body that was not valid JSON.
    UpstreamInvalidJson,
}

impl OrchErrorCode {
    /// Returns the wire string for this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgs => "INVALID_ARGS",
            Self::InvalidState => "INVALID_STATE",
            Self::InvalidJson => "INVALID_JSON",
            Self::InvalidJsonl => "INVALID_JSONL",
            Self::NotFound => "NOT_FOUND",
            Self::SchemaValidationFailed => "SCHEMA_VALIDATION_FAILED",
            Self::ImmutableField => "IMMUTABLE_FIELD",
            Self::RevisionMismatch => "REVISION_MISMATCH",
            Self::PathTraversal => "PATH_TRAVERSAL",
            Self::RunLocked => "RUN_LOCKED",
            Self::WriteFailed => "WRITE_FAILED",
            Self::WaveCapExceeded => "WAVE_CAP_EXCEEDED",
            Self::Wave1NotValidated => "WAVE1_NOT_VALIDATED",
            Self::Wave1ContractNotMet => "WAVE1_CONTRACT_NOT_MET",
            Self::MismatchedPerspectiveId => "MISMATCHED_PERSPECTIVE_ID",
            Self::DuplicateGapId => "DUPLICATE_GAP_ID",
            Self::GapsSectionNotFound => "GAPS_SECTION_NOT_FOUND",
            Self::GapsParseFailed => "GAPS_PARSE_FAILED",
            Self::GateBlocked => "GATE_BLOCKED",
            Self::MissingArtifact => "MISSING_ARTIFACT",
            Self::RequestedNextNotAllowed => "REQUESTED_NEXT_NOT_ALLOWED",
            Self::RetryRequired => "RETRY_REQUIRED",
            Self::RetryExhausted => "RETRY_EXHAUSTED",
            Self::RetryCapExhausted => "RETRY_CAP_EXHAUSTED",
            Self::RunAgentFailed => "RUN_AGENT_FAILED",
            Self::WatchdogTimeout => "WATCHDOG_TIMEOUT",
            Self::TickCapExceeded => "TICK_CAP_EXCEEDED",
            Self::Paused => "PAUSED",
            Self::Cancelled => "CANCELLED",
            Self::BundleInvalid => "BUNDLE_INVALID",
            Self::ParseFailed => "PARSE_FAILED",
            Self::UpstreamInvalidJson => "UPSTREAM_INVALID_JSON",
        }
    }

    /// Appends `_THREW` for a code recovered from a caught panic.
    #[must_use]
    pub fn threw_suffix(self) -> String {
        format!("{}_THREW", self.as_str())
    }
}

impl fmt::Display for OrchErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: OrchError
// ============================================================================

/// The error type threaded through every crate in this workspace.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct OrchError {
    /// Stable machine-readable code.
    pub code: OrchErrorCode,
    /// Human-readable message, safe to surface to an operator.
    pub message: String,
    /// Optional structured context (offending field, observed value, ...).
    pub details: Option<Value>,
}

impl OrchError {
    /// Builds an error with no structured details.
    #[must_use]
    pub fn new(code: OrchErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Builds an error carrying structured `details`.
    #[must_use]
    pub fn with_details(code: OrchErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    /// Converts this error into the tool-call envelope's error object.
    #[must_use]
    pub fn to_envelope(&self) -> Value {
        serde_json::json!({
            "code": self.code.as_str(),
            "message": self.message,
            "details": self.details,
        })
    }
}

impl From<serde_json::Error> for OrchError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(OrchErrorCode::ParseFailed, format!("JSON did not match the expected schema: {err}"))
    }
}

/// Convenience alias used throughout the workspace.
pub type OrchResult<T> = Result<T, OrchError>;
