// ro-toolsurface/src/ops/mod.rs
// ============================================================================
// Module: Operation Wrappers
// Description: One submodule per operation family, each exposing
//              `(&ToolRouter, Value) -> Result<Value, OrchError>` functions
//              that `crate::route` dispatches to.
// Purpose: Keep the JSON-in/JSON-out boundary in one layer, separate from
//          `ro-core`'s pure domain functions.
// Dependencies: ro-core, ro-citations, ro-config
// ============================================================================

pub mod citations;
pub mod control;
pub mod gates;
pub mod research;
pub mod run;
pub mod wave;

use ro_core::OrchError;
use ro_core::OrchErrorCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Deserializes `args` into `T`, turning a shape mismatch into
/// [`OrchErrorCode::InvalidArgs`] rather than a panic.
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, OrchError> {
    serde_json::from_value(args).map_err(|err| {
        OrchError::with_details(
            OrchErrorCode::InvalidArgs,
            format!("failed to parse arguments: {err}"),
            Value::Null,
        )
    })
}

/// Serializes `value` to a JSON [`Value`], turning a serialization failure
/// (practically unreachable for this crate's types) into
/// [`OrchErrorCode::InvalidJson`] instead of panicking.
pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<Value, OrchError> {
    serde_json::to_value(value)
        .map_err(|err| OrchError::new(OrchErrorCode::InvalidJson, format!("failed to serialize result: {err}")))
}

/// The current instant as an RFC-3339 timestamp, this layer's one clock
/// read per operation.
pub(crate) fn now_iso() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}
