// ro-core/src/store/ticks.rs
// ============================================================================
// Module: Tick Ledger
// Description: Appends one tick_ledger.v1 record per tick to logs/ticks.jsonl.
// Purpose: Give every tick a durable, independently-auditable record of what
//          it observed and produced, regardless of the tick's outcome.
// Dependencies: crate::core, crate::store::atomic
// ============================================================================

use std::path::Path;

use crate::core::artifacts::TickLedgerRecord;
use crate::core::error::OrchError;

use super::atomic::append_jsonl_line;

/// Appends a tick ledger record. Unlike audit/telemetry this call does
/// propagate failures: a missing ledger entry for a real tick would make
/// post-hoc auditing unreliable in a way the spec treats as a hard error.
///
/// # Errors
/// Propagates [`append_jsonl_line`] failures.
pub fn tick_ledger_append(path: &Path, record: &TickLedgerRecord) -> Result<(), OrchError> {
    append_jsonl_line(path, record)
}
