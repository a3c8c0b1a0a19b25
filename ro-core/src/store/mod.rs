// ro-core/src/store/mod.rs
// ============================================================================
// Module: Store
// Description: Atomic artifact persistence (C2), run lock (C5),
//              manifest/gates mutators (C6), and the audit/telemetry/tick
//              ledger logs (C14).
// Dependencies: crate::core
// ============================================================================

pub mod atomic;
pub mod audit;
pub mod lock;
pub mod mutators;
pub mod ticks;
pub mod telemetry;

pub use atomic::append_jsonl_line;
pub use atomic::ensure_dir;
pub use atomic::read_json;
pub use atomic::read_jsonl;
pub use atomic::write_bytes_atomic;
pub use atomic::write_json_atomic;
pub use audit::append_audit_record;
pub use lock::RunLock;
pub use lock::lock_path;
pub use mutators::gates_write;
pub use mutators::manifest_write;
pub use telemetry::telemetry_append;
pub use ticks::tick_ledger_append;
