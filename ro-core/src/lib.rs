// ro-core/src/lib.rs
// ============================================================================
// Module: Research Orchestrator Core
// Description: Domain model, persistence, gates, pivot decider,
//              summary/synthesis/review, stage engine, and tick
//              orchestrator for the deterministic research-run control
//              plane.
// Purpose: Single source of truth for what a run root contains and how it
//          is allowed to change from tick to tick.
// Dependencies: serde, serde_json, serde_jcs, sha2, thiserror, time, rand
// ============================================================================

//! ## Overview
//! `ro-core` implements the stage/gate control plane described in the
//! research-run orchestrator specification: a per-run on-disk state machine
//! (manifest + gates + audit log) driven by a tick-based orchestrator. Every
//! fallible operation returns [`core::OrchResult`]; no `unwrap`/`expect`/
//! `panic!` appears outside `#[cfg(test)]` code, and a work unit that
//! panics is caught at the tick-orchestrator boundary by
//! [`tick::run_work_unit`] and converted into an error whose code carries
//! the `_THREW` suffix.
//!
//! Module map:
//! - [`core`]: canonical codec (C1), identifiers, errors, path safety (C4),
//!   and the artifact type vocabulary.
//! - [`store`]: atomic artifact persistence (C2), run lock (C5),
//!   manifest/gates mutators (C6), audit/telemetry/tick-ledger logs (C14).
//! - [`gates`]: gate evaluators A-F (C7), the pivot decider (C8), and the
//!   retry controller (C13).
//! - [`research`]: summary pack assembly, synthesis writing, and reviewer
//!   aggregation (C10).
//! - [`stage`]: the stage engine (C11).
//! - [`tick`]: the three-phase tick orchestrator (C12) and its watchdog.

pub mod core;
pub mod gates;
pub mod research;
pub mod stage;
pub mod store;
pub mod tick;

pub use core::OrchError;
pub use core::OrchErrorCode;
pub use core::OrchResult;
