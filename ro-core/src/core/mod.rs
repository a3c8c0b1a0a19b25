// ro-core/src/core/mod.rs
// ============================================================================
// Module: Core
// Description: Canonical codec, identifiers, errors, path safety, and the
//              artifact type vocabulary shared across the workspace.
// Dependencies: serde, serde_jcs, sha2, thiserror
// ============================================================================

pub mod artifacts;
pub mod codec;
pub mod error;
pub mod identifiers;
pub mod path;

pub use artifacts::*;
pub use codec::canonical_eq;
pub use codec::canonical_json_bytes;
pub use codec::canonical_json_string;
pub use codec::digest_bytes;
pub use codec::inputs_digest;
pub use codec::sha256_hex_lower;
pub use error::OrchError;
pub use error::OrchErrorCode;
pub use error::OrchResult;
pub use identifiers::Cid;
pub use identifiers::GapId;
pub use identifiers::GateId;
pub use identifiers::InputsDigest;
pub use identifiers::PerspectiveId;
pub use identifiers::RunId;
pub use identifiers::StageName;
pub use path::resolve_contained_path;
