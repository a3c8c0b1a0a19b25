// ro-core/src/core/identifiers.rs
// ============================================================================
// Module: Orchestrator Identifiers
// Description: Newtype wrappers for every identifier kind used across run
//              artifacts.
// Purpose: Prevent accidental mixing of string ids (a RunId passed where a
//          GapId is expected) at the type level.
// Dependencies: serde
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Defines a transparent newtype identifier with the conversions every
/// identifier in this crate needs.
macro_rules! id_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Builds an identifier from any string-like value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the identifier as a plain string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(
    /// Identifies one research run; also the name of its run-root directory.
    RunId
);
id_newtype!(
    /// Names a stage in the stage engine (`init`, `wave1`, `pivot`, ...).
    StageName
);
id_newtype!(
    /// Identifies one of the six gates (`A` through `F`).
    GateId
);
id_newtype!(
    /// Identifies one research perspective within a wave plan.
    PerspectiveId
);
id_newtype!(
    /// Identifies one gap extracted or supplied at the pivot.
    GapId
);
id_newtype!(
    /// Content-addressed citation id, `cid_<hex>`.
    Cid
);
id_newtype!(
    /// A `sha256:<hex>` digest of a canonical JSON value.
    InputsDigest
);
