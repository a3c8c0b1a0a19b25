// ro-core/src/core/codec.rs
// ============================================================================
// Module: Canonical Codec (C1)
// Description: Canonical JSON serialization and SHA-256 content digests.
// Purpose: Give every artifact and decision a deterministic, reorder-stable
//          digest so equivalent inputs always produce the same id.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Canonical JSON here means RFC 8785 (JCS): object keys sorted by Unicode
//! codepoint, arrays left in original order, numbers/strings/booleans/null
//! in their minimal form. [`canonical_json_bytes`] produces those bytes;
//! [`digest_value`] and [`digest_bytes`] hash them into the `sha256:<hex>`
//! form used for `inputs_digest` throughout the run artifacts.

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use super::error::OrchError;
use super::error::OrchErrorCode;
use super::identifiers::InputsDigest;

// ============================================================================
// SECTION: Canonicalization
// ============================================================================

/// Serializes `value` to canonical JSON bytes (RFC 8785 / JCS).
///
/// # Errors
/// Returns [`OrchErrorCode::InvalidJson`] if `value` cannot be canonicalized
/// (e.g. it contains a `NaN` float, which has no canonical JSON form).
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, OrchError> {
    serde_jcs::to_vec(value).map_err(|err| {
        OrchError::new(
            OrchErrorCode::InvalidJson,
            format!("failed to canonicalize value: {err}"),
        )
    })
}

/// Serializes `value` to a canonical JSON `String`.
///
/// # Errors
/// Same as [`canonical_json_bytes`].
pub fn canonical_json_string<T: Serialize>(value: &T) -> Result<String, OrchError> {
    let bytes = canonical_json_bytes(value)?;
    String::from_utf8(bytes).map_err(|err| {
        OrchError::new(
            OrchErrorCode::InvalidJson,
            format!("canonical JSON was not valid UTF-8: {err}"),
        )
    })
}

/// Returns `true` iff `a` and `b` canonicalize to byte-identical JSON.
///
/// Used to assert the "canonical JSON is idempotent" invariant and to
/// compare two artifact snapshots for semantic (not textual) equality.
///
/// # Errors
/// Propagates [`canonical_json_bytes`] failures.
pub fn canonical_eq<T: Serialize>(a: &T, b: &T) -> Result<bool, OrchError> {
    Ok(canonical_json_bytes(a)? == canonical_json_bytes(b)?)
}

// ============================================================================
// SECTION: Digests
// ============================================================================

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Hashes raw bytes with SHA-256, returning the lowercase hex digest with no
/// prefix.
#[must_use]
pub fn sha256_hex_lower(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_lower(&hasher.finalize())
}

/// Hashes arbitrary bytes into the `sha256:<hex>` digest form.
#[must_use]
pub fn digest_bytes(bytes: &[u8]) -> String {
    format!("sha256:{}", sha256_hex_lower(bytes))
}

/// Canonicalizes `value` and returns its `sha256:<hex>` digest.
///
/// This is the `inputs_digest` computation used by every mutator and gate
/// evaluator: `"sha256:" + lower_hex(sha256(canonical_json(value)))`.
///
/// # Errors
/// Propagates [`canonical_json_bytes`] failures.
pub fn inputs_digest<T: Serialize>(value: &T) -> Result<InputsDigest, OrchError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(InputsDigest::new(digest_bytes(&bytes)))
}

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
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_object_keys() {
        let value = json!({"b": 1, "a": 2});
        let bytes = canonical_json_bytes(&value).expect("canonicalizes");
        assert_eq!(String::from_utf8(bytes).expect("utf8"), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn canonical_json_is_idempotent() {
        let value = json!({"z": [3, 2, 1], "a": {"y": 1, "x": 2}});
        let once = canonical_json_bytes(&value).expect("canonicalizes");
        let parsed: serde_json::Value = serde_json::from_slice(&once).expect("valid json");
        let twice = canonical_json_bytes(&parsed).expect("canonicalizes again");
        assert_eq!(once, twice);
    }

    #[test]
    fn digest_is_stable_under_key_reorder() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        let digest_a = inputs_digest(&a).expect("digest a");
        let digest_b = inputs_digest(&b).expect("digest b");
        assert_eq!(digest_a, digest_b);
    }

    #[test]
    fn digest_has_stable_prefix_and_length() {
        let digest = inputs_digest(&json!({"k": "v"})).expect("digest");
        let s = digest.as_str();
        assert!(s.starts_with("sha256:"));
        assert_eq!(s.len(), "sha256:".len() + 64);
    }
}
