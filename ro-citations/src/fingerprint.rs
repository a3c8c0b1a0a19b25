// ro-citations/src/fingerprint.rs
// ============================================================================
// Module: Citation Fingerprinting
// Description: Derives a content-addressed id from a normalized URL.
// Dependencies: ro-core
// ============================================================================

use ro_core::sha256_hex_lower;

/// Computes `cid = "cid_" + sha256_hex_lower(normalized_url)`, per spec
/// §4.7.
#[must_use]
pub fn cid_for(normalized_url: &str) -> String {
    format!("cid_{}", sha256_hex_lower(normalized_url.as_bytes()))
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

    #[test]
    fn is_deterministic() {
        assert_eq!(
            cid_for("https://example.com/a"),
            cid_for("https://example.com/a")
        );
    }

    #[test]
    fn differs_by_input() {
        assert_ne!(
            cid_for("https://example.com/a"),
            cid_for("https://example.com/b")
        );
    }

    #[test]
    fn carries_cid_prefix() {
        assert!(cid_for("https://example.com").starts_with("cid_"));
    }
}
