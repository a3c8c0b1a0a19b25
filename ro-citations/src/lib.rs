// ro-citations/src/lib.rs
// ============================================================================
// Module: Citation Subsystem
// Description: URL extraction, normalization, fingerprinting, offline and
//              online validation, sensitive-URL redaction, and Markdown
//              rendering for a research run's citations.
// Purpose: Turn raw URL mentions in wave outputs into the deduplicated,
//          validated citation records Gate C, Gate E, and the final
//          synthesis document all depend on.
// Dependencies: ro-core, reqwest, url, time, tracing
// ============================================================================

//! ## Overview
//! `ro-citations` implements spec §4.7 (C9): [`extract::extract_urls`] scans
//! wave-output markdown for absolute URLs, [`normalize::normalize_url`]
//! canonicalizes them, [`fingerprint::cid_for`] derives a stable id, and
//! [`validate`] runs either the offline-fixture lookup or the three-step
//! online ladder (SSRF preflight, direct fetch, remote endpoint fallback).
//! [`redact::redact_sensitive`] and [`render::render_citations_markdown`]
//! cover display concerns: no citation record is ever written to a
//! user-facing artifact with its original userinfo or credential-shaped
//! query parameters intact.

pub mod extract;
pub mod fingerprint;
pub mod normalize;
pub mod redact;
pub mod render;
pub mod ssrf;
pub mod validate;

pub use extract::extract_urls;
pub use fingerprint::cid_for;
pub use normalize::normalize_url;
pub use redact::redact_sensitive;
pub use render::render_citations_markdown;
pub use ssrf::preflight;
pub use validate::CitationEndpoint;
pub use validate::HttpCitationEndpoint;
pub use validate::OfflineFixtureEntry;
pub use validate::OfflineFixtures;
pub use validate::fetch_direct;
pub use validate::validate_dry_run;
pub use validate::validate_offline;
pub use validate::validate_online;

use ro_core::OrchError;
use ro_core::OrchErrorCode;
use ro_core::artifacts::UrlMap;
use ro_core::artifacts::UrlMapItem;

/// Builds the deduplicated URL map from every URL extracted across a run's
/// wave outputs, normalizing and fingerprinting each, per spec §4.7.
///
/// Extraction failures (a URL that fails to normalize) are silently
/// dropped rather than failing the whole run — an unparseable URL token is
/// not a citation candidate.
///
/// # Errors
/// Propagates [`OrchErrorCode::InvalidArgs`] only if every candidate fails
/// to normalize AND `urls` was non-empty, signalling the caller likely
/// passed non-URL text rather than wave-output markdown.
pub fn build_url_map(urls: &[String]) -> Result<UrlMap, OrchError> {
    let mut items = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    let mut attempted = 0usize;
    for url_original in urls {
        attempted += 1;
        let Ok(normalized_url) = normalize_url(url_original) else {
            continue;
        };
        if seen.insert(normalized_url.clone()) {
            items.push(UrlMapItem {
                url_original: url_original.clone(),
                cid: cid_for(&normalized_url),
                normalized_url,
            });
        }
    }
    if attempted > 0 && items.is_empty() {
        return Err(OrchError::new(
            OrchErrorCode::InvalidArgs,
            "no candidate URL normalized successfully",
        ));
    }
    Ok(UrlMap { items })
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
    fn dedupes_equivalent_urls() {
        let urls = vec![
            "https://example.com/a?utm_source=x".to_string(),
            "https://EXAMPLE.com/a".to_string(),
        ];
        let map = build_url_map(&urls).expect("builds map");
        assert_eq!(map.items.len(), 1);
    }

    #[test]
    fn empty_input_yields_empty_map() {
        let map = build_url_map(&[]).expect("builds empty map");
        assert!(map.items.is_empty());
    }
}
