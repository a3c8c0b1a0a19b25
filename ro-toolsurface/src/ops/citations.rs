// ro-toolsurface/src/ops/citations.rs
// ============================================================================
// Module: Citation Operations
// Description: `citations_extract_urls`, `citations_normalize`,
//              `citations_validate`, `citations_render_md`.
// Purpose: Drive the citation subsystem's extract -> normalize -> validate
//          -> render pipeline from JSON tool calls.
// Dependencies: ro-core, ro-citations, ro-config
// ============================================================================

use ro_citations::CitationEndpoint;
use ro_citations::build_url_map;
use ro_citations::cid_for;
use ro_citations::extract_urls;
use ro_citations::normalize_url;
use ro_citations::render_citations_markdown;
use ro_citations::validate_dry_run;
use ro_citations::validate_offline;
use ro_citations::validate_online;
use ro_config::CitationValidationTier;
use ro_core::OrchError;
use ro_core::core::CitationRecord;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::ops::now_iso;
use crate::ops::parse_args;
use crate::ops::to_value;
use crate::router::ToolRouter;

/// `citations_extract_urls` arguments: the wave-output markdown documents
/// to scan.
#[derive(Debug, Deserialize)]
struct ExtractUrlsArgs {
    #[serde(default)]
    markdown_documents: Vec<String>,
}

/// `citations_extract_urls`: runs [`extract_urls`] over each supplied
/// document and concatenates the results, in document order.
///
/// # Errors
/// Never fails; extraction is a pure scan.
pub fn citations_extract_urls(_router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: ExtractUrlsArgs = parse_args(args)?;
    let urls: Vec<String> = args.markdown_documents.iter().flat_map(|doc| extract_urls(doc)).collect();
    Ok(json!({ "urls": urls }))
}

/// `citations_normalize` arguments: the raw extracted URLs to fold into a
/// deduplicated [`ro_core::core::UrlMap`].
#[derive(Debug, Deserialize)]
struct NormalizeArgs {
    urls: Vec<String>,
}

/// `citations_normalize`: runs [`build_url_map`] over `urls`, per spec
/// §4.7.
///
/// # Errors
/// Propagates [`build_url_map`]'s digest-computation failures.
pub fn citations_normalize(_router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: NormalizeArgs = parse_args(args)?;
    let url_map = build_url_map(&args.urls)?;
    to_value(&url_map)
}

/// `citations_validate` arguments: one deduplicated URL-map entry at a
/// time (callers loop over `url_map.items`).
#[derive(Debug, Deserialize)]
struct ValidateArgs {
    normalized_url: String,
    url_original: String,
    #[serde(default)]
    cid: Option<String>,
}

/// `citations_validate`: validates one normalized URL through the ladder
/// selected by the router's configured [`CitationValidationTier`] and
/// `no_web` flag, per spec §4.7:
/// - `no_web` or a dry run: [`validate_dry_run`].
/// - `Basic`: offline fixtures only, via [`validate_offline`].
/// - `Standard`/`Thorough`: offline fixtures, falling back to
///   [`validate_online`] against the router's configured endpoints (one
///   endpoint for `Standard`, both for `Thorough`).
///
/// # Errors
/// Never fails; an unreachable URL is reported as `CitationStatus::Invalid`
/// or `Blocked`, not a tool-call error.
pub fn citations_validate(router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: ValidateArgs = parse_args(args)?;
    let cid = args.cid.unwrap_or_else(|| cid_for(&args.normalized_url));
    let checked_at = now_iso();
    let runs = router.runs();

    let record = if runs.no_web {
        validate_dry_run(&args.normalized_url, &args.url_original, &cid, &checked_at)
    } else if runs.citation_validation_tier == CitationValidationTier::Basic {
        validate_offline(&args.normalized_url, &args.url_original, &cid, &checked_at, router.offline_fixtures())
    } else {
        let offline = validate_offline(&args.normalized_url, &args.url_original, &cid, &checked_at, router.offline_fixtures());
        if offline.status != ro_core::core::CitationStatus::Invalid {
            offline
        } else {
            let configured = router.citation_endpoints();
            let take = match runs.citation_validation_tier {
                CitationValidationTier::Thorough => configured.len(),
                _ => configured.len().min(1),
            };
            let endpoints: Vec<&dyn CitationEndpoint> =
                configured[..take].iter().map(|e| e as &dyn CitationEndpoint).collect();
            validate_online(&args.normalized_url, &args.url_original, &cid, &checked_at, &endpoints)
        }
    };

    to_value(&record)
}

/// `citations_render_md` arguments: the validated citation records to
/// render.
#[derive(Debug, Deserialize)]
struct RenderArgs {
    records: Vec<CitationRecord>,
}

/// `citations_render_md`: runs [`render_citations_markdown`] over
/// `records`.
///
/// # Errors
/// Never fails; rendering is a pure, total function of its input.
pub fn citations_render_md(_router: &ToolRouter, args: Value) -> Result<Value, OrchError> {
    let args: RenderArgs = parse_args(args)?;
    let markdown = render_citations_markdown(&args.records);
    Ok(json!({ "markdown": markdown }))
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
    fn extract_urls_scans_every_document() {
        let result = citations_extract_urls(
            &ToolRouter::for_tests(),
            json!({ "markdown_documents": ["see https://a.example/x", "and https://b.example/y"] }),
        )
        .expect("extracts");
        assert_eq!(result["urls"], json!(["https://a.example/x", "https://b.example/y"]));
    }

    #[test]
    fn normalize_dedupes_equivalent_urls() {
        let result = citations_normalize(
            &ToolRouter::for_tests(),
            json!({ "urls": ["https://Example.com/a", "https://example.com/a?utm_source=x"] }),
        )
        .expect("normalizes");
        assert_eq!(result["items"].as_array().expect("items array").len(), 1);
    }

    #[test]
    fn validate_with_no_web_always_dry_runs() {
        let mut router = ToolRouter::for_tests();
        router.runs_mut().no_web = true;
        let result = citations_validate(
            &router,
            json!({ "normalized_url": "https://example.com/a", "url_original": "https://example.com/a" }),
        )
        .expect("validates");
        assert_eq!(result["status"], json!("blocked"));
    }
}
