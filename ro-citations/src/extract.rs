// ro-citations/src/extract.rs
// ============================================================================
// Module: URL Extraction
// Description: Scans wave-output markdown for absolute http(s) URLs.
// Purpose: Give the citation subsystem a single, deterministic scan that
//          never mistakes trailing markdown punctuation for part of a URL.
// Dependencies: url
// ============================================================================

use url::Url;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '>', '"', '\''];

/// Extracts every absolute `http://`/`https://` URL token from `markdown`,
/// in the order first seen, including duplicates (callers dedupe via the
/// URL map).
///
/// A token is accepted only if, after trimming trailing punctuation
/// ([`TRAILING_PUNCTUATION`]), it parses as an absolute URL with an
/// `http`/`https` scheme.
#[must_use]
pub fn extract_urls(markdown: &str) -> Vec<String> {
    let mut found = Vec::new();
    for word in markdown.split_whitespace() {
        let mut candidate = word;
        // Markdown link syntax `[text](https://example.com)` and bare
        // angle-bracket autolinks `<https://example.com>` both wrap the URL
        // in a single leading/trailing bracket character.
        candidate = candidate.trim_start_matches(['(', '<', '[']);
        candidate = candidate.trim_end_matches(TRAILING_PUNCTUATION);
        if !(candidate.starts_with("http://") || candidate.starts_with("https://")) {
            continue;
        }
        match Url::parse(candidate) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
                found.push(candidate.to_string());
            }
            _ => {}
        }
    }
    found
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
    fn extracts_plain_url() {
        let markdown = "See https://example.com/report for details.";
        assert_eq!(extract_urls(markdown), vec!["https://example.com/report"]);
    }

    #[test]
    fn extracts_url_from_markdown_link() {
        let markdown = "See [the report](https://example.com/report).";
        assert_eq!(extract_urls(markdown), vec!["https://example.com/report"]);
    }

    #[test]
    fn rejects_non_http_scheme() {
        let markdown = "Contact ftp://example.com/file or mailto:a@example.com.";
        assert!(extract_urls(markdown).is_empty());
    }

    #[test]
    fn preserves_duplicate_order() {
        let markdown = "https://a.example and again https://a.example.";
        let urls = extract_urls(markdown);
        assert_eq!(urls, vec!["https://a.example", "https://a.example"]);
    }
}
