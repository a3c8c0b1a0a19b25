// ro-citations/src/render.rs
// ============================================================================
// Module: Citation Markdown Rendering
// Description: Deterministic markdown rendering of validated citations.
// Dependencies: ro-core
// ============================================================================

use ro_core::artifacts::CitationRecord;
use ro_core::artifacts::CitationStatus;

use crate::redact::redact_sensitive;

/// Renders a [`CitationStatus`] as the snake_case string the artifact
/// schema uses on disk (`citation.v1`'s `status` field), not its Rust
/// variant name.
fn status_label(status: CitationStatus) -> &'static str {
    match status {
        CitationStatus::Valid => "valid",
        CitationStatus::Paywalled => "paywalled",
        CitationStatus::Blocked => "blocked",
        CitationStatus::Mismatch => "mismatch",
        CitationStatus::Invalid => "invalid",
    }
}

/// Renders `records` as deterministic markdown, sorted by
/// `(normalized_url, cid)`, one section per cid, per spec §4.7.
#[must_use]
pub fn render_citations_markdown(records: &[CitationRecord]) -> String {
    let mut sorted: Vec<&CitationRecord> = records.iter().collect();
    sorted.sort_by(|a, b| (&a.normalized_url, &a.cid).cmp(&(&b.normalized_url, &b.cid)));

    let mut out = String::new();
    out.push_str("# Citations\n\n");
    for record in sorted {
        out.push_str(&format!("## {}\n\n", record.cid));
        out.push_str(&format!("- URL: {}\n", redact_sensitive(&record.url)));
        out.push_str(&format!("- Status: {}\n", status_label(record.status)));
        if let Some(title) = &record.title {
            out.push_str(&format!("- Title: {title}\n"));
        }
        if let Some(publisher) = &record.publisher {
            out.push_str(&format!("- Publisher: {publisher}\n"));
        }
        out.push('\n');
    }
    out
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
    use ro_core::artifacts::CitationStatus;

    fn record(normalized_url: &str, cid: &str) -> CitationRecord {
        CitationRecord {
            normalized_url: normalized_url.to_string(),
            cid: cid.to_string(),
            url: normalized_url.to_string(),
            url_original: normalized_url.to_string(),
            status: CitationStatus::Valid,
            checked_at: "2026-01-01T00:00:00Z".to_string(),
            found_by: Vec::new(),
            notes: None,
            http_status: Some(200),
            title: Some("Example Title".to_string()),
            publisher: None,
            evidence_snippet: None,
        }
    }

    #[test]
    fn sorts_by_normalized_url_then_cid() {
        let records = vec![record("https://b.example", "cid_b"), record("https://a.example", "cid_a")];
        let markdown = render_citations_markdown(&records);
        let a_pos = markdown.find("cid_a").expect("cid_a present");
        let b_pos = markdown.find("cid_b").expect("cid_b present");
        assert!(a_pos < b_pos);
    }

    #[test]
    fn renders_status_in_snake_case() {
        let markdown = render_citations_markdown(&[record("https://a.example", "cid_a")]);
        assert!(markdown.contains("- Status: valid\n"));
        assert!(!markdown.contains("Valid\n"));
    }

    #[test]
    fn redacts_sensitive_query_params_in_rendered_url() {
        let mut r = record("https://example.com/a?api_key=secret", "cid_x");
        r.url = "https://example.com/a?api_key=secret".to_string();
        let markdown = render_citations_markdown(&[r]);
        assert!(!markdown.contains("secret"));
    }
}
