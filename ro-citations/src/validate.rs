// ro-citations/src/validate.rs
// ============================================================================
// Module: Citation Validation
// Description: Offline-fixture lookup and the three-step online validation
//              ladder (SSRF preflight, direct fetch, endpoint fallback).
// Purpose: Turn a normalized URL into a citation.v1 record without ever
//          reaching a private network destination.
// Dependencies: ro-core, reqwest, url, time, tracing
// ============================================================================

use std::collections::BTreeMap;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use ro_core::artifacts::CitationRecord;
use ro_core::artifacts::CitationStatus;
use serde::Deserialize;
use url::Url;

use crate::ssrf::preflight;

/// Note attached to the citation record when the SSRF preflight step itself
/// rejects a URL, per spec §4.7 step 1 and §8 scenario 4.
pub const SSRF_BLOCKED_NOTE: &str = "private/local target blocked by SSRF policy";

/// Maximum response body read, per spec §4.7.
pub const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;
/// Per-step HTTP timeout, per spec §4.7.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
/// Maximum redirect hops followed, per spec §4.7.
pub const MAX_REDIRECT_HOPS: u32 = 5;

/// One fixture entry in an offline-fixtures file.
#[derive(Debug, Clone, Deserialize)]
pub struct OfflineFixtureEntry {
    /// The recorded validation outcome.
    pub status: CitationStatus,
    /// Page title, if the fixture carries one.
    #[serde(default)]
    pub title: Option<String>,
    /// Publisher name, if the fixture carries one.
    #[serde(default)]
    pub publisher: Option<String>,
    /// Evidentiary excerpt, if the fixture carries one.
    #[serde(default)]
    pub evidence_snippet: Option<String>,
}

/// An offline-fixtures file: a map keyed by normalized URL, original URL
/// text, or cid (whichever the fixture author recorded it under).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfflineFixtures {
    #[serde(flatten)]
    entries: BTreeMap<String, OfflineFixtureEntry>,
}

impl OfflineFixtures {
    /// Looks up a fixture by `normalized_url`, falling back to
    /// `url_original`, then `cid`, per spec §4.7.
    #[must_use]
    pub fn lookup(&self, normalized_url: &str, url_original: &str, cid: &str) -> Option<&OfflineFixtureEntry> {
        self.entries
            .get(normalized_url)
            .or_else(|| self.entries.get(url_original))
            .or_else(|| self.entries.get(cid))
    }
}

/// Validates one URL against `fixtures`, per spec §4.7's offline mode.
#[must_use]
pub fn validate_offline(
    normalized_url: &str,
    url_original: &str,
    cid: &str,
    checked_at: &str,
    fixtures: &OfflineFixtures,
) -> CitationRecord {
    match fixtures.lookup(normalized_url, url_original, cid) {
        Some(entry) => CitationRecord {
            normalized_url: normalized_url.to_string(),
            cid: cid.to_string(),
            url: normalized_url.to_string(),
            url_original: url_original.to_string(),
            status: entry.status,
            checked_at: checked_at.to_string(),
            found_by: Vec::new(),
            notes: None,
            http_status: None,
            title: entry.title.clone(),
            publisher: entry.publisher.clone(),
            evidence_snippet: entry.evidence_snippet.clone(),
        },
        None => CitationRecord {
            normalized_url: normalized_url.to_string(),
            cid: cid.to_string(),
            url: normalized_url.to_string(),
            url_original: url_original.to_string(),
            status: CitationStatus::Invalid,
            checked_at: checked_at.to_string(),
            found_by: Vec::new(),
            notes: Some("offline fixture not found".to_string()),
            http_status: None,
            title: None,
            publisher: None,
            evidence_snippet: None,
        },
    }
}

/// Builds a dry-run citation record: all three ladder steps skipped,
/// status always `blocked`, per spec §4.7.
#[must_use]
pub fn validate_dry_run(normalized_url: &str, url_original: &str, cid: &str, checked_at: &str) -> CitationRecord {
    CitationRecord {
        normalized_url: normalized_url.to_string(),
        cid: cid.to_string(),
        url: normalized_url.to_string(),
        url_original: url_original.to_string(),
        status: CitationStatus::Blocked,
        checked_at: checked_at.to_string(),
        found_by: Vec::new(),
        notes: Some("dry run: all ladder steps skipped".to_string()),
        http_status: None,
        title: None,
        publisher: None,
        evidence_snippet: None,
    }
}

fn classify_http_status(status: u16) -> Option<CitationStatus> {
    match status {
        200..=299 => Some(CitationStatus::Valid),
        401 | 402 | 403 | 451 => Some(CitationStatus::Paywalled),
        404 | 410 => Some(CitationStatus::Invalid),
        _ => None,
    }
}

fn extract_title(body: &str) -> Option<String> {
    let start = body.to_ascii_lowercase().find("<title")?;
    let open = body[start..].find('>')? + start + 1;
    let close = body[open..].find("</title")? + open;
    let title = body[open..close].trim();
    if title.is_empty() { None } else { Some(title.to_string()) }
}

fn read_body_capped(response: &mut Response, cap: usize) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    let mut handle = response.take(u64::try_from(cap).unwrap_or(u64::MAX) + 1);
    handle
        .read_to_end(&mut buf)
        .map_err(|err| format!("failed to read response body: {err}"))?;
    if buf.len() > cap {
        return Err(format!("response body exceeds {cap} bytes"));
    }
    Ok(buf)
}

/// Builds the blocking client used for the direct-fetch step: redirects are
/// disabled so each hop can be re-preflighted manually, matching spec
/// §4.7's "manual redirects re-validated through preflight".
fn build_client() -> Result<Client, String> {
    Client::builder()
        .timeout(FETCH_TIMEOUT)
        .redirect(Policy::none())
        .user_agent("research-orchestrator/0.1")
        .build()
        .map_err(|err| format!("failed to build http client: {err}"))
}

/// One fetch attempt's trace entry, accumulated into a `notes` string on
/// failure.
struct HopTrace {
    url: String,
    outcome: String,
}

/// Performs the direct-fetch ladder step: GETs `url`, following redirects
/// manually (re-preflighting every hop) up to [`MAX_REDIRECT_HOPS`] times.
///
/// Returns `Ok(Some(record_fields))` once a terminal HTTP status is
/// classified, `Ok(None)` if every hop was followed without reaching a
/// classifiable status (redirect loop exhaustion), or `Err` with a trace of
/// what was attempted.
pub fn fetch_direct(
    client: &Client,
    start_url: &str,
    preflight_hop: impl Fn(&Url) -> Result<(), String>,
) -> Result<Option<(CitationStatus, u16, Option<String>)>, String> {
    let mut current = Url::parse(start_url).map_err(|err| format!("invalid url: {err}"))?;
    let mut trace = Vec::new();

    for _ in 0..=MAX_REDIRECT_HOPS {
        if let Err(reason) = preflight_hop(&current) {
            trace.push(HopTrace { url: current.to_string(), outcome: format!("preflight rejected: {reason}") });
            return Err(render_trace(&trace));
        }

        let response = client
            .get(current.clone())
            .send()
            .map_err(|err| {
                trace.push(HopTrace { url: current.to_string(), outcome: format!("request failed: {err}") });
                render_trace(&trace)
            })?;

        let status = response.status().as_u16();
        if (300..400).contains(&status) {
            let Some(location) = response.headers().get(reqwest::header::LOCATION).and_then(|v| v.to_str().ok()) else {
                trace.push(HopTrace { url: current.to_string(), outcome: format!("redirect {status} with no Location") });
                return Err(render_trace(&trace));
            };
            let next = current.join(location).map_err(|err| format!("invalid redirect target: {err}"))?;
            trace.push(HopTrace { url: current.to_string(), outcome: format!("redirected {status} -> {next}") });
            current = next;
            continue;
        }

        let mut response = response;
        let Some(classified) = classify_http_status(status) else {
            trace.push(HopTrace { url: current.to_string(), outcome: format!("unclassified status {status}") });
            return Ok(None);
        };

        let title = if classified == CitationStatus::Valid {
            read_body_capped(&mut response, MAX_RESPONSE_BYTES)
                .ok()
                .and_then(|body| String::from_utf8(body).ok())
                .and_then(|text| extract_title(&text))
        } else {
            None
        };

        return Ok(Some((classified, status, title)));
    }

    trace.push(HopTrace { url: current.to_string(), outcome: "redirect hop limit reached".to_string() });
    Err(render_trace(&trace))
}

fn render_trace(trace: &[HopTrace]) -> String {
    trace
        .iter()
        .map(|hop| format!("{} -> {}", hop.url, hop.outcome))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A remote validation endpoint (bright-data, apify), called as the
/// ladder's final fallback step.
pub trait CitationEndpoint {
    /// Human-readable name used in trace notes.
    fn name(&self) -> &str;
    /// Calls the endpoint for `url` at the given `ladder_step`, returning
    /// the status it reports, or an error describing why the call itself
    /// failed.
    fn call(&self, url: &str, ladder_step: &str) -> Result<CitationStatus, String>;
}

/// JSON body returned by an HTTP citation endpoint.
#[derive(Debug, Deserialize)]
struct HttpEndpointResponse {
    status: CitationStatus,
}

/// A [`CitationEndpoint`] backed by an HTTP remote validator (bright-data,
/// apify), reached via a `GET {endpoint_url}?url=...&step=...` call that
/// returns `{"status": "valid"|"paywalled"|"blocked"|"invalid"|"mismatch"}`.
pub struct HttpCitationEndpoint {
    name: String,
    endpoint_url: String,
}

impl HttpCitationEndpoint {
    /// Builds an endpoint named `name`, calling `endpoint_url` for every
    /// lookup.
    #[must_use]
    pub fn new(name: impl Into<String>, endpoint_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint_url: endpoint_url.into(),
        }
    }
}

impl CitationEndpoint for HttpCitationEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, url: &str, ladder_step: &str) -> Result<CitationStatus, String> {
        let client = build_client().map_err(|err| format!("{}: {err}", self.name))?;
        let response = client
            .get(&self.endpoint_url)
            .query(&[("url", url), ("step", ladder_step)])
            .send()
            .map_err(|err| format!("request to {} failed: {err}", self.name))?;
        if !response.status().is_success() {
            return Err(format!("{} returned http {}", self.name, response.status()));
        }
        let body: HttpEndpointResponse = response
            .json()
            .map_err(|err| format!("{} returned an unparseable body: {err}", self.name))?;
        Ok(body.status)
    }
}

/// Runs the online validation ladder for one URL, per spec §4.7.
///
/// Step 1 (preflight) and step 2 (direct fetch) are attempted first; on
/// failure, `endpoints` are tried in order. A `blocked` result from an
/// endpoint counts as that step's failure, so the next endpoint (or final
/// `blocked` status) is tried.
#[must_use]
pub fn validate_online(
    normalized_url: &str,
    url_original: &str,
    cid: &str,
    checked_at: &str,
    endpoints: &[&dyn CitationEndpoint],
) -> CitationRecord {
    let mut notes = Vec::new();

    let Ok(start_url) = Url::parse(normalized_url) else {
        notes.push(format!("invalid url: {normalized_url}"));
        return blocked_record(normalized_url, url_original, cid, checked_at, &notes);
    };
    if let Err(reason) = preflight(&start_url) {
        return CitationRecord {
            normalized_url: normalized_url.to_string(),
            cid: cid.to_string(),
            url: normalized_url.to_string(),
            url_original: url_original.to_string(),
            status: CitationStatus::Invalid,
            checked_at: checked_at.to_string(),
            found_by: Vec::new(),
            notes: Some(format!("{SSRF_BLOCKED_NOTE}: {reason}")),
            http_status: None,
            title: None,
            publisher: None,
            evidence_snippet: None,
        };
    }

    let client = match build_client() {
        Ok(client) => client,
        Err(err) => {
            notes.push(format!("client build failed: {err}"));
            return blocked_record(normalized_url, url_original, cid, checked_at, &notes);
        }
    };

    match fetch_direct(&client, normalized_url, |url| preflight(url)) {
        Ok(Some((status, http_status, title))) => {
            return CitationRecord {
                normalized_url: normalized_url.to_string(),
                cid: cid.to_string(),
                url: normalized_url.to_string(),
                url_original: url_original.to_string(),
                status,
                checked_at: checked_at.to_string(),
                found_by: Vec::new(),
                notes: None,
                http_status: Some(http_status),
                title,
                publisher: None,
                evidence_snippet: None,
            };
        }
        Ok(None) => notes.push("direct fetch: no classifiable status reached".to_string()),
        Err(trace) => notes.push(format!("direct fetch failed: {trace}")),
    }

    for endpoint in endpoints {
        match endpoint.call(normalized_url, "endpoint") {
            Ok(CitationStatus::Blocked) => {
                notes.push(format!("{}: reported blocked", endpoint.name()));
            }
            Ok(status) => {
                return CitationRecord {
                    normalized_url: normalized_url.to_string(),
                    cid: cid.to_string(),
                    url: normalized_url.to_string(),
                    url_original: url_original.to_string(),
                    status,
                    checked_at: checked_at.to_string(),
                    found_by: Vec::new(),
                    notes: Some(format!("validated via {}", endpoint.name())),
                    http_status: None,
                    title: None,
                    publisher: None,
                    evidence_snippet: None,
                };
            }
            Err(err) => notes.push(format!("{}: {err}", endpoint.name())),
        }
    }

    blocked_record(normalized_url, url_original, cid, checked_at, &notes)
}

fn blocked_record(
    normalized_url: &str,
    url_original: &str,
    cid: &str,
    checked_at: &str,
    notes: &[String],
) -> CitationRecord {
    CitationRecord {
        normalized_url: normalized_url.to_string(),
        cid: cid.to_string(),
        url: normalized_url.to_string(),
        url_original: url_original.to_string(),
        status: CitationStatus::Blocked,
        checked_at: checked_at.to_string(),
        found_by: Vec::new(),
        notes: Some(notes.join("; ")),
        http_status: None,
        title: None,
        publisher: None,
        evidence_snippet: None,
    }
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
    use std::thread;

    use tiny_http::Response as TinyResponse;
    use tiny_http::Server;

    #[test]
    fn offline_lookup_falls_back_to_cid() {
        let mut entries = BTreeMap::new();
        entries.insert(
            "cid_abc".to_string(),
            OfflineFixtureEntry {
                status: CitationStatus::Valid,
                title: Some("Example".to_string()),
                publisher: None,
                evidence_snippet: None,
            },
        );
        let fixtures = OfflineFixtures { entries };
        let record = validate_offline(
            "https://example.com/a",
            "https://example.com/a",
            "cid_abc",
            "2026-01-01T00:00:00Z",
            &fixtures,
        );
        assert_eq!(record.status, CitationStatus::Valid);
        assert_eq!(record.title.as_deref(), Some("Example"));
    }

    #[test]
    fn offline_missing_fixture_is_invalid() {
        let fixtures = OfflineFixtures::default();
        let record = validate_offline(
            "https://example.com/a",
            "https://example.com/a",
            "cid_abc",
            "2026-01-01T00:00:00Z",
            &fixtures,
        );
        assert_eq!(record.status, CitationStatus::Invalid);
        assert_eq!(record.notes.as_deref(), Some("offline fixture not found"));
    }

    #[test]
    fn dry_run_is_always_blocked() {
        let record = validate_dry_run("https://example.com/a", "https://example.com/a", "cid_abc", "2026-01-01T00:00:00Z");
        assert_eq!(record.status, CitationStatus::Blocked);
    }

    #[test]
    fn classifies_2xx_as_valid() {
        assert_eq!(classify_http_status(200), Some(CitationStatus::Valid));
        assert_eq!(classify_http_status(299), Some(CitationStatus::Valid));
    }

    #[test]
    fn classifies_paywall_statuses() {
        for status in [401, 402, 403, 451] {
            assert_eq!(classify_http_status(status), Some(CitationStatus::Paywalled));
        }
    }

    #[test]
    fn classifies_not_found_statuses_as_invalid() {
        assert_eq!(classify_http_status(404), Some(CitationStatus::Invalid));
        assert_eq!(classify_http_status(410), Some(CitationStatus::Invalid));
    }

    #[test]
    fn direct_fetch_classifies_live_server_response() {
        let server = Server::http("127.0.0.1:0").expect("bind local server");
        let addr = server.server_addr().to_ip().expect("ip addr");
        let url = format!("http://{addr}/");
        let handle = thread::spawn(move || {
            if let Ok(request) = server.recv() {
                let response = TinyResponse::from_string("<html><title>Hi</title></html>").with_status_code(200);
                let _ = request.respond(response);
            }
        });

        let client = build_client().expect("builds client");
        let outcome = fetch_direct(&client, &url, |_| Ok(())).expect("fetch succeeds");
        let (status, http_status, title) = outcome.expect("classifiable");
        assert_eq!(status, CitationStatus::Valid);
        assert_eq!(http_status, 200);
        assert_eq!(title.as_deref(), Some("Hi"));

        handle.join().expect("server thread completes");
    }

    #[test]
    fn validate_online_short_circuits_ssrf_preflight_to_invalid() {
        let record = validate_online(
            "http://127.0.0.1/x",
            "http://127.0.0.1/x",
            "cid_abc",
            "2026-01-01T00:00:00Z",
            &[],
        );
        assert_eq!(record.status, CitationStatus::Invalid);
        assert!(
            record.notes.as_deref().unwrap_or_default().contains(SSRF_BLOCKED_NOTE),
            "notes should contain the SSRF-blocked phrase: {:?}",
            record.notes
        );
    }
}
