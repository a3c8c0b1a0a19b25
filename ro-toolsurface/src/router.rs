// ro-toolsurface/src/router.rs
// ============================================================================
// Module: Tool Router
// Description: The per-process handle every operation wrapper is called
//              through: resolved configuration, run-root resolution, and
//              the citation endpoints the online validation ladder falls
//              back to.
// Purpose: Give every `ops::*` function one place to read configuration and
//          compute paths from, instead of threading a dozen parameters.
// Dependencies: ro-core, ro-config, ro-citations
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use ro_citations::HttpCitationEndpoint;
use ro_citations::OfflineFixtures;
use ro_config::RunsConfig;
use ro_core::OrchError;
use ro_core::OrchErrorCode;
use ro_core::core::identifiers::RunId;

/// Construction inputs for a [`ToolRouter`], grouped so `ToolRouter::new`
/// takes one argument instead of an ever-growing parameter list (the
/// teacher's `ToolRouterConfig` / `ToolRouter` split).
#[derive(Debug, Clone, Default)]
pub struct ToolRouterConfig {
    /// Resolved runtime configuration (spec §6's `PAI_DR_*` flag layer).
    pub runs: RunsConfig,
    /// Path to an offline-fixtures JSON file, used by `citations_validate`
    /// when the run's citation validation tier is `offline` or a test
    /// fixture is explicitly requested.
    pub offline_fixtures_path: Option<PathBuf>,
}

/// The tool-call surface's per-process handle: resolved configuration plus
/// the citation endpoints the online validation ladder's final step falls
/// back to.
#[derive(Debug, Clone)]
pub struct ToolRouter {
    runs: RunsConfig,
    offline_fixtures: OfflineFixtures,
}

impl ToolRouter {
    /// Builds a router from `config`, loading the offline-fixtures file if
    /// one was named.
    ///
    /// # Errors
    /// Propagates [`OfflineFixtures`] deserialization failures as
    /// [`OrchErrorCode::InvalidJson`].
    pub fn new(config: ToolRouterConfig) -> Result<Self, OrchError> {
        let offline_fixtures = match &config.offline_fixtures_path {
            Some(path) => load_offline_fixtures(path)?,
            None => OfflineFixtures::default(),
        };
        Ok(Self {
            runs: config.runs,
            offline_fixtures,
        })
    }

    /// The resolved runtime configuration backing this router.
    #[must_use]
    pub fn runs(&self) -> &RunsConfig {
        &self.runs
    }

    /// The root directory a run with id `run_id` lives under.
    #[must_use]
    pub fn run_root(&self, run_id: &RunId) -> PathBuf {
        self.runs.runs_root.join(run_id.as_str())
    }

    /// The offline citation fixtures loaded for this router, empty if none
    /// were configured.
    #[must_use]
    pub fn offline_fixtures(&self) -> &OfflineFixtures {
        &self.offline_fixtures
    }

    /// The remote citation endpoints the online validation ladder's final
    /// step falls back to, built from the configured endpoint URLs. Empty
    /// when no endpoint was configured, in which case the ladder's earlier
    /// steps (preflight, direct fetch) are the only validation attempted.
    #[must_use]
    pub fn citation_endpoints(&self) -> Vec<HttpCitationEndpoint> {
        let mut endpoints = Vec::new();
        if let Some(url) = &self.runs.citations_bright_data_endpoint {
            endpoints.push(HttpCitationEndpoint::new("bright-data", url.clone()));
        }
        if let Some(url) = &self.runs.citations_apify_endpoint {
            endpoints.push(HttpCitationEndpoint::new("apify", url.clone()));
        }
        endpoints
    }

    /// Builds a router over a freshly created temporary runs root, for unit
    /// tests that only need a router to exist rather than any particular
    /// configuration.
    #[cfg(test)]
    #[must_use]
    #[allow(clippy::expect_used, reason = "test-only constructor, not reachable from production code")]
    pub fn for_tests() -> Self {
        let dir = tempfile::tempdir().expect("tempdir for test router");
        let mut runs = RunsConfig::default();
        runs.runs_root = dir.into_path();
        Self {
            runs,
            offline_fixtures: OfflineFixtures::default(),
        }
    }

    /// Mutable access to this router's configuration, for tests that need
    /// to exercise a non-default flag combination.
    #[cfg(test)]
    pub fn runs_mut(&mut self) -> &mut RunsConfig {
        &mut self.runs
    }
}

fn load_offline_fixtures(path: &Path) -> Result<OfflineFixtures, OrchError> {
    let bytes = std::fs::read(path).map_err(|err| {
        OrchError::new(
            OrchErrorCode::NotFound,
            format!("failed to read offline fixtures at {}: {err}", path.display()),
        )
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        OrchError::new(
            OrchErrorCode::InvalidJson,
            format!("failed to parse offline fixtures at {}: {err}", path.display()),
        )
    })
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
    fn router_without_endpoints_has_none_configured() {
        let router = ToolRouter::for_tests();
        assert!(router.citation_endpoints().is_empty());
    }
}
