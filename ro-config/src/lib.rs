// ro-config/src/lib.rs
// ============================================================================
// Module: Research Orchestrator Config
// Description: The §6 environment/configuration flag layer: compiled-in
//              defaults, an optional settings.json file, and PAI_DR_*
//              environment variable overrides, merged in that order of
//              precedence.
// Purpose: Give every other crate one validated, immutable configuration
//          object instead of each reading `std::env` ambiently.
// Dependencies: ro-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`RunsConfig::load`] resolves the flag layer from spec §6 in three
//! layers, lowest to highest precedence: compiled-in [`RunsConfig::default`]
//! values, an optional `settings.json` file, then process environment
//! variables. Parsing follows the teacher's config-crate shape: a
//! `load(path: Option<&Path>)` entry point that reads the file with a size
//! cap, deserializes with `serde_json`, applies environment overrides
//! field-by-field, then calls a cascading [`RunsConfig::validate`],
//! returning the first [`ConfigError`] encountered. Configuration is loaded
//! once per process and passed down explicitly as a parameter object —
//! never read ambiently from inside domain logic.

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use ro_core::core::ManifestLimits;
use ro_core::core::RunMode;
use serde::Deserialize;
use serde::Serialize;

/// Maximum `settings.json` size this crate will read, guarding against a
/// misconfigured or malicious settings file exhausting memory.
pub const MAX_SETTINGS_FILE_BYTES: u64 = 1024 * 1024;

/// Default settings filename, resolved relative to `PAI_DR_RUNS_ROOT` when
/// no explicit path is supplied to [`RunsConfig::load`].
pub const DEFAULT_SETTINGS_FILENAME: &str = "settings.json";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading or validating [`RunsConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `settings.json` exceeded [`MAX_SETTINGS_FILE_BYTES`].
    #[error("settings file {path} is {size} bytes, exceeding the {limit} byte cap")]
    SettingsFileTooLarge {
        /// Offending path.
        path: PathBuf,
        /// Observed size in bytes.
        size: u64,
        /// The configured cap.
        limit: u64,
    },
    /// `settings.json` could not be read from disk.
    #[error("failed to read settings file {path}: {source}")]
    SettingsFileUnreadable {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// `settings.json` did not parse as JSON matching [`SettingsFile`].
    #[error("failed to parse settings file {path}: {source}")]
    SettingsFileInvalid {
        /// Offending path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// A configuration value (env var or settings field) had the wrong
    /// shape for its option.
    #[error("option {option} has an invalid value {value:?}: {reason}")]
    InvalidValue {
        /// Offending option name.
        option: &'static str,
        /// The value actually observed.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A resolved option's value fell outside its documented valid range.
    #[error("option {option} value {value} is outside its valid range {min}..={max}")]
    OutOfRange {
        /// Offending option name.
        option: &'static str,
        /// The resolved value.
        value: i64,
        /// Minimum valid value.
        min: i64,
        /// Maximum valid value.
        max: i64,
    },
    /// `PAI_DR_RUNS_ROOT` (or its default) was not an absolute path.
    #[error("PAI_DR_RUNS_ROOT must be an absolute path, got {0}")]
    RunsRootNotAbsolute(PathBuf),
}

// ============================================================================
// SECTION: Enums
// ============================================================================

/// `PAI_DR_CITATION_VALIDATION_TIER`: how thoroughly the citation subsystem
/// validates extracted URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationValidationTier {
    /// Offline-fixture lookup / direct fetch only, no endpoint fallback.
    Basic,
    /// Direct fetch plus the bright-data endpoint fallback.
    Standard,
    /// The full three-step ladder including the apify endpoint.
    Thorough,
}

impl CitationValidationTier {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "basic" => Some(Self::Basic),
            "standard" => Some(Self::Standard),
            "thorough" => Some(Self::Thorough),
            _ => None,
        }
    }
}

fn parse_run_mode(raw: &str) -> Option<RunMode> {
    match raw {
        "quick" => Some(RunMode::Quick),
        "standard" => Some(RunMode::Standard),
        "deep" => Some(RunMode::Deep),
        _ => None,
    }
}

fn run_mode_str(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Quick => "quick",
        RunMode::Standard => "standard",
        RunMode::Deep => "deep",
    }
}

// ============================================================================
// SECTION: Settings file shape
// ============================================================================

/// The optional `settings.json` document: every field is optional so a
/// settings file may override as few or as many options as it likes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    /// See `PAI_DR_OPTION_C_ENABLED`.
    #[serde(default)]
    pub option_c_enabled: Option<bool>,
    /// See `PAI_DR_MODE_DEFAULT`.
    #[serde(default)]
    pub mode_default: Option<String>,
    /// See `PAI_DR_MAX_WAVE1_AGENTS`.
    #[serde(default)]
    pub max_wave1_agents: Option<u32>,
    /// See `PAI_DR_MAX_WAVE2_AGENTS`.
    #[serde(default)]
    pub max_wave2_agents: Option<u32>,
    /// See `PAI_DR_MAX_SUMMARY_KB`.
    #[serde(default)]
    pub max_summary_kb: Option<u32>,
    /// See `PAI_DR_MAX_TOTAL_SUMMARY_KB`.
    #[serde(default)]
    pub max_total_summary_kb: Option<u32>,
    /// See `PAI_DR_MAX_REVIEW_ITERATIONS`.
    #[serde(default)]
    pub max_review_iterations: Option<u32>,
    /// See `PAI_DR_CITATION_VALIDATION_TIER`.
    #[serde(default)]
    pub citation_validation_tier: Option<String>,
    /// See `PAI_DR_CITATIONS_BRIGHT_DATA_ENDPOINT`.
    #[serde(default)]
    pub citations_bright_data_endpoint: Option<String>,
    /// See `PAI_DR_CITATIONS_APIFY_ENDPOINT`.
    #[serde(default)]
    pub citations_apify_endpoint: Option<String>,
    /// See `PAI_DR_NO_WEB`.
    #[serde(default)]
    pub no_web: Option<bool>,
    /// See `PAI_DR_RUNS_ROOT`.
    #[serde(default)]
    pub runs_root: Option<String>,
    /// See `PAI_DR_LOG_JSON` (ambient addition, not part of the domain's
    /// correctness surface).
    #[serde(default)]
    pub log_json: Option<bool>,
}

impl SettingsFile {
    /// Reads and parses `path`, enforcing [`MAX_SETTINGS_FILE_BYTES`].
    ///
    /// # Errors
    /// [`ConfigError::SettingsFileTooLarge`], [`ConfigError::SettingsFileUnreadable`],
    /// or [`ConfigError::SettingsFileInvalid`].
    pub fn read_from(path: &Path) -> Result<Self, ConfigError> {
        let metadata = fs::metadata(path).map_err(|source| ConfigError::SettingsFileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        if metadata.len() > MAX_SETTINGS_FILE_BYTES {
            return Err(ConfigError::SettingsFileTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit: MAX_SETTINGS_FILE_BYTES,
            });
        }
        let bytes = fs::read(path).map_err(|source| ConfigError::SettingsFileUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::SettingsFileInvalid {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ============================================================================
// SECTION: RunsConfig
// ============================================================================

/// The fully resolved, validated configuration for one process, per spec
/// §6's "Environment / configuration" table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunsConfig {
    /// `PAI_DR_OPTION_C_ENABLED`: enables the optional "Option C" workflow
    /// variant. This system carries no behavior behind the flag beyond
    /// exposing it for forward compatibility with callers that already
    /// gate on it (see DESIGN.md's Open Questions).
    pub option_c_enabled: bool,
    /// `PAI_DR_MODE_DEFAULT`: the run mode `run_init` uses when the caller
    /// does not specify one.
    pub mode_default: RunMode,
    /// `PAI_DR_MAX_WAVE1_AGENTS`, 1..=50.
    pub max_wave1_agents: u32,
    /// `PAI_DR_MAX_WAVE2_AGENTS`, 1..=50.
    pub max_wave2_agents: u32,
    /// `PAI_DR_MAX_SUMMARY_KB`, 1..=1000.
    pub max_summary_kb: u32,
    /// `PAI_DR_MAX_TOTAL_SUMMARY_KB`, 1..=100000.
    pub max_total_summary_kb: u32,
    /// `PAI_DR_MAX_REVIEW_ITERATIONS`, 0..=50.
    pub max_review_iterations: u32,
    /// `PAI_DR_CITATION_VALIDATION_TIER`.
    pub citation_validation_tier: CitationValidationTier,
    /// `PAI_DR_CITATIONS_BRIGHT_DATA_ENDPOINT`.
    pub citations_bright_data_endpoint: Option<String>,
    /// `PAI_DR_CITATIONS_APIFY_ENDPOINT`.
    pub citations_apify_endpoint: Option<String>,
    /// `PAI_DR_NO_WEB`: forces offline citation mode regardless of a run's
    /// `query.sensitivity`.
    pub no_web: bool,
    /// `PAI_DR_RUNS_ROOT`: absolute root directory under which run roots
    /// are created.
    pub runs_root: PathBuf,
    /// `PAI_DR_LOG_JSON` (ambient addition): switches the `tracing`
    /// subscriber `ro-cli` installs to JSON output.
    pub log_json: bool,
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            option_c_enabled: false,
            mode_default: RunMode::Standard,
            max_wave1_agents: 5,
            max_wave2_agents: 3,
            max_summary_kb: 10,
            max_total_summary_kb: 50,
            max_review_iterations: 2,
            citation_validation_tier: CitationValidationTier::Standard,
            citations_bright_data_endpoint: None,
            citations_apify_endpoint: None,
            no_web: false,
            runs_root: default_runs_root(),
            log_json: false,
        }
    }
}

fn default_runs_root() -> PathBuf {
    env::temp_dir().join("research-orchestrator-runs")
}

fn env_var(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_bool_env(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw {
        "1" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            option: name,
            value: other.to_string(),
            reason: "expected a boolean (1/0/true/false)".to_string(),
        }),
    }
}

fn parse_u32_env(name: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.parse::<u32>().map_err(|err| ConfigError::InvalidValue {
        option: name,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

impl RunsConfig {
    /// Resolves the flag layer: [`RunsConfig::default`] → `settings.json`
    /// → process environment, in that order of precedence.
    ///
    /// `settings_path` overrides the default settings-file location
    /// (`<runs_root>/settings.json`); pass `None` to use the default. A
    /// missing settings file at the resolved location is not an error —
    /// defaults apply as if the file were empty.
    ///
    /// # Errors
    /// Any [`ConfigError`] raised while reading, parsing, or validating the
    /// resolved configuration.
    pub fn load(settings_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let resolved_settings_path = settings_path.map_or_else(
            || config.runs_root.join(DEFAULT_SETTINGS_FILENAME),
            Path::to_path_buf,
        );
        if resolved_settings_path.exists() {
            let settings = SettingsFile::read_from(&resolved_settings_path)?;
            config.apply_settings_file(&settings)?;
        }

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_settings_file(&mut self, settings: &SettingsFile) -> Result<(), ConfigError> {
        if let Some(value) = settings.option_c_enabled {
            self.option_c_enabled = value;
        }
        if let Some(raw) = &settings.mode_default {
            self.mode_default = parse_run_mode(raw).ok_or_else(|| ConfigError::InvalidValue {
                option: "mode_default",
                value: raw.clone(),
                reason: "expected quick, standard, or deep".to_string(),
            })?;
        }
        if let Some(value) = settings.max_wave1_agents {
            self.max_wave1_agents = value;
        }
        if let Some(value) = settings.max_wave2_agents {
            self.max_wave2_agents = value;
        }
        if let Some(value) = settings.max_summary_kb {
            self.max_summary_kb = value;
        }
        if let Some(value) = settings.max_total_summary_kb {
            self.max_total_summary_kb = value;
        }
        if let Some(value) = settings.max_review_iterations {
            self.max_review_iterations = value;
        }
        if let Some(raw) = &settings.citation_validation_tier {
            self.citation_validation_tier =
                CitationValidationTier::parse(raw).ok_or_else(|| ConfigError::InvalidValue {
                    option: "citation_validation_tier",
                    value: raw.clone(),
                    reason: "expected basic, standard, or thorough".to_string(),
                })?;
        }
        if let Some(value) = &settings.citations_bright_data_endpoint {
            self.citations_bright_data_endpoint = Some(value.clone());
        }
        if let Some(value) = &settings.citations_apify_endpoint {
            self.citations_apify_endpoint = Some(value.clone());
        }
        if let Some(value) = settings.no_web {
            self.no_web = value;
        }
        if let Some(value) = &settings.runs_root {
            self.runs_root = PathBuf::from(value);
        }
        if let Some(value) = settings.log_json {
            self.log_json = value;
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(raw) = env_var("PAI_DR_OPTION_C_ENABLED") {
            self.option_c_enabled = parse_bool_env("PAI_DR_OPTION_C_ENABLED", &raw)?;
        }
        if let Some(raw) = env_var("PAI_DR_MODE_DEFAULT") {
            self.mode_default = parse_run_mode(&raw).ok_or_else(|| ConfigError::InvalidValue {
                option: "PAI_DR_MODE_DEFAULT",
                value: raw.clone(),
                reason: "expected quick, standard, or deep".to_string(),
            })?;
        }
        if let Some(raw) = env_var("PAI_DR_MAX_WAVE1_AGENTS") {
            self.max_wave1_agents = parse_u32_env("PAI_DR_MAX_WAVE1_AGENTS", &raw)?;
        }
        if let Some(raw) = env_var("PAI_DR_MAX_WAVE2_AGENTS") {
            self.max_wave2_agents = parse_u32_env("PAI_DR_MAX_WAVE2_AGENTS", &raw)?;
        }
        if let Some(raw) = env_var("PAI_DR_MAX_SUMMARY_KB") {
            self.max_summary_kb = parse_u32_env("PAI_DR_MAX_SUMMARY_KB", &raw)?;
        }
        if let Some(raw) = env_var("PAI_DR_MAX_TOTAL_SUMMARY_KB") {
            self.max_total_summary_kb = parse_u32_env("PAI_DR_MAX_TOTAL_SUMMARY_KB", &raw)?;
        }
        if let Some(raw) = env_var("PAI_DR_MAX_REVIEW_ITERATIONS") {
            self.max_review_iterations = parse_u32_env("PAI_DR_MAX_REVIEW_ITERATIONS", &raw)?;
        }
        if let Some(raw) = env_var("PAI_DR_CITATION_VALIDATION_TIER") {
            self.citation_validation_tier =
                CitationValidationTier::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                    option: "PAI_DR_CITATION_VALIDATION_TIER",
                    value: raw.clone(),
                    reason: "expected basic, standard, or thorough".to_string(),
                })?;
        }
        if let Some(raw) = env_var("PAI_DR_CITATIONS_BRIGHT_DATA_ENDPOINT") {
            self.citations_bright_data_endpoint = Some(raw);
        }
        if let Some(raw) = env_var("PAI_DR_CITATIONS_APIFY_ENDPOINT") {
            self.citations_apify_endpoint = Some(raw);
        }
        if let Some(raw) = env_var("PAI_DR_NO_WEB") {
            self.no_web = parse_bool_env("PAI_DR_NO_WEB", &raw)?;
        }
        if let Some(raw) = env_var("PAI_DR_RUNS_ROOT") {
            self.runs_root = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("PAI_DR_LOG_JSON") {
            self.log_json = parse_bool_env("PAI_DR_LOG_JSON", &raw)?;
        }
        Ok(())
    }

    /// Validates every resolved option against its documented range,
    /// returning the first violation found.
    ///
    /// # Errors
    /// [`ConfigError::OutOfRange`] or [`ConfigError::RunsRootNotAbsolute`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("max_wave1_agents", self.max_wave1_agents, 1, 50)?;
        check_range("max_wave2_agents", self.max_wave2_agents, 1, 50)?;
        check_range("max_summary_kb", self.max_summary_kb, 1, 1000)?;
        check_range("max_total_summary_kb", self.max_total_summary_kb, 1, 100_000)?;
        check_range("max_review_iterations", self.max_review_iterations, 0, 50)?;
        if !self.runs_root.is_absolute() {
            return Err(ConfigError::RunsRootNotAbsolute(self.runs_root.clone()));
        }
        Ok(())
    }

    /// Builds the default [`ManifestLimits`] a fresh run should carry from
    /// this configuration.
    #[must_use]
    pub fn default_manifest_limits(&self) -> ManifestLimits {
        ManifestLimits {
            max_wave1_agents: self.max_wave1_agents,
            max_wave2_agents: self.max_wave2_agents,
            max_summary_kb: self.max_summary_kb,
            max_total_summary_kb: self.max_total_summary_kb,
            max_review_iterations: self.max_review_iterations,
        }
    }

    /// The run-mode token (`"quick"`/`"standard"`/`"deep"`) for display.
    #[must_use]
    pub fn mode_default_str(&self) -> &'static str {
        run_mode_str(self.mode_default)
    }
}

fn check_range(option: &'static str, value: u32, min: u32, max: u32) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            option,
            value: i64::from(value),
            min: i64::from(min),
            max: i64::from(max),
        });
    }
    Ok(())
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
    fn defaults_validate_cleanly() {
        RunsConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn settings_file_overrides_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings_path = dir.path().join("settings.json");
        fs::write(
            &settings_path,
            r#"{"max_wave1_agents": 12, "no_web": true, "runs_root": "/tmp/custom-runs"}"#,
        )
        .expect("write settings");

        let config = RunsConfig::load(Some(&settings_path)).expect("loads");
        assert_eq!(config.max_wave1_agents, 12);
        assert!(config.no_web);
        assert_eq!(config.runs_root, PathBuf::from("/tmp/custom-runs"));
    }

    #[test]
    fn env_overrides_settings_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings_path = dir.path().join("settings.json");
        fs::write(&settings_path, r#"{"max_wave1_agents": 12}"#).expect("write settings");

        // Single-threaded env mutation for this test only; no other test in
        // this crate reads PAI_DR_MAX_WAVE1_AGENTS.
        #[allow(unsafe_code, reason = "test-only env mutation, not reachable from production code paths")]
        {
            unsafe {
                env::set_var("PAI_DR_MAX_WAVE1_AGENTS", "7");
            }
        }
        let config = RunsConfig::load(Some(&settings_path)).expect("loads");
        #[allow(unsafe_code, reason = "test-only env mutation, not reachable from production code paths")]
        {
            unsafe {
                env::remove_var("PAI_DR_MAX_WAVE1_AGENTS");
            }
        }
        assert_eq!(config.max_wave1_agents, 7);
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings_path = dir.path().join("settings.json");
        fs::write(&settings_path, r#"{"max_review_iterations": 999}"#).expect("write settings");

        let err = RunsConfig::load(Some(&settings_path)).expect_err("999 exceeds the 0..=50 range");
        assert!(matches!(err, ConfigError::OutOfRange { option: "max_review_iterations", .. }));
    }

    #[test]
    fn missing_settings_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings_path = dir.path().join("does-not-exist.json");
        let config = RunsConfig::load(Some(&settings_path)).expect("missing file is not an error");
        assert_eq!(config, RunsConfig::default());
    }

    #[test]
    fn oversized_settings_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings_path = dir.path().join("settings.json");
        let padding = "x".repeat(usize::try_from(MAX_SETTINGS_FILE_BYTES).unwrap_or(usize::MAX) + 16);
        fs::write(&settings_path, format!(r#"{{"_pad": "{padding}"}}"#)).expect("write oversized settings");

        let err = RunsConfig::load(Some(&settings_path)).expect_err("oversized file is rejected");
        assert!(matches!(err, ConfigError::SettingsFileTooLarge { .. }));
    }
}
