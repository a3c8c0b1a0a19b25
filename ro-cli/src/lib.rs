// ro-cli/src/lib.rs
// ============================================================================
// Module: Research Orchestrator CLI Library
// Description: Shared helpers behind the `research-orchestrator` binary: a
//              localized error wrapper and the shell-subprocess
//              `RunAgentDriver` implementation the CLI uses to stand in for
//              `runAgent`.
// Purpose: Keep `main.rs` to argument parsing and command dispatch; every
//          other behavior lives here so it can be unit tested directly.
// Dependencies: ro-core, ro-toolsurface, thiserror
// ============================================================================

//! ## Overview
//! `runAgent` is out of scope for this workspace (spec §6): it is an
//! external collaborator the orchestrator invokes and trusts. The CLI's
//! only obligation is to supply *some* [`ro_toolsurface::RunAgentDriver`]
//! so a human operator can drive a run from the shell; [`ShellAgentDriver`]
//! does so by shelling out to an operator-supplied command per
//! perspective, passing the prompt on stdin and reading the rendered
//! markdown from stdout.

use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use ro_core::OrchError;
use ro_core::core::RunId;
use ro_core::core::identifiers::PerspectiveId;
use ro_toolsurface::AgentOutput;
use ro_toolsurface::RunAgentDriver;
use serde_json::json;

/// A CLI-level error, wrapping whatever lower-layer error produced it in a
/// single human-readable message.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CliError {
    /// The rendered error message.
    message: String,
}

impl CliError {
    /// Builds a [`CliError`] from any message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl From<OrchError> for CliError {
    fn from(err: OrchError) -> Self {
        Self::new(err.to_string())
    }
}

/// Result alias for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// A [`RunAgentDriver`] that shells out to an operator-supplied command for
/// every perspective, per spec §6's "Agent driver" interface.
///
/// The command is run as `sh -c <command>` with the perspective's prompt
/// markdown piped to stdin and these environment variables set:
/// `RO_RUN_ID`, `RO_STAGE`, `RO_PERSPECTIVE_ID`, `RO_AGENT_TYPE`,
/// `RO_OUTPUT_MD`. The command's stdout is taken verbatim as the agent's
/// rendered markdown; a non-zero exit status is reported as
/// [`AgentOutput::error`] rather than a transport failure, so the
/// orchestrator can record it as `RUN_AGENT_FAILED` instead of aborting
/// the whole tick.
#[derive(Debug, Clone)]
pub struct ShellAgentDriver {
    command: String,
}

impl ShellAgentDriver {
    /// Builds a driver that runs `command` for every perspective.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into() }
    }
}

impl RunAgentDriver for ShellAgentDriver {
    fn run_agent(
        &self,
        run_id: &RunId,
        stage: &str,
        run_root: &Path,
        perspective_id: &PerspectiveId,
        agent_type: &str,
        prompt_md: &str,
        output_md: &str,
    ) -> Result<AgentOutput, OrchError> {
        use std::io::Write;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(run_root)
            .env("RO_RUN_ID", run_id.as_str())
            .env("RO_STAGE", stage)
            .env("RO_PERSPECTIVE_ID", perspective_id.as_str())
            .env("RO_AGENT_TYPE", agent_type)
            .env("RO_OUTPUT_MD", output_md)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                OrchError::new(
                    ro_core::OrchErrorCode::RunAgentFailed,
                    format!("failed to spawn agent command: {err}"),
                )
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(prompt_md.as_bytes());
        }

        let output = child.wait_with_output().map_err(|err| {
            OrchError::new(
                ro_core::OrchErrorCode::RunAgentFailed,
                format!("failed to wait on agent command: {err}"),
            )
        })?;

        if !output.status.success() {
            return Ok(AgentOutput {
                markdown: String::new(),
                agent_run_id: None,
                started_at: None,
                finished_at: None,
                error: Some(json!({
                    "exit_code": output.status.code(),
                    "stderr": String::from_utf8_lossy(&output.stderr),
                })),
            });
        }

        Ok(AgentOutput {
            markdown: String::from_utf8_lossy(&output.stdout).into_owned(),
            agent_run_id: None,
            started_at: None,
            finished_at: None,
            error: None,
        })
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

    #[test]
    fn shell_agent_driver_captures_stdout_as_markdown() {
        let driver = ShellAgentDriver::new("cat");
        let dir = tempfile::tempdir().expect("tempdir");
        let output = driver
            .run_agent(
                &RunId::new("run_1"),
                "wave1",
                dir.path(),
                &PerspectiveId::new("p1"),
                "research_agent",
                "## Scope Contract\nhello\n",
                "wave-1/p1.md",
            )
            .expect("runs");
        assert_eq!(output.markdown, "## Scope Contract\nhello\n");
        assert!(output.error.is_none());
    }

    #[test]
    fn shell_agent_driver_reports_nonzero_exit_as_error() {
        let driver = ShellAgentDriver::new("exit 7");
        let dir = tempfile::tempdir().expect("tempdir");
        let output = driver
            .run_agent(
                &RunId::new("run_1"),
                "wave1",
                dir.path(),
                &PerspectiveId::new("p1"),
                "research_agent",
                "prompt",
                "wave-1/p1.md",
            )
            .expect("runs");
        assert!(output.markdown.is_empty());
        assert_eq!(output.error.expect("error present")["exit_code"], json!(7));
    }
}
