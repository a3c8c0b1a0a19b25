#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        reason = "Test-only assertions are permitted."
    )
)]
// ro-cli/src/main.rs
// ============================================================================
// Module: Research Orchestrator CLI Entry Point
// Description: Command dispatcher driving `ro-toolsurface` from the shell:
//              run creation, generic tool-call dispatch, and the tick/run
//              loops that need a `RunAgentDriver`.
// Purpose: Give operators and CI a thin, scriptable front end over the
//          tool-call surface spec §6 defines, without embedding any
//          orchestration logic of its own.
// Dependencies: clap, ro-config, ro-core, ro-toolsurface, ro-cli, serde_json,
//               tracing, tracing-subscriber
// ============================================================================

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use ro_cli::CliError;
use ro_cli::CliResult;
use ro_cli::ShellAgentDriver;
use ro_config::RunsConfig;
use ro_toolsurface::ToolRouter;
use ro_toolsurface::ToolRouterConfig;
use ro_toolsurface::dispatch;
use ro_toolsurface::tick;
use serde_json::Value;
use serde_json::json;

/// The `research-orchestrator` CLI.
#[derive(Parser, Debug)]
#[command(
    name = "research-orchestrator",
    about = "Drives the deterministic research-run orchestrator's tool-call surface.",
    disable_help_subcommand = true,
    arg_required_else_help = true
)]
struct Cli {
    /// Path to `settings.json` (defaults to `<runs-root>/settings.json`).
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,
    /// Overrides `PAI_DR_RUNS_ROOT` for this invocation.
    #[arg(long, global = true, value_name = "DIR")]
    runs_root: Option<PathBuf>,
    /// Emit structured JSON logs instead of human-readable ones.
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    log_json: bool,
    /// Selected subcommand.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Creates a fresh run root via `run_init`.
    Init(InitArgs),
    /// Invokes one named tool-call operation directly.
    Call(CallArgs),
    /// Runs a single tick of one orchestrator phase.
    Tick(TickArgs),
    /// Drives one orchestrator phase to completion (capped).
    Run(RunArgs),
}

/// Arguments for `init`.
#[derive(Args, Debug)]
struct InitArgs {
    /// The research query's text.
    #[arg(long)]
    query: String,
    /// Query sensitivity: `normal`, `restricted`, or `no_web`.
    #[arg(long, default_value = "normal")]
    sensitivity: String,
    /// Run mode: `quick`, `standard`, or `deep`. Defaults to the
    /// resolved configuration's default mode.
    #[arg(long)]
    mode: Option<String>,
}

/// Arguments for `call`.
#[derive(Args, Debug)]
struct CallArgs {
    /// The operation name, e.g. `gate_a_evaluate` (see spec §6 for the
    /// full list).
    operation: String,
    /// Inline JSON arguments. Mutually exclusive with `--args-file`.
    #[arg(long, conflicts_with = "args_file")]
    args: Option<String>,
    /// Path to a file containing the JSON arguments.
    #[arg(long, conflicts_with = "args")]
    args_file: Option<PathBuf>,
}

/// The orchestrator phase a `tick` or `run` command drives.
#[derive(ValueEnum, Copy, Clone, Debug)]
#[value(rename_all = "kebab-case")]
enum Phase {
    /// `init → wave1 → pivot`.
    PrePivot,
    /// `pivot → {wave2} → citations`.
    PostPivot,
    /// `summaries → synthesis → review → {synthesis | finalize}`.
    PostSummaries,
}

/// Arguments shared by `tick` and `run`: the run to drive and, for phases
/// that call `runAgent`, the shell command standing in for it.
#[derive(Args, Debug)]
struct TickArgs {
    /// Phase to advance.
    phase: Phase,
    /// The run id to drive.
    #[arg(long)]
    run_id: String,
    /// Shell command invoked once per wave-1/wave-2 perspective, required
    /// for `pre-pivot` and `post-pivot`. The perspective's prompt is piped
    /// to the command's stdin; its stdout is taken as the agent's
    /// rendered markdown.
    #[arg(long)]
    agent_cmd: Option<String>,
}

/// Arguments for `run` (identical shape to `tick`; a distinct struct keeps
/// `clap`'s generated help text phase-specific).
#[derive(Args, Debug)]
struct RunArgs {
    /// Phase to drive to completion.
    phase: Phase,
    /// The run id to drive.
    #[arg(long)]
    run_id: String,
    /// Shell command standing in for `runAgent`; see [`TickArgs::agent_cmd`].
    #[arg(long)]
    agent_cmd: Option<String>,
}

/// CLI entry point, returning a process exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Parses arguments, initializes logging, builds the router, and dispatches
/// to the selected subcommand.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json || default_log_json(cli.settings.as_deref()));

    let mut runs = RunsConfig::load(cli.settings.as_deref()).map_err(|err| CliError::new(err.to_string()))?;
    if let Some(runs_root) = &cli.runs_root {
        runs.runs_root = runs_root.clone();
    }
    let router = ToolRouter::new(ToolRouterConfig { runs, offline_fixtures_path: None })?;

    match cli.command {
        Commands::Init(args) => command_init(&router, &args),
        Commands::Call(args) => command_call(&router, &args),
        Commands::Tick(args) => command_tick(&router, &args),
        Commands::Run(args) => command_run(&router, &args),
    }
}

/// Best-effort peek at `settings.json`'s `log_json` flag before the full
/// config layer loads, so early log lines use the right format too. Falls
/// back to human-readable on any failure.
fn default_log_json(settings_path: Option<&Path>) -> bool {
    let Some(path) = settings_path else { return false };
    let Ok(bytes) = fs::read(path) else { return false };
    let Ok(value) = serde_json::from_slice::<Value>(&bytes) else { return false };
    value.get("log_json").and_then(Value::as_bool).unwrap_or(false)
}

/// Initializes the global `tracing` subscriber, in JSON or human-readable
/// form depending on the resolved `log_json` setting.
fn init_tracing(log_json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if log_json {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

/// Executes `init`, printing the created run's id and manifest as JSON.
fn command_init(router: &ToolRouter, args: &InitArgs) -> CliResult<ExitCode> {
    let envelope = dispatch(
        router,
        "run_init",
        json!({
            "query_text": args.query,
            "sensitivity": args.sensitivity,
            "mode": args.mode,
        }),
    );
    print_envelope(&envelope)
}

/// Executes `call`, reading its JSON arguments from `--args` or
/// `--args-file` (or an empty object if neither was given).
fn command_call(router: &ToolRouter, args: &CallArgs) -> CliResult<ExitCode> {
    let value = match (&args.args, &args.args_file) {
        (Some(inline), None) => {
            serde_json::from_str(inline).map_err(|err| CliError::new(format!("invalid --args JSON: {err}")))?
        }
        (None, Some(path)) => {
            let bytes = fs::read(path)
                .map_err(|err| CliError::new(format!("failed to read {}: {err}", path.display())))?;
            serde_json::from_slice(&bytes)
                .map_err(|err| CliError::new(format!("invalid JSON in {}: {err}", path.display())))?
        }
        (None, None) => json!({}),
        (Some(_), Some(_)) => {
            return Err(CliError::new("--args and --args-file are mutually exclusive"));
        }
    };
    let envelope = dispatch(router, &args.operation, value);
    print_envelope(&envelope)
}

/// Executes `tick`, running exactly one tick of the requested phase.
fn command_tick(router: &ToolRouter, args: &TickArgs) -> CliResult<ExitCode> {
    let result = match args.phase {
        Phase::PrePivot => {
            let driver = ShellAgentDriver::new(require_agent_cmd(args.agent_cmd.as_deref())?);
            tick::orchestrator_tick_live(router, &args.run_id, &driver)
        }
        Phase::PostPivot => {
            let driver = ShellAgentDriver::new(require_agent_cmd(args.agent_cmd.as_deref())?);
            tick::orchestrator_tick_post_pivot(router, &args.run_id, &driver)
        }
        Phase::PostSummaries => tick::orchestrator_tick_post_summaries(router, &args.run_id),
    };
    print_result(result)
}

/// Executes `run`, driving the requested phase to completion (capped).
fn command_run(router: &ToolRouter, args: &RunArgs) -> CliResult<ExitCode> {
    let result = match args.phase {
        Phase::PrePivot => {
            let driver = ShellAgentDriver::new(require_agent_cmd(args.agent_cmd.as_deref())?);
            tick::orchestrator_run_pre_pivot(router, &args.run_id, &driver)
        }
        Phase::PostPivot => {
            let driver = ShellAgentDriver::new(require_agent_cmd(args.agent_cmd.as_deref())?);
            tick::orchestrator_run_post_pivot(router, &args.run_id, &driver)
        }
        Phase::PostSummaries => tick::orchestrator_run_post_summaries(router, &args.run_id),
    };
    print_result(result)
}

/// Resolves `--agent-cmd`, required for any phase that calls `runAgent`.
fn require_agent_cmd(agent_cmd: Option<&str>) -> CliResult<String> {
    agent_cmd
        .map(str::to_string)
        .ok_or_else(|| CliError::new("--agent-cmd is required for this phase"))
}

/// Prints a `{ok, ...}` / `{ok:false, error}` envelope and maps it to an
/// exit code: success is `0`, a reported failure is `1`.
fn print_envelope(envelope: &Value) -> CliResult<ExitCode> {
    write_json_line(envelope)?;
    if envelope["ok"] == json!(false) { Ok(ExitCode::FAILURE) } else { Ok(ExitCode::SUCCESS) }
}

/// Prints a raw tool-surface result, converting a returned [`OrchError`]
/// into the same failure exit code `print_envelope` would produce.
fn print_result(result: Result<Value, ro_core::OrchError>) -> CliResult<ExitCode> {
    match result {
        Ok(value) => {
            write_json_line(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            write_json_line(&json!({ "ok": false, "error": { "code": err.code.to_string(), "message": err.message } }))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Serializes `value` as pretty JSON and writes it to stdout.
fn write_json_line(value: &Value) -> CliResult<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|err| CliError::new(err.to_string()))?;
    writeln!(std::io::stdout(), "{rendered}").map_err(|err| CliError::new(err.to_string()))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = writeln!(std::io::stderr(), "{message}");
    ExitCode::FAILURE
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
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
