// crates/consent-gate-cli/src/main.rs
// ============================================================================
// Module: Consent Gate CLI Entry Point
// Description: Command dispatcher for the Consent Gate server and tooling.
// Purpose: Run the MCP server, validate configuration, and mint test tokens.
// Dependencies: clap, consent-gate-config, consent-gate-mcp, thiserror, tokio.
// ============================================================================

//! ## Overview
//! The Consent Gate CLI starts the MCP authorization gateway, validates or
//! prints configuration, and issues HMAC bearer tokens for local testing.
//! Security posture: signing secrets are read from the environment only and
//! are never echoed.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use consent_gate_config::ConsentGateConfig;
use consent_gate_config::DEFAULT_KEY_ENV;
use consent_gate_config::TokenAlgorithm;
use consent_gate_config::config_toml_example;
use consent_gate_core::Clock;
use consent_gate_core::SystemClock;
use consent_gate_core::Timestamp;
use consent_gate_mcp::McpServer;
use consent_gate_mcp::TokenClaims;
use consent_gate_mcp::issue_token;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Seconds per day for token lifetimes.
const SECONDS_PER_DAY: u64 = 86_400;
/// Longest token lifetime the CLI will mint.
const MAX_TOKEN_TTL_DAYS: u64 = 3_650;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "consent-gate", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Consent Gate MCP server.
    Serve(ServeCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Bearer token utilities.
    Token {
        /// Selected token subcommand.
        #[command(subcommand)]
        command: TokenCommand,
    },
}

/// Configuration for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to consent-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a config file.
    Validate(ConfigValidateCommand),
    /// Print a documented example config.
    Example,
}

/// Arguments for config validation.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Optional config file path (defaults to consent-gate.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Token subcommands.
#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Mint an HS256 bearer token.
    Issue(TokenIssueCommand),
}

/// Arguments for token issuance.
#[derive(Args, Debug)]
struct TokenIssueCommand {
    /// Token subject.
    #[arg(long, value_name = "SUBJECT", default_value = "test-user")]
    subject: String,
    /// Token lifetime in days.
    #[arg(
        long,
        value_name = "DAYS",
        default_value_t = 365,
        value_parser = clap::value_parser!(u64).range(1 ..= MAX_TOKEN_TTL_DAYS)
    )]
    ttl_days: u64,
    /// Optional issuer claim.
    #[arg(long, value_name = "ISSUER")]
    issuer: Option<String>,
    /// Optional audience claim.
    #[arg(long, value_name = "AUDIENCE")]
    audience: Option<String>,
    /// Environment variable holding the signing secret.
    #[arg(long, value_name = "VAR", default_value = DEFAULT_KEY_ENV)]
    secret_env: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI errors.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration could not be loaded or validated.
    #[error("config error: {0}")]
    Config(String),
    /// Server failed to start or stopped with an error.
    #[error("server error: {0}")]
    Server(String),
    /// Token could not be minted.
    #[error("token error: {0}")]
    Token(String),
    /// Output could not be written.
    #[error("failed to write {0}")]
    Output(String),
}

impl CliError {
    /// Returns a stable label for this error.
    const fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Server(_) => "server",
            Self::Token(_) => "token",
            Self::Output(_) => "output",
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&format!("consent-gate {version}"))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => command_config(command),
        Commands::Token {
            command,
        } => command_token(command),
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::Output(format!("stdout: {err}")))?;
    write_stdout_line("")
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = ConsentGateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::Config(err.to_string()))?;
    let bind = config.server.bind.clone();
    let server = tokio::task::spawn_blocking(move || McpServer::from_config(config))
        .await
        .map_err(|err| CliError::Server(format!("init join failed: {err}")))?
        .map_err(|err| CliError::Server(err.to_string()))?;
    write_stderr_line(&format!("consent-gate listening on {bind}"))?;
    server.serve().await.map_err(|err| CliError::Server(err.to_string()))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config Commands
// ============================================================================

/// Dispatches config subcommands.
fn command_config(command: ConfigCommand) -> CliResult<ExitCode> {
    match command {
        ConfigCommand::Validate(command) => command_config_validate(&command),
        ConfigCommand::Example => {
            write_stdout_line(config_toml_example().trim_end())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigValidateCommand) -> CliResult<ExitCode> {
    let _config = ConsentGateConfig::load(command.config.as_deref())
        .map_err(|err| CliError::Config(err.to_string()))?;
    write_stdout_line("config ok")?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Token Commands
// ============================================================================

/// Dispatches token subcommands.
fn command_token(command: TokenCommand) -> CliResult<ExitCode> {
    match command {
        TokenCommand::Issue(command) => {
            let secret = std::env::var(&command.secret_env).map_err(|_| {
                CliError::Token(format!("environment variable {} is not set", command.secret_env))
            })?;
            let token = mint_token(&command, &secret, SystemClock.now())?;
            write_stdout_line(&token)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Mints a token for the issue command at `now`.
fn mint_token(command: &TokenIssueCommand, secret: &str, now: Timestamp) -> CliResult<String> {
    if command.subject.trim().is_empty() {
        return Err(CliError::Token("subject must be non-empty".to_string()));
    }
    if command.ttl_days == 0 || command.ttl_days > MAX_TOKEN_TTL_DAYS {
        return Err(CliError::Token(format!(
            "ttl-days must be between 1 and {MAX_TOKEN_TTL_DAYS}"
        )));
    }
    if secret.is_empty() {
        return Err(CliError::Token(format!("{} is empty", command.secret_env)));
    }
    let mut claims =
        TokenClaims::new(command.subject.clone(), now, command.ttl_days * SECONDS_PER_DAY);
    claims.iss.clone_from(&command.issuer);
    claims.aud.clone_from(&command.audience);
    issue_token(TokenAlgorithm::Hs256, secret.as_bytes(), &claims)
        .map_err(|err| CliError::Token(err.to_string()))
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| CliError::Output(format!("stdout: {err}")))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> CliResult<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}").map_err(|err| CliError::Output(format!("stderr: {err}")))
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(error: &CliError) -> ExitCode {
    let _ = write_stderr_line(&format!("consent-gate: {error} [{}]", error.code()));
    ExitCode::FAILURE
}
