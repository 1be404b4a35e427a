//! ABOUTME: Command-line argument definitions for the signalgraph runner
//! ABOUTME: A single `run` subcommand; tool/agent registration stays a Rust API concern

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "signalgraph", version, about = "Run a signal-driven workflow document")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Tracing verbosity used when RUST_LOG is unset.
    #[arg(long, value_enum, global = true, default_value_t = TraceLevel::Warn)]
    pub trace: TraceLevel,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a workflow document and broadcast an initial signal into it.
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to a YAML or JSON workflow document.
    pub workflow: PathBuf,

    /// Name of the workflow within the document to start.
    #[arg(long, default_value = "main")]
    pub workflow_name: String,

    /// Initial signal(s) to broadcast. Repeatable.
    #[arg(long = "signal", default_values_t = vec!["START".to_string()])]
    pub signals: Vec<String>,

    /// Initial context fields as `key=value`. Repeatable.
    #[arg(long = "context", value_parser = parse_key_val)]
    pub context: Vec<(String, String)>,

    /// Endpoint of an HTTP-based LLM provider. Workflows with no
    /// llm/agent nodes don't need this.
    #[arg(long, env = "SIGNALGRAPH_LLM_ENDPOINT")]
    pub llm_endpoint: Option<String>,

    /// Model name passed through to the LLM provider.
    #[arg(long, env = "SIGNALGRAPH_LLM_MODEL", default_value = "default")]
    pub llm_model: String,

    /// Print the final context document as JSON on success.
    #[arg(long)]
    pub print_context: bool,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s.split_once('=').ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    Ok((key.to_string(), value.to_string()))
}

/// Mirrors the verbosity levels exposed on the command line; `Off`
/// disables tracing output entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TraceLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl TraceLevel {
    pub fn to_level(self) -> Option<tracing::Level> {
        match self {
            TraceLevel::Off => None,
            TraceLevel::Error => Some(tracing::Level::ERROR),
            TraceLevel::Warn => Some(tracing::Level::WARN),
            TraceLevel::Info => Some(tracing::Level::INFO),
            TraceLevel::Debug => Some(tracing::Level::DEBUG),
            TraceLevel::Trace => Some(tracing::Level::TRACE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_repeated_signals_and_context() {
        let cli = Cli::parse_from([
            "signalgraph",
            "run",
            "workflow.yaml",
            "--signal",
            "START",
            "--signal",
            "RETRY",
            "--context",
            "topic=rust",
            "--context",
            "depth=2",
        ]);
        let Command::Run(args) = cli.command;
        assert_eq!(args.signals, vec!["START".to_string(), "RETRY".to_string()]);
        assert_eq!(args.context, vec![("topic".to_string(), "rust".to_string()), ("depth".to_string(), "2".to_string())]);
    }

    #[test]
    fn rejects_malformed_context_pair() {
        let result = Cli::try_parse_from(["signalgraph", "run", "workflow.yaml", "--context", "no-equals-sign"]);
        assert!(result.is_err());
    }
}
