//! ABOUTME: Entry point for the signalgraph command-line runner
//! ABOUTME: Parses a workflow document, builds an Engine, and broadcasts the initial signal

mod cli;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use serde_json::{Map, Value};

use cli::{Cli, Command, RunArgs, TraceLevel};
use signalgraph_agents::SignalgraphAgentExecutor;
use signalgraph_providers::{EchoCaller, HttpCaller, LlmCaller, ProviderConfig};
use signalgraph_workflows::inheritance::save_config_sections;
use signalgraph_workflows::tools::ToolRegistry;
use signalgraph_workflows::Engine;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.trace);

    match cli.command {
        Command::Run(args) => run(args).await,
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let source = std::fs::read_to_string(&args.workflow).with_context(|| format!("reading workflow document {}", args.workflow.display()))?;
    let parsed = signalgraph_config::parse_config_document(&source)?;

    let llm_caller: Arc<dyn LlmCaller> = match &args.llm_endpoint {
        Some(endpoint) => Arc::new(HttpCaller::new(ProviderConfig::new("cli", endpoint.clone(), args.llm_model.clone()))?),
        None => Arc::new(EchoCaller { response: r#"{"action": "finish"}"#.to_string() }),
    };

    let backends = signalgraph_storage::create_in_memory_backends();
    let engine = Engine::new(backends.clone(), ToolRegistry::new(), llm_caller)
        .with_agent_executor(Arc::new(SignalgraphAgentExecutor::new(HashMap::new())));

    let initial_context: Map<String, Value> = args.context.into_iter().map(|(k, v)| (k, parse_context_value(&v))).collect();

    let execution_id = engine.orchestrate(Some(parsed.workflows), args.workflow_name, args.signals, initial_context, None, None).await?;

    if parsed.context_schema.is_some() || parsed.identities.is_some() {
        save_config_sections(&backends, execution_id, parsed.identities, parsed.context_schema).await?;
    }

    println!("execution {execution_id} completed");

    if args.print_context {
        let context = backends.context.get_context(execution_id).await?;
        println!("{}", serde_json::to_string_pretty(&context)?);
    }

    Ok(())
}

/// `--context` values are plain strings on the command line; a value
/// that happens to parse as JSON (a number, bool, array, object) is
/// stored as that richer type instead of a string, since workflow
/// documents routinely expect typed fields.
fn parse_context_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Priority: `RUST_LOG` env var, then `--trace`, matching the
/// teacher's rule that tracing output never touches stdout.
fn setup_tracing(trace_level: TraceLevel) {
    use std::io;
    use tracing_subscriber::EnvFilter;

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).with_target(false).init();
        return;
    }

    let Some(level) = trace_level.to_level() else { return };
    tracing_subscriber::fmt().with_max_level(level).with_writer(io::stderr).with_target(false).init();
}
