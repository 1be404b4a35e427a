//! ABOUTME: Error types shared across the signalgraph workspace
//! ABOUTME: Defines WorkflowError and the crate-wide Result alias

use thiserror::Error;

/// Errors surfaced by the workflow engine.
///
/// Collapses config-time validation problems and execution-time
/// operational problems into variants of a single typed enum, the way
/// a thiserror-based crate boundary does it.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Config is structurally invalid. Raised once, at orchestration start.
    #[error("invalid workflow configuration: {0}")]
    Validation(String),

    /// Context/backend state failed a pre-execution sanity check.
    #[error("invalid operational state: {0}")]
    Operational(String),

    /// A node executor failed in a way that had no `failure_signal` to
    /// fall back to.
    #[error("node execution failed: {0}")]
    NodeExecution(String),

    /// The LLM resolver exhausted its retries.
    #[error("LLM call failed after retries: {0}")]
    Provider(String),

    /// A tool invocation failed after exhausting its retries.
    #[error("tool call failed: {0}")]
    Tool(String),

    /// A backend implementation returned an error.
    #[error("backend error: {0}")]
    Backend(String),

    /// The broadcaster's recursion-depth guard tripped.
    #[error("signal broadcast recursion exceeded max depth ({0})")]
    RecursionLimit(usize),

    /// Anything else, wrapped so call sites don't need a matching variant.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
