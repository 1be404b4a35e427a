//! ABOUTME: The signal broadcaster crate: expression layer, node executors, and the engine
//! ABOUTME: Ported from broker.py, the nodes/* factories, and their shared lib/ helpers

pub mod broadcaster;
pub mod child_context;
pub mod context_io;
pub mod conversation_io;
pub mod expr;
pub mod inheritance;
pub mod nodes;
pub mod parent_sync;
pub mod signals;
pub mod tools;

pub use broadcaster::{AgentNodeExecutor, Engine, DEFAULT_MAX_RECURSION_DEPTH};
pub use tools::{ToolFn, ToolRegistry, ToolSpec};
