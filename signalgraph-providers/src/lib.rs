//! ABOUTME: LLM calling abstraction and response resolution for signalgraph
//! ABOUTME: LlmCaller is the seam; resolve_llm_call drives the parse/validate/retry loop

pub mod caller;
pub mod resolver;
pub mod response_schema;

pub use caller::{EchoCaller, HttpCaller, LlmCaller, ProviderConfig, ScriptedCaller};
pub use resolver::resolve_llm_call;
pub use response_schema::{build_response_schema, extract_output_from_response, extract_signal_from_response, SignalOption};
