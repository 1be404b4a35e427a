//! ABOUTME: Config and context inheritance between executions, plus initial-context assembly
//! ABOUTME: Ported from inheritance.py; prepare_initial_context is synthesized (see DESIGN.md)

use serde_json::{Map, Value};
use signalgraph_core::backend::Backends;
use signalgraph_core::context::{wrap_context_fields, Context};
use signalgraph_core::error::{Result, WorkflowError};
use signalgraph_core::ids::ExecutionId;
use signalgraph_core::schema::ContextSchema;
use signalgraph_core::identity::IdentitySet;
use signalgraph_core::workflow::WorkflowsRegistry;

/// Save identities and a context schema to their backends, if configured
/// and non-empty — the shared tail of both fresh config extraction and
/// config inheritance.
pub async fn save_config_sections(
    backends: &Backends,
    execution_id: ExecutionId,
    identities: Option<IdentitySet>,
    context_schema: Option<ContextSchema>,
) -> Result<()> {
    if let Some(identities) = identities.filter(|i| !i.is_empty()) {
        if let Some(backend) = &backends.identity {
            backend.save_identities(execution_id, identities).await?;
        }
    }
    if let Some(schema) = context_schema.filter(|s| !s.is_empty()) {
        if let Some(backend) = &backends.context_schema {
            backend.save_context_schema(execution_id, schema).await?;
        }
    }
    Ok(())
}

/// A parsed config document: either the combined shape (workflows +
/// optional context_schema/identities) or the legacy bare-workflows-map
/// shape.
#[derive(Debug, Clone)]
pub struct ParsedConfig {
    pub workflows: WorkflowsRegistry,
    pub context_schema: Option<ContextSchema>,
    pub identities: Option<IdentitySet>,
}

/// Extract and save the `context_schema`/`identities` sections of a
/// combined config document, returning the workflows registry — the
/// legacy shape (a bare workflows map with no `workflows` key wrapper)
/// is handled by the config parser producing a `ParsedConfig` with
/// `context_schema`/`identities` both `None`.
pub async fn extract_and_save_config_sections(backends: &Backends, execution_id: ExecutionId, parsed_config: ParsedConfig) -> Result<WorkflowsRegistry> {
    save_config_sections(backends, execution_id, parsed_config.identities, parsed_config.context_schema).await?;
    Ok(parsed_config.workflows)
}

/// Copy a workflows registry, identities, and context schema from
/// `source_execution_id` to `target_execution_id`. Errors if the source
/// has no registry at all — there's nothing meaningful to inherit.
pub async fn inherit_config(backends: &Backends, source_execution_id: ExecutionId, target_execution_id: ExecutionId) -> Result<WorkflowsRegistry> {
    let workflows_registry = backends.workflow.get_workflows_registry(source_execution_id).await?;
    if workflows_registry.is_empty() {
        return Err(WorkflowError::Validation(format!(
            "cannot inherit config from execution '{source_execution_id}': no workflows registry found"
        )));
    }

    backends.workflow.save_workflows_registry(target_execution_id, workflows_registry.clone()).await?;

    let source_identities = match &backends.identity {
        Some(backend) => backend.get_identities(source_execution_id).await?,
        None => None,
    };
    let source_schema = match &backends.context_schema {
        Some(backend) => backend.get_context_schema(source_execution_id).await?,
        None => None,
    };

    save_config_sections(backends, target_execution_id, source_identities, source_schema).await?;

    Ok(workflows_registry)
}

/// Deep-copy a source execution's context, dropping `__operational__`
/// and `__parent__` — the new execution gets fresh operational state
/// and isn't implicitly a child just because its context came from
/// somewhere else. Errors if the source context is empty.
pub async fn inherit_context(backends: &Backends, source_execution_id: ExecutionId) -> Result<Map<String, Value>> {
    let source_context = backends.context.get_context(source_execution_id).await?;
    if source_context.is_empty() {
        return Err(WorkflowError::Validation(format!(
            "cannot inherit context from execution '{source_execution_id}': no context found"
        )));
    }

    let inherited = source_context
        .iter()
        .filter(|(k, _)| !Context::is_internal_field(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(inherited)
}

/// Assemble a fresh execution's initial context.
///
/// `inherit_context` returns already history-shaped fields straight
/// from a source execution's context, and `wrap_context_fields` is the
/// only thing that turns bare `initial_context` values into history
/// lists. So: start from the inherited fields (already wrapped), then
/// layer the freshly wrapped `initial_context` on top, with explicit
/// `initial_context` entries winning over anything inherited under the
/// same key.
pub fn prepare_initial_context(inherited: Option<Map<String, Value>>, initial_context: Map<String, Value>) -> Context {
    let mut base = inherited.unwrap_or_default();
    let wrapped_initial = wrap_context_fields(initial_context);

    for (key, value) in wrapped_initial.0 {
        base.insert(key, value);
    }

    Context::from_map(base)
}
