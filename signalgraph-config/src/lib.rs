//! ABOUTME: Parses a workflow config document (YAML or JSON) into a ParsedConfig
//! ABOUTME: Ported from lib/yaml_parser.py's parse_yaml and lib/inheritance.py's shape detection

use serde_json::Value;
use signalgraph_core::error::{Result, WorkflowError};
use signalgraph_core::identity::IdentitySet;
use signalgraph_core::schema::ContextSchema;
use signalgraph_core::workflow::WorkflowsRegistry;
use signalgraph_workflows::inheritance::ParsedConfig;
use tracing::debug;

const WORKFLOWS_KEY: &str = "workflows";
const CONTEXT_SCHEMA_KEY: &str = "context_schema";
const IDENTITIES_KEY: &str = "identities";

/// Parse a config document's text into a [`ParsedConfig`].
///
/// A document is "combined" when its top-level mapping has a
/// `workflows` key — in that shape, `context_schema` and `identities`
/// are optional siblings. Otherwise the whole document is treated as
/// the legacy bare workflows registry.
pub fn parse_config_document(source: &str) -> Result<ParsedConfig> {
    let document: Value = serde_yaml::from_str(source).map_err(|e| WorkflowError::Validation(format!("invalid YAML configuration: {e}")))?;

    let Value::Object(map) = document else {
        return Err(WorkflowError::Validation("config document must be a mapping at the top level".into()));
    };

    if let Some(workflows_value) = map.get(WORKFLOWS_KEY) {
        debug!("config document uses the combined shape (top-level 'workflows' key present)");
        let workflows: WorkflowsRegistry =
            serde_json::from_value(workflows_value.clone()).map_err(|e| WorkflowError::Validation(format!("invalid 'workflows' section: {e}")))?;

        let context_schema = match map.get(CONTEXT_SCHEMA_KEY) {
            Some(v) => Some(
                serde_json::from_value::<ContextSchema>(v.clone()).map_err(|e| WorkflowError::Validation(format!("invalid 'context_schema' section: {e}")))?,
            ),
            None => None,
        };

        let identities = match map.get(IDENTITIES_KEY) {
            Some(v) => {
                Some(serde_json::from_value::<IdentitySet>(v.clone()).map_err(|e| WorkflowError::Validation(format!("invalid 'identities' section: {e}")))?)
            }
            None => None,
        };

        return Ok(ParsedConfig { workflows, context_schema, identities });
    }

    debug!("config document uses the legacy bare workflows-registry shape");
    let workflows: WorkflowsRegistry =
        serde_json::from_value(Value::Object(map)).map_err(|e| WorkflowError::Validation(format!("invalid workflows registry: {e}")))?;

    Ok(ParsedConfig { workflows, context_schema: None, identities: None })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_bare_workflows_shape() {
        let doc = r#"
main:
  router:
    node_type: router
    event_triggers: [START]
    event_emissions:
      - signal_name: DONE
"#;
        let parsed = parse_config_document(doc).unwrap();
        assert!(parsed.workflows.contains_key("main"));
        assert!(parsed.context_schema.is_none());
        assert!(parsed.identities.is_none());
    }

    #[test]
    fn parses_combined_shape_with_context_schema_and_identities() {
        let doc = r#"
workflows:
  main:
    router:
      node_type: router
      event_triggers: [START]
      event_emissions:
        - signal_name: DONE
context_schema:
  name:
    type: string
    required: true
identities:
  user: alice
"#;
        let parsed = parse_config_document(doc).unwrap();
        assert!(parsed.workflows.contains_key("main"));
        assert!(parsed.context_schema.is_some());
        assert_eq!(parsed.identities.unwrap().get("user"), Some(&"alice".to_string()));
    }

    #[test]
    fn rejects_malformed_yaml() {
        let doc = "workflows: [this is not a mapping";
        let err = parse_config_document(doc).unwrap_err();
        assert!(err.to_string().contains("invalid"));
    }

    #[test]
    fn rejects_non_mapping_document() {
        let doc = "- just\n- a\n- list\n";
        let err = parse_config_document(doc).unwrap_err();
        assert!(err.to_string().contains("mapping"));
    }
}
