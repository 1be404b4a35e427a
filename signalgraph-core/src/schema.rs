//! ABOUTME: Context schema definitions and their translation into JSON Schema
//! ABOUTME: Stands in for dynamic Pydantic model synthesis, which Rust has no equivalent of
//!
//! Rust has no runtime class synthesis, so a [`FieldDef`] is instead
//! turned into a plain JSON Schema `serde_json::Value`, which is
//! exactly what the LLM resolver needs to embed in its "respond with
//! JSON matching this schema" instructions.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One field's schema definition. Accepts either a bare type name
/// (`"string"`) or the full object form with description/required/
/// default/nested `properties`/`items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldDef {
    Shorthand(String),
    Full {
        #[serde(rename = "type")]
        ty: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default = "default_required")]
        required: bool,
        #[serde(default)]
        default: Option<Value>,
        #[serde(default)]
        properties: Option<IndexMap<String, FieldDef>>,
        #[serde(default)]
        items: Option<Box<FieldDef>>,
    },
}

fn default_required() -> bool {
    true
}

impl FieldDef {
    fn type_name(&self) -> &str {
        match self {
            FieldDef::Shorthand(t) => t,
            FieldDef::Full { ty, .. } => ty,
        }
    }

    fn description(&self) -> Option<&str> {
        match self {
            FieldDef::Shorthand(_) => None,
            FieldDef::Full { description, .. } => description.as_deref(),
        }
    }

    fn required(&self) -> bool {
        match self {
            FieldDef::Shorthand(_) => true,
            FieldDef::Full { required, .. } => *required,
        }
    }
}

/// A context schema: field name to definition, preserving declaration
/// order the way the workflow document itself does.
pub type ContextSchema = IndexMap<String, FieldDef>;

fn json_type_for(name: &str) -> &'static str {
    match name.to_lowercase().as_str() {
        "string" | "text" | "str" => "string",
        "integer" | "int" => "integer",
        "number" | "float" => "number",
        "boolean" | "bool" => "boolean",
        "list" | "array" => "array",
        "dict" | "object" => "object",
        _ => "any",
    }
}

/// Recursively resolve a field definition into a JSON Schema fragment,
/// following nested `properties`/`items` the way `_schema_field_to_type`
/// walks a schema to build nested Pydantic models.
pub fn field_def_to_json_schema(field_def: &FieldDef) -> Value {
    let json_type = json_type_for(field_def.type_name());

    let mut schema = match field_def {
        FieldDef::Full { ty, properties, items, .. } if ty.eq_ignore_ascii_case("object") || ty.eq_ignore_ascii_case("dict") => {
            if let Some(props) = properties {
                if !props.is_empty() {
                    context_schema_to_json_schema(props, None)
                } else {
                    json!({"type": "object"})
                }
            } else {
                json!({"type": "object"})
            }
        }
        FieldDef::Full { ty, items, .. } if ty.eq_ignore_ascii_case("list") || ty.eq_ignore_ascii_case("array") => {
            if let Some(item_def) = items {
                json!({
                    "type": "array",
                    "items": field_def_to_json_schema(item_def),
                })
            } else {
                json!({"type": "array"})
            }
        }
        _ => json!({"type": json_type}),
    };

    if let Some(description) = field_def.description() {
        if let Value::Object(map) = &mut schema {
            map.insert("description".to_string(), Value::String(description.to_string()));
        }
    }

    schema
}

/// Build an object-shaped JSON Schema from a whole context schema,
/// mirroring `schema_to_pydantic`'s field-by-field construction.
pub fn context_schema_to_json_schema(schema: &IndexMap<String, FieldDef>, title: Option<&str>) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for (name, def) in schema {
        properties.insert(name.clone(), field_def_to_json_schema(def));
        if def.required() {
            required.push(Value::String(name.clone()));
        }
    }

    let mut out = json!({
        "type": "object",
        "properties": properties,
        "required": required,
    });

    if let Some(title) = title {
        out.as_object_mut().unwrap().insert("title".to_string(), Value::String(title.to_string()));
    }

    out
}

/// Build a JSON Schema for a single named field, for the `llm`/`agent`
/// node's flat `output_field` validation — the Rust equivalent of
/// `schema_to_root_model`.
pub fn schema_to_root_schema(field_def: &FieldDef, title: &str) -> Value {
    let mut schema = field_def_to_json_schema(field_def);
    if let Value::Object(map) = &mut schema {
        map.insert("title".to_string(), Value::String(title.to_string()));
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_field_resolves_to_type() {
        let def = FieldDef::Shorthand("integer".into());
        assert_eq!(field_def_to_json_schema(&def)["type"], "integer");
    }

    #[test]
    fn nested_object_schema_resolves_recursively() {
        let yaml = r#"
type: object
properties:
  name:
    type: string
  age:
    type: integer
    required: false
"#;
        let def: FieldDef = serde_yaml::from_str(yaml).unwrap();
        let schema = field_def_to_json_schema(&def);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["name"]["type"], "string");
        assert_eq!(schema["required"], json!(["name"]));
    }
}
