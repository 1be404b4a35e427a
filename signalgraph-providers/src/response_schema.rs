//! ABOUTME: Dynamic response schema construction
//! ABOUTME: Stands in for dynamic Pydantic model synthesis — builds a JSON Schema Value instead

use serde_json::{json, Value};

/// One candidate signal an LLM/agent response may select between.
#[derive(Debug, Clone)]
pub struct SignalOption {
    pub name: String,
    pub description: Option<String>,
}

/// Build the JSON Schema an LLM response must satisfy.
///
/// Mirrors `build_response_model`'s field selection: an explicit
/// `output_schema` is embedded under `output_field` (or returned
/// directly when there's exactly one candidate signal and no named
/// output field — the `RootModel` shortcut); otherwise the response
/// gets a bare `output: string` field. Two or more `signal_options`
/// adds a `selected_signal` enum field.
pub fn build_response_schema(output_field: Option<&str>, output_schema: Option<&Value>, signal_options: &[SignalOption]) -> Value {
    if let Some(schema) = output_schema {
        if output_field.is_none() && signal_options.len() <= 1 {
            return schema.clone();
        }
    }

    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    match (output_field, output_schema) {
        (Some(field), Some(schema)) => {
            properties.insert(field.to_string(), schema.clone());
            required.push(Value::String(field.to_string()));
        }
        (Some(field), None) => {
            properties.insert(field.to_string(), json!({"description": format!("The {field} value")}));
            required.push(Value::String(field.to_string()));
        }
        (None, _) => {
            properties.insert("output".to_string(), json!({"type": "string", "description": "The final output/result"}));
            required.push(Value::String("output".to_string()));
        }
    }

    if signal_options.len() > 1 {
        let names: Vec<Value> = signal_options.iter().map(|s| Value::String(s.name.clone())).collect();
        let description = std::iter::once("Select the most appropriate signal:".to_string())
            .chain(signal_options.iter().map(|s| match &s.description {
                Some(d) => format!("- {}: {d}", s.name),
                None => format!("- {}", s.name),
            }))
            .collect::<Vec<_>>()
            .join("\n");

        properties.insert("selected_signal".to_string(), json!({"enum": names, "description": description}));
        required.push(Value::String("selected_signal".to_string()));
    }

    let title = output_field.map(|f| format!("{}Response", titlecase(f))).unwrap_or_else(|| "DynamicResponse".to_string());

    json!({
        "type": "object",
        "title": title,
        "properties": properties,
        "required": required,
    })
}

fn titlecase(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Pull the output value back out of a validated response, the way
/// `extract_output_from_response` does.
pub fn extract_output_from_response(response: &Value, output_field: Option<&str>) -> Value {
    match output_field {
        Some(field) => response.get(field).cloned().unwrap_or(Value::Null),
        None => response.get("output").cloned().unwrap_or(Value::Null),
    }
}

/// Pull the `selected_signal` out of a response, if present.
pub fn extract_signal_from_response(response: &Value) -> Option<String> {
    response.get("selected_signal").and_then(Value::as_str).map(str::to_string)
}
