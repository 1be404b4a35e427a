//! ABOUTME: The LLM resolver: format instructions, JSON extraction, validation-error retry
//! ABOUTME: Shared by the llm and agent node executors

use regex::Regex;
use serde_json::Value;
use signalgraph_core::error::{Result, WorkflowError};
use std::sync::OnceLock;

use crate::caller::LlmCaller;

fn think_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").unwrap())
}

fn fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*([\[\{].*?[\]\}])\s*```").unwrap())
}

/// Run the LLM call loop: serialize `input`, append schema instructions,
/// call the LLM, parse and validate, retry with validation feedback on
/// failure. Raises after `max_retries` failed attempts, never retrying
/// a `call_llm` error itself — only parse/validation failures.
pub async fn resolve_llm_call(caller: &dyn LlmCaller, input: &Value, config: &Value, response_schema: &Value, max_retries: u32) -> Result<Value> {
    let prompt_base = serde_json::to_string(input).map_err(|e| WorkflowError::Provider(format!("failed to serialize input: {e}")))?;
    let instructions = format_instructions(response_schema);
    let mut current_prompt = format!("{prompt_base}\n\n{instructions}");

    let validator = jsonschema::validator_for(response_schema).map_err(|e| WorkflowError::Provider(format!("invalid response schema: {e}")))?;

    let mut last_error: Option<String> = None;

    for attempt in 0..=max_retries {
        let response_text = caller.call(&current_prompt, config).await?;

        match parse_response(&response_text, &validator) {
            Ok(value) => return Ok(value),
            Err(error_msg) => {
                last_error = Some(error_msg.clone());
                if attempt == max_retries {
                    break;
                }
                current_prompt.push_str(&format!("\n\nPrevious response: {response_text}{error_msg}"));
            }
        }
    }

    Err(WorkflowError::Provider(format!(
        "Max retries ({max_retries}) exceeded. Last error: {}",
        last_error.unwrap_or_else(|| "unknown".to_string())
    )))
}

fn format_instructions(schema: &Value) -> String {
    format!(
        "Respond ONLY with a valid JSON object matching this schema:\n{}\nDo not return the schema itself. Return a JSON instance of the schema.",
        schema
    )
}

fn parse_response(text: &str, validator: &jsonschema::Validator) -> std::result::Result<Value, String> {
    let stripped = think_tag_re().replace_all(text, "");
    let json_str = extract_json(stripped.trim());

    let value: Value = serde_json::from_str(&json_str).map_err(|e| format!("\n\nJSON parse error: {e}. Output valid JSON."))?;

    let errors: Vec<String> = validator.iter_errors(&value).map(|e| format!("  - {}: {}", e.instance_path, e)).collect();
    if !errors.is_empty() {
        return Err(format!("\n\nValidation failed. Fix these fields:\n{}\n\nRespond with valid JSON.", errors.join("\n")));
    }

    Ok(value)
}

fn extract_json(text: &str) -> String {
    if let Some(captures) = fenced_json_re().captures(text) {
        if let Some(m) = captures.get(1) {
            return m.as_str().to_string();
        }
    }

    for (i, c) in text.char_indices() {
        if c == '{' || c == '[' {
            return extract_balanced(text, i);
        }
    }
    text.to_string()
}

fn extract_balanced(text: &str, start: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let start_idx = text[..start].chars().count();
    let open_char = chars[start_idx];
    let close_char = if open_char == '{' { '}' } else { ']' };

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for i in start_idx..chars.len() {
        let c = chars[i];
        if escape {
            escape = false;
            continue;
        }
        if c == '\\' {
            escape = true;
            continue;
        }
        if c == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        if c == open_char {
            depth += 1;
        } else if c == close_char {
            depth -= 1;
            if depth == 0 {
                return chars[start_idx..=i].iter().collect();
            }
        }
    }
    chars[start_idx..].iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caller::{EchoCaller, ScriptedCaller};
    use serde_json::json;

    #[test]
    fn extract_json_pulls_fenced_block() {
        let text = "here you go:\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(extract_json(text), "{\"a\": 1}");
    }

    #[test]
    fn extract_json_balances_nested_braces() {
        let text = "prefix {\"a\": {\"b\": 1}, \"c\": [1, 2]} suffix";
        assert_eq!(extract_json(text), "{\"a\": {\"b\": 1}, \"c\": [1, 2]}");
    }

    #[test]
    fn extract_json_ignores_braces_inside_strings() {
        let text = "{\"a\": \"}not a close{\"}";
        assert_eq!(extract_json(text), text);
    }

    #[tokio::test]
    async fn resolves_on_first_valid_response() {
        let caller = EchoCaller { response: "{\"output\": \"done\"}".into() };
        let schema = json!({"type": "object", "properties": {"output": {"type": "string"}}, "required": ["output"]});
        let result = resolve_llm_call(&caller, &json!({"task": "x"}), &json!({}), &schema, 2).await.unwrap();
        assert_eq!(result["output"], "done");
    }

    #[tokio::test]
    async fn retries_on_invalid_json_then_succeeds() {
        let caller = ScriptedCaller::new(vec!["not json at all".into(), "{\"output\": \"recovered\"}".into()]);
        let schema = json!({"type": "object", "properties": {"output": {"type": "string"}}, "required": ["output"]});
        let result = resolve_llm_call(&caller, &json!({}), &json!({}), &schema, 2).await.unwrap();
        assert_eq!(result["output"], "recovered");
    }

    #[tokio::test]
    async fn exhausts_retries_and_reports_last_error() {
        let caller = EchoCaller { response: "garbage".into() };
        let schema = json!({"type": "object", "properties": {"output": {"type": "string"}}, "required": ["output"]});
        let err = resolve_llm_call(&caller, &json!({}), &json!({}), &schema, 1).await.unwrap_err();
        assert!(err.to_string().contains("Max retries (1) exceeded"));
    }

    #[tokio::test]
    async fn strips_think_tags_before_extracting_json() {
        let caller = EchoCaller { response: "<think>reasoning here</think>{\"output\": \"x\"}".into() };
        let schema = json!({"type": "object", "properties": {"output": {"type": "string"}}, "required": ["output"]});
        let result = resolve_llm_call(&caller, &json!({}), &json!({}), &schema, 0).await.unwrap();
        assert_eq!(result["output"], "x");
    }
}
