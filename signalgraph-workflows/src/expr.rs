//! ABOUTME: The Jinja-style expression layer prompts and conditions render through
//! ABOUTME: Tera stands in for Jinja2; the `accumulated` filter is registered per render call

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use signalgraph_core::context::{get_field, Context};
use signalgraph_core::workflow::EventEmission;

fn dot_pattern_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{[^}]*context\.([a-zA-Z_][a-zA-Z0-9_]*)").unwrap())
}

fn bracket_pattern_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\{\{[^}]*context\[['"]([a-zA-Z_][a-zA-Z0-9_]*)['"]"#).unwrap())
}

fn has_jinja_block(s: &str) -> bool {
    s.contains("{{") || s.contains("{%")
}

/// Pull every `context.field`/`context['field']` name referenced in a
/// template, the way `_extract_context_variables` scans with two
/// separate regexes rather than parsing the template.
pub fn extract_context_variables(template: &str) -> HashSet<String> {
    if template.is_empty() {
        return HashSet::new();
    }
    let mut variables = HashSet::new();
    for caps in dot_pattern_re().captures_iter(template) {
        variables.insert(caps[1].to_string());
    }
    for caps in bracket_pattern_re().captures_iter(template) {
        variables.insert(caps[1].to_string());
    }
    variables
}

/// Filter a full context down to just the fields a prompt template
/// references, collecting a warning for each field that's missing,
/// `None`, or an empty string — mirroring `get_context_for_prompt`
/// exactly, including its choice to still include the field (as null or
/// `""`) when it's present but empty.
pub fn get_context_for_prompt(full_context: &Context, template: &str) -> (Map<String, Value>, Vec<String>) {
    let required_fields = extract_context_variables(template);
    let mut filtered = Map::new();
    let mut warnings = Vec::new();

    for field in required_fields {
        match full_context.get(&field) {
            None => warnings.push(format!("Context field '{field}' referenced in prompt but not found in context")),
            Some(_) => match get_field(full_context, &field) {
                None | Some(Value::Null) => {
                    warnings.push(format!("Context field '{field}' is None"));
                    filtered.insert(field, Value::Null);
                }
                Some(Value::String(s)) if s.is_empty() => {
                    warnings.push(format!("Context field '{field}' is empty string"));
                    filtered.insert(field, Value::String(String::new()));
                }
                Some(value) => {
                    filtered.insert(field, value);
                }
            },
        }
    }

    (filtered, warnings)
}

fn accumulated_lookup(full_context: &Map<String, Value>, value: &Value) -> Value {
    for (key, hist) in full_context {
        if key.starts_with("__") {
            continue;
        }
        if let Value::Array(hist_list) = hist {
            if hist_list.last() == Some(value) {
                if let [Value::Array(inner)] = hist_list.as_slice() {
                    return Value::Array(inner.clone());
                }
                return Value::Array(hist_list.clone());
            }
        }
    }
    if value.is_null() {
        Value::Array(vec![])
    } else {
        Value::Array(vec![value.clone()])
    }
}

fn register_accumulated_filter(tera: &mut tera::Tera, full_context: Map<String, Value>) {
    tera.register_filter("accumulated", move |value: &Value, _: &std::collections::HashMap<String, Value>| {
        Ok(accumulated_lookup(&full_context, value))
    });
}

/// Render a prompt template against a context, the way `render_prompt`
/// does: a bare short-circuit when the prompt carries no Jinja markers
/// at all, otherwise an "unwrapped" view (current value per public
/// field, raw value per internal field) handed in as the `context`
/// template variable. Syntax and render errors are recorded as
/// warnings and the original prompt text is returned unrendered — a
/// broken prompt template degrades to its literal text rather than
/// failing the node.
pub fn render_prompt(prompt: &str, context: &Context) -> (String, Vec<String>) {
    if prompt.is_empty() || !has_jinja_block(prompt) {
        return (prompt.to_string(), Vec::new());
    }

    let (_, mut warnings) = get_context_for_prompt(context, prompt);

    let mut unwrapped = Map::new();
    for key in context.keys() {
        if Context::is_internal_field(key) {
            unwrapped.insert(key.clone(), context.get(key).cloned().unwrap_or(Value::Null));
        } else if let Some(value) = get_field(context, key) {
            unwrapped.insert(key.clone(), value);
        }
    }

    let mut tera = tera::Tera::default();
    register_accumulated_filter(&mut tera, context.0.clone());

    let mut tera_context = tera::Context::new();
    tera_context.insert("context", &unwrapped);

    match tera.add_raw_template("__prompt__", prompt) {
        Ok(()) => match tera.render("__prompt__", &tera_context) {
            Ok(rendered) => (rendered, warnings),
            Err(e) => {
                warnings.push(format!("Template rendering error: {e}"));
                (prompt.to_string(), warnings)
            }
        },
        Err(e) => {
            warnings.push(format!("Jinja syntax error: {e}"));
            (prompt.to_string(), warnings)
        }
    }
}

fn jinja_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{\{.*\}\}").unwrap())
}

/// Evaluate each emission's condition against `render_context` and
/// return the signals that pass, the way `evaluate_conditions` does:
/// a missing/non-Jinja condition always passes, a Jinja condition must
/// render to something other than an empty/falsy string, and **any
/// render error is swallowed and treated as a failing condition** — not
/// surfaced, not logged. That's deliberate upstream behavior: a broken
/// condition template simply never fires its signal.
pub fn evaluate_conditions(event_emissions: &[EventEmission], render_context: &Value, full_context: Option<&Context>) -> Vec<String> {
    let mut tera = tera::Tera::default();
    if let Some(ctx) = full_context {
        register_accumulated_filter(&mut tera, ctx.0.clone());
    } else {
        tera.register_filter("accumulated", |value: &Value, _: &std::collections::HashMap<String, Value>| Ok(value.clone()));
    }

    let tera_context = match tera::Context::from_value(render_context.clone()) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let mut passed = Vec::new();

    for (i, emission) in event_emissions.iter().enumerate() {
        let condition = emission.condition.as_deref().unwrap_or("");
        if condition.is_empty() || !jinja_marker_re().is_match(condition) {
            passed.push(emission.signal_name.clone());
            continue;
        }

        let template_name = format!("__condition_{i}__");
        let rendered = tera
            .add_raw_template(&template_name, condition)
            .ok()
            .and_then(|()| tera.render(&template_name, &tera_context).ok());

        if let Some(result) = rendered {
            let normalized = result.trim().to_lowercase();
            if !result.is_empty() && !matches!(normalized.as_str(), "false" | "0" | "none" | "") {
                passed.push(emission.signal_name.clone());
            }
        }
    }

    passed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use signalgraph_core::context::set_field;

    #[test]
    fn extracts_dot_and_bracket_variables() {
        let vars = extract_context_variables("{{ context.foo }} and {{ context['bar'] }}");
        assert!(vars.contains("foo"));
        assert!(vars.contains("bar"));
    }

    #[test]
    fn get_context_for_prompt_warns_on_missing_field() {
        let ctx = Context::new();
        let (filtered, warnings) = get_context_for_prompt(&ctx, "{{ context.missing }}");
        assert!(filtered.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("missing"));
    }

    #[test]
    fn render_prompt_short_circuits_without_markers() {
        let ctx = Context::new();
        let (rendered, warnings) = render_prompt("plain text, no templating", &ctx);
        assert_eq!(rendered, "plain text, no templating");
        assert!(warnings.is_empty());
    }

    #[test]
    fn render_prompt_substitutes_current_value() {
        let mut ctx = Context::new();
        set_field(&mut ctx, "name", json!("Ada"));
        let (rendered, _) = render_prompt("Hello {{ context.name }}!", &ctx);
        assert_eq!(rendered, "Hello Ada!");
    }

    #[test]
    fn render_prompt_accumulated_filter_returns_full_history() {
        let mut ctx = Context::new();
        set_field(&mut ctx, "tags", json!("a"));
        set_field(&mut ctx, "tags", json!("b"));
        let (rendered, _) = render_prompt("{{ context.tags | accumulated | join(',') }}", &ctx);
        assert_eq!(rendered, "a,b");
    }

    #[test]
    fn evaluate_conditions_plain_text_always_passes() {
        let emissions = vec![EventEmission { signal_name: "DONE".into(), condition: Some("always emits".into()) }];
        let passed = evaluate_conditions(&emissions, &json!({}), None);
        assert_eq!(passed, vec!["DONE".to_string()]);
    }

    #[test]
    fn evaluate_conditions_jinja_truthy_passes() {
        let emissions = vec![EventEmission { signal_name: "DONE".into(), condition: Some("{{ context.ok }}".into()) }];
        let passed = evaluate_conditions(&emissions, &json!({"context": {"ok": true}}), None);
        assert_eq!(passed, vec!["DONE".to_string()]);
    }

    #[test]
    fn evaluate_conditions_jinja_falsy_string_fails() {
        let emissions = vec![EventEmission { signal_name: "DONE".into(), condition: Some("{{ context.ok }}".into()) }];
        let passed = evaluate_conditions(&emissions, &json!({"context": {"ok": false}}), None);
        assert!(passed.is_empty());
    }

    #[test]
    fn evaluate_conditions_swallows_render_errors() {
        let emissions = vec![EventEmission { signal_name: "DONE".into(), condition: Some("{{ context.missing.deeper }}".into()) }];
        let passed = evaluate_conditions(&emissions, &json!({"context": {}}), None);
        assert!(passed.is_empty());
    }
}
