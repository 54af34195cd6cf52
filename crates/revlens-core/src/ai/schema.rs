//! Structured-output contract for checklist generation.

use revlens_types::analysis::ChecklistResult;
use revlens_types::error::AiError;
use revlens_types::llm::OutputSchema;

pub const CHECKLIST_SCHEMA_NAME: &str = "ChecklistResult";

/// JSON schema for [`ChecklistResult`] with `additionalProperties: false`
/// on every object, as strict structured output requires.
pub fn checklist_schema() -> OutputSchema {
    let mut schema = serde_json::to_value(schemars::schema_for!(ChecklistResult))
        .unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Some(map) = schema.as_object_mut() {
        map.remove("$schema");
    }
    close_objects(&mut schema);
    OutputSchema {
        name: CHECKLIST_SCHEMA_NAME.to_string(),
        schema,
    }
}

/// Recursively mark every object schema as closed.
fn close_objects(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            let is_object_schema = map.get("type").and_then(|t| t.as_str()) == Some("object")
                || map.contains_key("properties");
            if is_object_schema {
                map.insert(
                    "additionalProperties".to_string(),
                    serde_json::Value::Bool(false),
                );
            }
            for (key, child) in map.iter_mut() {
                if key != "additionalProperties" {
                    close_objects(child);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

/// Shape-check a provider reply against the checklist contract.
///
/// Accepts either the JSON object itself or a string containing it (some
/// providers return structured output as text). Anything else is
/// [`AiError::MalformedResponse`].
pub fn parse_checklist(value: serde_json::Value) -> Result<ChecklistResult, AiError> {
    let value = match value {
        serde_json::Value::String(text) => serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| AiError::MalformedResponse(format!("checklist is not JSON: {e}")))?,
        other => other,
    };
    serde_json::from_value(value)
        .map_err(|e| AiError::MalformedResponse(format!("checklist does not match schema: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}
