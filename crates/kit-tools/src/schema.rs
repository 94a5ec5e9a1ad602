// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! JSON-Schema dialect normalisation.
//!
//! Tool input schemas arrive in mixed dialects. Before a tool is registered,
//! its schema is normalised so every downstream consumer — including
//! draft-04-only providers — sees a well-formed shape.

use serde_json::{Map, Value};

/// Recursively normalise a schema:
/// - numeric `exclusiveMinimum`/`exclusiveMaximum` (draft-07) become paired
/// `minimum`/`maximum` + boolean `exclusiveXxx` (draft-04);
/// - null or wrong-typed `required` fields are removed;
/// - object schemas with a missing/null `properties` get an empty map;
/// - `required` is always a concrete (possibly empty) array when present on
/// an object schema.
///
/// Recurses through `properties`, `items`, `additionalProperties`,
/// `allOf`/`anyOf`/`oneOf`, and `not`.
pub fn normalize(schema: Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(normalize_object(map)),
        other => other,
    }
}

fn normalize_object(mut map: Map<String, Value>) -> Map<String, Value> {
    draft07_exclusive_to_draft04(&mut map, "exclusiveMinimum", "minimum");
    draft07_exclusive_to_draft04(&mut map, "exclusiveMaximum", "maximum");
    fix_required_field(&mut map);
    fix_missing_properties(&mut map);

    for key in ["properties"] {
        if let Some(Value::Object(props)) = map.get_mut(key) {
            let normalised: Map<String, Value> =
            std::mem::take(props).into_iter().map(|(k, v)| (k, normalize(v))).collect();
            *props = normalised;
        }
    }

    if let Some(items) = map.remove("items") {
        map.insert("items".to_string(), normalize(items));
    }

    if let Some(ap) = map.remove("additionalProperties") {
        let normalised = match ap {
            Value::Object(_) => normalize(ap),
            other => other,
        };
        map.insert("additionalProperties".to_string(), normalised);
    }

    for key in ["allOf", "anyOf", "oneOf"] {
        if let Some(Value::Array(items)) = map.remove(key) {
            let normalised: Vec<Value> = items.into_iter().map(normalize).collect();
            map.insert(key.to_string(), Value::Array(normalised));
        }
    }

    if let Some(not) = map.remove("not") {
        map.insert("not".to_string(), normalize(not));
    }

    map
}

/// `"exclusiveMinimum": 5` (draft-07, a number) becomes
/// `"minimum": 5, "exclusiveMinimum": true` (draft-04, a boolean paired with
/// the plain bound). A schema that already uses the boolean form is left
/// untouched (idempotent conversion).
fn draft07_exclusive_to_draft04(map: &mut Map<String, Value>, exclusive_key: &str, bound_key: &str) {
    let is_numeric = matches!(map.get(exclusive_key), Some(v) if v.is_number());
    if !is_numeric {
        return;
    }
    if let Some(Value::Number(n)) = map.remove(exclusive_key) {
        map.insert(bound_key.to_string(), Value::Number(n));
        map.insert(exclusive_key.to_string(), Value::Bool(true));
    }
}

/// Null or wrong-type `required` fields are removed entirely; a valid array
/// of strings is left as-is.
fn fix_required_field(map: &mut Map<String, Value>) {
    match map.get("required") {
        Some(Value::Array(items)) if items.iter().all(|v| v.is_string()) => {}
        Some(_) => {
            map.remove("required");
        }
        None => {}
    }
}

/// Object schemas with a nil `properties` receive an empty map.
fn fix_missing_properties(map: &mut Map<String, Value>) {
    let is_object_type = matches!(map.get("type"), Some(Value::String(t)) if t == "object");
    if !is_object_type {
        return;
    }
    match map.get("properties") {
        Some(Value::Object(_)) => {}
        _ => {
            map.insert("properties".to_string(), Value::Object(Map::new()));
        }
    }
    if !map.contains_key("required") {
        map.insert("required".to_string(), Value::Array(vec![]));
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn draft07_numeric_exclusive_minimum_converts_to_draft04() {
        let input = json!({ "type": "number", "exclusiveMinimum": 5 });
        let out = normalize(input);
        assert_eq!(out["minimum"], json!(5));
        assert_eq!(out["exclusiveMinimum"], json!(true));
    }

    #[test]
    fn draft04_boolean_exclusive_minimum_is_left_alone() {
        let input = json!({ "type": "number", "minimum": 5, "exclusiveMinimum": true });
        let out = normalize(input.clone());
        assert_eq!(out, input);
    }

    #[test]
    fn null_required_is_removed() {
        let input = json!({ "type": "object", "required": null });
        let out = normalize(input);
        assert!(out.get("required").unwrap().is_array());
    }

    #[test]
    fn wrong_type_required_is_removed_then_defaulted() {
        let input = json!({ "type": "object", "required": "not-an-array" });
        let out = normalize(input);
        assert_eq!(out["required"], json!([]));
    }

    #[test]
    fn valid_required_array_is_preserved() {
        let input = json!({ "type": "object", "properties": {"x": {"type": "string"}}, "required": ["x"] });
        let out = normalize(input.clone());
        assert_eq!(out["required"], json!(["x"]));
    }

    #[test]
    fn missing_properties_on_object_becomes_empty_map() {
        let input = json!({ "type": "object" });
        let out = normalize(input);
        assert_eq!(out["properties"], json!({}));
    }

    #[test]
    fn required_is_always_present_as_array_on_object_schema() {
        let input = json!({ "type": "object", "properties": {} });
        let out = normalize(input);
        assert!(out["required"].is_array());
    }

    #[test]
    fn recurses_into_nested_properties() {
        let input = json!({
                "type": "object",
                "properties": {
                    "nested": { "type": "number", "exclusiveMaximum": 10 }
                }
        });
        let out = normalize(input);
        assert_eq!(out["properties"]["nested"]["maximum"], json!(10));
        assert_eq!(out["properties"]["nested"]["exclusiveMaximum"], json!(true));
    }

    #[test]
    fn recurses_into_items() {
        let input = json!({
                "type": "array",
                "items": { "type": "number", "exclusiveMinimum": 1 }
        });
        let out = normalize(input);
        assert_eq!(out["items"]["minimum"], json!(1));
    }

    #[test]
    fn recurses_into_all_of() {
        let input = json!({
                "allOf": [ { "type": "number", "exclusiveMinimum": 0 } ]
        });
        let out = normalize(input);
        assert_eq!(out["allOf"][0]["minimum"], json!(0));
    }

    #[test]
    fn normalizing_an_already_normalized_schema_is_a_no_op() {
        let input = json!({
                "type": "object",
                "properties": { "x": { "type": "string" } },
                "required": ["x"]
        });
        let once = normalize(input.clone());
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }
}
