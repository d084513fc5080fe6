//! Parameter-schema normalization for the vendor's decoder.
//!
//! The vendor deviates from vanilla JSON Schema in two ways:
//! 1. Integer validation keys (`minLength`, `maxLength`, `minItems`,
//!    `maxItems`, `minProperties`, `maxProperties`) must arrive as strings.
//! 2. For `type: "string"`, only `format: "enum"` and `format: "date-time"`
//!    are accepted; any other `format` must be stripped.
//!
//! The rewrite is pure and idempotent and preserves property order.

use serde_json::Value;

const STRINGLY_KEYS: [&str; 6] = [
    "minLength",
    "maxLength",
    "minItems",
    "maxItems",
    "minProperties",
    "maxProperties",
];

const ALLOWED_STRING_FORMATS: [&str; 2] = ["enum", "date-time"];

/// Walk a decoded schema tree and apply both rewrites recursively.
pub fn adapt_schema(schema: Value) -> Value {
    match schema {
        Value::Object(map) => {
            let is_string_type = map.get("type").and_then(Value::as_str) == Some("string");
            let adapted = map
                .into_iter()
                .filter(|(key, value)| {
                    if !is_string_type || key != "format" {
                        return true;
                    }
                    value
                        .as_str()
                        .map(|f| ALLOWED_STRING_FORMATS.contains(&f))
                        .unwrap_or(false)
                })
                .map(|(key, value)| {
                    let value = if STRINGLY_KEYS.contains(&key.as_str()) && value.is_number() {
                        stringify_number(value)
                    } else {
                        adapt_schema(value)
                    };
                    (key, value)
                })
                .collect();
            Value::Object(adapted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(adapt_schema).collect()),
        other => other,
    }
}

fn stringify_number(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::String(n.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_validation_keys_become_strings() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "minLength": 1, "maxLength": 64 },
                "tags": { "type": "array", "minItems": 0, "items": { "type": "string" } },
            },
            "minProperties": 1,
        });
        let adapted = adapt_schema(schema);
        assert_eq!(adapted["properties"]["name"]["minLength"], "1");
        assert_eq!(adapted["properties"]["name"]["maxLength"], "64");
        assert_eq!(adapted["properties"]["tags"]["minItems"], "0");
        assert_eq!(adapted["minProperties"], "1");
    }

    #[test]
    fn disallowed_string_formats_are_stripped() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "uri": { "type": "string", "format": "uri" },
                "when": { "type": "string", "format": "date-time" },
                "kind": { "type": "string", "format": "enum", "enum": ["a", "b"] },
            },
        });
        let adapted = adapt_schema(schema);
        assert!(adapted["properties"]["uri"].get("format").is_none());
        assert_eq!(adapted["properties"]["when"]["format"], "date-time");
        assert_eq!(adapted["properties"]["kind"]["format"], "enum");
    }

    #[test]
    fn format_on_non_string_types_is_untouched() {
        let schema = serde_json::json!({
            "type": "integer",
            "format": "int64",
        });
        let adapted = adapt_schema(schema);
        assert_eq!(adapted["format"], "int64");
    }

    #[test]
    fn adapter_is_idempotent() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "minLength": 2, "format": "hostname" },
            },
            "maxProperties": 5,
        });
        let once = adapt_schema(schema);
        let twice = adapt_schema(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn property_order_is_preserved() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "zulu": { "type": "string" },
                "alpha": { "type": "string" },
            },
        });
        let adapted = adapt_schema(schema);
        let keys: Vec<&String> = adapted["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zulu", "alpha"]);
    }

    #[test]
    fn nested_schemas_are_rewritten() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string", "format": "uuid", "minLength": 36 },
                        },
                    },
                },
            },
        });
        let adapted = adapt_schema(schema);
        let id = &adapted["properties"]["items"]["items"]["properties"]["id"];
        assert!(id.get("format").is_none());
        assert_eq!(id["minLength"], "36");
    }
}
