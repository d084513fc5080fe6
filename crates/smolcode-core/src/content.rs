//! Vendor-facing content model.
//!
//! A conversation is a sequence of `Content` values, each holding one or
//! more `Part`s. Parts carry exactly one kind of payload: text, inline
//! bytes, a file reference, a function call requested by the model, or a
//! function response produced by a tool. Field names follow the vendor's
//! camelCase wire format.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One turn's worth of parts from a single author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A single payload inside a `Content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

/// Raw bytes, base64-encoded on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

/// Reference to previously-uploaded file content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub file_uri: String,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// A tool's answer to a `FunctionCall`, keyed by the tool name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub name: String,
    #[serde(default)]
    pub response: Map<String, Value>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn function_call(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            function_call: Some(FunctionCall {
                name: name.into(),
                args,
            }),
            ..Default::default()
        }
    }

    pub fn function_response(name: impl Into<String>, response: Map<String, Value>) -> Self {
        Self {
            function_response: Some(FunctionResponse {
                name: name.into(),
                response,
            }),
            ..Default::default()
        }
    }

    /// A part is empty when it carries no payload at all. Empty-string text
    /// counts as no payload.
    pub fn is_empty(&self) -> bool {
        self.text.as_deref().unwrap_or("").is_empty()
            && self.inline_data.is_none()
            && self.file_data.is_none()
            && self.function_call.is_none()
            && self.function_response.is_none()
    }
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::text(text)],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::text(text)],
        }
    }

    /// Wrap synthesized tool results. Function responses travel back to the
    /// model under the user role.
    pub fn function_responses(parts: Vec<Part>) -> Self {
        Self {
            role: Role::User,
            parts,
        }
    }

    /// The emptiness predicate gating every history append: a content is
    /// empty when it has no parts or every part is empty.
    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(Part::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_parts_is_empty() {
        let c = Content {
            role: Role::Model,
            parts: vec![],
        };
        assert!(c.is_empty());
    }

    #[test]
    fn blank_text_part_is_empty() {
        let c = Content {
            role: Role::Model,
            parts: vec![Part::text(""), Part::default()],
        };
        assert!(c.is_empty());
    }

    #[test]
    fn function_call_part_is_not_empty() {
        let c = Content {
            role: Role::Model,
            parts: vec![Part::function_call("read_file", Map::new())],
        };
        assert!(!c.is_empty());
    }

    #[test]
    fn wire_format_is_camel_case() {
        let part = Part {
            inline_data: Some(Blob {
                mime_type: "application/octet-stream".into(),
                data: "AAAA".into(),
            }),
            ..Default::default()
        };
        let json = serde_json::to_string(&part).unwrap();
        assert!(json.contains("\"inlineData\""));
        assert!(json.contains("\"mimeType\""));
        assert!(!json.contains("\"text\""));
    }

    #[test]
    fn roundtrip_through_value() {
        let c = Content {
            role: Role::Model,
            parts: vec![
                Part::text("hello"),
                Part::function_call("run_command", {
                    let mut m = Map::new();
                    m.insert("command".into(), Value::String("ls".into()));
                    m
                }),
            ],
        };
        let v = serde_json::to_value(&c).unwrap();
        let back: Content = serde_json::from_value(v).unwrap();
        assert_eq!(back, c);
    }
}
