//! The structured reply contract the model has to follow on every turn.
//!
//! The model either talks to the user:
//! `{"to": "user", "message": "..."}`
//! or asks the host to run a capability:
//! `{"to": "system", "function_call": {"function": "...", "arguments": [...]}}`
//!
//! Decoding normalizes exactly two things before classification: a surrounding
//! markdown code fence is removed, and a missing or non-array `arguments` is read
//! as an empty argument list. Everything else that does not fit one of the two
//! shapes is an error; repair policy belongs to the caller.
use serde_json::{json, Map, Value};

use crate::errors::DecodeError;

const FENCE: &str = "```";

/// A capability invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Vec<Value>,
}

impl FunctionCall {
    pub fn new<S: Into<String>>(name: S, arguments: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// One decoded model turn
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    UserReply { message: String },
    CapabilityRequest(FunctionCall),
}

impl Envelope {
    pub fn user_reply<S: Into<String>>(message: S) -> Self {
        Envelope::UserReply {
            message: message.into(),
        }
    }

    pub fn capability_request<S: Into<String>>(name: S, arguments: Vec<Value>) -> Self {
        Envelope::CapabilityRequest(FunctionCall::new(name, arguments))
    }

    /// The canonical JSON form, as the model is instructed to write it
    pub fn to_value(&self) -> Value {
        match self {
            Envelope::UserReply { message } => json!({
                "to": "user",
                "message": message,
            }),
            Envelope::CapabilityRequest(call) => json!({
                "to": "system",
                "function_call": {
                    "function": call.name,
                    "arguments": call.arguments,
                },
            }),
        }
    }
}

/// Serialize an envelope in the canonical form
pub fn encode(envelope: &Envelope) -> String {
    envelope.to_value().to_string()
}

/// Decode raw model output into an envelope
pub fn decode(raw: &str) -> Result<Envelope, DecodeError> {
    let text = strip_code_fence(raw.trim());

    let value: Value =
        serde_json::from_str(text).map_err(|source| DecodeError::MalformedJson {
            text: text.to_string(),
            source,
        })?;

    let object = match value.as_object() {
        Some(object) => object,
        None => {
            return Err(DecodeError::InvalidEnvelopeTag(
                "model output is not a JSON object".to_string(),
            ))
        }
    };

    match object.get("to") {
        Some(Value::String(to)) if to == "user" => decode_user_reply(object),
        Some(Value::String(to)) if to == "system" => decode_capability_request(object),
        Some(other) => Err(DecodeError::InvalidEnvelopeTag(format!(
            "unrecognized target {}",
            other
        ))),
        None => Err(DecodeError::InvalidEnvelopeTag(
            "missing 'to' field".to_string(),
        )),
    }
}

/// Triggered only when the text opens with a fence. The info string after the
/// opening fence (`json`) is dropped along with everything from the last fence on.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix(FENCE) else {
        return text;
    };
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let rest = match rest.rfind(FENCE) {
        Some(end) => &rest[..end],
        None => rest,
    };
    rest.trim()
}

fn decode_user_reply(object: &Map<String, Value>) -> Result<Envelope, DecodeError> {
    if let Some(extra) = object.keys().find(|key| *key != "to" && *key != "message") {
        return Err(DecodeError::InvalidUserEnvelope(format!(
            "unexpected field '{}'",
            extra
        )));
    }

    match object.get("message") {
        Some(Value::String(message)) => Ok(Envelope::user_reply(message.clone())),
        Some(_) => Err(DecodeError::InvalidUserEnvelope(
            "'message' is not a string".to_string(),
        )),
        None => Err(DecodeError::InvalidUserEnvelope(
            "missing 'message' field".to_string(),
        )),
    }
}

fn decode_capability_request(object: &Map<String, Value>) -> Result<Envelope, DecodeError> {
    if object.contains_key("message") {
        return Err(DecodeError::InvalidCapabilityEnvelope(
            "'message' must be absent when addressing the system".to_string(),
        ));
    }

    let call = object
        .get("function_call")
        .or_else(|| object.get("functionCall"))
        .and_then(Value::as_object)
        .ok_or_else(|| {
            DecodeError::InvalidCapabilityEnvelope(
                "missing or invalid 'function_call' object".to_string(),
            )
        })?;

    let name = call
        .get("function")
        .or_else(|| call.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            DecodeError::InvalidCapabilityEnvelope("missing function name".to_string())
        })?;

    let arguments = call
        .get("arguments")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(Envelope::capability_request(name, arguments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_decode_user_reply() {
        let envelope = decode(r#"{"to": "user", "message": "Hello! How can I help?"}"#).unwrap();
        assert_eq!(envelope, Envelope::user_reply("Hello! How can I help?"));
    }

    #[test]
    fn test_decode_fenced_user_reply() {
        let raw = indoc! {r#"
            ```json
            {"to": "user", "message": "Fenced **markdown** reply"}
            ```
        "#};
        let envelope = decode(raw).unwrap();
        assert_eq!(envelope, Envelope::user_reply("Fenced **markdown** reply"));
    }

    #[test]
    fn test_decode_fence_without_language_or_closing_marker() {
        let envelope = decode("```\n{\"to\": \"user\", \"message\": \"cut by stop\"}").unwrap();
        assert_eq!(envelope, Envelope::user_reply("cut by stop"));
    }

    #[test]
    fn test_decode_capability_request() {
        let raw = r#"{"to": "system", "function_call": {"function": "check_appointment_availability", "arguments": ["2025-06-01T10:00:00Z"]}}"#;
        let envelope = decode(raw).unwrap();
        assert_eq!(
            envelope,
            Envelope::capability_request(
                "check_appointment_availability",
                vec![json!("2025-06-01T10:00:00Z")]
            )
        );
    }

    #[test]
    fn test_decode_capability_request_aliases() {
        let raw = r#"{"to": "system", "functionCall": {"name": "query_patient_records", "arguments": ["Doe"]}}"#;
        let envelope = decode(raw).unwrap();
        assert_eq!(
            envelope,
            Envelope::capability_request("query_patient_records", vec![json!("Doe")])
        );
    }

    #[test]
    fn test_missing_or_malformed_arguments_become_empty() {
        for raw in [
            r#"{"to": "system", "function_call": {"function": "query_patient_records"}}"#,
            r#"{"to": "system", "function_call": {"function": "query_patient_records", "arguments": "Doe"}}"#,
            r#"{"to": "system", "function_call": {"function": "query_patient_records", "arguments": null}}"#,
        ] {
            let envelope = decode(raw).unwrap();
            assert_eq!(
                envelope,
                Envelope::capability_request("query_patient_records", vec![])
            );
        }
    }

    #[test]
    fn test_capability_request_requires_function_name() {
        for raw in [
            r#"{"to": "system"}"#,
            r#"{"to": "system", "function_call": "check"}"#,
            r#"{"to": "system", "function_call": {"arguments": []}}"#,
            r#"{"to": "system", "function_call": {"function": "  "}}"#,
        ] {
            assert!(matches!(
                decode(raw),
                Err(DecodeError::InvalidCapabilityEnvelope(_))
            ));
        }
    }

    #[test]
    fn test_capability_request_rejects_message() {
        let raw = r#"{"to": "system", "message": "hi", "function_call": {"function": "x"}}"#;
        assert!(matches!(
            decode(raw),
            Err(DecodeError::InvalidCapabilityEnvelope(_))
        ));
    }

    #[test]
    fn test_user_reply_requires_string_message() {
        for raw in [
            r#"{"to": "user"}"#,
            r#"{"to": "user", "message": 42}"#,
            r#"{"to": "user", "message": "hi", "function_call": {"function": "x"}}"#,
        ] {
            assert!(matches!(
                decode(raw),
                Err(DecodeError::InvalidUserEnvelope(_))
            ));
        }
    }

    #[test]
    fn test_missing_or_unknown_tag() {
        for raw in [
            r#"{"message": "hi"}"#,
            r#"{"to": "admin", "message": "hi"}"#,
            r#"{"to": 1, "message": "hi"}"#,
            r#"["user", "hi"]"#,
        ] {
            assert!(matches!(
                decode(raw),
                Err(DecodeError::InvalidEnvelopeTag(_))
            ));
        }
    }

    #[test]
    fn test_malformed_json_keeps_offending_text() {
        match decode("  Sure! Here is the answer: {to: user}  ") {
            Err(DecodeError::MalformedJson { text, .. }) => {
                assert_eq!(text, "Sure! Here is the answer: {to: user}");
            }
            other => panic!("Expected MalformedJson, got {:?}", other),
        }
    }

    #[test]
    fn test_user_reply_survives_encoding_and_fencing() {
        let envelope = Envelope::user_reply("hi");
        let encoded = encode(&envelope);
        assert_eq!(decode(&encoded).unwrap(), envelope);

        let fenced = format!("```json\n{}\n```", encoded);
        assert_eq!(decode(&fenced).unwrap(), envelope);
    }
}
