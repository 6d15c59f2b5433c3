//! Stored values.

use bytes::Bytes;

/// A value held in the store.
///
/// Text and byte values are served verbatim; documents are served as
/// pretty-printed JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Document(serde_json::Value),
    /// A payload that is not valid UTF-8.
    Bytes(Bytes),
}

impl Value {
    /// Render the value as a response body.
    pub fn to_body(&self) -> Result<Bytes, serde_json::Error> {
        match self {
            Value::Text(s) => Ok(Bytes::from(s.clone())),
            Value::Document(doc) => serde_json::to_vec_pretty(doc).map(Bytes::from),
            Value::Bytes(bytes) => Ok(bytes.clone()),
        }
    }

    /// Get the text if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Document(_) | Value::Bytes(_) => None,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Document(other),
        }
    }
}

impl From<Bytes> for Value {
    /// Text when the payload is UTF-8, otherwise the raw bytes.
    fn from(payload: Bytes) -> Self {
        match String::from_utf8(payload.to_vec()) {
            Ok(text) => Value::Text(text),
            Err(_) => Value::Bytes(payload),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_strings_become_text() {
        assert_eq!(Value::from(json!("us-west-2")), Value::Text("us-west-2".into()));
        assert_eq!(
            Value::from(json!({"a": 1})),
            Value::Document(json!({"a": 1}))
        );
    }

    #[test]
    fn text_body_is_verbatim() {
        let v = Value::from("i-0123456789");
        assert_eq!(v.to_body().unwrap(), Bytes::from_static(b"i-0123456789"));
    }

    #[test]
    fn binary_payload_is_kept_byte_for_byte() {
        let payload = Bytes::from_static(&[0xff, 0xfe, 0x61, 0x00, 0xc3]);
        let v = Value::from(payload.clone());
        assert_eq!(v, Value::Bytes(payload.clone()));
        assert_eq!(v.as_text(), None);
        assert_eq!(v.to_body().unwrap(), payload);

        assert_eq!(Value::from(Bytes::from_static(b"plain")), Value::from("plain"));
    }

    #[test]
    fn document_body_is_pretty_json() {
        let v = Value::from(json!({"zone": "a"}));
        let body = v.to_body().unwrap();
        assert_eq!(&body[..], b"{\n  \"zone\": \"a\"\n}");
    }
}
