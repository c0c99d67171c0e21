//! Field-level validation of decoded payloads
//!
//! Each field is taken out of the payload exactly once, so a failure always
//! names the field that caused it. Nothing is coerced: a value of the wrong
//! JSON type is an error.

use super::links::{decode_links, Relationships, FIELD_KEY};
use crate::error::ValidationError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Decoded JSON object awaiting validation for one record or input shape
#[derive(Debug, Clone)]
pub struct Fields {
    kind: &'static str,
    object: Map<String, Value>,
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl Fields {
    /// Accept a payload for `kind`, applying the inbound link transform
    pub fn from_payload(kind: &'static str, payload: Value) -> Result<Self, ValidationError> {
        let Value::Object(object) = payload else {
            return Err(ValidationError::new(
                kind,
                "<root>",
                format!("must be an object, got {}", json_type(&payload)),
            ));
        };
        Ok(Self {
            kind,
            object: decode_links(kind, object)?,
        })
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    fn error(&self, field: &str, reason: impl Into<String>) -> ValidationError {
        ValidationError::new(self.kind, field, reason)
    }

    /// Take a field that must be present and non-null
    pub fn required<T: DeserializeOwned>(&mut self, name: &str) -> Result<T, ValidationError> {
        match self.object.remove(name) {
            None => Err(self.error(name, "is missing")),
            Some(Value::Null) => Err(self.error(name, "must not be null")),
            Some(value) => {
                let found = json_type(&value);
                serde_json::from_value(value)
                    .map_err(|e| self.error(name, format!("has the wrong type ({found}): {e}")))
            }
        }
    }

    /// Take a field that may be absent or null
    pub fn optional<T: DeserializeOwned>(
        &mut self,
        name: &str,
    ) -> Result<Option<T>, ValidationError> {
        match self.object.remove(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => {
                let found = json_type(&value);
                serde_json::from_value(value)
                    .map(Some)
                    .map_err(|e| self.error(name, format!("has the wrong type ({found}): {e}")))
            }
        }
    }

    /// Take a required string that must not be blank
    pub fn required_text(&mut self, name: &str) -> Result<String, ValidationError> {
        let text: String = self.required(name)?;
        if text.trim().is_empty() {
            return Err(self.error(name, "must not be empty"));
        }
        Ok(text)
    }

    /// Take the decoded relationships; absent means none
    pub fn relationships(&mut self) -> Result<Relationships, ValidationError> {
        match self.object.remove(FIELD_KEY) {
            None | Some(Value::Null) => Ok(Relationships::default()),
            Some(value) => Relationships::from_value(self.kind, value),
        }
    }

    /// Reject anything not consumed yet; used for caller inputs
    pub fn deny_unknown(&self) -> Result<(), ValidationError> {
        match self.object.keys().next() {
            Some(field) => Err(self.error(field, "is not a recognized field")),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejects_non_objects() {
        let err = Fields::from_payload("app", json!([1, 2])).unwrap_err();
        assert_eq!(err.field, "<root>");
        assert!(err.reason.contains("an array"));
    }

    #[test]
    fn test_required_names_missing_field() {
        let mut fields = Fields::from_payload("app", json!({"id": 1})).unwrap();
        let err = fields.required::<String>("handle").unwrap_err();
        assert_eq!(err.field, "handle");
        assert_eq!(err.reason, "is missing");
    }

    #[test]
    fn test_required_does_not_coerce() {
        let mut fields = Fields::from_payload("service", json!({"container_count": "2"})).unwrap();
        let err = fields.required::<u32>("container_count").unwrap_err();
        assert_eq!(err.field, "container_count");
        assert!(err.reason.contains("a string"));
    }

    #[test]
    fn test_optional_accepts_null_and_absent() {
        let mut fields = Fields::from_payload("vhost", json!({"virtual_domain": null})).unwrap();
        assert_eq!(fields.optional::<String>("virtual_domain").unwrap(), None);
        assert_eq!(fields.optional::<String>("external_host").unwrap(), None);
    }

    #[test]
    fn test_relationships_are_read_from_wire_key() {
        let mut fields = Fields::from_payload(
            "app",
            json!({"_links": {"account": {"href": "/accounts/4"}}}),
        )
        .unwrap();
        let links = fields.relationships().unwrap();
        assert_eq!(links.get("account").unwrap().href, "/accounts/4");
    }

    #[test]
    fn test_deny_unknown_names_leftover_field() {
        let mut fields =
            Fields::from_payload("app_create", json!({"handle": "web", "color": "red"})).unwrap();
        let _: String = fields.required("handle").unwrap();
        let err = fields.deny_unknown().unwrap_err();
        assert_eq!(err.field, "color");
    }

    #[test]
    fn test_required_text_rejects_blank() {
        let mut fields = Fields::from_payload("app_create", json!({"handle": "  "})).unwrap();
        assert!(fields.required_text("handle").is_err());
    }
}
