// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error response bodies.
//!
//! The backend answers failures with either a structured validation body,
//! `{"status": "error", "errors": {"field": ["message", ...]}}`, or a generic
//! `{"error": "..."}` / `{"message": "..."}`. Bodies are decoded once into
//! [`ErrorBody`] and matched on from there.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field name to ordered messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Structured field-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorResponse {
    pub status: String,
    pub errors: FieldErrors,
}

impl ValidationErrorResponse {
    pub fn new(errors: FieldErrors) -> Self {
        Self {
            status: "error".to_string(),
            errors,
        }
    }

    /// A response with a single message for `field`.
    pub fn with_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.into()]);
        Self::new(errors)
    }

    /// Every `(field, message)` pair, fields in name order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors
            .iter()
            .flat_map(|(field, messages)| messages.iter().map(move |m| (field.as_str(), m.as_str())))
    }
}

/// A decoded error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBody {
    Validation(ValidationErrorResponse),
    /// A generic `error` or `message` string.
    Message(String),
    /// Not JSON, or JSON of another shape.
    Unstructured,
}

impl ErrorBody {
    pub fn decode(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => Self::from_value(&value),
            Err(_) => Self::Unstructured,
        }
    }

    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::Unstructured;
        };

        let is_validation = object.get("status").is_some_and(Value::is_string)
            && object.get("errors").is_some_and(Value::is_object);
        if is_validation {
            if let Ok(parsed) = serde_json::from_value::<ValidationErrorResponse>(value.clone()) {
                return Self::Validation(parsed);
            }
        }

        ["error", "message"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .map(|m| Self::Message(m.to_string()))
            .unwrap_or(Self::Unstructured)
    }

    /// The generic message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn validation(&self) -> Option<&ValidationErrorResponse> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_validation() {
        let body = br#"{"status":"error","errors":{"username":["already taken","too short"]}}"#;
        let decoded = ErrorBody::decode(body);
        let validation = decoded.validation().unwrap();
        assert_eq!(validation.status, "error");
        assert_eq!(
            validation.errors["username"],
            vec!["already taken".to_string(), "too short".to_string()]
        );
        assert_eq!(decoded.message(), None);
    }

    #[test]
    fn test_decode_error_before_message() {
        let decoded = ErrorBody::decode(br#"{"message":"second","error":"first"}"#);
        assert_eq!(decoded, ErrorBody::Message("first".to_string()));

        let decoded = ErrorBody::decode(br#"{"message":"Student not found"}"#);
        assert_eq!(decoded.message(), Some("Student not found"));
    }

    #[test]
    fn test_decode_unstructured() {
        assert_eq!(ErrorBody::decode(b"<html>oops</html>"), ErrorBody::Unstructured);
        assert_eq!(ErrorBody::decode(b""), ErrorBody::Unstructured);
        assert_eq!(ErrorBody::decode(b"[1,2]"), ErrorBody::Unstructured);
        assert_eq!(ErrorBody::decode(br#"{"error": 42}"#), ErrorBody::Unstructured);
    }

    #[test]
    fn test_shape_mismatch_falls_through_to_message() {
        // errors values must be string arrays
        let decoded = ErrorBody::decode(br#"{"status":"error","errors":{"a":1},"error":"bad"}"#);
        assert_eq!(decoded, ErrorBody::Message("bad".to_string()));

        let decoded = ErrorBody::decode(br#"{"status":500,"errors":{}}"#);
        assert_eq!(decoded, ErrorBody::Unstructured);
    }

    #[test]
    fn test_pairs_in_field_order() {
        let mut errors = FieldErrors::new();
        errors.insert("username".to_string(), vec!["taken".to_string()]);
        errors.insert("display_name".to_string(), vec!["empty".to_string(), "short".to_string()]);
        let response = ValidationErrorResponse::new(errors);

        let pairs: Vec<_> = response.pairs().collect();
        assert_eq!(
            pairs,
            vec![
                ("display_name", "empty"),
                ("display_name", "short"),
                ("username", "taken")
            ]
        );
    }
}
