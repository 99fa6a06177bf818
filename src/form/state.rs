// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Form field state.

use std::collections::BTreeMap;

use crate::http::FieldErrors;

/// Where a field error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Client,
    Server,
}

/// The message shown next to a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub message: String,
    pub source: ErrorSource,
}

impl FieldError {
    pub fn client(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: ErrorSource::Client,
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: ErrorSource::Server,
        }
    }
}

/// Registered fields, their values and errors.
#[derive(Debug, Clone, Default)]
pub struct FormState {
    values: BTreeMap<String, String>,
    errors: BTreeMap<String, FieldError>,
    server_errors: FieldErrors,
    submitting: bool,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `field` with an empty value. Existing values are kept.
    pub fn register(&mut self, field: impl Into<String>) {
        self.values.entry(field.into()).or_default();
    }

    pub fn is_registered(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    /// Set the value of a registered field. Returns false for unknown fields.
    pub fn set_value(&mut self, field: &str, value: impl Into<String>) -> bool {
        match self.values.get_mut(field) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    pub fn set_error(&mut self, field: impl Into<String>, error: FieldError) {
        self.errors.insert(field.into(), error);
    }

    pub fn error(&self, field: &str) -> Option<&FieldError> {
        self.errors.get(field)
    }

    pub fn errors(&self) -> &BTreeMap<String, FieldError> {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
        self.server_errors.clear();
    }

    /// The last mapping received from the server, all messages included.
    pub fn server_errors(&self) -> &FieldErrors {
        &self.server_errors
    }

    pub fn set_server_errors(&mut self, errors: FieldErrors) {
        self.server_errors = errors;
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn set_submitting(&mut self, submitting: bool) {
        self.submitting = submitting;
    }

    /// Clear values and errors, keeping registrations.
    pub fn reset(&mut self) {
        for value in self.values.values_mut() {
            value.clear();
        }
        self.clear_errors();
        self.submitting = false;
    }
}
