// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Bridges server field errors into [`FormState`].

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::http::FieldErrors;

use super::notify::{Notification, Notifier};
use super::state::{FieldError, FormState};

/// Applies server-returned field errors to a shared form state.
#[derive(Clone)]
pub struct FormValidation {
    state: Arc<Mutex<FormState>>,
    notifier: Arc<dyn Notifier>,
}

impl FormValidation {
    pub fn new(state: Arc<Mutex<FormState>>, notifier: Arc<dyn Notifier>) -> Self {
        Self { state, notifier }
    }

    pub fn state(&self) -> &Arc<Mutex<FormState>> {
        &self.state
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Attach the first message of each field as a server error.
    ///
    /// Fields the form does not render produce a warning notification
    /// instead. The whole mapping is kept as the last server errors.
    pub fn set_field_errors(&self, errors: &FieldErrors) {
        let mut warnings = Vec::new();
        {
            let mut state = self.lock();
            for (field, messages) in errors {
                let Some(first) = messages.first() else {
                    continue;
                };
                if state.is_registered(field) {
                    state.set_error(field.clone(), FieldError::server(first.clone()));
                } else {
                    debug!(field = %field, "Server error for unregistered field");
                    warnings.push(Notification::warning(format!("{}: {}", field, first)));
                }
            }
            state.set_server_errors(errors.clone());
        }

        for warning in warnings {
            self.notifier.notify(warning);
        }
    }

    /// Drop all field errors.
    pub fn clear(&self) {
        self.lock().clear_errors();
    }

    pub fn last_errors(&self) -> FieldErrors {
        self.lock().server_errors().clone()
    }

    pub(crate) fn set_submitting(&self, submitting: bool) {
        self.lock().set_submitting(submitting);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::notify::{NotificationLevel, RecordingNotifier};
    use crate::form::state::ErrorSource;

    fn setup(fields: &[&str]) -> (FormValidation, Arc<RecordingNotifier>) {
        let mut state = FormState::new();
        for field in fields {
            state.register(*field);
        }
        let notifier = Arc::new(RecordingNotifier::new());
        let validation = FormValidation::new(Arc::new(Mutex::new(state)), notifier.clone());
        (validation, notifier)
    }

    fn errors(pairs: &[(&str, &[&str])]) -> FieldErrors {
        pairs
            .iter()
            .map(|(f, msgs)| (f.to_string(), msgs.iter().map(|m| m.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_first_message_becomes_server_error() {
        let (validation, notifier) = setup(&["username", "password"]);
        validation.set_field_errors(&errors(&[("username", &["already taken", "too short"])]));

        let state = validation.state().lock().unwrap();
        let error = state.error("username").unwrap();
        assert_eq!(error.message, "already taken");
        assert_eq!(error.source, ErrorSource::Server);
        assert_eq!(state.server_errors()["username"].len(), 2);
        assert!(notifier.notifications().is_empty());
    }

    #[test]
    fn test_unknown_field_becomes_warning() {
        let (validation, notifier) = setup(&["username"]);
        validation.set_field_errors(&errors(&[("database", &["Database error: locked"])]));

        assert!(validation.state().lock().unwrap().error("database").is_none());
        let seen = notifier.notifications();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].level, NotificationLevel::Warning);
        assert_eq!(seen[0].message, "database: Database error: locked");
    }

    #[test]
    fn test_empty_message_list_is_skipped() {
        let (validation, notifier) = setup(&["username"]);
        validation.set_field_errors(&errors(&[("username", &[]), ("other", &[])]));

        assert!(!validation.state().lock().unwrap().has_errors());
        assert!(notifier.notifications().is_empty());
        assert_eq!(validation.last_errors().len(), 2);
    }

    #[test]
    fn test_clear_resets_errors() {
        let (validation, _) = setup(&["username"]);
        validation.set_field_errors(&errors(&[("username", &["taken"])]));
        validation.clear();

        assert!(!validation.state().lock().unwrap().has_errors());
        assert!(validation.last_errors().is_empty());
    }
}
