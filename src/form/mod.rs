// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Form submission with tracing and server-side validation feedback.

mod notify;
mod state;
mod traced;
mod validation;

pub use notify::{
    ConsoleNotifier, LogNotifier, Notification, NotificationLevel, Notifier, RecordingNotifier,
};
pub use state::{ErrorSource, FieldError, FormState};
pub use traced::{
    is_sensitive_field, FormData, FormSpec, FormSubmission, SubmitError, SubmitHandler,
    SubmitMode, SubmitOutcome, TracedForm, FORM_SUBMIT_SPAN, GENERIC_FAILURE_MESSAGE, REDACTED,
    SUBMIT_ERROR_EVENT, SUBMIT_SUCCESS_EVENT,
};
pub use validation::FormValidation;
