// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Traced form submission.
//!
//! A [`TracedForm`] runs each submission in a `form_submit` span. Field
//! values are recorded with anything password-like redacted. Failures are
//! turned into either field errors plus one notification per message, or a
//! single generic notification.
//!
//! A form submits at most once at a time: a submit issued while another is
//! in flight returns [`SubmitOutcome::Ignored`] without doing anything.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry::trace::FutureExt;
use opentelemetry::{Context, KeyValue};
use reqwest::Method;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::http::{ErrorBody, FieldErrors, HttpRequest, HttpResponse, TracedClient};
use crate::telemetry::{SpanOptions, SpanScope};

use super::notify::{LogNotifier, Notification, Notifier};
use super::validation::FormValidation;

/// Replaces the value of sensitive fields in telemetry.
pub const REDACTED: &str = "[REDACTED]";

/// Generic message when an error carries none.
pub const GENERIC_FAILURE_MESSAGE: &str = "Form submission failed";

pub const FORM_SUBMIT_SPAN: &str = "form_submit";
pub const SUBMIT_SUCCESS_EVENT: &str = "form_submit_success";
pub const SUBMIT_ERROR_EVENT: &str = "form_submit_error";

/// Whether a field's value must never reach telemetry.
pub fn is_sensitive_field(name: &str) -> bool {
    name.to_ascii_lowercase().contains("password")
}

/// Ordered field values of one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: Vec<(String, String)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field map with sensitive values replaced by [`REDACTED`].
    ///
    /// A name that appears more than once maps to an array of its values.
    pub fn redacted(&self) -> serde_json::Map<String, serde_json::Value> {
        use serde_json::{Map, Value};

        let mut map = Map::new();
        for (name, value) in self.iter() {
            let shown = Value::from(if is_sensitive_field(name) { REDACTED } else { value });
            match map.get_mut(name) {
                None => {
                    map.insert(name.to_string(), shown);
                }
                Some(Value::Array(values)) => values.push(shown),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, shown]);
                }
            }
        }
        map
    }

    /// JSON of [`FormData::redacted`].
    pub fn redacted_json(&self) -> String {
        serde_json::Value::Object(self.redacted()).to_string()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// How the page hosting the form behaves after a default submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitMode {
    /// State is updated in place.
    #[default]
    Spa,
    /// A redirected response becomes a full navigation.
    Legacy,
}

/// Identity and target of a form.
#[derive(Debug, Clone)]
pub struct FormSpec {
    pub id: String,
    pub action: String,
    pub method: Method,
    pub mode: SubmitMode,
}

impl FormSpec {
    /// A `POST` form in SPA mode.
    pub fn new(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            method: Method::POST,
            mode: SubmitMode::Spa,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: SubmitMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Errors raised while submitting a form.
#[derive(Error, Debug)]
pub enum SubmitError {
    /// A non-2xx response, raised as-is.
    #[error("Request failed with status {}", .0.status)]
    Response(HttpResponse),

    /// An API failure that carries the response behind it.
    #[error("{message}")]
    Api {
        message: String,
        response: Option<HttpResponse>,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Other(String),
}

impl SubmitError {
    /// The response behind this error, directly or nested.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Response(response) => Some(response),
            Self::Api { response, .. } => response.as_ref(),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<ErrorBody> {
        self.response().map(|r| ErrorBody::decode(&r.body))
    }

    /// Message for the generic failure notification.
    pub fn user_message(&self) -> String {
        let message = match self {
            Self::Response(response) => ErrorBody::decode(&response.body)
                .message()
                .map(String::from)
                .unwrap_or_default(),
            other => other.to_string(),
        };
        if message.trim().is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            message
        }
    }
}

/// What a submission handed to a [`SubmitHandler`] contains.
#[derive(Debug, Clone)]
pub struct FormSubmission {
    pub form_id: String,
    pub data: FormData,
    /// Context of the `form_submit` span, for child spans.
    pub context: Context,
}

/// Replaces the default network submission.
#[async_trait]
pub trait SubmitHandler: Send + Sync {
    async fn submit(&self, submission: FormSubmission) -> Result<(), SubmitError>;
}

#[async_trait]
impl<F, Fut> SubmitHandler for F
where
    F: Fn(FormSubmission) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), SubmitError>> + Send + 'static,
{
    async fn submit(&self, submission: FormSubmission) -> Result<(), SubmitError> {
        (self)(submission).await
    }
}

/// Result of [`TracedForm::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Another submission was in flight.
    Ignored,
    Completed,
    /// Legacy pages navigate to this URL.
    Navigate(String),
    Failed,
}

type SuccessCallback = Arc<dyn Fn() + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&SubmitError) + Send + Sync>;
type FieldErrorsCallback = Arc<dyn Fn(&FieldErrors) + Send + Sync>;

/// A form whose submissions are traced.
pub struct TracedForm {
    spec: FormSpec,
    client: TracedClient,
    handler: Option<Arc<dyn SubmitHandler>>,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
    set_field_errors: Option<FieldErrorsCallback>,
    notifier: Arc<dyn Notifier>,
    validation: Option<FormValidation>,
    submitting: AtomicBool,
}

impl TracedForm {
    pub fn new(spec: FormSpec, client: TracedClient) -> Self {
        Self {
            spec,
            client,
            handler: None,
            on_success: None,
            on_error: None,
            set_field_errors: None,
            notifier: Arc::new(LogNotifier),
            validation: None,
            submitting: AtomicBool::new(false),
        }
    }

    pub fn on_submit(mut self, handler: impl SubmitHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn on_success(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&SubmitError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn set_field_errors(
        mut self,
        callback: impl Fn(&FieldErrors) + Send + Sync + 'static,
    ) -> Self {
        self.set_field_errors = Some(Arc::new(callback));
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Route server field errors into `validation`.
    ///
    /// Field errors are cleared after a successful submission and the
    /// state's submitting flag follows this form.
    pub fn with_validation(mut self, validation: FormValidation) -> Self {
        let bridge = validation.clone();
        self.set_field_errors = Some(Arc::new(move |errors| bridge.set_field_errors(errors)));
        self.validation = Some(validation);
        self
    }

    pub fn spec(&self) -> &FormSpec {
        &self.spec
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Submit `data` under the current context.
    pub async fn submit(&self, data: FormData) -> SubmitOutcome {
        self.submit_in(data, &Context::current()).await
    }

    /// Submit `data` with the form span as a child of `parent`.
    pub async fn submit_in(&self, data: FormData, parent: &Context) -> SubmitOutcome {
        let Some(_guard) = SubmitGuard::acquire(&self.submitting, self.validation.as_ref()) else {
            debug!(form = %self.spec.id, "Submission already in flight, ignoring");
            return SubmitOutcome::Ignored;
        };

        let scope = SpanScope::start(
            self.client.tracer(),
            FORM_SUBMIT_SPAN,
            SpanOptions::new().with_parent(parent).with_attributes([
                KeyValue::new("form.id", self.spec.id.clone()),
                KeyValue::new("form.action", self.spec.action.clone()),
                KeyValue::new("form.method", self.spec.method.to_string()),
                KeyValue::new("form.data", data.redacted_json()),
            ]),
        );
        let cx = scope.context().clone();

        match self.run(data, &cx).with_context(cx.clone()).await {
            Ok(outcome) => {
                scope.add_event(SUBMIT_SUCCESS_EVENT, Vec::new());
                scope.set_ok();
                if let Some(validation) = &self.validation {
                    validation.clear();
                }
                info!(form = %self.spec.id, "Form submitted");
                if let Some(callback) = &self.on_success {
                    callback();
                }
                outcome
            }
            Err(err) => {
                self.report_failure(&scope, &err);
                if let Some(callback) = &self.on_error {
                    callback(&err);
                }
                SubmitOutcome::Failed
            }
        }
    }

    async fn run(&self, data: FormData, cx: &Context) -> Result<SubmitOutcome, SubmitError> {
        match &self.handler {
            Some(handler) => {
                handler
                    .submit(FormSubmission {
                        form_id: self.spec.id.clone(),
                        data,
                        context: cx.clone(),
                    })
                    .await?;
                Ok(SubmitOutcome::Completed)
            }
            None => self.default_submit(&data, cx).await,
        }
    }

    async fn default_submit(
        &self,
        data: &FormData,
        cx: &Context,
    ) -> Result<SubmitOutcome, SubmitError> {
        let request = if self.spec.method == Method::GET {
            HttpRequest::get(self.spec.action.clone()).query(data.iter())?
        } else {
            HttpRequest::new(self.spec.method.clone(), self.spec.action.clone()).form(data.iter())
        };

        let response = self.client.fetch_in(request, cx).await?;
        if !response.ok() {
            return Err(SubmitError::Response(response));
        }

        if self.spec.mode == SubmitMode::Legacy && response.redirected {
            return Ok(SubmitOutcome::Navigate(response.url));
        }
        Ok(SubmitOutcome::Completed)
    }

    fn report_failure(&self, scope: &SpanScope, err: &SubmitError) {
        let message = err.user_message();
        scope.add_event(
            SUBMIT_ERROR_EVENT,
            vec![KeyValue::new("error.message", message.clone())],
        );
        scope.set_error(message.clone());

        match err.body() {
            Some(ErrorBody::Validation(validation)) => {
                if let Ok(raw) = serde_json::to_string(&validation.errors) {
                    scope.set_attribute(KeyValue::new("form.validation_errors", raw));
                }
                match &self.set_field_errors {
                    Some(callback) => callback(&validation.errors),
                    None => debug!(form = %self.spec.id, "No field error handler, dropping field errors"),
                }
                for (field, field_message) in validation.pairs() {
                    self.notifier
                        .notify(Notification::error(format!("{}: {}", field, field_message)));
                }
                warn!(form = %self.spec.id, fields = validation.errors.len(), "Form rejected by validation");
            }
            _ => {
                warn!(form = %self.spec.id, error = %err, "Form submission failed");
                self.notifier.notify(Notification::error(message));
            }
        }
    }
}

impl fmt::Debug for TracedForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TracedForm")
            .field("spec", &self.spec)
            .field("submitting", &self.is_submitting())
            .finish_non_exhaustive()
    }
}

/// Holds the submitting flag; releases it on drop.
struct SubmitGuard<'a> {
    flag: &'a AtomicBool,
    validation: Option<&'a FormValidation>,
}

impl<'a> SubmitGuard<'a> {
    fn acquire(flag: &'a AtomicBool, validation: Option<&'a FormValidation>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        if let Some(validation) = validation {
            validation.set_submitting(true);
        }
        Some(Self { flag, validation })
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        if let Some(validation) = self.validation {
            validation.set_submitting(false);
        }
        self.flag.store(false, Ordering::Release);
    }
}
