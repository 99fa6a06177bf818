// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! REST client for the Silly Bus backend.
//!
//! All calls go through a [`TracedClient`], so each one is a traced request
//! carrying the session id. Non-2xx responses become [`ApiError::Status`],
//! classified the same way the request span was.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::error::FetchError;
use crate::form::SubmitError;
use crate::http::{
    classify_body, ErrorBody, ErrorType, HttpRequest, HttpResponse, TracedClient,
};

use super::models::{
    AssignTechniques, LoginRequest, LoginResponse, NewTag, NewTechnique, PasswordChange,
    ProfileUpdate, StudentTechniques, StudentsQuery, Tag, TagTechnique, TagsResponse, Technique,
    TechniqueUpdate, User, UserRegistration, UserUpdate,
};

const INVALID_LOGIN_MESSAGE: &str = "Invalid username or password";

/// Errors returned by [`ApiClient`].
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message} (HTTP {})", .status.as_u16())]
    Status {
        status: StatusCode,
        error_type: ErrorType,
        message: String,
        body: ErrorBody,
        response: HttpResponse,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("Login failed: {0}")]
    Login(String),
}

impl ApiError {
    fn from_response(response: HttpResponse) -> Self {
        let body = ErrorBody::decode(&response.body);
        let classification = classify_body(response.status, &body);
        Self::Status {
            status: response.status,
            error_type: classification.error_type,
            message: classification.message,
            body,
            response,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::Status { error_type, .. } => *error_type,
            Self::Fetch(_) => ErrorType::NetworkError,
            Self::Login(_) => ErrorType::AuthenticationError,
            Self::Decode(_) | Self::Url(_) => ErrorType::UnknownError,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status {
                message, response, ..
            } => SubmitError::Api {
                message,
                response: Some(response),
            },
            ApiError::Fetch(e) => SubmitError::Fetch(e),
            other => SubmitError::Api {
                message: other.to_string(),
                response: None,
            },
        }
    }
}

/// Typed access to the backend API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: TracedClient,
    base: Url,
}

impl ApiClient {
    /// `base_url` is the API root, e.g. `http://localhost:8000/api`.
    pub fn new(client: TracedClient, base_url: &str) -> Result<Self, ApiError> {
        let mut base = Url::parse(base_url).map_err(|e| ApiError::Url(format!("{base_url}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn traced_client(&self) -> &TracedClient {
        &self.client
    }

    /// Absolute URL of an API path.
    pub fn url(&self, path: &str) -> Result<String, ApiError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map(String::from)
            .map_err(|e| ApiError::Url(format!("{path}: {e}")))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let response = self.client.fetch(request).await?;
        if response.ok() {
            Ok(response)
        } else {
            Err(ApiError::from_response(response))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(HttpRequest::get(self.url(path)?)).await?;
        decode(&response)
    }

    /// Log in; the session cookie is kept by the transport.
    #[instrument(skip_all, fields(username = %username))]
    pub async fn login(&self, username: &str, password: &str) -> Result<User, ApiError> {
        let request = HttpRequest::post(self.url("login")?).json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?;
        let response: LoginResponse = decode(&self.send(request).await?)?;

        if !response.success {
            return Err(ApiError::Login(
                response
                    .error
                    .unwrap_or_else(|| INVALID_LOGIN_MESSAGE.to_string()),
            ));
        }
        let user = response
            .user
            .ok_or_else(|| ApiError::Decode("login response has no user".to_string()))?;
        debug!(user_id = user.id, role = %user.role, "Logged in");
        Ok(user)
    }

    /// Log out. The backend answers with a redirect, which counts as success.
    #[instrument(skip_all)]
    pub async fn logout(&self) -> Result<(), ApiError> {
        let response = self.client.fetch(HttpRequest::post(self.url("logout")?)).await?;
        if response.ok() || response.redirected {
            Ok(())
        } else {
            Err(ApiError::from_response(response))
        }
    }

    #[instrument(skip_all)]
    pub async fn me(&self) -> Result<User, ApiError> {
        self.get_json("me").await
    }

    #[instrument(skip_all, fields(sort_by = ?query.sort_by, include_archived = query.include_archived))]
    pub async fn students(&self, query: &StudentsQuery) -> Result<Vec<User>, ApiError> {
        let mut params = Vec::new();
        if let Some(sort_by) = &query.sort_by {
            params.push(("sort_by", sort_by.as_str()));
        }
        if query.include_archived {
            params.push(("include_archived", "true"));
        }

        let request = HttpRequest::get(self.url("students")?).query(params)?;
        let students: Vec<User> = decode(&self.send(request).await?)?;
        Ok(students.into_iter().filter(|s| query.matches(s)).collect())
    }

    #[instrument(skip(self))]
    pub async fn student_techniques(&self, student_id: i64) -> Result<StudentTechniques, ApiError> {
        self.get_json(&format!("student/{}/techniques", student_id))
            .await
    }

    #[instrument(skip(self, update))]
    pub async fn update_student_technique(
        &self,
        id: i64,
        update: &TechniqueUpdate,
    ) -> Result<(), ApiError> {
        let request =
            HttpRequest::put(self.url(&format!("student_technique/{}", id))?).json(update)?;
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(username = %registration.username, role = %registration.role))]
    pub async fn register_user(&self, registration: &UserRegistration) -> Result<(), ApiError> {
        let request = HttpRequest::post(self.url("register")?).json(registration)?;
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn admin_users(&self) -> Result<Vec<User>, ApiError> {
        self.get_json("admin/users").await
    }

    #[instrument(skip_all)]
    pub async fn tags(&self) -> Result<Vec<Tag>, ApiError> {
        let response: TagsResponse = self.get_json("tags").await?;
        Ok(response.tags)
    }

    /// Techniques not yet assigned to a student.
    #[instrument(skip(self))]
    pub async fn unassigned_techniques(&self, student_id: i64) -> Result<Vec<Technique>, ApiError> {
        self.get_json(&format!("student/{}/unassigned_techniques", student_id))
            .await
    }

    #[instrument(skip(self))]
    pub async fn assign_techniques(
        &self,
        student_id: i64,
        technique_ids: &[i64],
    ) -> Result<(), ApiError> {
        let request = HttpRequest::post(self.url(&format!("student/{}/add_techniques", student_id))?)
            .json(&AssignTechniques {
                technique_ids: technique_ids.to_vec(),
            })?;
        self.send(request).await?;
        Ok(())
    }

    /// Create a technique and assign it to the student in one call.
    #[instrument(skip(self, description))]
    pub async fn create_technique(
        &self,
        student_id: i64,
        name: &str,
        description: &str,
    ) -> Result<(), ApiError> {
        let request =
            HttpRequest::post(self.url(&format!("student/{}/create_technique", student_id))?)
                .json(&NewTechnique {
                    name: name.to_string(),
                    description: description.to_string(),
                })?;
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn update_profile(&self, display_name: &str) -> Result<(), ApiError> {
        let request = HttpRequest::put(self.url("profile")?).json(&ProfileUpdate {
            display_name: display_name.to_string(),
        })?;
        self.send(request).await?;
        Ok(())
    }

    /// A wrong current password comes back as a validation error on
    /// `current_password`.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let request = HttpRequest::post(self.url("change-password")?).json(&PasswordChange {
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        })?;
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self, update))]
    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<(), ApiError> {
        let request = HttpRequest::put(self.url(&format!("admin/users/{}", id))?).json(update)?;
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create_tag(&self, name: &str) -> Result<(), ApiError> {
        let request = HttpRequest::post(self.url("tags")?).json(&NewTag {
            name: name.to_string(),
        })?;
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_tag(&self, id: i64) -> Result<(), ApiError> {
        self.send(HttpRequest::delete(self.url(&format!("tags/{}", id))?))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn add_tag_to_technique(&self, technique_id: i64, tag_id: i64) -> Result<(), ApiError> {
        let request = HttpRequest::post(self.url("technique/tag")?).json(&TagTechnique {
            technique_id,
            tag_id,
        })?;
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_tag_from_technique(
        &self,
        technique_id: i64,
        tag_id: i64,
    ) -> Result<(), ApiError> {
        let path = format!("technique/{}/tag/{}", technique_id, tag_id);
        self.send(HttpRequest::delete(self.url(&path)?)).await?;
        Ok(())
    }

    /// Whether the backend answers its health check.
    pub async fn health(&self) -> Result<bool, ApiError> {
        let response = self.client.fetch(HttpRequest::get(self.url("health")?)).await?;
        Ok(response.ok() && response.text().trim() == "OK")
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    response
        .json()
        .map_err(|e| ApiError::Decode(format!("{}: {}", response.url, e)))
}
