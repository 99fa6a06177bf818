// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Request and response bodies of the REST backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Student,
    Coach,
    Admin,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Coach => "coach",
            Role::Admin => "admin",
        }
    }

    /// Coaches and admins see every student.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Coach | Role::Admin)
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "coach" => Ok(Role::Coach),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A user as returned by `/me`, `/students` and `/admin/users`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub archived: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<User>,
    pub error: Option<String>,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentSummary {
    pub id: i64,
    pub username: String,
    pub display_name: String,
}

/// A technique assigned to a student, with progress notes.
#[derive(Debug, Clone, Deserialize)]
pub struct StudentTechnique {
    pub id: i64,
    pub technique_id: i64,
    pub technique_name: String,
    pub technique_description: String,
    pub status: String,
    pub student_notes: String,
    pub coach_notes: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudentTechniques {
    pub student: StudentSummary,
    pub techniques: Vec<StudentTechnique>,
    #[serde(default)]
    pub can_edit_all_techniques: bool,
    #[serde(default)]
    pub can_assign_techniques: bool,
    #[serde(default)]
    pub can_create_techniques: bool,
    #[serde(default)]
    pub can_manage_tags: bool,
}

/// Partial update of a student technique. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TechniqueUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coach_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technique_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technique_description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRegistration {
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub role: Role,
}

/// A technique in the catalogue, as offered for assignment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Technique {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub coach_id: i64,
    pub coach_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignTechniques {
    pub technique_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTechnique {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// Admin edit of another user's account. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewTag {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TagTechnique {
    pub technique_id: i64,
    pub tag_id: i64,
}

/// Filters for the student list.
#[derive(Debug, Clone, Default)]
pub struct StudentsQuery {
    /// `recent_update` orders by last activity; name order otherwise.
    pub sort_by: Option<String>,
    pub include_archived: bool,
    /// Case-insensitive match on username or display name, applied locally.
    pub search: Option<String>,
}

impl StudentsQuery {
    pub fn matches(&self, user: &User) -> bool {
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                user.username.to_lowercase().contains(&term)
                    || user.display_name.to_lowercase().contains(&term)
            }
        }
    }
}
