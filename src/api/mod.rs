// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The backend API and the dashboard's route table.

mod client;
mod models;
mod routes;

pub use client::{ApiClient, ApiError};
pub use models::{
    AssignTechniques, LoginRequest, LoginResponse, NewTag, NewTechnique, PasswordChange,
    ProfileUpdate, Role, StudentSummary, StudentTechnique, StudentTechniques, StudentsQuery, Tag,
    TagTechnique, TagsResponse, Technique, TechniqueUpdate, UnknownRole, User, UserRegistration,
    UserUpdate,
};
pub use routes::{Access, Route};
