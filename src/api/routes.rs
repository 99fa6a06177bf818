// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Client-side route table and role gating.

use std::fmt;

use super::models::{Role, User};

/// A page of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
    Students,
    Student(i64),
    Profile,
    RegisterUser,
    Admin,
}

/// Whether a user may open a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    RedirectToLogin,
    Forbidden,
}

impl Route {
    /// Every route with a fixed path, in menu order.
    pub const STATIC: [Route; 6] = [
        Route::Login,
        Route::Dashboard,
        Route::Students,
        Route::Profile,
        Route::RegisterUser,
        Route::Admin,
    ];

    /// Parse a path. A trailing slash is ignored.
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        let route = match trimmed {
            "/login" => Route::Login,
            "" | "/dashboard" => Route::Dashboard,
            "/students" => Route::Students,
            "/profile" => Route::Profile,
            "/register-user" => Route::RegisterUser,
            "/admin" => Route::Admin,
            other => {
                let id = other.strip_prefix("/student/")?;
                Route::Student(id.parse().ok()?)
            }
        };
        Some(route)
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Students => "/students".to_string(),
            Route::Student(id) => format!("/student/{}", id),
            Route::Profile => "/profile".to_string(),
            Route::RegisterUser => "/register-user".to_string(),
            Route::Admin => "/admin".to_string(),
        }
    }

    /// Roles allowed on this route; `None` means any signed-in user.
    pub fn required_roles(&self) -> Option<&'static [Role]> {
        match self {
            Route::Students | Route::RegisterUser => Some(&[Role::Coach, Role::Admin]),
            Route::Admin => Some(&[Role::Admin]),
            _ => None,
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Route::Login)
    }

    pub fn access(&self, user: Option<&User>) -> Access {
        if self.is_public() {
            return Access::Allowed;
        }
        let Some(user) = user else {
            return Access::RedirectToLogin;
        };
        match self.required_roles() {
            Some(roles) if !roles.contains(&user.role) => Access::Forbidden,
            _ => Access::Allowed,
        }
    }

    /// Where a user lands after logging in.
    pub fn home_for(user: &User) -> Route {
        match user.role {
            Role::Student => Route::Student(user.id),
            Role::Coach | Role::Admin => Route::Dashboard,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User {
            id: 3,
            username: "u".to_string(),
            display_name: "U".to_string(),
            role,
            last_update: None,
            archived: false,
        }
    }

    #[test]
    fn test_parse_and_path() {
        assert_eq!(Route::parse("/student/42"), Some(Route::Student(42)));
        assert_eq!(Route::parse("/students/"), Some(Route::Students));
        assert_eq!(Route::parse("/"), Some(Route::Dashboard));
        assert_eq!(Route::parse("/student/abc"), None);
        assert_eq!(Route::parse("/nowhere"), None);
        for route in Route::STATIC {
            assert_eq!(Route::parse(&route.path()), Some(route));
        }
    }

    #[test]
    fn test_anonymous_goes_to_login() {
        assert_eq!(Route::Dashboard.access(None), Access::RedirectToLogin);
        assert_eq!(Route::Login.access(None), Access::Allowed);
    }

    #[test]
    fn test_role_gating() {
        let student = user(Role::Student);
        let coach = user(Role::Coach);
        let admin = user(Role::Admin);

        assert_eq!(Route::Students.access(Some(&student)), Access::Forbidden);
        assert_eq!(Route::Students.access(Some(&coach)), Access::Allowed);
        assert_eq!(Route::RegisterUser.access(Some(&admin)), Access::Allowed);
        assert_eq!(Route::Admin.access(Some(&coach)), Access::Forbidden);
        assert_eq!(Route::Admin.access(Some(&admin)), Access::Allowed);
        assert_eq!(Route::Student(9).access(Some(&student)), Access::Allowed);
        assert_eq!(Route::Profile.access(Some(&student)), Access::Allowed);
    }

    #[test]
    fn test_home_route() {
        assert_eq!(Route::home_for(&user(Role::Student)), Route::Student(3));
        assert_eq!(Route::home_for(&user(Role::Coach)), Route::Dashboard);
    }
}
