//! Role-based access policies.
//!
//! Each resource declares one [`Policy`]. Handlers call [`Policy::check`] before
//! touching the repository and [`Policy::check_object`] once the target object is
//! loaded. Denying an anonymous caller yields 401, denying a known caller 403.

use axum::http::Method;

use crate::{auth::AuthUser, error::AppError};

/// GET, HEAD and OPTIONS never mutate anything.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Staff users or the admin role, for every method.
    AdminOrSuperUser,
    /// Anyone may read; only admins may write.
    AdminOrReadOnly,
    /// Anyone may read, any authenticated user may create; changing an existing
    /// object is limited to admins, moderators and its author.
    AdminModeratorAuthorOrReadOnly,
}

impl Policy {
    pub fn has_permission(&self, method: &Method, user: Option<&AuthUser>) -> bool {
        match self {
            Policy::AdminOrSuperUser => user.is_some_and(|u| u.is_staff || u.is_admin()),
            Policy::AdminOrReadOnly => {
                is_safe_method(method) || user.is_some_and(AuthUser::is_admin)
            }
            Policy::AdminModeratorAuthorOrReadOnly => is_safe_method(method) || user.is_some(),
        }
    }

    pub fn has_object_permission(
        &self,
        method: &Method,
        user: Option<&AuthUser>,
        author_id: i64,
    ) -> bool {
        match self {
            Policy::AdminModeratorAuthorOrReadOnly => {
                is_safe_method(method)
                    || user.is_some_and(|u| u.is_admin() || u.is_moderator() || u.id == author_id)
            }
            _ => true,
        }
    }

    pub fn check(&self, method: &Method, user: Option<&AuthUser>) -> Result<(), AppError> {
        if self.has_permission(method, user) {
            Ok(())
        } else {
            Err(deny(user))
        }
    }

    pub fn check_object(
        &self,
        method: &Method,
        user: Option<&AuthUser>,
        author_id: i64,
    ) -> Result<(), AppError> {
        if self.has_object_permission(method, user, author_id) {
            Ok(())
        } else {
            Err(deny(user))
        }
    }
}

fn deny(user: Option<&AuthUser>) -> AppError {
    match user {
        None => AppError::Unauthorized("Authentication credentials were not provided.".into()),
        Some(_) => {
            AppError::Forbidden("You do not have permission to perform this action.".into())
        }
    }
}
