use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::AppError,
    models::{Role, User},
    repository::RepositoryState,
};

pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims
///
/// The payload of an access token issued by `POST /auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id, as a decimal string.
    pub sub: String,
    /// Expiration Time (exp).
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
    /// Unique token id, for audit.
    pub jti: String,
    pub token_type: String,
}

/// issue_access_token
///
/// Signs an HS256 access token bound to `user_id`, valid for `ttl_secs`.
pub fn issue_access_token(
    user_id: i64,
    secret: &str,
    ttl_secs: u64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now as usize,
        exp: (now + ttl_secs) as usize,
        jti: Uuid::new_v4().simple().to_string(),
        token_type: ACCESS_TOKEN_TYPE.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Handlers use it for every
/// policy decision, so it carries exactly what the policies look at.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub is_staff: bool,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }
}

impl From<User> for AuthUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            is_staff: user.is_staff,
        }
    }
}

/// MaybeAuthUser
///
/// Optional authentication for endpoints that anonymous callers may read.
/// No `Authorization` header yields `None`; a header carrying a bad token is still
/// rejected with 401.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        MaybeAuthUser::from_request_parts(parts, state)
            .await?
            .0
            .ok_or_else(|| {
                AppError::Unauthorized("Authentication credentials were not provided.".into())
            })
    }
}

impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(MaybeAuthUser(None));
        };

        let invalid = || AppError::Unauthorized("Given token not valid.".into());

        let token = auth_header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(invalid)?;

        let config = AppConfig::from_ref(state);
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                other => tracing::debug!(?other, "rejected malformed token"),
            }
            invalid()
        })?;

        if token_data.claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(invalid());
        }
        let user_id: i64 = token_data.claims.sub.parse().map_err(|_| invalid())?;

        // The user may have been deleted after the token was issued.
        let repo = RepositoryState::from_ref(state);
        let user = repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found.".into()))?;

        Ok(MaybeAuthUser(Some(user.into())))
    }
}
