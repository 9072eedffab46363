use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

// --- Roles ---

/// Role
///
/// The RBAC attribute of a user. Stored as lowercase text in `users.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            _ => Err(UnknownRole(value)),
        }
    }
}

// --- Core Schemas (Mapped to Database) ---

/// User
///
/// The canonical user record from the `users` table. The confirmation code never
/// leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    // Superuser flag; grants the same user-management rights as the admin role.
    pub is_staff: bool,
    #[serde(skip)]
    #[ts(skip)]
    pub confirmation_code: Option<i32>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }
}

/// UserProfile
///
/// The public representation of a user returned by `/users` and `/users/me`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role,
        }
    }
}

/// CatalogEntry
///
/// A named, slug-addressed classifier. Categories and genres share this shape.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq, Validate)]
#[ts(export)]
pub struct CatalogEntry {
    #[validate(length(min = 1, max = 256, message = "Name must be 1-256 characters."))]
    pub name: String,
    #[validate(
        length(min = 1, max = 50, message = "Slug must be 1-50 characters."),
        custom(function = "validate_slug")
    )]
    pub slug: String,
}

pub type Category = CatalogEntry;
pub type Genre = CatalogEntry;

/// CatalogKind
///
/// Selects which classifier table a catalog operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Category,
    Genre,
}

impl CatalogKind {
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::Category => "categories",
            CatalogKind::Genre => "genres",
        }
    }

    /// Singular name, used in messages and as the request field name.
    pub fn label(&self) -> &'static str {
        match self {
            CatalogKind::Category => "category",
            CatalogKind::Genre => "genre",
        }
    }
}

/// TitleFilter
///
/// Query parameters accepted by `GET /titles`. Every filter is optional and they combine with AND.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TitleFilter {
    /// Genre slug.
    pub genre: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    /// Case-insensitive substring of the title name.
    pub name: Option<String>,
    pub year: Option<i32>,
}

/// SearchQuery
///
/// `?search=` for the name-searchable lists (categories, genres, users).
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    pub search: Option<String>,
}

/// Title
///
/// The read representation of a title: category and genres are nested, and `rating`
/// is the mean review score (null when nobody has reviewed it yet).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct Title {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub category: Option<Category>,
    pub genre: Vec<Genre>,
}

/// TitleRecord
///
/// The write-side representation returned after creating or updating a title.
/// Relations are rendered as slugs, mirroring the request payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct TitleRecord {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category: Option<String>,
    pub genre: Vec<String>,
}

/// Review
///
/// A user's scored review of a title. `title` and `author` are rendered by name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Review {
    pub id: i64,
    pub title: String,
    pub author: String,
    pub text: String,
    pub score: i32,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    #[serde(skip)]
    #[ts(skip)]
    pub author_id: i64,
}

/// Comment
///
/// A comment attached to a review. `review` is rendered as the review's text.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    pub review: String,
    pub author: String,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    #[serde(skip)]
    #[ts(skip)]
    pub author_id: i64,
}

// --- Request Payloads (Input Schemas) ---

/// SignupRequest
///
/// Input payload for `POST /auth/signup`. Echoed back on success.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, PartialEq)]
#[ts(export)]
pub struct SignupRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Email must be at most 254 characters.")
    )]
    pub email: String,
}

/// TokenRequest
///
/// Input payload for `POST /auth/token`: the confirmation code mailed at signup.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct TokenRequest {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters."))]
    pub username: String,
    #[validate(custom(function = "validate_confirmation_code"))]
    pub confirmation_code: ConfirmationCode,
}

/// ConfirmationCode
///
/// The code as submitted: a JSON number, or the digits copied from the email as a
/// string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(untagged)]
#[ts(export)]
pub enum ConfirmationCode {
    Number(i32),
    Text(String),
}

impl ConfirmationCode {
    /// The integer value, or `None` for a string that is not a number.
    pub fn value(&self) -> Option<i32> {
        match self {
            ConfirmationCode::Number(code) => Some(*code),
            ConfirmationCode::Text(text) => text.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// CreateUserRequest
///
/// Input payload for the administrative `POST /users` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateUserRequest {
    #[validate(custom(function = "validate_username"))]
    pub username: String,
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Email must be at most 254 characters.")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "First name must be at most 150 characters."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Last name must be at most 150 characters."))]
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub role: Role,
}

/// UpdateUserRequest
///
/// Partial update of a user profile. Omitted fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_username"))]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 254, message = "Email must be at most 254 characters.")
    )]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 150, message = "First name must be at most 150 characters."))]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 150, message = "Last name must be at most 150 characters."))]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// CreateTitleRequest
///
/// Input payload for `POST /titles`. Relations are referenced by slug.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateTitleRequest {
    #[validate(length(min = 1, max = 256, message = "Name must be 1-256 characters."))]
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category: String,
    pub genre: Vec<String>,
}

/// UpdateTitleRequest
///
/// Partial update of a title. `genre`, when present, replaces the whole genre set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateTitleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 256, message = "Name must be 1-256 characters."))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Absent keeps the description, `null` clears it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[schema(value_type = Option<String>, nullable)]
    #[ts(as = "Option<Option<String>>", optional)]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateReviewRequest {
    #[validate(length(min = 1, message = "Text must not be empty."))]
    pub text: String,
    #[validate(range(min = 1, max = 10, message = "Score must be between 1 and 10."))]
    pub score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateReviewRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Text must not be empty."))]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 10, message = "Score must be between 1 and 10."))]
    pub score: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    #[validate(length(min = 1, message = "Text must not be empty."))]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate, Default)]
#[ts(export)]
pub struct UpdateCommentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "Text must not be empty."))]
    pub text: Option<String>,
}

// --- Field Validators ---

/// The path segment `/users/me` is reserved, so no account may be called `me`.
pub const RESERVED_USERNAME: &str = "me";

/// Letters, digits and `.@+-_`, at most 150 characters.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let fail = |code: &'static str, message: &'static str| {
        let mut err = ValidationError::new(code);
        err.message = Some(message.into());
        Err(err)
    };

    if username.is_empty() || username.chars().count() > 150 {
        return fail("length", "Username must be 1-150 characters.");
    }
    if username == RESERVED_USERNAME {
        return fail("reserved", "Username \"me\" is not allowed.");
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '@' | '+' | '-' | '_'))
    {
        return fail(
            "invalid",
            "Username may contain only letters, digits and @/./+/-/_ characters.",
        );
    }
    Ok(())
}

pub fn validate_confirmation_code(code: &ConfirmationCode) -> Result<(), ValidationError> {
    match code.value() {
        Some(_) => Ok(()),
        None => {
            let mut err = ValidationError::new("integer");
            err.message = Some("A valid integer is required.".into());
            Err(err)
        }
    }
}

pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("slug");
        err.message = Some("Slug may contain only latin letters, digits, '-' and '_'.".into());
        Err(err)
    }
}
