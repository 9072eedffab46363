//! Router Module Index
//!
//! One router per resource family. Access control lives in each handler's
//! [`Policy`](crate::permissions::Policy), not in route layers: a single path
//! serves public reads and restricted writes alike.

/// Signup and token exchange.
pub mod auth;

/// Categories and genres.
pub mod catalog;

/// Titles and the reviews and comments nested under them.
pub mod titles;

/// User administration and the caller's own profile.
pub mod users;

use axum::Router;

use crate::AppState;

/// Every versioned route, ready to be nested under `/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::auth_routes())
        .merge(catalog::catalog_routes())
        .merge(titles::title_routes())
        .merge(users::user_routes())
}
