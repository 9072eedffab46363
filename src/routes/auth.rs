use crate::{AppState, handlers::auth};
use axum::{Router, routing::post};

/// Auth Router Module
///
/// Both endpoints are open to anonymous callers; they are how a caller stops being one.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/signup
        // Registers the username/email pair and mails a confirmation code.
        .route("/auth/signup", post(auth::signup))
        // POST /auth/token
        // Trades username + confirmation code for a bearer token. The code is burned.
        .route("/auth/token", post(auth::obtain_token))
}
