use crate::{AppState, handlers::users};
use axum::{Router, routing::get};

/// Users Router Module
///
/// `/users/me` is a static segment, so it wins over `/users/{username}`; the
/// username `me` is reserved at validation time to keep that unambiguous.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // GET|PATCH /users/me
        // Any authenticated user, acting on their own profile.
        .route("/users/me", get(users::get_me).patch(users::update_me))
        // Everything below is admin-or-superuser only.
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{username}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
}
