use crate::{AppState, handlers::catalog};
use axum::{
    Router,
    routing::{delete, get},
};

/// Catalog Router Module
///
/// Reads are public, writes are admin-only. Entries are addressed by slug.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route("/categories/{slug}", delete(catalog::delete_category))
        .route(
            "/genres",
            get(catalog::list_genres).post(catalog::create_genre),
        )
        .route("/genres/{slug}", delete(catalog::delete_genre))
}
