use crate::{
    AppState,
    handlers::{comments, reviews, titles},
};
use axum::{Router, routing::get};

/// Titles Router Module
///
/// Path parameters keep the same name at the same depth (`title_id`, then
/// `review_id`, then `comment_id`) so the nested resources share one route tree.
pub fn title_routes() -> Router<AppState> {
    Router::new()
        // GET /titles?genre=&category=&name=&year=
        // POST /titles (admin)
        .route("/titles", get(titles::list_titles).post(titles::create_title))
        .route(
            "/titles/{title_id}",
            get(titles::get_title)
                .patch(titles::update_title)
                .delete(titles::delete_title),
        )
        // --- Reviews ---
        // Any authenticated user may post one review per title. Edits are limited to
        // the author, moderators and admins.
        .route(
            "/titles/{title_id}/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
        // --- Comments ---
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
            get(comments::get_comment)
                .patch(comments::update_comment)
                .delete(comments::delete_comment),
        )
}
