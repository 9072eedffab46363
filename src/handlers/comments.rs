use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode},
};

use crate::{
    AppState,
    auth::MaybeAuthUser,
    error::{AppError, AppResult},
    extract::{AppPath, ValidJson},
    models::{Comment, CreateCommentRequest, UpdateCommentRequest},
};

use super::reviews::{POLICY, require, review_or_404};

async fn comment_or_404(state: &AppState, review_id: i64, comment_id: i64) -> AppResult<Comment> {
    state
        .repo
        .get_comment(review_id, comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Comment {comment_id} not found.")))
}

#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    responses(
        (status = 200, description = "Comments on the review", body = [Comment]),
        (status = 404, description = "Review not found")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath((title_id, review_id)): AppPath<(i64, i64)>,
) -> AppResult<Json<Vec<Comment>>> {
    POLICY.check(&method, user.as_ref())?;
    let review = review_or_404(&state, title_id, review_id).await?;
    Ok(Json(state.repo.list_comments(review.id).await?))
}

/// create_comment
///
/// [Authenticated Route] Comments on a review. The review must belong to the title
/// named in the path.
#[utoipa::path(
    post,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Created", body = Comment),
        (status = 401, description = "Anonymous caller"),
        (status = 404, description = "Review not found")
    )
)]
pub async fn create_comment(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath((title_id, review_id)): AppPath<(i64, i64)>,
    payload: Result<ValidJson<CreateCommentRequest>, AppError>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    POLICY.check(&method, user.as_ref())?;
    let author = require(user)?;
    let review = review_or_404(&state, title_id, review_id).await?;
    let ValidJson(req) = payload?;

    let comment = state
        .repo
        .create_comment(review.id, author.id, req.text)
        .await?;
    tracing::info!(comment_id = comment.id, review_id, author_id = author.id, "Comment created");
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    responses(
        (status = 200, description = "Found", body = Comment),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_comment(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath((title_id, review_id, comment_id)): AppPath<(i64, i64, i64)>,
) -> AppResult<Json<Comment>> {
    POLICY.check(&method, user.as_ref())?;
    let review = review_or_404(&state, title_id, review_id).await?;
    Ok(Json(comment_or_404(&state, review.id, comment_id).await?))
}

#[utoipa::path(
    patch,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    request_body = UpdateCommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath((title_id, review_id, comment_id)): AppPath<(i64, i64, i64)>,
    payload: Result<ValidJson<UpdateCommentRequest>, AppError>,
) -> AppResult<Json<Comment>> {
    POLICY.check(&method, user.as_ref())?;
    let review = review_or_404(&state, title_id, review_id).await?;
    let comment = comment_or_404(&state, review.id, comment_id).await?;
    POLICY.check_object(&method, user.as_ref(), comment.author_id)?;
    let ValidJson(req) = payload?;

    state
        .repo
        .update_comment(comment.id, req.text)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Comment {comment_id} not found.")))
}

#[utoipa::path(
    delete,
    path = "/v1/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath((title_id, review_id, comment_id)): AppPath<(i64, i64, i64)>,
) -> AppResult<StatusCode> {
    POLICY.check(&method, user.as_ref())?;
    let review = review_or_404(&state, title_id, review_id).await?;
    let comment = comment_or_404(&state, review.id, comment_id).await?;
    POLICY.check_object(&method, user.as_ref(), comment.author_id)?;

    state.repo.delete_comment(comment.id).await?;
    tracing::info!(comment_id, review_id, "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
