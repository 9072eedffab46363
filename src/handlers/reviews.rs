use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode},
};

use crate::{
    AppState,
    auth::{AuthUser, MaybeAuthUser},
    error::{AppError, AppResult},
    extract::{AppPath, ValidJson},
    models::{CreateReviewRequest, Review, UpdateReviewRequest},
    permissions::Policy,
};

pub(crate) const POLICY: Policy = Policy::AdminModeratorAuthorOrReadOnly;

pub(crate) async fn ensure_title(state: &AppState, title_id: i64) -> AppResult<()> {
    match state.repo.get_title(title_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("Title {title_id} not found."))),
    }
}

/// Loads a review, insisting that it belongs to the title in the path.
pub(crate) async fn review_or_404(
    state: &AppState,
    title_id: i64,
    review_id: i64,
) -> AppResult<Review> {
    state
        .repo
        .get_review(title_id, review_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Review {review_id} not found.")))
}

#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/reviews",
    params(("title_id" = i64, Path, description = "Title id")),
    responses(
        (status = 200, description = "Reviews of the title", body = [Review]),
        (status = 404, description = "Title not found")
    )
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(title_id): AppPath<i64>,
) -> AppResult<Json<Vec<Review>>> {
    POLICY.check(&method, user.as_ref())?;
    ensure_title(&state, title_id).await?;
    Ok(Json(state.repo.list_reviews(title_id).await?))
}

/// create_review
///
/// [Authenticated Route] Posts the caller's review of a title. A user reviews each
/// title at most once; a second attempt is a 400.
#[utoipa::path(
    post,
    path = "/v1/titles/{title_id}/reviews",
    params(("title_id" = i64, Path, description = "Title id")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Created", body = Review),
        (status = 400, description = "Invalid, or already reviewed"),
        (status = 401, description = "Anonymous caller"),
        (status = 404, description = "Title not found")
    )
)]
pub async fn create_review(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(title_id): AppPath<i64>,
    payload: Result<ValidJson<CreateReviewRequest>, AppError>,
) -> AppResult<(StatusCode, Json<Review>)> {
    POLICY.check(&method, user.as_ref())?;
    let author = require(user)?;
    ensure_title(&state, title_id).await?;
    let ValidJson(req) = payload?;

    if state.repo.has_review(title_id, author.id).await? {
        return Err(AppError::non_field(
            "You have already reviewed this title.",
        ));
    }

    let review = state.repo.create_review(title_id, author.id, req).await?;
    tracing::info!(review_id = review.id, title_id, author_id = author.id, "Review created");
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}/reviews/{review_id}",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    responses(
        (status = 200, description = "Found", body = Review),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_review(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath((title_id, review_id)): AppPath<(i64, i64)>,
) -> AppResult<Json<Review>> {
    POLICY.check(&method, user.as_ref())?;
    Ok(Json(review_or_404(&state, title_id, review_id).await?))
}

/// update_review
///
/// [Author/Moderator/Admin Route] Partially updates a review's text or score.
#[utoipa::path(
    patch,
    path = "/v1/titles/{title_id}/reviews/{review_id}",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Updated", body = Review),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_review(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath((title_id, review_id)): AppPath<(i64, i64)>,
    payload: Result<ValidJson<UpdateReviewRequest>, AppError>,
) -> AppResult<Json<Review>> {
    POLICY.check(&method, user.as_ref())?;
    let review = review_or_404(&state, title_id, review_id).await?;
    POLICY.check_object(&method, user.as_ref(), review.author_id)?;
    let ValidJson(req) = payload?;

    state
        .repo
        .update_review(review.id, req)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Review {review_id} not found.")))
}

#[utoipa::path(
    delete,
    path = "/v1/titles/{title_id}/reviews/{review_id}",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_review(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath((title_id, review_id)): AppPath<(i64, i64)>,
) -> AppResult<StatusCode> {
    POLICY.check(&method, user.as_ref())?;
    let review = review_or_404(&state, title_id, review_id).await?;
    POLICY.check_object(&method, user.as_ref(), review.author_id)?;

    state.repo.delete_review(review.id).await?;
    tracing::info!(review_id, title_id, "Review deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// The author of a new review or comment.
pub(crate) fn require(user: Option<AuthUser>) -> AppResult<AuthUser> {
    user.ok_or_else(|| {
        AppError::Unauthorized("Authentication credentials were not provided.".into())
    })
}
