use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::issue_access_token,
    confirmation,
    error::{AppError, AppResult},
    extract::ValidJson,
    models::{SignupRequest, TokenRequest, TokenResponse},
    repository::NewUser,
};

use super::users::ensure_unique_identity;

/// signup
///
/// [Public Route] Registers a user and mails them a confirmation code.
///
/// *Ordering*: the mail is sent before the user is stored. If delivery fails the
/// request fails with 500 and nothing is persisted, so the caller can retry with
/// the same username.
///
/// Two concurrent signups for one username both pass the uniqueness check and both
/// mail a code; the losing insert hits the unique index and answers 400, so its
/// code is never stored.
#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Code sent", body = SignupRequest),
        (status = 400, description = "Invalid or already registered")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<SignupRequest>,
) -> AppResult<Json<SignupRequest>> {
    ensure_unique_identity(
        &state,
        Some(&payload.username),
        Some(&payload.email),
        None,
    )
    .await?;

    let code = {
        let mut rng = rand::thread_rng();
        confirmation::generate_code(&mut rng, state.config.reset_confirmation_code)
    };

    state
        .mailer
        .send_confirmation_code(&payload.email, code)
        .await?;

    let user = state
        .repo
        .create_user(NewUser {
            username: payload.username.clone(),
            email: payload.email.clone(),
            confirmation_code: Some(code),
            ..NewUser::default()
        })
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "User signed up");
    Ok(Json(payload))
}

/// obtain_token
///
/// [Public Route] Exchanges a confirmation code for an access token. The code is
/// single-use: on success it is overwritten with the "used" sentinel.
#[utoipa::path(
    post,
    path = "/v1/auth/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 400, description = "Code invalid or already used"),
        (status = 404, description = "Unknown username")
    )
)]
pub async fn obtain_token(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<TokenRequest>,
) -> AppResult<Json<TokenResponse>> {
    let submitted = payload
        .confirmation_code
        .value()
        .ok_or_else(|| AppError::field("confirmation_code", "A valid integer is required."))?;

    let user = state
        .repo
        .get_user_by_username(&payload.username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found.", payload.username)))?;

    let sentinel = state.config.reset_confirmation_code;
    confirmation::verify_code(&user, submitted, sentinel)?;

    state.repo.set_confirmation_code(user.id, sentinel).await?;

    let token = issue_access_token(user.id, &state.config.jwt_secret, state.config.jwt_ttl_secs)?;

    tracing::info!(user_id = user.id, "Access token issued");
    Ok(Json(TokenResponse { token }))
}
