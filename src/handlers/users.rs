use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode},
};

use crate::{
    AppState,
    auth::{AuthUser, MaybeAuthUser},
    error::{AppError, AppResult, FieldErrors},
    extract::{AppPath, AppQuery, ValidJson},
    models::{CreateUserRequest, SearchQuery, UpdateUserRequest, User, UserProfile},
    permissions::Policy,
    repository::NewUser,
};

const POLICY: Policy = Policy::AdminOrSuperUser;

/// ensure_unique_identity
///
/// Rejects a username or email already held by another account. Both fields are
/// checked so the caller sees every clash at once.
pub(crate) async fn ensure_unique_identity(
    state: &AppState,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<i64>,
) -> AppResult<()> {
    let mut errors = FieldErrors::new();

    if let Some(username) = username {
        if state.repo.username_taken(username, except).await? {
            errors.insert(
                "username".into(),
                vec!["A user with that username already exists.".into()],
            );
        }
    }
    if let Some(email) = email {
        if state.repo.email_taken(email, except).await? {
            errors.insert(
                "email".into(),
                vec!["A user with that email already exists.".into()],
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

async fn user_or_404(state: &AppState, username: &str) -> AppResult<User> {
    state
        .repo
        .get_user_by_username(username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{username}' not found.")))
}

/// list_users
///
/// [Admin Route] Lists all users, optionally filtered by `?search=` on the username.
#[utoipa::path(
    get,
    path = "/v1/users",
    params(SearchQuery),
    responses((status = 200, description = "Users", body = [UserProfile]))
)]
pub async fn list_users(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<Vec<UserProfile>>> {
    POLICY.check(&method, user.as_ref())?;
    let users = state.repo.list_users(query.search).await?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

/// create_user
///
/// [Admin Route] Creates a user directly, with any role. No confirmation code is
/// issued here.
#[utoipa::path(
    post,
    path = "/v1/users",
    request_body = CreateUserRequest,
    responses((status = 201, description = "Created", body = UserProfile))
)]
pub async fn create_user(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    payload: Result<ValidJson<CreateUserRequest>, AppError>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    POLICY.check(&method, user.as_ref())?;
    let ValidJson(req) = payload?;

    ensure_unique_identity(&state, Some(&req.username), Some(&req.email), None).await?;

    let created = state
        .repo
        .create_user(NewUser {
            username: req.username,
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            bio: req.bio,
            role: req.role,
            confirmation_code: None,
        })
        .await?;

    tracing::info!(user_id = created.id, role = %created.role, "User created by admin");
    Ok((StatusCode::CREATED, Json(created.into())))
}

#[utoipa::path(
    get,
    path = "/v1/users/{username}",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Found", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(username): AppPath<String>,
) -> AppResult<Json<UserProfile>> {
    POLICY.check(&method, user.as_ref())?;
    Ok(Json(user_or_404(&state, &username).await?.into()))
}

/// update_user
///
/// [Admin Route] Partially updates any user, including their role.
#[utoipa::path(
    patch,
    path = "/v1/users/{username}",
    params(("username" = String, Path, description = "Username")),
    request_body = UpdateUserRequest,
    responses((status = 200, description = "Updated", body = UserProfile))
)]
pub async fn update_user(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(username): AppPath<String>,
    payload: Result<ValidJson<UpdateUserRequest>, AppError>,
) -> AppResult<Json<UserProfile>> {
    POLICY.check(&method, user.as_ref())?;
    let target = user_or_404(&state, &username).await?;
    let ValidJson(changes) = payload?;

    apply_update(&state, target.id, changes).await
}

#[utoipa::path(
    delete,
    path = "/v1/users/{username}",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(username): AppPath<String>,
) -> AppResult<StatusCode> {
    POLICY.check(&method, user.as_ref())?;
    let target = user_or_404(&state, &username).await?;

    if state.repo.delete_user(target.id).await? {
        tracing::info!(user_id = target.id, "User deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("User '{username}' not found.")))
    }
}

/// get_me
///
/// [Authenticated Route] The caller's own profile.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser { id, .. }: AuthUser,
) -> AppResult<Json<UserProfile>> {
    let me = state
        .repo
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))?;
    Ok(Json(me.into()))
}

/// update_me
///
/// [Authenticated Route] Partially updates the caller's own profile. A `role` in the
/// payload is ignored, so nobody can promote themselves.
#[utoipa::path(
    patch,
    path = "/v1/users/me",
    request_body = UpdateUserRequest,
    responses((status = 200, description = "Updated", body = UserProfile))
)]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser { id, .. }: AuthUser,
    ValidJson(changes): ValidJson<UpdateUserRequest>,
) -> AppResult<Json<UserProfile>> {
    let changes = UpdateUserRequest {
        role: None,
        ..changes
    };
    apply_update(&state, id, changes).await
}

async fn apply_update(
    state: &AppState,
    id: i64,
    changes: UpdateUserRequest,
) -> AppResult<Json<UserProfile>> {
    ensure_unique_identity(
        state,
        changes.username.as_deref(),
        changes.email.as_deref(),
        Some(id),
    )
    .await?;

    let updated = state
        .repo
        .update_user(id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))?;
    Ok(Json(updated.into()))
}
