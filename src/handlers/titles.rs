use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode},
};
use chrono::{Datelike, Utc};

use crate::{
    AppState,
    auth::MaybeAuthUser,
    error::{AppError, AppResult, FieldErrors},
    extract::{AppPath, AppQuery, ValidJson},
    models::{CatalogKind, CreateTitleRequest, Title, TitleFilter, TitleRecord, UpdateTitleRequest},
    permissions::Policy,
    repository::{NewTitle, TitleChanges},
};

const POLICY: Policy = Policy::AdminOrReadOnly;

fn missing_slug(slug: &str) -> String {
    format!("Object with slug={slug} does not exist.")
}

fn check_year(year: i32, errors: &mut FieldErrors) {
    let current = Utc::now().year();
    if year > current {
        errors
            .entry("year".into())
            .or_default()
            .push(format!("Year cannot be later than {current}."));
    }
}

/// Resolves a category slug to its id, recording a field error when it is unknown.
async fn resolve_category(
    state: &AppState,
    slug: &str,
    errors: &mut FieldErrors,
) -> AppResult<Option<i64>> {
    let found = state
        .repo
        .resolve_slugs(CatalogKind::Category, &[slug.to_string()])
        .await?;
    let id = found.get(slug).copied();
    if id.is_none() {
        errors
            .entry("category".into())
            .or_default()
            .push(missing_slug(slug));
    }
    Ok(id)
}

/// Resolves genre slugs in request order. Every unknown slug gets its own message.
async fn resolve_genres(
    state: &AppState,
    slugs: &[String],
    errors: &mut FieldErrors,
) -> AppResult<Vec<i64>> {
    let found = state.repo.resolve_slugs(CatalogKind::Genre, slugs).await?;
    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        match found.get(slug) {
            Some(id) => ids.push(*id),
            None => errors.entry("genre".into()).or_default().push(missing_slug(slug)),
        }
    }
    Ok(ids)
}

fn finish(errors: FieldErrors) -> AppResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

fn title_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Title {id} not found."))
}

/// list_titles
///
/// [Public Route] Lists titles with their average rating. Filters combine: `genre`
/// and `category` match a slug exactly, `name` matches a substring case-insensitively,
/// `year` matches exactly.
#[utoipa::path(
    get,
    path = "/v1/titles",
    params(TitleFilter),
    responses((status = 200, description = "Titles", body = [Title]))
)]
pub async fn list_titles(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppQuery(filter): AppQuery<TitleFilter>,
) -> AppResult<Json<Vec<Title>>> {
    POLICY.check(&method, user.as_ref())?;
    Ok(Json(state.repo.list_titles(filter).await?))
}

#[utoipa::path(
    get,
    path = "/v1/titles/{title_id}",
    params(("title_id" = i64, Path, description = "Title id")),
    responses(
        (status = 200, description = "Found", body = Title),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_title(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(title_id): AppPath<i64>,
) -> AppResult<Json<Title>> {
    POLICY.check(&method, user.as_ref())?;
    state
        .repo
        .get_title(title_id)
        .await?
        .map(Json)
        .ok_or_else(|| title_not_found(title_id))
}

/// create_title
///
/// [Admin Route] Adds a title. `category` and `genre` are slugs of existing entries;
/// the response echoes them back as slugs rather than nested objects.
#[utoipa::path(
    post,
    path = "/v1/titles",
    request_body = CreateTitleRequest,
    responses(
        (status = 201, description = "Created", body = TitleRecord),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_title(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    payload: Result<ValidJson<CreateTitleRequest>, AppError>,
) -> AppResult<(StatusCode, Json<TitleRecord>)> {
    POLICY.check(&method, user.as_ref())?;
    let ValidJson(req) = payload?;

    let mut errors = FieldErrors::new();
    check_year(req.year, &mut errors);
    let category_id = resolve_category(&state, &req.category, &mut errors).await?;
    let genre_ids = resolve_genres(&state, &req.genre, &mut errors).await?;
    finish(errors)?;

    let created = state
        .repo
        .create_title(NewTitle {
            name: req.name,
            year: req.year,
            description: req.description,
            category_id,
            genre_ids,
        })
        .await?;

    tracing::info!(title_id = created.id, "Title created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_title
///
/// [Admin Route] Partially updates a title. A `genre` list replaces the current set.
#[utoipa::path(
    patch,
    path = "/v1/titles/{title_id}",
    params(("title_id" = i64, Path, description = "Title id")),
    request_body = UpdateTitleRequest,
    responses(
        (status = 200, description = "Updated", body = TitleRecord),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_title(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(title_id): AppPath<i64>,
    payload: Result<ValidJson<UpdateTitleRequest>, AppError>,
) -> AppResult<Json<TitleRecord>> {
    POLICY.check(&method, user.as_ref())?;
    if state.repo.get_title(title_id).await?.is_none() {
        return Err(title_not_found(title_id));
    }
    let ValidJson(req) = payload?;

    let mut errors = FieldErrors::new();
    if let Some(year) = req.year {
        check_year(year, &mut errors);
    }
    let category_id = match &req.category {
        Some(slug) => resolve_category(&state, slug, &mut errors).await?,
        None => None,
    };
    let genre_ids = match &req.genre {
        Some(slugs) => Some(resolve_genres(&state, slugs, &mut errors).await?),
        None => None,
    };
    finish(errors)?;

    let changes = TitleChanges {
        name: req.name,
        year: req.year,
        description: req.description,
        category_id,
        genre_ids,
    };

    state
        .repo
        .update_title(title_id, changes)
        .await?
        .map(Json)
        .ok_or_else(|| title_not_found(title_id))
}

#[utoipa::path(
    delete,
    path = "/v1/titles/{title_id}",
    params(("title_id" = i64, Path, description = "Title id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_title(
    State(state): State<AppState>,
    method: Method,
    MaybeAuthUser(user): MaybeAuthUser,
    AppPath(title_id): AppPath<i64>,
) -> AppResult<StatusCode> {
    POLICY.check(&method, user.as_ref())?;
    if state.repo.delete_title(title_id).await? {
        tracing::info!(title_id, "Title deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(title_not_found(title_id))
    }
}
