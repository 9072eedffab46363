use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode},
};

use crate::{
    AppState,
    auth::MaybeAuthUser,
    error::{AppError, AppResult},
    extract::{AppPath, AppQuery, ValidJson},
    models::{CatalogEntry, CatalogKind, SearchQuery},
    permissions::Policy,
};

const POLICY: Policy = Policy::AdminOrReadOnly;

// Categories and genres behave identically; the public handlers below only pick the kind.

async fn list(
    state: AppState,
    kind: CatalogKind,
    method: Method,
    user: MaybeAuthUser,
    search: Option<String>,
) -> AppResult<Json<Vec<CatalogEntry>>> {
    POLICY.check(&method, user.0.as_ref())?;
    Ok(Json(state.repo.list_catalog(kind, search).await?))
}

async fn create(
    state: AppState,
    kind: CatalogKind,
    method: Method,
    user: MaybeAuthUser,
    payload: Result<ValidJson<CatalogEntry>, AppError>,
) -> AppResult<(StatusCode, Json<CatalogEntry>)> {
    POLICY.check(&method, user.0.as_ref())?;
    let ValidJson(entry) = payload?;

    if state.repo.catalog_slug_taken(kind, &entry.slug).await? {
        return Err(AppError::field(
            "slug",
            format!("{} with this slug already exists.", kind.label()),
        ));
    }

    let created = state.repo.create_catalog_entry(kind, entry).await?;
    tracing::info!(kind = kind.label(), slug = %created.slug, "Catalog entry created");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete(
    state: AppState,
    kind: CatalogKind,
    method: Method,
    user: MaybeAuthUser,
    slug: String,
) -> AppResult<StatusCode> {
    POLICY.check(&method, user.0.as_ref())?;
    if state.repo.delete_catalog_entry(kind, &slug).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!(
            "No {} matches slug '{slug}'.",
            kind.label()
        )))
    }
}

/// list_categories
///
/// [Public Route] Lists categories, optionally filtered by `?search=` on the name.
#[utoipa::path(
    get,
    path = "/v1/categories",
    params(SearchQuery),
    responses((status = 200, description = "Categories", body = [CatalogEntry]))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    method: Method,
    user: MaybeAuthUser,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<Vec<CatalogEntry>>> {
    list(state, CatalogKind::Category, method, user, query.search).await
}

/// create_category
///
/// [Admin Route] Adds a category. Slugs are unique.
#[utoipa::path(
    post,
    path = "/v1/categories",
    request_body = CatalogEntry,
    responses(
        (status = 201, description = "Created", body = CatalogEntry),
        (status = 400, description = "Invalid or duplicate slug"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    method: Method,
    user: MaybeAuthUser,
    payload: Result<ValidJson<CatalogEntry>, AppError>,
) -> AppResult<(StatusCode, Json<CatalogEntry>)> {
    create(state, CatalogKind::Category, method, user, payload).await
}

/// delete_category
///
/// [Admin Route] Removes a category. Titles that referenced it keep existing
/// without a category.
#[utoipa::path(
    delete,
    path = "/v1/categories/{slug}",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_category(
    State(state): State<AppState>,
    method: Method,
    user: MaybeAuthUser,
    AppPath(slug): AppPath<String>,
) -> AppResult<StatusCode> {
    delete(state, CatalogKind::Category, method, user, slug).await
}

#[utoipa::path(
    get,
    path = "/v1/genres",
    params(SearchQuery),
    responses((status = 200, description = "Genres", body = [CatalogEntry]))
)]
pub async fn list_genres(
    State(state): State<AppState>,
    method: Method,
    user: MaybeAuthUser,
    AppQuery(query): AppQuery<SearchQuery>,
) -> AppResult<Json<Vec<CatalogEntry>>> {
    list(state, CatalogKind::Genre, method, user, query.search).await
}

#[utoipa::path(
    post,
    path = "/v1/genres",
    request_body = CatalogEntry,
    responses(
        (status = 201, description = "Created", body = CatalogEntry),
        (status = 400, description = "Invalid or duplicate slug"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_genre(
    State(state): State<AppState>,
    method: Method,
    user: MaybeAuthUser,
    payload: Result<ValidJson<CatalogEntry>, AppError>,
) -> AppResult<(StatusCode, Json<CatalogEntry>)> {
    create(state, CatalogKind::Genre, method, user, payload).await
}

#[utoipa::path(
    delete,
    path = "/v1/genres/{slug}",
    params(("slug" = String, Path, description = "Genre slug")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_genre(
    State(state): State<AppState>,
    method: Method,
    user: MaybeAuthUser,
    AppPath(slug): AppPath<String>,
) -> AppResult<StatusCode> {
    delete(state, CatalogKind::Genre, method, user, slug).await
}
