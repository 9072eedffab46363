use axum::{Json, Router, extract::FromRef, http::HeaderName, routing::get};
use serde_json::{Value, json};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core services.
pub mod auth;
pub mod config;
pub mod confirmation;
pub mod error;
pub mod extract;
pub mod mailer;
pub mod models;
pub mod permissions;
pub mod repository;

// HTTP surface.
pub mod handlers;
pub mod routes;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use mailer::{MailerState, MockMailer, SmtpMailer};
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::signup, handlers::auth::obtain_token,
        handlers::catalog::list_categories, handlers::catalog::create_category,
        handlers::catalog::delete_category, handlers::catalog::list_genres,
        handlers::catalog::create_genre, handlers::catalog::delete_genre,
        handlers::titles::list_titles, handlers::titles::get_title,
        handlers::titles::create_title, handlers::titles::update_title,
        handlers::titles::delete_title,
        handlers::reviews::list_reviews, handlers::reviews::create_review,
        handlers::reviews::get_review, handlers::reviews::update_review,
        handlers::reviews::delete_review,
        handlers::comments::list_comments, handlers::comments::create_comment,
        handlers::comments::get_comment, handlers::comments::update_comment,
        handlers::comments::delete_comment,
        handlers::users::list_users, handlers::users::create_user,
        handlers::users::get_user, handlers::users::update_user,
        handlers::users::delete_user, handlers::users::get_me, handlers::users::update_me,
    ),
    components(
        schemas(
            models::Role, models::UserProfile, models::CatalogEntry, models::Title,
            models::TitleRecord, models::Review, models::Comment,
            models::SignupRequest, models::TokenRequest, models::ConfirmationCode, models::TokenResponse,
            models::CreateUserRequest, models::UpdateUserRequest,
            models::CreateTitleRequest, models::UpdateTitleRequest,
            models::CreateReviewRequest, models::UpdateReviewRequest,
            models::CreateCommentRequest, models::UpdateCommentRequest,
        )
    ),
    tags(
        (name = "yamdb", description = "YaMDb content-rating API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single immutable container shared by every request. Handlers take it whole;
/// the extractors in [`auth`] pull only the pieces they need through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence, behind a trait object so tests can swap in an in-memory store.
    pub repo: RepositoryState,
    /// Outbound email for confirmation codes.
    pub mailer: MailerState,
    pub config: AppConfig,
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for MailerState {
    fn from_ref(app_state: &AppState) -> MailerState {
        app_state.mailer.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// create_router
///
/// Assembles the versioned API under `/v1`, the health probe and the Swagger UI,
/// then wraps everything in the request-id, tracing and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(health))
        .nest("/v1", routes::api_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                // Every request gets a UUID before the trace span is opened.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span with method, URI and the `x-request-id`, so every log
/// line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
