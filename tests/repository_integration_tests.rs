use axum::{http::StatusCode, response::IntoResponse};
use sqlx::PgPool;
use uuid::Uuid;
use yamdb_api::{
    AppError,
    models::{
        CatalogEntry, CatalogKind, CreateReviewRequest, Role, TitleFilter, UpdateReviewRequest,
        User,
    },
    repository::{NewTitle, NewUser, PostgresRepository, Repository, TitleChanges},
};

// --- Test Context and Setup ---

/// Holds the pool plus a per-test tag, so rows from concurrent tests and earlier
/// runs against the same database never collide.
struct DbTestContext {
    pool: PgPool,
    tag: String,
}

impl DbTestContext {
    /// Connects to `DATABASE_URL` and applies the migrations. Returns `None` when no
    /// database is configured, in which case the calling test is skipped.
    async fn setup() -> Option<Self> {
        dotenv::dotenv().ok();

        let Ok(db_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping Postgres repository test");
            return None;
        };

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        let tag = Uuid::new_v4().simple().to_string()[..10].to_string();
        Some(DbTestContext { pool, tag })
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }

    fn name(&self, base: &str) -> String {
        format!("{}{base}", self.tag)
    }
}

// --- Test Data Helpers ---

async fn create_test_user(ctx: &DbTestContext, repo: &PostgresRepository, base: &str) -> User {
    let username = ctx.name(base);
    repo.create_user(NewUser {
        email: format!("{username}@example.com"),
        username,
        role: Role::User,
        ..NewUser::default()
    })
    .await
    .expect("Failed to create test user")
}

async fn create_entry(
    ctx: &DbTestContext,
    repo: &PostgresRepository,
    kind: CatalogKind,
    base: &str,
) -> CatalogEntry {
    repo.create_catalog_entry(
        kind,
        CatalogEntry {
            name: ctx.name(base),
            slug: ctx.name(base),
        },
    )
    .await
    .expect("Failed to create catalog entry")
}

/// A title in a fresh category with one fresh genre. Returns the title id and the
/// category slug.
async fn create_test_title(ctx: &DbTestContext, repo: &PostgresRepository) -> (i64, String) {
    let category = create_entry(ctx, repo, CatalogKind::Category, "-movie").await;
    let genre = create_entry(ctx, repo, CatalogKind::Genre, "-drama").await;
    let ids = repo
        .resolve_slugs(CatalogKind::Genre, &[genre.slug.clone()])
        .await
        .unwrap();
    let category_ids = repo
        .resolve_slugs(CatalogKind::Category, &[category.slug.clone()])
        .await
        .unwrap();

    let record = repo
        .create_title(NewTitle {
            name: ctx.name(" Title"),
            year: 1972,
            description: Some("Crime saga".into()),
            category_id: category_ids.get(&category.slug).copied(),
            genre_ids: ids.values().copied().collect(),
        })
        .await
        .expect("Failed to create test title");

    assert_eq!(record.category.as_deref(), Some(category.slug.as_str()));
    assert_eq!(record.genre, vec![genre.slug]);
    (record.id, category.slug)
}

fn review(score: i32) -> CreateReviewRequest {
    CreateReviewRequest {
        text: "Seen it".into(),
        score,
    }
}

// --- Tests ---

#[tokio::test]
async fn rating_is_null_then_the_mean_of_scores() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let (title_id, _) = create_test_title(&ctx, &repo).await;

    let title = repo.get_title(title_id).await.unwrap().unwrap();
    assert_eq!(title.rating, None);

    let first = create_test_user(&ctx, &repo, "first").await;
    let second = create_test_user(&ctx, &repo, "second").await;
    repo.create_review(title_id, first.id, review(6)).await.unwrap();
    repo.create_review(title_id, second.id, review(7)).await.unwrap();

    let title = repo.get_title(title_id).await.unwrap().unwrap();
    assert_eq!(title.rating, Some(6.5));
    assert_eq!(title.description.as_deref(), Some("Crime saga"));
}

#[tokio::test]
async fn second_review_by_same_author_violates_the_unique_constraint() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let (title_id, _) = create_test_title(&ctx, &repo).await;
    let author = create_test_user(&ctx, &repo, "critic").await;

    let created = repo.create_review(title_id, author.id, review(9)).await.unwrap();
    assert_eq!(created.author, author.username);
    assert!(repo.has_review(title_id, author.id).await.unwrap());

    let err = repo
        .create_review(title_id, author.id, review(3))
        .await
        .unwrap_err();
    let db_err = err.as_database_error().expect("database error");
    assert_eq!(db_err.code().as_deref(), Some("23505"));
    assert_eq!(db_err.constraint(), Some("uq_review_author_title"));

    let response = AppError::from(err).into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn partial_review_update_keeps_omitted_fields() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let (title_id, _) = create_test_title(&ctx, &repo).await;
    let author = create_test_user(&ctx, &repo, "editor").await;
    let created = repo.create_review(title_id, author.id, review(4)).await.unwrap();

    let updated = repo
        .update_review(
            created.id,
            UpdateReviewRequest {
                text: None,
                score: Some(8),
            },
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.score, 8);
    assert_eq!(updated.text, "Seen it");
    assert_eq!(updated.author, author.username);
}

#[tokio::test]
async fn deleting_a_category_nulls_the_title_category() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let (title_id, category_slug) = create_test_title(&ctx, &repo).await;

    assert!(
        repo.delete_catalog_entry(CatalogKind::Category, &category_slug)
            .await
            .unwrap()
    );

    let title = repo.get_title(title_id).await.unwrap().unwrap();
    assert!(title.category.is_none());
    assert_eq!(title.genre.len(), 1);
}

#[tokio::test]
async fn title_update_can_clear_the_description() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let (title_id, category_slug) = create_test_title(&ctx, &repo).await;

    let kept = repo
        .update_title(
            title_id,
            TitleChanges {
                year: Some(1974),
                ..TitleChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kept.year, 1974);
    assert_eq!(kept.description.as_deref(), Some("Crime saga"));
    assert_eq!(kept.category.as_deref(), Some(category_slug.as_str()));

    let cleared = repo
        .update_title(
            title_id,
            TitleChanges {
                description: Some(None),
                genre_ids: Some(Vec::new()),
                ..TitleChanges::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cleared.description, None);
    assert!(cleared.genre.is_empty());
}

#[tokio::test]
async fn deleting_a_title_cascades_to_reviews_and_comments() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let (title_id, _) = create_test_title(&ctx, &repo).await;
    let author = create_test_user(&ctx, &repo, "talker").await;
    let created = repo.create_review(title_id, author.id, review(5)).await.unwrap();
    let comment = repo
        .create_comment(created.id, author.id, "Agreed".into())
        .await
        .unwrap();
    assert_eq!(comment.review, "Seen it");
    assert_eq!(comment.author, author.username);

    assert!(repo.delete_title(title_id).await.unwrap());

    assert!(repo.get_title(title_id).await.unwrap().is_none());
    assert!(repo.get_review(title_id, created.id).await.unwrap().is_none());
    assert!(repo.list_comments(created.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_a_user_cascades_to_their_reviews() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let (title_id, _) = create_test_title(&ctx, &repo).await;
    let author = create_test_user(&ctx, &repo, "leaver").await;
    repo.create_review(title_id, author.id, review(2)).await.unwrap();

    assert!(repo.delete_user(author.id).await.unwrap());

    assert!(repo.list_reviews(title_id).await.unwrap().is_empty());
    let title = repo.get_title(title_id).await.unwrap().unwrap();
    assert_eq!(title.rating, None);
}

#[tokio::test]
async fn search_wildcards_match_literally() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    create_test_user(&ctx, &repo, "a_b").await;
    create_test_user(&ctx, &repo, "axb").await;

    let found: Vec<String> = repo
        .list_users(Some(ctx.name("a_b")))
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    assert_eq!(found, vec![ctx.name("a_b")]);

    // Usernames cannot contain '%', so a literal match finds nothing.
    assert!(repo.list_users(Some("%".into())).await.unwrap().is_empty());

    create_entry(&ctx, &repo, CatalogKind::Genre, "_noir").await;
    create_entry(&ctx, &repo, CatalogKind::Genre, "xnoir").await;
    let genres = repo
        .list_catalog(CatalogKind::Genre, Some(ctx.name("_noir")))
        .await
        .unwrap();
    assert_eq!(genres.len(), 1);
    assert_eq!(genres[0].slug, ctx.name("_noir"));

    let (title_id, _) = create_test_title(&ctx, &repo).await;
    let titles = repo
        .list_titles(TitleFilter {
            name: Some(format!("{}_Title", ctx.tag)),
            ..TitleFilter::default()
        })
        .await
        .unwrap();
    assert!(titles.is_empty());
    let titles = repo
        .list_titles(TitleFilter {
            name: Some(ctx.name(" title")),
            ..TitleFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(titles.len(), 1);
    assert_eq!(titles[0].id, title_id);
}
