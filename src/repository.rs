use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, query_builder::QueryBuilder};

use crate::models::{
    CatalogEntry, CatalogKind, Comment, CreateReviewRequest, Genre, Review, Role, Title,
    TitleFilter, TitleRecord, UpdateReviewRequest, UpdateUserRequest, User,
};

pub type RepoResult<T> = Result<T, sqlx::Error>;

/// NewUser
///
/// Everything needed to insert a user row. Signup supplies the confirmation code;
/// administrative creation leaves it empty.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
    pub confirmation_code: Option<i32>,
}

/// NewTitle
///
/// A title with its relations already resolved from slugs to ids.
#[derive(Debug, Clone, Default)]
pub struct NewTitle {
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub genre_ids: Vec<i64>,
}

/// TitleChanges
///
/// Partial title update. `genre_ids`, when present, replaces the whole set;
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default)]
pub struct TitleChanges {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<Option<String>>,
    pub category_id: Option<i64>,
    pub genre_ids: Option<Vec<i64>>,
}

/// Repository Trait
///
/// The abstract contract for all persistence operations. Handlers only see
/// `Arc<dyn Repository>`, so tests substitute an in-memory implementation.
///
/// Lookups return `Ok(None)` / `Ok(false)` for a missing row; `Err` is reserved
/// for real database failures.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    // `except` excludes one user id, so a user keeping their own name is not a clash.
    async fn username_taken(&self, username: &str, except: Option<i64>) -> RepoResult<bool>;
    async fn email_taken(&self, email: &str, except: Option<i64>) -> RepoResult<bool>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn list_users(&self, search: Option<String>) -> RepoResult<Vec<User>>;
    async fn update_user(&self, id: i64, changes: UpdateUserRequest) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: i64) -> RepoResult<bool>;
    async fn set_confirmation_code(&self, id: i64, code: i32) -> RepoResult<bool>;

    // --- Categories & Genres ---
    async fn list_catalog(
        &self,
        kind: CatalogKind,
        search: Option<String>,
    ) -> RepoResult<Vec<CatalogEntry>>;
    async fn catalog_slug_taken(&self, kind: CatalogKind, slug: &str) -> RepoResult<bool>;
    async fn create_catalog_entry(
        &self,
        kind: CatalogKind,
        entry: CatalogEntry,
    ) -> RepoResult<CatalogEntry>;
    async fn delete_catalog_entry(&self, kind: CatalogKind, slug: &str) -> RepoResult<bool>;
    /// Maps the known slugs to ids; unknown slugs are simply absent from the result.
    async fn resolve_slugs(
        &self,
        kind: CatalogKind,
        slugs: &[String],
    ) -> RepoResult<HashMap<String, i64>>;

    // --- Titles ---
    async fn list_titles(&self, filter: TitleFilter) -> RepoResult<Vec<Title>>;
    async fn get_title(&self, id: i64) -> RepoResult<Option<Title>>;
    async fn create_title(&self, title: NewTitle) -> RepoResult<TitleRecord>;
    async fn update_title(
        &self,
        id: i64,
        changes: TitleChanges,
    ) -> RepoResult<Option<TitleRecord>>;
    async fn delete_title(&self, id: i64) -> RepoResult<bool>;

    // --- Reviews ---
    async fn list_reviews(&self, title_id: i64) -> RepoResult<Vec<Review>>;
    async fn get_review(&self, title_id: i64, review_id: i64) -> RepoResult<Option<Review>>;
    async fn has_review(&self, title_id: i64, author_id: i64) -> RepoResult<bool>;
    async fn create_review(
        &self,
        title_id: i64,
        author_id: i64,
        req: CreateReviewRequest,
    ) -> RepoResult<Review>;
    async fn update_review(
        &self,
        review_id: i64,
        req: UpdateReviewRequest,
    ) -> RepoResult<Option<Review>>;
    async fn delete_review(&self, review_id: i64) -> RepoResult<bool>;

    // --- Comments ---
    async fn list_comments(&self, review_id: i64) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, review_id: i64, comment_id: i64) -> RepoResult<Option<Comment>>;
    async fn create_comment(
        &self,
        review_id: i64,
        author_id: i64,
        text: String,
    ) -> RepoResult<Comment>;
    async fn update_comment(
        &self,
        comment_id: i64,
        text: Option<String>,
    ) -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, comment_id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, bio, role, is_staff, confirmation_code";

// Rating is aggregated in the same query, so a title without reviews gets NULL.
const TITLE_SELECT: &str = r#"
    SELECT t.id, t.name, t.year, t.description,
           c.name AS category_name, c.slug AS category_slug,
           AVG(r.score)::float8 AS rating
    FROM titles t
    LEFT JOIN categories c ON c.id = t.category_id
    LEFT JOIN reviews r ON r.title_id = t.id
"#;

const REVIEW_PROJECTION: &str = r#"
    SELECT r.id, t.name AS title, u.username AS author, r.text, r.score, r.pub_date, r.author_id
    FROM r_src r
    JOIN titles t ON t.id = r.title_id
    JOIN users u ON u.id = r.author_id
"#;

const COMMENT_PROJECTION: &str = r#"
    SELECT c.id, rv.text AS review, u.username AS author, c.text, c.pub_date, c.author_id
    FROM c_src c
    JOIN reviews rv ON rv.id = c.review_id
    JOIN users u ON u.id = c.author_id
"#;

/// Wraps `needle` for an `ILIKE` substring match. `%`, `_` and `\` in the input
/// are escaped so they match literally; backslash is Postgres's default LIKE escape.
pub fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Renders the review projection over `source`: the table itself or a CTE with its columns.
fn review_select(source: &str) -> String {
    REVIEW_PROJECTION.replace("r_src", source)
}

fn comment_select(source: &str) -> String {
    COMMENT_PROJECTION.replace("c_src", source)
}

#[derive(FromRow)]
struct TitleRow {
    id: i64,
    name: String,
    year: i32,
    description: Option<String>,
    category_name: Option<String>,
    category_slug: Option<String>,
    rating: Option<f64>,
}

#[derive(FromRow)]
struct TitleRecordRow {
    id: i64,
    name: String,
    year: i32,
    description: Option<String>,
    category: Option<String>,
}

#[derive(FromRow)]
struct TitleGenreRow {
    title_id: i64,
    name: String,
    slug: String,
}

impl TitleRow {
    fn into_title(self, genre: Vec<Genre>) -> Title {
        let category = match (self.category_name, self.category_slug) {
            (Some(name), Some(slug)) => Some(CatalogEntry { name, slug }),
            _ => None,
        };
        Title {
            id: self.id,
            name: self.name,
            year: self.year,
            description: self.description,
            rating: self.rating,
            category,
            genre,
        }
    }
}

impl PostgresRepository {
    /// Loads the genres of every title in `ids` with a single query.
    async fn genres_for(&self, ids: &[i64]) -> RepoResult<HashMap<i64, Vec<Genre>>> {
        let rows = sqlx::query_as::<_, TitleGenreRow>(
            r#"SELECT tg.title_id, g.name, g.slug
               FROM title_genres tg
               JOIN genres g ON g.id = tg.genre_id
               WHERE tg.title_id = ANY($1)
               ORDER BY g.name"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_title: HashMap<i64, Vec<Genre>> = HashMap::new();
        for row in rows {
            by_title.entry(row.title_id).or_default().push(CatalogEntry {
                name: row.name,
                slug: row.slug,
            });
        }
        Ok(by_title)
    }

    async fn with_genres(&self, rows: Vec<TitleRow>) -> RepoResult<Vec<Title>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let mut genres = self.genres_for(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let genre = genres.remove(&row.id).unwrap_or_default();
                row.into_title(genre)
            })
            .collect())
    }

    async fn title_record(&self, id: i64) -> RepoResult<Option<TitleRecord>> {
        let Some(row) = sqlx::query_as::<_, TitleRecordRow>(
            r#"SELECT t.id, t.name, t.year, t.description, c.slug AS category
               FROM titles t
               LEFT JOIN categories c ON c.id = t.category_id
               WHERE t.id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let genre = sqlx::query_scalar::<_, String>(
            r#"SELECT g.slug
               FROM title_genres tg
               JOIN genres g ON g.id = tg.genre_id
               WHERE tg.title_id = $1
               ORDER BY g.slug"#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(TitleRecord {
            id: row.id,
            name: row.name,
            year: row.year,
            description: row.description,
            category: row.category,
            genre,
        }))
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    async fn username_taken(&self, username: &str, except: Option<i64>) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND ($2::bigint IS NULL OR id <> $2))",
        )
        .bind(username)
        .bind(except)
        .fetch_one(&self.pool)
        .await
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1) AND ($2::bigint IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(except)
        .fetch_one(&self.pool)
        .await
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (username, email, first_name, last_name, bio, role, confirmation_code)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(user.username)
        .bind(user.email)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.bio)
        .bind(user.role.as_str())
        .bind(user.confirmation_code)
        .fetch_one(&self.pool)
        .await
    }

    /// list_users
    ///
    /// Case-insensitive substring search on the username, parameterized via QueryBuilder.
    async fn list_users(&self, search: Option<String>) -> RepoResult<Vec<User>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        if let Some(s) = search {
            builder.push(" WHERE username ILIKE ");
            builder.push_bind(contains_pattern(&s));
        }
        builder.push(" ORDER BY id");
        builder.build_query_as::<User>().fetch_all(&self.pool).await
    }

    /// update_user
    ///
    /// `COALESCE` keeps the stored value for every field the request omits.
    async fn update_user(&self, id: i64, changes: UpdateUserRequest) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users
               SET username = COALESCE($2, username),
                   email = COALESCE($3, email),
                   first_name = COALESCE($4, first_name),
                   last_name = COALESCE($5, last_name),
                   bio = COALESCE($6, bio),
                   role = COALESCE($7, role)
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(id)
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.bio)
        .bind(changes.role.map(|r| r.as_str()))
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn set_confirmation_code(&self, id: i64, code: i32) -> RepoResult<bool> {
        let res = sqlx::query("UPDATE users SET confirmation_code = $2 WHERE id = $1")
            .bind(id)
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- CATALOG ---
    // Table names come from `CatalogKind`, never from the request.

    async fn list_catalog(
        &self,
        kind: CatalogKind,
        search: Option<String>,
    ) -> RepoResult<Vec<CatalogEntry>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT name, slug FROM {}", kind.table()));
        if let Some(s) = search {
            builder.push(" WHERE name ILIKE ");
            builder.push_bind(contains_pattern(&s));
        }
        builder.push(" ORDER BY name");
        builder
            .build_query_as::<CatalogEntry>()
            .fetch_all(&self.pool)
            .await
    }

    async fn catalog_slug_taken(&self, kind: CatalogKind, slug: &str) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE slug = $1)",
            kind.table()
        ))
        .bind(slug)
        .fetch_one(&self.pool)
        .await
    }

    async fn create_catalog_entry(
        &self,
        kind: CatalogKind,
        entry: CatalogEntry,
    ) -> RepoResult<CatalogEntry> {
        sqlx::query_as::<_, CatalogEntry>(&format!(
            "INSERT INTO {} (name, slug) VALUES ($1, $2) RETURNING name, slug",
            kind.table()
        ))
        .bind(entry.name)
        .bind(entry.slug)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_catalog_entry(&self, kind: CatalogKind, slug: &str) -> RepoResult<bool> {
        let res = sqlx::query(&format!("DELETE FROM {} WHERE slug = $1", kind.table()))
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn resolve_slugs(
        &self,
        kind: CatalogKind,
        slugs: &[String],
    ) -> RepoResult<HashMap<String, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(&format!(
            "SELECT slug, id FROM {} WHERE slug = ANY($1)",
            kind.table()
        ))
        .bind(slugs)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    // --- TITLES ---

    /// list_titles
    ///
    /// Applies each present filter with QueryBuilder; the genre filter matches titles
    /// that have that genre among possibly several.
    async fn list_titles(&self, filter: TitleFilter) -> RepoResult<Vec<Title>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(TITLE_SELECT);
        builder.push(" WHERE TRUE");

        if let Some(category) = filter.category {
            builder.push(" AND c.slug = ");
            builder.push_bind(category);
        }
        if let Some(genre) = filter.genre {
            builder.push(
                " AND EXISTS (SELECT 1 FROM title_genres tg JOIN genres g ON g.id = tg.genre_id \
                 WHERE tg.title_id = t.id AND g.slug = ",
            );
            builder.push_bind(genre);
            builder.push(")");
        }
        if let Some(name) = filter.name {
            builder.push(" AND t.name ILIKE ");
            builder.push_bind(contains_pattern(&name));
        }
        if let Some(year) = filter.year {
            builder.push(" AND t.year = ");
            builder.push_bind(year);
        }

        builder.push(" GROUP BY t.id, c.id ORDER BY t.id");

        let rows = builder
            .build_query_as::<TitleRow>()
            .fetch_all(&self.pool)
            .await?;
        self.with_genres(rows).await
    }

    async fn get_title(&self, id: i64) -> RepoResult<Option<Title>> {
        let row = sqlx::query_as::<_, TitleRow>(&format!(
            "{TITLE_SELECT} WHERE t.id = $1 GROUP BY t.id, c.id"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.with_genres(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// create_title
    ///
    /// Inserts the title and its genre links in one transaction.
    async fn create_title(&self, title: NewTitle) -> RepoResult<TitleRecord> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO titles (name, year, description, category_id)
               VALUES ($1, $2, $3, $4)
               RETURNING id"#,
        )
        .bind(title.name)
        .bind(title.year)
        .bind(title.description)
        .bind(title.category_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"INSERT INTO title_genres (title_id, genre_id)
               SELECT $1, UNNEST($2::bigint[])
               ON CONFLICT DO NOTHING"#,
        )
        .bind(id)
        .bind(title.genre_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.title_record(id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    async fn update_title(
        &self,
        id: i64,
        changes: TitleChanges,
    ) -> RepoResult<Option<TitleRecord>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"UPDATE titles
               SET name = COALESCE($2, name),
                   year = COALESCE($3, year),
                   description = CASE WHEN $4 THEN $5 ELSE description END,
                   category_id = COALESCE($6, category_id)
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.year)
        .bind(changes.description.is_some())
        .bind(changes.description.flatten())
        .bind(changes.category_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(genre_ids) = changes.genre_ids {
            sqlx::query("DELETE FROM title_genres WHERE title_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                r#"INSERT INTO title_genres (title_id, genre_id)
                   SELECT $1, UNNEST($2::bigint[])
                   ON CONFLICT DO NOTHING"#,
            )
            .bind(id)
            .bind(genre_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.title_record(id).await
    }

    async fn delete_title(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- REVIEWS ---

    async fn list_reviews(&self, title_id: i64) -> RepoResult<Vec<Review>> {
        sqlx::query_as::<_, Review>(&format!(
            "{} WHERE r.title_id = $1 ORDER BY r.pub_date, r.id",
            review_select("reviews")
        ))
        .bind(title_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_review(&self, title_id: i64, review_id: i64) -> RepoResult<Option<Review>> {
        sqlx::query_as::<_, Review>(&format!(
            "{} WHERE r.title_id = $1 AND r.id = $2",
            review_select("reviews")
        ))
        .bind(title_id)
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn has_review(&self, title_id: i64, author_id: i64) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM reviews WHERE title_id = $1 AND author_id = $2)",
        )
        .bind(title_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
    }

    /// create_review
    ///
    /// The `uq_review_author_title` constraint backs the handler's pre-check; a race
    /// that slips past it surfaces as a unique violation (400).
    async fn create_review(
        &self,
        title_id: i64,
        author_id: i64,
        req: CreateReviewRequest,
    ) -> RepoResult<Review> {
        sqlx::query_as::<_, Review>(&format!(
            r#"WITH inserted AS (
                   INSERT INTO reviews (title_id, author_id, text, score)
                   VALUES ($1, $2, $3, $4)
                   RETURNING id, title_id, author_id, text, score, pub_date
               )
               {}"#,
            review_select("inserted")
        ))
        .bind(title_id)
        .bind(author_id)
        .bind(req.text)
        .bind(req.score)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_review(
        &self,
        review_id: i64,
        req: UpdateReviewRequest,
    ) -> RepoResult<Option<Review>> {
        sqlx::query_as::<_, Review>(&format!(
            r#"WITH updated AS (
                   UPDATE reviews
                   SET text = COALESCE($2, text),
                       score = COALESCE($3, score)
                   WHERE id = $1
                   RETURNING id, title_id, author_id, text, score, pub_date
               )
               {}"#,
            review_select("updated")
        ))
        .bind(review_id)
        .bind(req.text)
        .bind(req.score)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_review(&self, review_id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- COMMENTS ---

    async fn list_comments(&self, review_id: i64) -> RepoResult<Vec<Comment>> {
        sqlx::query_as::<_, Comment>(&format!(
            "{} WHERE c.review_id = $1 ORDER BY c.pub_date, c.id",
            comment_select("comments")
        ))
        .bind(review_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_comment(&self, review_id: i64, comment_id: i64) -> RepoResult<Option<Comment>> {
        sqlx::query_as::<_, Comment>(&format!(
            "{} WHERE c.review_id = $1 AND c.id = $2",
            comment_select("comments")
        ))
        .bind(review_id)
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_comment(
        &self,
        review_id: i64,
        author_id: i64,
        text: String,
    ) -> RepoResult<Comment> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"WITH inserted AS (
                   INSERT INTO comments (review_id, author_id, text)
                   VALUES ($1, $2, $3)
                   RETURNING id, review_id, author_id, text, pub_date
               )
               {}"#,
            comment_select("inserted")
        ))
        .bind(review_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_comment(
        &self,
        comment_id: i64,
        text: Option<String>,
    ) -> RepoResult<Option<Comment>> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"WITH updated AS (
                   UPDATE comments SET text = COALESCE($2, text)
                   WHERE id = $1
                   RETURNING id, review_id, author_id, text, pub_date
               )
               {}"#,
            comment_select("updated")
        ))
        .bind(comment_id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_comment(&self, comment_id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
