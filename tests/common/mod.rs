#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use yamdb_api::{
    AppConfig, AppState, MockMailer, create_router,
    auth::issue_access_token,
    models::{
        CatalogEntry, CatalogKind, Comment, CreateReviewRequest, Role, Title, TitleFilter,
        TitleRecord, UpdateReviewRequest, UpdateUserRequest, User,
    },
    repository::{NewTitle, NewUser, RepoResult, Repository, TitleChanges},
};

// --- In-memory Repository ---

#[derive(Clone)]
struct StoredTitle {
    id: i64,
    name: String,
    year: i32,
    description: Option<String>,
    category_id: Option<i64>,
    genre_ids: Vec<i64>,
}

#[derive(Clone)]
struct StoredReview {
    id: i64,
    title_id: i64,
    author_id: i64,
    text: String,
    score: i32,
    pub_date: chrono::DateTime<Utc>,
}

#[derive(Clone)]
struct StoredComment {
    id: i64,
    review_id: i64,
    author_id: i64,
    text: String,
    pub_date: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    next_id: i64,
    users: Vec<User>,
    categories: Vec<(i64, CatalogEntry)>,
    genres: Vec<(i64, CatalogEntry)>,
    titles: Vec<StoredTitle>,
    reviews: Vec<StoredReview>,
    comments: Vec<StoredComment>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn catalog(&self, kind: CatalogKind) -> &Vec<(i64, CatalogEntry)> {
        match kind {
            CatalogKind::Category => &self.categories,
            CatalogKind::Genre => &self.genres,
        }
    }

    fn catalog_mut(&mut self, kind: CatalogKind) -> &mut Vec<(i64, CatalogEntry)> {
        match kind {
            CatalogKind::Category => &mut self.categories,
            CatalogKind::Genre => &mut self.genres,
        }
    }

    fn username(&self, id: i64) -> String {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn title(&self, t: &StoredTitle) -> Title {
        let scores: Vec<i32> = self
            .reviews
            .iter()
            .filter(|r| r.title_id == t.id)
            .map(|r| r.score)
            .collect();
        let rating = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<i32>() as f64 / scores.len() as f64)
        };
        let category = t.category_id.and_then(|id| {
            self.categories
                .iter()
                .find(|(cid, _)| *cid == id)
                .map(|(_, c)| c.clone())
        });
        let mut genre: Vec<CatalogEntry> = self
            .genres
            .iter()
            .filter(|(gid, _)| t.genre_ids.contains(gid))
            .map(|(_, g)| g.clone())
            .collect();
        genre.sort_by(|a, b| a.name.cmp(&b.name));
        Title {
            id: t.id,
            name: t.name.clone(),
            year: t.year,
            description: t.description.clone(),
            rating,
            category,
            genre,
        }
    }

    fn record(&self, t: &StoredTitle) -> TitleRecord {
        let title = self.title(t);
        let mut genre: Vec<String> = title.genre.into_iter().map(|g| g.slug).collect();
        genre.sort();
        TitleRecord {
            id: title.id,
            name: title.name,
            year: title.year,
            description: title.description,
            category: title.category.map(|c| c.slug),
            genre,
        }
    }

    fn review(&self, r: &StoredReview) -> yamdb_api::models::Review {
        yamdb_api::models::Review {
            id: r.id,
            title: self
                .titles
                .iter()
                .find(|t| t.id == r.title_id)
                .map(|t| t.name.clone())
                .unwrap_or_default(),
            author: self.username(r.author_id),
            text: r.text.clone(),
            score: r.score,
            pub_date: r.pub_date,
            author_id: r.author_id,
        }
    }

    fn comment(&self, c: &StoredComment) -> Comment {
        Comment {
            id: c.id,
            review: self
                .reviews
                .iter()
                .find(|r| r.id == c.review_id)
                .map(|r| r.text.clone())
                .unwrap_or_default(),
            author: self.username(c.author_id),
            text: c.text.clone(),
            pub_date: c.pub_date,
            author_id: c.author_id,
        }
    }
}

/// InMemoryRepository
///
/// A `Repository` backed by plain vectors. Cascades mirror the database's
/// `ON DELETE` rules.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    store: Arc<Mutex<Store>>,
}

impl InMemoryRepository {
    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap()
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn stored_code(&self, username: &str) -> Option<i32> {
        self.lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .and_then(|u| u.confirmation_code)
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn username_taken(&self, username: &str, except: Option<i64>) -> RepoResult<bool> {
        Ok(self
            .lock()
            .users
            .iter()
            .any(|u| u.username == username && Some(u.id) != except))
    }

    async fn email_taken(&self, email: &str, except: Option<i64>) -> RepoResult<bool> {
        Ok(self
            .lock()
            .users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != except))
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.lock();
        let created = User {
            id: store.next_id(),
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role,
            is_staff: false,
            confirmation_code: user.confirmation_code,
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn list_users(&self, search: Option<String>) -> RepoResult<Vec<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| search.as_ref().is_none_or(|s| u.username.contains(s.as_str())))
            .cloned()
            .collect())
    }

    async fn update_user(&self, id: i64, changes: UpdateUserRequest) -> RepoResult<Option<User>> {
        let mut store = self.lock();
        let Some(user) = store.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = changes.username {
            user.username = v;
        }
        if let Some(v) = changes.email {
            user.email = v;
        }
        if let Some(v) = changes.first_name {
            user.first_name = v;
        }
        if let Some(v) = changes.last_name {
            user.last_name = v;
        }
        if let Some(v) = changes.bio {
            user.bio = v;
        }
        if let Some(v) = changes.role {
            user.role = v;
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.lock();
        let before = store.users.len();
        store.users.retain(|u| u.id != id);
        let review_ids: Vec<i64> = store
            .reviews
            .iter()
            .filter(|r| r.author_id == id)
            .map(|r| r.id)
            .collect();
        store.reviews.retain(|r| r.author_id != id);
        store
            .comments
            .retain(|c| c.author_id != id && !review_ids.contains(&c.review_id));
        Ok(store.users.len() < before)
    }

    async fn set_confirmation_code(&self, id: i64, code: i32) -> RepoResult<bool> {
        let mut store = self.lock();
        match store.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.confirmation_code = Some(code);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_catalog(
        &self,
        kind: CatalogKind,
        search: Option<String>,
    ) -> RepoResult<Vec<CatalogEntry>> {
        Ok(self
            .lock()
            .catalog(kind)
            .iter()
            .map(|(_, e)| e.clone())
            .filter(|e| search.as_ref().is_none_or(|s| e.name.contains(s.as_str())))
            .collect())
    }

    async fn catalog_slug_taken(&self, kind: CatalogKind, slug: &str) -> RepoResult<bool> {
        Ok(self.lock().catalog(kind).iter().any(|(_, e)| e.slug == slug))
    }

    async fn create_catalog_entry(
        &self,
        kind: CatalogKind,
        entry: CatalogEntry,
    ) -> RepoResult<CatalogEntry> {
        let mut store = self.lock();
        let id = store.next_id();
        store.catalog_mut(kind).push((id, entry.clone()));
        Ok(entry)
    }

    async fn delete_catalog_entry(&self, kind: CatalogKind, slug: &str) -> RepoResult<bool> {
        let mut store = self.lock();
        let Some(id) = store
            .catalog(kind)
            .iter()
            .find(|(_, e)| e.slug == slug)
            .map(|(id, _)| *id)
        else {
            return Ok(false);
        };
        store.catalog_mut(kind).retain(|(eid, _)| *eid != id);
        for title in store.titles.iter_mut() {
            match kind {
                CatalogKind::Category if title.category_id == Some(id) => title.category_id = None,
                CatalogKind::Genre => title.genre_ids.retain(|g| *g != id),
                _ => {}
            }
        }
        Ok(true)
    }

    async fn resolve_slugs(
        &self,
        kind: CatalogKind,
        slugs: &[String],
    ) -> RepoResult<HashMap<String, i64>> {
        Ok(self
            .lock()
            .catalog(kind)
            .iter()
            .filter(|(_, e)| slugs.contains(&e.slug))
            .map(|(id, e)| (e.slug.clone(), *id))
            .collect())
    }

    async fn list_titles(&self, filter: TitleFilter) -> RepoResult<Vec<Title>> {
        let store = self.lock();
        Ok(store
            .titles
            .iter()
            .map(|t| store.title(t))
            .filter(|t| {
                filter
                    .category
                    .as_ref()
                    .is_none_or(|c| t.category.as_ref().is_some_and(|tc| &tc.slug == c))
            })
            .filter(|t| {
                filter
                    .genre
                    .as_ref()
                    .is_none_or(|g| t.genre.iter().any(|tg| &tg.slug == g))
            })
            .filter(|t| {
                filter
                    .name
                    .as_ref()
                    .is_none_or(|n| t.name.to_lowercase().contains(&n.to_lowercase()))
            })
            .filter(|t| filter.year.is_none_or(|y| t.year == y))
            .collect())
    }

    async fn get_title(&self, id: i64) -> RepoResult<Option<Title>> {
        let store = self.lock();
        Ok(store.titles.iter().find(|t| t.id == id).map(|t| store.title(t)))
    }

    async fn create_title(&self, title: NewTitle) -> RepoResult<TitleRecord> {
        let mut store = self.lock();
        let stored = StoredTitle {
            id: store.next_id(),
            name: title.name,
            year: title.year,
            description: title.description,
            category_id: title.category_id,
            genre_ids: title.genre_ids,
        };
        store.titles.push(stored.clone());
        Ok(store.record(&stored))
    }

    async fn update_title(
        &self,
        id: i64,
        changes: TitleChanges,
    ) -> RepoResult<Option<TitleRecord>> {
        let mut store = self.lock();
        let Some(title) = store.titles.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        if let Some(v) = changes.name {
            title.name = v;
        }
        if let Some(v) = changes.year {
            title.year = v;
        }
        if let Some(v) = changes.description {
            title.description = v;
        }
        if let Some(v) = changes.category_id {
            title.category_id = Some(v);
        }
        if let Some(v) = changes.genre_ids {
            title.genre_ids = v;
        }
        let title = title.clone();
        Ok(Some(store.record(&title)))
    }

    async fn delete_title(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.lock();
        let before = store.titles.len();
        store.titles.retain(|t| t.id != id);
        let review_ids: Vec<i64> = store
            .reviews
            .iter()
            .filter(|r| r.title_id == id)
            .map(|r| r.id)
            .collect();
        store.reviews.retain(|r| r.title_id != id);
        store.comments.retain(|c| !review_ids.contains(&c.review_id));
        Ok(store.titles.len() < before)
    }

    async fn list_reviews(&self, title_id: i64) -> RepoResult<Vec<yamdb_api::models::Review>> {
        let store = self.lock();
        Ok(store
            .reviews
            .iter()
            .filter(|r| r.title_id == title_id)
            .map(|r| store.review(r))
            .collect())
    }

    async fn get_review(
        &self,
        title_id: i64,
        review_id: i64,
    ) -> RepoResult<Option<yamdb_api::models::Review>> {
        let store = self.lock();
        Ok(store
            .reviews
            .iter()
            .find(|r| r.title_id == title_id && r.id == review_id)
            .map(|r| store.review(r)))
    }

    async fn has_review(&self, title_id: i64, author_id: i64) -> RepoResult<bool> {
        Ok(self
            .lock()
            .reviews
            .iter()
            .any(|r| r.title_id == title_id && r.author_id == author_id))
    }

    async fn create_review(
        &self,
        title_id: i64,
        author_id: i64,
        req: CreateReviewRequest,
    ) -> RepoResult<yamdb_api::models::Review> {
        let mut store = self.lock();
        let stored = StoredReview {
            id: store.next_id(),
            title_id,
            author_id,
            text: req.text,
            score: req.score,
            pub_date: Utc::now(),
        };
        store.reviews.push(stored.clone());
        Ok(store.review(&stored))
    }

    async fn update_review(
        &self,
        review_id: i64,
        req: UpdateReviewRequest,
    ) -> RepoResult<Option<yamdb_api::models::Review>> {
        let mut store = self.lock();
        let Some(review) = store.reviews.iter_mut().find(|r| r.id == review_id) else {
            return Ok(None);
        };
        if let Some(v) = req.text {
            review.text = v;
        }
        if let Some(v) = req.score {
            review.score = v;
        }
        let review = review.clone();
        Ok(Some(store.review(&review)))
    }

    async fn delete_review(&self, review_id: i64) -> RepoResult<bool> {
        let mut store = self.lock();
        let before = store.reviews.len();
        store.reviews.retain(|r| r.id != review_id);
        store.comments.retain(|c| c.review_id != review_id);
        Ok(store.reviews.len() < before)
    }

    async fn list_comments(&self, review_id: i64) -> RepoResult<Vec<Comment>> {
        let store = self.lock();
        Ok(store
            .comments
            .iter()
            .filter(|c| c.review_id == review_id)
            .map(|c| store.comment(c))
            .collect())
    }

    async fn get_comment(&self, review_id: i64, comment_id: i64) -> RepoResult<Option<Comment>> {
        let store = self.lock();
        Ok(store
            .comments
            .iter()
            .find(|c| c.review_id == review_id && c.id == comment_id)
            .map(|c| store.comment(c)))
    }

    async fn create_comment(
        &self,
        review_id: i64,
        author_id: i64,
        text: String,
    ) -> RepoResult<Comment> {
        let mut store = self.lock();
        let stored = StoredComment {
            id: store.next_id(),
            review_id,
            author_id,
            text,
            pub_date: Utc::now(),
        };
        store.comments.push(stored.clone());
        Ok(store.comment(&stored))
    }

    async fn update_comment(
        &self,
        comment_id: i64,
        text: Option<String>,
    ) -> RepoResult<Option<Comment>> {
        let mut store = self.lock();
        let Some(comment) = store.comments.iter_mut().find(|c| c.id == comment_id) else {
            return Ok(None);
        };
        if let Some(v) = text {
            comment.text = v;
        }
        let comment = comment.clone();
        Ok(Some(store.comment(&comment)))
    }

    async fn delete_comment(&self, comment_id: i64) -> RepoResult<bool> {
        let mut store = self.lock();
        let before = store.comments.len();
        store.comments.retain(|c| c.id != comment_id);
        Ok(store.comments.len() < before)
    }
}

// --- Test Application ---

/// TestApp
///
/// The full router over an in-memory repository and a recording mailer.
pub struct TestApp {
    pub router: Router,
    pub repo: InMemoryRepository,
    pub mailer: MockMailer,
    pub config: AppConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_mailer(MockMailer::new())
    }

    pub fn with_mailer(mailer: MockMailer) -> Self {
        let repo = InMemoryRepository::default();
        let config = AppConfig::default();
        let state = AppState {
            repo: Arc::new(repo.clone()),
            mailer: Arc::new(mailer.clone()),
            config: config.clone(),
        };
        Self {
            router: create_router(state),
            repo,
            mailer,
            config,
        }
    }

    /// Inserts a user directly and returns it with a valid bearer token.
    pub async fn seed_user(&self, username: &str, role: Role) -> (User, String) {
        let user = self
            .repo
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                role,
                ..NewUser::default()
            })
            .await
            .unwrap();
        let token =
            issue_access_token(user.id, &self.config.jwt_secret, self.config.jwt_ttl_secs).unwrap();
        (user, token)
    }

    /// Sends one request through the router and returns status plus JSON body
    /// (`Value::Null` for an empty body).
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, token, None).await
    }

    /// Creates a category `movie`, genres `drama` and `comedy`, and one title using
    /// them. Returns the title id.
    pub async fn seed_title(&self, admin_token: &str) -> i64 {
        use serde_json::json;
        self.post(
            "/v1/categories",
            Some(admin_token),
            json!({"name": "Movie", "slug": "movie"}),
        )
        .await;
        for (name, slug) in [("Drama", "drama"), ("Comedy", "comedy")] {
            self.post(
                "/v1/genres",
                Some(admin_token),
                json!({"name": name, "slug": slug}),
            )
            .await;
        }
        let (status, body) = self
            .post(
                "/v1/titles",
                Some(admin_token),
                json!({
                    "name": "The Godfather",
                    "year": 1972,
                    "description": "Crime saga",
                    "category": "movie",
                    "genre": ["drama"]
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "seed title failed: {body}");
        body["id"].as_i64().unwrap()
    }
}
