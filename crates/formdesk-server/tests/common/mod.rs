// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared helpers for server integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use chrono::{Datelike, NaiveDate};
use http_body_util::BodyExt;
use minijinja::HtmlEscape;
use tempfile::TempDir;
use tower::ServiceExt;

use formdesk_core::EntityId;
use formdesk_core::error::Result as StorageResult;
use formdesk_core::persistence::{self, Assignment, Persistence, User};
use formdesk_server::auth::{SESSION_AUDIENCE, SESSION_COOKIE, SESSION_TTL};
use formdesk_server::config::{Config, Environment};
use formdesk_server::disk::LocalDisk;
use formdesk_server::mail::{Email, MailError, Mailer};
use formdesk_server::{AppState, router};

pub const JWT_SECRET: &str = "test-secret";
pub const PUBLIC_URL: &str = "http://formdesk.test";

/// Mailer that keeps every message.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport {
                to: email.to,
                reason: "connection refused".to_string(),
            });
        }
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Persistence that counts user page fetches.
pub struct CountingPersistence {
    inner: Arc<dyn Persistence>,
    user_pages: AtomicUsize,
}

impl CountingPersistence {
    pub fn new(inner: Arc<dyn Persistence>) -> Self {
        Self {
            inner,
            user_pages: AtomicUsize::new(0),
        }
    }

    /// Number of `list_users` calls so far.
    pub fn user_pages(&self) -> usize {
        self.user_pages.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Persistence for CountingPersistence {
    async fn list_users(&self, offset: i64, limit: i64) -> StorageResult<Vec<User>> {
        self.user_pages.fetch_add(1, Ordering::SeqCst);
        self.inner.list_users(offset, limit).await
    }

    async fn get_user(&self, id: EntityId) -> StorageResult<Option<User>> {
        self.inner.get_user(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        self.inner.get_user_by_email(email).await
    }

    async fn user_with_email_exists(
        &self,
        email: &str,
        excluding_id: EntityId,
    ) -> StorageResult<bool> {
        self.inner.user_with_email_exists(email, excluding_id).await
    }

    async fn insert_user(&self, user: &User) -> StorageResult<EntityId> {
        self.inner.insert_user(user).await
    }

    async fn update_user(&self, user: &User) -> StorageResult<()> {
        self.inner.update_user(user).await
    }

    async fn list_assignments(&self, offset: i64, limit: i64) -> StorageResult<Vec<Assignment>> {
        self.inner.list_assignments(offset, limit).await
    }

    async fn get_assignment(&self, id: EntityId) -> StorageResult<Option<Assignment>> {
        self.inner.get_assignment(id).await
    }

    async fn insert_assignment(&self, assignment: &Assignment) -> StorageResult<EntityId> {
        self.inner.insert_assignment(assignment).await
    }

    async fn update_assignment(&self, assignment: &Assignment) -> StorageResult<()> {
        self.inner.update_assignment(assignment).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }
}

/// Response with a collected body.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("JSON body")
    }
}

/// Router over an in-memory database, a recording mailer and a temporary
/// upload directory, with one seeded user.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub upload_dir: TempDir,
    pub user: User,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_mailer(RecordingMailer::default()).await
    }

    pub async fn with_mailer(mailer: RecordingMailer) -> Self {
        Self::build(mailer, |persistence| persistence).await
    }

    /// App whose storage counts user page fetches.
    pub async fn counting() -> (Self, Arc<CountingPersistence>) {
        let mut counter = None;
        let app = Self::build(RecordingMailer::default(), |inner| {
            let counting = Arc::new(CountingPersistence::new(inner));
            counter = Some(Arc::clone(&counting));
            let persistence: Arc<dyn Persistence> = counting;
            persistence
        })
        .await;
        (app, counter.expect("persistence wrapped"))
    }

    async fn build<F>(mailer: RecordingMailer, wrap: F) -> Self
    where
        F: FnOnce(Arc<dyn Persistence>) -> Arc<dyn Persistence>,
    {
        let upload_dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            database_url: "sqlite::memory:".to_string(),
            db_max_connections: 1,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            environment: Environment::Dev,
            jwt_secret: JWT_SECRET.to_string(),
            public_url: PUBLIC_URL.to_string(),
            upload_dir: upload_dir.path().to_path_buf(),
            upload_base_url: "/storage".to_string(),
            index_budget: Duration::from_secs(5),
            stream_max_pages: 10,
        };

        let persistence = wrap(
            persistence::connect(&config.database_url, 1)
                .await
                .expect("in-memory database"),
        );
        let mut user = User {
            id: 0,
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 12, 10).unwrap(),
        };
        user.id = persistence.insert_user(&user).await.unwrap();

        let mailer = Arc::new(mailer);
        let disk = Arc::new(LocalDisk::new(upload_dir.path(), "/storage"));
        let state = AppState::new(&config, persistence, mailer.clone(), disk).unwrap();

        Self {
            router: router(state.clone()),
            state,
            mailer,
            upload_dir,
            user,
        }
    }

    /// `Cookie` header value with a fresh session for the seeded user.
    pub fn session(&self) -> String {
        let token = self
            .state
            .signer
            .issue(SESSION_AUDIENCE, self.user.id, SESSION_TTL)
            .unwrap();
        format!("{SESSION_COOKIE}={token}")
    }

    /// Response with its body left unread.
    pub async fn send_raw(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.send_raw(request).await;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    /// Authenticated GET.
    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(self.request("GET", uri).body(Body::empty()).unwrap())
            .await
    }

    /// Authenticated GET with extra headers.
    pub async fn get_with(&self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = self.request("GET", uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// GET without a session.
    pub async fn get_anonymous(&self, uri: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::builder().method("GET").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Authenticated urlencoded POST issued by htmx.
    pub async fn post_form(&self, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
        let request = self
            .request("POST", uri)
            .header("hx-request", "true")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form_body(fields)))
            .unwrap();
        self.send(request).await
    }

    pub fn request(&self, method: &str, uri: &str) -> axum::http::request::Builder {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(COOKIE, self.session())
    }
}

/// `name="value"` as rendered by the templates.
pub fn attr(name: &str, value: &str) -> String {
    format!(r#"{name}="{}""#, HtmlEscape(value))
}

/// `application/x-www-form-urlencoded` body.
pub fn form_body(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode everything but unreserved characters.
pub fn encode(raw: &str) -> String {
    let mut out = String::new();
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// A date of birth making the user `years` old today.
pub fn born_years_ago(years: i32) -> String {
    let today = chrono::Utc::now().date_naive();
    let date = NaiveDate::from_ymd_opt(today.year() - years, 1, 1).unwrap();
    date.format("%Y-%m-%d").to_string()
}
