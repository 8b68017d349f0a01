#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use workforce_api::auth::Claims;
use workforce_api::config::{AppConfig, Environment};
use workforce_api::create_router;
use workforce_api::filter::StoreQuery;
use workforce_api::store::{Link, MemoryStore, Store, StoreResult};
use workforce_api::types::Record;

pub const TEST_SECRET: &str = "workforce-test-secret";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::for_environment(Environment::Development);
    config.security.jwt_secret = TEST_SECRET.to_string();
    config.filter.max_limit = 50;
    config.filter.max_offset = 500;
    config
}

/// In-process application driven with `tower::ServiceExt::oneshot`
pub struct TestApp {
    router: Router,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        Self::with_store(MemoryStore::new_shared())
    }

    pub fn with_store(store: Arc<dyn Store>) -> Result<Self> {
        let router = create_router(store, &test_config()).context("failed to build router")?;
        Ok(Self { router })
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let raw = body.map(|b| b.to_string());
        self.send_raw(method, uri, token, raw.as_deref()).await
    }

    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&str>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON response for {}", uri))?
        };
        Ok((status, payload))
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Creates a row and returns its id
    pub async fn create(&self, plural: &str, token: &str, body: Value) -> Result<String> {
        let (status, payload) = self.post(&format!("/api/{}", plural), token, body).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create {} failed: {} {}", plural, status, payload);
        payload["data"]["id"]
            .as_str()
            .map(str::to_string)
            .context("created row has no id")
    }
}

pub fn token(permissions: &[&str]) -> String {
    token_with(None, permissions)
}

pub fn token_for(user_id: Uuid, permissions: &[&str]) -> String {
    token_with(Some(user_id), permissions)
}

fn token_with(user_id: Option<Uuid>, permissions: &[&str]) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        user_id,
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        exp: now + 3600,
        iat: now,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_SECRET.as_bytes()))
        .expect("failed to sign test token")
}

/// Every permission a resource exposes for its own rows
pub fn crud(singular: &str, plural: &str) -> Vec<String> {
    vec![
        format!("get {}", plural),
        format!("create {}", plural),
        format!("get {}", singular),
        format!("update {}", singular),
        format!("delete {}", singular),
    ]
}

pub fn refs(permissions: &[String]) -> Vec<&str> {
    permissions.iter().map(String::as_str).collect()
}

pub fn ids(payload: &Value) -> Vec<String> {
    payload["data"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row["id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn error_code(payload: &Value) -> &str {
    payload["error"]["code"].as_str().unwrap_or_default()
}

pub fn missing_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn role(name: &str) -> Value {
    json!({ "name": name })
}

/// Memory store that counts calls touching association links
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    association_calls: AtomicUsize,
}

impl RecordingStore {
    pub fn association_calls(&self) -> usize {
        self.association_calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.association_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for RecordingStore {
    async fn find_all(&self, table: &str, query: &StoreQuery) -> StoreResult<Vec<Record>> {
        self.inner.find_all(table, query).await
    }

    async fn find_by_key(&self, table: &str, key: Uuid, query: &StoreQuery) -> StoreResult<Option<Record>> {
        self.inner.find_by_key(table, key, query).await
    }

    async fn create(&self, table: &str, values: Record) -> StoreResult<Record> {
        self.inner.create(table, values).await
    }

    async fn update(&self, table: &str, key: Uuid, values: Record) -> StoreResult<Record> {
        self.inner.update(table, key, values).await
    }

    async fn destroy(&self, table: &str, key: Uuid) -> StoreResult<()> {
        self.inner.destroy(table, key).await
    }

    async fn find_associated(&self, link: &Link, owner: Uuid, query: &StoreQuery) -> StoreResult<Vec<Record>> {
        self.record();
        self.inner.find_associated(link, owner, query).await
    }

    async fn add_associated(&self, link: &Link, owner: Uuid, targets: &[Uuid], values: Record) -> StoreResult<Vec<Record>> {
        self.record();
        self.inner.add_associated(link, owner, targets, values).await
    }

    async fn update_associated(&self, link: &Link, owner: Uuid, target: Uuid, values: Record) -> StoreResult<Record> {
        self.record();
        self.inner.update_associated(link, owner, target, values).await
    }

    async fn destroy_associated(&self, link: &Link, owner: Uuid, target: Uuid) -> StoreResult<()> {
        self.record();
        self.inner.destroy_associated(link, owner, target).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }
}
