#![allow(dead_code)]

use api_lib::web::{Adapters, AppState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use http_body_util::BodyExt;
use std::sync::Arc;
use uuid::Uuid;
use vet_consult_core::domain::{Role, SessionUser};
use vet_consult_core::memory::InMemoryStore;
use vet_consult_core::ports::{LanguageModelService, ModelKind, PortError, PortResult};

/// Replies to every request with the same text, or fails when it has none.
pub struct CannedModel(pub Option<String>);

#[async_trait]
impl LanguageModelService for CannedModel {
    async fn ask(&self, _: ModelKind, _: &str, _: &str, _: bool) -> PortResult<String> {
        self.0
            .clone()
            .ok_or_else(|| PortError::Unexpected("model offline".to_string()))
    }
}

pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn new(reply: Option<&str>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = Arc::new(AppState::new(Adapters {
            chats: store.clone(),
            presence: store.clone(),
            profiles: store.clone(),
            identity: store.clone(),
            llm: Arc::new(CannedModel(reply.map(str::to_string))),
        }));
        Self { store, state }
    }

    /// Registers a user with a live session and returns it with its cookie.
    pub async fn login(&self, role: Role, is_verified: bool) -> (SessionUser, String) {
        let user = SessionUser {
            user_id: Uuid::new_v4(),
            role,
            is_verified,
        };
        let credential = Uuid::new_v4().to_string();
        self.store.add_session(&credential, user.clone()).await;
        (user, format!("session={}", credential))
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, cookie: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
