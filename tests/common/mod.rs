//! Shared helpers for the HTTP-level tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use libsecp256k1::{PublicKey, SecretKey};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

use shacker_server::auth::crypto::{address_from_public_key, sign_personal_message};
use shacker_server::config::Config;
use shacker_server::routes;
use shacker_server::state::{AppState, Backends};
use shacker_server::store::MemoryStore;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "JWT_SECRET" => Some(TEST_SECRET.to_string()),
        "BCRYPT_COST" => Some("4".to_string()),
        "LINK_BASE_URL" => Some("http://localhost:8080/link.html".to_string()),
        _ => None,
    })
    .expect("test config")
}

pub async fn test_app() -> (Router, AppState) {
    let (app, state, _) = test_app_with_store().await;
    (app, state)
}

/// Like `test_app`, also handing back the store for direct manipulation
pub async fn test_app_with_store() -> (Router, AppState, MemoryStore) {
    let store = MemoryStore::new();
    let shared = Arc::new(store.clone());
    let backends = Backends {
        accounts: shared.clone(),
        nonces: shared,
        ..Backends::in_memory()
    };

    let state = AppState::build(&test_config(), backends)
        .await
        .expect("app state");
    let app = routes::api_routes().with_state(state.clone());
    (app, state, store)
}

/// Send a request and decode the JSON body (`Null` when empty)
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Deterministic wallet for signing test messages
pub struct TestWallet {
    secret: SecretKey,
    pub address: String,
}

impl TestWallet {
    pub fn new(seed: u8) -> Self {
        let secret = SecretKey::parse(&[seed; 32]).unwrap();
        let address = address_from_public_key(&PublicKey::from_secret_key(&secret));
        Self { secret, address }
    }

    /// Address with mixed case, the way wallets usually report it
    pub fn checksum_like_address(&self) -> String {
        format!("0x{}", self.address[2..].to_uppercase())
    }

    pub fn sign(&self, message: &str) -> String {
        sign_personal_message(&self.secret, message)
    }
}
