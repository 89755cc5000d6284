//! HTTP-level tests: envelope parsing, error body shape, and the auth flow
//! through the mounted routers.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use modelgate::auth::dev::{DevHasher, DevTokenIssuer, LogMailer};
use modelgate::auth::PasswordHasher;
use modelgate::{
    auth_routes, model_routes, AllowAll, AppState, FieldDescriptor, FieldType, MemoryStorage,
    ModelRegistry, PluginConfig, SchemaBuilder,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> Router {
    let registry = ModelRegistry::builder()
        .model(
            SchemaBuilder::new("auth", "User")
                .field(FieldDescriptor::new("username", FieldType::ShortText).max_length(150))
                .field(FieldDescriptor::new("password", FieldType::LongText))
                .field(FieldDescriptor::new("email", FieldType::Email))
                .field(FieldDescriptor::new("is_active", FieldType::Boolean).default_value(json!(false)))
                .build(),
        )
        .model(
            SchemaBuilder::new("shop", "Customer")
                .field(FieldDescriptor::new("name", FieldType::ShortText).max_length(100))
                .field(FieldDescriptor::new("email", FieldType::Email))
                .field(FieldDescriptor::new("phone_no", FieldType::ShortText).max_length(20))
                .build(),
        )
        .internal_namespace("auth")
        .build()
        .unwrap();

    let storage = MemoryStorage::new();
    storage.seed(
        "shop.Customer",
        vec![match json!({
            "id": 1,
            "name": "test_user1",
            "email": "user1@gmail.com",
            "phone_no": "123456"
        }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        }],
    );
    let hasher = DevHasher;
    storage.seed(
        "auth.User",
        vec![match json!({
            "id": 1,
            "username": "alice",
            "password": hasher.hash("secret"),
            "email": "alice@mail.com",
            "is_active": true
        }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        }],
    );

    let state = AppState {
        registry: Arc::new(registry),
        storage: Arc::new(storage),
        gate: Arc::new(AllowAll),
        config: Arc::new(PluginConfig::default()),
        hasher: Arc::new(DevHasher),
        tokens: Arc::new(DevTokenIssuer::new()),
        mailer: Arc::new(LogMailer),
    };
    Router::new()
        .merge(model_routes(state.clone()))
        .merge(auth_routes(state))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn fetch_endpoint_returns_total_and_data() {
    let app = app();
    let body = json!({
        "payload": { "variables": {
            "modelName": "customer",
            "fields": ["name", "email"],
            "filters": [{"operator": "eq", "name": "phone_no", "value": ["123456"]}]
        }}
    });
    let resp = app.oneshot(post_json("/fetch", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(
        json,
        json!({"total": 1, "data": [{"name": "test_user1", "email": "user1@gmail.com"}]})
    );
}

#[tokio::test]
async fn save_endpoint_returns_ids_and_messages() {
    let app = app();
    let body = json!({
        "payload": { "variables": {
            "modelName": "Customer",
            "id": null,
            "saveInput": [{"name": "bob", "email": "bob@mail.com", "phone_no": "012345"}]
        }}
    });
    let resp = app.oneshot(post_json("/save", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(
        json,
        json!({"data": [{"id": [2]}], "message": ["Record created successfully."]})
    );
}

#[tokio::test]
async fn errors_carry_stable_codes() {
    let app = app();
    let body = json!({
        "payload": { "variables": { "modelName": "nope", "fields": ["x"] }}
    });
    let resp = app.oneshot(post_json("/fetch", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let json = body_json(resp).await;
    assert_eq!(json["code"], json!("model_not_found"));
    assert!(json["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn unknown_envelope_keys_are_bad_requests() {
    let app = app();
    let body = json!({
        "payload": { "variables": {
            "modelName": "customer", "fields": ["name"], "bogus": 1
        }}
    });
    let resp = app.oneshot(post_json("/fetch", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["code"], json!("bad_request"));
}

#[tokio::test]
async fn login_then_read_profile() {
    let app = app();
    let resp = app
        .clone()
        .oneshot(post_json(
            "/auth/login",
            json!({"username": "alice", "password": "secret"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let token = body_json(resp).await["token"].as_str().unwrap().to_string();

    let req = Request::builder()
        .method("GET")
        .uri("/auth/profile")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_json(resp).await;
    assert_eq!(json["data"]["username"], json!("alice"));
    assert_eq!(json["data"]["email"], json!("alice@mail.com"));
}

#[tokio::test]
async fn empty_profile_patch_is_rejected() {
    let app = app();
    let resp = app
        .clone()
        .oneshot(post_json(
            "/auth/login",
            json!({"username": "alice", "password": "secret"}),
        ))
        .await
        .unwrap();
    let token = body_json(resp).await["token"].as_str().unwrap().to_string();

    let req = Request::builder()
        .method("PATCH")
        .uri("/auth/profile")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let json = body_json(resp).await;
    assert_eq!(json["code"], json!("bad_request"));
}

#[tokio::test]
async fn login_with_wrong_password_fails() {
    let app = app();
    let resp = app
        .oneshot(post_json(
            "/auth/login",
            json!({"username": "alice", "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let json = body_json(resp).await;
    assert_eq!(json["code"], json!("auth_failed"));
}
