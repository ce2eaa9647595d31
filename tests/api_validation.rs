//! Router-level checks that never reach the database: authentication,
//! permission gating and request validation.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use diesel::{
    r2d2::{ConnectionManager, Pool},
    PgConnection,
};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use crmserver::core::config::AppConfig;
use crmserver::core::middleware::TokenClaims;
use crmserver::{build_router, AppState};

const SECRET: &str = "integration-secret";

fn app() -> Router {
    let manager = ConnectionManager::<PgConnection>::new("postgres://nobody@127.0.0.1:1/none");
    let pool = Pool::builder()
        .min_idle(Some(0))
        .connection_timeout(Duration::from_millis(200))
        .build_unchecked(manager);

    let mut config = AppConfig::default();
    config.auth.jwt_secret = SECRET.to_string();
    build_router(Arc::new(AppState::new(pool, config)))
}

fn token(role: &str, permissions: &[&str]) -> String {
    let claims = TokenClaims {
        sub: Uuid::new_v4().to_string(),
        role: role.to_string(),
        company_id: Uuid::new_v4(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn request(method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(req: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (status, body) = send(request(Method::GET, "/api/v1/activities", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_unauthorized() {
    let claims = TokenClaims {
        sub: Uuid::new_v4().to_string(),
        role: "ADMIN".into(),
        company_id: Uuid::new_v4(),
        permissions: vec![],
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    let forged = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"someone-else"),
    )
    .unwrap();

    let (status, _) = send(request(Method::GET, "/api/v1/tasks", Some(&forged), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deals_require_proposals_permission() {
    let t = token("USER", &[]);
    let (status, body) = send(request(Method::GET, "/api/v1/deals", Some(&t), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], json!(false));

    let (status, _) = send(request(Method::GET, "/api/v1/offers", Some(&t), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_deal_timeline_requires_description() {
    let t = token("USER", &["proposals"]);
    let uri = format!("/api/v1/deals/{}/activities", Uuid::new_v4());
    let (status, _) = send(request(
        Method::POST,
        &uri,
        Some(&t),
        Some(json!({"type": "call"})),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_activity_type_without_description_is_rejected() {
    let t = token("USER", &[]);
    let (status, body) = send(request(
        Method::POST,
        "/api/v1/activities",
        Some(&t),
        Some(json!({
            "type": "fax",
            "reference_type": "deal",
            "reference_id": Uuid::new_v4(),
        })),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .starts_with("Invalid activity type: fax"));
}

#[tokio::test]
async fn test_strict_policy_rejects_unknown_type_with_description() {
    let t = token("USER", &[]);
    let (status, _) = send(request(
        Method::POST,
        "/api/v1/activities?policy=strict",
        Some(&t),
        Some(json!({
            "type": "fax",
            "description": "sent the contract",
            "reference_type": "deal",
            "reference_id": Uuid::new_v4(),
        })),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_task_create_requires_fields() {
    let t = token("USER", &[]);
    let (status, body) = send(request(
        Method::POST,
        "/api/v1/tasks",
        Some(&t),
        Some(json!({"title": "Call back"})),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_task_update_without_fields_is_rejected() {
    let t = token("USER", &[]);
    let uri = format!("/api/v1/tasks/{}", Uuid::new_v4());
    let (status, _) = send(request(Method::PUT, &uri, Some(&t), Some(json!({})))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_meeting_create_with_inverted_window_is_rejected() {
    let t = token("USER", &[]);
    let (status, body) = send(request(
        Method::POST,
        "/api/v1/meetings",
        Some(&t),
        Some(json!({
            "title": "Demo",
            "meeting_date": "2026-06-01",
            "start_time": "15:00",
            "end_time": "14:30",
            "assigned_to": Uuid::new_v4(),
        })),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("End time must be after start time"));
}

#[tokio::test]
async fn test_meeting_create_missing_fields_is_rejected() {
    let t = token("USER", &[]);
    let (status, _) = send(request(
        Method::POST,
        "/api/v1/meetings",
        Some(&t),
        Some(json!({"title": "Demo", "meeting_date": "2026-06-01"})),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_meeting_update_with_equal_times_is_rejected() {
    let t = token("ADMIN", &[]);
    let uri = format!("/api/v1/meetings/{}", Uuid::new_v4());
    let (status, _) = send(request(
        Method::PUT,
        &uri,
        Some(&t),
        Some(json!({"start_time": "10:00", "end_time": "10:00"})),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_custom_field_requires_label_type_and_module() {
    let t = token("USER", &[]);
    let (status, _) = send(request(
        Method::POST,
        "/api/v1/custom-fields",
        Some(&t),
        Some(json!({"label": "Budget"})),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let (status, body) = send(request(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["service"], json!("crmserver"));
    assert_eq!(body["database"], json!(false));
}
