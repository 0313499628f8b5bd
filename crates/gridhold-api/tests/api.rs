use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use gridhold_api::{AppState, AppStateInner, Environment};
use gridhold_db::Database;
use gridhold_types::events::{MapEvent, PointAction};

const SECRET: &str = "integration-secret";

fn test_app(env: Environment) -> (Router, AppState) {
    let db = Database::open_in_memory().unwrap();
    let state = AppStateInner::new(db, SECRET.into(), env);
    (gridhold_api::router(state.clone()), state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, json)
}

async fn register(app: &Router, username: &str) -> StatusCode {
    let (status, _, _) = send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": username, "password": "hunter22" })),
    )
    .await;
    status
}

async fn login(app: &Router, username: &str) -> String {
    let (status, _, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn signed_up(app: &Router, username: &str) -> String {
    assert_eq!(register(app, username).await, StatusCode::CREATED);
    login(app, username).await
}

async fn save_point(app: &Router, token: &str, x: i64, y: i64) {
    let (status, _, _) = send(
        app,
        Method::POST,
        "/api/base-points/mine",
        Some(token),
        Some(json!({ "x": x, "y": y })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

fn coords(body: &Value) -> Vec<(i64, i64)> {
    let mut out: Vec<(i64, i64)> = body["basePoints"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| (p["x"].as_i64().unwrap(), p["y"].as_i64().unwrap()))
        .collect();
    out.sort();
    out
}

#[tokio::test]
async fn register_returns_user_and_rejects_duplicates() {
    let (app, _) = test_app(Environment::Development);

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": "alice", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"]["id"].is_string());

    assert_eq!(register(&app, "alice").await, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn register_with_missing_fields_is_400() {
    let (app, _) = test_app(Environment::Development);
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn login_sets_cookie_that_authenticates() {
    let (app, _) = test_app(Environment::Development);
    register(&app, "alice").await;

    let (status, headers, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");

    let cookie = headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("auth_token="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=604800"));
    let pair = cookie.split(';').next().unwrap().to_string();

    let request = Request::builder()
        .uri("/api/game/status")
        .header(header::COOKIE, pair)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_with_wrong_password_is_401() {
    let (app, _) = test_app(Environment::Development);
    register(&app, "alice").await;

    let (status, headers, _) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.get(header::SET_COOKIE).is_none());

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "nobody", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn verify_reports_token_validity() {
    let (app, _) = test_app(Environment::Development);
    let token = signed_up(&app, "alice").await;

    let (status, _, body) = send(&app, Method::GET, "/api/auth/verify", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["user"]["username"], "alice");

    let (status, _, body) = send(&app, Method::GET, "/api/auth/verify", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "valid": false }));
}

#[tokio::test]
async fn status_without_token_is_401_and_leaks_nothing() {
    let (app, _) = test_app(Environment::Development);
    let token = signed_up(&app, "alice").await;
    send(&app, Method::POST, "/api/game/join", Some(&token), None).await;

    let (status, _, body) = send(&app, Method::GET, "/api/game/status", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 3);
    assert!(body.get("homeX").is_none());
    assert!(body.get("gameJoined").is_none());
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn expired_token_is_401() {
    let (app, _) = test_app(Environment::Development);
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = gridhold_types::api::Claims {
        sub: uuid::Uuid::new_v4(),
        username: "alice".into(),
        role: None,
        iat: now - 10 * 24 * 3600,
        exp: now - 3 * 24 * 3600,
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let (status, _, body) = send(&app, Method::GET, "/api/game/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Authentication token expired");
}

#[tokio::test]
async fn join_is_idempotent_and_leave_keeps_the_base() {
    let (app, _) = test_app(Environment::Development);
    let token = signed_up(&app, "alice").await;

    let (_, _, body) = send(&app, Method::GET, "/api/game/status", Some(&token), None).await;
    assert_eq!(body["gameJoined"], false);

    let (status, _, first) = send(&app, Method::POST, "/api/game/join", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    assert_eq!(first["gameJoined"], true);
    assert_eq!((first["homeX"].as_i64(), first["homeY"].as_i64()), (Some(0), Some(0)));

    let (status, _, second) = send(&app, Method::POST, "/api/game/join", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["success"], false);
    assert_eq!(second["homeX"], first["homeX"]);
    assert_eq!(second["homeY"], first["homeY"]);

    let (status, _, left) = send(&app, Method::POST, "/api/game/leave", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(left["success"], true);

    let (_, _, status_body) = send(&app, Method::GET, "/api/game/status", Some(&token), None).await;
    assert_eq!(status_body["gameJoined"], false);

    let (_, _, mine) = send(&app, Method::GET, "/api/base-points/mine", Some(&token), None).await;
    assert_eq!(coords(&mine), vec![(0, 0)]);

    // Re-joining reuses the surviving point
    let (_, _, again) = send(&app, Method::POST, "/api/game/join", Some(&token), None).await;
    assert_eq!(again["success"], true);
    let (_, _, mine) = send(&app, Method::GET, "/api/base-points/mine", Some(&token), None).await;
    assert_eq!(coords(&mine), vec![(0, 0)]);
}

#[tokio::test]
async fn join_event_counts_only_new_points() {
    let (app, state) = test_app(Environment::Development);
    let token = signed_up(&app, "alice").await;
    let mut events = state.events.subscribe();

    send(&app, Method::POST, "/api/game/join", Some(&token), None).await;
    send(&app, Method::POST, "/api/game/leave", Some(&token), None).await;
    send(&app, Method::POST, "/api/game/join", Some(&token), None).await;

    let counts: Vec<usize> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|event| match event {
            MapEvent::BasePointsChanged { action: PointAction::Joined, count, .. } => Some(count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![1, 0]);
}

#[tokio::test]
async fn lowercase_bearer_scheme_is_accepted() {
    let (app, _) = test_app(Environment::Development);
    let token = signed_up(&app, "alice").await;

    let request = Request::builder()
        .uri("/api/game/status")
        .header(header::AUTHORIZATION, format!("bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn base_points_are_filtered_to_view_box() {
    let (app, _) = test_app(Environment::Development);
    let token = signed_up(&app, "alice").await;
    for (x, y) in [(0, 0), (25, 0), (-20, -20)] {
        save_point(&app, &token, x, y).await;
    }

    let (status, _, body) = send(&app, Method::GET, "/api/base-points?x=0&y=0", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(coords(&body), vec![(-20, -20), (0, 0)]);

    let (_, _, all) = send(&app, Method::GET, "/api/base-points", None, None).await;
    assert_eq!(coords(&all).len(), 3);

    let (status, _, _) = send(&app, Method::GET, "/api/base-points?x=abc&y=0", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn half_given_origin_is_400() {
    let (app, _) = test_app(Environment::Development);
    let token = signed_up(&app, "alice").await;
    save_point(&app, &token, 0, 0).await;
    save_point(&app, &token, 500, 500).await;

    for uri in ["/api/base-points?x=0", "/api/base-points?y=0"] {
        let (status, _, body) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["success"], false);
        assert!(body.get("basePoints").is_none());
    }
}

#[tokio::test]
async fn deleting_a_point_is_scoped_to_owner() {
    let (app, _) = test_app(Environment::Development);
    let alice = signed_up(&app, "alice").await;
    let bob = signed_up(&app, "bob").await;
    save_point(&app, &alice, 3, 3).await;

    let (_, _, body) = send(
        &app,
        Method::DELETE,
        "/api/base-points/mine",
        Some(&bob),
        Some(json!({ "x": 3, "y": 3 })),
    )
    .await;
    assert_eq!(body["deleted"], false);

    let (_, _, body) = send(
        &app,
        Method::DELETE,
        "/api/base-points/mine",
        Some(&alice),
        Some(json!({ "x": 3, "y": 3 })),
    )
    .await;
    assert_eq!(body["deleted"], true);
}

#[tokio::test]
async fn cleanup_with_slope_one_removes_the_diagonal() {
    let (app, _) = test_app(Environment::Development);
    let token = signed_up(&app, "alice").await;
    for (x, y) in [(0, 0), (4, 4), (-2, -2), (1, 0), (0, 3)] {
        save_point(&app, &token, x, y).await;
    }

    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/cleanup-lines",
        Some(&token),
        Some(json!({ "slopes": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["deletedCount"], 3);
    assert_eq!(body["slopesUsed"], json!([1]));

    let (_, _, left) = send(&app, Method::GET, "/api/base-points", None, None).await;
    assert_eq!(coords(&left), vec![(0, 3), (1, 0)]);
}

#[tokio::test]
async fn cleanup_without_body_draws_slopes_including_one() {
    let (app, _) = test_app(Environment::Development);
    let token = signed_up(&app, "alice").await;

    let (status, _, body) = send(&app, Method::POST, "/api/cleanup-lines", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let slopes = body["slopesUsed"].as_array().unwrap();
    assert_eq!(slopes.len(), 3);
    assert_eq!(slopes[0], 1);
    assert_eq!(body["deletedCount"], 0);
}

#[tokio::test]
async fn admin_routes_are_forbidden_in_production() {
    let (app, state) = test_app(Environment::Production);
    let token = signed_up(&app, "alice").await;

    let (status, _, body) = send(&app, Method::POST, "/api/cleanup-lines", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _, _) = send(&app, Method::POST, "/api/base-points/reset", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Promote and log in again so the token carries the role
    assert!(state.db.set_user_role("alice", "admin").unwrap());
    let admin_token = login(&app, "alice").await;

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/cleanup-lines",
        Some(&admin_token),
        Some(json!({ "slopes": [2], "anchorX": 1, "anchorY": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reset_clears_own_points_in_development() {
    let (app, _) = test_app(Environment::Development);
    let alice = signed_up(&app, "alice").await;
    let bob = signed_up(&app, "bob").await;
    save_point(&app, &alice, 1, 2).await;
    save_point(&app, &alice, 2, 1).await;
    save_point(&app, &bob, 9, 9).await;

    let (status, _, body) = send(&app, Method::POST, "/api/base-points/reset", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deletedCount"], 2);

    let (_, _, left) = send(&app, Method::GET, "/api/base-points", None, None).await;
    assert_eq!(coords(&left), vec![(9, 9)]);
}

#[tokio::test]
async fn deleting_account_removes_points() {
    let (app, state) = test_app(Environment::Development);
    let token = signed_up(&app, "alice").await;
    send(&app, Method::POST, "/api/game/join", Some(&token), None).await;
    save_point(&app, &token, 5, 5).await;
    let mut events = state.events.subscribe();

    let (status, _, _) = send(&app, Method::DELETE, "/api/auth/account", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    match events.try_recv().unwrap() {
        MapEvent::BasePointsChanged { action, count, .. } => {
            assert_eq!(action, PointAction::AccountDeleted);
            assert_eq!(count, 2);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let (_, _, left) = send(&app, Method::GET, "/api/base-points", None, None).await;
    assert!(coords(&left).is_empty());

    let (_, _, verify) = send(&app, Method::GET, "/api/auth/verify", Some(&token), None).await;
    assert_eq!(verify["valid"], false);

    let (status, _, _) = send(&app, Method::POST, "/api/game/join", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn items_crud() {
    let (app, _) = test_app(Environment::Development);
    let token = signed_up(&app, "alice").await;

    let (status, _, created) = send(
        &app,
        Method::POST,
        "/api/items",
        Some(&token),
        Some(json!({ "name": "lantern", "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["item"]["id"].as_i64().unwrap();

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/items",
        Some(&token),
        Some(json!({ "name": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, _, list) = send(&app, Method::GET, "/api/items", Some(&token), None).await;
    assert_eq!(list["items"].as_array().unwrap().len(), 1);
    assert_eq!(list["items"][0]["name"], "lantern");

    let uri = format!("/api/items/{}", id);
    let (status, _, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, body) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn event_stream_greets_and_unregisters_on_disconnect() {
    let (app, state) = test_app(Environment::Development);
    let token = signed_up(&app, "alice").await;

    let request = Request::builder()
        .uri("/api/events")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE].to_str().unwrap(),
        "text/event-stream"
    );
    assert_eq!(state.events.client_count(), 1);

    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(text.contains("event: hello"));

    drop(body);
    assert_eq!(state.events.client_count(), 0);
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = test_app(Environment::Production);
    let (status, _, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
