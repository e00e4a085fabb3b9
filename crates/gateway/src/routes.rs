//! HTTP routing and the middleware stack

use axum::{
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::handlers;
use crate::middleware::{auth, metrics::track_metrics, rate_limit::rate_limit_middleware};
use crate::AppState;

/// Requests running past `timeout` are answered with 408
pub fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Lesson API, keyed by the shared API secret
    let mut api_routes = Router::new()
        .route("/livekit/join", post(handlers::livekit::join))
        .route("/lessons/{id}", get(handlers::lessons::detail))
        .route("/lessons/{id}/leave", post(handlers::lessons::leave))
        .route("/lessons/{id}/end", post(handlers::lessons::end))
        .route_layer(from_fn_with_state(state.clone(), auth::require_api_key));

    // Outermost, so floods are shed before authentication work
    if let Some(limiter) = state.limiter.clone() {
        api_routes = api_routes.route_layer(from_fn_with_state(limiter, rate_limit_middleware));
    }

    let admin_routes = Router::new()
        .route("/summary", get(handlers::admin::summary))
        .route_layer(from_fn_with_state(state.clone(), auth::require_admin));

    Router::new()
        .route("/healthz", get(handlers::health::healthz))
        .nest("/api/v1", api_routes)
        .nest("/api/admin", admin_routes)
        .layer(from_fn(track_metrics))
        .layer(timeout_layer(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::rate_limit::create_rate_limiter;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use classroom_common::config::AppConfig;
    use classroom_common::db::MemoryStore;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const API_KEY: &str = "test-api-key";
    const TEACHER_KEY: &str = "teach";
    // base64("admin:secret")
    const ADMIN_BASIC: &str = "Basic YWRtaW46c2VjcmV0";

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.api_key_secret = API_KEY.into();
        config.auth.teacher_key = TEACHER_KEY.into();
        config.auth.admin_username = "admin".into();
        config.auth.admin_password = "secret".into();
        config.livekit.api_secret = "0123456789abcdef0123456789abcdef".into();
        config.rate_limit.enabled = false;
        config
    }

    fn app_with(config: AppConfig) -> Router {
        create_router(AppState::new(config, Arc::new(MemoryStore::new())))
    }

    fn app() -> Router {
        app_with(config())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::AUTHORIZATION, API_KEY)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::HOST, "school.example:3010")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with_auth(uri: &str, auth: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn join_teacher(app: &Router, room: &str, name: &str) -> i64 {
        let (status, body) = send(
            app,
            post_json(
                "/api/v1/livekit/join",
                json!({"room": room, "name": name, "role": "teacher", "teacherKey": TEACHER_KEY}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["lesson_id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let slow = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    "late"
                }),
            )
            .layer(timeout_layer(Duration::from_millis(10)));

        let response = slow
            .oneshot(Request::builder().uri("/slow").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_healthz() {
        let response = app()
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_api_requires_key() {
        let app = app();

        let mut request = post_json("/api/v1/livekit/join", json!({"room": "math101", "name": "Bob"}));
        request.headers_mut().remove(header::AUTHORIZATION);
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (status, _) = send(&app, get_with_auth("/api/v1/lessons/1", "Bearer test-api-key")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_teacher_then_student_join() {
        let app = app();

        let (status, teacher) = send(
            &app,
            post_json(
                "/api/v1/livekit/join",
                json!({"room": "math101", "name": "Alice", "role": "teacher", "teacherKey": TEACHER_KEY}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(teacher["role"], "teacher");
        assert_eq!(teacher["room"], "math101");
        assert_eq!(teacher["wsUrl"], "ws://127.0.0.1:7880");
        assert_eq!(teacher["token"].as_str().unwrap().split('.').count(), 3);

        let (status, student) = send(
            &app,
            post_json("/api/v1/livekit/join", json!({"room": "math101", "name": "Bob"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(student["role"], "student");
        assert_eq!(student["lesson_id"], teacher["lesson_id"]);
    }

    #[tokio::test]
    async fn test_student_without_lesson() {
        let (status, body) = send(
            &app(),
            post_json("/api/v1/livekit/join", json!({"room": "science202", "name": "Carol", "role": "student"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "NO_ACTIVE_LESSON");
    }

    #[tokio::test]
    async fn test_join_rejects_bad_bodies() {
        let app = app();

        let mut request = post_json("/api/v1/livekit/join", json!({}));
        *request.body_mut() = Body::from("{not json");
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_JSON");

        let (status, body) = send(
            &app,
            post_json("/api/v1/livekit/join", json!({"room": "math101", "name": " "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");

        let (status, body) = send(
            &app,
            post_json("/api/v1/livekit/join", json!({"room": "r".repeat(200), "name": "Bob"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_null_fields_read_as_empty() {
        let app = app();
        let lesson_id = join_teacher(&app, "math101", "Alice").await;

        let (status, body) = send(
            &app,
            post_json("/api/v1/livekit/join", json!({"room": "math101", "name": "Bob", "role": null})),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["role"], "student");
        assert_eq!(body["lesson_id"], lesson_id);

        let (status, body) = send(
            &app,
            post_json("/api/v1/livekit/join", json!({"room": null, "name": "Bob"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");

        let (status, body) = send(
            &app,
            post_json("/api/v1/livekit/join", json!({"room": "math101", "name": null, "role": "student"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");

        let leave_uri = format!("/api/v1/lessons/{}/leave", lesson_id);
        let (status, body) = send(&app, post_json(&leave_uri, json!({"name": null}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_ws_url_falls_back_to_host_header() {
        let mut config = config();
        config.livekit.public_host = String::new();
        config.livekit.secure = true;
        let app = app_with(config);

        let (status, body) = send(
            &app,
            post_json(
                "/api/v1/livekit/join",
                json!({"room": "math101", "name": "Alice", "role": "teacher", "teacherKey": TEACHER_KEY}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["wsUrl"], "wss://school.example:7880");
    }

    #[tokio::test]
    async fn test_end_lesson_twice() {
        let app = app();
        let lesson_id = join_teacher(&app, "math101", "Alice").await;
        let uri = format!("/api/v1/lessons/{}/end", lesson_id);

        let (status, body) = send(&app, post_json(&uri, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"lesson_id": lesson_id, "status": "ended"}));

        let (status, body) = send(&app, post_json(&uri, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "already_ended");

        let (status, body) = send(&app, post_json("/api/v1/lessons/999/end", json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "LESSON_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_leave_and_detail() {
        let app = app();
        let lesson_id = join_teacher(&app, "math101", "Alice").await;
        send(&app, post_json("/api/v1/livekit/join", json!({"room": "math101", "name": "Bob"}))).await;

        let leave_uri = format!("/api/v1/lessons/{}/leave", lesson_id);
        let (status, body) = send(&app, post_json(&leave_uri, json!({"name": "Bob"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["left"], true);
        assert_eq!(body["lesson_ended"], false);

        let (_, body) = send(&app, post_json(&leave_uri, json!({"name": "Bob"}))).await;
        assert_eq!(body["left"], false);

        let (status, detail) = send(&app, get_with_auth(&format!("/api/v1/lessons/{}", lesson_id), API_KEY)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(detail["room"], "math101");
        assert_eq!(detail["teacher"], "Alice");
        assert_eq!(detail["active"], true);

        let participants = detail["participants"].as_array().unwrap();
        assert_eq!(participants.len(), 2);
        let bob = participants.iter().find(|p| p["name"] == "Bob").unwrap();
        assert_eq!(bob["role"], "student");
        assert!(bob["left_at"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_lesson_id() {
        let (status, body) = send(&app(), get_with_auth("/api/v1/lessons/abc", API_KEY)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_admin_summary_requires_basic_auth() {
        let app = app();
        join_teacher(&app, "math101", "Alice").await;

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/admin/summary").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

        let (status, _) = send(&app, get_with_auth("/api/admin/summary", "Basic YWRtaW46d3Jvbmc=")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, get_with_auth("/api/admin/summary", ADMIN_BASIC)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_lessons"], 1);
        assert_eq!(body["teachers"][0]["teacher"], "Alice");
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mut state = AppState::new(config(), Arc::new(MemoryStore::new()));
        state.limiter = Some(create_rate_limiter(1, 1));
        let app = create_router(state);

        let (status, _) = send(&app, get_with_auth("/api/v1/lessons/1", API_KEY)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, get_with_auth("/api/v1/lessons/1", API_KEY)).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
    }
}
