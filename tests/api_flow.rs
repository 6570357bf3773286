/// End-to-end tests driving the HTTP router
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use mindwell::{
    clock::SystemClock,
    db::{create_memory_pool, run_migrations},
    error::UNAUTHENTICATED_MESSAGE,
    server::build_router,
    AppContext, ServerConfig,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use tower::ServiceExt;

const SECRET: &str = "integration-secret-key-0123456789abcdef";

struct TestApp {
    router: Router,
    ctx: AppContext,
    next_client: AtomicU32,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl TestApp {
    async fn new() -> Self {
        let pool = create_memory_pool().await.unwrap();
        run_migrations(&pool).await.unwrap();

        let mut config = ServerConfig::for_testing(SECRET);
        config.bootstrap.admin_username = Some("root".to_string());
        config.bootstrap.admin_password = Some("rootpass".to_string());

        let ctx = AppContext::with_pool(config, pool, Arc::new(SystemClock));
        ctx.bootstrap_admin().await.unwrap();

        Self {
            router: build_router(ctx.clone()),
            ctx,
            next_client: AtomicU32::new(1),
        }
    }

    /// A fresh client address so rate limits do not leak between calls
    fn fresh_addr(&self) -> String {
        format!("198.51.100.{}", self.next_client.fetch_add(1, Ordering::SeqCst))
    }

    async fn send_from(
        &self,
        addr: &str,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", addr)
            .header(header::USER_AGENT, "api-flow-test");

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

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let addr = self.fresh_addr();
        self.send_from(&addr, method, uri, token, body).await
    }

    async fn register(&self, username: &str, role: &str) -> (i64, String) {
        let res = self
            .send(
                Method::POST,
                "/api/v1/register",
                None,
                Some(json!({"username": username, "password": "secret123", "role": role})),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);

        (
            res.body["user"]["id"].as_i64().unwrap(),
            res.body["token"].as_str().unwrap().to_string(),
        )
    }

    async fn login(&self, username: &str, password: &str) -> TestResponse {
        self.send(
            Method::POST,
            "/api/v1/login",
            None,
            Some(json!({"username": username, "password": password})),
        )
        .await
    }
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let res = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "healthy");
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let app = TestApp::new().await;
    let (id, _) = app.register("alice", "").await;

    let login = app.login("alice", "secret123").await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["user"]["role"], "student");
    let token = login.body["token"].as_str().unwrap().to_string();

    let claims = app.ctx.token_issuer.validate(&token).unwrap();
    assert_eq!(claims.account_id().unwrap(), id);

    let profile = app
        .send(Method::GET, "/api/v1/users/profile", Some(&token), None)
        .await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.body["username"], "alice");
    assert!(profile.body.get("password_hash").is_none());
    assert_eq!(profile.body["profile"]["kind"], "student");

    let session = app.ctx.sessions.lookup_active(&token).await.unwrap();
    assert_eq!(session.client_agent, "api-flow-test");
}

#[tokio::test]
async fn test_missing_and_bad_credentials_are_uniform() {
    let app = TestApp::new().await;

    let missing = app
        .send(Method::GET, "/api/v1/users/profile", None, None)
        .await;
    let garbage = app
        .send(Method::GET, "/api/v1/users/profile", Some("garbage"), None)
        .await;

    for res in [missing, garbage] {
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
        assert_eq!(res.body["message"], UNAUTHENTICATED_MESSAGE);
    }
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let app = TestApp::new().await;
    let (_, token) = app.register("alice", "student").await;

    let res = app.send(Method::POST, "/api/v1/logout", Some(&token), None).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app
        .send(Method::GET, "/api/v1/users/profile", Some(&token), None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = TestApp::new().await;
    app.register("alice", "student").await;
    let before = app.ctx.account_manager.count_accounts().await.unwrap();

    let res = app
        .send(
            Method::POST,
            "/api/v1/register",
            None,
            Some(json!({"username": "alice", "password": "another1"})),
        )
        .await;

    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(app.ctx.account_manager.count_accounts().await.unwrap(), before);
}

#[tokio::test]
async fn test_multibyte_password_over_bcrypt_limit_is_bad_request() {
    let app = TestApp::new().await;

    let res = app
        .send(
            Method::POST,
            "/api/v1/register",
            None,
            Some(json!({"username": "wen", "password": "心理健康".repeat(7)})),
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.ctx.account_manager.count_accounts().await.unwrap(), 1);
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = TestApp::new().await;
    let (student_id, student_token) = app.register("alice", "student").await;

    let res = app
        .send(Method::GET, "/api/v1/users", Some(&student_token), None)
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let admin = app.login("root", "rootpass").await;
    let admin_token = admin.body["token"].as_str().unwrap().to_string();

    let res = app
        .send(Method::GET, "/api/v1/users?role=student", Some(&admin_token), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["accounts"].as_array().unwrap().len(), 1);

    let res = app
        .send(
            Method::PUT,
            &format!("/api/v1/users/{}/status", student_id),
            Some(&admin_token),
            Some(json!({"status": "blocked"})),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "blocked");

    let res = app
        .send(Method::GET, "/api/v1/users/profile", Some(&student_token), None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.login("alice", "secret123").await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_is_rate_limited_per_client() {
    let app = TestApp::new().await;
    let body = json!({"username": "nobody", "password": "whatever"});

    for _ in 0..3 {
        let res = app
            .send_from("203.0.113.7", Method::POST, "/api/v1/login", None, Some(body.clone()))
            .await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    }

    let res = app
        .send_from("203.0.113.7", Method::POST, "/api/v1/login", None, Some(body.clone()))
        .await;
    assert_eq!(res.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers.get(header::RETRY_AFTER).is_some());

    let res = app
        .send_from("203.0.113.8", Method::POST, "/api/v1/login", None, Some(body))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_appointment_lifecycle() {
    let app = TestApp::new().await;
    let (_, student) = app.register("stu", "student").await;
    let (counselor_id, counselor) = app.register("coun", "counselor").await;
    let start = chrono::Utc::now() + chrono::Duration::days(2);

    let res = app
        .send(Method::GET, "/api/v1/counselors", Some(&student), None)
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["counselors"][0]["id"], counselor_id);

    let booking = json!({
        "counselor_id": counselor_id,
        "start_time": start,
        "duration_minutes": 50,
        "kind": "individual",
        "topic": "sleep problems",
    });

    let res = app
        .send(Method::POST, "/api/v1/appointments", Some(&counselor), Some(booking.clone()))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .send(Method::POST, "/api/v1/appointments", Some(&student), Some(booking))
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert_eq!(res.body["status"], "pending");
    let id = res.body["id"].as_i64().unwrap();
    let uri = format!("/api/v1/appointments/{}", id);

    let res = app
        .send(Method::PUT, &uri, Some(&student), Some(json!({"status": "confirmed"})))
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .send(Method::PUT, &uri, Some(&counselor), Some(json!({"status": "confirmed"})))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .send(
            Method::POST,
            &format!("{}/records", uri),
            Some(&student),
            Some(json!({"content": "notes"})),
        )
        .await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .send(
            Method::POST,
            &format!("{}/records", uri),
            Some(&counselor),
            Some(json!({"content": "private notes", "is_private": true})),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = app
        .send(
            Method::PUT,
            &uri,
            Some(&counselor),
            Some(json!({"status": "completed", "remark": "done"})),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["remark"], "done");

    let res = app
        .send(Method::PUT, &uri, Some(&counselor), Some(json!({"status": "canceled"})))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);

    let res = app.send(Method::GET, &uri, Some(&student), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "completed");
    assert!(res.body["records"].as_array().unwrap().is_empty());

    let res = app.send(Method::GET, &uri, Some(&counselor), None).await;
    assert_eq!(res.body["records"].as_array().unwrap().len(), 1);

    let res = app
        .send(
            Method::GET,
            "/api/v1/appointments?status=completed",
            Some(&student),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["appointments"].as_array().unwrap().len(), 1);
}
