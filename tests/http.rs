//! End-to-end tests of the HTML routes against an in-memory database.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pastelock::commands::serve::router;
use pastelock::config::Config;
use pastelock::db::Database;
use pastelock::{slug, App};
use tower::ServiceExt;
use urlencoding::encode;

struct TestResponse {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

async fn test_app_with_limit(max_content_size: usize) -> Router {
    let config = Config::parse(&format!(
        r#"
        base_url = "http://paste.test"
        port = 0

        [database]
        url = "sqlite::memory:"

        [limits]
        max_content_size = {max_content_size}
        "#
    ))
    .expect("config");
    let database = Database::in_memory().await.expect("database");
    router(App { config, database })
}

async fn test_app() -> Router {
    test_app_with_limit(1024 * 1024).await
}

async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|value| value.to_str().expect("ascii location").to_owned());
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .expect("body");
    TestResponse {
        status,
        location,
        body: String::from_utf8(bytes.to_vec()).expect("utf-8 body"),
    }
}

async fn get(app: &Router, uri: &str) -> TestResponse {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    send(app, request).await
}

async fn post_form(app: &Router, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
    let body = fields
        .iter()
        .map(|(key, value)| format!("{}={}", encode(key), encode(value)))
        .collect::<Vec<_>>()
        .join("&");
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .expect("request");
    send(app, request).await
}

#[tokio::test]
async fn index_shows_the_form() {
    let app = test_app().await;

    let response = get(&app, "/").await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.contains("<form method=\"post\" action=\"/\">"));
    assert!(response.body.contains("name=\"custom_slug\""));
}

#[tokio::test]
async fn paste_lifecycle() {
    let app = test_app().await;

    let created = post_form(
        &app,
        "/",
        &[
            ("content", "# Hello"),
            ("password", "secret"),
            ("custom_slug", "hello"),
        ],
    )
    .await;
    assert_eq!(created.status, StatusCode::SEE_OTHER);
    assert_eq!(created.location.as_deref(), Some("/hello"));

    let viewed = get(&app, "/hello").await;
    assert_eq!(viewed.status, StatusCode::OK);
    assert!(viewed.body.contains("<h1>Hello</h1>"), "{}", viewed.body);
    assert!(viewed.body.contains("http://paste.test/hello"));
    assert!(!viewed.body.contains("edited"));

    let form = get(&app, "/hello/edit").await;
    assert_eq!(form.status, StatusCode::OK);
    assert!(form.body.contains("# Hello"));

    let rejected = post_form(
        &app,
        "/hello/edit",
        &[("content", "# Bye"), ("password", "wrong")],
    )
    .await;
    assert_eq!(rejected.status, StatusCode::FORBIDDEN);
    assert!(rejected.body.contains("incorrect password"));
    // the attempted content is kept in the form
    assert!(rejected.body.contains("# Bye"));
    assert!(get(&app, "/hello").await.body.contains("<h1>Hello</h1>"));

    let edited = post_form(
        &app,
        "/hello/edit",
        &[("content", "# Bye"), ("password", "secret")],
    )
    .await;
    assert_eq!(edited.status, StatusCode::SEE_OTHER);
    assert_eq!(edited.location.as_deref(), Some("/hello"));

    let viewed = get(&app, "/hello").await;
    assert!(viewed.body.contains("<h1>Bye</h1>"), "{}", viewed.body);
    assert!(viewed.body.contains("edited"));
}

#[tokio::test]
async fn random_slug_is_assigned_without_custom_slug() {
    let app = test_app().await;

    let created = post_form(
        &app,
        "/",
        &[("content", "text"), ("password", "secret"), ("custom_slug", "")],
    )
    .await;
    assert_eq!(created.status, StatusCode::SEE_OTHER);

    let location = created.location.expect("location header");
    let slug = location.strip_prefix('/').expect("absolute path");
    assert!(slug::validate(slug), "{slug}");
    assert_eq!(get(&app, &location).await.status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_slug_is_rejected() {
    let app = test_app().await;

    let response = post_form(
        &app,
        "/",
        &[
            ("content", "keep me"),
            ("password", "secret"),
            ("custom_slug", "my post!"),
        ],
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.contains("custom slug may only contain"));
    assert!(response.body.contains("keep me"));
}

#[tokio::test]
async fn taken_slug_is_rejected() {
    let app = test_app().await;
    let fields = [
        ("content", "first"),
        ("password", "secret"),
        ("custom_slug", "abc"),
    ];

    assert_eq!(post_form(&app, "/", &fields).await.status, StatusCode::SEE_OTHER);

    let second = post_form(&app, "/", &fields).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
    assert!(second.body.contains("already taken"));
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let app = test_app().await;

    let no_content = post_form(&app, "/", &[("password", "secret")]).await;
    assert_eq!(no_content.status, StatusCode::BAD_REQUEST);
    assert!(no_content.body.contains("content is required"));

    let no_password = post_form(&app, "/", &[("content", "text")]).await;
    assert_eq!(no_password.status, StatusCode::BAD_REQUEST);
    assert!(no_password.body.contains("password is required"));
}

#[tokio::test]
async fn empty_edit_keeps_stored_content() {
    let app = test_app().await;
    post_form(
        &app,
        "/",
        &[
            ("content", "original"),
            ("password", "secret"),
            ("custom_slug", "abc"),
        ],
    )
    .await;

    let response = post_form(&app, "/abc/edit", &[("content", ""), ("password", "secret")]).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.contains("content is required"));
    assert!(response.body.contains("original"));
}

#[tokio::test]
async fn unknown_pastes_get_a_generic_not_found() {
    let app = test_app().await;

    for uri in ["/does-not-exist", "/does-not-exist/edit", "/a/b/c"] {
        let response = get(&app, uri).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{uri}");
        assert!(response.body.contains("Not found"));
        assert!(!response.body.contains("does-not-exist"));
    }

    let response = post_form(
        &app,
        "/does-not-exist/edit",
        &[("content", "x"), ("password", "secret")],
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scripts_never_reach_the_page() {
    let app = test_app().await;
    post_form(
        &app,
        "/",
        &[
            (
                "content",
                "hi <script>alert(1)</script>\n\n<img src=x onerror=alert(2)>\n\n[x](javascript:alert(3))",
            ),
            ("password", "secret"),
            ("custom_slug", "xss"),
        ],
    )
    .await;

    let viewed = get(&app, "/xss").await;
    assert_eq!(viewed.status, StatusCode::OK);
    assert!(!viewed.body.contains("<script"), "{}", viewed.body);
    assert!(!viewed.body.contains("onerror"), "{}", viewed.body);
    assert!(!viewed.body.contains("javascript:"), "{}", viewed.body);

    // the edit form shows the raw source, escaped
    let form = get(&app, "/xss/edit").await;
    assert!(!form.body.contains("<script"));
    assert!(form.body.contains("&lt;script&gt;"));
}

#[tokio::test]
async fn oversized_bodies_are_rejected() {
    let app = test_app_with_limit(64).await;

    let content = "x".repeat(200);
    let response = post_form(&app, "/", &[("content", &content), ("password", "secret")]).await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
}
