//! HTTP-level tests for template-wrapped handlers and context processors.

use axum::{
    body::Body,
    http::{header, request::Parts, Request, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use axum_jinja::{
    request_processor, setup, template, App, Context, ContextProcessorLayer, Render, Reply, Result,
    Setup,
};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

async fn send(router: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    split(response).await
}

async fn split(response: Response) -> (StatusCode, Option<String>, String) {
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

fn spy(counter: &Arc<AtomicU64>) -> Setup {
    let counter = counter.clone();
    Setup::new().configure(move |engine| {
        engine.add_function("spy", move || counter.fetch_add(1, Ordering::SeqCst) + 1);
    })
}

fn foo_processor(_: &Parts) -> BoxFuture<'_, Result<Context>> {
    Box::pin(async { Ok(Context::new().with("foo", "processor").with("bar", "processor")) })
}

fn bar_override(_: &Parts) -> BoxFuture<'_, Result<Context>> {
    Box::pin(async { Ok(Context::new().with("bar", "later")) })
}

fn failing_processor(_: &Parts) -> BoxFuture<'_, Result<Context>> {
    Box::pin(async { Err(axum_jinja::Error::Internal("no session store".into())) })
}

#[tokio::test]
async fn renders_exact_template_text() {
    async fn handler() -> Render<Value> {
        Render(json!({"head": "HEAD", "text": "text"}))
    }

    let mut app: App = App::new().route("/", get(template("tmpl.jinja2").wrap(handler)));
    setup(
        &mut app,
        Setup::new().template(
            "tmpl.jinja2",
            "<html><body><h1>{{head}}</h1>{{text}}</body></html>",
        ),
    );

    let (status, content_type, body) = send(app.into_router(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/html; charset=utf-8"));
    assert_eq!(body, "<html><body><h1>HEAD</h1>text</body></html>");
}

#[tokio::test]
async fn handler_context_overrides_processors() {
    async fn handler() -> Render<Value> {
        Render(json!({"foo": "handler"}))
    }

    let mut app: App = App::new().route("/", get(template("t.html").wrap(handler)));
    setup(
        &mut app,
        Setup::new()
            .context_processor(foo_processor)
            .context_processor(bar_override)
            .template("t.html", "{{ foo }} {{ bar }}"),
    );

    let (status, _, body) = send(app.into_router(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "handler later");
}

#[tokio::test]
async fn request_processor_exposes_request() {
    async fn handler() -> Render<Value> {
        Render(json!({}))
    }

    let mut app: App = App::new().route("/hello", get(template("t.html").wrap(handler)));
    setup(
        &mut app,
        Setup::new()
            .autoescape(false)
            .context_processor(request_processor)
            .template("t.html", "{{ request.method }} {{ request.path }}?{{ request.query_string }}"),
    );

    let (_, _, body) = send(app.into_router(), "/hello?x=1").await;
    assert_eq!(body, "GET /hello?x=1");
}

#[tokio::test]
async fn processor_error_skips_handler() {
    let called = Arc::new(AtomicU64::new(0));
    let seen = called.clone();
    let handler = move || {
        let seen = seen.clone();
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
            Render(json!({}))
        }
    };

    let mut app: App = App::new().route("/", get(template("t.html").wrap(handler)));
    setup(
        &mut app,
        Setup::new()
            .context_processor(failing_processor)
            .template("t.html", "unreachable"),
    );

    let (status, _, body) = send(app.into_router(), "/").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Internal Server Error");
    assert_eq!(called.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_environment_names_the_key() {
    async fn handler() -> Render<Value> {
        Render(json!({}))
    }

    let mut app: App = App::new().route(
        "/",
        get(template("t.html").app_key("admin_env").wrap(handler)),
    );
    setup(&mut app, Setup::new().template("t.html", "x"));

    let (status, content_type, body) = send(app.into_router(), "/").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(content_type.as_deref(), Some("text/plain; charset=utf-8"));
    assert_eq!(
        body,
        "Template engine is not initialized, call axum_jinja::setup(..., app_key=admin_env) first"
    );
}

#[tokio::test]
async fn missing_template_is_500() {
    async fn handler() -> Render<Value> {
        Render(json!({}))
    }

    let mut app: App = App::new().route("/", get(template("nope.html").wrap(handler)));
    setup(&mut app, Setup::new());

    let (status, _, body) = send(app.into_router(), "/").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Template 'nope.html' not found");
}

#[tokio::test]
async fn non_mapping_context_is_500() {
    async fn handler() -> Render<Vec<u32>> {
        Render(vec![1, 2, 3])
    }

    let mut app: App = App::new().route("/", get(template("t.html").wrap(handler)));
    setup(&mut app, Setup::new().template("t.html", "x"));

    let (status, _, body) = send(app.into_router(), "/").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "context should be mapping, not sequence");
}

#[tokio::test]
async fn responses_pass_through_without_rendering() {
    async fn handler() -> Response {
        Redirect::to("/elsewhere").into_response()
    }

    let counter = Arc::new(AtomicU64::new(0));
    let mut app: App = App::new().route("/", get(template("t.html").wrap(handler)));
    setup(&mut app, spy(&counter).template("t.html", "{{ spy() }}"));

    let response = app
        .into_router()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/elsewhere");
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn reply_context_renders_once() {
    async fn handler() -> Reply {
        Reply::context(json!({}))
    }

    let counter = Arc::new(AtomicU64::new(0));
    let mut app: App = App::new().route("/", get(template("t.html").wrap(handler)));
    setup(&mut app, spy(&counter).template("t.html", "{{ spy() }}"));

    let (status, content_type, body) = send(app.into_router(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("text/html; charset=utf-8"));
    assert_eq!(body, "1");
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn status_and_encoding_options() {
    async fn handler() -> Render<Value> {
        Render(json!({"name": "widget"}))
    }

    let mut app: App = App::new().route(
        "/",
        get(template("t.html")
            .status(StatusCode::CREATED)
            .encoding("latin-1")
            .wrap(handler)),
    );
    setup(&mut app, Setup::new().template("t.html", "created {{ name }}"));

    let (status, content_type, body) = send(app.into_router(), "/").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(content_type.as_deref(), Some("text/html; charset=latin-1"));
    assert_eq!(body, "created widget");
}

#[tokio::test]
async fn unit_context_renders_empty_mapping() {
    async fn handler() -> Render<()> {
        Render(())
    }

    let mut app: App = App::new().route("/", get(template("t.html").wrap(handler)));
    setup(
        &mut app,
        Setup::new()
            .enable_async(false)
            .template("t.html", "[{{ missing }}]"),
    );

    let (status, _, body) = send(app.into_router(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[tokio::test]
async fn missing_processor_chain_is_fatal() {
    async fn handler() -> Render<Value> {
        Render(json!({}))
    }

    let mut app: App = App::new().route("/", get(template("t.html").wrap(handler)));
    setup(&mut app, Setup::new().template("t.html", "x"));
    app.push_layer(ContextProcessorLayer::new("never_registered"));

    let (status, _, body) = send(app.into_router(), "/").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("context_processors_key=never_registered"));
}

#[tokio::test]
async fn templates_load_from_directory() {
    async fn handler() -> Render<Value> {
        Render(json!({"who": "disk"}))
    }

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("base.html"), "<p>{% block body %}{% endblock %}</p>").unwrap();
    std::fs::write(
        dir.path().join("page.html"),
        "{% extends 'base.html' %}{% block body %}from {{ who }}{% endblock %}",
    )
    .unwrap();

    let mut app: App = App::new().route("/", get(template("page.html").wrap(handler)));
    setup(&mut app, Setup::new().template_dir(dir.path()));

    let (status, _, body) = send(app.into_router(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<p>from disk</p>");
}
