//! Wrapping handlers so their results are rendered through a template
//!
//! [`template`] returns [`TemplateOptions`]; the wrap method picked at
//! registration time decides how the handler is called:
//!
//! - [`TemplateOptions::wrap`]: any async axum handler. Returning
//!   [`Render`](crate::Render) or [`Reply::Context`] renders the template;
//!   any other response is passed through untouched.
//! - [`TemplateOptions::wrap_view`]: a [`TemplateView`] dispatched by method.
//! - [`TemplateOptions::wrap_blocking`]: a synchronous function (deprecated).
//!
//! ```rust,no_run
//! use axum::routing::get;
//! use axum_jinja::{template, App, Render};
//! use serde_json::{json, Value};
//!
//! async fn index() -> Render<Value> {
//!     Render(json!({"head": "Hello"}))
//! }
//!
//! let app: App = App::new().route("/", get(template("index.html").wrap(index)));
//! ```

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    handler::Handler,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::context::TemplateRequest;
use crate::render::render_template;
use crate::response::Reply;
use crate::store::AppKey;
use crate::view::TemplateView;

/// Options for [`template`]
#[derive(Debug, Clone)]
pub struct TemplateOptions {
    template_name: String,
    app_key: AppKey,
    encoding: String,
    status: StatusCode,
}

/// Render the wrapped handler's result with `template_name`
pub fn template(template_name: impl Into<String>) -> TemplateOptions {
    TemplateOptions {
        template_name: template_name.into(),
        app_key: AppKey::ENVIRONMENT,
        encoding: "utf-8".to_string(),
        status: StatusCode::OK,
    }
}

impl TemplateOptions {
    /// Environment key to render with
    #[must_use]
    pub fn app_key(mut self, key: impl Into<AppKey>) -> Self {
        self.app_key = key.into();
        self
    }

    /// Charset label for the `Content-Type` header
    #[must_use]
    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    /// Status of rendered responses
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    /// Wrap an async axum handler
    pub fn wrap<H, T>(self, handler: H) -> Templated<H, T> {
        Templated {
            handler,
            options: Arc::new(self),
            _marker: PhantomData,
        }
    }

    /// Wrap a class-based view
    pub fn wrap_view<V: TemplateView>(self) -> TemplatedView<V> {
        TemplatedView {
            options: Arc::new(self),
            _marker: PhantomData,
        }
    }

    /// Wrap a synchronous handler
    #[deprecated(note = "synchronous handlers block the executor; use `wrap` with an async handler")]
    pub fn wrap_blocking<F>(self, handler: F) -> TemplatedBlocking<F>
    where
        F: Fn(TemplateRequest) -> Reply + Clone + Send + Sync + 'static,
    {
        tracing::warn!(
            template = %self.template_name,
            "Synchronous template handler is deprecated, switch to an async handler"
        );
        TemplatedBlocking {
            handler,
            options: Arc::new(self),
        }
    }

    /// Turn a handler reply into the final response
    async fn respond(&self, request: &TemplateRequest, reply: Reply) -> Response {
        let context = match reply {
            Reply::Context(context) => context,
            Reply::Response(response) => return response,
        };

        let rendered = render_template(
            &self.template_name,
            request,
            &context,
            &self.app_key,
            &self.encoding,
            self.status,
        )
        .await;

        match rendered {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }
}

/// Async handler wrapped by [`TemplateOptions::wrap`]
pub struct Templated<H, T> {
    handler: H,
    options: Arc<TemplateOptions>,
    _marker: PhantomData<fn() -> T>,
}

impl<H: Clone, T> Clone for Templated<H, T> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            options: self.options.clone(),
            _marker: PhantomData,
        }
    }
}

impl<H, T, S> Handler<T, S> for Templated<H, T>
where
    H: Handler<T, S>,
    T: 'static,
    S: Clone + Send + Sync + 'static,
{
    type Future = BoxFuture<'static, Response>;

    fn call(self, request: Request, state: S) -> Self::Future {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let template_request = TemplateRequest::from_parts(&parts);

            let response = self
                .handler
                .call(Request::from_parts(parts, body), state)
                .await;

            let reply = Reply::from_response(response);
            self.options.respond(&template_request, reply).await
        })
    }
}

/// Class-based view wrapped by [`TemplateOptions::wrap_view`]
pub struct TemplatedView<V> {
    options: Arc<TemplateOptions>,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Clone for TemplatedView<V> {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            _marker: PhantomData,
        }
    }
}

impl<V, S> Handler<(), S> for TemplatedView<V>
where
    V: TemplateView,
    S: Clone + Send + Sync + 'static,
{
    type Future = BoxFuture<'static, Response>;

    fn call(self, request: Request, state: S) -> Self::Future {
        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let template_request = TemplateRequest::from_parts(&parts);

            // Honors `DefaultBodyLimit`; oversized bodies are rejected with 413
            let body = match Bytes::from_request(Request::from_parts(parts, body), &state).await {
                Ok(body) => body,
                Err(rejection) => {
                    tracing::debug!(
                        status = %rejection.status(),
                        "Failed to read view body: {}",
                        rejection.body_text()
                    );
                    return rejection.into_response();
                }
            };

            let mut view = V::new(template_request.with_body(body));
            let reply = view.dispatch().await;
            self.options.respond(view.request(), reply).await
        })
    }
}

/// Synchronous handler wrapped by [`TemplateOptions::wrap_blocking`]
#[derive(Clone)]
pub struct TemplatedBlocking<F> {
    handler: F,
    options: Arc<TemplateOptions>,
}

impl<F, S> Handler<(), S> for TemplatedBlocking<F>
where
    F: Fn(TemplateRequest) -> Reply + Clone + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    type Future = BoxFuture<'static, Response>;

    fn call(self, request: Request, _state: S) -> Self::Future {
        Box::pin(async move {
            let (parts, _body) = request.into_parts();
            let template_request = TemplateRequest::from_parts(&parts);
            let reply = (self.handler)(template_request.clone());
            self.options.respond(&template_request, reply).await
        })
    }
}
