//! Handler return values understood by template-wrapped handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use minijinja::Value;
use serde::Serialize;

/// Context waiting to be rendered by the template wrapper
///
/// Attached as a response extension to a placeholder response. Outside a
/// wrapper the placeholder reaches the client as a bare 500.
#[derive(Debug, Clone)]
pub(crate) struct PendingContext(pub(crate) Value);

fn pending(context: Value) -> Response {
    let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
    response.extensions_mut().insert(PendingContext(context));
    response
}

/// Render the wrapping template with this context
///
/// ```rust,no_run
/// use axum_jinja::Render;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Home {
///     title: &'static str,
/// }
///
/// async fn home() -> Render<Home> {
///     Render(Home { title: "Welcome" })
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Render<C>(pub C);

impl<C: Serialize> IntoResponse for Render<C> {
    fn into_response(self) -> Response {
        pending(Value::from_serialize(&self.0))
    }
}

/// Either a context to render or a finished response
#[derive(Debug)]
pub enum Reply {
    /// Render the template with this value as the handler context
    Context(Value),
    /// Send this response as-is
    Response(Response),
}

impl Reply {
    /// Serialize `context` into [`Reply::Context`]
    pub fn context<C: Serialize>(context: C) -> Self {
        Self::Context(Value::from_serialize(context))
    }

    /// Any response, passed through untouched
    pub fn response(response: impl IntoResponse) -> Self {
        Self::Response(response.into_response())
    }

    /// Recover a reply from a handler response
    pub(crate) fn from_response(mut response: Response) -> Self {
        match response.extensions_mut().remove::<PendingContext>() {
            Some(PendingContext(context)) => Self::Context(context),
            None => Self::Response(response),
        }
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Self::Context(context) => pending(context),
            Self::Response(response) => response,
        }
    }
}
