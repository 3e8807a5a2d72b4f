//! Rendering templates to strings and responses

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use minijinja::Value;
use serde::Serialize;

use crate::context::{Context, TemplateRequest};
use crate::error::{Result, TemplateError};
use crate::store::AppKey;

/// Render `template_name` with `context` merged over the request's
/// accumulated context
///
/// Checks run in order: environment, template, context shape. Keys from
/// `context` replace processor keys of the same name.
pub async fn render_string<C>(
    template_name: &str,
    request: &TemplateRequest,
    context: &C,
    app_key: &AppKey,
) -> Result<String>
where
    C: Serialize + Sync + ?Sized,
{
    let env = request
        .environment(app_key)
        .ok_or_else(|| TemplateError::environment_not_configured(app_key))?;

    env.get_template(template_name)?;

    let handler_context = Context::from_serialize(context)?;
    let context = match request.context() {
        Some(accumulated) if !accumulated.is_empty() => {
            let mut merged = accumulated.clone();
            merged.extend(handler_context);
            merged
        }
        _ => handler_context,
    };

    env.render(template_name, context).await
}

/// Render `template_name` into an HTML response
///
/// A `None` or unit context renders with an empty mapping. The body is
/// always UTF-8; `encoding` only labels the `Content-Type` charset.
pub async fn render_template<C>(
    template_name: &str,
    request: &TemplateRequest,
    context: &C,
    app_key: &AppKey,
    encoding: &str,
    status: StatusCode,
) -> Result<Response>
where
    C: Serialize + Sync + ?Sized,
{
    let mut value = Value::from_serialize(context);
    if value.is_none() || value.is_undefined() {
        value = Value::from(Context::new());
    }

    let text = render_string(template_name, request, &value, app_key).await?;

    let response = Response::builder()
        .status(status)
        .header(
            header::CONTENT_TYPE,
            format!("text/html; charset={}", encoding),
        )
        .body(Body::from(text))?;
    Ok(response)
}
