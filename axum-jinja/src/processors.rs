//! Context processors
//!
//! A context processor looks at the incoming request and returns extra
//! template variables. Processors registered through
//! [`Setup::context_processor`](crate::Setup::context_processor) run in
//! registration order before the handler; their outputs are merged into the
//! request's [`RequestContext`](crate::RequestContext), later keys winning.

use async_trait::async_trait;
use axum::http::request::Parts;
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::Context;
use crate::error::Result;

/// Produces template variables from a request
#[async_trait]
pub trait ContextProcessor: Send + Sync + 'static {
    /// Compute the variables for this request
    async fn process(&self, request: &Parts) -> Result<Context>;
}

#[async_trait]
impl<F> ContextProcessor for F
where
    F: for<'a> Fn(&'a Parts) -> BoxFuture<'a, Result<Context>> + Send + Sync + 'static,
{
    async fn process(&self, request: &Parts) -> Result<Context> {
        (self)(request).await
    }
}

/// Ordered, shareable list of processors
pub type ProcessorChain = Arc<[Arc<dyn ContextProcessor>]>;

/// Request data exposed to templates as `request`
#[derive(Debug, Clone, Serialize)]
pub struct RequestInfo {
    pub method: String,
    pub path: String,
    pub query_string: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

impl RequestInfo {
    pub fn from_parts(parts: &Parts) -> Self {
        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_owned(), value.to_owned()))
            })
            .collect();

        Self {
            method: parts.method.as_str().to_owned(),
            path: parts.uri.path().to_owned(),
            query_string: parts.uri.query().unwrap_or_default().to_owned(),
            url: parts.uri.to_string(),
            headers,
        }
    }
}

/// Built-in processor exposing the current request as `request`
///
/// ```rust,no_run
/// use axum_jinja::{request_processor, Setup};
///
/// let setup = Setup::new().context_processor(request_processor);
/// ```
pub fn request_processor(request: &Parts) -> BoxFuture<'_, Result<Context>> {
    Box::pin(async move {
        let mut context = Context::new();
        context.insert("request", RequestInfo::from_parts(request));
        Ok(context)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use minijinja::Value;

    #[tokio::test]
    async fn test_request_processor_exposes_request() {
        let (parts, _) = Request::builder()
            .method("GET")
            .uri("/hello?name=world")
            .header("accept", "text/html")
            .body(())
            .unwrap()
            .into_parts();

        let context = request_processor.process(&parts).await.unwrap();
        let request = context.get("request").cloned().unwrap_or_default();

        assert_eq!(request.get_attr("path").unwrap(), Value::from("/hello"));
        assert_eq!(request.get_attr("method").unwrap(), Value::from("GET"));
        assert_eq!(
            request.get_attr("query_string").unwrap(),
            Value::from("name=world")
        );
        let accept = request
            .get_attr("headers")
            .and_then(|headers| headers.get_attr("accept"))
            .unwrap();
        assert_eq!(accept, Value::from("text/html"));
    }

    #[tokio::test]
    async fn test_custom_processor_struct() {
        struct Static;

        #[async_trait]
        impl ContextProcessor for Static {
            async fn process(&self, _request: &Parts) -> Result<Context> {
                Ok(Context::new().with("site", "demo"))
            }
        }

        let chain: ProcessorChain = Arc::from(vec![Arc::new(Static) as Arc<dyn ContextProcessor>]);
        let (parts, _) = Request::new(()).into_parts();
        let context = chain[0].process(&parts).await.unwrap();
        assert_eq!(context.get("site"), Some(&Value::from("demo")));
    }
}
