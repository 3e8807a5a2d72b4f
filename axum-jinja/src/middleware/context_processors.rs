//! Context-processor middleware
//!
//! Runs the processor chain registered by [`setup`](crate::setup) before the
//! handler and stores the merged result as the request's
//! [`RequestContext`]. Processors see the context accumulated so far.

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::pin::Pin;
use tower::{Layer, Service};

use crate::context::RequestContext;
use crate::error::{Error, TemplateError};
use crate::store::{AppKey, ScopeChain};

/// Layer running the processor chain stored under a key
#[derive(Debug, Clone)]
pub struct ContextProcessorLayer {
    key: AppKey,
}

impl ContextProcessorLayer {
    /// Run the chain stored under `key`
    pub fn new(key: impl Into<AppKey>) -> Self {
        Self { key: key.into() }
    }
}

impl Default for ContextProcessorLayer {
    fn default() -> Self {
        Self::new(AppKey::CONTEXT_PROCESSORS)
    }
}

impl<S> Layer<S> for ContextProcessorLayer {
    type Service = ContextProcessorMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ContextProcessorMiddleware {
            inner,
            key: self.key.clone(),
        }
    }
}

/// Service produced by [`ContextProcessorLayer`]
#[derive(Debug, Clone)]
pub struct ContextProcessorMiddleware<S> {
    inner: S,
    key: AppKey,
}

impl<S> Service<Request<Body>> for ContextProcessorMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let key = self.key.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();

            let chain = parts
                .extensions
                .get::<ScopeChain>()
                .and_then(|scopes| scopes.processors(&key));
            let Some(chain) = chain else {
                let err = Error::from(TemplateError::processors_not_configured(&key));
                return Ok(err.into_response());
            };

            if parts.extensions.get::<RequestContext>().is_none() {
                parts.extensions.insert(RequestContext::default());
            }

            for (index, processor) in chain.iter().enumerate() {
                let context = match processor.process(&parts).await {
                    Ok(context) => context,
                    Err(err) => {
                        tracing::warn!(key = %key, index, "Context processor failed: {}", err);
                        return Ok(err.into_response());
                    }
                };
                tracing::trace!(key = %key, index, keys = context.len(), "Context processor ran");
                if let Some(accumulated) = parts.extensions.get_mut::<RequestContext>() {
                    accumulated.extend(context);
                }
            }

            inner.call(Request::from_parts(parts, body)).await
        })
    }
}
