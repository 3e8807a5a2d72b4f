//! Scope-chain layer
//!
//! Each application wraps its router in a [`ScopeLayer`] carrying its own
//! store. When a request is routed into a nested application, the nested
//! layer appends that application's store, so handlers see every store along
//! the routing path with the nearest one last.

use axum::http::Request;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::store::{AppStore, ScopeChain};

/// Layer appending an application store to the request's [`ScopeChain`]
#[derive(Debug, Clone)]
pub struct ScopeLayer {
    store: AppStore,
}

impl ScopeLayer {
    pub fn new(store: AppStore) -> Self {
        Self { store }
    }
}

impl<S> Layer<S> for ScopeLayer {
    type Service = ScopeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ScopeService {
            inner,
            store: self.store.clone(),
        }
    }
}

/// Service produced by [`ScopeLayer`]
#[derive(Debug, Clone)]
pub struct ScopeService<S> {
    inner: S,
    store: AppStore,
}

impl<S, B> Service<Request<B>> for ScopeService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let chain = request
            .extensions()
            .get::<ScopeChain>()
            .cloned()
            .unwrap_or_default()
            .push(self.store.clone());
        request.extensions_mut().insert(chain);
        self.inner.call(request)
    }
}
