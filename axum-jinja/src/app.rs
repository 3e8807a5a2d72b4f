//! Host application
//!
//! [`App`] wraps an [`axum::Router`] with the pieces template setup needs: an
//! [`AppStore`], named routes for the `url()` helper, and a middleware list
//! that [`setup`](crate::setup) can append to. Convert it with
//! [`App::into_router`] once every route and environment is registered.

use axum::{
    extract::Request,
    response::IntoResponse,
    routing::{MethodRouter, Route},
    Router,
};
use minijinja::Value;
use serde::Serialize;
use std::convert::Infallible;
use std::fmt;
use tower::{Layer, Service};

use crate::middleware::ScopeLayer;
use crate::store::AppStore;

type Middleware<S> = Box<dyn FnOnce(Router<S>) -> Router<S> + Send>;

/// Application under construction
pub struct App<S = ()> {
    router: Router<S>,
    store: AppStore,
    middleware: Vec<Middleware<S>>,
    descendants: Vec<AppStore>,
}

impl<S> App<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Create an empty application
    pub fn new() -> Self {
        Self::from_router(Router::new())
    }

    /// Start from an existing router
    pub fn from_router(router: Router<S>) -> Self {
        Self {
            router,
            store: AppStore::new(),
            middleware: Vec::new(),
            descendants: Vec::new(),
        }
    }

    /// Add a route
    #[must_use]
    pub fn route(mut self, path: &str, method_router: MethodRouter<S>) -> Self {
        self.router = self.router.route(path, method_router);
        self
    }

    /// Add a route that templates can build with `url(name, ...)`
    #[must_use]
    pub fn route_named(self, name: &str, path: &str, method_router: MethodRouter<S>) -> Self {
        self.store.insert_route(name, path);
        self.route(path, method_router)
    }

    /// Mount a sub-application under `path`
    ///
    /// Named routes of `app` and of everything nested inside it are prefixed
    /// with `path`. Requests routed into `app` see its store as their nearest
    /// scope.
    #[must_use]
    pub fn nest(mut self, path: &str, app: App<S>) -> Self {
        let prefix = path.trim_end_matches('/');
        app.store.prefix_routes(prefix);
        for store in &app.descendants {
            store.prefix_routes(prefix);
        }

        self.descendants.push(app.store.clone());
        self.descendants.extend(app.descendants.iter().cloned());
        self.router = self.router.nest(path, app.into_router());
        self
    }

    /// Register a layer; the first registered layer ends up outermost
    pub fn push_layer<L>(&mut self, layer: L) -> &mut Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.middleware
            .push(Box::new(move |router: Router<S>| router.layer(layer)));
        self
    }

    /// Builder-style [`App::push_layer`]
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<Route> + Clone + Send + Sync + 'static,
        L::Service: Service<Request> + Clone + Send + Sync + 'static,
        <L::Service as Service<Request>>::Response: IntoResponse + 'static,
        <L::Service as Service<Request>>::Error: Into<Infallible> + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.push_layer(layer);
        self
    }

    /// Set an application value, visible to templates as `app.<name>`
    #[must_use]
    pub fn with_value(self, name: impl Into<String>, value: impl Serialize) -> Self {
        self.store
            .insert_value(name, Value::from_serialize(value));
        self
    }

    /// Finish the application
    ///
    /// Layers are applied in registration order (first = outermost), then
    /// the scope layer wraps everything.
    pub fn into_router(self) -> Router<S> {
        let mut router = self.router;
        for apply in self.middleware.into_iter().rev() {
            router = apply(router);
        }
        router.layer(ScopeLayer::new(self.store))
    }
}

impl<S> App<S> {
    /// Application value by name
    pub fn value(&self, name: &str) -> Option<Value> {
        self.store.value(name)
    }

    /// This application's store
    pub fn store(&self) -> &AppStore {
        &self.store
    }
}

impl<S> Default for App<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for App<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("store", &self.store)
            .field("middleware", &self.middleware.len())
            .field("nested", &self.descendants.len())
            .finish_non_exhaustive()
    }
}

impl<S> From<App<S>> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn from(app: App<S>) -> Self {
        app.into_router()
    }
}
