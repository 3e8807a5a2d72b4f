//! # axum-jinja
//!
//! Jinja templates for axum applications, backed by minijinja.
//!
//! ## Features
//!
//! - **Shared environments**: configure once with [`setup`], look up per request by [`AppKey`]
//! - **Context processors**: async functions that add variables for every request
//! - **Template handlers**: wrap any async handler with [`template`]; return [`Render`] to render
//! - **Class-based views**: method dispatch with [`TemplateView`]
//! - **Helpers**: `url()`, `static()` and the `app` global inside templates
//! - **Sub-applications**: nested [`App`]s with nearest-scope-wins lookups
//!
//! ## Example
//!
//! ```rust,no_run
//! use axum::routing::get;
//! use axum_jinja::prelude::*;
//! use serde_json::json;
//!
//! async fn index() -> Render<serde_json::Value> {
//!     Render(json!({"head": "Hello"}))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config.logging)?;
//!
//!     let mut app: App = App::new()
//!         .route_named("index", "/", get(template("index.html").wrap(index)));
//!     setup(
//!         &mut app,
//!         Setup::from_config(&config.templates).context_processor(request_processor),
//!     );
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app.into_router()).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod context;
pub mod environment;
pub mod error;
pub mod handler;
pub mod helpers;
pub mod middleware;
pub mod observability;
pub mod processors;
pub mod render;
pub mod response;
pub mod store;
pub mod view;

pub use app::App;
pub use context::{Context, RequestContext, TemplateRequest};
pub use environment::{get_env, setup, Environment, Setup};
pub use error::{Error, Result, TemplateError, TemplateErrorKind};
pub use handler::{template, TemplateOptions, Templated, TemplatedBlocking, TemplatedView};
pub use middleware::ContextProcessorLayer;
pub use processors::{request_processor, ContextProcessor, ProcessorChain, RequestInfo};
pub use render::{render_string, render_template};
pub use response::{Render, Reply};
pub use store::{AppKey, AppStore, ScopeChain};
pub use view::TemplateView;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::app::App;
    pub use crate::config::{Config, LoggingConfig, TemplateConfig};
    pub use crate::context::{Context, TemplateRequest};
    pub use crate::environment::{get_env, setup, Environment, Setup};
    pub use crate::error::{Error, Result, TemplateError, TemplateErrorKind};
    pub use crate::handler::{template, TemplateOptions};
    pub use crate::middleware::ContextProcessorLayer;
    pub use crate::observability::init_tracing;
    pub use crate::processors::{request_processor, ContextProcessor};
    pub use crate::render::{render_string, render_template};
    pub use crate::response::{Render, Reply};
    pub use crate::store::AppKey;
    pub use crate::view::TemplateView;
}
