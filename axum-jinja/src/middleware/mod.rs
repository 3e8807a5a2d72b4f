//! Middleware installed by the application and by template setup

// Scope chain (installed by `App::into_router`)
pub mod scope;

// Context processors (installed by `setup` when processors are given)
pub mod context_processors;

pub use context_processors::{ContextProcessorLayer, ContextProcessorMiddleware};
pub use scope::{ScopeLayer, ScopeService};
