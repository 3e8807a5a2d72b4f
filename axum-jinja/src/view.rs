//! Class-based views
//!
//! A [`TemplateView`] is built per request from the [`TemplateRequest`] and
//! dispatched on the HTTP method. Methods that are not overridden answer
//! `405 Method Not Allowed`. Wrap a view with
//! [`TemplateOptions::wrap_view`](crate::TemplateOptions::wrap_view).

use async_trait::async_trait;
use axum::http::{Method, StatusCode};

use crate::context::TemplateRequest;
use crate::response::Reply;

fn method_not_allowed() -> Reply {
    Reply::response(StatusCode::METHOD_NOT_ALLOWED)
}

/// Per-request view object
///
/// The template is rendered with [`TemplateView::request`], so changes a view
/// makes to its request's context are visible to the template.
#[async_trait]
pub trait TemplateView: Send + Sync + Sized + 'static {
    /// Build the view for one request
    fn new(request: TemplateRequest) -> Self;

    /// Request used for rendering
    fn request(&self) -> &TemplateRequest;

    async fn get(&mut self) -> Reply {
        method_not_allowed()
    }

    async fn post(&mut self) -> Reply {
        method_not_allowed()
    }

    async fn put(&mut self) -> Reply {
        method_not_allowed()
    }

    async fn patch(&mut self) -> Reply {
        method_not_allowed()
    }

    async fn delete(&mut self) -> Reply {
        method_not_allowed()
    }

    /// Route to the method handler
    async fn dispatch(&mut self) -> Reply {
        let method = self.request().method().clone();
        match method {
            Method::GET => self.get().await,
            Method::POST => self.post().await,
            Method::PUT => self.put().await,
            Method::PATCH => self.patch().await,
            Method::DELETE => self.delete().await,
            _ => method_not_allowed(),
        }
    }
}
