//! Route handlers for the demo site

use async_trait::async_trait;
use axum::{extract::Path, http::request::Parts, http::StatusCode};
use axum_jinja::prelude::*;
use futures::future::BoxFuture;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u32,
    pub name: &'static str,
}

const USERS: &[User] = &[
    User { id: 1, name: "Ada" },
    User { id: 2, name: "Grace" },
    User { id: 3, name: "Linus" },
];

#[derive(Serialize)]
pub struct IndexPage {
    head: &'static str,
    users: &'static [User],
}

pub async fn index() -> Render<IndexPage> {
    Render(IndexPage {
        head: "People",
        users: USERS,
    })
}

pub async fn user(Path(id): Path<u32>) -> Reply {
    match USERS.iter().find(|user| user.id == id) {
        Some(user) => Reply::context(Context::new().with("user", user)),
        None => Reply::response(StatusCode::NOT_FOUND),
    }
}

pub async fn dashboard() -> Render<Context> {
    Render(Context::new().with("user_count", USERS.len()))
}

/// Adds the crate version to every template
pub fn site_processor(_request: &Parts) -> BoxFuture<'_, Result<Context>> {
    Box::pin(async { Ok(Context::new().with("version", env!("CARGO_PKG_VERSION"))) })
}

/// Contact form: GET shows the form, POST acknowledges the message
pub struct Contact {
    request: TemplateRequest,
}

#[async_trait]
impl TemplateView for Contact {
    fn new(request: TemplateRequest) -> Self {
        Self { request }
    }

    fn request(&self) -> &TemplateRequest {
        &self.request
    }

    async fn get(&mut self) -> Reply {
        Reply::context(Context::new().with("sent", false))
    }

    async fn post(&mut self) -> Reply {
        let length = self.request.body().len();
        tracing::info!(length, "Contact message received");
        Reply::context(Context::new().with("sent", true).with("length", length))
    }
}
