//! Scaffold router collaborators
//!
//! The two routers the bootstrap mounts. Their business logic is
//! intentionally thin; they exist so `/` and `/users` answer out of the
//! box and show the collaborator seam real routers plug into.

use std::sync::Arc;

use hyper::{Method, StatusCode};

use crate::http;
use crate::pipeline::{RequestContext, Router, RouterOutcome};
use crate::render::{ViewData, ViewRenderer};

/// Index router: renders the index view for `GET /`
pub struct IndexRouter {
    renderer: Arc<dyn ViewRenderer>,
}

impl IndexRouter {
    #[must_use]
    pub fn new(renderer: Arc<dyn ViewRenderer>) -> Self {
        Self { renderer }
    }
}

#[async_trait::async_trait]
impl Router for IndexRouter {
    async fn route(&self, ctx: &RequestContext) -> RouterOutcome {
        if ctx.method != Method::GET || ctx.route_path != "/" {
            return RouterOutcome::Pass;
        }
        let html = self
            .renderer
            .render("index", &ViewData::message("Welcome to gqld"));
        RouterOutcome::Respond(http::build_html_response(html, StatusCode::OK, false))
    }
}

/// Users router: placeholder resource listing for `GET /users`
pub struct UsersRouter;

#[async_trait::async_trait]
impl Router for UsersRouter {
    async fn route(&self, ctx: &RequestContext) -> RouterOutcome {
        if ctx.method != Method::GET || ctx.route_path != "/" {
            return RouterOutcome::Pass;
        }
        RouterOutcome::Respond(http::build_text_response(
            "respond with a resource",
            StatusCode::OK,
        ))
    }
}
