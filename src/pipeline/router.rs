//! Router stage module
//!
//! Delegates to a router collaborator. The router sees the path with its
//! mount prefix stripped (the dispatcher fills `ctx.route_path`) and may
//! respond, pass, or fail with an error condition.

use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use super::stage::StageOutcome;
use super::{ErrorCondition, RequestContext};

/// Result of a router collaborator handling a request
pub enum RouterOutcome {
    /// The router produced the response
    Respond(Response<Full<Bytes>>),
    /// Not this router's request
    Pass,
    /// The router raised; goes to the error renderer
    Fail(ErrorCondition),
}

/// Router collaborator, mounted at a path prefix
#[async_trait::async_trait]
pub trait Router: Send + Sync {
    async fn route(&self, ctx: &RequestContext) -> RouterOutcome;
}

pub struct RouterStage {
    router: Arc<dyn Router>,
}

impl RouterStage {
    #[must_use]
    pub fn new(router: Arc<dyn Router>) -> Self {
        Self { router }
    }

    pub async fn apply(&self, ctx: &mut RequestContext) -> StageOutcome {
        match self.router.route(ctx).await {
            RouterOutcome::Respond(resp) => StageOutcome::Handled(resp),
            RouterOutcome::Pass => StageOutcome::Declined,
            RouterOutcome::Fail(condition) => StageOutcome::Raised(condition),
        }
    }
}
