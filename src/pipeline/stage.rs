//! Pipeline stage module
//!
//! A stage inspects the request context and either handles the request,
//! declines in favor of the next stage, or raises an error condition that
//! sends the request straight to the error renderer.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use super::access_log::AccessLogStage;
use super::body::BodyParserStage;
use super::cookies::CookieParserStage;
use super::cors::CorsStage;
use super::graphql::GraphQlStage;
use super::router::RouterStage;
use super::static_files::StaticFilesStage;
use super::{ErrorCondition, RequestContext};

/// Tri-state result of applying one stage
pub enum StageOutcome {
    /// The stage produced the response; dispatch stops here
    Handled(Response<Full<Bytes>>),
    /// Not this stage's request; try the next mount
    Declined,
    /// Failure; jump directly to the error renderer
    Raised(ErrorCondition),
}

/// One unit of the request pipeline
pub enum Stage {
    AccessLog(AccessLogStage),
    Cors(CorsStage),
    BodyParser(BodyParserStage),
    CookieParser(CookieParserStage),
    StaticFiles(StaticFilesStage),
    GraphQl(GraphQlStage),
    Router(RouterStage),
    /// Mounted last; unconditionally raises 404
    NotFound,
}

impl Stage {
    pub async fn apply(&self, ctx: &mut RequestContext) -> StageOutcome {
        match self {
            Self::AccessLog(stage) => stage.apply(ctx),
            Self::Cors(stage) => stage.apply(ctx),
            Self::BodyParser(stage) => stage.apply(ctx),
            Self::CookieParser(stage) => stage.apply(ctx),
            Self::StaticFiles(stage) => stage.apply(ctx).await,
            Self::GraphQl(stage) => stage.apply(ctx).await,
            Self::Router(stage) => stage.apply(ctx).await,
            Self::NotFound => StageOutcome::Raised(ErrorCondition::not_found()),
        }
    }
}
