//! CORS stage module
//!
//! Terminal for OPTIONS preflight requests; for everything else it marks
//! the context so the dispatcher adds the allow-origin header to whatever
//! response the pipeline ends up producing.

use hyper::Method;

use crate::http;

use super::stage::StageOutcome;
use super::RequestContext;

pub struct CorsStage {
    enabled: bool,
}

impl CorsStage {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn apply(&self, ctx: &mut RequestContext) -> StageOutcome {
        if !self.enabled {
            return StageOutcome::Declined;
        }
        if ctx.method == Method::OPTIONS {
            return StageOutcome::Handled(http::build_preflight_response());
        }
        ctx.cors = true;
        StageOutcome::Declined
    }
}
