//! Access-log stage module
//!
//! Side-effect-only stage: opens an access log record for the request and
//! always declines. The dispatcher completes the record once the final
//! response (including error pages) is known, so the logged status is the
//! one the client actually sees.

use crate::logger::AccessLogEntry;

use super::context::LogRecord;
use super::stage::StageOutcome;
use super::RequestContext;

pub struct AccessLogStage {
    enabled: bool,
    format: String,
}

impl AccessLogStage {
    #[must_use]
    pub fn new(enabled: bool, format: &str) -> Self {
        Self {
            enabled,
            format: format.to_string(),
        }
    }

    pub fn apply(&self, ctx: &mut RequestContext) -> StageOutcome {
        if self.enabled {
            let mut entry = AccessLogEntry::new(
                ctx.remote_addr
                    .map_or_else(|| "-".to_string(), |a| a.ip().to_string()),
                ctx.method.to_string(),
                ctx.path.clone(),
            );
            entry.query = ctx.query.clone();
            entry.referer = ctx.header("referer").map(ToString::to_string);
            entry.user_agent = ctx.header("user-agent").map(ToString::to_string);

            ctx.log = Some(LogRecord {
                entry,
                started: std::time::Instant::now(),
                format: self.format.clone(),
            });
        }
        StageOutcome::Declined
    }
}
