//! Cookie-parser stage module
//!
//! Splits the `Cookie` header into the context's cookie map; always
//! passes through.

use std::collections::HashMap;

use super::stage::StageOutcome;
use super::RequestContext;

pub struct CookieParserStage;

impl CookieParserStage {
    pub fn apply(&self, ctx: &mut RequestContext) -> StageOutcome {
        if let Some(header) = ctx.header("cookie") {
            ctx.cookies = parse_cookies(header);
        }
        StageOutcome::Declined
    }
}

fn parse_cookies(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
