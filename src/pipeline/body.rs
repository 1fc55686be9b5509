//! Body-parser stage module
//!
//! Decodes JSON and urlencoded-form bodies into the request context.
//! Unknown content types pass through untouched; a malformed JSON body
//! raises 400.

use std::collections::HashMap;

use super::context::ParsedBody;
use super::stage::StageOutcome;
use super::{ErrorCondition, RequestContext};

pub struct BodyParserStage;

impl BodyParserStage {
    pub fn apply(&self, ctx: &mut RequestContext) -> StageOutcome {
        if ctx.body.is_empty() {
            return StageOutcome::Declined;
        }

        match ctx.content_type() {
            Some("application/json") => match serde_json::from_slice(&ctx.body) {
                Ok(value) => {
                    ctx.parsed_body = Some(ParsedBody::Json(value));
                    StageOutcome::Declined
                }
                Err(e) => StageOutcome::Raised(ErrorCondition::bad_request(format!(
                    "invalid JSON body: {e}"
                ))),
            },
            Some("application/x-www-form-urlencoded") => {
                let text = String::from_utf8_lossy(&ctx.body);
                ctx.parsed_body = Some(ParsedBody::Form(parse_form(&text)));
                StageOutcome::Declined
            }
            _ => StageOutcome::Declined,
        }
    }
}

/// Parse an urlencoded key-value string (body or query string)
pub(crate) fn parse_form(text: &str) -> HashMap<String, String> {
    text.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (percent_decode(k), percent_decode(v)),
            None => (percent_decode(pair), String::new()),
        })
        .collect()
}

/// Decode `%XX` escapes and `+` as space (form encoding)
fn percent_decode(input: &str) -> String {
    percent_decode_with(input, true)
}

/// Decode `%XX` escapes; `plus_as_space` additionally maps `+` to a
/// space, which only form encoding wants. URL paths keep `+` literal.
pub(crate) fn percent_decode_with(input: &str, plus_as_space: bool) -> String {
    fn hex_value(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' if plus_as_space => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi * 16 + lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
