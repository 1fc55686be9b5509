//! HTTP protocol layer module
//!
//! Response builders, MIME detection and conditional-request helpers,
//! decoupled from the pipeline stages that use them.

pub mod conditional;
pub mod mime;
pub mod response;

pub use conditional::{etag_for, etag_matches};
pub use response::{
    apply_cors_headers, build_304_response, build_asset_response, build_html_response,
    build_json_response, build_preflight_response, build_text_response,
};
