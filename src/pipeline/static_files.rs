//! Static-asset stage module
//!
//! Serves files under the public directory verbatim, terminal on match.
//! Responses carry Content-Type by extension and an `ETag`; a matching
//! `If-None-Match` yields 304. Paths that escape the public directory are
//! rejected; anything that is not a readable file declines to the next
//! stage so the 404 fallback stays centralized.

use std::path::{Path, PathBuf};

use hyper::body::Bytes;
use hyper::Method;
use tokio::fs;

use crate::http::{self, conditional, mime};
use crate::logger;

use super::body;
use super::stage::StageOutcome;
use super::RequestContext;

pub struct StaticFilesStage {
    root: PathBuf,
}

impl StaticFilesStage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn apply(&self, ctx: &mut RequestContext) -> StageOutcome {
        if ctx.method != Method::GET && ctx.method != Method::HEAD {
            return StageOutcome::Declined;
        }

        let Some(file_path) = resolve_asset(&self.root, &ctx.path) else {
            return StageOutcome::Declined;
        };

        let content = match fs::read(&file_path).await {
            Ok(c) => c,
            Err(e) => {
                logger::log_warning(&format!(
                    "Failed to read asset '{}': {e}",
                    file_path.display()
                ));
                return StageOutcome::Declined;
            }
        };

        let etag = conditional::etag_for(&content);
        if conditional::etag_matches(ctx.header("if-none-match"), &etag) {
            return StageOutcome::Handled(http::build_304_response(&etag));
        }

        let content_type =
            mime::content_type_for(file_path.extension().and_then(|e| e.to_str()));
        let is_head = ctx.method == Method::HEAD;

        if let Some(record) = ctx.log.as_mut() {
            record.entry.body_bytes = content.len();
        }

        StageOutcome::Handled(http::build_asset_response(
            Bytes::from(content),
            content_type,
            &etag,
            is_head,
        ))
    }
}

/// Map a request path to a file under the asset root, or None when the
/// path does not name a readable file inside the root. Serves `index.html`
/// for directory paths.
///
/// The path is resolved segment by segment: each raw segment is
/// percent-decoded (keeping `+` literal, a valid file-name byte) and a
/// decoded `..` rejects the whole request. Decoded file names are kept
/// verbatim otherwise, so `a..b.txt` names exactly that file.
fn resolve_asset(root: &Path, request_path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for raw in request_path.split('/').filter(|s| !s.is_empty()) {
        let segment = body::percent_decode_with(raw, false);
        if segment == "." {
            continue;
        }
        if segment == ".." || segment.contains('/') || segment.contains('\\') {
            logger::log_warning(&format!("Path traversal attempt blocked: {request_path}"));
            return None;
        }
        relative.push(&segment);
    }

    let root_canonical = root.canonicalize().ok()?;

    let mut file_path = root_canonical.join(relative);
    if file_path.is_dir() {
        file_path = file_path.join("index.html");
    }

    // Symlink backstop: the resolved file must still live under the root
    let canonical = file_path.canonicalize().ok()?;
    if !canonical.starts_with(&root_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {request_path} -> {}",
            canonical.display()
        ));
        return None;
    }
    canonical.is_file().then_some(canonical)
}
