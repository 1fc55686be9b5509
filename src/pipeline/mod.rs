//! Request pipeline module
//!
//! The core of the server: an ordered list of mounted stages and a single
//! dispatcher that threads each request through them. A stage handles,
//! declines, or raises; the first handle wins, and any raise jumps
//! straight to the central error renderer. Mount order is fixed by the
//! composition in [`crate::server`] and is semantically significant —
//! parser stages must run before the stages that read their output.

mod access_log;
mod body;
mod context;
mod cookies;
mod cors;
mod error;
mod graphql;
mod router;
mod stage;
mod static_files;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Response};
use std::sync::Arc;

use crate::config::Environment;
use crate::http;
use crate::logger;
use crate::render::{ErrorDetail, ViewData, ViewRenderer};

pub use access_log::AccessLogStage;
pub use body::BodyParserStage;
pub use context::{ParsedBody, RequestContext};
pub use cookies::CookieParserStage;
pub use cors::CorsStage;
pub use error::ErrorCondition;
pub use graphql::GraphQlStage;
pub use router::{Router, RouterOutcome, RouterStage};
pub use stage::{Stage, StageOutcome};
pub use static_files::StaticFilesStage;

/// One mounted stage, optionally scoped to a path prefix
struct Mount {
    prefix: Option<String>,
    stage: Stage,
}

/// The assembled request pipeline
pub struct Pipeline {
    mounts: Vec<Mount>,
    environment: Environment,
    renderer: Arc<dyn ViewRenderer>,
}

impl Pipeline {
    #[must_use]
    pub fn new(environment: Environment, renderer: Arc<dyn ViewRenderer>) -> Self {
        Self {
            mounts: Vec::new(),
            environment,
            renderer,
        }
    }

    /// Register a stage tried on every request
    pub fn mount(&mut self, stage: Stage) {
        self.mounts.push(Mount {
            prefix: None,
            stage,
        });
    }

    /// Register a stage scoped to a path prefix. Duplicate prefixes are
    /// fine; mounts are tried in registration order and the first handle
    /// terminates dispatch.
    pub fn mount_at(&mut self, prefix: &str, stage: Stage) {
        self.mounts.push(Mount {
            prefix: Some(prefix.to_string()),
            stage,
        });
    }

    /// Dispatch one request through the mounted stages
    pub async fn handle(&self, mut ctx: RequestContext) -> Response<Full<Bytes>> {
        let mut response = self.dispatch(&mut ctx).await;

        if ctx.cors {
            http::apply_cors_headers(&mut response);
        }
        finish_access_log(&mut ctx, &response);
        response
    }

    async fn dispatch(&self, ctx: &mut RequestContext) -> Response<Full<Bytes>> {
        for mount in &self.mounts {
            match &mount.prefix {
                Some(prefix) => {
                    if !prefix_matches(prefix, &ctx.path) {
                        continue;
                    }
                    ctx.route_path = route_remainder(prefix, &ctx.path).to_string();
                }
                None => ctx.route_path.clone_from(&ctx.path),
            }

            match mount.stage.apply(ctx).await {
                StageOutcome::Handled(response) => return response,
                StageOutcome::Declined => {}
                StageOutcome::Raised(condition) => return self.render_error(ctx, &condition),
            }
        }

        // Unreachable with the standard composition (the not-found stage is
        // mounted last and always raises), but an empty pipeline still 404s.
        self.render_error(ctx, &ErrorCondition::not_found())
    }

    /// Render an error condition as the final response. Detail is exposed
    /// only in development; production gets the status's canonical reason.
    pub fn render_error(
        &self,
        ctx: &RequestContext,
        condition: &ErrorCondition,
    ) -> Response<Full<Bytes>> {
        let status = condition.status();
        let data = if self.environment.is_development() {
            ViewData {
                message: condition.message().to_string(),
                error: Some(ErrorDetail {
                    status: status.as_u16(),
                    description: condition.message().to_string(),
                }),
            }
        } else {
            ViewData::message(status.canonical_reason().unwrap_or("Error"))
        };

        let html = self.renderer.render("error", &data);
        http::build_html_response(html, status, ctx.method == Method::HEAD)
    }
}

/// Complete and emit the access log record opened by the log stage
fn finish_access_log(ctx: &mut RequestContext, response: &Response<Full<Bytes>>) {
    if let Some(mut record) = ctx.log.take() {
        record.entry.status = response.status().as_u16();
        if record.entry.body_bytes == 0 {
            record.entry.body_bytes = response
                .headers()
                .get("content-length")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
        }
        record.entry.request_time_us =
            u64::try_from(record.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&record.entry, &record.format);
    }
}

/// Mount-prefix matching: `/users` matches `/users` and `/users/...`
/// but not `/users2`.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Path as seen by a mounted stage, with the prefix stripped
fn route_remainder<'a>(prefix: &'a str, path: &'a str) -> &'a str {
    if prefix == "/" {
        return path;
    }
    let rest = &path[prefix.trim_end_matches('/').len()..];
    if rest.is_empty() {
        "/"
    } else {
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::{EngineError, GraphQlEngine, GraphQlRequest, GraphQlResponse};
    use crate::render::HtmlRenderer;
    use hyper::{HeaderMap, StatusCode};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // -- collaborator doubles ------------------------------------------------

    /// Router that answers every request and counts its invocations
    struct FixedRouter {
        body: &'static str,
        calls: AtomicUsize,
    }

    impl FixedRouter {
        fn new(body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                body,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl Router for FixedRouter {
        async fn route(&self, _ctx: &RequestContext) -> RouterOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            RouterOutcome::Respond(http::build_text_response(self.body, StatusCode::OK))
        }
    }

    /// Router that raises without an explicit status
    struct BoomRouter;

    #[async_trait::async_trait]
    impl Router for BoomRouter {
        async fn route(&self, _ctx: &RequestContext) -> RouterOutcome {
            RouterOutcome::Fail(ErrorCondition::from_message("boom"))
        }
    }

    struct EchoEngine;

    #[async_trait::async_trait]
    impl GraphQlEngine for EchoEngine {
        async fn start(&mut self, _schema: &str) -> Result<(), EngineError> {
            Ok(())
        }
        async fn execute(
            &self,
            request: GraphQlRequest,
        ) -> Result<GraphQlResponse, EngineError> {
            Ok(GraphQlResponse::data(serde_json::json!({
                "echo": request.query
            })))
        }
    }

    // -- helpers -------------------------------------------------------------

    static DIR_SEQ: AtomicUsize = AtomicUsize::new(0);

    fn asset_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "gqld-pipeline-test-{}-{}",
            std::process::id(),
            DIR_SEQ.fetch_add(1, Ordering::SeqCst)
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("shared.txt"), "asset bytes").unwrap();
        dir
    }

    fn pipeline(environment: Environment) -> Pipeline {
        Pipeline::new(environment, Arc::new(HtmlRenderer))
    }

    fn ctx(method: Method, path: &str) -> RequestContext {
        RequestContext::new(
            method,
            path,
            None,
            HeaderMap::new(),
            Environment::Development,
        )
    }

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        use http_body_util::BodyExt;
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    // -- dispatch contract ---------------------------------------------------

    #[tokio::test]
    async fn test_unregistered_path_renders_404() {
        let mut p = pipeline(Environment::Development);
        p.mount(Stage::NotFound);

        let response = p.handle(ctx(Method::GET, "/does-not-exist")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("Not Found"));
    }

    #[tokio::test]
    async fn test_empty_pipeline_still_404s() {
        let p = pipeline(Environment::Development);
        let response = p.handle(ctx(Method::GET, "/")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_raise_without_status_renders_500() {
        let mut p = pipeline(Environment::Development);
        p.mount_at("/", Stage::Router(RouterStage::new(Arc::new(BoomRouter))));
        p.mount(Stage::NotFound);

        let response = p.handle(ctx(Method::GET, "/")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_development_exposes_error_detail() {
        let mut p = pipeline(Environment::Development);
        p.mount_at("/", Stage::Router(RouterStage::new(Arc::new(BoomRouter))));
        p.mount(Stage::NotFound);

        let response = p.handle(ctx(Method::GET, "/")).await;
        assert!(body_string(response).await.contains("boom"));
    }

    #[tokio::test]
    async fn test_production_hides_error_detail() {
        let mut p = pipeline(Environment::Production);
        p.mount_at("/", Stage::Router(RouterStage::new(Arc::new(BoomRouter))));
        p.mount(Stage::NotFound);

        let response = p.handle(ctx(Method::GET, "/")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_string(response).await;
        assert!(!body.contains("boom"));
        assert!(body.contains("Internal Server Error"));
    }

    #[tokio::test]
    async fn test_static_wins_over_later_router() {
        let dir = asset_dir();
        let router = FixedRouter::new("router response");

        let mut p = pipeline(Environment::Development);
        p.mount(Stage::StaticFiles(StaticFilesStage::new(&dir)));
        p.mount_at("/", Stage::Router(RouterStage::new(router.clone())));
        p.mount(Stage::NotFound);

        let response = p.handle(ctx(Method::GET, "/shared.txt")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "asset bytes");
        // The earlier mount handled the request; the router never ran.
        assert_eq!(router.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_graphql_request_is_forwarded_not_404() {
        let mut p = pipeline(Environment::Development);
        p.mount(Stage::BodyParser(BodyParserStage));
        p.mount_at(
            "/graphql",
            Stage::GraphQl(GraphQlStage::new(Arc::new(EchoEngine))),
        );
        p.mount(Stage::NotFound);

        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        let mut request = RequestContext::new(
            Method::POST,
            "/graphql",
            None,
            headers,
            Environment::Development,
        );
        request.body = Bytes::from(r#"{"query":"{hello}"}"#);

        let response = p.handle(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("{hello}"));
    }

    #[tokio::test]
    async fn test_raise_skips_remaining_stages() {
        let router = FixedRouter::new("should not run");

        let mut p = pipeline(Environment::Development);
        p.mount(Stage::BodyParser(BodyParserStage));
        p.mount_at("/", Stage::Router(RouterStage::new(router.clone())));
        p.mount(Stage::NotFound);

        let mut headers = HeaderMap::new();
        headers.insert("content-type", "application/json".parse().unwrap());
        let mut request = RequestContext::new(
            Method::POST,
            "/",
            None,
            headers,
            Environment::Development,
        );
        request.body = Bytes::from("{broken");

        let response = p.handle(request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(router.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_get_is_idempotent() {
        let mut p = pipeline(Environment::Development);
        p.mount_at(
            "/",
            Stage::Router(RouterStage::new(FixedRouter::new("index page"))),
        );
        p.mount(Stage::NotFound);

        let first = p.handle(ctx(Method::GET, "/")).await;
        let second = p.handle(ctx(Method::GET, "/")).await;
        assert_eq!(first.status(), second.status());
        assert_eq!(body_string(first).await, body_string(second).await);
    }

    #[tokio::test]
    async fn test_cors_header_applied_to_final_response() {
        let mut p = pipeline(Environment::Development);
        p.mount(Stage::Cors(CorsStage::new(true)));
        p.mount_at(
            "/",
            Stage::Router(RouterStage::new(FixedRouter::new("ok"))),
        );
        p.mount(Stage::NotFound);

        let response = p.handle(ctx(Method::GET, "/")).await;
        assert_eq!(
            response.headers()["Access-Control-Allow-Origin"],
            "*"
        );
    }

    #[tokio::test]
    async fn test_router_sees_stripped_route_path() {
        struct PathAssertingRouter;

        #[async_trait::async_trait]
        impl Router for PathAssertingRouter {
            async fn route(&self, ctx: &RequestContext) -> RouterOutcome {
                assert_eq!(ctx.route_path, "/42");
                RouterOutcome::Respond(http::build_text_response("ok", StatusCode::OK))
            }
        }

        let mut p = pipeline(Environment::Development);
        p.mount_at(
            "/users",
            Stage::Router(RouterStage::new(Arc::new(PathAssertingRouter))),
        );
        p.mount(Stage::NotFound);

        let response = p.handle(ctx(Method::GET, "/users/42")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // -- prefix matching -----------------------------------------------------

    #[test]
    fn test_prefix_matches() {
        assert!(prefix_matches("/", "/anything"));
        assert!(prefix_matches("/users", "/users"));
        assert!(prefix_matches("/users", "/users/42"));
        assert!(!prefix_matches("/users", "/users2"));
        assert!(!prefix_matches("/users", "/user"));
        assert!(prefix_matches("/graphql", "/graphql"));
    }

    #[test]
    fn test_route_remainder() {
        assert_eq!(route_remainder("/", "/a/b"), "/a/b");
        assert_eq!(route_remainder("/users", "/users"), "/");
        assert_eq!(route_remainder("/users", "/users/42"), "/42");
    }
}
