//! Server module
//!
//! Two-phase lifecycle around the pipeline: `App::initialize` performs the
//! one-time asynchronous startup (read the schema text, start the GraphQL
//! engine, assemble the pipeline) and only the resulting [`ReadyApp`] can
//! bind the listener. Requests therefore cannot reach the GraphQL stage
//! before the engine is up.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

use crate::config::Config;
use crate::graphql::{EngineError, GraphQlEngine};
use crate::logger;
use crate::pipeline::{
    AccessLogStage, BodyParserStage, CookieParserStage, CorsStage, ErrorCondition, GraphQlStage,
    Pipeline, RequestContext, Router, RouterStage, Stage, StaticFilesStage,
};
use crate::render::ViewRenderer;

/// Startup and serve failures
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to read schema file '{path}': {source}")]
    Schema {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("{0}")]
    Address(String),
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// Entry point for the two-phase lifecycle
pub struct App;

/// An initialized application, ready to accept connections
pub struct ReadyApp {
    config: Config,
    pipeline: Arc<Pipeline>,
}

impl App {
    /// One-time asynchronous initialization. Reads the schema text, starts
    /// the engine (consuming the unstarted one, so re-initialization is
    /// impossible), and assembles the pipeline in its fixed mount order.
    pub async fn initialize(
        config: Config,
        mut engine: Box<dyn GraphQlEngine>,
        routers: Vec<(String, Arc<dyn Router>)>,
        renderer: Arc<dyn ViewRenderer>,
    ) -> Result<ReadyApp, ServerError> {
        let schema_path = config.graphql.schema_file.clone();
        let schema = tokio::fs::read_to_string(&schema_path)
            .await
            .map_err(|source| ServerError::Schema {
                path: schema_path,
                source,
            })?;

        engine.start(&schema).await?;
        let engine: Arc<dyn GraphQlEngine> = Arc::from(engine);

        let pipeline = build_pipeline(&config, engine, routers, renderer);
        Ok(ReadyApp {
            config,
            pipeline: Arc::new(pipeline),
        })
    }
}

/// Assemble the pipeline in the order the composition contract fixes:
/// logging, CORS, body and cookie parsing, static assets, GraphQL,
/// routers, then the 404 fallback. Parsers must precede the GraphQL and
/// router mounts, which read the parsed body.
pub fn build_pipeline(
    config: &Config,
    engine: Arc<dyn GraphQlEngine>,
    routers: Vec<(String, Arc<dyn Router>)>,
    renderer: Arc<dyn ViewRenderer>,
) -> Pipeline {
    let mut pipeline = Pipeline::new(config.server.environment, renderer);

    pipeline.mount(Stage::AccessLog(AccessLogStage::new(
        config.logging.access_log,
        &config.logging.format,
    )));
    pipeline.mount(Stage::Cors(CorsStage::new(config.http.enable_cors)));
    pipeline.mount(Stage::BodyParser(BodyParserStage));
    pipeline.mount(Stage::CookieParser(CookieParserStage));
    pipeline.mount(Stage::StaticFiles(StaticFilesStage::new(
        &config.assets.public_dir,
    )));
    pipeline.mount_at(
        &config.graphql.mount_path,
        Stage::GraphQl(GraphQlStage::new(engine)),
    );
    for (prefix, router) in routers {
        pipeline.mount_at(&prefix, Stage::Router(RouterStage::new(router)));
    }
    pipeline.mount(Stage::NotFound);

    pipeline
}

impl ReadyApp {
    /// Bind the listener and serve connections until the process exits.
    /// Runs on a `LocalSet`: one thread, cooperative tasks per connection.
    pub async fn serve(self) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(ServerError::Address)?;
        let listener = create_reusable_listener(addr)?;
        logger::log_server_start(&addr, &self.config);

        let app = Arc::new(self);
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                loop {
                    match listener.accept().await {
                        Ok((stream, peer_addr)) => {
                            Arc::clone(&app).handle_connection(stream, peer_addr);
                        }
                        Err(e) => {
                            logger::log_error(&format!("Failed to accept connection: {e}"));
                        }
                    }
                }
            })
            .await
    }

    /// Serve one connection in a spawned local task
    fn handle_connection(self: Arc<Self>, stream: TcpStream, peer_addr: SocketAddr) {
        tokio::task::spawn_local(async move {
            let io = TokioIo::new(stream);

            let timeout_duration = Duration::from_secs(std::cmp::max(
                self.config.performance.read_timeout,
                self.config.performance.write_timeout,
            ));

            // hyper defaults keep-alive on, so a zero timeout has to
            // disable it explicitly
            let mut builder = http1::Builder::new();
            builder.keep_alive(keep_alive_enabled(
                self.config.performance.keep_alive_timeout,
            ));

            let app = Arc::clone(&self);
            let conn = builder.serve_connection(
                io,
                service_fn(move |req| {
                    let app = Arc::clone(&app);
                    async move { app.dispatch(req, peer_addr).await }
                }),
            );

            match tokio::time::timeout(timeout_duration, conn).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => logger::log_connection_error(&err),
                Err(_) => logger::log_warning(&format!(
                    "Connection from {peer_addr} timed out after {}s",
                    timeout_duration.as_secs()
                )),
            }
        });
    }

    /// Build the request context, collect the body within the configured
    /// limit, and hand the request to the pipeline. A request failure is
    /// always answered with a rendered page, never a dropped connection.
    async fn dispatch(
        &self,
        req: Request<Incoming>,
        peer_addr: SocketAddr,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let (parts, body) = req.into_parts();
        let mut ctx = RequestContext::from_parts(&parts, self.config.server.environment);
        ctx.remote_addr = Some(peer_addr);

        let limit = usize::try_from(self.config.http.max_body_size).unwrap_or(usize::MAX);
        match Limited::new(body, limit).collect().await {
            Ok(collected) => {
                ctx.body = collected.to_bytes();
                Ok(self.pipeline.handle(ctx).await)
            }
            Err(err) => {
                let condition = body_read_condition(err.as_ref(), limit);
                Ok(self.pipeline.render_error(&ctx, &condition))
            }
        }
    }
}

/// Keep-alive stays on unless the timeout is configured to zero
fn keep_alive_enabled(keep_alive_timeout: u64) -> bool {
    keep_alive_timeout > 0
}

/// Classify a body-collection failure. Only an overflow of the configured
/// limit is 413; transport read failures are a plain bad request.
fn body_read_condition(err: &(dyn std::error::Error + 'static), limit: usize) -> ErrorCondition {
    if err.is::<http_body_util::LengthLimitError>() {
        ErrorCondition::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("request body exceeds {limit} bytes"),
        )
    } else {
        ErrorCondition::bad_request("failed to read request body")
    }
}

/// Create a `TcpListener` with `SO_REUSEADDR`/`SO_REUSEPORT` set and
/// non-blocking mode enabled for tokio.
fn create_reusable_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_port(true)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}
