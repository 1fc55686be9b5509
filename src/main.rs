use std::collections::HashMap;
use std::sync::Arc;

use gqld::config::Config;
use gqld::graphql::{FieldResolverEngine, Resolver};
use gqld::logger;
use gqld::pipeline::Router;
use gqld::render::{HtmlRenderer, ViewRenderer};
use gqld::routes::{IndexRouter, UsersRouter};
use gqld::server::App;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load()?;
    logger::init(&cfg)?;

    // One thread, cooperative tasks; connections are spawned on a LocalSet
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(cfg))
}

async fn run(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let renderer: Arc<dyn ViewRenderer> = Arc::new(HtmlRenderer);

    let engine = Box::new(FieldResolverEngine::new(demo_resolvers()));
    let routers: Vec<(String, Arc<dyn Router>)> = vec![
        (
            "/".to_string(),
            Arc::new(IndexRouter::new(Arc::clone(&renderer))),
        ),
        ("/users".to_string(), Arc::new(UsersRouter)),
    ];

    // Initialization must complete before the listener binds
    let app = App::initialize(cfg, engine, routers, renderer).await?;
    app.serve().await?;
    Ok(())
}

/// Resolver map for the development engine, matching the sample schema
fn demo_resolvers() -> HashMap<String, Resolver> {
    let mut resolvers: HashMap<String, Resolver> = HashMap::new();
    resolvers.insert(
        "hello".to_string(),
        Arc::new(|_| serde_json::Value::String("Hello world!".to_string())),
    );
    resolvers
}
