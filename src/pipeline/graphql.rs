//! GraphQL adapter stage module
//!
//! Bridges the pipeline to the external execution engine: decodes a
//! `GraphQlRequest` from a POST JSON body or GET query parameters, hands
//! it to the started engine, and writes the engine's response back as
//! JSON. The engine itself is opaque to this stage.

use std::sync::Arc;

use hyper::{Method, StatusCode};

use crate::graphql::{GraphQlEngine, GraphQlRequest};
use crate::http;

use super::body::parse_form;
use super::context::ParsedBody;
use super::stage::StageOutcome;
use super::{ErrorCondition, RequestContext};

pub struct GraphQlStage {
    engine: Arc<dyn GraphQlEngine>,
}

impl GraphQlStage {
    #[must_use]
    pub fn new(engine: Arc<dyn GraphQlEngine>) -> Self {
        Self { engine }
    }

    pub async fn apply(&self, ctx: &mut RequestContext) -> StageOutcome {
        let request = match decode_request(ctx) {
            Ok(request) => request,
            Err(condition) => return StageOutcome::Raised(condition),
        };

        match self.engine.execute(request).await {
            Ok(response) => match serde_json::to_string(&response) {
                Ok(payload) => {
                    StageOutcome::Handled(http::build_json_response(payload, StatusCode::OK))
                }
                Err(e) => StageOutcome::Raised(ErrorCondition::from_message(format!(
                    "failed to serialize GraphQL response: {e}"
                ))),
            },
            Err(e) => StageOutcome::Raised(ErrorCondition::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
            )),
        }
    }
}

/// Decode the GraphQL request from the HTTP request
fn decode_request(ctx: &RequestContext) -> Result<GraphQlRequest, ErrorCondition> {
    match ctx.method {
        Method::POST => decode_post(ctx),
        Method::GET => decode_get(ctx),
        _ => Err(ErrorCondition::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "GraphQL only supports GET and POST requests",
        )),
    }
}

fn decode_post(ctx: &RequestContext) -> Result<GraphQlRequest, ErrorCondition> {
    match &ctx.parsed_body {
        Some(ParsedBody::Json(value)) => serde_json::from_value(value.clone())
            .map_err(|e| ErrorCondition::bad_request(format!("invalid GraphQL request: {e}"))),
        _ => Err(ErrorCondition::bad_request(
            "GraphQL POST requires a JSON body",
        )),
    }
}

fn decode_get(ctx: &RequestContext) -> Result<GraphQlRequest, ErrorCondition> {
    let params = ctx.query.as_deref().map(parse_form).unwrap_or_default();
    let Some(query) = params.get("query") else {
        return Err(ErrorCondition::bad_request("missing GraphQL query"));
    };

    let variables = match params.get("variables") {
        Some(raw) => Some(serde_json::from_str(raw).map_err(|e| {
            ErrorCondition::bad_request(format!("invalid GraphQL variables: {e}"))
        })?),
        None => None,
    };

    Ok(GraphQlRequest {
        query: query.clone(),
        operation_name: params.get("operationName").cloned(),
        variables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::graphql::{EngineError, GraphQlResponse};
    use hyper::HeaderMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Engine double that records how often it was called
    struct CountingEngine {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl GraphQlEngine for CountingEngine {
        async fn start(&mut self, _schema: &str) -> Result<(), EngineError> {
            Ok(())
        }

        async fn execute(
            &self,
            request: GraphQlRequest,
        ) -> Result<GraphQlResponse, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(GraphQlResponse::data(serde_json::json!({
                "echo": request.query
            })))
        }
    }

    fn stage() -> (GraphQlStage, Arc<CountingEngine>) {
        let engine = Arc::new(CountingEngine {
            calls: AtomicUsize::new(0),
        });
        (GraphQlStage::new(engine.clone()), engine)
    }

    #[tokio::test]
    async fn test_post_forwards_to_engine() {
        let (stage, engine) = stage();
        let mut ctx = RequestContext::new(
            Method::POST,
            "/graphql",
            None,
            HeaderMap::new(),
            Environment::Development,
        );
        ctx.parsed_body = Some(ParsedBody::Json(
            serde_json::json!({ "query": "{hello}" }),
        ));
        match stage.apply(&mut ctx).await {
            StageOutcome::Handled(resp) => assert_eq!(resp.status(), StatusCode::OK),
            _ => panic!("expected engine response"),
        }
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_with_query_parameter() {
        let (stage, engine) = stage();
        let mut ctx = RequestContext::new(
            Method::GET,
            "/graphql",
            Some("query=%7Bhello%7D"),
            HeaderMap::new(),
            Environment::Development,
        );
        assert!(matches!(
            stage.apply(&mut ctx).await,
            StageOutcome::Handled(_)
        ));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_without_query_raises_400() {
        let (stage, _) = stage();
        let mut ctx = RequestContext::new(
            Method::GET,
            "/graphql",
            None,
            HeaderMap::new(),
            Environment::Development,
        );
        match stage.apply(&mut ctx).await {
            StageOutcome::Raised(err) => assert_eq!(err.status(), StatusCode::BAD_REQUEST),
            _ => panic!("expected raised condition"),
        }
    }

    #[tokio::test]
    async fn test_delete_raises_405() {
        let (stage, _) = stage();
        let mut ctx = RequestContext::new(
            Method::DELETE,
            "/graphql",
            None,
            HeaderMap::new(),
            Environment::Development,
        );
        match stage.apply(&mut ctx).await {
            StageOutcome::Raised(err) => {
                assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
            }
            _ => panic!("expected raised condition"),
        }
    }

    #[tokio::test]
    async fn test_engine_failure_raises_500() {
        struct FailingEngine;

        #[async_trait::async_trait]
        impl GraphQlEngine for FailingEngine {
            async fn start(&mut self, _schema: &str) -> Result<(), EngineError> {
                Ok(())
            }
            async fn execute(
                &self,
                _request: GraphQlRequest,
            ) -> Result<GraphQlResponse, EngineError> {
                Err(EngineError::Execution("engine crashed".to_string()))
            }
        }

        let stage = GraphQlStage::new(Arc::new(FailingEngine));
        let mut ctx = RequestContext::new(
            Method::GET,
            "/graphql",
            Some("query=%7Bhello%7D"),
            HeaderMap::new(),
            Environment::Development,
        );
        match stage.apply(&mut ctx).await {
            StageOutcome::Raised(err) => {
                assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
                assert!(err.message().contains("engine crashed"));
            }
            _ => panic!("expected raised condition"),
        }
    }
}
