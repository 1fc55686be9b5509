//! GraphQL collaborator module
//!
//! The execution engine is external to the pipeline: this module defines
//! the wire types, the engine trait with its start-once lifecycle, and a
//! small resolver-map engine for development use.

mod engine;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use engine::{FieldResolverEngine, Resolver};

/// One GraphQL request, from a POST body or GET query parameters
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlRequest {
    pub query: String,
    #[serde(rename = "operationName", default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Option<Value>,
}

impl GraphQlRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: None,
        }
    }
}

/// Engine-level error in a GraphQL response
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlError {
    pub message: String,
}

/// One GraphQL response body
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQlError>,
}

impl GraphQlResponse {
    #[must_use]
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            errors: vec![GraphQlError {
                message: message.into(),
            }],
        }
    }
}

/// Failures crossing the engine boundary
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine startup failed: {0}")]
    Startup(String),
    #[error("engine execution failed: {0}")]
    Execution(String),
}

/// GraphQL execution engine collaborator.
///
/// `start` runs exactly once per process, before the server accepts
/// connections; the schema text is handed over there. After a successful
/// start the engine is shared immutably across requests.
#[async_trait::async_trait]
pub trait GraphQlEngine: Send + Sync {
    async fn start(&mut self, schema: &str) -> Result<(), EngineError>;

    async fn execute(&self, request: GraphQlRequest) -> Result<GraphQlResponse, EngineError>;
}
