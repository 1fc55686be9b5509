//! Resolver-map engine module
//!
//! A development engine backed by a map from top-level field names to
//! resolution functions. It resolves exactly one top-level field per query
//! and performs no validation against the schema; it exists so the
//! endpoint is exercisable without a full executor behind it.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::{EngineError, GraphQlEngine, GraphQlRequest, GraphQlResponse};

/// A resolution function for one top-level field
pub type Resolver = Arc<dyn Fn(&GraphQlRequest) -> Value + Send + Sync>;

/// Minimal engine dispatching single top-level fields through a resolver map
pub struct FieldResolverEngine {
    resolvers: HashMap<String, Resolver>,
    schema: Option<String>,
}

impl FieldResolverEngine {
    #[must_use]
    pub fn new(resolvers: HashMap<String, Resolver>) -> Self {
        Self {
            resolvers,
            schema: None,
        }
    }

    fn started(&self) -> bool {
        self.schema.is_some()
    }
}

#[async_trait::async_trait]
impl GraphQlEngine for FieldResolverEngine {
    async fn start(&mut self, schema: &str) -> Result<(), EngineError> {
        if self.started() {
            return Err(EngineError::Startup("engine already started".to_string()));
        }
        if schema.trim().is_empty() {
            return Err(EngineError::Startup("schema text is empty".to_string()));
        }
        self.schema = Some(schema.to_string());
        Ok(())
    }

    async fn execute(&self, request: GraphQlRequest) -> Result<GraphQlResponse, EngineError> {
        if !self.started() {
            return Err(EngineError::Execution("engine not started".to_string()));
        }

        let Some(field) = top_level_field(&request.query) else {
            return Ok(GraphQlResponse::error("query has no selection set"));
        };

        match self.resolvers.get(field) {
            Some(resolver) => {
                let mut data = serde_json::Map::new();
                data.insert(field.to_string(), resolver(&request));
                Ok(GraphQlResponse::data(Value::Object(data)))
            }
            None => Ok(GraphQlResponse::error(format!(
                "Cannot query field \"{field}\" on type \"Query\""
            ))),
        }
    }
}

/// First field name inside the outermost selection set. This is a token
/// scan, not a parser; nested selections and multiple fields are ignored.
fn top_level_field(query: &str) -> Option<&str> {
    let after_brace = &query[query.find('{')? + 1..];
    let start = after_brace.find(|c: char| c.is_alphanumeric() || c == '_')?;
    let rest = &after_brace[start..];
    let end = rest
        .find(|c: char| !c.is_alphanumeric() && c != '_')
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_engine() -> FieldResolverEngine {
        let mut resolvers: HashMap<String, Resolver> = HashMap::new();
        resolvers.insert(
            "hello".to_string(),
            Arc::new(|_| Value::String("Hello world!".to_string())),
        );
        FieldResolverEngine::new(resolvers)
    }

    #[test]
    fn test_top_level_field() {
        assert_eq!(top_level_field("{hello}"), Some("hello"));
        assert_eq!(top_level_field("query { user { id } }"), Some("user"));
        assert_eq!(top_level_field("no braces"), None);
    }

    #[tokio::test]
    async fn test_execute_before_start_fails() {
        let engine = hello_engine();
        let result = engine.execute(GraphQlRequest::new("{hello}")).await;
        assert!(matches!(result, Err(EngineError::Execution(_))));
    }

    #[tokio::test]
    async fn test_start_then_execute() {
        let mut engine = hello_engine();
        engine.start("type Query { hello: String }").await.unwrap();

        let response = engine
            .execute(GraphQlRequest::new("{hello}"))
            .await
            .unwrap();
        assert_eq!(
            response.data,
            Some(serde_json::json!({ "hello": "Hello world!" }))
        );
        assert!(response.errors.is_empty());
    }

    #[tokio::test]
    async fn test_second_start_rejected() {
        let mut engine = hello_engine();
        engine.start("type Query { hello: String }").await.unwrap();
        let again = engine.start("type Query { hello: String }").await;
        assert!(matches!(again, Err(EngineError::Startup(_))));
    }

    #[tokio::test]
    async fn test_unknown_field_reports_error() {
        let mut engine = hello_engine();
        engine.start("type Query { hello: String }").await.unwrap();

        let response = engine
            .execute(GraphQlRequest::new("{goodbye}"))
            .await
            .unwrap();
        assert!(response.data.is_none());
        assert!(response.errors[0].message.contains("goodbye"));
    }

    #[tokio::test]
    async fn test_empty_schema_rejected() {
        let mut engine = hello_engine();
        let result = engine.start("   ").await;
        assert!(matches!(result, Err(EngineError::Startup(_))));
    }
}
