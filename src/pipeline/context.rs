//! Request context module
//!
//! One inbound request as seen by the pipeline. Parser stages fill in the
//! cookie map and the parsed body; the context lives for exactly one
//! request and is dropped once the response is produced.

use std::collections::HashMap;
use std::net::SocketAddr;

use hyper::body::Bytes;
use hyper::http::request::Parts;
use hyper::{HeaderMap, Method};

use crate::config::Environment;
use crate::logger::AccessLogEntry;

/// Body decoded by the body-parser stage
#[derive(Debug, Clone)]
pub enum ParsedBody {
    Json(serde_json::Value),
    Form(HashMap<String, String>),
}

/// In-flight access log record, completed when the response is known
pub(crate) struct LogRecord {
    pub entry: AccessLogEntry,
    pub started: std::time::Instant,
    pub format: String,
}

/// Per-request state threaded through the pipeline stages
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    /// Query string without the leading `?`
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub remote_addr: Option<SocketAddr>,
    /// Raw request body, collected before dispatch
    pub body: Bytes,
    /// Populated by the cookie-parser stage
    pub cookies: HashMap<String, String>,
    /// Populated by the body-parser stage
    pub parsed_body: Option<ParsedBody>,
    pub environment: Environment,
    /// Path seen by the current stage, with its mount prefix stripped
    pub route_path: String,
    /// Set by the CORS stage; the dispatcher decorates the final response
    pub(crate) cors: bool,
    /// Set by the access-log stage; the dispatcher completes the record
    pub(crate) log: Option<LogRecord>,
}

impl RequestContext {
    #[must_use]
    pub fn new(
        method: Method,
        path: &str,
        query: Option<&str>,
        headers: HeaderMap,
        environment: Environment,
    ) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: query.map(ToString::to_string),
            headers,
            remote_addr: None,
            body: Bytes::new(),
            cookies: HashMap::new(),
            parsed_body: None,
            environment,
            route_path: path.to_string(),
            cors: false,
            log: None,
        }
    }

    /// Build a context from hyper request parts. The body is collected
    /// separately by the server layer.
    #[must_use]
    pub fn from_parts(parts: &Parts, environment: Environment) -> Self {
        Self::new(
            parts.method.clone(),
            parts.uri.path(),
            parts.uri.query(),
            parts.headers.clone(),
            environment,
        )
    }

    /// First value of a header, if it is valid UTF-8
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// `Content-Type` without parameters (e.g. `application/json`)
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
            .map(|v| v.split(';').next().unwrap_or(v).trim())
    }
}
