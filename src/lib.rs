//! gqld — a small GraphQL web-server bootstrap.
//!
//! The crate wires an HTTP listener to an ordered request pipeline:
//! access logging, CORS, body/cookie parsing, static assets, a GraphQL
//! endpoint, mounted routers, a 404 fallback and a central error page.
//! GraphQL execution, router business logic and template internals are
//! collaborator traits supplied by the caller.

pub mod config;
pub mod graphql;
pub mod http;
pub mod logger;
pub mod pipeline;
pub mod render;
pub mod routes;
pub mod server;
