// Configuration module
// Typed application configuration loaded from config.toml and environment.

mod types;

use std::net::SocketAddr;

pub use types::{
    AssetsConfig, Config, Environment, GraphQlConfig, HttpConfig, LoggingConfig,
    PerformanceConfig, ServerConfig,
};

impl Config {
    /// Load configuration from the default `config.toml` (optional) plus
    /// `GQLD_`-prefixed environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from the specified file path (without extension).
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::Environment::with_prefix("GQLD"))
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 9000)?
            .set_default("server.environment", "development")?
            .set_default("assets.public_dir", "public")?
            .set_default("graphql.mount_path", "/graphql")?
            .set_default("graphql.schema_file", "schema.graphql")?
            .set_default("logging.format", "dev")?
            .set_default("logging.access_log", true)?
            .set_default("http.enable_cors", true)?
            .set_default("http.max_body_size", 1_048_576)? // 1MB
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .build()?;

        settings.try_deserialize()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid listen address: {e}"))
    }
}
