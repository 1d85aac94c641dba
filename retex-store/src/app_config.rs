use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub importer: ImporterConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImporterConfig {
    /// Feeds larger than this are rejected before parsing; handed to
    /// `CatalogImporter::with_max_feed_bytes` at wiring time.
    #[serde(default = "default_max_feed_bytes")]
    pub max_feed_bytes: usize,
}

fn default_max_feed_bytes() -> usize {
    8 * 1024 * 1024
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment file, optional.
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `RETEX_DATABASE__URL=...` sets `database.url`.
            .add_source(config::Environment::with_prefix("RETEX").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
