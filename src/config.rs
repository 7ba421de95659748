use crate::domain::config_types::{
    CacheTtlSecs, DatabasePassword, Host, LogFormat, LogLevel, MaxConnections, Port, TimeoutMs,
};
use crate::domain::EngineConfig;
use crate::providers::bedrock::BedrockSettings;
use crate::relay::RelaySettings;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;

pub use config::ConfigError;

pub const ENV_PREFIX: &str = "ENGINE_RELAY";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub provider: BedrockSettings,
    pub relay: RelayConfig,
    pub logging: LoggingSettings,
    /// Static engine table used when the database is disabled
    #[serde(default)]
    pub engines: Vec<EngineConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: Host,
    pub port: Port,
    pub environment: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub host: Host,
    pub port: Port,
    pub username: String,
    pub password: DatabasePassword,
    pub database_name: String,
    pub max_connections: MaxConnections,
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheSettings {
    pub ttl_secs: CacheTtlSecs,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    pub cache_fetch_timeout_ms: TimeoutMs,
    pub first_fragment_timeout_ms: TimeoutMs,
    pub fragment_timeout_ms: TimeoutMs,
    pub send_timeout_ms: TimeoutMs,
    pub include_cost_in_chat_end: bool,
}

impl From<&RelayConfig> for RelaySettings {
    fn from(config: &RelayConfig) -> Self {
        Self {
            cache_fetch_timeout: config.cache_fetch_timeout_ms.as_duration(),
            first_fragment_timeout: config.first_fragment_timeout_ms.as_duration(),
            fragment_timeout: config.fragment_timeout_ms.as_duration(),
            send_timeout: config.send_timeout_ms.as_duration(),
            include_cost_in_chat_end: config.include_cost_in_chat_end,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Settings {
    /// Load from `./config` for the environment named by `ENVIRONMENT`
    pub fn new() -> Result<Self, ConfigError> {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        Self::load(Path::new("config"), &environment)
    }

    /// Defaults, then `default`, `{environment}` and `local` files from
    /// `config_dir`, then `ENGINE_RELAY__*` environment variables
    pub fn load(config_dir: &Path, environment: &str) -> Result<Self, ConfigError> {
        let file = |name: &str| {
            File::with_name(&config_dir.join(name).to_string_lossy()).required(false)
        };

        let config = Config::builder()
            .set_default("application.host", "0.0.0.0")?
            .set_default("application.port", 8080)?
            .set_default("application.environment", environment)?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432)?
            .set_default("database.username", "postgres")?
            .set_default("database.password", "password")?
            .set_default("database.database_name", "engine_relay")?
            .set_default("database.max_connections", 10)?
            .set_default("database.enabled", false)?
            .set_default("cache.ttl_secs", 3600)?
            .set_default("provider.region", "us-east-1")?
            .set_default(
                "provider.model_id",
                crate::providers::constants::bedrock::DEFAULT_MODEL_ID,
            )?
            .set_default("provider.max_tokens", 4096)?
            .set_default("provider.api", "converse")?
            .set_default(
                "provider.anthropic_version",
                crate::providers::constants::anthropic::DEFAULT_VERSION,
            )?
            .set_default("relay.cache_fetch_timeout_ms", 5_000)?
            .set_default("relay.first_fragment_timeout_ms", 60_000)?
            .set_default("relay.fragment_timeout_ms", 30_000)?
            .set_default("relay.send_timeout_ms", 5_000)?
            .set_default("relay.include_cost_in_chat_end", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .add_source(file("default"))
            .add_source(file(environment))
            .add_source(file("local"))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.database.username,
            self.database.password.as_ref(),
            self.database.host,
            self.database.port,
            self.database.database_name
        )
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings::from(&self.relay)
    }
}
