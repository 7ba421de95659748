use crate::cache::{ConfigStore, InMemoryConfigStore, PromptCache};
use crate::config::Settings;
use crate::domain::EngineConfig;
use crate::gateway::{self, GatewayState};
use crate::infrastructure::log_messages::{application as log_msg, configuration};
use crate::infrastructure::{Database, PostgresConfigStore, PostgresUsageTracker, MIGRATIONS_DIR};
use crate::providers::bedrock::BedrockCompletionProvider;
use crate::providers::CompletionProvider;
use crate::relay::{ConnectionRegistry, RelayService, TracingUsageTracker, UsageTracker};
use crate::{Error, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    database: Option<Database>,
    relay: Arc<RelayService>,
    registry: Arc<ConnectionRegistry>,
}

impl Application {
    #[instrument]
    pub async fn new() -> Result<Self> {
        Self::from_settings(Settings::new()?).await
    }

    /// Build against Bedrock using the ambient AWS credential chain
    #[instrument(skip_all)]
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let provider = BedrockCompletionProvider::from_env(settings.provider.clone()).await;
        Self::with_provider(settings, Arc::new(provider)).await
    }

    /// Wire stores, cache and relay around an already built provider
    pub async fn with_provider(
        settings: Settings,
        provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self> {
        info!(environment = %settings.application.environment, "{}", log_msg::STARTING);
        check_engine_table(&settings.engines)?;

        let (database, store, tracker): (
            Option<Database>,
            Arc<dyn ConfigStore>,
            Arc<dyn UsageTracker>,
        ) = if settings.database.enabled {
            let database = Database::connect(&settings.database, &settings.database_url()).await?;
            database.run_migrations(Path::new(MIGRATIONS_DIR)).await?;

            let store = PostgresConfigStore::new(database.pool().clone());
            for engine in &settings.engines {
                store.upsert(engine).await?;
            }
            let tracker = PostgresUsageTracker::new(database.pool().clone());
            (Some(database), Arc::new(store), Arc::new(tracker))
        } else {
            warn!("{}", log_msg::DATABASE_DISABLED);
            (
                None,
                Arc::new(InMemoryConfigStore::new(settings.engines.clone())),
                Arc::new(TracingUsageTracker),
            )
        };
        info!(count = settings.engines.len(), "{}", configuration::ENGINES_LOADED);

        let cache = Arc::new(PromptCache::new(store, settings.cache.ttl_secs.as_duration()));
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = RelayService::new(cache, provider, registry.clone(), tracker)
            .with_settings(settings.relay_settings());

        Ok(Self {
            settings,
            database,
            relay: Arc::new(relay),
            registry,
        })
    }

    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let address = format!(
            "{}:{}",
            self.settings.application.host, self.settings.application.port
        );
        info!(address = %address, "{}", log_msg::STARTING_SERVER);

        let listener = TcpListener::bind(&address).await?;
        info!("{}", log_msg::STARTED_SUCCESSFULLY);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }

    pub fn router(&self) -> axum::Router {
        let state = GatewayState::new(self.relay.clone(), self.registry.clone());
        let state = match &self.database {
            Some(database) => state.with_database(database.clone()),
            None => state,
        };
        gateway::router(state)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    pub fn relay(&self) -> &Arc<RelayService> {
        &self.relay
    }
}

fn check_engine_table(engines: &[EngineConfig]) -> Result<()> {
    let mut seen = HashSet::new();
    for engine in engines {
        if !seen.insert(&engine.engine_id) {
            return Err(Error::InvalidEngine(format!(
                "engine '{}' is configured more than once",
                engine.engine_id
            )));
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("{}", log_msg::SHUTTING_DOWN);
}
