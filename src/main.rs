use anyhow::Result;
use engine_relay::config::{LoggingSettings, Settings};
use engine_relay::domain::config_types::LogFormat;
use engine_relay::infrastructure::log_messages::{application as log_msg, configuration};
use engine_relay::Application;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    init_tracing(&settings.logging);
    info!(environment = %settings.application.environment, "{}", configuration::CONFIG_LOADED);

    info!("{}", log_msg::STARTING);

    let app = Application::from_settings(settings).await?;
    app.run().await?;

    Ok(())
}
