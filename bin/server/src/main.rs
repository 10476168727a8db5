use relaybot_server::{BotConfig, run, shutdown_signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match BotConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(mode = ?config.mode, tools = config.tools.enabled, "loaded configuration");

    if let Err(e) = run(config, shutdown_signal()).await {
        tracing::error!(error = %e, "relaybot failed");
        std::process::exit(1);
    }
}
