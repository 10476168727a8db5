//! Startup wiring and run modes.

use crate::config::{BotConfig, RunMode};
use crate::dispatcher::Dispatcher;
use crate::error::StartupError;
use crate::polling::{self, PollSettings};
use crate::webhook::{self, WebhookState};
use relaybot_ai::AnthropicClient;
use relaybot_conversation::{
    ConversationEngine, InMemorySessionStore, NoTools, SessionStore, ToolCatalog, ToolGateway,
};
use relaybot_core::Result;
use relaybot_mcp::McpToolGateway;
use relaybot_telegram::TelegramClient;
use rootcause::prelude::ResultExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A fully wired bot, ready to receive updates.
pub struct Bridge {
    pub telegram: Arc<TelegramClient>,
    pub dispatcher: Arc<Dispatcher>,
}

impl Bridge {
    /// Builds the clients, starts the tool server and discovers its tools.
    ///
    /// # Errors
    ///
    /// Returns an error if a client cannot be built, the bot token is
    /// rejected, or the tool server cannot be started or listed.
    pub async fn build(config: &BotConfig) -> Result<Self, StartupError> {
        let telegram = Arc::new(
            TelegramClient::new(
                config.telegram_bot_token.expose(),
                config.telegram.api_base.clone(),
                config.http_timeout(),
            )
            .context(StartupError::Client { name: "Telegram" })?,
        );
        let model = AnthropicClient::new(
            config.anthropic_api_key.expose(),
            config.model.api_base.clone(),
            config.http_timeout(),
        )
        .context(StartupError::Client { name: "Anthropic" })?;

        let tools: Arc<dyn ToolGateway> = if config.tools.enabled {
            let settings = config.mcp_settings();
            let gateway = McpToolGateway::connect(&settings)
                .await
                .context(StartupError::ToolServer {
                    command: settings.command.clone(),
                })?;
            Arc::new(gateway)
        } else {
            info!("tools disabled");
            Arc::new(NoTools)
        };

        let catalog = ToolCatalog::new(
            tools
                .list_tools()
                .await
                .context(StartupError::ToolDiscovery)?,
        );
        info!(count = catalog.len(), tools = ?catalog.names(), "tool catalog ready");

        let me = telegram.get_me().await.context(StartupError::BotIdentity)?;
        info!(
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or_default(),
            "connected to Telegram"
        );

        let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let engine = Arc::new(ConversationEngine::new(
            config.engine_config(),
            Arc::new(model),
            tools,
            Arc::clone(&sessions),
            catalog,
        ));
        let dispatcher = Arc::new(Dispatcher::new(engine, sessions, telegram.clone()));

        Ok(Self {
            telegram,
            dispatcher,
        })
    }
}

/// Builds the bot and runs it in the configured mode until `shutdown`
/// resolves.
///
/// # Errors
///
/// Returns an error if startup fails or the webhook server stops with an
/// error.
pub async fn run<F>(config: BotConfig, shutdown: F) -> Result<(), StartupError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bridge = Bridge::build(&config).await?;

    match config.mode {
        RunMode::Polling => {
            let settings = PollSettings {
                timeout_secs: config.telegram.poll_timeout_seconds,
                error_pause: Duration::from_secs(config.telegram.poll_error_pause_seconds),
            };
            polling::run(bridge.telegram.as_ref(), &bridge.dispatcher, settings, shutdown).await;
        }
        RunMode::Webhook => {
            let addr = config.webhook.listen_addr;
            let state = Arc::new(WebhookState {
                dispatcher: bridge.dispatcher,
                registrar: bridge.telegram,
                public_url: config.webhook.public_url.clone(),
            });

            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| StartupError::Bind {
                    addr: addr.to_string(),
                    reason: e.to_string(),
                })?;
            info!("listening on http://{}", addr);

            axum::serve(listener, webhook::router(state))
                .with_graceful_shutdown(shutdown)
                .await
                .map_err(|e| StartupError::Serve {
                    reason: e.to_string(),
                })?;
        }
    }

    info!("relaybot stopped");
    Ok(())
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
