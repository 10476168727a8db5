//! Domain error types for the bot server.
//!
//! Errors are plain enums wrapped in `rootcause::Report` as they propagate;
//! startup code layers [`StartupError`] on top of the client crates' errors.

use std::fmt;

/// Configuration errors. All are fatal at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration source could not be read or parsed.
    Load { reason: String },
    /// A required value is missing.
    Missing { key: &'static str },
    /// A value is present but unusable.
    Invalid { key: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { reason } => write!(f, "failed to load configuration: {reason}"),
            Self::Missing { key } => write!(f, "{key} is not set"),
            Self::Invalid { key, reason } => write!(f, "{key} is invalid: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Startup stages, used as context when wiring the bot fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// Building a collaborator client failed.
    Client { name: &'static str },
    /// The bot token was rejected or Telegram is unreachable.
    BotIdentity,
    /// The tool server could not be started or initialized.
    ToolServer { command: String },
    /// Tool discovery failed.
    ToolDiscovery,
    /// The webhook listener could not be bound.
    Bind { addr: String, reason: String },
    /// The webhook server stopped with an error.
    Serve { reason: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client { name } => write!(f, "failed to build {name} client"),
            Self::BotIdentity => write!(f, "failed to verify the bot token"),
            Self::ToolServer { command } => write!(f, "failed to start tool server '{command}'"),
            Self::ToolDiscovery => write!(f, "failed to discover tools"),
            Self::Bind { addr, reason } => write!(f, "failed to bind {addr}: {reason}"),
            Self::Serve { reason } => write!(f, "webhook server failed: {reason}"),
        }
    }
}

impl std::error::Error for StartupError {}

/// Webhook registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// Neither a public URL nor a request host is available.
    NoBaseUrl,
    /// The `setWebhook` exchange failed.
    Registration,
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBaseUrl => write!(f, "no public URL configured and no Host header"),
            Self::Registration => write!(f, "failed to register webhook"),
        }
    }
}

impl std::error::Error for SetupError {}
