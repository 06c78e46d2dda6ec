pub mod artifacts;
pub mod dispatch;
pub mod download;
pub mod error;
pub mod registry;
pub mod tokens;
pub mod webhook;

use std::sync::Arc;

use anyhow::{Context, Result};
use courier_core::config::GitHubConfig;

use crate::{registry::InstallationRegistry, tokens::TokenBroker, webhook::DeliveryLog};

/// Shared GitHub-facing state: the token broker, the installation registry,
/// and the webhook delivery log. Owned by the application state and passed
/// explicitly; there are no process-wide singletons.
pub struct GitHub {
    pub config: GitHubConfig,
    pub broker: TokenBroker,
    pub registry: InstallationRegistry,
    pub deliveries: DeliveryLog,
    /// Client for the binary download hops. API calls go through octocrab
    /// clients built by the broker.
    pub http: reqwest::Client,
}

impl GitHub {
    pub fn new(config: &GitHubConfig) -> Result<Arc<Self>> {
        let http = reqwest::Client::builder()
            .user_agent("repo-courier")
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Arc::new(Self {
            config: config.clone(),
            broker: TokenBroker::new(config),
            registry: InstallationRegistry::default(),
            deliveries: DeliveryLog::new(config.delivery_window),
            http,
        }))
    }
}
