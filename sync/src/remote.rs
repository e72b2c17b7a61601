//! Remote apply: delivering one queued action to the backend.

use std::time::Duration;

use async_trait::async_trait;
use fazenda_engine::SyncAction;
use reqwest::{Client, Url};
use tracing::debug;

use crate::error::{Result, SyncError};

/// Applies a sync action on the remote system. An `Err` means "try again later".
#[async_trait]
pub trait RemoteApplier: Send + Sync + 'static {
    async fn apply(&self, action: &SyncAction) -> Result<()>;
}

/// HTTP applier configuration.
#[derive(Debug, Clone)]
pub struct HttpApplierConfig {
    /// Base URL of the backend, without trailing slash
    pub base_url: String,
    /// Bearer token sent with every request
    pub auth_token: Option<String>,
    /// Transport-level request timeout
    pub timeout: Duration,
}

impl HttpApplierConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Posts each action to `{base_url}/sync/{entity}/{type}`.
#[derive(Debug, Clone)]
pub struct HttpApplier {
    config: HttpApplierConfig,
    client: Client,
}

impl HttpApplier {
    pub fn new(config: HttpApplierConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Endpoint for an action, keyed by entity and mutation kind. The entity
    /// is percent-encoded as a single path segment.
    pub fn endpoint(&self, action: &SyncAction) -> Result<Url> {
        let base = &self.config.base_url;
        let mut url = Url::parse(base)
            .map_err(|e| SyncError::Remote(format!("invalid base URL {}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| SyncError::Remote(format!("base URL cannot take a path: {}", base)))?
            .pop_if_empty()
            .extend(["sync", action.entity.as_str(), action.kind.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl RemoteApplier for HttpApplier {
    async fn apply(&self, action: &SyncAction) -> Result<()> {
        let url = self.endpoint(action)?;

        let mut request = self.client.post(url.clone()).json(action);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Remote(format!("HTTP {}: {}", status, body)));
        }

        debug!(action_id = %action.id, url = %url, "Action applied remotely");
        Ok(())
    }
}

/// Accepts every action after a fixed delay. Stands in for a backend during
/// local development.
#[derive(Debug, Clone)]
pub struct NoopApplier {
    delay: Duration,
}

impl NoopApplier {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for NoopApplier {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

#[async_trait]
impl RemoteApplier for NoopApplier {
    async fn apply(&self, action: &SyncAction) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        debug!(action_id = %action.id, entity = %action.entity, "No-op apply");
        Ok(())
    }
}
