//! Network reachability signal.
//!
//! The outbox asks once at startup whether the remote is reachable and then
//! follows a `watch` channel of connectivity changes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::Result;

/// Result of a reachability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkState {
    pub is_connected: bool,
}

/// Source of connectivity information.
#[async_trait]
pub trait Reachability: Send + Sync + 'static {
    /// Current connectivity.
    async fn fetch(&self) -> NetworkState;

    /// Stream of connectivity changes.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Publish `connected` unless it is already the current value.
fn publish(tx: &watch::Sender<bool>, connected: bool) -> bool {
    tx.send_if_modified(|current| {
        if *current == connected {
            false
        } else {
            *current = connected;
            true
        }
    })
}

/// A connectivity flag flipped by hand.
///
/// Used when no probe is configured and by tests that simulate the network
/// going up and down.
#[derive(Debug)]
pub struct ManualReachability {
    tx: watch::Sender<bool>,
}

impl ManualReachability {
    pub fn new(connected: bool) -> Self {
        let (tx, _rx) = watch::channel(connected);
        Self { tx }
    }

    /// Shared handle, ready to hand to the outbox.
    pub fn new_shared(connected: bool) -> Arc<Self> {
        Arc::new(Self::new(connected))
    }

    /// Change connectivity. Subscribers only see actual changes.
    pub fn set_connected(&self, connected: bool) {
        if publish(&self.tx, connected) {
            info!(connected, "Reachability changed");
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.tx.borrow()
    }
}

#[async_trait]
impl Reachability for ManualReachability {
    async fn fetch(&self) -> NetworkState {
        NetworkState {
            is_connected: self.is_connected(),
        }
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Shortest delay between probes.
pub const MIN_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Polls a URL and reports the remote reachable while it answers 2xx.
#[derive(Debug)]
pub struct HttpProbe {
    url: String,
    interval: Duration,
    client: Client,
    tx: watch::Sender<bool>,
}

impl HttpProbe {
    /// Create a probe. Starts out disconnected until the first probe succeeds.
    pub fn new(url: impl Into<String>, interval: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(interval.clamp(MIN_PROBE_INTERVAL, Duration::from_secs(5)))
            .build()?;
        let (tx, _rx) = watch::channel(false);

        Ok(Self {
            url: url.into(),
            interval,
            client,
            tx,
        })
    }

    /// Probe once and publish the result.
    pub async fn probe(&self) -> bool {
        let connected = match self.client.get(&self.url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %self.url, error = %e, "Reachability probe failed");
                false
            }
        };

        if publish(&self.tx, connected) {
            info!(url = %self.url, connected, "Reachability changed");
        }
        connected
    }

    /// Start polling in the background.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval.max(MIN_PROBE_INTERVAL));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.probe().await;
            }
        })
    }
}

#[async_trait]
impl Reachability for HttpProbe {
    async fn fetch(&self) -> NetworkState {
        NetworkState {
            is_connected: self.probe().await,
        }
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn manual_reachability_notifies_changes_only() {
        let reachability = ManualReachability::new(false);
        let mut rx = reachability.subscribe();
        assert!(!reachability.fetch().await.is_connected);

        reachability.set_connected(false);
        assert!(!rx.has_changed().unwrap());

        reachability.set_connected(true);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        assert!(reachability.fetch().await.is_connected);
    }

    #[tokio::test]
    async fn probe_against_closed_port_is_offline() {
        let probe = HttpProbe::new("http://127.0.0.1:9/health", Duration::from_millis(200)).unwrap();
        assert!(!probe.fetch().await.is_connected);
        assert!(!*probe.subscribe().borrow());
    }

    #[test]
    fn network_state_serializes_camel_case() {
        let json = serde_json::to_string(&NetworkState { is_connected: true }).unwrap();
        assert_eq!(json, r#"{"isConnected":true}"#);
    }
}
