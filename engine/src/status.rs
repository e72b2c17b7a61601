//! Outbox status and its state machine.
//!
//! ```text
//! offline --regained--> online --pass started--> syncing
//! syncing --completed--> online
//! syncing --failed-----> error
//! <any>   --lost-------> offline
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-wide sync status shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Offline,
    Online,
    Syncing,
    Error,
}

/// Something that moves the status machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    ReachabilityLost,
    ReachabilityRegained,
    PassStarted,
    PassCompleted,
    PassFailed,
}

impl SyncStatus {
    /// Status for a freshly started outbox.
    pub fn initial(connected: bool) -> Self {
        if connected {
            SyncStatus::Online
        } else {
            SyncStatus::Offline
        }
    }

    /// Apply an event. There is no terminal state.
    pub fn next(self, event: StatusEvent) -> Self {
        match event {
            StatusEvent::ReachabilityLost => SyncStatus::Offline,
            StatusEvent::ReachabilityRegained => SyncStatus::Online,
            StatusEvent::PassStarted => SyncStatus::Syncing,
            StatusEvent::PassCompleted => SyncStatus::Online,
            StatusEvent::PassFailed => SyncStatus::Error,
        }
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Offline => "offline",
            SyncStatus::Online => "online",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
