//! crates/vet_consult_core/src/presence.rs
//!
//! Tracks how many live connections each user holds. Presence is advisory:
//! connect/disconnect bookkeeping logs its failures and never surfaces them.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::Presence;
use crate::ports::{PortResult, PresenceRepository};

#[derive(Clone)]
pub struct PresenceTracker {
    repo: Arc<dyn PresenceRepository>,
}

impl PresenceTracker {
    pub fn new(repo: Arc<dyn PresenceRepository>) -> Self {
        Self { repo }
    }

    /// Must run once at startup, before the first live connection is accepted.
    /// Counts persisted by a process that died uncleanly would otherwise never
    /// come back down.
    pub async fn set_all_offline(&self) -> PortResult<()> {
        self.repo.reset_all().await?;
        info!("All presence records reset to offline.");
        Ok(())
    }

    pub async fn record_connect(&self, user_id: Uuid) {
        match self.repo.increment(user_id).await {
            Ok(presence) => info!(
                user_id = %user_id,
                devices = presence.online_device_count,
                "User connected."
            ),
            Err(e) => error!(user_id = %user_id, "Failed to record connect: {}", e),
        }
    }

    pub async fn record_disconnect(&self, user_id: Uuid) {
        match self.repo.decrement(user_id, Utc::now()).await {
            Ok(presence) => info!(
                user_id = %user_id,
                devices = presence.online_device_count,
                "User disconnected."
            ),
            Err(e) => error!(user_id = %user_id, "Failed to record disconnect: {}", e),
        }
    }

    /// The user's presence, offline with no last-seen time when they never connected.
    pub async fn presence_of(&self, user_id: Uuid) -> PortResult<Presence> {
        Ok(self
            .repo
            .get_presence(user_id)
            .await?
            .unwrap_or_else(|| Presence::offline(user_id)))
    }
}
