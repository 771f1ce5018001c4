//! Pool cap change notifier

use super::{Notifier, NotifyOutcome, NotifyReason};
use crate::broadcast::{Broadcaster, ChatId, Message};
use crate::constants::CAP_INFO_KEY;
use crate::error::NotifyError;
use crate::format::cap_change_text;
use crate::store::Store;
use crate::types::CapInfo;
use async_trait::async_trait;
use std::sync::Arc;

pub struct CapNotifier {
    store: Arc<dyn Store>,
    broadcaster: Arc<dyn Broadcaster>,
    channels: Vec<ChatId>,
}

impl CapNotifier {
    pub fn new(store: Arc<dyn Store>, broadcaster: Arc<dyn Broadcaster>, channels: Vec<ChatId>) -> Self {
        Self {
            store,
            broadcaster,
            channels,
        }
    }

    /// Last stored cap record, `CapInfo::error()` when absent or unreadable
    pub async fn load_old(&self) -> Result<CapInfo, NotifyError> {
        let Some(raw) = self.store.get(CAP_INFO_KEY).await? else {
            return Ok(CapInfo::error());
        };

        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Corrupt cap record, treating as absent");
            CapInfo::error()
        }))
    }

    async fn save(&self, info: &CapInfo) -> Result<(), NotifyError> {
        let raw = serde_json::to_string(info).map_err(crate::error::StoreError::from)?;
        self.store.set(CAP_INFO_KEY, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for CapNotifier {
    type Sample = CapInfo;

    async fn on_data(&self, mut new_info: CapInfo) -> Result<NotifyOutcome, NotifyError> {
        if !new_info.is_valid() {
            tracing::warn!(
                cap = new_info.cap,
                stacked = new_info.stacked,
                "Invalid cap info, discarding"
            );
            return Ok(NotifyOutcome::Discarded);
        }

        let old_info = self.load_old().await?;

        if new_info.price <= 0.0 && old_info.is_valid() {
            new_info.price = old_info.price;
        }

        self.save(&new_info).await?;

        // Nothing stored yet (or unreadable): there is no previous cap to
        // announce a change from, only the new baseline is kept
        if !old_info.is_valid() {
            tracing::info!(cap = new_info.cap, "First cap record stored");
            return Ok(NotifyOutcome::Suppressed);
        }

        if new_info.cap == old_info.cap {
            return Ok(NotifyOutcome::Suppressed);
        }

        tracing::info!(old_cap = old_info.cap, new_cap = new_info.cap, "Pool cap changed");
        self.broadcaster
            .broadcast(&self.channels, Message::text(cap_change_text(&old_info, &new_info)))
            .await?;
        Ok(NotifyOutcome::Notified(NotifyReason::CapChanged))
    }

    fn name(&self) -> &'static str {
        "cap"
    }
}
