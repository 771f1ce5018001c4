//! Per-key minimum interval gate for repeated notifications

use crate::error::StoreError;
use crate::store::Store;
use crate::timespan::now_ts;
use std::sync::Arc;

/// Remembers when each notification kind last fired
///
/// Checking and firing are separate store operations, so two pollers racing
/// on the same key may both pass `can_fire`.
#[derive(Clone)]
pub struct CooldownTracker {
    store: Arc<dyn Store>,
}

impl CooldownTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    fn key(name: &str) -> String {
        format!("Cooldown:{}", name)
    }

    /// Unix seconds of the last fire, `None` if never fired or unreadable
    pub async fn last_fired(&self, name: &str) -> Result<Option<f64>, StoreError> {
        let raw = self.store.get(&Self::key(name)).await?;
        Ok(raw.and_then(|value| match value.parse::<f64>() {
            Ok(ts) => Some(ts),
            Err(_) => {
                tracing::warn!(key = name, value = %value, "Unreadable cooldown timestamp, treating as never fired");
                None
            }
        }))
    }

    /// True iff `name` never fired or fired at least `interval_sec` ago
    pub async fn can_fire(&self, name: &str, interval_sec: u64) -> Result<bool, StoreError> {
        self.can_fire_at(name, interval_sec, now_ts()).await
    }

    pub async fn can_fire_at(
        &self,
        name: &str,
        interval_sec: u64,
        now: f64,
    ) -> Result<bool, StoreError> {
        Ok(match self.last_fired(name).await? {
            Some(last) => now - last >= interval_sec as f64,
            None => true,
        })
    }

    /// Records now as the last fire time, without checking the gate
    pub async fn fire(&self, name: &str) -> Result<(), StoreError> {
        self.fire_at(name, now_ts()).await
    }

    pub async fn fire_at(&self, name: &str, now: f64) -> Result<(), StoreError> {
        self.store.set(&Self::key(name), now.to_string()).await
    }
}
