//! All-time-high price record

use crate::constants::ATH_KEY;
use crate::error::StoreError;
use crate::store::Store;
use crate::types::PriceAth;
use std::sync::Arc;

#[derive(Clone)]
pub struct AthTracker {
    store: Arc<dyn Store>,
}

impl AthTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Loads the stored ATH
    ///
    /// A missing or unreadable record yields the registered historical ATH
    /// rather than zero, so a cold start does not announce a new high.
    pub async fn get_current(&self) -> Result<PriceAth, StoreError> {
        let Some(raw) = self.store.get(ATH_KEY).await? else {
            return Ok(PriceAth::default());
        };

        match serde_json::from_str::<PriceAth>(&raw) {
            Ok(ath) => Ok(ath),
            Err(e) => {
                tracing::warn!(error = %e, "Corrupt ATH record, using registered ATH");
                Ok(PriceAth::default())
            }
        }
    }

    pub async fn is_new_ath(&self, price: f64) -> Result<bool, StoreError> {
        Ok(self.get_current().await?.is_new_ath(price))
    }

    /// Persists `ath` only if it beats the stored record
    ///
    /// Returns whether the record was written. Non-positive prices and
    /// prices at or below the current ATH leave the store untouched.
    pub async fn update(&self, ath: PriceAth) -> Result<bool, StoreError> {
        let current = self.get_current().await?;
        if !current.is_new_ath(ath.ath_price) {
            tracing::debug!(
                price = ath.ath_price,
                ath_price = current.ath_price,
                "Not above the stored ATH, keeping it"
            );
            return Ok(false);
        }

        self.store.set(ATH_KEY, serde_json::to_string(&ath)?).await?;
        Ok(true)
    }

    pub async fn reset(&self) -> Result<(), StoreError> {
        self.store.delete(ATH_KEY).await
    }
}
