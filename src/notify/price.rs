//! Price notifier: all-time highs, significant moves and periodic updates

use super::{Notifier, NotifyOutcome, NotifyReason};
use crate::ath::AthTracker;
use crate::broadcast::{Broadcaster, ChatId, Message};
use crate::config::PriceNotifierSettings;
use crate::constants::{
    CD_KEY_ATH_NOTIFIED, CD_KEY_PRICE_FALL_NOTIFIED, CD_KEY_PRICE_NOTIFIED,
    CD_KEY_PRICE_RISE_NOTIFIED,
};
use crate::cooldown::CooldownTracker;
use crate::error::NotifyError;
use crate::format::price_change_text;
use crate::store::Store;
use crate::time_series::PriceTimeSeries;
use crate::timespan::now_ts;
use crate::types::{calc_percent_change, FairPrice, HistoricalPrices, PriceAth, PriceReport};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::sync::Arc;

pub struct PriceNotifier {
    settings: PriceNotifierSettings,
    cooldowns: CooldownTracker,
    ath: AthTracker,
    series: PriceTimeSeries,
    broadcaster: Arc<dyn Broadcaster>,
    channels: Vec<ChatId>,
}

impl PriceNotifier {
    pub fn new(
        settings: PriceNotifierSettings,
        store: Arc<dyn Store>,
        series: PriceTimeSeries,
        broadcaster: Arc<dyn Broadcaster>,
        channels: Vec<ChatId>,
    ) -> Self {
        Self {
            settings,
            cooldowns: CooldownTracker::new(store.clone()),
            ath: AthTracker::new(store),
            series,
            broadcaster,
            channels,
        }
    }

    pub fn ath_tracker(&self) -> &AthTracker {
        &self.ath
    }

    /// Records a new ATH and announces it if the ATH cooldown allows
    ///
    /// Returns true when the announcement went out, which ends the cycle.
    async fn handle_ath(&self, fair_price: &FairPrice) -> Result<bool, NotifyError> {
        let price = fair_price.real_price;
        if !self.ath.is_new_ath(price).await? {
            return Ok(false);
        }

        tracing::info!(price, "New all-time high");
        self.ath.update(PriceAth::new(now_ts() as i64, price)).await?;

        if !self
            .cooldowns
            .can_fire(CD_KEY_ATH_NOTIFIED, self.settings.ath_cooldown)
            .await?
        {
            tracing::debug!("ATH cooldown active, falling back to change evaluation");
            return Ok(false);
        }

        self.cooldowns.fire(CD_KEY_ATH_NOTIFIED).await?;
        // An ATH is also a rise; keep the rise gate from firing right after it
        self.cooldowns.fire(CD_KEY_PRICE_RISE_NOTIFIED).await?;

        let history = self.series.historical_triplet().await?;
        self.notify_price_table(fair_price, history, true).await?;
        Ok(true)
    }

    async fn handle_new_price(&self, fair_price: &FairPrice) -> Result<NotifyOutcome, NotifyError> {
        let history = self.series.historical_triplet().await?;
        let price = fair_price.real_price;
        let mut reason = None;

        if history.price_1h > 0.0 {
            let percent_change = calc_percent_change(history.price_1h, price);

            if percent_change.abs() >= self.settings.percent_change_threshold {
                if percent_change > 0.0
                    && self
                        .cooldowns
                        .can_fire(CD_KEY_PRICE_RISE_NOTIFIED, self.settings.change_cd)
                        .await?
                {
                    tracing::info!(percent_change, "Significant price rise");
                    self.cooldowns.fire(CD_KEY_PRICE_RISE_NOTIFIED).await?;
                    reason = Some(NotifyReason::PriceRise);
                } else if percent_change < 0.0
                    && self
                        .cooldowns
                        .can_fire(CD_KEY_PRICE_FALL_NOTIFIED, self.settings.change_cd)
                        .await?
                {
                    tracing::info!(percent_change, "Significant price fall");
                    self.cooldowns.fire(CD_KEY_PRICE_FALL_NOTIFIED).await?;
                    reason = Some(NotifyReason::PriceFall);
                }
            }
        } else {
            tracing::debug!("No 1h price average yet, skipping change evaluation");
        }

        if reason.is_none()
            && self
                .cooldowns
                .can_fire(CD_KEY_PRICE_NOTIFIED, self.settings.global_cd)
                .await?
        {
            tracing::info!("No significant change but global cooldown elapsed, notifying anyway");
            reason = Some(NotifyReason::Periodic);
        }

        match reason {
            Some(reason) => {
                self.notify_price_table(fair_price, history, false).await?;
                Ok(NotifyOutcome::Notified(reason))
            }
            None => Ok(NotifyOutcome::Suppressed),
        }
    }

    async fn notify_price_table(
        &self,
        fair_price: &FairPrice,
        history: HistoricalPrices,
        ath: bool,
    ) -> Result<(), NotifyError> {
        self.cooldowns.fire(CD_KEY_PRICE_NOTIFIED).await?;

        let report = PriceReport {
            history,
            fair_price: fair_price.clone(),
            last_ath: self.ath.get_current().await?,
        };
        self.broadcaster
            .broadcast(&self.channels, Message::text(price_change_text(&report, ath)))
            .await?;

        if ath {
            self.send_ath_sticker().await?;
        }
        Ok(())
    }

    async fn send_ath_sticker(&self) -> Result<(), NotifyError> {
        let sticker = self.settings.ath_stickers.choose(&mut rand::thread_rng()).cloned();
        if let Some(sticker) = sticker {
            self.broadcaster
                .broadcast(&self.channels, Message::sticker(sticker))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for PriceNotifier {
    type Sample = FairPrice;

    async fn on_data(&self, fair_price: FairPrice) -> Result<NotifyOutcome, NotifyError> {
        if self.handle_ath(&fair_price).await? {
            return Ok(NotifyOutcome::Notified(NotifyReason::AllTimeHigh));
        }
        self.handle_new_price(&fair_price).await
    }

    fn name(&self) -> &'static str {
        "price"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::mock::RecordingBroadcaster;
    use crate::constants::ATH_KEY;
    use crate::store::{MemoryStore, StreamId};
    use crate::timespan::HOUR;

    struct Harness {
        notifier: PriceNotifier,
        store: Arc<MemoryStore>,
        broadcaster: Arc<RecordingBroadcaster>,
        series: PriceTimeSeries,
    }

    fn settings(stickers: Vec<String>) -> PriceNotifierSettings {
        PriceNotifierSettings {
            global_cd: 12 * HOUR as u64,
            change_cd: HOUR as u64,
            percent_change_threshold: 5.0,
            ath_cooldown: 2 * HOUR as u64,
            ath_stickers: stickers,
        }
    }

    fn harness(stickers: Vec<String>) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let broadcaster = Arc::new(RecordingBroadcaster::new());
        let series = PriceTimeSeries::new("TEST", store.clone());
        let notifier = PriceNotifier::new(
            settings(stickers),
            store.clone(),
            series.clone(),
            broadcaster.clone(),
            vec!["@alerts".to_string()],
        );
        Harness {
            notifier,
            store,
            broadcaster,
            series,
        }
    }

    fn sample(price: f64) -> FairPrice {
        FairPrice {
            real_price: price,
            ..FairPrice::default()
        }
    }

    /// Puts an observation one hour back so the 1h average equals `price`
    async fn seed_hour_ago(series: &PriceTimeSeries, price: f64) {
        let ms = (now_ts() as i64 - HOUR) * 1000;
        series.add_price_at(StreamId::min_at(ms), price).await.unwrap();
    }

    /// Writes the ATH record as is, below the registered ATH if asked to
    async fn store_ath(h: &Harness, ath: PriceAth) {
        h.store
            .set(ATH_KEY, serde_json::to_string(&ath).unwrap())
            .await
            .unwrap();
    }

    async fn cooldowns_fired(h: &Harness, key: &str) -> bool {
        CooldownTracker::new(h.store.clone())
            .last_fired(key)
            .await
            .unwrap()
            .is_some()
    }

    #[tokio::test]
    async fn test_significant_rise_notifies_once() {
        let h = harness(vec![]);
        // keep the periodic fallback out of the picture
        CooldownTracker::new(h.store.clone())
            .fire(CD_KEY_PRICE_NOTIFIED)
            .await
            .unwrap();
        seed_hour_ago(&h.series, 1.0).await;

        let first = h.notifier.on_data(sample(1.06)).await.unwrap();
        assert_eq!(first, NotifyOutcome::Notified(NotifyReason::PriceRise));
        assert_eq!(h.broadcaster.calls(), 1);
        assert!(h.broadcaster.texts()[0].contains("1h: +6.00%"));
        assert!(cooldowns_fired(&h, CD_KEY_PRICE_RISE_NOTIFIED).await);

        let second = h.notifier.on_data(sample(1.06)).await.unwrap();
        assert_eq!(second, NotifyOutcome::Suppressed);
        assert_eq!(h.broadcaster.calls(), 1);
    }

    #[tokio::test]
    async fn test_significant_fall_uses_fall_gate() {
        let h = harness(vec![]);
        seed_hour_ago(&h.series, 1.0).await;

        let outcome = h.notifier.on_data(sample(0.9)).await.unwrap();
        assert_eq!(outcome, NotifyOutcome::Notified(NotifyReason::PriceFall));
        assert!(cooldowns_fired(&h, CD_KEY_PRICE_FALL_NOTIFIED).await);
        assert!(!cooldowns_fired(&h, CD_KEY_PRICE_RISE_NOTIFIED).await);
    }

    #[tokio::test]
    async fn test_small_move_only_periodic() {
        let h = harness(vec![]);
        seed_hour_ago(&h.series, 1.0).await;

        let first = h.notifier.on_data(sample(1.01)).await.unwrap();
        assert_eq!(first, NotifyOutcome::Notified(NotifyReason::Periodic));

        let second = h.notifier.on_data(sample(1.02)).await.unwrap();
        assert_eq!(second, NotifyOutcome::Suppressed);
        assert_eq!(h.broadcaster.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_history_still_allows_periodic() {
        let h = harness(vec![]);
        let outcome = h.notifier.on_data(sample(1.0)).await.unwrap();
        assert_eq!(outcome, NotifyOutcome::Notified(NotifyReason::Periodic));
        assert!(h.broadcaster.texts()[0].contains("1h: n/a"));
    }

    #[tokio::test]
    async fn test_new_ath_notifies_and_blocks_rise() {
        let h = harness(vec!["CAAC-rocket".to_string()]);
        store_ath(&h, PriceAth::new(1_600_000_000, 1.0)).await;
        seed_hour_ago(&h.series, 1.0).await;

        let outcome = h.notifier.on_data(sample(1.1)).await.unwrap();
        assert_eq!(outcome, NotifyOutcome::Notified(NotifyReason::AllTimeHigh));

        let ath = h.notifier.ath_tracker().get_current().await.unwrap();
        assert_eq!(ath.ath_price, 1.1);
        assert!(cooldowns_fired(&h, CD_KEY_ATH_NOTIFIED).await);
        assert!(cooldowns_fired(&h, CD_KEY_PRICE_RISE_NOTIFIED).await);

        let texts = h.broadcaster.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("New all-time high"));
        assert_eq!(h.broadcaster.stickers(), vec!["CAAC-rocket"]);

        // same price again: not a new high, rise gate already closed
        let again = h.notifier.on_data(sample(1.1)).await.unwrap();
        assert_eq!(again, NotifyOutcome::Suppressed);
        assert_eq!(h.broadcaster.texts().len(), 1);
    }

    #[tokio::test]
    async fn test_ath_under_cooldown_is_recorded_silently() {
        let h = harness(vec!["CAAC-rocket".to_string()]);
        store_ath(&h, PriceAth::new(1_600_000_000, 1.0)).await;
        let cd = CooldownTracker::new(h.store.clone());
        cd.fire(CD_KEY_ATH_NOTIFIED).await.unwrap();
        cd.fire(CD_KEY_PRICE_NOTIFIED).await.unwrap();

        let outcome = h.notifier.on_data(sample(1.02)).await.unwrap();
        assert_eq!(outcome, NotifyOutcome::Suppressed);
        assert_eq!(
            h.notifier.ath_tracker().get_current().await.unwrap().ath_price,
            1.02
        );
        assert!(h.broadcaster.sent().is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_price_is_never_ath() {
        let h = harness(vec![]);
        store_ath(&h, PriceAth::new(1_600_000_000, 1.0)).await;
        CooldownTracker::new(h.store.clone())
            .fire(CD_KEY_PRICE_NOTIFIED)
            .await
            .unwrap();

        let outcome = h.notifier.on_data(sample(0.0)).await.unwrap();
        assert_eq!(outcome, NotifyOutcome::Suppressed);
        assert_eq!(
            h.notifier.ath_tracker().get_current().await.unwrap().ath_price,
            1.0
        );
    }
}
