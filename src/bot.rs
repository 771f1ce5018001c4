//! Notification bot: owns the price snapshot and drives the poll loop

use crate::{
    broadcast::{Broadcaster, TelegramBroadcaster},
    config::Config,
    constants::{RUNE_SYMBOL, RUNE_SYMBOL_DET, SERIES_RETENTION_SECS},
    error::{BotError, NotifyError, StoreError},
    format::pool_report_text,
    liquidity::LiquidityReporter,
    notify::{CapNotifier, Notifier, NotifyOutcome, PriceNotifier},
    provider::{ChainDataProvider, LiquidityProvider, MarketDataProvider},
    providers::{AsgardLiquidityProvider, CoinGeckoProvider, MidgardProvider},
    snapshot::PriceSnapshot,
    store::{MemoryStore, Store, StreamId},
    time_series::PriceTimeSeries,
    timespan::now_ts,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Upstream data sources of the bot
pub struct Providers {
    pub market: Arc<dyn MarketDataProvider>,
    pub chain: Arc<dyn ChainDataProvider>,
    pub liquidity: Arc<dyn LiquidityProvider>,
}

/// What each notifier did during one poll cycle, `None` when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub price: Option<NotifyOutcome>,
    pub cap: Option<NotifyOutcome>,
}

/// Logs a notifier failure so the other notifiers still run
fn settle<N: Notifier>(notifier: &N, result: Result<NotifyOutcome, NotifyError>) -> Option<NotifyOutcome> {
    match result {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            tracing::warn!(notifier = notifier.name(), error = %e, "Notifier failed");
            None
        }
    }
}

pub struct NotificationBot {
    store: Arc<dyn Store>,
    market: Arc<dyn MarketDataProvider>,
    chain: Arc<dyn ChainDataProvider>,
    liquidity: LiquidityReporter,
    price_series: PriceTimeSeries,
    det_series: PriceTimeSeries,
    price_notifier: PriceNotifier,
    cap_notifier: CapNotifier,
    poll_interval: Duration,
}

impl NotificationBot {
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        providers: Providers,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Result<Self, BotError> {
        let channels = config.telegram.channels.clone();
        let price_series = PriceTimeSeries::new(RUNE_SYMBOL, store.clone());

        Ok(Self {
            price_notifier: PriceNotifier::new(
                config.price_settings()?,
                store.clone(),
                price_series.clone(),
                broadcaster.clone(),
                channels.clone(),
            ),
            cap_notifier: CapNotifier::new(store.clone(), broadcaster, channels),
            det_series: PriceTimeSeries::new(RUNE_SYMBOL_DET, store.clone()),
            price_series,
            liquidity: LiquidityReporter::new(providers.liquidity),
            market: providers.market,
            chain: providers.chain,
            poll_interval: Duration::from_secs(config.poll_interval_secs()?),
            store,
        })
    }

    /// Wires the production store, HTTP providers and Telegram broadcaster
    pub fn from_config(config: &Config) -> Result<Self, BotError> {
        let store: Arc<dyn Store> = match &config.store.snapshot_path {
            Some(path) => Arc::new(MemoryStore::open(path)?),
            None => {
                tracing::warn!("No store.snapshot_path configured, state will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        let fetch = &config.fetch;
        let providers = Providers {
            market: Arc::new(CoinGeckoProvider::with_base_url(
                &fetch.coingecko_url,
                &fetch.coin_id,
            )?),
            chain: Arc::new(MidgardProvider::with_urls(
                &fetch.midgard_url,
                &fetch.thornode_url,
            )?),
            liquidity: Arc::new(AsgardLiquidityProvider::with_url(
                &fetch.asgard_url,
                MidgardProvider::with_urls(&fetch.midgard_url, &fetch.thornode_url)?,
            )?),
        };

        if config.telegram.bot_token.is_empty() {
            tracing::warn!("Telegram bot token is empty, deliveries will fail");
        }
        let broadcaster = Arc::new(TelegramBroadcaster::new(&config.telegram.bot_token)?);

        Self::new(config, store, providers, broadcaster)
    }

    /// Runs one poll cycle against `snapshot`
    ///
    /// The snapshot is left untouched when fetching the pools fails. A failing
    /// notifier is logged and reported as `None` without skipping the others.
    pub async fn poll_once(&self, snapshot: &mut PriceSnapshot) -> Result<CycleReport, BotError> {
        let pools = self.chain.fetch_pools().await?;
        snapshot.update(pools);

        let (market, network) = tokio::try_join!(
            self.market.fetch_coin_market(),
            self.chain.fetch_network_stats(),
        )?;

        let fair_price = snapshot.fair_price(&market, &network);
        tracing::debug!(
            real_price = fair_price.real_price,
            fair_price = fair_price.fair_price,
            tlv_usd = fair_price.tlv_usd,
            "Composed price sample"
        );

        self.price_series.add_price(fair_price.real_price).await?;
        self.det_series.add_price(fair_price.fair_price).await?;
        self.trim_series().await?;

        let price = self.price_notifier.on_data(fair_price).await;
        let price = settle(&self.price_notifier, price);
        let cap = self.cap_notifier.on_data(snapshot.cap_info(&network)).await;
        let cap = settle(&self.cap_notifier, cap);

        self.store.flush().await?;
        Ok(CycleReport { price, cap })
    }

    async fn trim_series(&self) -> Result<(), StoreError> {
        let now = now_ts() as i64;
        for series in [&self.price_series, &self.det_series] {
            series.series().trim_older_than(now, SERIES_RETENTION_SECS).await?;
        }
        Ok(())
    }

    /// Polls on every tick until Ctrl-C
    pub async fn run(&self) -> Result<(), BotError> {
        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "Starting notification bot"
        );

        let mut snapshot = PriceSnapshot::new();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll_once(&mut snapshot).await {
                        Ok(report) => tracing::debug!(
                            price = ?report.price,
                            cap = ?report.cap,
                            "Poll cycle done"
                        ),
                        Err(e) => tracing::warn!(error = %e, "Poll cycle failed"),
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }

        self.store.flush().await?;
        Ok(())
    }

    /// Replaces the price series with the market chart of the last 8 days
    ///
    /// Returns the number of points stored; points sharing a timestamp are
    /// stored once.
    pub async fn fill_price_history(&self) -> Result<usize, BotError> {
        let (week, day) = tokio::try_join!(
            self.market.fetch_price_chart(8),
            self.market.fetch_price_chart(1),
        )?;

        let mut points: Vec<(i64, f64)> = week.into_iter().chain(day).collect();
        points.sort_by_key(|(ts, _)| *ts);

        self.price_series.series().clear().await?;

        let mut added = 0;
        for (ts_ms, price) in points {
            if self
                .price_series
                .add_price_at(StreamId::min_at(ts_ms), price)
                .await?
                .is_some()
            {
                added += 1;
            }
        }

        self.store.flush().await?;
        tracing::info!(added, series = self.price_series.series().name(), "Price history filled");
        Ok(added)
    }

    pub async fn reset_ath(&self) -> Result<(), BotError> {
        self.price_notifier.ath_tracker().reset().await?;
        self.store.flush().await?;
        tracing::info!("ATH record reset");
        Ok(())
    }

    /// One message per liquidity position of `address`
    pub async fn liquidity_report(&self, address: &str) -> Result<Vec<String>, BotError> {
        let mut snapshot = PriceSnapshot::new();
        snapshot.update(self.chain.fetch_pools().await?);

        let reports = self.liquidity.reports(address, &snapshot).await?;
        let pools: Vec<String> = reports.iter().map(|r| r.liquidity.pool.clone()).collect();
        let charts = self.liquidity.fetch_all_weekly_charts(address, &pools).await?;

        Ok(reports
            .iter()
            .map(|report| {
                let weekly = charts.get(&report.liquidity.pool).and_then(|c| c.as_deref());
                pool_report_text(report, weekly)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::mock::RecordingBroadcaster;
    use crate::constants::{BUSD_SYMBOL, CAP_INFO_KEY};
    use crate::timespan::HOUR;
    use crate::notify::NotifyReason;
    use crate::provider::mock::{MockChainData, MockLiquidity, MockMarketData};
    use crate::types::{CoinMarketInfo, CurrentLiquidity, NetworkStats, PoolInfo};

    const CONFIG: &str = r#"
        [telegram]
        channels = ["@alerts"]

        [price]
        global_cd = "12h"
        change_cd = "1h"
        percent_change_threshold = 5.0

        [price.ath]
        cooldown = "2h"
    "#;

    struct Harness {
        bot: NotificationBot,
        store: Arc<MemoryStore>,
        market: Arc<MockMarketData>,
        chain: Arc<MockChainData>,
        liquidity: Arc<MockLiquidity>,
        broadcaster: Arc<RecordingBroadcaster>,
    }

    fn busd_pool() -> PoolInfo {
        PoolInfo {
            asset: BUSD_SYMBOL.to_string(),
            balance_asset: 2_000.0,
            balance_rune: 1_000.0,
            pool_units: 1.0,
            status: "enabled".to_string(),
        }
    }

    fn network(cap: f64) -> NetworkStats {
        NetworkStats {
            total_staked: 500.0,
            total_bonded: 3_000.0,
            stake_cap: Some(cap),
        }
    }

    fn harness() -> Harness {
        let config = Config::parse(CONFIG).unwrap();
        let store = Arc::new(MemoryStore::new());
        let market = Arc::new(MockMarketData::new());
        let chain = Arc::new(MockChainData::new());
        let liquidity = Arc::new(MockLiquidity::new());
        let broadcaster = Arc::new(RecordingBroadcaster::new());

        market.set_market(CoinMarketInfo {
            market_cap_rank: Some(42),
            circulating_supply: Some(1_000_000.0),
        });
        chain.set_pools(vec![busd_pool()]);
        chain.set_network(network(1_000.0));

        let bot = NotificationBot::new(
            &config,
            store.clone(),
            Providers {
                market: market.clone(),
                chain: chain.clone(),
                liquidity: liquidity.clone(),
            },
            broadcaster.clone(),
        )
        .unwrap();

        Harness {
            bot,
            store,
            market,
            chain,
            liquidity,
            broadcaster,
        }
    }

    #[tokio::test]
    async fn test_poll_cycle_feeds_notifiers() {
        let h = harness();
        let mut snapshot = PriceSnapshot::new();

        let first = h.bot.poll_once(&mut snapshot).await.unwrap();
        assert_eq!(snapshot.usd_per_rune, 2.0);
        // $2 beats the registered ATH; the first cap record is only stored
        assert_eq!(first.price, Some(NotifyOutcome::Notified(NotifyReason::AllTimeHigh)));
        assert_eq!(first.cap, Some(NotifyOutcome::Suppressed));
        assert_eq!(h.store.stream_len("ts-stream:price-BNB.RUNE-B1A").await, 1);
        assert_eq!(h.store.stream_len("ts-stream:price-RUNE-DET").await, 1);

        h.chain.set_network(network(2_000.0));
        let second = h.bot.poll_once(&mut snapshot).await.unwrap();
        assert_eq!(second.price, Some(NotifyOutcome::Suppressed));
        assert_eq!(second.cap, Some(NotifyOutcome::Notified(NotifyReason::CapChanged)));

        let texts = h.broadcaster.texts();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("New all-time high"));
        assert!(texts[1].contains("raised from 1,000 to 2,000"));
    }

    #[tokio::test]
    async fn test_failed_pool_fetch_keeps_snapshot() {
        let h = harness();
        h.chain.set_pools_error("midgard down");
        let mut snapshot = PriceSnapshot::new();

        assert!(h.bot.poll_once(&mut snapshot).await.is_err());
        assert_eq!(snapshot.last_update_ts, 0.0);
        assert!(h.broadcaster.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failing_price_notifier_does_not_skip_cap() {
        let h = harness();
        h.broadcaster.set_failing(true);
        let mut snapshot = PriceSnapshot::new();

        let report = h.bot.poll_once(&mut snapshot).await.unwrap();
        assert_eq!(report.price, None);
        assert_eq!(report.cap, Some(NotifyOutcome::Suppressed));
        assert!(h.store.get(CAP_INFO_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_poll_cycle_trims_old_observations() {
        let h = harness();
        let old_ms = (now_ts() as i64 - SERIES_RETENTION_SECS - HOUR) * 1000;
        h.bot
            .price_series
            .add_price_at(StreamId::min_at(old_ms), 1.0)
            .await
            .unwrap();
        assert_eq!(h.store.stream_len("ts-stream:price-BNB.RUNE-B1A").await, 1);

        let mut snapshot = PriceSnapshot::new();
        h.bot.poll_once(&mut snapshot).await.unwrap();

        let left = h
            .bot
            .price_series
            .series()
            .select(0, i64::MAX, 10)
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
        assert!(left[0].0.ms > old_ms);
    }

    #[tokio::test]
    async fn test_fill_price_history_replaces_series() {
        let h = harness();
        let mut snapshot = PriceSnapshot::new();
        h.bot.poll_once(&mut snapshot).await.unwrap();

        h.market.set_chart(8, vec![(3_000, 1.0), (1_000, 0.5)]);
        h.market.set_chart(1, vec![(2_000, 0.7), (3_000, 1.0)]);

        assert_eq!(h.bot.fill_price_history().await.unwrap(), 3);
        assert_eq!(h.store.stream_len("ts-stream:price-BNB.RUNE-B1A").await, 3);
    }

    #[tokio::test]
    async fn test_fill_price_history_fails_without_chart() {
        let h = harness();
        h.market.set_chart(8, vec![(1_000, 0.5)]);
        assert!(h.bot.fill_price_history().await.is_err());
    }

    #[tokio::test]
    async fn test_reset_ath_restores_registered_high() {
        let h = harness();
        let mut snapshot = PriceSnapshot::new();
        h.bot.poll_once(&mut snapshot).await.unwrap();
        assert_eq!(
            h.bot.price_notifier.ath_tracker().get_current().await.unwrap().ath_price,
            2.0
        );

        h.bot.reset_ath().await.unwrap();
        assert_eq!(
            h.bot.price_notifier.ath_tracker().get_current().await.unwrap(),
            crate::types::PriceAth::default()
        );
    }

    #[tokio::test]
    async fn test_liquidity_report_messages() {
        let h = harness();
        *h.liquidity.member_pools.lock().unwrap() = Some(vec![BUSD_SYMBOL.to_string()]);
        h.liquidity.liquidity.lock().unwrap().insert(
            BUSD_SYMBOL.to_string(),
            CurrentLiquidity {
                pool: BUSD_SYMBOL.to_string(),
                rune_stake: 100.0,
                asset_stake: 200.0,
                pool_units: 0.5,
                rune_withdrawn: 0.0,
                asset_withdrawn: 0.0,
                first_stake_ts: 1_600_000_000,
                last_stake_ts: 1_600_000_000,
            },
        );

        let messages = h.bot.liquidity_report("bnb1member").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains(BUSD_SYMBOL));
        assert!(messages[0].contains("Value staked: unknown"));

        assert!(h.bot.liquidity_report("bnb1other").await.is_ok());
    }
}
