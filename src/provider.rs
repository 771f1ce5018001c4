//! Provider abstractions for the upstream APIs the bot polls

use crate::error::ProviderError;
use crate::types::{CoinMarketInfo, CurrentLiquidity, NetworkStats, PoolInfo, StakeDayGraphPoint};
use async_trait::async_trait;
use std::collections::HashMap;

/// Market data for the tracked coin (CoinGecko)
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches rank and circulating supply
    async fn fetch_coin_market(&self) -> Result<CoinMarketInfo, ProviderError>;

    /// Fetches `(timestamp_ms, price_usd)` points covering the last `days`
    async fn fetch_price_chart(&self, days: u32) -> Result<Vec<(i64, f64)>, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

/// Pool and network state of the chain (indexer plus node constants)
#[async_trait]
pub trait ChainDataProvider: Send + Sync {
    /// Fetches all pools keyed by asset symbol
    async fn fetch_pools(&self) -> Result<HashMap<String, PoolInfo>, ProviderError>;

    /// Fetches staked and bonded totals and the stake cap
    async fn fetch_network_stats(&self) -> Result<NetworkStats, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

/// A member's liquidity positions
#[async_trait]
pub trait LiquidityProvider: Send + Sync {
    /// Pools the address has liquidity in, `None` when the indexer knows
    /// nothing about the address
    async fn fetch_member_pools(&self, address: &str)
        -> Result<Option<Vec<String>>, ProviderError>;

    async fn fetch_current_liquidity(
        &self,
        address: &str,
        pool: &str,
    ) -> Result<CurrentLiquidity, ProviderError>;

    /// Weekly chart of a position, `None` when the service has no chart
    async fn fetch_weekly_chart(
        &self,
        address: &str,
        pool: &str,
    ) -> Result<Option<Vec<StakeDayGraphPoint>>, ProviderError>;

    /// `(usd_per_rune, usd_per_asset)` on the day containing `ts`
    async fn fetch_usd_prices_at(&self, pool: &str, ts: i64) -> Result<(f64, f64), ProviderError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    fn outcome<T: Clone>(slot: &Mutex<Result<T, String>>) -> Result<T, ProviderError> {
        slot.lock()
            .unwrap()
            .clone()
            .map_err(ProviderError::ApiError)
    }

    /// Mock market data provider for testing
    pub struct MockMarketData {
        market: Mutex<Result<CoinMarketInfo, String>>,
        charts: Mutex<HashMap<u32, Vec<(i64, f64)>>>,
    }

    impl Default for MockMarketData {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockMarketData {
        pub fn new() -> Self {
            Self {
                market: Mutex::new(Ok(CoinMarketInfo::default())),
                charts: Mutex::new(HashMap::new()),
            }
        }

        pub fn set_market(&self, market: CoinMarketInfo) {
            *self.market.lock().unwrap() = Ok(market);
        }

        pub fn set_error(&self, message: &str) {
            *self.market.lock().unwrap() = Err(message.to_string());
        }

        pub fn set_chart(&self, days: u32, points: Vec<(i64, f64)>) {
            self.charts.lock().unwrap().insert(days, points);
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockMarketData {
        async fn fetch_coin_market(&self) -> Result<CoinMarketInfo, ProviderError> {
            outcome(&self.market)
        }

        async fn fetch_price_chart(&self, days: u32) -> Result<Vec<(i64, f64)>, ProviderError> {
            self.charts
                .lock()
                .unwrap()
                .get(&days)
                .cloned()
                .ok_or_else(|| ProviderError::InvalidResponse(format!("no chart for {} days", days)))
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    /// Mock chain data provider for testing
    pub struct MockChainData {
        pools: Mutex<Result<HashMap<String, PoolInfo>, String>>,
        network: Mutex<Result<NetworkStats, String>>,
    }

    impl Default for MockChainData {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockChainData {
        pub fn new() -> Self {
            Self {
                pools: Mutex::new(Ok(HashMap::new())),
                network: Mutex::new(Ok(NetworkStats::default())),
            }
        }

        pub fn set_pools(&self, pools: Vec<PoolInfo>) {
            let map = pools.into_iter().map(|p| (p.asset.clone(), p)).collect();
            *self.pools.lock().unwrap() = Ok(map);
        }

        pub fn set_pools_error(&self, message: &str) {
            *self.pools.lock().unwrap() = Err(message.to_string());
        }

        pub fn set_network(&self, network: NetworkStats) {
            *self.network.lock().unwrap() = Ok(network);
        }
    }

    #[async_trait]
    impl ChainDataProvider for MockChainData {
        async fn fetch_pools(&self) -> Result<HashMap<String, PoolInfo>, ProviderError> {
            outcome(&self.pools)
        }

        async fn fetch_network_stats(&self) -> Result<NetworkStats, ProviderError> {
            outcome(&self.network)
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    /// Mock liquidity provider for testing
    #[derive(Default)]
    pub struct MockLiquidity {
        pub member_pools: Mutex<Option<Vec<String>>>,
        pub liquidity: Mutex<HashMap<String, CurrentLiquidity>>,
        pub charts: Mutex<HashMap<String, Vec<StakeDayGraphPoint>>>,
        /// `None` makes the historical price lookup fail
        pub start_prices: Mutex<Option<(f64, f64)>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl MockLiquidity {
        pub fn new() -> Self {
            Self::default()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl LiquidityProvider for MockLiquidity {
        async fn fetch_member_pools(
            &self,
            address: &str,
        ) -> Result<Option<Vec<String>>, ProviderError> {
            self.record(format!("pools:{}", address));
            Ok(self.member_pools.lock().unwrap().clone())
        }

        async fn fetch_current_liquidity(
            &self,
            address: &str,
            pool: &str,
        ) -> Result<CurrentLiquidity, ProviderError> {
            self.record(format!("liquidity:{}:{}", address, pool));
            self.liquidity
                .lock()
                .unwrap()
                .get(pool)
                .cloned()
                .ok_or_else(|| ProviderError::InvalidResponse(format!("unknown pool {}", pool)))
        }

        async fn fetch_weekly_chart(
            &self,
            address: &str,
            pool: &str,
        ) -> Result<Option<Vec<StakeDayGraphPoint>>, ProviderError> {
            self.record(format!("weekly:{}:{}", address, pool));
            Ok(self.charts.lock().unwrap().get(pool).cloned())
        }

        async fn fetch_usd_prices_at(
            &self,
            pool: &str,
            _ts: i64,
        ) -> Result<(f64, f64), ProviderError> {
            self.record(format!("history:{}", pool));
            let prices = *self.start_prices.lock().unwrap();
            prices.ok_or_else(|| ProviderError::ApiError("history unavailable".to_string()))
        }
    }
}
