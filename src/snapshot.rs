//! Last known prices, owned by the poll loop
//!
//! The poll loop updates one `PriceSnapshot` per cycle and lends it out as
//! `&PriceSnapshot` to everything that needs current prices.

use crate::constants::{BTCB_SYMBOL, DEFAULT_CIRCULATING_SUPPLY, STABLE_COIN_POOLS};
use crate::timespan::now_ts;
use crate::types::{weighted_mean, CapInfo, CoinMarketInfo, FairPrice, NetworkStats, PoolInfo};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct PriceSnapshot {
    pub usd_per_rune: f64,
    pub btc_per_rune: f64,
    pub pool_info_map: HashMap<String, PoolInfo>,
    /// Unix seconds of the last `update`, 0 before the first one
    pub last_update_ts: f64,
}

impl Default for PriceSnapshot {
    fn default() -> Self {
        Self {
            usd_per_rune: 1.0,
            btc_per_rune: 0.000_001,
            pool_info_map: HashMap::new(),
            last_update_ts: 0.0,
        }
    }
}

impl PriceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the pool map and recomputes derived prices
    pub fn update(&mut self, pools: HashMap<String, PoolInfo>) {
        self.pool_info_map = pools;
        self.calculate_weighted_rune_price();

        match self.pool_info_map.get(BTCB_SYMBOL) {
            Some(pool) if pool.asset_per_rune() > 0.0 => self.btc_per_rune = pool.asset_per_rune(),
            _ => tracing::warn!(pool = BTCB_SYMBOL, "BTC pool missing, keeping previous BTC price"),
        }

        self.last_update_ts = now_ts();
    }

    /// USD per rune as the rune-depth weighted mean over stable coin pools
    fn calculate_weighted_rune_price(&mut self) {
        let (prices, weights): (Vec<f64>, Vec<f64>) = STABLE_COIN_POOLS
            .iter()
            .filter_map(|symbol| self.pool_info_map.get(*symbol))
            .filter(|pool| pool.balance_rune > 0.0 && pool.asset_per_rune() > 0.0)
            .map(|pool| (pool.asset_per_rune(), pool.balance_rune))
            .unzip();

        match weighted_mean(&prices, &weights) {
            Some(price) => self.usd_per_rune = price,
            None => tracing::error!("Unable to find any stable coin pools, keeping previous price"),
        }
    }

    pub fn pool_names(&self) -> HashSet<&str> {
        self.pool_info_map.keys().map(String::as_str).collect()
    }

    /// USD price of a pool's asset, `None` for unknown pools
    pub fn usd_per_asset(&self, pool: &str) -> Option<f64> {
        self.pool_info_map
            .get(pool)
            .map(|info| self.usd_per_rune * info.runes_per_asset())
    }

    /// Rune held by all enabled pools
    pub fn total_pooled_rune(&self) -> f64 {
        self.pool_info_map
            .values()
            .filter(|pool| pool.is_enabled())
            .map(|pool| pool.balance_rune)
            .sum()
    }

    /// Composes the price sample handed to the price notifier
    ///
    /// Fair price follows the deterministic value model: three times the USD
    /// value of pooled rune spread over the circulating supply.
    pub fn fair_price(&self, market: &CoinMarketInfo, network: &NetworkStats) -> FairPrice {
        let circulating = market
            .circulating_supply
            .filter(|supply| *supply > 0.0)
            .unwrap_or(DEFAULT_CIRCULATING_SUPPLY);
        let pooled_usd = self.total_pooled_rune() * self.usd_per_rune;

        FairPrice {
            circulating,
            vault_locked: network.total_bonded,
            real_price: self.usd_per_rune,
            fair_price: 3.0 * pooled_usd / circulating,
            tlv_usd: 2.0 * pooled_usd,
            rank: market.market_cap_rank.unwrap_or(0),
        }
    }

    /// Composes the cap sample; a missing cap gives an invalid record
    pub fn cap_info(&self, network: &NetworkStats) -> CapInfo {
        CapInfo::new(
            network.stake_cap.unwrap_or(0.0) as i64,
            network.total_staked as i64,
            self.usd_per_rune,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{BUSD_SYMBOL, USDT_SYMBOL};

    fn pool(asset: &str, balance_asset: f64, balance_rune: f64) -> PoolInfo {
        PoolInfo {
            asset: asset.to_string(),
            balance_asset,
            balance_rune,
            pool_units: 1.0,
            status: "Enabled".to_string(),
        }
    }

    fn pools(list: Vec<PoolInfo>) -> HashMap<String, PoolInfo> {
        list.into_iter().map(|p| (p.asset.clone(), p)).collect()
    }

    #[test]
    fn test_weighted_price_from_stable_pools() {
        let mut snapshot = PriceSnapshot::new();
        snapshot.update(pools(vec![
            // 1.0 USD per rune, weight 100
            pool(BUSD_SYMBOL, 100.0, 100.0),
            // 2.0 USD per rune, weight 300
            pool(USDT_SYMBOL, 600.0, 300.0),
            pool(BTCB_SYMBOL, 0.5, 10_000.0),
        ]));

        assert!((snapshot.usd_per_rune - 1.75).abs() < 1e-9);
        assert!((snapshot.btc_per_rune - 0.000_05).abs() < 1e-12);
        assert!(snapshot.last_update_ts > 0.0);
    }

    #[test]
    fn test_keeps_previous_price_without_stable_pools() {
        let mut snapshot = PriceSnapshot::new();
        snapshot.update(pools(vec![pool(BUSD_SYMBOL, 150.0, 100.0)]));
        assert!((snapshot.usd_per_rune - 1.5).abs() < 1e-9);

        snapshot.update(pools(vec![pool("BNB.BNB", 1.0, 50.0)]));
        assert!((snapshot.usd_per_rune - 1.5).abs() < 1e-9);
        assert_eq!(snapshot.pool_names(), HashSet::from(["BNB.BNB"]));
    }

    #[test]
    fn test_fair_price_and_cap_composition() {
        let mut snapshot = PriceSnapshot::new();
        snapshot.update(pools(vec![
            pool(BUSD_SYMBOL, 2_000.0, 1_000.0),
            pool("BNB.BNB", 10.0, 1_000.0),
        ]));

        let market = CoinMarketInfo {
            market_cap_rank: Some(42),
            circulating_supply: Some(12_000.0),
        };
        let network = NetworkStats {
            total_staked: 900.5,
            total_bonded: 5_000.0,
            stake_cap: Some(1_500.0),
        };

        let fp = snapshot.fair_price(&market, &network);
        assert_eq!(fp.real_price, 2.0);
        assert_eq!(fp.tlv_usd, 8_000.0);
        assert_eq!(fp.fair_price, 1.0);
        assert_eq!(fp.rank, 42);
        assert_eq!(fp.vault_locked, 5_000.0);
        assert_eq!(snapshot.usd_per_asset("BNB.BNB"), Some(200.0));

        assert_eq!(snapshot.cap_info(&network), CapInfo::new(1_500, 900, 2.0));
        let no_cap = NetworkStats { stake_cap: None, ..network };
        assert!(!snapshot.cap_info(&no_cap).is_valid());
    }
}
