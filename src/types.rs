//! Types for the notification bot

use crate::constants::{
    DEFAULT_CIRCULATING_SUPPLY, REAL_REGISTERED_ATH, REAL_REGISTERED_ATH_DATE,
};
use serde::{Deserialize, Serialize};

/// Percent change from `old` to `new`, 0 when `old` is 0
pub fn calc_percent_change(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        0.0
    } else {
        (new - old) / old * 100.0
    }
}

/// Weighted arithmetic mean, `None` when the total weight is not positive
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return None;
    }
    let sum: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    Some(sum / total)
}

/// One polled sample of the token's economics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairPrice {
    /// Circulating supply in whole tokens
    pub circulating: f64,
    /// Tokens locked in vaults (bonded by nodes)
    pub vault_locked: f64,
    /// Market price in USD
    pub real_price: f64,
    /// Deterministic value price in USD
    pub fair_price: f64,
    /// Total locked value in USD
    pub tlv_usd: f64,
    /// Market cap rank, 0 when unknown
    pub rank: u32,
}

impl Default for FairPrice {
    fn default() -> Self {
        Self {
            circulating: DEFAULT_CIRCULATING_SUPPLY,
            vault_locked: 0.0,
            real_price: 0.0,
            fair_price: 0.0,
            tlv_usd: 0.0,
            rank: 0,
        }
    }
}

impl FairPrice {
    pub fn market_cap(&self) -> f64 {
        self.real_price * self.circulating
    }
}

/// Highest real price ever observed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceAth {
    /// Unix seconds
    pub ath_date: i64,
    pub ath_price: f64,
}

impl Default for PriceAth {
    fn default() -> Self {
        Self {
            ath_date: REAL_REGISTERED_ATH_DATE,
            ath_price: REAL_REGISTERED_ATH,
        }
    }
}

impl PriceAth {
    pub fn new(ath_date: i64, ath_price: f64) -> Self {
        Self { ath_date, ath_price }
    }

    /// True iff `price` is positive and strictly above the stored maximum
    pub fn is_new_ath(&self, price: f64) -> bool {
        price > 0.0 && price > self.ath_price
    }
}

/// Pool cap state of the network
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapInfo {
    /// Maximum amount of rune that may be staked
    pub cap: i64,
    /// Currently staked rune
    pub stacked: i64,
    /// USD price at capture time
    pub price: f64,
}

impl CapInfo {
    pub fn new(cap: i64, stacked: i64, price: f64) -> Self {
        Self { cap, stacked, price }
    }

    /// Sentinel for an absent or unreadable record
    pub fn error() -> Self {
        Self::new(-1, -1, 1e-10)
    }

    pub fn is_valid(&self) -> bool {
        self.cap >= 1 && self.stacked >= 1
    }

    pub fn cap_usd(&self) -> f64 {
        self.price * self.cap as f64
    }
}

/// Trailing average prices; 0 means no data in that window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistoricalPrices {
    pub price_1h: f64,
    pub price_24h: f64,
    pub price_7d: f64,
}

/// Everything the price table message shows
#[derive(Debug, Clone, PartialEq)]
pub struct PriceReport {
    pub history: HistoricalPrices,
    pub fair_price: FairPrice,
    pub last_ath: PriceAth,
}

/// Liquidity pool state in whole token units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub asset: String,
    pub balance_asset: f64,
    pub balance_rune: f64,
    pub pool_units: f64,
    pub status: String,
}

impl PoolInfo {
    pub fn asset_per_rune(&self) -> f64 {
        if self.balance_rune > 0.0 {
            self.balance_asset / self.balance_rune
        } else {
            0.0
        }
    }

    pub fn runes_per_asset(&self) -> f64 {
        if self.balance_asset > 0.0 {
            self.balance_rune / self.balance_asset
        } else {
            0.0
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status.eq_ignore_ascii_case("enabled")
    }
}

/// Network wide numbers from the indexer and mimir
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetworkStats {
    /// Rune staked in pools, whole tokens
    pub total_staked: f64,
    /// Rune bonded by active and standby nodes, whole tokens
    pub total_bonded: f64,
    /// Maximum stake, `None` when mimir does not define it
    pub stake_cap: Option<f64>,
}

/// Market data reported by CoinGecko
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoinMarketInfo {
    pub market_cap_rank: Option<u32>,
    pub circulating_supply: Option<f64>,
}

/// A member's current position in one pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentLiquidity {
    pub pool: String,
    pub rune_stake: f64,
    pub asset_stake: f64,
    pub pool_units: f64,
    pub rune_withdrawn: f64,
    pub asset_withdrawn: f64,
    /// Unix seconds of the first stake
    pub first_stake_ts: i64,
    /// Unix seconds of the last stake
    pub last_stake_ts: i64,
}

/// One day on a member's weekly liquidity chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeDayGraphPoint {
    /// Unix seconds
    pub day: i64,
    pub rune_amount: f64,
    pub asset_amount: f64,
    pub usd_value: f64,
}

/// Per-pool summary of contributed value vs current value
#[derive(Debug, Clone, PartialEq)]
pub struct StakePoolReport {
    pub usd_per_asset: f64,
    pub usd_per_rune: f64,
    /// Prices at the first stake, `None` when they could not be fetched
    pub usd_per_asset_start: Option<f64>,
    pub usd_per_rune_start: Option<f64>,
    pub liquidity: CurrentLiquidity,
    pub pool: Option<PoolInfo>,
}

impl StakePoolReport {
    /// Rune and asset the member would redeem now
    pub fn redeemable(&self) -> (f64, f64) {
        match &self.pool {
            Some(pool) if pool.pool_units > 0.0 => {
                let share = self.liquidity.pool_units / pool.pool_units;
                (pool.balance_rune * share, pool.balance_asset * share)
            }
            _ => (self.liquidity.rune_stake, self.liquidity.asset_stake),
        }
    }

    pub fn current_value_usd(&self) -> f64 {
        let (rune, asset) = self.redeemable();
        rune * self.usd_per_rune + asset * self.usd_per_asset
    }

    /// USD value of the stake at the time it was made
    pub fn initial_value_usd(&self) -> Option<f64> {
        let usd_per_rune = self.usd_per_rune_start?;
        let usd_per_asset = self.usd_per_asset_start?;
        Some(
            self.liquidity.rune_stake * usd_per_rune
                + self.liquidity.asset_stake * usd_per_asset,
        )
    }

    pub fn gain_percent(&self) -> Option<f64> {
        let initial = self.initial_value_usd()?;
        if initial <= 0.0 {
            return None;
        }
        Some(calc_percent_change(initial, self.current_value_usd()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_new_ath() {
        let ath = PriceAth::new(0, 1.0);
        assert!(ath.is_new_ath(1.1));
        assert!(!ath.is_new_ath(1.0));
        assert!(!ath.is_new_ath(0.9));
        assert!(!PriceAth::new(0, -5.0).is_new_ath(0.0));
        assert!(!PriceAth::new(0, -5.0).is_new_ath(-1.0));
    }

    #[test]
    fn test_cap_info_validity() {
        assert!(CapInfo::new(100, 1, 1.0).is_valid());
        assert!(!CapInfo::new(0, 10, 1.0).is_valid());
        assert!(!CapInfo::new(10, 0, 1.0).is_valid());
        assert!(!CapInfo::error().is_valid());
    }

    #[test]
    fn test_market_cap() {
        let fp = FairPrice {
            real_price: 2.0,
            ..FairPrice::default()
        };
        assert_eq!(fp.market_cap(), 1_000_000_000.0);
    }

    #[test]
    fn test_percent_change_and_weighted_mean() {
        assert!((calc_percent_change(1.0, 1.06) - 6.0).abs() < 1e-9);
        assert_eq!(calc_percent_change(0.0, 5.0), 0.0);
        assert_eq!(weighted_mean(&[1.0, 3.0], &[1.0, 3.0]), Some(2.5));
        assert_eq!(weighted_mean(&[], &[]), None);
    }

    fn liquidity() -> CurrentLiquidity {
        CurrentLiquidity {
            pool: "BNB.BNB".to_string(),
            rune_stake: 100.0,
            asset_stake: 2.0,
            pool_units: 10.0,
            rune_withdrawn: 0.0,
            asset_withdrawn: 0.0,
            first_stake_ts: 1_600_000_000,
            last_stake_ts: 1_600_000_000,
        }
    }

    #[test]
    fn test_stake_report_values() {
        let report = StakePoolReport {
            usd_per_asset: 30.0,
            usd_per_rune: 1.0,
            usd_per_asset_start: Some(25.0),
            usd_per_rune_start: Some(0.5),
            liquidity: liquidity(),
            pool: Some(PoolInfo {
                asset: "BNB.BNB".to_string(),
                balance_asset: 20.0,
                balance_rune: 1_200.0,
                pool_units: 100.0,
                status: "Enabled".to_string(),
            }),
        };

        assert_eq!(report.redeemable(), (120.0, 2.0));
        assert_eq!(report.current_value_usd(), 180.0);
        assert_eq!(report.initial_value_usd(), Some(100.0));
        assert!((report.gain_percent().unwrap() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_stake_report_without_start_prices() {
        let report = StakePoolReport {
            usd_per_asset: 30.0,
            usd_per_rune: 1.0,
            usd_per_asset_start: None,
            usd_per_rune_start: None,
            liquidity: liquidity(),
            pool: None,
        };

        assert_eq!(report.current_value_usd(), 160.0);
        assert_eq!(report.initial_value_usd(), None);
        assert_eq!(report.gain_percent(), None);
    }
}
