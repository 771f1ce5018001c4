//! Midgard indexer and THORNode mimir provider

use super::{de_flex_f64, flex_to_f64};
use crate::{
    constants::{BUSD_SYMBOL, MIDGARD_API_URL, MIMIR_MAX_STAKE_RUNE, THORNODE_API_URL, THOR_DIVIDER},
    error::ProviderError,
    provider::ChainDataProvider,
    timespan::DAY,
    types::{NetworkStats, PoolInfo},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolDetail {
    asset: String,
    #[serde(deserialize_with = "de_flex_f64")]
    asset_depth: f64,
    #[serde(deserialize_with = "de_flex_f64")]
    rune_depth: f64,
    #[serde(default, deserialize_with = "de_flex_f64")]
    pool_units: f64,
    #[serde(default)]
    status: String,
}

impl From<PoolDetail> for PoolInfo {
    fn from(detail: PoolDetail) -> Self {
        Self {
            asset: detail.asset,
            balance_asset: detail.asset_depth / THOR_DIVIDER,
            balance_rune: detail.rune_depth / THOR_DIVIDER,
            pool_units: detail.pool_units,
            status: detail.status,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkResponse {
    #[serde(deserialize_with = "de_flex_f64")]
    total_staked: f64,
    bond_metrics: BondMetrics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BondMetrics {
    #[serde(default, deserialize_with = "de_flex_f64")]
    total_active_bond: f64,
    #[serde(default, deserialize_with = "de_flex_f64")]
    total_standby_bond: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StakerResponse {
    #[serde(default)]
    pools_array: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct PoolHistoryResponse {
    #[serde(default)]
    intervals: Vec<PoolHistoryInterval>,
}

#[derive(Debug, Deserialize)]
struct PoolHistoryInterval {
    /// Asset price in rune
    #[serde(deserialize_with = "de_flex_f64")]
    price: f64,
}

/// Client for Midgard v1 and the THORNode mimir endpoint
pub struct MidgardProvider {
    client: Client,
    midgard_url: String,
    thornode_url: String,
}

impl MidgardProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_urls(MIDGARD_API_URL, THORNODE_API_URL)
    }

    pub fn with_urls(midgard_url: &str, thornode_url: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            client: super::http_client()?,
            midgard_url: midgard_url.trim_end_matches('/').to_string(),
            thornode_url: thornode_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_pool_names(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/v1/pools", self.midgard_url);
        super::get_json(&self.client, self.provider_name(), &url).await
    }

    /// Pools an address has staked in, `None` when Midgard does not list any
    pub async fn fetch_staker_pools(&self, address: &str) -> Result<Option<Vec<String>>, ProviderError> {
        let url = format!("{}/v1/stakers/{}", self.midgard_url, address);
        let text = super::get_text(&self.client, self.provider_name(), &url).await?;
        parse_staker_pools(&text)
    }

    /// Daily asset price of a pool in rune at the day containing `ts`
    pub async fn fetch_runes_per_asset_at(&self, pool: &str, ts: i64) -> Result<f64, ProviderError> {
        let day_start = ts - ts.rem_euclid(DAY);
        let url = format!(
            "{}/v1/history/pools?pool={}&interval=day&from={}&to={}",
            self.midgard_url,
            pool,
            day_start,
            day_start + DAY
        );
        let text = super::get_text(&self.client, self.provider_name(), &url).await?;
        parse_history_price(&text, pool)
    }

    /// `(usd_per_rune, usd_per_asset)` on the day containing `ts`, derived
    /// from the BUSD pool price and the pool's own price on that day
    pub async fn fetch_usd_prices_at(&self, pool: &str, ts: i64) -> Result<(f64, f64), ProviderError> {
        let (runes_per_busd, runes_per_asset) = tokio::try_join!(
            self.fetch_runes_per_asset_at(BUSD_SYMBOL, ts),
            self.fetch_runes_per_asset_at(pool, ts),
        )?;

        if runes_per_busd <= 0.0 {
            return Err(ProviderError::InvalidResponse(format!(
                "non-positive BUSD price on day of {}",
                ts
            )));
        }

        let usd_per_rune = 1.0 / runes_per_busd;
        Ok((usd_per_rune, runes_per_asset * usd_per_rune))
    }

    async fn fetch_stake_cap(&self) -> Result<Option<f64>, ProviderError> {
        let url = format!("{}/thorchain/mimir", self.thornode_url);
        let mimir: HashMap<String, serde_json::Value> =
            super::get_json(&self.client, "thornode", &url).await?;
        Ok(stake_cap_from_mimir(&mimir))
    }
}

fn parse_pool_details(text: &str) -> Result<HashMap<String, PoolInfo>, ProviderError> {
    let details: Vec<PoolDetail> = super::parse_json("Midgard pools", text)?;
    Ok(details
        .into_iter()
        .map(|detail| (detail.asset.clone(), PoolInfo::from(detail)))
        .collect())
}

fn parse_network(text: &str) -> Result<(f64, f64), ProviderError> {
    let network: NetworkResponse = super::parse_json("Midgard network", text)?;
    let bonded = network.bond_metrics.total_active_bond + network.bond_metrics.total_standby_bond;
    Ok((network.total_staked / THOR_DIVIDER, bonded / THOR_DIVIDER))
}

fn parse_staker_pools(text: &str) -> Result<Option<Vec<String>>, ProviderError> {
    let staker: StakerResponse = super::parse_json("Midgard staker", text)?;
    Ok(staker.pools_array)
}

fn parse_history_price(text: &str, pool: &str) -> Result<f64, ProviderError> {
    let history: PoolHistoryResponse = super::parse_json("Midgard history", text)?;
    history
        .intervals
        .first()
        .map(|interval| interval.price)
        .ok_or_else(|| ProviderError::InvalidResponse(format!("no price history for {}", pool)))
}

fn stake_cap_from_mimir(mimir: &HashMap<String, serde_json::Value>) -> Option<f64> {
    mimir
        .get(MIMIR_MAX_STAKE_RUNE)
        .and_then(flex_to_f64)
        .map(|cap| cap / THOR_DIVIDER)
}

#[async_trait]
impl ChainDataProvider for MidgardProvider {
    async fn fetch_pools(&self) -> Result<HashMap<String, PoolInfo>, ProviderError> {
        let names = self.fetch_pool_names().await?;
        if names.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!(
            "{}/v1/pools/detail?asset={}&view=simple",
            self.midgard_url,
            names.join(",")
        );
        let text = super::get_text(&self.client, self.provider_name(), &url).await?;
        let pools = parse_pool_details(&text)?;

        tracing::debug!(count = pools.len(), "Fetched pool details from Midgard");
        Ok(pools)
    }

    async fn fetch_network_stats(&self) -> Result<NetworkStats, ProviderError> {
        let url = format!("{}/v1/network", self.midgard_url);
        let (network_text, stake_cap) = tokio::try_join!(
            super::get_text(&self.client, self.provider_name(), &url),
            self.fetch_stake_cap(),
        )?;
        let (total_staked, total_bonded) = parse_network(&network_text)?;

        if stake_cap.is_none() {
            tracing::warn!(key = MIMIR_MAX_STAKE_RUNE, "Stake cap is not set in mimir");
        }

        Ok(NetworkStats {
            total_staked,
            total_bonded,
            stake_cap,
        })
    }

    fn provider_name(&self) -> &'static str {
        "midgard"
    }
}
