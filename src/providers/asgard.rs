//! Asgard consumer (liquidity analytics) provider

use super::{de_flex_f64, MidgardProvider};
use crate::{
    constants::ASGARD_CONSUMER_URL,
    error::ProviderError,
    provider::LiquidityProvider,
    types::{CurrentLiquidity, StakeDayGraphPoint},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiquidityResponse {
    pool: String,
    #[serde(deserialize_with = "de_flex_f64")]
    rune_stake: f64,
    #[serde(deserialize_with = "de_flex_f64")]
    asset_stake: f64,
    #[serde(deserialize_with = "de_flex_f64")]
    pool_units: f64,
    #[serde(default, deserialize_with = "de_flex_f64")]
    rune_withdrawn: f64,
    #[serde(default, deserialize_with = "de_flex_f64")]
    asset_withdrawn: f64,
    first_stake: i64,
    #[serde(default)]
    last_stake: i64,
}

impl From<LiquidityResponse> for CurrentLiquidity {
    fn from(r: LiquidityResponse) -> Self {
        Self {
            pool: r.pool,
            rune_stake: r.rune_stake,
            asset_stake: r.asset_stake,
            pool_units: r.pool_units,
            rune_withdrawn: r.rune_withdrawn,
            asset_withdrawn: r.asset_withdrawn,
            first_stake_ts: r.first_stake,
            last_stake_ts: r.last_stake.max(r.first_stake),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeeklyPoint {
    day: i64,
    #[serde(deserialize_with = "de_flex_f64")]
    rune_amount: f64,
    #[serde(deserialize_with = "de_flex_f64")]
    asset_amount: f64,
    #[serde(deserialize_with = "de_flex_f64")]
    usd_value: f64,
}

impl From<WeeklyPoint> for StakeDayGraphPoint {
    fn from(p: WeeklyPoint) -> Self {
        Self {
            day: p.day,
            rune_amount: p.rune_amount,
            asset_amount: p.asset_amount,
            usd_value: p.usd_value,
        }
    }
}

/// Liquidity positions from Asgard consumer, membership and history from Midgard
pub struct AsgardLiquidityProvider {
    client: Client,
    asgard_url: String,
    midgard: MidgardProvider,
}

impl AsgardLiquidityProvider {
    pub fn new(midgard: MidgardProvider) -> Result<Self, ProviderError> {
        Self::with_url(ASGARD_CONSUMER_URL, midgard)
    }

    pub fn with_url(asgard_url: &str, midgard: MidgardProvider) -> Result<Self, ProviderError> {
        Ok(Self {
            client: super::http_client()?,
            asgard_url: asgard_url.trim_end_matches('/').to_string(),
            midgard,
        })
    }
}

fn parse_liquidity(text: &str) -> Result<CurrentLiquidity, ProviderError> {
    let response: LiquidityResponse = super::parse_json("Asgard liquidity", text)?;
    Ok(response.into())
}

/// `None` when the body carries no `data` array
fn parse_weekly(text: &str) -> Result<Option<Vec<StakeDayGraphPoint>>, ProviderError> {
    let body: serde_json::Value = super::parse_json("Asgard weekly", text)?;
    match body.get("data") {
        Some(data) if data.is_array() => {
            let points: Vec<WeeklyPoint> = serde_json::from_value(data.clone()).map_err(|e| {
                ProviderError::InvalidResponse(format!("Bad weekly chart point: {}", e))
            })?;
            Ok(Some(points.into_iter().map(Into::into).collect()))
        }
        _ => Ok(None),
    }
}

#[async_trait]
impl LiquidityProvider for AsgardLiquidityProvider {
    async fn fetch_member_pools(
        &self,
        address: &str,
    ) -> Result<Option<Vec<String>>, ProviderError> {
        self.midgard.fetch_staker_pools(address).await
    }

    async fn fetch_current_liquidity(
        &self,
        address: &str,
        pool: &str,
    ) -> Result<CurrentLiquidity, ProviderError> {
        let url = format!(
            "{}/api/v2/history/liquidity?address={}&pools={}",
            self.asgard_url, address, pool
        );
        let text = super::get_text(&self.client, "asgard", &url).await?;
        parse_liquidity(&text)
    }

    async fn fetch_weekly_chart(
        &self,
        address: &str,
        pool: &str,
    ) -> Result<Option<Vec<StakeDayGraphPoint>>, ProviderError> {
        let url = format!(
            "{}/api/weekly?address={}&pool={}",
            self.asgard_url, address, pool
        );
        let text = super::get_text(&self.client, "asgard", &url).await?;
        parse_weekly(&text)
    }

    async fn fetch_usd_prices_at(&self, pool: &str, ts: i64) -> Result<(f64, f64), ProviderError> {
        self.midgard.fetch_usd_prices_at(pool, ts).await
    }
}
