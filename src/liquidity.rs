//! Liquidity position reports for a member address

use crate::error::ProviderError;
use crate::provider::LiquidityProvider;
use crate::snapshot::PriceSnapshot;
use crate::types::{CurrentLiquidity, StakeDayGraphPoint, StakePoolReport};
use futures::future::{join_all, try_join_all};
use std::collections::HashMap;
use std::sync::Arc;

pub struct LiquidityReporter {
    provider: Arc<dyn LiquidityProvider>,
}

impl LiquidityReporter {
    pub fn new(provider: Arc<dyn LiquidityProvider>) -> Self {
        Self { provider }
    }

    /// Current liquidity of `address` in every pool, fetched concurrently
    ///
    /// Without `pools` the member's pools are looked up first; an address the
    /// indexer does not know yields an empty map.
    pub async fn fetch_all_pool_liquidity(
        &self,
        address: &str,
        pools: Option<Vec<String>>,
    ) -> Result<HashMap<String, CurrentLiquidity>, ProviderError> {
        let pools = match pools {
            Some(pools) => pools,
            None => match self.provider.fetch_member_pools(address).await? {
                Some(pools) => pools,
                None => {
                    tracing::info!(address, "Address has no liquidity pools");
                    return Ok(HashMap::new());
                }
            },
        };

        let liquidity = try_join_all(
            pools
                .iter()
                .map(|pool| self.provider.fetch_current_liquidity(address, pool)),
        )
        .await?;

        Ok(liquidity.into_iter().map(|l| (l.pool.clone(), l)).collect())
    }

    /// Weekly charts per pool, fetched concurrently; a pool without a chart
    /// maps to `None` instead of failing the batch
    pub async fn fetch_all_weekly_charts(
        &self,
        address: &str,
        pools: &[String],
    ) -> Result<HashMap<String, Option<Vec<StakeDayGraphPoint>>>, ProviderError> {
        let charts = join_all(pools.iter().map(|pool| async move {
            let chart = self.provider.fetch_weekly_chart(address, pool).await;
            (pool.clone(), chart)
        }))
        .await;

        let mut result = HashMap::with_capacity(charts.len());
        for (pool, chart) in charts {
            let chart = chart?;
            if chart.is_none() {
                tracing::warn!(pool = %pool, address, "No weekly chart");
            }
            result.insert(pool, chart);
        }
        Ok(result)
    }

    /// Report for one position priced with the current snapshot
    ///
    /// Start prices that cannot be fetched are logged and left unknown.
    pub async fn stake_report(&self, liq: CurrentLiquidity, snapshot: &PriceSnapshot) -> StakePoolReport {
        let (usd_per_rune_start, usd_per_asset_start) = match self
            .provider
            .fetch_usd_prices_at(&liq.pool, liq.first_stake_ts)
            .await
        {
            Ok((rune, asset)) => (Some(rune), Some(asset)),
            Err(e) => {
                tracing::error!(
                    pool = %liq.pool,
                    first_stake_ts = liq.first_stake_ts,
                    error = %e,
                    "Failed to fetch prices at first stake"
                );
                (None, None)
            }
        };

        StakePoolReport {
            usd_per_asset: snapshot.usd_per_asset(&liq.pool).unwrap_or(0.0),
            usd_per_rune: snapshot.usd_per_rune,
            usd_per_asset_start,
            usd_per_rune_start,
            pool: snapshot.pool_info_map.get(&liq.pool).cloned(),
            liquidity: liq,
        }
    }

    /// Reports for every position of `address`, ordered by pool name
    pub async fn reports(
        &self,
        address: &str,
        snapshot: &PriceSnapshot,
    ) -> Result<Vec<StakePoolReport>, ProviderError> {
        let mut positions: Vec<CurrentLiquidity> = self
            .fetch_all_pool_liquidity(address, None)
            .await?
            .into_values()
            .collect();
        positions.sort_by(|a, b| a.pool.cmp(&b.pool));

        Ok(join_all(positions.into_iter().map(|liq| self.stake_report(liq, snapshot))).await)
    }
}
