//! CoinGecko market data provider

use crate::{
    constants::COINGECKO_API_URL,
    error::ProviderError,
    provider::MarketDataProvider,
    types::CoinMarketInfo,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// `/coins/{id}/market_chart` response
#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    prices: Vec<(i64, f64)>,
}

/// `/coins/{id}` response, only the fields the bot reads
#[derive(Debug, Deserialize)]
struct CoinInfoResponse {
    #[serde(default)]
    market_cap_rank: Option<u32>,
    #[serde(default)]
    market_data: Option<CoinMarketData>,
}

#[derive(Debug, Deserialize)]
struct CoinMarketData {
    #[serde(default)]
    circulating_supply: Option<f64>,
}

impl From<CoinInfoResponse> for CoinMarketInfo {
    fn from(info: CoinInfoResponse) -> Self {
        Self {
            market_cap_rank: info.market_cap_rank,
            circulating_supply: info.market_data.and_then(|d| d.circulating_supply),
        }
    }
}

/// CoinGecko provider for one coin
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
    coin_id: String,
}

impl CoinGeckoProvider {
    /// Creates a provider for `coin_id` against the public API
    pub fn new(coin_id: &str) -> Result<Self, ProviderError> {
        Self::with_base_url(COINGECKO_API_URL, coin_id)
    }

    pub fn with_base_url(base_url: &str, coin_id: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            client: super::http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            coin_id: coin_id.to_string(),
        })
    }

    fn chart_url(&self, days: u32) -> String {
        format!(
            "{}/coins/{}/market_chart?vs_currency=usd&days={}",
            self.base_url, self.coin_id, days
        )
    }

    fn coin_info_url(&self) -> String {
        format!(
            "{}/coins/{}?localization=false&tickers=false&market_data=true&community_data=false&developer_data=false",
            self.base_url, self.coin_id
        )
    }

    fn parse_chart(text: &str) -> Result<Vec<(i64, f64)>, ProviderError> {
        let chart: MarketChartResponse = super::parse_json("CoinGecko chart", text)?;
        Ok(chart.prices)
    }

    fn parse_coin_info(text: &str) -> Result<CoinMarketInfo, ProviderError> {
        let info: CoinInfoResponse = super::parse_json("CoinGecko coin", text)?;
        Ok(info.into())
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    async fn fetch_coin_market(&self) -> Result<CoinMarketInfo, ProviderError> {
        let text = super::get_text(&self.client, self.provider_name(), &self.coin_info_url()).await?;
        Self::parse_coin_info(&text)
    }

    async fn fetch_price_chart(&self, days: u32) -> Result<Vec<(i64, f64)>, ProviderError> {
        let text = super::get_text(&self.client, self.provider_name(), &self.chart_url(days)).await?;
        let prices = Self::parse_chart(&text)?;

        tracing::debug!(
            coin = %self.coin_id,
            days,
            points = prices.len(),
            "Fetched price chart from CoinGecko"
        );
        Ok(prices)
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}
