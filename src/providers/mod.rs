//! Upstream API clients

pub mod asgard;
pub mod coingecko;
pub mod midgard;

pub use asgard::AsgardLiquidityProvider;
pub use coingecko::CoinGeckoProvider;
pub use midgard::MidgardProvider;

use crate::constants::{REQUEST_TIMEOUT_SECS, USER_AGENT};
use crate::error::ProviderError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// HTTP client shared by the providers' constructors
pub(crate) fn http_client() -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(ProviderError::NetworkError)
}

/// GETs `url` and decodes the JSON body
///
/// Undecodable bodies map to `InvalidResponse` carrying the raw text.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    source: &str,
    url: &str,
) -> Result<T, ProviderError> {
    let text = get_text(client, source, url).await?;
    parse_json(source, &text)
}

/// GETs `url` and returns the body of a successful response
///
/// 429 maps to `RateLimitExceeded`, other non-success statuses to `ApiError`.
pub(crate) async fn get_text(client: &Client, source: &str, url: &str) -> Result<String, ProviderError> {
    tracing::debug!(source, url, "GET");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(ProviderError::NetworkError)?;

    let status = response.status();
    if status.as_u16() == 429 {
        return Err(ProviderError::RateLimitExceeded);
    }

    if !status.is_success() {
        return Err(ProviderError::ApiError(format!(
            "HTTP {}: {}",
            status,
            response.text().await.unwrap_or_default()
        )));
    }

    response.text().await.map_err(ProviderError::NetworkError)
}

pub(crate) fn parse_json<T: DeserializeOwned>(source: &str, text: &str) -> Result<T, ProviderError> {
    serde_json::from_str(text).map_err(|e| {
        ProviderError::InvalidResponse(format!(
            "Failed to parse {} response: {}. Response: {}",
            source, e, text
        ))
    })
}

/// Number that upstream APIs send either as JSON number or as string
#[derive(Deserialize)]
#[serde(untagged)]
enum FlexNumber {
    Number(f64),
    Text(String),
}

pub(crate) fn de_flex_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match FlexNumber::deserialize(deserializer)? {
        FlexNumber::Number(n) => Ok(n),
        FlexNumber::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

pub(crate) fn flex_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
