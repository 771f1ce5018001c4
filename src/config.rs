//! TOML configuration
//!
//! Durations are written as timespans (`"12h"`, `"1d12h"`, `"90"`) and parsed
//! into seconds once, when the file is loaded.

use crate::broadcast::ChatId;
use crate::constants::{
    ASGARD_CONSUMER_URL, COINGECKO_API_URL, DEFAULT_COIN_ID, DEFAULT_POLL_INTERVAL_SECS,
    MIDGARD_API_URL, THORNODE_API_URL,
};
use crate::error::ConfigError;
use crate::timespan::parse_timespan_to_seconds;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `telegram.bot_token`
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    pub price: PriceConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub channels: Vec<ChatId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceConfig {
    /// Periodic update even without a significant move
    pub global_cd: String,
    /// Between two rise (or two fall) notifications
    pub change_cd: String,
    /// Percent move against the 1h average that counts as significant
    pub percent_change_threshold: f64,
    pub ath: AthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AthConfig {
    pub cooldown: String,
    #[serde(default)]
    pub stickers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,
    #[serde(default = "default_coin_id")]
    pub coin_id: String,
    #[serde(default = "default_coingecko_url")]
    pub coingecko_url: String,
    #[serde(default = "default_midgard_url")]
    pub midgard_url: String,
    #[serde(default = "default_thornode_url")]
    pub thornode_url: String,
    #[serde(default = "default_asgard_url")]
    pub asgard_url: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            coin_id: default_coin_id(),
            coingecko_url: default_coingecko_url(),
            midgard_url: default_midgard_url(),
            thornode_url: default_thornode_url(),
            asgard_url: default_asgard_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot of the in-memory store; state is lost on exit without it
    pub snapshot_path: Option<PathBuf>,
}

fn default_poll_interval() -> String {
    DEFAULT_POLL_INTERVAL_SECS.to_string()
}

fn default_coin_id() -> String {
    DEFAULT_COIN_ID.to_string()
}

fn default_coingecko_url() -> String {
    COINGECKO_API_URL.to_string()
}

fn default_midgard_url() -> String {
    MIDGARD_API_URL.to_string()
}

fn default_thornode_url() -> String {
    THORNODE_API_URL.to_string()
}

fn default_asgard_url() -> String {
    ASGARD_CONSUMER_URL.to_string()
}

/// Price notifier settings with durations resolved to seconds
#[derive(Debug, Clone, PartialEq)]
pub struct PriceNotifierSettings {
    pub global_cd: u64,
    pub change_cd: u64,
    pub percent_change_threshold: f64,
    pub ath_cooldown: u64,
    pub ath_stickers: Vec<String>,
}

impl Config {
    /// Loads the file and applies environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::parse(&content)?;

        if let Ok(token) = std::env::var(BOT_TOKEN_ENV) {
            if !token.is_empty() {
                config.telegram.bot_token = token;
            }
        }

        tracing::info!(
            path = %path.as_ref().display(),
            channels = config.telegram.channels.len(),
            "Loaded config"
        );
        Ok(config)
    }

    /// Parses and validates TOML content
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.price_settings()?;
        config.poll_interval_secs()?;
        Ok(config)
    }

    pub fn price_settings(&self) -> Result<PriceNotifierSettings, ConfigError> {
        let price = &self.price;
        if !(price.percent_change_threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "price.percent_change_threshold must be positive, got {}",
                price.percent_change_threshold
            )));
        }

        Ok(PriceNotifierSettings {
            global_cd: parse_timespan_to_seconds(&price.global_cd)
                .map_err(|e| ConfigError::timespan("price.global_cd", e))?,
            change_cd: parse_timespan_to_seconds(&price.change_cd)
                .map_err(|e| ConfigError::timespan("price.change_cd", e))?,
            percent_change_threshold: price.percent_change_threshold,
            ath_cooldown: parse_timespan_to_seconds(&price.ath.cooldown)
                .map_err(|e| ConfigError::timespan("price.ath.cooldown", e))?,
            ath_stickers: price.ath.stickers.clone(),
        })
    }

    pub fn poll_interval_secs(&self) -> Result<u64, ConfigError> {
        let secs = parse_timespan_to_seconds(&self.fetch.poll_interval)
            .map_err(|e| ConfigError::timespan("fetch.poll_interval", e))?;
        if secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch.poll_interval must be at least one second".to_string(),
            ));
        }
        Ok(secs)
    }
}
