//! Constants for the notification bot
//!
//! Endpoint defaults, store keys and model constants live here. Everything
//! an operator may want to tune goes through `config` instead.

/// Default poll interval when the config omits it (in seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// HTTP request timeout for upstream APIs (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 20;

/// User agent for HTTP requests
pub const USER_AGENT: &str = "rune-alert-bot/0.1.0";

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// CoinGecko coin id of the tracked token
pub const DEFAULT_COIN_ID: &str = "thorchain";

/// Midgard (chain indexer) base URL
pub const MIDGARD_API_URL: &str = "https://chaosnet-midgard.bepswap.com";

/// THORNode base URL, used for mimir constants
pub const THORNODE_API_URL: &str = "https://thornode.thorchain.info";

/// Asgard consumer (liquidity analytics) base URL
pub const ASGARD_CONSUMER_URL: &str = "https://asgard-consumer.vercel.app";

/// Telegram Bot API base URL
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Mimir key holding the maximum amount of rune that can be staked
pub const MIMIR_MAX_STAKE_RUNE: &str = "mimir//MAXIMUMSTAKERUNE";

/// Chain amounts are integers with 8 decimals
pub const THOR_DIVIDER: f64 = 100_000_000.0;

pub const RUNE_SYMBOL: &str = "BNB.RUNE-B1A";
pub const RUNE_SYMBOL_DET: &str = "RUNE-DET";
pub const BUSD_SYMBOL: &str = "BNB.BUSD-BD1";
pub const USDT_SYMBOL: &str = "BNB.USDT-6D8";
pub const BTCB_SYMBOL: &str = "BNB.BTCB-1DE";

/// Pools whose asset is pegged to USD
pub const STABLE_COIN_POOLS: &[&str] = &[BUSD_SYMBOL, USDT_SYMBOL];

/// Circulating supply used until CoinGecko reports one
pub const DEFAULT_CIRCULATING_SUPPLY: f64 = 500_000_000.0;

/// Highest price registered before the bot started tracking (USD)
pub const REAL_REGISTERED_ATH: f64 = 1.18;

/// 1 Sep 2020 11:00 UTC
pub const REAL_REGISTERED_ATH_DATE: i64 = 1_598_958_000;

/// Store key of the ATH record
pub const ATH_KEY: &str = "runeATH";

/// Store key of the last cap info record
pub const CAP_INFO_KEY: &str = "th_info";

/// Age after which series observations are trimmed (8 days, past the 7 day window)
pub const SERIES_RETENTION_SECS: i64 = 8 * 24 * 60 * 60;

/// Maximum number of entries returned by a single range query
pub const DEFAULT_RANGE_LIMIT: usize = 100;

// Cooldown keys
pub const CD_KEY_PRICE_NOTIFIED: &str = "price_notified";
pub const CD_KEY_PRICE_RISE_NOTIFIED: &str = "price_notified_rise";
pub const CD_KEY_PRICE_FALL_NOTIFIED: &str = "price_notified_fall";
pub const CD_KEY_ATH_NOTIFIED: &str = "ath_notified";
