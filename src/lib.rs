//! # RUNE alert bot
//!
//! Polls THORChain market data and broadcasts price, all-time-high and pool
//! cap notifications to Telegram channels.
//!
//! ## Flow
//!
//! Every poll cycle fetches the pools from Midgard, updates the
//! [`PriceSnapshot`], composes a [`FairPrice`] sample with CoinGecko market
//! data and hands it to the [`PriceNotifier`]; the pool cap goes to the
//! [`CapNotifier`]. Notifiers gate their messages with persistent cooldowns
//! and read trailing averages from the price time series kept in a [`Store`].
//!
//! ```no_run
//! use rune_alert_bot::{Config, NotificationBot};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file("config.toml")?;
//! let bot = NotificationBot::from_config(&config)?;
//! bot.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod ath;
pub mod bot;
pub mod broadcast;
pub mod config;
pub mod constants;
pub mod cooldown;
pub mod error;
pub mod format;
pub mod liquidity;
pub mod notify;
pub mod provider;
pub mod providers;
pub mod snapshot;
pub mod store;
pub mod time_series;
pub mod timespan;
pub mod types;

// Re-export commonly used types
pub use bot::{CycleReport, NotificationBot, Providers};
pub use broadcast::{Broadcaster, Message, TelegramBroadcaster};
pub use config::Config;
pub use error::{BotError, ConfigError, NotifyError, ProviderError, StoreError};
pub use notify::{CapNotifier, Notifier, NotifyOutcome, NotifyReason, PriceNotifier};
pub use snapshot::PriceSnapshot;
pub use store::{MemoryStore, Store};
pub use types::{CapInfo, FairPrice, PriceAth};
