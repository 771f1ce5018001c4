//! Error types for the notification bot

use thiserror::Error;

/// Errors that can occur when fetching data from an upstream API
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Provider API error
    #[error("Provider API error: {0}")]
    ApiError(String),
}

/// Errors raised by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stream entry id is not of the form `<ms>-<seq>`
    #[error("Invalid stream id: {0}")]
    InvalidStreamId(String),
}

/// Errors from parsing a timespan such as `1d12h`
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimespanError {
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Must be some digits before unit '{0}'")]
    MissingDigits(char),

    #[error("Unexpected symbol: {0}")]
    UnexpectedSymbol(char),

    #[error("Unfinished component in the end: {0}")]
    UnfinishedComponent(String),

    #[error("Timespan does not fit in seconds: {0}")]
    Overflow(String),
}

/// Errors that can occur when delivering a message
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Request URLs carry the bot token, so the URL is stripped
    #[error("Network error: {0}")]
    NetworkError(#[source] reqwest::Error),

    #[error("Messenger API error: {0}")]
    ApiError(String),
}

impl From<reqwest::Error> for BroadcastError {
    fn from(e: reqwest::Error) -> Self {
        Self::NetworkError(e.without_url())
    }
}

/// Errors while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid timespan for '{field}': {source}")]
    InvalidTimespan {
        field: &'static str,
        #[source]
        source: TimespanError,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Creates an InvalidTimespan error
    pub fn timespan(field: &'static str, source: TimespanError) -> Self {
        Self::InvalidTimespan { field, source }
    }
}

/// Errors from a notifier handling a sample
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Broadcast error: {0}")]
    Broadcast(#[from] BroadcastError),
}

/// Top level error of a poll cycle or bot command
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Broadcast(#[from] BroadcastError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
