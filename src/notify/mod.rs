//! Notifiers: decide whether a new sample is worth a broadcast
//!
//! The poll loop hands every sample to the matching notifier explicitly;
//! each notifier reports what it did as a `NotifyOutcome`.

pub mod cap;
pub mod price;

pub use cap::CapNotifier;
pub use price::PriceNotifier;

use crate::error::NotifyError;
use async_trait::async_trait;

/// Why a notification went out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyReason {
    AllTimeHigh,
    PriceRise,
    PriceFall,
    /// Global cooldown elapsed without a significant move
    Periodic,
    CapChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Notified(NotifyReason),
    /// Sample accepted, nothing worth sending
    Suppressed,
    /// Sample rejected as invalid
    Discarded,
}

impl NotifyOutcome {
    pub fn is_notified(&self) -> bool {
        matches!(self, NotifyOutcome::Notified(_))
    }
}

/// Handles one kind of polled sample
#[async_trait]
pub trait Notifier: Send + Sync {
    type Sample: Send + 'static;

    async fn on_data(&self, sample: Self::Sample) -> Result<NotifyOutcome, NotifyError>;

    fn name(&self) -> &'static str;
}
