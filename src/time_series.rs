//! Named time series on top of store streams, and trailing price averages

use crate::constants::DEFAULT_RANGE_LIMIT;
use crate::error::StoreError;
use crate::store::{Fields, Store, StreamId};
use crate::timespan::{now_ts, DAY, HOUR, MINUTE};
use crate::types::HistoricalPrices;
use std::sync::Arc;

/// Append-only, time ordered series of observations
#[derive(Clone)]
pub struct TimeSeries {
    name: String,
    store: Arc<dyn Store>,
}

impl TimeSeries {
    pub fn new(name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        Self {
            name: name.into(),
            store,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stream_name(&self) -> String {
        format!("ts-stream:{}", self.name)
    }

    /// Millisecond bounds of `[now - ago - tolerance, now - ago + tolerance]`
    pub fn window(now_sec: i64, ago_sec: i64, tolerance_sec: i64) -> (i64, i64) {
        (
            (now_sec - ago_sec - tolerance_sec) * 1000,
            (now_sec - ago_sec + tolerance_sec) * 1000,
        )
    }

    /// Appends one observation; `Ok(None)` when `id` already exists
    pub async fn add(
        &self,
        id: Option<StreamId>,
        fields: Fields,
    ) -> Result<Option<StreamId>, StoreError> {
        self.store.stream_add(&self.stream_name(), id, fields).await
    }

    pub async fn select(
        &self,
        start_ms: i64,
        end_ms: i64,
        limit: usize,
    ) -> Result<Vec<(StreamId, Fields)>, StoreError> {
        self.store
            .stream_range(&self.stream_name(), start_ms, end_ms, limit)
            .await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.stream_clear(&self.stream_name()).await
    }

    /// Drops observations captured more than `max_age_sec` before `now_sec`
    pub async fn trim_older_than(&self, now_sec: i64, max_age_sec: i64) -> Result<usize, StoreError> {
        self.store
            .stream_trim_before(&self.stream_name(), (now_sec - max_age_sec) * 1000)
            .await
    }
}

/// Price series of one coin, entries carry a `price` field
#[derive(Clone)]
pub struct PriceTimeSeries {
    series: TimeSeries,
}

impl PriceTimeSeries {
    pub fn new(coin: &str, store: Arc<dyn Store>) -> Self {
        Self {
            series: TimeSeries::new(format!("price-{}", coin), store),
        }
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    /// Appends a price captured now
    pub async fn add_price(&self, price: f64) -> Result<Option<StreamId>, StoreError> {
        self.series.add(None, price_fields(price)).await
    }

    /// Appends a price under an explicit id, used when re-seeding history
    pub async fn add_price_at(
        &self,
        id: StreamId,
        price: f64,
    ) -> Result<Option<StreamId>, StoreError> {
        self.series.add(Some(id), price_fields(price)).await
    }

    /// Mean of positive prices around `ago` seconds in the past, 0 if none
    pub async fn average_ago(&self, ago: i64, tolerance: i64) -> Result<f64, StoreError> {
        self.average_ago_at(now_ts() as i64, ago, tolerance).await
    }

    pub async fn average_ago_at(
        &self,
        now_sec: i64,
        ago: i64,
        tolerance: i64,
    ) -> Result<f64, StoreError> {
        let (start, end) = TimeSeries::window(now_sec, ago, tolerance);
        let items = self.series.select(start, end, DEFAULT_RANGE_LIMIT).await?;

        let (n, accum) = items
            .iter()
            .filter_map(|(_, fields)| fields.get("price")?.parse::<f64>().ok())
            .filter(|price| *price > 0.0)
            .fold((0usize, 0.0f64), |(n, accum), price| (n + 1, accum + price));

        Ok(if n > 0 { accum / n as f64 } else { 0.0 })
    }

    /// 1 hour, 24 hour and 7 day trailing averages, queried concurrently
    pub async fn historical_triplet(&self) -> Result<HistoricalPrices, StoreError> {
        let (price_1h, price_24h, price_7d) = tokio::try_join!(
            self.average_ago(HOUR, 5 * MINUTE),
            self.average_ago(DAY, 30 * MINUTE),
            self.average_ago(7 * DAY, HOUR),
        )?;

        Ok(HistoricalPrices {
            price_1h,
            price_24h,
            price_7d,
        })
    }
}

fn price_fields(price: f64) -> Fields {
    let mut fields = Fields::new();
    fields.insert("price".to_string(), price.to_string());
    fields
}
