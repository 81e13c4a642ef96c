use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Where an observed price came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    /// Entered by hand
    Manual,
    /// Fetched from a market-data provider (provider name)
    Provider(String),
    /// Loaded from an import file or seed bundle
    Import,
}

/// An immutable, timestamped observed price for a holding.
///
/// Price points are only ever appended; corrections are new points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub id: Uuid,
    pub holding_id: Uuid,
    /// Price of one unit
    pub price: f64,
    /// Currency `price` is quoted in
    pub currency: String,
    pub recorded_at: DateTime<Utc>,
    pub source: PriceSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPricePoint {
    pub holding_id: Uuid,
    pub price: f64,
    pub currency: String,
    pub recorded_at: DateTime<Utc>,
    pub source: PriceSource,
}

impl NewPricePoint {
    pub fn manual(
        holding_id: Uuid,
        price: f64,
        currency: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            holding_id,
            price,
            currency: currency.into(),
            recorded_at,
            source: PriceSource::Manual,
        }
    }

    pub(crate) fn into_price_point(self, id: Uuid) -> PricePoint {
        PricePoint {
            id,
            holding_id: self.holding_id,
            price: self.price,
            currency: self.currency,
            recorded_at: self.recorded_at,
            source: self.source,
        }
    }
}

/// A quote returned by a market-data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub currency: String,
    pub as_of: DateTime<Utc>,
    /// Absolute change since the previous close, when the provider reports it
    pub change_abs: Option<f64>,
    /// Percentage change since the previous close, when the provider reports it
    pub change_percent: Option<f64>,
}

/// Table of exchange rates against a single base currency.
///
/// `rates[code]` is the number of base units one unit of `code` is worth,
/// e.g. with base USD: `rates["EUR"] = 1.08`. The base itself is implicitly 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub base: String,
    pub rates: HashMap<String, f64>,
}

impl ExchangeRates {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            rates: HashMap::new(),
        }
    }

    /// Insert or replace the rate for `currency` (base units per unit of `currency`).
    pub fn set_rate(&mut self, currency: &str, rate: f64) {
        self.rates.insert(currency.to_uppercase(), rate);
    }

    /// Builder-style `set_rate`.
    pub fn with_rate(mut self, currency: &str, rate: f64) -> Self {
        self.set_rate(currency, rate);
        self
    }

    /// Base units per unit of `currency`, if known and usable.
    fn base_per_unit(&self, currency: &str) -> Option<f64> {
        if currency.eq_ignore_ascii_case(&self.base) {
            return Some(1.0);
        }
        self.rates
            .get(currency)
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    /// Multiplier converting an amount in `from` into `to`.
    /// Returns `None` when either side has no usable rate.
    pub fn rate(&self, from: &str, to: &str) -> Option<f64> {
        let from = from.to_uppercase();
        let to = to.to_uppercase();
        if from == to {
            return Some(1.0);
        }
        Some(self.base_per_unit(&from)? / self.base_per_unit(&to)?)
    }
}

impl Default for ExchangeRates {
    fn default() -> Self {
        Self::new("USD")
    }
}
