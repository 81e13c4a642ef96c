use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::price::ExchangeRates;
use crate::errors::CoreError;

/// User-configurable settings, persisted through the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Static exchange-rate table used to convert prices into the display
    /// currency. Can be refreshed from a rate provider.
    pub exchange_rates: ExchangeRates,

    /// Optional API keys for providers that require them.
    /// Keys: provider name (e.g., "alphavantage").
    /// Values: the API key string.
    pub api_keys: HashMap<String, String>,

    /// Thresholds used by the insights job.
    #[serde(default)]
    pub insights: InsightThresholds,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exchange_rates: ExchangeRates::default(),
            api_keys: HashMap::new(),
            insights: InsightThresholds::default(),
        }
    }
}

/// When the insights job considers something worth mentioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightThresholds {
    /// A single holding at or above this share of the portfolio (percent)
    pub concentration_pct: f64,
    /// A single category at or above this share of the portfolio (percent)
    pub category_concentration_pct: f64,
    /// Price move since the last check that gets reported (percent)
    pub price_move_pct: f64,
    /// A latest price older than this many days is stale
    pub stale_after_days: i64,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            concentration_pct: 25.0,
            category_concentration_pct: 60.0,
            price_move_pct: 10.0,
            stale_after_days: 7,
        }
    }
}

impl InsightThresholds {
    /// Percentages must be finite and positive; the stale window may be zero.
    pub fn validate(&self) -> Result<(), CoreError> {
        let percentages = [
            ("concentration_pct", self.concentration_pct),
            ("category_concentration_pct", self.category_concentration_pct),
            ("price_move_pct", self.price_move_pct),
        ];
        for (field, value) in percentages {
            if !value.is_finite() || value <= 0.0 {
                return Err(CoreError::Validation(format!(
                    "Insight threshold {field} must be a positive number, got {value}"
                )));
            }
        }
        if self.stale_after_days < 0 {
            return Err(CoreError::Validation(format!(
                "Insight threshold stale_after_days cannot be negative, got {}",
                self.stale_after_days
            )));
        }
        Ok(())
    }
}
