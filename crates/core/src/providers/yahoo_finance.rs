use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::CoreError;
use crate::models::holding::AssetType;
use crate::models::price::Quote;
use super::traits::MarketDataProvider;

/// Yahoo Finance API provider for stock/equity quotes.
///
/// - **Free**: No API key required.
/// - **No strict rate limits** (unofficial public API).
/// - **Coverage**: Global equities, ETFs, indices, mutual funds.
///
/// Uses the `yahoo_finance_api` crate. The quote is the last daily close;
/// the change is measured against the bar before it. Prices are taken to
/// be in USD; other listings need an exchange rate entered by hand.
///
/// **Note**: Not WASM-compatible (uses native reqwest/tokio). On WASM
/// targets Alpha Vantage is the only stock provider.
pub struct YahooFinanceProvider {
    connector: yahoo_finance_api::YahooConnector,
}

impl YahooFinanceProvider {
    pub fn new() -> Result<Self, CoreError> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| CoreError::Api {
                provider: "Yahoo Finance".into(),
                message: format!("Failed to create connector: {e}"),
            })?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceProvider {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Stock]
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, CoreError> {
        let upper = symbol.to_uppercase();
        let resp = self
            .connector
            .get_latest_quotes(&upper, "1d")
            .await
            .map_err(|e| CoreError::Api {
                provider: "Yahoo Finance".into(),
                message: format!("Failed to fetch latest quote for {upper}: {e}"),
            })?;

        let quotes = resp.quotes().map_err(|e| CoreError::Api {
            provider: "Yahoo Finance".into(),
            message: format!("No quote data for {upper}: {e}"),
        })?;

        let last = quotes.last().ok_or_else(|| CoreError::PriceNotAvailable {
            symbol: upper.clone(),
        })?;
        let previous = quotes
            .len()
            .checked_sub(2)
            .and_then(|idx| quotes.get(idx))
            .map(|q| q.close)
            .filter(|close| *close > 0.0);

        let change_abs = previous.map(|prev| last.close - prev);
        let change_percent = previous.map(|prev| (last.close - prev) / prev * 100.0);

        Ok(Quote {
            symbol: upper,
            price: last.close,
            currency: "USD".to_string(),
            as_of: DateTime::from_timestamp(last.timestamp, 0).unwrap_or_else(Utc::now),
            change_abs,
            change_percent,
        })
    }
}
