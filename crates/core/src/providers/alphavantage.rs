#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::errors::CoreError;
use crate::models::holding::AssetType;
use crate::models::price::Quote;
use super::traits::MarketDataProvider;

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Alpha Vantage API provider for stock/equity quotes.
///
/// - **Free tier**: 25 requests/day (across ALL endpoints).
/// - **Requires**: API key (set via settings as "alphavantage").
/// - **Coverage**: 100k+ global equity symbols.
///
/// Prices come back in the listing's currency, which the GLOBAL_QUOTE
/// endpoint does not report; USD is assumed.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: String) -> Self {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(30));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            api_key,
        }
    }
}

// ── Alpha Vantage API response types ────────────────────────────────

#[derive(Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    /// Present instead of data when the daily limit is hit
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "09. change")]
    change: Option<String>,
    #[serde(rename = "10. change percent")]
    change_percent: Option<String>,
}

/// Parse "1.2345%" / "-0.5%" into a number.
fn parse_percent(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').parse().ok()
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl MarketDataProvider for AlphaVantageProvider {
    fn name(&self) -> &str {
        "Alpha Vantage"
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Stock]
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, CoreError> {
        if self.api_key.trim().is_empty() {
            return Err(CoreError::MissingCredentials("alphavantage".into()));
        }

        let upper = symbol.to_uppercase();
        let resp: GlobalQuoteResponse = self
            .client
            .get(BASE_URL)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", upper.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "Alpha Vantage".into(),
                message: format!("Failed to parse quote for {upper}: {e}"),
            })?;

        if let Some(message) = resp.error_message.or(resp.note) {
            return Err(CoreError::Api {
                provider: "Alpha Vantage".into(),
                message: format!("{upper}: {message}"),
            });
        }

        let quote = resp.global_quote.ok_or_else(|| CoreError::Api {
            provider: "Alpha Vantage".into(),
            message: format!("No quote data for {upper}. API limit may be exceeded."),
        })?;

        let price: f64 = quote
            .price
            .as_deref()
            .ok_or_else(|| CoreError::Api {
                provider: "Alpha Vantage".into(),
                message: format!("Unknown symbol {upper}"),
            })?
            .parse()
            .map_err(|e| CoreError::Api {
                provider: "Alpha Vantage".into(),
                message: format!("Invalid price format for {upper}: {e}"),
            })?;

        let as_of = quote
            .latest_trading_day
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .unwrap_or_else(Utc::now);

        Ok(Quote {
            symbol: quote.symbol.unwrap_or(upper),
            price,
            currency: "USD".to_string(),
            as_of,
            change_abs: quote.change.as_deref().and_then(|c| c.trim().parse().ok()),
            change_percent: quote.change_percent.as_deref().and_then(parse_percent),
        })
    }
}
