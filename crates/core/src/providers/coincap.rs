use std::collections::HashMap;
use std::sync::Mutex;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::CoreError;
use crate::models::holding::AssetType;
use crate::models::price::Quote;
use super::traits::MarketDataProvider;

const BASE_URL: &str = "https://api.coincap.io/v2";

/// Symbols whose CoinCap id differs from the lowercased symbol.
const KNOWN_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("USDT", "tether"),
    ("USDC", "usd-coin"),
    ("BNB", "binance-coin"),
    ("XRP", "xrp"),
    ("ADA", "cardano"),
    ("SOL", "solana"),
    ("DOGE", "dogecoin"),
    ("DOT", "polkadot"),
    ("MATIC", "polygon"),
    ("LTC", "litecoin"),
    ("AVAX", "avalanche"),
    ("LINK", "chainlink"),
    ("XLM", "stellar"),
    ("XMR", "monero"),
];

/// CoinCap API provider for cryptocurrency quotes.
///
/// - **Free**: No API key required.
/// - **Data**: 2000+ cryptocurrencies, prices in USD with 24h change.
///
/// CoinCap addresses assets by id ("bitcoin"), not symbol ("BTC"). Common
/// symbols are mapped up front; unknown ones are resolved through the
/// search endpoint once and remembered.
pub struct CoinCapProvider {
    client: Client,
    symbol_map: Mutex<HashMap<String, String>>,
}

impl CoinCapProvider {
    pub fn new() -> Self {
        let symbol_map = KNOWN_IDS
            .iter()
            .map(|(sym, id)| (sym.to_string(), id.to_string()))
            .collect();

        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(30));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
            symbol_map: Mutex::new(symbol_map),
        }
    }

    /// Id already known for `symbol`, if any.
    pub fn known_id(&self, symbol: &str) -> Option<String> {
        let map = self.symbol_map.lock().unwrap_or_else(|e| e.into_inner());
        map.get(&symbol.to_uppercase()).cloned()
    }

    async fn resolve_id(&self, symbol: &str) -> Result<String, CoreError> {
        let upper = symbol.to_uppercase();
        if let Some(id) = self.known_id(&upper) {
            return Ok(id);
        }

        debug!("Resolving CoinCap id for {upper}");
        let url = format!("{BASE_URL}/assets?search={upper}&limit=5");
        let resp: SearchResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "CoinCap".into(),
                message: format!("Failed to search for {upper}: {e}"),
            })?;

        let id = resp
            .data
            .into_iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(&upper))
            .map(|a| a.id)
            .ok_or_else(|| CoreError::Api {
                provider: "CoinCap".into(),
                message: format!("No CoinCap asset found for symbol {upper}"),
            })?;

        self.symbol_map
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(upper, id.clone());
        Ok(id)
    }
}

impl Default for CoinCapProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── CoinCap API response types ──────────────────────────────────────

#[derive(Deserialize)]
struct AssetResponse {
    data: AssetData,
    /// Server time in unix milliseconds
    timestamp: Option<i64>,
}

#[derive(Deserialize)]
struct AssetData {
    symbol: String,
    #[serde(rename = "priceUsd")]
    price_usd: Option<String>,
    #[serde(rename = "changePercent24Hr")]
    change_percent_24h: Option<String>,
}

#[derive(Deserialize)]
struct SearchResponse {
    data: Vec<SearchEntry>,
}

#[derive(Deserialize)]
struct SearchEntry {
    id: String,
    symbol: String,
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl MarketDataProvider for CoinCapProvider {
    fn name(&self) -> &str {
        "CoinCap"
    }

    fn supported_asset_types(&self) -> Vec<AssetType> {
        vec![AssetType::Crypto]
    }

    async fn get_quote(&self, symbol: &str) -> Result<Quote, CoreError> {
        let id = self.resolve_id(symbol).await?;
        let url = format!("{BASE_URL}/assets/{id}");

        let resp: AssetResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Api {
                provider: "CoinCap".into(),
                message: format!("Failed to parse response for {symbol}: {e}"),
            })?;

        let price: f64 = resp
            .data
            .price_usd
            .as_deref()
            .ok_or_else(|| CoreError::Api {
                provider: "CoinCap".into(),
                message: format!("No price data for {symbol}"),
            })?
            .parse()
            .map_err(|e| CoreError::Api {
                provider: "CoinCap".into(),
                message: format!("Invalid price format for {symbol}: {e}"),
            })?;

        let change_percent: Option<f64> = resp
            .data
            .change_percent_24h
            .as_deref()
            .and_then(|s| s.parse().ok());
        // price = previous × (1 + pct/100)  ⇒  change = price − price / (1 + pct/100)
        let change_abs = change_percent
            .filter(|pct| (100.0 + pct).abs() > f64::EPSILON)
            .map(|pct| price - price / (1.0 + pct / 100.0));

        let as_of = resp
            .timestamp
            .and_then(chrono::DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        Ok(Quote {
            symbol: resp.data.symbol.to_uppercase(),
            price,
            currency: "USD".to_string(),
            as_of,
            change_abs,
            change_percent,
        })
    }
}
