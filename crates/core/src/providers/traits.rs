use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::holding::AssetType;
use crate::models::price::Quote;

/// A source of market quotes (stocks, crypto, ...).
///
/// Each upstream API gets its own implementation, so replacing a provider
/// that stops working touches only that file. Calls are one-shot: no
/// retries, failures go straight back to the caller.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors/price sources).
    fn name(&self) -> &str;

    /// Which asset types this provider can quote.
    fn supported_asset_types(&self) -> Vec<AssetType>;

    /// Latest quote for `symbol`.
    ///
    /// Fails with `CoreError::Api` when the symbol is unknown or the
    /// response is malformed, `CoreError::MissingCredentials` when the
    /// provider needs a key it does not have, `CoreError::Network` on
    /// transport errors.
    async fn get_quote(&self, symbol: &str) -> Result<Quote, CoreError>;
}

/// A source of fiat exchange rates.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait ExchangeRateProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Latest rates for `base`: currency → units of that currency per one unit of `base`.
    async fn get_rates(&self, base: &str) -> Result<HashMap<String, f64>, CoreError>;
}
