use std::collections::HashMap;
use std::sync::Arc;

use crate::models::holding::AssetType;

use super::alphavantage::AlphaVantageProvider;
use super::coincap::CoinCapProvider;
use super::frankfurter::FrankfurterProvider;
use super::traits::{ExchangeRateProvider, MarketDataProvider};
#[cfg(not(target_arch = "wasm32"))]
use super::yahoo_finance::YahooFinanceProvider;

/// Registry of all available market-data providers.
///
/// Routes quote requests to providers by `AssetType`, in registration
/// order, so a later provider acts as fallback for an earlier one. Holds at
/// most one exchange-rate provider.
pub struct MarketDataRegistry {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    rate_provider: Option<Arc<dyn ExchangeRateProvider>>,
}

impl MarketDataRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            rate_provider: None,
        }
    }

    /// Create a registry with all default providers pre-configured.
    pub fn new_with_defaults(api_keys: &HashMap<String, String>) -> Self {
        let mut registry = Self::new();

        // CoinCap: crypto, no API key needed
        registry.register(Arc::new(CoinCapProvider::new()));

        // Yahoo Finance: stocks, NO API key needed (primary)
        // Not available on WASM (uses native reqwest/tokio connectors)
        #[cfg(not(target_arch = "wasm32"))]
        {
            if let Ok(yahoo) = YahooFinanceProvider::new() {
                registry.register(Arc::new(yahoo));
            }
        }

        // Alpha Vantage: stocks, requires API key (fallback)
        if let Some(key) = api_keys.get("alphavantage").filter(|k| !k.trim().is_empty()) {
            registry.register(Arc::new(AlphaVantageProvider::new(key.clone())));
        }

        // Frankfurter: forex, no API key needed
        registry.set_rate_provider(Arc::new(FrankfurterProvider::new()));

        registry
    }

    /// Register a new market-data provider.
    pub fn register(&mut self, provider: Arc<dyn MarketDataProvider>) {
        self.providers.push(provider);
    }

    pub fn set_rate_provider(&mut self, provider: Arc<dyn ExchangeRateProvider>) {
        self.rate_provider = Some(provider);
    }

    pub fn rate_provider(&self) -> Option<Arc<dyn ExchangeRateProvider>> {
        self.rate_provider.clone()
    }

    /// Return ALL providers that support the given asset type, ordered by registration priority.
    /// Used for fallback: if the first provider fails, try the next one.
    pub fn get_providers_for(&self, asset_type: AssetType) -> Vec<Arc<dyn MarketDataProvider>> {
        self.providers
            .iter()
            .filter(|p| p.supported_asset_types().contains(&asset_type))
            .cloned()
            .collect()
    }

    pub fn has_provider_for(&self, asset_type: AssetType) -> bool {
        self.providers
            .iter()
            .any(|p| p.supported_asset_types().contains(&asset_type))
    }
}

impl Default for MarketDataRegistry {
    fn default() -> Self {
        Self::new()
    }
}
