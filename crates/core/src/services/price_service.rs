use std::collections::HashMap;

use chrono::Utc;
use log::{debug, warn};

use crate::errors::CoreError;
use crate::models::holding::{AssetType, Holding};
use crate::models::price::{ExchangeRates, Quote};
use crate::providers::registry::MarketDataRegistry;
use crate::services::currency_service::CurrencyService;

/// Fetches quotes and exchange rates from the registered providers.
///
/// Quotes are one-shot: no caching here (the facade's query cache and the
/// stored price points cover that) and no retries beyond falling back to
/// the next provider for the same asset type.
pub struct PriceService {
    registry: MarketDataRegistry,
    currency_service: CurrencyService,
}

impl PriceService {
    pub fn new(registry: MarketDataRegistry) -> Self {
        Self {
            registry,
            currency_service: CurrencyService::new(),
        }
    }

    /// Check if a quote can be obtained for a given asset type.
    pub fn has_provider_for(&self, asset_type: AssetType) -> bool {
        asset_type == AssetType::Cash || self.registry.has_provider_for(asset_type)
    }

    /// Get the names of all providers available for a given asset type.
    pub fn get_provider_names(&self, asset_type: AssetType) -> Vec<String> {
        self.registry
            .get_providers_for(asset_type)
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    /// Latest quote for a holding, with the name of the provider that supplied it.
    ///
    /// Cash is quoted at 1.0 in its own currency without a network call.
    /// Otherwise providers are tried in registration order; if the primary
    /// fails (API down, rate limited, etc.) the next one is asked. Returned
    /// prices must be finite and non-negative.
    pub async fn fetch_quote(&self, holding: &Holding) -> Result<(Quote, String), CoreError> {
        if holding.asset_type == AssetType::Cash {
            return Ok((
                Quote {
                    symbol: holding.symbol.clone(),
                    price: 1.0,
                    currency: holding.currency.clone(),
                    as_of: Utc::now(),
                    change_abs: Some(0.0),
                    change_percent: Some(0.0),
                },
                "Cash".to_string(),
            ));
        }

        let providers = self.registry.get_providers_for(holding.asset_type);
        if providers.is_empty() {
            return Err(CoreError::NoProvider(holding.asset_type.to_string()));
        }

        let mut last_error = None;
        for provider in &providers {
            debug!("Fetching quote for {} from {}", holding.symbol, provider.name());
            match provider.get_quote(&holding.symbol).await {
                Ok(quote) if quote.price.is_finite() && quote.price >= 0.0 => {
                    return Ok((quote, provider.name().to_string()));
                }
                Ok(quote) => {
                    warn!(
                        "{} returned an invalid price for {}: {}",
                        provider.name(),
                        holding.symbol,
                        quote.price
                    );
                    last_error = Some(CoreError::Api {
                        provider: provider.name().to_string(),
                        message: format!(
                            "Invalid price returned for {}: {} (must be finite and non-negative)",
                            holding.symbol, quote.price
                        ),
                    });
                }
                Err(e) => {
                    warn!("{} failed for {}: {e}", provider.name(), holding.symbol);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::NoProvider(holding.asset_type.to_string())))
    }

    /// Fetch rates for the table's base currency and merge them in.
    /// Returns how many rates were written.
    pub async fn refresh_exchange_rates(&self, rates: &mut ExchangeRates) -> Result<usize, CoreError> {
        let provider = self
            .registry
            .rate_provider()
            .ok_or_else(|| CoreError::NoProvider("exchange rates".to_string()))?;

        let fetched: HashMap<String, f64> = provider.get_rates(&rates.base).await?;
        let base = rates.base.clone();
        Ok(self.currency_service.apply_fetched_rates(rates, &base, &fetched))
    }
}
