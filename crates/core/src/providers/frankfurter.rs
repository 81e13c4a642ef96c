use std::collections::HashMap;
#[cfg(not(target_arch = "wasm32"))]
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::errors::CoreError;
use super::traits::ExchangeRateProvider;

const BASE_URL: &str = "https://api.frankfurter.dev/v1";

/// Frankfurter API provider for fiat exchange rates.
///
/// - **Free**: No API key, no rate limits, open-source.
/// - **Source**: European Central Bank (ECB) reference rates.
/// - **Coverage**: ~30 currencies (EUR, USD, PLN, GBP, JPY, etc.)
pub struct FrankfurterProvider {
    client: Client,
}

impl FrankfurterProvider {
    pub fn new() -> Self {
        let builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(Duration::from_secs(30));
        Self {
            client: builder.build().unwrap_or_else(|_| Client::new()),
        }
    }
}

impl Default for FrankfurterProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct LatestResponse {
    base: String,
    rates: HashMap<String, f64>,
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl ExchangeRateProvider for FrankfurterProvider {
    fn name(&self) -> &str {
        "Frankfurter"
    }

    async fn get_rates(&self, base: &str) -> Result<HashMap<String, f64>, CoreError> {
        let base = base.to_uppercase();
        let url = format!("{BASE_URL}/latest?base={base}");

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(CoreError::Api {
                provider: "Frankfurter".into(),
                message: format!("HTTP {} for base {base}", resp.status()),
            });
        }

        let body: LatestResponse = resp.json().await.map_err(|e| CoreError::Api {
            provider: "Frankfurter".into(),
            message: format!("Failed to parse rates for base {base}: {e}"),
        })?;

        if body.base.to_uppercase() != base {
            return Err(CoreError::Api {
                provider: "Frankfurter".into(),
                message: format!("Asked for base {base}, got {}", body.base),
            });
        }
        Ok(body.rates)
    }
}
