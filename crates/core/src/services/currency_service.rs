use crate::models::price::ExchangeRates;

/// Converts amounts between currencies using an exchange-rate table.
///
/// Rates are quoted against a single base currency (USD by default), so any
/// pair converts in two steps: amount → base → target.
pub struct CurrencyService;

impl CurrencyService {
    pub fn new() -> Self {
        Self
    }

    /// Convert `amount` from `from_currency` to `to_currency`.
    /// E.g., convert(100.0, "EUR", "USD") with EUR = 1.08 → 108.0
    ///
    /// Returns `None` if the pair cannot be converted with the given table.
    pub fn convert(
        &self,
        rates: &ExchangeRates,
        amount: f64,
        from_currency: &str,
        to_currency: &str,
    ) -> Option<f64> {
        rates
            .rate(from_currency, to_currency)
            .map(|rate| amount * rate)
    }

    /// Merge freshly fetched rates into a table.
    ///
    /// `fetched` maps currency → units of that currency per one unit of
    /// `fetched_base` (the shape rate APIs return). Non-finite and
    /// non-positive values are skipped. Returns the number of rates updated.
    pub fn apply_fetched_rates(
        &self,
        rates: &mut ExchangeRates,
        fetched_base: &str,
        fetched: &std::collections::HashMap<String, f64>,
    ) -> usize {
        let fetched_base = fetched_base.to_uppercase();
        // Base units per one unit of the fetched base.
        let base_per_fetched = if fetched_base == rates.base {
            1.0
        } else {
            match fetched.get(&rates.base) {
                Some(r) if r.is_finite() && *r > 0.0 => *r,
                _ => match rates.rate(&fetched_base, &rates.base) {
                    Some(r) => r,
                    None => return 0,
                },
            }
        };

        let mut updated = 0;
        for (code, per_fetched) in fetched {
            let code = code.to_uppercase();
            if code == rates.base || !per_fetched.is_finite() || *per_fetched <= 0.0 {
                continue;
            }
            rates.set_rate(&code, base_per_fetched / per_fetched);
            updated += 1;
        }
        if fetched_base != rates.base {
            rates.set_rate(&fetched_base, base_per_fetched);
            updated += 1;
        }
        updated
    }
}

impl Default for CurrencyService {
    fn default() -> Self {
        Self::new()
    }
}
