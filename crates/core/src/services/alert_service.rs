use crate::models::alert::{PriceAlert, TriggeredAlert};
use crate::models::price::PricePoint;

/// Evaluates price alerts against newly observed prices.
///
/// Pure: deciding what to do with a triggered alert (deactivate it,
/// notify someone) is up to the caller.
pub struct AlertService;

impl AlertService {
    pub fn new() -> Self {
        Self
    }

    /// Return every active alert on `point.holding_id` whose condition the
    /// observed price meets. Non-finite prices never trigger anything.
    pub fn evaluate(&self, alerts: &[PriceAlert], point: &PricePoint) -> Vec<TriggeredAlert> {
        if !point.price.is_finite() {
            return Vec::new();
        }

        alerts
            .iter()
            .filter(|a| a.active && a.holding_id == point.holding_id)
            .filter(|a| a.condition.is_met_by(point.price))
            .map(|a| TriggeredAlert {
                alert: a.clone(),
                price: point.price,
                currency: point.currency.clone(),
                observed_at: point.recorded_at,
            })
            .collect()
    }
}

impl Default for AlertService {
    fn default() -> Self {
        Self::new()
    }
}
