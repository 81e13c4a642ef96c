use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A non-fatal condition met while valuing the portfolio.
/// The affected holding is counted as zero and the issue is reported here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValuationIssue {
    /// No price point exists for the holding (at the sampled time)
    MissingPrice { holding_id: Uuid },
    /// The price currency cannot be converted to the display currency
    MissingExchangeRate {
        holding_id: Uuid,
        from: String,
        to: String,
    },
    /// A numeric input was NaN, infinite or negative
    InvalidNumber { holding_id: Uuid, field: String },
}

impl ValuationIssue {
    pub fn holding_id(&self) -> Uuid {
        match self {
            ValuationIssue::MissingPrice { holding_id }
            | ValuationIssue::MissingExchangeRate { holding_id, .. }
            | ValuationIssue::InvalidNumber { holding_id, .. } => *holding_id,
        }
    }
}

/// Valuation of a single holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingValuation {
    pub holding_id: Uuid,
    pub symbol: String,
    pub name: String,
    pub category_id: Option<Uuid>,
    pub quantity: f64,

    /// Latest unit price in its own currency, if one is known
    pub price: Option<f64>,
    pub price_currency: Option<String>,
    pub priced_at: Option<DateTime<Utc>>,

    /// quantity × price, in the display currency
    pub value: f64,

    /// Cost basis converted to the display currency (0.0 when not convertible)
    pub cost_basis: f64,

    /// value − cost_basis
    pub unrealized_gain: f64,

    /// Fraction of the portfolio total (0.0..=1.0)
    pub share: f64,
}

/// One slice of the allocation breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSlice {
    /// `None` for the "Uncategorized" slice
    pub category_id: Option<Uuid>,
    pub name: String,
    pub value: f64,
    /// value ÷ portfolio total; 0.0 when the total is zero
    pub share: f64,
    /// Every active holding in this bucket, including zero-quantity ones
    pub holding_ids: Vec<Uuid>,
}

/// Portfolio valuation in a display currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub currency: String,
    pub total_value: f64,
    pub total_cost_basis: f64,
    pub holdings: Vec<HoldingValuation>,
    pub allocation: Vec<AllocationSlice>,
    pub issues: Vec<ValuationIssue>,
}

impl PortfolioValuation {
    pub fn holding(&self, holding_id: Uuid) -> Option<&HoldingValuation> {
        self.holdings.iter().find(|h| h.holding_id == holding_id)
    }

    pub fn slice(&self, category_id: Option<Uuid>) -> Option<&AllocationSlice> {
        self.allocation.iter().find(|s| s.category_id == category_id)
    }

    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Portfolio value at one sampled timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Value-over-time series, ascending by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueSeries {
    pub currency: String,
    pub points: Vec<ValuePoint>,
    pub issues: Vec<ValuationIssue>,
}
