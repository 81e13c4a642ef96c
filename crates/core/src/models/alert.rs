use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Threshold condition of a price alert, in the currency of the observed price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AlertCondition {
    /// Fires when the price is at or above the value
    PriceAbove(f64),
    /// Fires when the price is at or below the value
    PriceBelow(f64),
}

impl AlertCondition {
    pub fn threshold(&self) -> f64 {
        match self {
            AlertCondition::PriceAbove(v) | AlertCondition::PriceBelow(v) => *v,
        }
    }

    pub fn is_met_by(&self, price: f64) -> bool {
        match self {
            AlertCondition::PriceAbove(v) => price >= *v,
            AlertCondition::PriceBelow(v) => price <= *v,
        }
    }
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertCondition::PriceAbove(v) => write!(f, "price >= {v}"),
            AlertCondition::PriceBelow(v) => write!(f, "price <= {v}"),
        }
    }
}

/// A user-defined price alert on one holding. Alerts are one-shot:
/// triggering deactivates them until re-armed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: Uuid,
    pub holding_id: Uuid,
    pub condition: AlertCondition,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_triggered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPriceAlert {
    pub holding_id: Uuid,
    pub condition: AlertCondition,
}

impl NewPriceAlert {
    pub fn above(holding_id: Uuid, price: f64) -> Self {
        Self {
            holding_id,
            condition: AlertCondition::PriceAbove(price),
        }
    }

    pub fn below(holding_id: Uuid, price: f64) -> Self {
        Self {
            holding_id,
            condition: AlertCondition::PriceBelow(price),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceAlertUpdate {
    pub condition: Option<AlertCondition>,
    pub active: Option<bool>,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

/// An alert whose condition was met by a newly observed price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredAlert {
    pub alert: PriceAlert,
    pub price: f64,
    pub currency: String,
    pub observed_at: DateTime<Utc>,
}
