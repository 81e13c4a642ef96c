use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How much attention an insight deserves. Ordered from least to most important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Notice,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "Info"),
            Severity::Notice => write!(f, "Notice"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

/// What an insight is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InsightKind {
    Concentration,
    CategoryConcentration,
    PriceDrop,
    PriceRise,
    StalePrice,
    MissingPrice,
    Uncategorized,
}

/// A single observation about the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightItem {
    #[serde(default)]
    pub holding_id: Option<Uuid>,
    #[serde(default)]
    pub holding_name: Option<String>,
    pub kind: InsightKind,
    pub severity: Severity,
    pub message: String,
    /// The number behind the message (share or change in percent, age in days)
    #[serde(default)]
    pub metric: Option<f64>,
}

/// A generated batch of insights. Immutable: regenerating produces a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Currency the monetary figures in messages are expressed in
    pub currency: String,
    /// Ordered by descending severity, then holding name
    pub items: Vec<InsightItem>,
}

impl InsightRecord {
    pub fn highest_severity(&self) -> Option<Severity> {
        self.items.iter().map(|i| i.severity).max()
    }

    pub fn items_for(&self, holding_id: Uuid) -> impl Iterator<Item = &InsightItem> {
        self.items
            .iter()
            .filter(move |i| i.holding_id == Some(holding_id))
    }
}
