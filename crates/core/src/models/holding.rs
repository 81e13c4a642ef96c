use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of a tracked position.
/// Determines which market-data provider can quote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    /// Stocks / ETFs (AAPL, VWCE, etc.): Yahoo Finance, Alpha Vantage
    Stock,
    /// Cryptocurrencies (BTC, ETH, etc.): CoinCap
    Crypto,
    /// Cash balances; the symbol is the currency code and the unit price is 1.0
    Cash,
    /// Anything without a market quote (property, collectibles, ...)
    Other,
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Stock => write!(f, "Stock"),
            AssetType::Crypto => write!(f, "Crypto"),
            AssetType::Cash => write!(f, "Cash"),
            AssetType::Other => write!(f, "Other"),
        }
    }
}

/// A free-text note attached to a holding. Notes are only ever appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingNote {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A tracked asset position.
///
/// `quantity` and `cost_basis` are derived from the holding's transactions
/// and are recomputed by the repository on every transaction write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub id: Uuid,

    /// Ticker symbol, uppercased (e.g., "AAPL", "BTC", "EUR")
    pub symbol: String,

    /// Human-readable name (e.g., "Apple Inc.", "Bitcoin", "Emergency fund")
    pub name: String,

    pub asset_type: AssetType,

    /// Net units held
    pub quantity: f64,

    /// Total cost of the units held, in `currency` (average-cost method)
    pub cost_basis: f64,

    /// Currency the cost basis is expressed in
    pub currency: String,

    #[serde(default)]
    pub category_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Soft-delete flag: deleted holdings keep their history but are
    /// excluded from valuation and default listings.
    #[serde(default)]
    pub deleted: bool,

    #[serde(default)]
    pub notes: Vec<HoldingNote>,
}

impl Holding {
    /// Whether the holding takes part in valuation and default listings.
    pub fn is_active(&self) -> bool {
        !self.deleted
    }

    /// Average cost per unit, or 0.0 when nothing is held.
    pub fn average_cost(&self) -> f64 {
        if self.quantity > f64::EPSILON {
            self.cost_basis / self.quantity
        } else {
            0.0
        }
    }
}

/// Input for creating a holding.
///
/// A non-zero `quantity` is recorded as an opening transaction priced at
/// `cost_basis / quantity`, so the quantity stays derived from transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHolding {
    pub symbol: String,
    pub name: String,
    pub asset_type: AssetType,
    pub quantity: f64,
    pub cost_basis: f64,
    pub currency: String,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

impl NewHolding {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, asset_type: AssetType) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            asset_type,
            quantity: 0.0,
            cost_basis: 0.0,
            currency: "USD".to_string(),
            category_id: None,
        }
    }

    /// Opening position: `quantity` units bought for `cost_basis` in total.
    pub fn with_position(mut self, quantity: f64, cost_basis: f64) -> Self {
        self.quantity = quantity;
        self.cost_basis = cost_basis;
        self
    }

    pub fn in_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn in_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Convenience constructors for common asset types
    pub fn stock(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(symbol, name, AssetType::Stock)
    }

    pub fn crypto(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(symbol, name, AssetType::Crypto)
    }

    pub fn cash(currency: impl Into<String>, name: impl Into<String>) -> Self {
        let currency = currency.into();
        Self::new(currency.clone(), name, AssetType::Cash).in_currency(currency)
    }
}

/// Partial update of a holding's descriptive fields.
/// Quantity and cost basis are not editable here: record a transaction instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HoldingUpdate {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub asset_type: Option<AssetType>,
    pub currency: Option<String>,
    /// `Some(None)` clears the category.
    pub category_id: Option<Option<Uuid>>,
}
