use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of a holding transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// Initial position recorded when a holding is created with a quantity
    Opening,
    Buy,
    Sell,
    /// Units moved in from elsewhere (gift, wallet transfer, stock dividend)
    TransferIn,
    /// Units moved out without a sale
    TransferOut,
}

impl TransactionType {
    /// +1 for types that add units, -1 for types that remove them.
    pub fn sign(&self) -> f64 {
        match self {
            TransactionType::Opening | TransactionType::Buy | TransactionType::TransferIn => 1.0,
            TransactionType::Sell | TransactionType::TransferOut => -1.0,
        }
    }

    pub fn adds_units(&self) -> bool {
        self.sign() > 0.0
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Opening => write!(f, "Opening"),
            TransactionType::Buy => write!(f, "Buy"),
            TransactionType::Sell => write!(f, "Sell"),
            TransactionType::TransferIn => write!(f, "TransferIn"),
            TransactionType::TransferOut => write!(f, "TransferOut"),
        }
    }
}

/// A single change to a holding's position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub holding_id: Uuid,
    pub transaction_type: TransactionType,
    /// Units moved (always positive; direction comes from the type)
    pub quantity: f64,
    /// Price per unit in the holding's currency
    pub price: f64,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Transaction {
    /// Signed change in units this transaction applies.
    pub fn quantity_delta(&self) -> f64 {
        self.transaction_type.sign() * self.quantity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub holding_id: Uuid,
    pub transaction_type: TransactionType,
    pub quantity: f64,
    pub price: f64,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

impl NewTransaction {
    pub fn new(
        holding_id: Uuid,
        transaction_type: TransactionType,
        quantity: f64,
        price: f64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            holding_id,
            transaction_type,
            quantity,
            price,
            occurred_at,
            note: None,
        }
    }

    pub fn buy(holding_id: Uuid, quantity: f64, price: f64, occurred_at: DateTime<Utc>) -> Self {
        Self::new(holding_id, TransactionType::Buy, quantity, price, occurred_at)
    }

    pub fn sell(holding_id: Uuid, quantity: f64, price: f64, occurred_at: DateTime<Utc>) -> Self {
        Self::new(holding_id, TransactionType::Sell, quantity, price, occurred_at)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub(crate) fn into_transaction(self, id: Uuid) -> Transaction {
        Transaction {
            id,
            holding_id: self.holding_id,
            transaction_type: self.transaction_type,
            quantity: self.quantity,
            price: self.price,
            occurred_at: self.occurred_at,
            note: self.note,
        }
    }
}
