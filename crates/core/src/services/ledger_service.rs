use chrono::{DateTime, Duration, Utc};

use crate::errors::CoreError;
use crate::models::transaction::Transaction;

/// Tolerance below which a running quantity counts as zero.
const QUANTITY_EPSILON: f64 = 1e-9;

/// A holding's position derived from its transactions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub quantity: f64,
    /// Total cost of the units held (average-cost method)
    pub cost_basis: f64,
}

/// Validates transactions and derives positions from them.
///
/// Pure business logic, no I/O. The repository calls it on every
/// transaction write to keep `Holding::quantity` derived.
pub struct LedgerService;

impl LedgerService {
    pub fn new() -> Self {
        Self
    }

    /// Check a single transaction on its own.
    ///
    /// Rules:
    /// - Quantity must be positive and finite
    /// - Price must be finite and non-negative
    /// - The date may not be in the future (+1 day tolerance for time zones)
    pub fn validate_transaction(
        &self,
        transaction: &Transaction,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        if !transaction.quantity.is_finite() || transaction.quantity <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Transaction quantity must be positive, got {}",
                transaction.quantity
            )));
        }
        if !transaction.price.is_finite() || transaction.price < 0.0 {
            return Err(CoreError::Validation(format!(
                "Transaction price must be a non-negative number, got {}",
                transaction.price
            )));
        }
        if transaction.occurred_at > now + Duration::days(1) {
            return Err(CoreError::Validation(format!(
                "Transaction date {} is in the future",
                transaction.occurred_at
            )));
        }
        Ok(())
    }

    /// Replay transactions in time order and return the resulting position.
    ///
    /// Fails if the running quantity would drop below zero at any point,
    /// e.g. a sell recorded before the buy that funds it.
    pub fn position<'a, I>(&self, transactions: I) -> Result<Position, CoreError>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut ordered: Vec<&Transaction> = transactions.into_iter().collect();
        ordered.sort_by_key(|t| t.occurred_at);

        let mut position = Position::default();
        for transaction in ordered {
            if transaction.transaction_type.adds_units() {
                position.cost_basis += transaction.quantity * transaction.price;
                position.quantity += transaction.quantity;
                continue;
            }

            if position.quantity + QUANTITY_EPSILON < transaction.quantity {
                return Err(CoreError::Validation(format!(
                    "{} of {} units on {} exceeds the {:.8} units held at that time",
                    transaction.transaction_type,
                    transaction.quantity,
                    transaction.occurred_at,
                    position.quantity,
                )));
            }
            let average = if position.quantity > QUANTITY_EPSILON {
                position.cost_basis / position.quantity
            } else {
                0.0
            };
            position.quantity -= transaction.quantity;
            position.cost_basis -= average * transaction.quantity;

            if position.quantity < QUANTITY_EPSILON {
                position = Position::default();
            }
        }

        Ok(position)
    }
}

impl Default for LedgerService {
    fn default() -> Self {
        Self::new()
    }
}
