use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::warn;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::currency::CurrencyCode;
use crate::models::holding::Holding;
use crate::models::settings::Settings;
use crate::models::snapshot::{DataSnapshot, ExportDocument, SCHEMA_VERSION};
use crate::models::transaction::{Transaction, TransactionType};
use crate::services::ledger_service::LedgerService;

/// Relative tolerance when comparing a holding's stored quantity with the
/// quantity its transactions add up to.
const QUANTITY_TOLERANCE: f64 = 1e-6;

/// JSON import/export and seed bundling.
///
/// Import is checked in three stages before anything is written: the
/// schema version, then structure and types, then semantics (numbers,
/// references, ids, currencies, transaction history). Any violation rejects
/// the whole document.
pub struct TransferService {
    ledger: LedgerService,
}

impl TransferService {
    pub fn new() -> Self {
        Self {
            ledger: LedgerService::new(),
        }
    }

    /// Serialize a snapshot as a pretty-printed export document.
    /// Insight records and settings are not exported.
    pub fn export(&self, snapshot: &DataSnapshot, created_at: DateTime<Utc>) -> Result<String, CoreError> {
        let document = ExportDocument {
            schema_version: SCHEMA_VERSION,
            created_at,
            holdings: snapshot.holdings.clone(),
            categories: snapshot.categories.clone(),
            price_points: snapshot.price_points.clone(),
            transactions: snapshot.transactions.clone(),
            alerts: snapshot.alerts.clone(),
        };
        serde_json::to_string_pretty(&document).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Parse and validate an export document and turn it into the snapshot
    /// that should replace the stored data.
    ///
    /// `settings` are carried over unchanged; previous insight records are
    /// dropped since they describe data that no longer exists.
    pub fn prepare_import(
        &self,
        json: &str,
        settings: Settings,
        now: DateTime<Utc>,
    ) -> Result<DataSnapshot, CoreError> {
        let document = parse_document(json).inspect_err(|e| warn!("Rejected import: {e}"))?;
        let document = self
            .validate(document, now)
            .inspect_err(|e| warn!("Rejected import: {e}"))?;

        Ok(DataSnapshot {
            holdings: document.holdings,
            categories: document.categories,
            transactions: document.transactions,
            price_points: document.price_points,
            alerts: document.alerts,
            insights: Vec::new(),
            settings,
        })
    }

    /// Merge separately authored sample arrays (holdings, categories, price
    /// points) into one validated document tagged with the current schema
    /// version and `created_at`.
    pub fn bundle_seed(
        &self,
        holdings_json: &str,
        categories_json: &str,
        prices_json: &str,
        created_at: DateTime<Utc>,
    ) -> Result<ExportDocument, CoreError> {
        let document = ExportDocument {
            schema_version: SCHEMA_VERSION,
            created_at,
            holdings: parse_array(holdings_json, "holdings")?,
            categories: parse_array(categories_json, "categories")?,
            price_points: parse_array(prices_json, "price points")?,
            transactions: Vec::new(),
            alerts: Vec::new(),
        };
        self.validate(document, created_at)
    }

    /// Semantic checks. Returns the document with uppercased codes and
    /// synthesized opening transactions for holdings that have none.
    fn validate(&self, mut document: ExportDocument, now: DateTime<Utc>) -> Result<ExportDocument, CoreError> {
        let mut problems = Vec::new();

        // ── Categories ──────────────────────────────────────────────
        let category_ids = unique_ids(document.categories.iter().map(|c| c.id), "category", &mut problems);
        let mut names = HashSet::new();
        for category in &document.categories {
            let name = category.name.trim().to_lowercase();
            if name.is_empty() {
                problems.push(format!("category {} has an empty name", category.id));
            } else if !names.insert(name) {
                problems.push(format!("duplicate category name '{}'", category.name));
            }
            match category.parent_id {
                Some(parent) if parent == category.id => {
                    problems.push(format!("category {} is its own parent", category.id))
                }
                Some(parent) if !category_ids.contains(&parent) => problems.push(format!(
                    "category {} references unknown parent {parent}",
                    category.id
                )),
                _ => {}
            }
        }

        // ── Holdings ────────────────────────────────────────────────
        let holding_ids = unique_ids(document.holdings.iter().map(|h| h.id), "holding", &mut problems);
        for holding in &mut document.holdings {
            holding.symbol = holding.symbol.trim().to_uppercase();
            if holding.symbol.is_empty() {
                problems.push(format!("holding {} has an empty symbol", holding.id));
            }
            check_amount(holding.quantity, "quantity", holding.id, &mut problems);
            check_amount(holding.cost_basis, "cost_basis", holding.id, &mut problems);
            normalize_currency(&mut holding.currency, holding.id, &mut problems);
            if let Some(category_id) = holding.category_id {
                if !category_ids.contains(&category_id) {
                    problems.push(format!(
                        "holding {} references unknown category {category_id}",
                        holding.id
                    ));
                }
            }
        }

        // ── Price points ────────────────────────────────────────────
        unique_ids(document.price_points.iter().map(|p| p.id), "price point", &mut problems);
        for point in &mut document.price_points {
            if !holding_ids.contains(&point.holding_id) {
                problems.push(format!(
                    "price point {} references unknown holding {}",
                    point.id, point.holding_id
                ));
            }
            check_amount(point.price, "price", point.id, &mut problems);
            normalize_currency(&mut point.currency, point.id, &mut problems);
        }

        // ── Alerts ──────────────────────────────────────────────────
        unique_ids(document.alerts.iter().map(|a| a.id), "alert", &mut problems);
        for alert in &document.alerts {
            if !holding_ids.contains(&alert.holding_id) {
                problems.push(format!(
                    "alert {} references unknown holding {}",
                    alert.id, alert.holding_id
                ));
            }
            check_amount(alert.condition.threshold(), "threshold", alert.id, &mut problems);
        }

        // ── Transactions ────────────────────────────────────────────
        unique_ids(document.transactions.iter().map(|t| t.id), "transaction", &mut problems);
        for transaction in &document.transactions {
            if !holding_ids.contains(&transaction.holding_id) {
                problems.push(format!(
                    "transaction {} references unknown holding {}",
                    transaction.id, transaction.holding_id
                ));
            }
            if let Err(e) = self.ledger.validate_transaction(transaction, now) {
                problems.push(format!("transaction {}: {e}", transaction.id));
            }
        }

        if !problems.is_empty() {
            return Err(CoreError::Validation(problems.join("; ")));
        }

        self.reconcile_positions(&mut document)?;
        Ok(document)
    }

    /// Holdings with transactions must agree with them; holdings without any
    /// get an opening transaction so the quantity stays derived.
    fn reconcile_positions(&self, document: &mut ExportDocument) -> Result<(), CoreError> {
        let mut by_holding: HashMap<Uuid, Vec<&Transaction>> = HashMap::new();
        for transaction in &document.transactions {
            by_holding.entry(transaction.holding_id).or_default().push(transaction);
        }

        let mut problems = Vec::new();
        let mut openings = Vec::new();
        for holding in &mut document.holdings {
            match by_holding.get(&holding.id) {
                Some(transactions) => match self.ledger.position(transactions.iter().copied()) {
                    Ok(position) if quantities_agree(position.quantity, holding.quantity) => {
                        holding.quantity = position.quantity;
                        holding.cost_basis = position.cost_basis;
                    }
                    Ok(position) => problems.push(format!(
                        "holding {} has quantity {} but its transactions add up to {}",
                        holding.id, holding.quantity, position.quantity
                    )),
                    Err(e) => problems.push(format!("holding {}: {e}", holding.id)),
                },
                None if holding.quantity > 0.0 => openings.push(opening_for(holding)),
                None if holding.cost_basis > 0.0 => problems.push(format!(
                    "holding {} has cost basis {} but no quantity or transactions",
                    holding.id, holding.cost_basis
                )),
                None => {}
            }
        }

        if !problems.is_empty() {
            return Err(CoreError::Validation(problems.join("; ")));
        }
        document.transactions.extend(openings);
        document.transactions.sort_by_key(|t| t.occurred_at);
        Ok(())
    }
}

impl Default for TransferService {
    fn default() -> Self {
        Self::new()
    }
}

/// Stage one and two: schema version, then the typed shape.
fn parse_document(json: &str) -> Result<ExportDocument, CoreError> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| CoreError::Validation(format!("Import is not valid JSON: {e}")))?;

    let version = value
        .get("schema_version")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| CoreError::Validation("Import has no numeric schema_version".into()))?;
    if version != u64::from(SCHEMA_VERSION) {
        return Err(CoreError::UnsupportedVersion(
            u32::try_from(version).unwrap_or(u32::MAX),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| CoreError::Validation(format!("Import does not match the export format: {e}")))
}

fn parse_array<T: DeserializeOwned>(json: &str, what: &str) -> Result<Vec<T>, CoreError> {
    serde_json::from_str(json).map_err(|e| CoreError::Validation(format!("Invalid {what} array: {e}")))
}

fn unique_ids(ids: impl Iterator<Item = Uuid>, what: &str, problems: &mut Vec<String>) -> HashSet<Uuid> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            problems.push(format!("duplicate {what} id {id}"));
        }
    }
    seen
}

fn check_amount(value: f64, field: &str, id: Uuid, problems: &mut Vec<String>) {
    if !value.is_finite() || value < 0.0 {
        problems.push(format!("{field} of {id} must be a non-negative number, got {value}"));
    }
}

fn normalize_currency(currency: &mut String, id: Uuid, problems: &mut Vec<String>) {
    match CurrencyCode::parse(currency) {
        Ok(code) => *currency = code.to_string(),
        Err(e) => problems.push(format!("{id}: {e}")),
    }
}

fn quantities_agree(derived: f64, stored: f64) -> bool {
    (derived - stored).abs() <= QUANTITY_TOLERANCE * stored.abs().max(1.0)
}

fn opening_for(holding: &Holding) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        holding_id: holding.id,
        transaction_type: TransactionType::Opening,
        quantity: holding.quantity,
        price: holding.cost_basis / holding.quantity,
        occurred_at: holding.created_at,
        note: None,
    }
}

