use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::alert::{NewPriceAlert, PriceAlert, PriceAlertUpdate};
use crate::models::category::{Category, CategoryUpdate, NewCategory};
use crate::models::currency::CurrencyCode;
use crate::models::holding::{Holding, HoldingNote, HoldingUpdate, NewHolding};
use crate::models::insight::InsightRecord;
use crate::models::price::{NewPricePoint, PricePoint};
use crate::models::settings::Settings;
use crate::models::snapshot::DataSnapshot;
use crate::models::transaction::{NewTransaction, Transaction, TransactionType};
use crate::services::ledger_service::LedgerService;
use crate::storage::manager::StorageManager;
use super::traits::Repository;

/// In-process repository: the local database of the app.
///
/// All records live in one `DataSnapshot` behind a lock. Each operation
/// validates first and mutates second, so a rejected write leaves the
/// store untouched. The whole store can be saved to / loaded from an
/// encrypted snapshot (see `StorageManager`).
pub struct LocalRepository {
    db: RwLock<DataSnapshot>,
    ledger: LedgerService,
    read_only: AtomicBool,
}

impl std::fmt::Debug for LocalRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let db = self.read();
        f.debug_struct("LocalRepository")
            .field("holdings", &db.holdings.len())
            .field("categories", &db.categories.len())
            .field("transactions", &db.transactions.len())
            .field("price_points", &db.price_points.len())
            .field("alerts", &db.alerts.len())
            .field("insights", &db.insights.len())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

impl LocalRepository {
    /// Create an empty store with default settings.
    pub fn new() -> Self {
        Self::from_snapshot(DataSnapshot::default())
    }

    pub fn from_snapshot(snapshot: DataSnapshot) -> Self {
        Self {
            db: RwLock::new(snapshot),
            ledger: LedgerService::new(),
            read_only: AtomicBool::new(false),
        }
    }

    /// Load a store from encrypted snapshot bytes (password required).
    pub fn load_from_bytes(encrypted: &[u8], password: &str) -> Result<Self, CoreError> {
        let snapshot = StorageManager::load_from_bytes(encrypted, password)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Encrypt the whole store into portable bytes.
    pub fn save_to_bytes(&self, password: &str) -> Result<Vec<u8>, CoreError> {
        StorageManager::save_to_bytes(&self.read(), password)
    }

    /// Load from an encrypted file on disk (native only, not WASM).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_file(path: &str, password: &str) -> Result<Self, CoreError> {
        let snapshot = StorageManager::load_from_file(path, password)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Save to an encrypted file on disk (native only, not WASM).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_file(&self, path: &str, password: &str) -> Result<(), CoreError> {
        StorageManager::save_to_file(&self.read(), path, password)
    }

    /// Reject every write with `CoreError::Storage` while set
    /// (e.g. the backing store is full or opened from a read-only medium).
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    // ── Internal ────────────────────────────────────────────────────

    fn read(&self) -> RwLockReadGuard<'_, DataSnapshot> {
        self.db.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, DataSnapshot>, CoreError> {
        if self.is_read_only() {
            return Err(CoreError::Storage("local repository is read-only".into()));
        }
        Ok(self.db.write().unwrap_or_else(|e| e.into_inner()))
    }

    /// Recompute a holding's derived position from `transactions`.
    fn apply_position(
        &self,
        holding: &mut Holding,
        transactions: &[&Transaction],
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let position = self.ledger.position(transactions.iter().copied())?;
        holding.quantity = position.quantity;
        holding.cost_basis = position.cost_basis;
        holding.updated_at = now;
        Ok(())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

// ── Validation helpers ──────────────────────────────────────────────

fn require_symbol(symbol: &str) -> Result<String, CoreError> {
    let symbol = symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(CoreError::Validation("Holding symbol must not be empty".into()));
    }
    Ok(symbol)
}

fn require_name(name: &str, what: &str) -> Result<String, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation(format!("{what} name must not be empty")));
    }
    Ok(name.to_string())
}

fn require_amount(value: f64, field: &str) -> Result<f64, CoreError> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoreError::Validation(format!(
            "{field} must be a non-negative number, got {value}"
        )));
    }
    Ok(value)
}

fn require_category(db: &DataSnapshot, category_id: Option<Uuid>) -> Result<(), CoreError> {
    match category_id {
        Some(id) if !db.categories.iter().any(|c| c.id == id) => {
            Err(CoreError::not_found("Category", id))
        }
        _ => Ok(()),
    }
}

fn holding_mut(db: &mut DataSnapshot, id: Uuid) -> Result<&mut Holding, CoreError> {
    db.holdings
        .iter_mut()
        .find(|h| h.id == id)
        .ok_or_else(|| CoreError::not_found("Holding", id))
}

/// Insert keeping `transactions` sorted by time; equal timestamps keep insertion order.
fn insert_sorted(transactions: &mut Vec<Transaction>, transaction: Transaction) {
    let pos = transactions.partition_point(|t| t.occurred_at <= transaction.occurred_at);
    transactions.insert(pos, transaction);
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Repository for LocalRepository {
    // ── Holdings ────────────────────────────────────────────────────

    async fn list_holdings(&self, include_deleted: bool) -> Result<Vec<Holding>, CoreError> {
        Ok(self
            .read()
            .holdings
            .iter()
            .filter(|h| include_deleted || h.is_active())
            .cloned()
            .collect())
    }

    async fn get_holding(&self, id: Uuid) -> Result<Holding, CoreError> {
        self.read()
            .holdings
            .iter()
            .find(|h| h.id == id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Holding", id))
    }

    async fn create_holding(&self, new_holding: NewHolding) -> Result<Holding, CoreError> {
        let symbol = require_symbol(&new_holding.symbol)?;
        let name = if new_holding.name.trim().is_empty() {
            symbol.clone()
        } else {
            new_holding.name.trim().to_string()
        };
        let currency = CurrencyCode::parse(&new_holding.currency)?;
        let quantity = require_amount(new_holding.quantity, "Quantity")?;
        let cost_basis = require_amount(new_holding.cost_basis, "Cost basis")?;
        if quantity == 0.0 && cost_basis > 0.0 {
            return Err(CoreError::Validation(
                "A cost basis requires a non-zero opening quantity".into(),
            ));
        }

        let mut db = self.write()?;
        require_category(&db, new_holding.category_id)?;

        let now = Utc::now();
        let mut holding = Holding {
            id: Uuid::new_v4(),
            symbol,
            name,
            asset_type: new_holding.asset_type,
            quantity: 0.0,
            cost_basis: 0.0,
            currency: currency.to_string(),
            category_id: new_holding.category_id,
            created_at: now,
            updated_at: now,
            deleted: false,
            notes: Vec::new(),
        };

        if quantity > 0.0 {
            let opening = Transaction {
                id: Uuid::new_v4(),
                holding_id: holding.id,
                transaction_type: TransactionType::Opening,
                quantity,
                price: cost_basis / quantity,
                occurred_at: now,
                note: None,
            };
            self.apply_position(&mut holding, &[&opening], now)?;
            insert_sorted(&mut db.transactions, opening);
        }

        debug!("Created holding {} ({})", holding.symbol, holding.id);
        db.holdings.push(holding.clone());
        Ok(holding)
    }

    async fn update_holding(&self, id: Uuid, update: HoldingUpdate) -> Result<Holding, CoreError> {
        let symbol = update.symbol.as_deref().map(require_symbol).transpose()?;
        let name = update
            .name
            .as_deref()
            .map(|n| require_name(n, "Holding"))
            .transpose()?;
        let currency = update
            .currency
            .as_deref()
            .map(CurrencyCode::parse)
            .transpose()?;

        let mut db = self.write()?;
        if let Some(category_id) = update.category_id {
            require_category(&db, category_id)?;
        }

        let holding = holding_mut(&mut db, id)?;
        if let Some(symbol) = symbol {
            holding.symbol = symbol;
        }
        if let Some(name) = name {
            holding.name = name;
        }
        if let Some(asset_type) = update.asset_type {
            holding.asset_type = asset_type;
        }
        if let Some(currency) = currency {
            holding.currency = currency.to_string();
        }
        if let Some(category_id) = update.category_id {
            holding.category_id = category_id;
        }
        holding.updated_at = Utc::now();
        Ok(holding.clone())
    }

    async fn delete_holding(&self, id: Uuid) -> Result<(), CoreError> {
        let mut db = self.write()?;
        let holding = holding_mut(&mut db, id)?;
        holding.deleted = true;
        holding.updated_at = Utc::now();
        Ok(())
    }

    async fn restore_holding(&self, id: Uuid) -> Result<Holding, CoreError> {
        let mut db = self.write()?;
        let holding = holding_mut(&mut db, id)?;
        holding.deleted = false;
        holding.updated_at = Utc::now();
        Ok(holding.clone())
    }

    async fn append_holding_note(&self, id: Uuid, text: String) -> Result<Holding, CoreError> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(CoreError::Validation("Note must not be empty".into()));
        }
        let mut db = self.write()?;
        let holding = holding_mut(&mut db, id)?;
        let now = Utc::now();
        holding.notes.push(HoldingNote {
            text,
            created_at: now,
        });
        holding.updated_at = now;
        Ok(holding.clone())
    }

    // ── Categories ──────────────────────────────────────────────────

    async fn list_categories(&self) -> Result<Vec<Category>, CoreError> {
        Ok(self.read().categories.clone())
    }

    async fn get_category(&self, id: Uuid) -> Result<Category, CoreError> {
        self.read()
            .categories
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Category", id))
    }

    async fn create_category(&self, new_category: NewCategory) -> Result<Category, CoreError> {
        let name = require_name(&new_category.name, "Category")?;
        let mut db = self.write()?;
        require_category(&db, new_category.parent_id)?;
        if db.categories.iter().any(|c| c.name.eq_ignore_ascii_case(&name)) {
            return Err(CoreError::Validation(format!("Category '{name}' already exists")));
        }

        let category = Category {
            id: Uuid::new_v4(),
            name,
            parent_id: new_category.parent_id,
            color: new_category.color,
            created_at: Utc::now(),
        };
        db.categories.push(category.clone());
        Ok(category)
    }

    async fn update_category(&self, id: Uuid, update: CategoryUpdate) -> Result<Category, CoreError> {
        let name = update
            .name
            .as_deref()
            .map(|n| require_name(n, "Category"))
            .transpose()?;

        let mut db = self.write()?;
        if let Some(parent_id) = update.parent_id {
            if parent_id == Some(id) {
                return Err(CoreError::Validation("A category cannot be its own parent".into()));
            }
            require_category(&db, parent_id)?;
        }
        if let Some(name) = &name {
            if db
                .categories
                .iter()
                .any(|c| c.id != id && c.name.eq_ignore_ascii_case(name))
            {
                return Err(CoreError::Validation(format!("Category '{name}' already exists")));
            }
        }

        let category = db
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| CoreError::not_found("Category", id))?;
        if let Some(name) = name {
            category.name = name;
        }
        if let Some(parent_id) = update.parent_id {
            category.parent_id = parent_id;
        }
        if let Some(color) = update.color {
            category.color = color;
        }
        Ok(category.clone())
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), CoreError> {
        let mut db = self.write()?;
        let idx = db
            .categories
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| CoreError::not_found("Category", id))?;
        db.categories.remove(idx);

        let now = Utc::now();
        for holding in db.holdings.iter_mut().filter(|h| h.category_id == Some(id)) {
            holding.category_id = None;
            holding.updated_at = now;
        }
        for child in db.categories.iter_mut().filter(|c| c.parent_id == Some(id)) {
            child.parent_id = None;
        }
        Ok(())
    }

    // ── Transactions ────────────────────────────────────────────────

    async fn list_transactions(&self, holding_id: Option<Uuid>) -> Result<Vec<Transaction>, CoreError> {
        Ok(self
            .read()
            .transactions
            .iter()
            .filter(|t| holding_id.map_or(true, |id| t.holding_id == id))
            .cloned()
            .collect())
    }

    async fn create_transaction(&self, new_transaction: NewTransaction) -> Result<Transaction, CoreError> {
        let now = Utc::now();
        let transaction = new_transaction.into_transaction(Uuid::new_v4());
        self.ledger.validate_transaction(&transaction, now)?;

        let mut guard = self.write()?;
        let db = &mut *guard;
        let holding = db
            .holdings
            .iter_mut()
            .find(|h| h.id == transaction.holding_id)
            .ok_or_else(|| CoreError::not_found("Holding", transaction.holding_id))?;
        if holding.deleted {
            return Err(CoreError::Validation(format!(
                "Holding {} is deleted; restore it before recording transactions",
                holding.symbol
            )));
        }

        let mut history: Vec<&Transaction> = db
            .transactions
            .iter()
            .filter(|t| t.holding_id == transaction.holding_id)
            .collect();
        history.push(&transaction);
        self.apply_position(holding, &history, now)?;

        debug!(
            "Recorded {} of {} for {}; quantity now {}",
            transaction.transaction_type, transaction.quantity, holding.symbol, holding.quantity
        );
        insert_sorted(&mut db.transactions, transaction.clone());
        Ok(transaction)
    }

    async fn delete_transaction(&self, id: Uuid) -> Result<(), CoreError> {
        let mut guard = self.write()?;
        let db = &mut *guard;
        let idx = db
            .transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| CoreError::not_found("Transaction", id))?;
        let holding_id = db.transactions[idx].holding_id;

        let remaining: Vec<&Transaction> = db
            .transactions
            .iter()
            .filter(|t| t.holding_id == holding_id && t.id != id)
            .collect();
        if let Some(holding) = db.holdings.iter_mut().find(|h| h.id == holding_id) {
            // Fails (and leaves everything untouched) if a later sell loses its funding.
            self.apply_position(holding, &remaining, Utc::now())?;
        }

        db.transactions.remove(idx);
        Ok(())
    }

    // ── Price points ────────────────────────────────────────────────

    async fn list_price_points(
        &self,
        holding_id: Option<Uuid>,
        limit: Option<usize>,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let db = self.read();
        let mut points: Vec<PricePoint> = db
            .price_points
            .iter()
            .filter(|p| holding_id.map_or(true, |id| p.holding_id == id))
            .cloned()
            .collect();
        // Newest first; among equal timestamps the later append comes first.
        points.reverse();
        points.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        if let Some(limit) = limit {
            points.truncate(limit);
        }
        Ok(points)
    }

    async fn latest_price_points(&self) -> Result<HashMap<Uuid, PricePoint>, CoreError> {
        let db = self.read();
        let mut latest: HashMap<Uuid, PricePoint> = HashMap::new();
        for point in &db.price_points {
            let newer = latest
                .get(&point.holding_id)
                .map_or(true, |current| point.recorded_at >= current.recorded_at);
            if newer {
                latest.insert(point.holding_id, point.clone());
            }
        }
        Ok(latest)
    }

    async fn price_at(&self, holding_id: Uuid, at: DateTime<Utc>) -> Result<Option<PricePoint>, CoreError> {
        let db = self.read();
        let mut found: Option<&PricePoint> = None;
        for point in db
            .price_points
            .iter()
            .filter(|p| p.holding_id == holding_id && p.recorded_at <= at)
        {
            if found.map_or(true, |f| point.recorded_at >= f.recorded_at) {
                found = Some(point);
            }
        }
        Ok(found.cloned())
    }

    async fn append_price_point(&self, new_point: NewPricePoint) -> Result<PricePoint, CoreError> {
        require_amount(new_point.price, "Price")?;
        let currency = CurrencyCode::parse(&new_point.currency)?;

        let mut db = self.write()?;
        if !db.holdings.iter().any(|h| h.id == new_point.holding_id) {
            return Err(CoreError::not_found("Holding", new_point.holding_id));
        }

        let mut point = new_point.into_price_point(Uuid::new_v4());
        point.currency = currency.to_string();
        db.price_points.push(point.clone());
        Ok(point)
    }

    // ── Price alerts ────────────────────────────────────────────────

    async fn list_alerts(&self, holding_id: Option<Uuid>) -> Result<Vec<PriceAlert>, CoreError> {
        Ok(self
            .read()
            .alerts
            .iter()
            .filter(|a| holding_id.map_or(true, |id| a.holding_id == id))
            .cloned()
            .collect())
    }

    async fn create_alert(&self, new_alert: NewPriceAlert) -> Result<PriceAlert, CoreError> {
        require_amount(new_alert.condition.threshold(), "Alert threshold")?;
        let mut db = self.write()?;
        if !db.holdings.iter().any(|h| h.id == new_alert.holding_id) {
            return Err(CoreError::not_found("Holding", new_alert.holding_id));
        }

        let alert = PriceAlert {
            id: Uuid::new_v4(),
            holding_id: new_alert.holding_id,
            condition: new_alert.condition,
            active: true,
            created_at: Utc::now(),
            last_triggered_at: None,
        };
        db.alerts.push(alert.clone());
        Ok(alert)
    }

    async fn update_alert(&self, id: Uuid, update: PriceAlertUpdate) -> Result<PriceAlert, CoreError> {
        if let Some(condition) = &update.condition {
            require_amount(condition.threshold(), "Alert threshold")?;
        }
        let mut db = self.write()?;
        let alert = db
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| CoreError::not_found("PriceAlert", id))?;
        if let Some(condition) = update.condition {
            alert.condition = condition;
        }
        if let Some(active) = update.active {
            alert.active = active;
        }
        if let Some(at) = update.last_triggered_at {
            alert.last_triggered_at = Some(at);
        }
        Ok(alert.clone())
    }

    async fn delete_alert(&self, id: Uuid) -> Result<(), CoreError> {
        let mut db = self.write()?;
        let idx = db
            .alerts
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| CoreError::not_found("PriceAlert", id))?;
        db.alerts.remove(idx);
        Ok(())
    }

    // ── Insights ────────────────────────────────────────────────────

    async fn list_insight_records(&self, limit: Option<usize>) -> Result<Vec<InsightRecord>, CoreError> {
        let mut records = self.read().insights.clone();
        records.reverse();
        records.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    async fn latest_insight_record(&self) -> Result<Option<InsightRecord>, CoreError> {
        Ok(self.list_insight_records(Some(1)).await?.into_iter().next())
    }

    async fn save_insight_record(&self, record: InsightRecord) -> Result<InsightRecord, CoreError> {
        let mut db = self.write()?;
        if db.insights.iter().any(|r| r.id == record.id) {
            return Err(CoreError::Validation(format!(
                "Insight record {} already exists and cannot be replaced",
                record.id
            )));
        }
        db.insights.push(record.clone());
        Ok(record)
    }

    // ── Settings ────────────────────────────────────────────────────

    async fn load_settings(&self) -> Result<Settings, CoreError> {
        Ok(self.read().settings.clone())
    }

    async fn save_settings(&self, mut settings: Settings) -> Result<Settings, CoreError> {
        settings.exchange_rates.base = CurrencyCode::parse(&settings.exchange_rates.base)?.to_string();
        settings.insights.validate()?;
        let mut db = self.write()?;
        db.settings = settings.clone();
        Ok(settings)
    }

    // ── Bulk ────────────────────────────────────────────────────────

    async fn export_snapshot(&self) -> Result<DataSnapshot, CoreError> {
        Ok(self.read().clone())
    }

    async fn replace_all(&self, snapshot: DataSnapshot) -> Result<(), CoreError> {
        let mut db = self.write()?;
        *db = snapshot;
        Ok(())
    }
}
