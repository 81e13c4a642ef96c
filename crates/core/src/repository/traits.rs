use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::alert::{NewPriceAlert, PriceAlert, PriceAlertUpdate};
use crate::models::category::{Category, CategoryUpdate, NewCategory};
use crate::models::holding::{Holding, HoldingUpdate, NewHolding};
use crate::models::insight::InsightRecord;
use crate::models::price::{NewPricePoint, PricePoint};
use crate::models::settings::Settings;
use crate::models::snapshot::DataSnapshot;
use crate::models::transaction::{NewTransaction, Transaction};

/// Persistence boundary used by every service and by the `FinanceTracker`
/// facade. Implementations decide where records live; callers only see
/// these operations.
///
/// Failures are reported as `CoreError::NotFound` (missing id),
/// `CoreError::Validation` (the write would break an invariant) or
/// `CoreError::Storage` (the backing store failed).
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Repository: Send + Sync {
    // ── Holdings ────────────────────────────────────────────────────

    /// List holdings; soft-deleted ones only when `include_deleted` is set.
    async fn list_holdings(&self, include_deleted: bool) -> Result<Vec<Holding>, CoreError>;
    async fn get_holding(&self, id: Uuid) -> Result<Holding, CoreError>;
    /// Create a holding. A non-zero opening quantity is recorded as an
    /// `Opening` transaction.
    async fn create_holding(&self, new_holding: NewHolding) -> Result<Holding, CoreError>;
    async fn update_holding(&self, id: Uuid, update: HoldingUpdate) -> Result<Holding, CoreError>;
    /// Soft delete: the holding and its history are kept.
    async fn delete_holding(&self, id: Uuid) -> Result<(), CoreError>;
    async fn restore_holding(&self, id: Uuid) -> Result<Holding, CoreError>;
    async fn append_holding_note(&self, id: Uuid, text: String) -> Result<Holding, CoreError>;

    // ── Categories ──────────────────────────────────────────────────

    async fn list_categories(&self) -> Result<Vec<Category>, CoreError>;
    async fn get_category(&self, id: Uuid) -> Result<Category, CoreError>;
    async fn create_category(&self, new_category: NewCategory) -> Result<Category, CoreError>;
    async fn update_category(&self, id: Uuid, update: CategoryUpdate) -> Result<Category, CoreError>;
    /// Delete a category; holdings referencing it become uncategorized.
    async fn delete_category(&self, id: Uuid) -> Result<(), CoreError>;

    // ── Transactions ────────────────────────────────────────────────

    /// Transactions oldest first, optionally for one holding.
    async fn list_transactions(&self, holding_id: Option<Uuid>) -> Result<Vec<Transaction>, CoreError>;
    /// Record a transaction and recompute the holding's quantity and cost basis.
    async fn create_transaction(&self, new_transaction: NewTransaction) -> Result<Transaction, CoreError>;
    /// Remove a transaction, unless the remaining history would go negative.
    async fn delete_transaction(&self, id: Uuid) -> Result<(), CoreError>;

    // ── Price points ────────────────────────────────────────────────

    /// Price points newest first, optionally for one holding, optionally capped.
    async fn list_price_points(
        &self,
        holding_id: Option<Uuid>,
        limit: Option<usize>,
    ) -> Result<Vec<PricePoint>, CoreError>;
    /// The most recent price point of every holding that has one.
    async fn latest_price_points(&self) -> Result<HashMap<Uuid, PricePoint>, CoreError>;
    /// The price in effect for `holding_id` at `at` (latest at or before it).
    async fn price_at(&self, holding_id: Uuid, at: DateTime<Utc>) -> Result<Option<PricePoint>, CoreError>;
    async fn append_price_point(&self, new_point: NewPricePoint) -> Result<PricePoint, CoreError>;

    // ── Price alerts ────────────────────────────────────────────────

    async fn list_alerts(&self, holding_id: Option<Uuid>) -> Result<Vec<PriceAlert>, CoreError>;
    async fn create_alert(&self, new_alert: NewPriceAlert) -> Result<PriceAlert, CoreError>;
    async fn update_alert(&self, id: Uuid, update: PriceAlertUpdate) -> Result<PriceAlert, CoreError>;
    async fn delete_alert(&self, id: Uuid) -> Result<(), CoreError>;

    // ── Insights ────────────────────────────────────────────────────

    /// Insight records newest first, optionally capped.
    async fn list_insight_records(&self, limit: Option<usize>) -> Result<Vec<InsightRecord>, CoreError>;
    async fn latest_insight_record(&self) -> Result<Option<InsightRecord>, CoreError>;
    /// Persist a complete record. Records are never patched afterwards.
    async fn save_insight_record(&self, record: InsightRecord) -> Result<InsightRecord, CoreError>;

    // ── Settings ────────────────────────────────────────────────────

    async fn load_settings(&self) -> Result<Settings, CoreError>;
    async fn save_settings(&self, settings: Settings) -> Result<Settings, CoreError>;

    // ── Bulk ────────────────────────────────────────────────────────

    async fn export_snapshot(&self) -> Result<DataSnapshot, CoreError>;
    /// Replace all stored records at once. Either everything is replaced or
    /// nothing changes.
    async fn replace_all(&self, snapshot: DataSnapshot) -> Result<(), CoreError>;
}
