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
use super::traits::Repository;

/// Placeholder for a hosted backend. Every operation fails with
/// `CoreError::Unsupported` so callers can wire it up without surprises.
pub struct CloudRepository {
    endpoint: String,
}

impl CloudRepository {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn unsupported<T>(&self, operation: &str) -> Result<T, CoreError> {
        Err(CoreError::Unsupported(format!(
            "cloud repository ({}) does not implement {operation}",
            self.endpoint
        )))
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Repository for CloudRepository {
    async fn list_holdings(&self, _include_deleted: bool) -> Result<Vec<Holding>, CoreError> {
        self.unsupported("list_holdings")
    }

    async fn get_holding(&self, _id: Uuid) -> Result<Holding, CoreError> {
        self.unsupported("get_holding")
    }

    async fn create_holding(&self, _new_holding: NewHolding) -> Result<Holding, CoreError> {
        self.unsupported("create_holding")
    }

    async fn update_holding(&self, _id: Uuid, _update: HoldingUpdate) -> Result<Holding, CoreError> {
        self.unsupported("update_holding")
    }

    async fn delete_holding(&self, _id: Uuid) -> Result<(), CoreError> {
        self.unsupported("delete_holding")
    }

    async fn restore_holding(&self, _id: Uuid) -> Result<Holding, CoreError> {
        self.unsupported("restore_holding")
    }

    async fn append_holding_note(&self, _id: Uuid, _text: String) -> Result<Holding, CoreError> {
        self.unsupported("append_holding_note")
    }

    async fn list_categories(&self) -> Result<Vec<Category>, CoreError> {
        self.unsupported("list_categories")
    }

    async fn get_category(&self, _id: Uuid) -> Result<Category, CoreError> {
        self.unsupported("get_category")
    }

    async fn create_category(&self, _new_category: NewCategory) -> Result<Category, CoreError> {
        self.unsupported("create_category")
    }

    async fn update_category(&self, _id: Uuid, _update: CategoryUpdate) -> Result<Category, CoreError> {
        self.unsupported("update_category")
    }

    async fn delete_category(&self, _id: Uuid) -> Result<(), CoreError> {
        self.unsupported("delete_category")
    }

    async fn list_transactions(&self, _holding_id: Option<Uuid>) -> Result<Vec<Transaction>, CoreError> {
        self.unsupported("list_transactions")
    }

    async fn create_transaction(&self, _new_transaction: NewTransaction) -> Result<Transaction, CoreError> {
        self.unsupported("create_transaction")
    }

    async fn delete_transaction(&self, _id: Uuid) -> Result<(), CoreError> {
        self.unsupported("delete_transaction")
    }

    async fn list_price_points(
        &self,
        _holding_id: Option<Uuid>,
        _limit: Option<usize>,
    ) -> Result<Vec<PricePoint>, CoreError> {
        self.unsupported("list_price_points")
    }

    async fn latest_price_points(&self) -> Result<HashMap<Uuid, PricePoint>, CoreError> {
        self.unsupported("latest_price_points")
    }

    async fn price_at(&self, _holding_id: Uuid, _at: DateTime<Utc>) -> Result<Option<PricePoint>, CoreError> {
        self.unsupported("price_at")
    }

    async fn append_price_point(&self, _new_point: NewPricePoint) -> Result<PricePoint, CoreError> {
        self.unsupported("append_price_point")
    }

    async fn list_alerts(&self, _holding_id: Option<Uuid>) -> Result<Vec<PriceAlert>, CoreError> {
        self.unsupported("list_alerts")
    }

    async fn create_alert(&self, _new_alert: NewPriceAlert) -> Result<PriceAlert, CoreError> {
        self.unsupported("create_alert")
    }

    async fn update_alert(&self, _id: Uuid, _update: PriceAlertUpdate) -> Result<PriceAlert, CoreError> {
        self.unsupported("update_alert")
    }

    async fn delete_alert(&self, _id: Uuid) -> Result<(), CoreError> {
        self.unsupported("delete_alert")
    }

    async fn list_insight_records(&self, _limit: Option<usize>) -> Result<Vec<InsightRecord>, CoreError> {
        self.unsupported("list_insight_records")
    }

    async fn latest_insight_record(&self) -> Result<Option<InsightRecord>, CoreError> {
        self.unsupported("latest_insight_record")
    }

    async fn save_insight_record(&self, _record: InsightRecord) -> Result<InsightRecord, CoreError> {
        self.unsupported("save_insight_record")
    }

    async fn load_settings(&self) -> Result<Settings, CoreError> {
        self.unsupported("load_settings")
    }

    async fn save_settings(&self, _settings: Settings) -> Result<Settings, CoreError> {
        self.unsupported("save_settings")
    }

    async fn export_snapshot(&self) -> Result<DataSnapshot, CoreError> {
        self.unsupported("export_snapshot")
    }

    async fn replace_all(&self, _snapshot: DataSnapshot) -> Result<(), CoreError> {
        self.unsupported("replace_all")
    }
}
