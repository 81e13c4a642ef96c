use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::alert::PriceAlert;
use super::category::Category;
use super::holding::Holding;
use super::insight::InsightRecord;
use super::price::PricePoint;
use super::settings::Settings;
use super::transaction::Transaction;

/// Schema version written into export documents and seed bundles.
pub const SCHEMA_VERSION: u32 = 1;

/// Every stored record at once. Used for export, import (atomic replace)
/// and the encrypted database file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataSnapshot {
    pub holdings: Vec<Holding>,
    pub categories: Vec<Category>,
    pub transactions: Vec<Transaction>,
    pub price_points: Vec<PricePoint>,
    pub alerts: Vec<PriceAlert>,
    pub insights: Vec<InsightRecord>,
    pub settings: Settings,
}

/// The JSON import/export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    pub holdings: Vec<Holding>,
    pub categories: Vec<Category>,
    pub price_points: Vec<PricePoint>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub alerts: Vec<PriceAlert>,
}
