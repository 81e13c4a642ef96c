pub mod cache;
pub mod errors;
pub mod models;
pub mod providers;
pub mod repository;
pub mod services;
pub mod storage;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use log::{info, warn};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use cache::invalidation::{EntityKind, InvalidationMap};
use cache::query_cache::{QueryCache, QueryStatus};
use cache::query_key::{QueryKey, QueryKind};
use errors::CoreError;
use models::{
    alert::{NewPriceAlert, PriceAlert, PriceAlertUpdate, TriggeredAlert},
    category::{Category, CategoryUpdate, NewCategory},
    currency::CurrencyCode,
    holding::{AssetType, Holding, HoldingUpdate, NewHolding},
    insight::InsightRecord,
    price::{NewPricePoint, PricePoint, PriceSource},
    settings::Settings,
    transaction::{NewTransaction, Transaction},
    valuation::{PortfolioValuation, ValueSeries},
};
use providers::registry::MarketDataRegistry;
use repository::local::LocalRepository;
use repository::traits::Repository;
use services::{
    alert_service::AlertService, insights_service::InsightsService,
    price_service::PriceService, transfer_service::TransferService,
    valuation_service::ValuationService,
};

/// A newly stored price point and the alerts it triggered (already deactivated).
#[derive(Debug, Clone)]
pub struct PriceUpdate {
    pub point: PricePoint,
    pub triggered: Vec<TriggeredAlert>,
}

/// A holding whose price could not be refreshed.
#[derive(Debug, Clone)]
pub struct RefreshFailure {
    pub holding_id: Uuid,
    pub symbol: String,
    pub error: String,
}

/// Outcome of `refresh_prices`: one failing holding does not stop the others.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub updated: Vec<PriceUpdate>,
    pub failures: Vec<RefreshFailure>,
}

impl RefreshReport {
    pub fn triggered_alerts(&self) -> impl Iterator<Item = &TriggeredAlert> {
        self.updated.iter().flat_map(|u| u.triggered.iter())
    }
}

/// Record counts of a completed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub holdings: usize,
    pub categories: usize,
    pub transactions: usize,
    pub price_points: usize,
    pub alerts: usize,
}

/// Main entry point for the Finance Tracker core library.
///
/// Reads go through a query cache; every successful mutation drops the
/// cached reads it made stale (see `InvalidationMap`) so the next read
/// fetches fresh data. All methods take `&self`, so the tracker can be
/// shared (e.g. in an `Arc`) between concurrent callers; concurrent writes
/// are last-write-wins.
#[must_use]
pub struct FinanceTracker {
    repository: Arc<dyn Repository>,
    cache: QueryCache,
    invalidation: InvalidationMap,
    price_service: RwLock<Arc<PriceService>>,
    /// Rebuild the provider registry from settings when API keys change.
    default_providers: bool,
    valuation_service: ValuationService,
    alert_service: AlertService,
    insights_service: InsightsService,
    transfer_service: TransferService,
}

impl std::fmt::Debug for FinanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinanceTracker")
            .field("cached_queries", &self.cache.len())
            .field("default_providers", &self.default_providers)
            .finish()
    }
}

impl FinanceTracker {
    /// Open a tracker over `repository` with the default market-data
    /// providers, configured from the stored API keys.
    pub async fn open(repository: Arc<dyn Repository>) -> Result<Self, CoreError> {
        let settings = repository.load_settings().await?;
        let registry = MarketDataRegistry::new_with_defaults(&settings.api_keys);
        let mut tracker = Self::with_registry(repository, registry);
        tracker.default_providers = true;
        Ok(tracker)
    }

    /// Open a tracker over a fresh, empty in-memory store.
    pub async fn in_memory() -> Result<Self, CoreError> {
        Self::open(Arc::new(LocalRepository::new())).await
    }

    /// Build a tracker with an explicit provider registry. The registry is
    /// kept as given; `set_api_key` does not rebuild it.
    pub fn with_registry(repository: Arc<dyn Repository>, registry: MarketDataRegistry) -> Self {
        Self {
            repository,
            cache: QueryCache::new(),
            invalidation: InvalidationMap::new(),
            price_service: RwLock::new(Arc::new(PriceService::new(registry))),
            default_providers: false,
            valuation_service: ValuationService::new(),
            alert_service: AlertService::new(),
            insights_service: InsightsService::new(),
            transfer_service: TransferService::new(),
        }
    }

    pub fn repository(&self) -> Arc<dyn Repository> {
        self.repository.clone()
    }

    // ── Reads (cached) ──────────────────────────────────────────────

    pub async fn holdings(&self, include_deleted: bool) -> Result<Arc<Vec<Holding>>, CoreError> {
        let key = QueryKey::new(QueryKind::Holdings).including_deleted(include_deleted);
        self.cache
            .fetch(key, || self.repository.list_holdings(include_deleted))
            .await
    }

    pub async fn holding(&self, id: Uuid) -> Result<Arc<Holding>, CoreError> {
        let key = QueryKey::new(QueryKind::Holdings).for_holding(id);
        self.cache.fetch(key, || self.repository.get_holding(id)).await
    }

    pub async fn categories(&self) -> Result<Arc<Vec<Category>>, CoreError> {
        self.cache
            .fetch(QueryKey::new(QueryKind::Categories), || {
                self.repository.list_categories()
            })
            .await
    }

    /// Transactions oldest first, for one holding or all of them.
    pub async fn transactions(&self, holding_id: Option<Uuid>) -> Result<Arc<Vec<Transaction>>, CoreError> {
        let mut key = QueryKey::new(QueryKind::Transactions);
        key.holding_id = holding_id;
        self.cache
            .fetch(key, || self.repository.list_transactions(holding_id))
            .await
    }

    /// Price points of one holding, newest first.
    pub async fn price_history(
        &self,
        holding_id: Uuid,
        limit: Option<usize>,
    ) -> Result<Arc<Vec<PricePoint>>, CoreError> {
        let key = QueryKey::new(QueryKind::PriceHistory)
            .for_holding(holding_id)
            .with_limit(limit);
        self.cache
            .fetch(key, || self.repository.list_price_points(Some(holding_id), limit))
            .await
    }

    pub async fn latest_prices(&self) -> Result<Arc<HashMap<Uuid, PricePoint>>, CoreError> {
        self.cache
            .fetch(QueryKey::new(QueryKind::LatestPrices), || {
                self.repository.latest_price_points()
            })
            .await
    }

    pub async fn alerts(&self) -> Result<Arc<Vec<PriceAlert>>, CoreError> {
        self.cache
            .fetch(QueryKey::new(QueryKind::Alerts), || self.repository.list_alerts(None))
            .await
    }

    /// Insight records, newest first.
    pub async fn insight_records(&self, limit: Option<usize>) -> Result<Arc<Vec<InsightRecord>>, CoreError> {
        let key = QueryKey::new(QueryKind::Insights).with_limit(limit);
        self.cache
            .fetch(key, || self.repository.list_insight_records(limit))
            .await
    }

    pub async fn latest_insights(&self) -> Result<Option<InsightRecord>, CoreError> {
        let records = self.insight_records(Some(1)).await?;
        Ok(records.first().cloned())
    }

    pub async fn settings(&self) -> Result<Arc<Settings>, CoreError> {
        self.cache
            .fetch(QueryKey::new(QueryKind::Settings), || self.repository.load_settings())
            .await
    }

    /// Current portfolio valuation in `currency`.
    pub async fn valuation(&self, currency: &CurrencyCode) -> Result<Arc<PortfolioValuation>, CoreError> {
        let key = QueryKey::new(QueryKind::Valuation).in_currency(currency.as_str());
        self.cache
            .fetch(key, || async move {
                let holdings = self.repository.list_holdings(false).await?;
                let categories = self.repository.list_categories().await?;
                let latest = self.repository.latest_price_points().await?;
                let settings = self.repository.load_settings().await?;
                Ok(self.valuation_service.value_portfolio(
                    &holdings,
                    &categories,
                    &latest,
                    &settings.exchange_rates,
                    currency.as_str(),
                ))
            })
            .await
    }

    /// Portfolio value at every recorded price timestamp, in `currency`.
    pub async fn value_over_time(&self, currency: &CurrencyCode) -> Result<Arc<ValueSeries>, CoreError> {
        let key = QueryKey::new(QueryKind::ValueSeries).in_currency(currency.as_str());
        self.cache
            .fetch(key, || async move {
                let holdings = self.repository.list_holdings(false).await?;
                let points = self.repository.list_price_points(None, None).await?;
                let settings = self.repository.load_settings().await?;
                Ok(self.valuation_service.value_over_time(
                    &holdings,
                    &points,
                    &settings.exchange_rates,
                    currency.as_str(),
                ))
            })
            .await
    }

    /// Loading state of a cached read.
    pub fn query_status(&self, key: &QueryKey) -> QueryStatus {
        self.cache.status(key)
    }

    // ── Holdings ────────────────────────────────────────────────────

    pub async fn add_holding(&self, new_holding: NewHolding) -> Result<Holding, CoreError> {
        let holding = self.repository.create_holding(new_holding).await?;
        self.invalidate(EntityKind::Holding, Some(holding.id));
        Ok(holding)
    }

    pub async fn update_holding(&self, id: Uuid, update: HoldingUpdate) -> Result<Holding, CoreError> {
        let holding = self.repository.update_holding(id, update).await?;
        self.invalidate(EntityKind::Holding, Some(id));
        Ok(holding)
    }

    /// Soft delete: the holding leaves valuation but keeps its history.
    pub async fn delete_holding(&self, id: Uuid) -> Result<(), CoreError> {
        self.repository.delete_holding(id).await?;
        self.invalidate(EntityKind::Holding, Some(id));
        Ok(())
    }

    pub async fn restore_holding(&self, id: Uuid) -> Result<Holding, CoreError> {
        let holding = self.repository.restore_holding(id).await?;
        self.invalidate(EntityKind::Holding, Some(id));
        Ok(holding)
    }

    pub async fn add_holding_note(&self, id: Uuid, text: impl Into<String>) -> Result<Holding, CoreError> {
        let holding = self.repository.append_holding_note(id, text.into()).await?;
        self.invalidate(EntityKind::Holding, Some(id));
        Ok(holding)
    }

    // ── Categories ──────────────────────────────────────────────────

    pub async fn add_category(&self, new_category: NewCategory) -> Result<Category, CoreError> {
        let category = self.repository.create_category(new_category).await?;
        self.invalidate(EntityKind::Category, None);
        Ok(category)
    }

    pub async fn update_category(&self, id: Uuid, update: CategoryUpdate) -> Result<Category, CoreError> {
        let category = self.repository.update_category(id, update).await?;
        self.invalidate(EntityKind::Category, None);
        Ok(category)
    }

    /// Delete a category; its holdings become uncategorized.
    pub async fn delete_category(&self, id: Uuid) -> Result<(), CoreError> {
        self.repository.delete_category(id).await?;
        self.invalidate(EntityKind::Category, None);
        Ok(())
    }

    // ── Transactions ────────────────────────────────────────────────

    /// Record a transaction; the holding's quantity is recomputed from its history.
    pub async fn add_transaction(&self, new_transaction: NewTransaction) -> Result<Transaction, CoreError> {
        let transaction = self.repository.create_transaction(new_transaction).await?;
        self.invalidate(EntityKind::Transaction, Some(transaction.holding_id));
        Ok(transaction)
    }

    pub async fn delete_transaction(&self, id: Uuid) -> Result<(), CoreError> {
        self.repository.delete_transaction(id).await?;
        self.invalidate(EntityKind::Transaction, None);
        Ok(())
    }

    // ── Prices ──────────────────────────────────────────────────────

    /// Store a manually entered price and evaluate the holding's alerts against it.
    pub async fn record_price(&self, new_point: NewPricePoint) -> Result<PriceUpdate, CoreError> {
        let point = self.repository.append_price_point(new_point).await?;
        self.invalidate(EntityKind::PricePoint, Some(point.holding_id));
        self.after_price(point).await
    }

    /// Fetch the latest quote for one holding and store it as a price point.
    pub async fn refresh_price(&self, holding_id: Uuid) -> Result<PriceUpdate, CoreError> {
        let holding = self.repository.get_holding(holding_id).await?;
        let price_service = self.price_service();
        let (quote, provider) = price_service.fetch_quote(&holding).await?;

        self.record_price(NewPricePoint {
            holding_id,
            price: quote.price,
            currency: quote.currency,
            recorded_at: quote.as_of,
            source: PriceSource::Provider(provider),
        })
        .await
    }

    /// Refresh every active stock and crypto holding. Failures are collected
    /// per holding; the run never stops early.
    pub async fn refresh_prices(&self) -> Result<RefreshReport, CoreError> {
        let holdings = self.repository.list_holdings(false).await?;
        let mut report = RefreshReport::default();

        for holding in holdings
            .iter()
            .filter(|h| matches!(h.asset_type, AssetType::Stock | AssetType::Crypto))
        {
            match self.refresh_price(holding.id).await {
                Ok(update) => report.updated.push(update),
                Err(e) => {
                    warn!("Price refresh failed for {}: {e}", holding.symbol);
                    report.failures.push(RefreshFailure {
                        holding_id: holding.id,
                        symbol: holding.symbol.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Refreshed {} prices, {} failed",
            report.updated.len(),
            report.failures.len()
        );
        Ok(report)
    }

    // ── Alerts ──────────────────────────────────────────────────────

    pub async fn add_alert(&self, new_alert: NewPriceAlert) -> Result<PriceAlert, CoreError> {
        let alert = self.repository.create_alert(new_alert).await?;
        self.invalidate(EntityKind::PriceAlert, Some(alert.holding_id));
        Ok(alert)
    }

    /// Arm or disarm an alert. Re-arming is how a triggered alert fires again.
    pub async fn set_alert_active(&self, id: Uuid, active: bool) -> Result<PriceAlert, CoreError> {
        let update = PriceAlertUpdate {
            active: Some(active),
            ..Default::default()
        };
        let alert = self.repository.update_alert(id, update).await?;
        self.invalidate(EntityKind::PriceAlert, Some(alert.holding_id));
        Ok(alert)
    }

    pub async fn delete_alert(&self, id: Uuid) -> Result<(), CoreError> {
        self.repository.delete_alert(id).await?;
        self.invalidate(EntityKind::PriceAlert, None);
        Ok(())
    }

    // ── Settings ────────────────────────────────────────────────────

    pub async fn update_settings(&self, settings: Settings) -> Result<Settings, CoreError> {
        let previous_keys = self.repository.load_settings().await?.api_keys;
        let saved = self.repository.save_settings(settings).await?;
        self.invalidate(EntityKind::Settings, None);
        if saved.api_keys != previous_keys {
            self.rebuild_providers(&saved.api_keys);
        }
        Ok(saved)
    }

    /// Set one rate of the static table: base units per one unit of `currency`.
    pub async fn set_exchange_rate(&self, currency: &CurrencyCode, rate: f64) -> Result<Settings, CoreError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(CoreError::Validation(format!(
                "Exchange rate for {currency} must be a positive number, got {rate}"
            )));
        }
        let mut settings = self.repository.load_settings().await?;
        settings.exchange_rates.set_rate(currency.as_str(), rate);
        self.update_settings(settings).await
    }

    /// Fetch current rates for the table's base currency. Returns how many were updated.
    pub async fn refresh_exchange_rates(&self) -> Result<usize, CoreError> {
        let mut settings = self.repository.load_settings().await?;
        let updated = self
            .price_service()
            .refresh_exchange_rates(&mut settings.exchange_rates)
            .await?;
        self.update_settings(settings).await?;
        Ok(updated)
    }

    /// Store (or, with an empty key, remove) a provider API key.
    pub async fn set_api_key(&self, provider: &str, key: &str) -> Result<(), CoreError> {
        let mut settings = self.repository.load_settings().await?;
        let key = key.trim();
        if key.is_empty() {
            settings.api_keys.remove(provider);
        } else {
            settings.api_keys.insert(provider.to_string(), key.to_string());
        }
        self.update_settings(settings).await?;
        Ok(())
    }

    // ── Insights ────────────────────────────────────────────────────

    /// Generate and store a new insight record. Cancelling `cancel` before
    /// the record is written aborts the run with `CoreError::Cancelled`.
    pub async fn generate_insights(
        &self,
        currency: &CurrencyCode,
        cancel: &CancellationToken,
    ) -> Result<InsightRecord, CoreError> {
        let settings = self.repository.load_settings().await?;
        let record = self
            .insights_service
            .generate(
                self.repository.as_ref(),
                &settings,
                currency.as_str(),
                Utc::now(),
                cancel,
            )
            .await?;
        self.invalidate(EntityKind::Insight, None);
        Ok(record)
    }

    // ── Import / Export ─────────────────────────────────────────────

    /// Replace all stored data with the contents of an export document.
    /// Nothing is written unless the whole document is valid.
    pub async fn import_json(&self, json: &str) -> Result<ImportSummary, CoreError> {
        let settings = self.repository.load_settings().await?;
        let snapshot = self.transfer_service.prepare_import(json, settings, Utc::now())?;
        let summary = ImportSummary {
            holdings: snapshot.holdings.len(),
            categories: snapshot.categories.len(),
            transactions: snapshot.transactions.len(),
            price_points: snapshot.price_points.len(),
            alerts: snapshot.alerts.len(),
        };

        self.repository.replace_all(snapshot).await?;
        self.cache.invalidate_all();
        info!(
            "Imported {} holdings, {} categories, {} transactions, {} price points",
            summary.holdings, summary.categories, summary.transactions, summary.price_points
        );
        Ok(summary)
    }

    pub async fn export_json(&self) -> Result<String, CoreError> {
        let snapshot = self.repository.export_snapshot().await?;
        self.transfer_service.export(&snapshot, Utc::now())
    }

    // ── Internal ────────────────────────────────────────────────────

    fn invalidate(&self, entity: EntityKind, holding_id: Option<Uuid>) {
        self.invalidation.apply(&self.cache, entity, holding_id);
    }

    fn price_service(&self) -> Arc<PriceService> {
        self.price_service
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn rebuild_providers(&self, api_keys: &HashMap<String, String>) {
        if !self.default_providers {
            return;
        }
        let registry = MarketDataRegistry::new_with_defaults(api_keys);
        *self.price_service.write().unwrap_or_else(|e| e.into_inner()) =
            Arc::new(PriceService::new(registry));
    }

    /// Evaluate the holding's alerts against a stored point; triggered
    /// alerts are deactivated (one-shot).
    async fn after_price(&self, point: PricePoint) -> Result<PriceUpdate, CoreError> {
        let alerts = self.repository.list_alerts(Some(point.holding_id)).await?;
        let triggered = self.alert_service.evaluate(&alerts, &point);

        for hit in &triggered {
            let update = PriceAlertUpdate {
                active: Some(false),
                last_triggered_at: Some(point.recorded_at),
                ..Default::default()
            };
            self.repository.update_alert(hit.alert.id, update).await?;
            info!("Alert {} triggered at {} {}", hit.alert.id, hit.price, hit.currency);
        }
        if !triggered.is_empty() {
            self.invalidate(EntityKind::PriceAlert, Some(point.holding_id));
        }

        Ok(PriceUpdate { point, triggered })
    }
}
