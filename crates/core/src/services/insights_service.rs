use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::CoreError;
use crate::models::category::Category;
use crate::models::holding::{AssetType, Holding};
use crate::models::insight::{InsightItem, InsightKind, InsightRecord, Severity};
use crate::models::price::PricePoint;
use crate::models::settings::{InsightThresholds, Settings};
use crate::models::valuation::PortfolioValuation;
use crate::repository::traits::Repository;
use crate::services::valuation_service::ValuationService;

/// A single holding's share at or above this percentage is always critical.
const CRITICAL_CONCENTRATION_PCT: f64 = 50.0;

/// Generates insight records: observations about concentration, price
/// moves and data quality, computed from the stored portfolio.
///
/// A run goes through four phases (load, price history scan, analysis,
/// commit) and checks its `CancellationToken` before each of them and once
/// more right before the record is written. A cancelled run persists
/// nothing.
pub struct InsightsService {
    valuation_service: ValuationService,
}

/// What the load phase hands to the rest of the run.
struct Loaded {
    holdings: Vec<Holding>,
    categories: Vec<Category>,
    latest: HashMap<Uuid, PricePoint>,
    previous: Option<InsightRecord>,
}

impl InsightsService {
    pub fn new() -> Self {
        Self {
            valuation_service: ValuationService::new(),
        }
    }

    pub async fn generate(
        &self,
        repository: &dyn Repository,
        settings: &Settings,
        currency: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<InsightRecord, CoreError> {
        checkpoint(cancel, "load")?;
        let loaded = Loaded {
            holdings: repository.list_holdings(false).await?,
            categories: repository.list_categories().await?,
            latest: repository.latest_price_points().await?,
            previous: repository.latest_insight_record().await?,
        };

        checkpoint(cancel, "price history scan")?;
        let references = self.reference_prices(repository, &loaded).await?;

        checkpoint(cancel, "analysis")?;
        let valuation = self.valuation_service.value_portfolio(
            &loaded.holdings,
            &loaded.categories,
            &loaded.latest,
            &settings.exchange_rates,
            currency,
        );
        let mut items = analyze(&loaded, &references, &valuation, &settings.insights, now);
        items.sort_by(compare_items);

        let record = InsightRecord {
            id: Uuid::new_v4(),
            generated_at: now,
            currency: valuation.currency.clone(),
            items,
        };

        checkpoint(cancel, "commit")?;
        let saved = repository.save_insight_record(record).await?;
        info!(
            "Generated insight record {} with {} items",
            saved.id,
            saved.items.len()
        );
        Ok(saved)
    }

    /// The price each holding's latest price is compared against: the price
    /// in effect when the previous record was generated, or the price point
    /// before the latest one when there is no previous record.
    async fn reference_prices(
        &self,
        repository: &dyn Repository,
        loaded: &Loaded,
    ) -> Result<HashMap<Uuid, PricePoint>, CoreError> {
        let mut references = HashMap::new();
        for holding in &loaded.holdings {
            let Some(latest) = loaded.latest.get(&holding.id) else {
                continue;
            };

            let reference = match &loaded.previous {
                Some(previous) => repository.price_at(holding.id, previous.generated_at).await?,
                None => repository
                    .list_price_points(Some(holding.id), Some(2))
                    .await?
                    .into_iter()
                    .nth(1),
            };

            if let Some(reference) = reference.filter(|r| {
                r.id != latest.id
                    && r.currency.eq_ignore_ascii_case(&latest.currency)
                    && r.price.is_finite()
                    && r.price > 0.0
            }) {
                references.insert(holding.id, reference);
            }
        }
        Ok(references)
    }
}

impl Default for InsightsService {
    fn default() -> Self {
        Self::new()
    }
}

fn checkpoint(cancel: &CancellationToken, phase: &str) -> Result<(), CoreError> {
    if cancel.is_cancelled() {
        debug!("Insights run cancelled before {phase}");
        return Err(CoreError::Cancelled);
    }
    debug!("Insights phase: {phase}");
    Ok(())
}

fn analyze(
    loaded: &Loaded,
    references: &HashMap<Uuid, PricePoint>,
    valuation: &PortfolioValuation,
    thresholds: &InsightThresholds,
    now: DateTime<Utc>,
) -> Vec<InsightItem> {
    let mut items = Vec::new();

    if valuation.total_value > 0.0 {
        for holding_value in &valuation.holdings {
            let pct = holding_value.share * 100.0;
            if pct >= thresholds.concentration_pct {
                let severity = if pct >= CRITICAL_CONCENTRATION_PCT {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                items.push(InsightItem {
                    holding_id: Some(holding_value.holding_id),
                    holding_name: Some(holding_value.name.clone()),
                    kind: InsightKind::Concentration,
                    severity,
                    message: format!("{} makes up {pct:.1}% of the portfolio", holding_value.name),
                    metric: Some(pct),
                });
            }
        }

        for slice in valuation.allocation.iter().filter(|s| s.category_id.is_some()) {
            let pct = slice.share * 100.0;
            if pct >= thresholds.category_concentration_pct {
                items.push(InsightItem {
                    holding_id: None,
                    holding_name: None,
                    kind: InsightKind::CategoryConcentration,
                    severity: Severity::Notice,
                    message: format!("Category {} makes up {pct:.1}% of the portfolio", slice.name),
                    metric: Some(pct),
                });
            }
        }
    }

    let known_categories: HashSet<Uuid> = loaded.categories.iter().map(|c| c.id).collect();
    let mut uncategorized = 0usize;

    for holding in &loaded.holdings {
        if holding
            .category_id
            .map_or(true, |id| !known_categories.contains(&id))
        {
            uncategorized += 1;
        }

        match loaded.latest.get(&holding.id) {
            Some(latest) => {
                if let Some(reference) = references.get(&holding.id) {
                    items.extend(price_move(holding, reference, latest, thresholds));
                }

                let age_days = (now - latest.recorded_at).num_days();
                if age_days > thresholds.stale_after_days {
                    items.push(InsightItem {
                        holding_id: Some(holding.id),
                        holding_name: Some(holding.name.clone()),
                        kind: InsightKind::StalePrice,
                        severity: Severity::Notice,
                        message: format!("The price of {} is {age_days} days old", holding.name),
                        metric: Some(age_days as f64),
                    });
                }
            }
            None if holding.quantity > 0.0 && holding.asset_type != AssetType::Cash => {
                items.push(InsightItem {
                    holding_id: Some(holding.id),
                    holding_name: Some(holding.name.clone()),
                    kind: InsightKind::MissingPrice,
                    severity: Severity::Notice,
                    message: format!("{} has no recorded price and is valued at zero", holding.name),
                    metric: None,
                });
            }
            None => {}
        }
    }

    if uncategorized > 0 {
        items.push(InsightItem {
            holding_id: None,
            holding_name: None,
            kind: InsightKind::Uncategorized,
            severity: Severity::Info,
            message: format!("{uncategorized} holding(s) have no category"),
            metric: Some(uncategorized as f64),
        });
    }

    items
}

fn price_move(
    holding: &Holding,
    reference: &PricePoint,
    latest: &PricePoint,
    thresholds: &InsightThresholds,
) -> Option<InsightItem> {
    if !latest.price.is_finite() {
        return None;
    }
    let change_pct = (latest.price - reference.price) / reference.price * 100.0;
    if change_pct.abs() < thresholds.price_move_pct {
        return None;
    }

    let (kind, severity) = if change_pct < 0.0 {
        let severity = if change_pct.abs() >= thresholds.price_move_pct * 2.0 {
            Severity::Critical
        } else {
            Severity::Warning
        };
        (InsightKind::PriceDrop, severity)
    } else {
        (InsightKind::PriceRise, Severity::Info)
    };

    Some(InsightItem {
        holding_id: Some(holding.id),
        holding_name: Some(holding.name.clone()),
        kind,
        severity,
        message: format!(
            "{} moved {change_pct:+.1}% since the last check ({} → {} {})",
            holding.name, reference.price, latest.price, latest.currency
        ),
        metric: Some(change_pct),
    })
}

/// Severity descending, then holding name (portfolio-level items first),
/// then kind and message.
fn compare_items(a: &InsightItem, b: &InsightItem) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| a.holding_name.cmp(&b.holding_name))
        .then_with(|| a.kind.cmp(&b.kind))
        .then_with(|| a.message.cmp(&b.message))
}
