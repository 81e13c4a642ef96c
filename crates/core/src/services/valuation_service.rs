use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::category::Category;
use crate::models::holding::{AssetType, Holding};
use crate::models::price::{ExchangeRates, PricePoint};
use crate::models::valuation::{
    AllocationSlice, HoldingValuation, PortfolioValuation, ValuationIssue, ValuePoint, ValueSeries,
};
use crate::services::currency_service::CurrencyService;

/// Name of the allocation slice collecting holdings without a (known) category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Computes holding values, portfolio totals, allocation breakdowns and
/// value-over-time series.
///
/// Pure and synchronous: callers pass in everything it needs. It never
/// fails: a missing price, an unconvertible currency or a malformed
/// number values the holding at zero and is reported as a `ValuationIssue`.
///
/// Cash holdings without any price point are valued at 1.0 per unit in the
/// holding's currency.
pub struct ValuationService {
    currency_service: CurrencyService,
}

/// A unit price resolved for a holding, before conversion.
struct UnitPrice<'a> {
    price: f64,
    currency: &'a str,
    at: Option<DateTime<Utc>>,
}

impl ValuationService {
    pub fn new() -> Self {
        Self {
            currency_service: CurrencyService::new(),
        }
    }

    /// Value a single holding: quantity × latest price, in `currency`.
    ///
    /// `share` is left at 0.0; it is only meaningful inside a portfolio.
    pub fn value_holding(
        &self,
        holding: &Holding,
        latest: Option<&PricePoint>,
        rates: &ExchangeRates,
        currency: &str,
        issues: &mut Vec<ValuationIssue>,
    ) -> HoldingValuation {
        let quantity = sanitize(holding.quantity, holding.id, "quantity", issues);
        let unit = self.unit_price(holding, latest, issues);

        let value = match &unit {
            Some(unit) if quantity > 0.0 => {
                self.to_display(holding.id, quantity * unit.price, unit.currency, rates, currency, issues)
            }
            None if quantity > 0.0 => {
                push_unique(issues, ValuationIssue::MissingPrice { holding_id: holding.id });
                0.0
            }
            _ => 0.0,
        };

        let raw_cost = sanitize(holding.cost_basis, holding.id, "cost_basis", issues);
        let cost_basis = if raw_cost > 0.0 {
            self.to_display(holding.id, raw_cost, &holding.currency, rates, currency, issues)
        } else {
            0.0
        };

        HoldingValuation {
            holding_id: holding.id,
            symbol: holding.symbol.clone(),
            name: holding.name.clone(),
            category_id: holding.category_id,
            quantity,
            price: unit.as_ref().map(|u| u.price),
            price_currency: unit.as_ref().map(|u| u.currency.to_string()),
            priced_at: unit.as_ref().and_then(|u| u.at),
            value,
            cost_basis,
            unrealized_gain: value - cost_basis,
            share: 0.0,
        }
    }

    /// Value every non-deleted holding and break the total down by category.
    ///
    /// - total = Σ holding values (deleted holdings are skipped entirely)
    /// - every category gets a slice, even an empty one (share 0.0)
    /// - holdings without a known category land in an "Uncategorized" slice
    /// - shares are value ÷ total, or 0.0 when the total is zero
    pub fn value_portfolio(
        &self,
        holdings: &[Holding],
        categories: &[Category],
        latest_prices: &HashMap<Uuid, PricePoint>,
        rates: &ExchangeRates,
        currency: &str,
    ) -> PortfolioValuation {
        let mut issues = Vec::new();
        let mut valuations: Vec<HoldingValuation> = holdings
            .iter()
            .filter(|h| h.is_active())
            .map(|h| self.value_holding(h, latest_prices.get(&h.id), rates, currency, &mut issues))
            .collect();

        let total_value: f64 = valuations.iter().map(|v| v.value).sum();
        let total_cost_basis: f64 = valuations.iter().map(|v| v.cost_basis).sum();

        for valuation in &mut valuations {
            valuation.share = share_of(valuation.value, total_value);
        }

        let allocation = allocate(&valuations, categories, total_value);

        PortfolioValuation {
            currency: currency.to_uppercase(),
            total_value,
            total_cost_basis,
            holdings: valuations,
            allocation,
            issues,
        }
    }

    /// Portfolio value sampled at every distinct price-point timestamp.
    ///
    /// At each timestamp every active holding contributes its current
    /// quantity × its most recent price at or before that timestamp
    /// (forward fill). A holding with no price yet contributes zero and is
    /// reported once as `MissingPrice`.
    pub fn value_over_time(
        &self,
        holdings: &[Holding],
        price_points: &[PricePoint],
        rates: &ExchangeRates,
        currency: &str,
    ) -> ValueSeries {
        let mut issues = Vec::new();
        let active: Vec<&Holding> = holdings.iter().filter(|h| h.is_active()).collect();
        let active_ids: HashSet<Uuid> = active.iter().map(|h| h.id).collect();

        // Per-holding price history, oldest first (stable: later appends win ties).
        let mut history: HashMap<Uuid, Vec<&PricePoint>> = HashMap::new();
        for point in price_points.iter().filter(|p| active_ids.contains(&p.holding_id)) {
            history.entry(point.holding_id).or_default().push(point);
        }
        for points in history.values_mut() {
            points.sort_by_key(|p| p.recorded_at);
        }

        let mut timestamps: Vec<DateTime<Utc>> = history
            .values()
            .flat_map(|points| points.iter().map(|p| p.recorded_at))
            .collect();
        timestamps.sort();
        timestamps.dedup();

        let mut cursors: HashMap<Uuid, usize> = HashMap::new();
        let mut points = Vec::with_capacity(timestamps.len());

        for timestamp in timestamps {
            let mut value = 0.0;
            for holding in &active {
                let quantity = sanitize(holding.quantity, holding.id, "quantity", &mut issues);
                if quantity <= 0.0 {
                    continue;
                }

                let latest = history.get(&holding.id).and_then(|series| {
                    let cursor = cursors.entry(holding.id).or_insert(0);
                    while *cursor < series.len() && series[*cursor].recorded_at <= timestamp {
                        *cursor += 1;
                    }
                    cursor.checked_sub(1).map(|idx| series[idx])
                });

                match self.unit_price(holding, latest, &mut issues) {
                    Some(unit) => {
                        value += self.to_display(
                            holding.id,
                            quantity * unit.price,
                            unit.currency,
                            rates,
                            currency,
                            &mut issues,
                        );
                    }
                    None => {
                        push_unique(&mut issues, ValuationIssue::MissingPrice { holding_id: holding.id });
                    }
                }
            }
            points.push(ValuePoint { timestamp, value });
        }

        ValueSeries {
            currency: currency.to_uppercase(),
            points,
            issues,
        }
    }

    // ── Internal ────────────────────────────────────────────────────

    fn unit_price<'a>(
        &self,
        holding: &'a Holding,
        latest: Option<&'a PricePoint>,
        issues: &mut Vec<ValuationIssue>,
    ) -> Option<UnitPrice<'a>> {
        match latest {
            Some(point) => Some(UnitPrice {
                price: sanitize(point.price, holding.id, "price", issues),
                currency: &point.currency,
                at: Some(point.recorded_at),
            }),
            None if holding.asset_type == AssetType::Cash => Some(UnitPrice {
                price: 1.0,
                currency: &holding.currency,
                at: None,
            }),
            None => None,
        }
    }

    fn to_display(
        &self,
        holding_id: Uuid,
        amount: f64,
        from: &str,
        rates: &ExchangeRates,
        to: &str,
        issues: &mut Vec<ValuationIssue>,
    ) -> f64 {
        match self.currency_service.convert(rates, amount, from, to) {
            Some(converted) if converted.is_finite() => converted,
            _ => {
                push_unique(
                    issues,
                    ValuationIssue::MissingExchangeRate {
                        holding_id,
                        from: from.to_uppercase(),
                        to: to.to_uppercase(),
                    },
                );
                0.0
            }
        }
    }
}

impl Default for ValuationService {
    fn default() -> Self {
        Self::new()
    }
}

fn allocate(
    valuations: &[HoldingValuation],
    categories: &[Category],
    total_value: f64,
) -> Vec<AllocationSlice> {
    let known: HashSet<Uuid> = categories.iter().map(|c| c.id).collect();

    let mut slices: Vec<AllocationSlice> = categories
        .iter()
        .map(|category| {
            let members: Vec<&HoldingValuation> = valuations
                .iter()
                .filter(|v| v.category_id == Some(category.id))
                .collect();
            build_slice(Some(category.id), &category.name, &members, total_value)
        })
        .collect();

    let uncategorized: Vec<&HoldingValuation> = valuations
        .iter()
        .filter(|v| v.category_id.map_or(true, |id| !known.contains(&id)))
        .collect();
    if !uncategorized.is_empty() {
        slices.push(build_slice(None, UNCATEGORIZED, &uncategorized, total_value));
    }

    slices
}

fn build_slice(
    category_id: Option<Uuid>,
    name: &str,
    members: &[&HoldingValuation],
    total_value: f64,
) -> AllocationSlice {
    let value: f64 = members.iter().map(|v| v.value).sum();
    AllocationSlice {
        category_id,
        name: name.to_string(),
        value,
        share: share_of(value, total_value),
        holding_ids: members.iter().map(|v| v.holding_id).collect(),
    }
}

fn share_of(value: f64, total: f64) -> f64 {
    if total > 0.0 {
        value / total
    } else {
        0.0
    }
}

/// Malformed numbers (NaN, ±inf, negative) count as zero and are reported.
fn sanitize(value: f64, holding_id: Uuid, field: &str, issues: &mut Vec<ValuationIssue>) -> f64 {
    if value.is_finite() && value >= 0.0 {
        return value;
    }
    push_unique(
        issues,
        ValuationIssue::InvalidNumber {
            holding_id,
            field: field.to_string(),
        },
    );
    0.0
}

fn push_unique(issues: &mut Vec<ValuationIssue>, issue: ValuationIssue) {
    if !issues.contains(&issue) {
        issues.push(issue);
    }
}
