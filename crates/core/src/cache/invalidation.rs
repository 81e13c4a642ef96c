use std::collections::HashMap;

use log::debug;
use uuid::Uuid;

use super::query_cache::QueryCache;
use super::query_key::QueryKind;

/// The kind of record a mutation wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Holding,
    Category,
    Transaction,
    PricePoint,
    PriceAlert,
    Insight,
    Settings,
}

/// Which cached reads a write to each entity kind makes stale.
///
/// Consulted synchronously after every successful mutation. Entries are
/// only dropped; the next read fetches them again.
#[derive(Debug, Clone)]
pub struct InvalidationMap {
    rules: HashMap<EntityKind, Vec<QueryKind>>,
}

impl InvalidationMap {
    pub fn new() -> Self {
        use QueryKind::*;

        let rules = HashMap::from([
            (
                EntityKind::Holding,
                vec![Holdings, Transactions, LatestPrices, Valuation, ValueSeries],
            ),
            (EntityKind::Category, vec![Categories, Holdings, Valuation]),
            (
                EntityKind::Transaction,
                vec![Transactions, Holdings, Valuation, ValueSeries],
            ),
            (
                EntityKind::PricePoint,
                vec![PriceHistory, LatestPrices, Valuation, ValueSeries],
            ),
            (EntityKind::PriceAlert, vec![Alerts]),
            (EntityKind::Insight, vec![Insights]),
            (EntityKind::Settings, vec![Settings, Valuation, ValueSeries]),
        ]);
        Self { rules }
    }

    pub fn affected(&self, entity: EntityKind) -> &[QueryKind] {
        self.rules.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the rule for one entity kind.
    pub fn set_rule(&mut self, entity: EntityKind, kinds: Vec<QueryKind>) {
        self.rules.insert(entity, kinds);
    }

    /// Drop every entry made stale by a write to `entity`. With a
    /// `holding_id`, per-holding entries of other holdings are kept.
    pub fn apply(&self, cache: &QueryCache, entity: EntityKind, holding_id: Option<Uuid>) -> usize {
        let kinds = self.affected(entity);
        let dropped = cache.invalidate_where(|key| kinds.contains(&key.kind) && key.touches(holding_id));
        debug!("{entity:?} changed (holding {holding_id:?}): dropped {dropped} cached queries");
        dropped
    }
}

impl Default for InvalidationMap {
    fn default() -> Self {
        Self::new()
    }
}
