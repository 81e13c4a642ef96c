use uuid::Uuid;

/// The read a cache entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Holdings,
    Categories,
    Transactions,
    PriceHistory,
    LatestPrices,
    Alerts,
    Insights,
    Settings,
    Valuation,
    ValueSeries,
}

/// Identifies one cached read: the kind plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub kind: QueryKind,
    pub holding_id: Option<Uuid>,
    pub limit: Option<usize>,
    pub currency: Option<String>,
    pub include_deleted: bool,
}

impl QueryKey {
    pub fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            holding_id: None,
            limit: None,
            currency: None,
            include_deleted: false,
        }
    }

    pub fn for_holding(mut self, holding_id: Uuid) -> Self {
        self.holding_id = Some(holding_id);
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn in_currency(mut self, currency: &str) -> Self {
        self.currency = Some(currency.to_uppercase());
        self
    }

    pub fn including_deleted(mut self, include_deleted: bool) -> Self {
        self.include_deleted = include_deleted;
        self
    }

    /// Whether a change to `holding_id` (or to everything, for `None`) can
    /// affect this entry.
    pub fn touches(&self, holding_id: Option<Uuid>) -> bool {
        match (holding_id, self.holding_id) {
            (Some(changed), Some(scoped)) => changed == scoped,
            _ => true,
        }
    }
}
