use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;

use crate::errors::CoreError;
use super::query_key::QueryKey;

type Value = Arc<dyn Any + Send + Sync>;

/// Loading state of a cached read, for loading indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing cached and nothing in flight
    Idle,
    /// A fetch is running
    Loading,
    /// A value is cached
    Ready,
}

#[derive(Default)]
struct Entry {
    cell: OnceCell<Value>,
    in_flight: AtomicUsize,
}

/// Decrements the in-flight count even if the fetch future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn start(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Read-through cache for query results.
///
/// Each key holds at most one value. Concurrent reads of the same key share
/// one in-flight fetch; failed fetches leave nothing behind. Invalidating
/// a key while its fetch runs detaches that fetch: its caller still gets
/// the result but the cache does not keep it.
pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, Arc<Entry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key`, or run `fetcher` and cache its result.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<Arc<T>, CoreError>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.entry(key.clone()).or_default().clone()
        };

        let value = match entry.cell.get() {
            Some(value) => value.clone(),
            None => {
                let _guard = InFlight::start(&entry.in_flight);
                entry
                    .cell
                    .get_or_try_init(|| async move { fetcher().await.map(|v| Arc::new(v) as Value) })
                    .await?
                    .clone()
            }
        };

        value
            .downcast::<T>()
            .map_err(|_| CoreError::Cache(format!("cached value for {key:?} has a different type")))
    }

    pub fn status(&self, key: &QueryKey) -> QueryStatus {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.cell.initialized() => QueryStatus::Ready,
            Some(entry) if entry.in_flight.load(Ordering::SeqCst) > 0 => QueryStatus::Loading,
            _ => QueryStatus::Idle,
        }
    }

    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key).is_some()
    }

    /// Drop every entry whose key matches `predicate`. Returns how many were dropped.
    pub fn invalidate_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&QueryKey) -> bool,
    {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|key, _| !predicate(key));
        before - entries.len()
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Number of keys with a cached value.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.values().filter(|e| e.cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}
