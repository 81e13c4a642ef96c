// ═══════════════════════════════════════════════════════════════════
// Cache Tests — QueryCache fetch/dedup/failure, QueryStatus,
// InvalidationMap rules and per-holding scoping
// ═══════════════════════════════════════════════════════════════════

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use finance_tracker_core::cache::invalidation::{EntityKind, InvalidationMap};
use finance_tracker_core::cache::query_cache::{QueryCache, QueryStatus};
use finance_tracker_core::cache::query_key::{QueryKey, QueryKind};
use finance_tracker_core::errors::CoreError;

fn key(kind: QueryKind) -> QueryKey {
    QueryKey::new(kind)
}

// ═══════════════════════════════════════════════════════════════════
// QueryCache
// ═══════════════════════════════════════════════════════════════════

mod query_cache {
    use super::*;

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = QueryCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .fetch(key(QueryKind::Holdings), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, CoreError>(vec![1, 2, 3])
                })
                .await
                .unwrap();
            assert_eq!(*value, vec![1, 2, 3]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let cache = QueryCache::new();
        let k = key(QueryKind::Settings);

        let err = cache
            .fetch(k.clone(), || async {
                Err::<u32, _>(CoreError::Storage("offline".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
        assert_eq!(cache.status(&k), QueryStatus::Idle);

        let value = cache.fetch(k.clone(), || async { Ok(7u32) }).await.unwrap();
        assert_eq!(*value, 7);
        assert_eq!(cache.status(&k), QueryStatus::Ready);
    }

    #[tokio::test]
    async fn concurrent_reads_share_one_fetch() {
        let cache = Arc::new(QueryCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch(key(QueryKind::LatestPrices), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<_, CoreError>(42u64)
                    })
                    .await
                    .map(|v| *v)
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn status_reports_loading_while_in_flight() {
        let cache = Arc::new(QueryCache::new());
        let k = key(QueryKind::Valuation).in_currency("usd");
        assert_eq!(cache.status(&k), QueryStatus::Idle);

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let task = {
            let cache = cache.clone();
            let k = k.clone();
            tokio::spawn(async move {
                cache
                    .fetch(k, || async move {
                        let _ = release_rx.await;
                        Ok::<_, CoreError>("done".to_string())
                    })
                    .await
            })
        };

        // Let the spawned fetch start.
        for _ in 0..50 {
            if cache.status(&k) == QueryStatus::Loading {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(cache.status(&k), QueryStatus::Loading);

        release_tx.send(()).unwrap();
        assert_eq!(*task.await.unwrap().unwrap(), "done");
        assert_eq!(cache.status(&k), QueryStatus::Ready);
    }

    #[tokio::test]
    async fn keys_with_different_arguments_are_separate() {
        let cache = QueryCache::new();
        let usd = key(QueryKind::Valuation).in_currency("USD");
        let eur = key(QueryKind::Valuation).in_currency("EUR");
        cache.fetch(usd.clone(), || async { Ok(1u8) }).await.unwrap();
        assert_eq!(cache.status(&usd), QueryStatus::Ready);
        assert_eq!(cache.status(&eur), QueryStatus::Idle);
    }

    #[tokio::test]
    async fn type_mismatch_is_a_cache_error() {
        let cache = QueryCache::new();
        let k = key(QueryKind::Alerts);
        cache.fetch(k.clone(), || async { Ok(1u8) }).await.unwrap();
        let err = cache
            .fetch(k, || async { Ok("text".to_string()) })
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Cache(_)));
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = QueryCache::new();
        let k = key(QueryKind::Categories);
        cache.fetch(k.clone(), || async { Ok(1u8) }).await.unwrap();
        assert!(cache.invalidate(&k));
        assert!(!cache.invalidate(&k));
        let v = cache.fetch(k, || async { Ok(2u8) }).await.unwrap();
        assert_eq!(*v, 2);
    }

    #[tokio::test]
    async fn invalidate_all_clears_everything() {
        let cache = QueryCache::new();
        cache.fetch(key(QueryKind::Holdings), || async { Ok(1u8) }).await.unwrap();
        cache.fetch(key(QueryKind::Alerts), || async { Ok(1u8) }).await.unwrap();
        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// InvalidationMap
// ═══════════════════════════════════════════════════════════════════

mod invalidation_map {
    use super::*;

    async fn warm(cache: &QueryCache, keys: &[QueryKey]) {
        for k in keys {
            cache.fetch(k.clone(), || async { Ok(0u8) }).await.unwrap();
        }
    }

    #[test]
    fn rules() {
        let map = InvalidationMap::new();
        assert_eq!(
            map.affected(EntityKind::Holding),
            &[
                QueryKind::Holdings,
                QueryKind::Transactions,
                QueryKind::LatestPrices,
                QueryKind::Valuation,
                QueryKind::ValueSeries
            ]
        );
        assert_eq!(
            map.affected(EntityKind::Category),
            &[QueryKind::Categories, QueryKind::Holdings, QueryKind::Valuation]
        );
        assert_eq!(
            map.affected(EntityKind::Transaction),
            &[
                QueryKind::Transactions,
                QueryKind::Holdings,
                QueryKind::Valuation,
                QueryKind::ValueSeries
            ]
        );
        assert_eq!(
            map.affected(EntityKind::PricePoint),
            &[
                QueryKind::PriceHistory,
                QueryKind::LatestPrices,
                QueryKind::Valuation,
                QueryKind::ValueSeries
            ]
        );
        assert_eq!(map.affected(EntityKind::PriceAlert), &[QueryKind::Alerts]);
        assert_eq!(map.affected(EntityKind::Insight), &[QueryKind::Insights]);
        assert_eq!(
            map.affected(EntityKind::Settings),
            &[QueryKind::Settings, QueryKind::Valuation, QueryKind::ValueSeries]
        );
    }

    #[tokio::test]
    async fn price_point_keeps_unrelated_entries() {
        let cache = QueryCache::new();
        let map = InvalidationMap::new();
        let categories = key(QueryKind::Categories);
        let valuation = key(QueryKind::Valuation).in_currency("USD");
        warm(&cache, &[categories.clone(), valuation.clone()]).await;

        map.apply(&cache, EntityKind::PricePoint, Some(Uuid::new_v4()));
        assert_eq!(cache.status(&categories), QueryStatus::Ready);
        assert_eq!(cache.status(&valuation), QueryStatus::Idle);
    }

    #[tokio::test]
    async fn per_holding_entries_are_scoped() {
        let cache = QueryCache::new();
        let map = InvalidationMap::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let history_a = key(QueryKind::PriceHistory).for_holding(a);
        let history_b = key(QueryKind::PriceHistory).for_holding(b);
        let all_history = key(QueryKind::PriceHistory);
        warm(&cache, &[history_a.clone(), history_b.clone(), all_history.clone()]).await;

        let dropped = map.apply(&cache, EntityKind::PricePoint, Some(a));
        assert_eq!(dropped, 2);
        assert_eq!(cache.status(&history_a), QueryStatus::Idle);
        assert_eq!(cache.status(&all_history), QueryStatus::Idle);
        assert_eq!(cache.status(&history_b), QueryStatus::Ready);
    }

    #[tokio::test]
    async fn unscoped_change_drops_all_holdings_entries() {
        let cache = QueryCache::new();
        let map = InvalidationMap::new();
        let one = key(QueryKind::Holdings).for_holding(Uuid::new_v4());
        let list = key(QueryKind::Holdings);
        warm(&cache, &[one.clone(), list.clone()]).await;

        map.apply(&cache, EntityKind::Category, None);
        assert_eq!(cache.status(&one), QueryStatus::Idle);
        assert_eq!(cache.status(&list), QueryStatus::Idle);
    }

    #[tokio::test]
    async fn custom_rule_replaces_default() {
        let cache = QueryCache::new();
        let mut map = InvalidationMap::new();
        map.set_rule(EntityKind::PriceAlert, vec![QueryKind::Alerts, QueryKind::Insights]);
        let insights = key(QueryKind::Insights);
        warm(&cache, &[insights.clone()]).await;

        map.apply(&cache, EntityKind::PriceAlert, None);
        assert_eq!(cache.status(&insights), QueryStatus::Idle);
    }
}
