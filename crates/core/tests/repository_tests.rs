// ═══════════════════════════════════════════════════════════════════
// Repository Tests — LocalRepository CRUD, derived quantities,
// soft delete, read-only mode, CloudRepository placeholder
// ═══════════════════════════════════════════════════════════════════

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use finance_tracker_core::errors::CoreError;
use finance_tracker_core::models::alert::{NewPriceAlert, PriceAlertUpdate};
use finance_tracker_core::models::category::{CategoryUpdate, NewCategory};
use finance_tracker_core::models::holding::{HoldingUpdate, NewHolding};
use finance_tracker_core::models::insight::InsightRecord;
use finance_tracker_core::models::price::NewPricePoint;
use finance_tracker_core::models::snapshot::DataSnapshot;
use finance_tracker_core::models::transaction::{NewTransaction, TransactionType};
use finance_tracker_core::repository::cloud::CloudRepository;
use finance_tracker_core::repository::local::LocalRepository;
use finance_tracker_core::repository::traits::Repository;

fn days_ago(days: i64) -> chrono::DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

// ═══════════════════════════════════════════════════════════════════
// Holdings
// ═══════════════════════════════════════════════════════════════════

mod holdings {
    use super::*;

    #[tokio::test]
    async fn create_records_opening_transaction() {
        let repo = LocalRepository::new();
        let h = repo
            .create_holding(NewHolding::stock("aapl", "Apple").with_position(10.0, 1500.0))
            .await
            .unwrap();
        assert_eq!(h.symbol, "AAPL");
        assert_eq!(h.quantity, 10.0);
        assert_eq!(h.cost_basis, 1500.0);

        let txs = repo.list_transactions(Some(h.id)).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].transaction_type, TransactionType::Opening);
        assert_eq!(txs[0].price, 150.0);
    }

    #[tokio::test]
    async fn zero_quantity_holding_has_no_transactions() {
        let repo = LocalRepository::new();
        let h = repo.create_holding(NewHolding::crypto("BTC", "Bitcoin")).await.unwrap();
        assert_eq!(h.quantity, 0.0);
        assert!(repo.list_transactions(Some(h.id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_name_defaults_to_symbol() {
        let repo = LocalRepository::new();
        let h = repo.create_holding(NewHolding::stock("MSFT", "  ")).await.unwrap();
        assert_eq!(h.name, "MSFT");
    }

    #[tokio::test]
    async fn invalid_inputs_are_rejected() {
        let repo = LocalRepository::new();
        for bad in [
            NewHolding::stock("", "Nothing"),
            NewHolding::stock("AAPL", "Apple").with_position(-1.0, 0.0),
            NewHolding::stock("AAPL", "Apple").with_position(f64::NAN, 0.0),
            NewHolding::stock("AAPL", "Apple").in_currency("DOLLAR"),
            NewHolding::stock("AAPL", "Apple").with_position(0.0, 100.0),
        ] {
            assert!(matches!(
                repo.create_holding(bad).await,
                Err(CoreError::Validation(_))
            ));
        }
        assert!(repo.list_holdings(true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_category_is_not_found() {
        let repo = LocalRepository::new();
        let err = repo
            .create_holding(NewHolding::stock("AAPL", "Apple").in_category(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "Category", .. }));
    }

    #[tokio::test]
    async fn update_descriptive_fields() {
        let repo = LocalRepository::new();
        let cat = repo.create_category(NewCategory::new("Tech")).await.unwrap();
        let h = repo.create_holding(NewHolding::stock("AAPL", "Apple")).await.unwrap();

        let updated = repo
            .update_holding(
                h.id,
                HoldingUpdate {
                    name: Some("Apple Inc.".into()),
                    currency: Some("eur".into()),
                    category_id: Some(Some(cat.id)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Apple Inc.");
        assert_eq!(updated.currency, "EUR");
        assert_eq!(updated.category_id, Some(cat.id));

        let cleared = repo
            .update_holding(
                h.id,
                HoldingUpdate {
                    category_id: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.category_id, None);
    }

    #[tokio::test]
    async fn soft_delete_and_restore() {
        let repo = LocalRepository::new();
        let h = repo
            .create_holding(NewHolding::stock("AAPL", "Apple").with_position(1.0, 100.0))
            .await
            .unwrap();

        repo.delete_holding(h.id).await.unwrap();
        assert!(repo.list_holdings(false).await.unwrap().is_empty());
        assert_eq!(repo.list_holdings(true).await.unwrap().len(), 1);
        assert_eq!(repo.list_transactions(Some(h.id)).await.unwrap().len(), 1);

        let restored = repo.restore_holding(h.id).await.unwrap();
        assert!(restored.is_active());
        assert_eq!(repo.list_holdings(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn notes_are_appended() {
        let repo = LocalRepository::new();
        let h = repo.create_holding(NewHolding::stock("AAPL", "Apple")).await.unwrap();
        repo.append_holding_note(h.id, "first".into()).await.unwrap();
        let h = repo.append_holding_note(h.id, "second".into()).await.unwrap();
        let texts: Vec<&str> = h.notes.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);

        assert!(matches!(
            repo.append_holding_note(h.id, "   ".into()).await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn missing_holding_is_not_found() {
        let repo = LocalRepository::new();
        assert!(matches!(
            repo.get_holding(Uuid::new_v4()).await,
            Err(CoreError::NotFound { entity: "Holding", .. })
        ));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Categories
// ═══════════════════════════════════════════════════════════════════

mod categories {
    use super::*;

    #[tokio::test]
    async fn names_are_unique_case_insensitively() {
        let repo = LocalRepository::new();
        repo.create_category(NewCategory::new("Tech")).await.unwrap();
        assert!(matches!(
            repo.create_category(NewCategory::new("tech")).await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn cannot_be_own_parent() {
        let repo = LocalRepository::new();
        let c = repo.create_category(NewCategory::new("Tech")).await.unwrap();
        let update = CategoryUpdate {
            parent_id: Some(Some(c.id)),
            ..Default::default()
        };
        assert!(matches!(
            repo.update_category(c.id, update).await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn delete_uncategorizes_holdings_and_children() {
        let repo = LocalRepository::new();
        let parent = repo.create_category(NewCategory::new("Equities")).await.unwrap();
        let child = repo
            .create_category(NewCategory::new("US Tech").with_parent(parent.id))
            .await
            .unwrap();
        let h = repo
            .create_holding(NewHolding::stock("AAPL", "Apple").in_category(parent.id))
            .await
            .unwrap();

        repo.delete_category(parent.id).await.unwrap();

        assert_eq!(repo.get_holding(h.id).await.unwrap().category_id, None);
        assert_eq!(repo.get_category(child.id).await.unwrap().parent_id, None);
        assert_eq!(repo.list_categories().await.unwrap().len(), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Transactions
// ═══════════════════════════════════════════════════════════════════

mod transactions {
    use super::*;

    #[tokio::test]
    async fn buy_increases_quantity_and_cost() {
        let repo = LocalRepository::new();
        let h = repo
            .create_holding(NewHolding::stock("AAPL", "Apple").with_position(10.0, 50.0))
            .await
            .unwrap();
        repo.create_transaction(NewTransaction::buy(h.id, 5.0, 7.0, Utc::now()))
            .await
            .unwrap();

        let h = repo.get_holding(h.id).await.unwrap();
        assert_eq!(h.quantity, 15.0);
        assert_eq!(h.cost_basis, 85.0);
    }

    #[tokio::test]
    async fn sell_uses_average_cost() {
        let repo = LocalRepository::new();
        let h = repo
            .create_holding(NewHolding::stock("AAPL", "Apple").with_position(10.0, 100.0))
            .await
            .unwrap();
        repo.create_transaction(NewTransaction::sell(h.id, 4.0, 20.0, Utc::now()))
            .await
            .unwrap();

        let h = repo.get_holding(h.id).await.unwrap();
        assert_eq!(h.quantity, 6.0);
        assert!((h.cost_basis - 60.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn overselling_is_rejected_and_changes_nothing() {
        let repo = LocalRepository::new();
        let h = repo
            .create_holding(NewHolding::stock("AAPL", "Apple").with_position(2.0, 20.0))
            .await
            .unwrap();
        let err = repo
            .create_transaction(NewTransaction::sell(h.id, 3.0, 10.0, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert_eq!(repo.get_holding(h.id).await.unwrap().quantity, 2.0);
        assert_eq!(repo.list_transactions(Some(h.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn backdated_sell_before_funding_is_rejected() {
        let repo = LocalRepository::new();
        let h = repo.create_holding(NewHolding::stock("AAPL", "Apple")).await.unwrap();
        repo.create_transaction(NewTransaction::buy(h.id, 5.0, 10.0, days_ago(1)))
            .await
            .unwrap();
        assert!(repo
            .create_transaction(NewTransaction::sell(h.id, 1.0, 10.0, days_ago(3)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn future_and_malformed_transactions_are_rejected() {
        let repo = LocalRepository::new();
        let h = repo.create_holding(NewHolding::stock("AAPL", "Apple")).await.unwrap();
        for bad in [
            NewTransaction::buy(h.id, 0.0, 10.0, Utc::now()),
            NewTransaction::buy(h.id, 1.0, -1.0, Utc::now()),
            NewTransaction::buy(h.id, 1.0, 10.0, Utc::now() + Duration::days(5)),
        ] {
            assert!(matches!(
                repo.create_transaction(bad).await,
                Err(CoreError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn deleted_holding_rejects_transactions() {
        let repo = LocalRepository::new();
        let h = repo.create_holding(NewHolding::stock("AAPL", "Apple")).await.unwrap();
        repo.delete_holding(h.id).await.unwrap();
        assert!(matches!(
            repo.create_transaction(NewTransaction::buy(h.id, 1.0, 1.0, Utc::now()))
                .await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn delete_recomputes_and_guards_later_sells() {
        let repo = LocalRepository::new();
        let h = repo.create_holding(NewHolding::stock("AAPL", "Apple")).await.unwrap();
        let buy = repo
            .create_transaction(NewTransaction::buy(h.id, 5.0, 10.0, days_ago(3)))
            .await
            .unwrap();
        let extra = repo
            .create_transaction(NewTransaction::buy(h.id, 2.0, 10.0, days_ago(2)))
            .await
            .unwrap();
        repo.create_transaction(NewTransaction::sell(h.id, 4.0, 10.0, days_ago(1)))
            .await
            .unwrap();

        // Removing the first buy would leave the sell unfunded.
        assert!(repo.delete_transaction(buy.id).await.is_err());
        assert_eq!(repo.get_holding(h.id).await.unwrap().quantity, 3.0);

        repo.delete_transaction(extra.id).await.unwrap();
        assert_eq!(repo.get_holding(h.id).await.unwrap().quantity, 1.0);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Price points, alerts, insight records, settings
// ═══════════════════════════════════════════════════════════════════

mod prices_and_records {
    use super::*;

    #[tokio::test]
    async fn price_queries() {
        let repo = LocalRepository::new();
        let h = repo.create_holding(NewHolding::stock("AAPL", "Apple")).await.unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let t3 = Utc.with_ymd_and_hms(2025, 1, 3, 0, 0, 0).unwrap();
        for (price, at) in [(100.0, t1), (120.0, t3), (110.0, t2)] {
            repo.append_price_point(NewPricePoint::manual(h.id, price, "usd", at))
                .await
                .unwrap();
        }

        let history = repo.list_price_points(Some(h.id), None).await.unwrap();
        let prices: Vec<f64> = history.iter().map(|p| p.price).collect();
        assert_eq!(prices, vec![120.0, 110.0, 100.0]);
        assert_eq!(history[0].currency, "USD");

        assert_eq!(repo.list_price_points(Some(h.id), Some(1)).await.unwrap().len(), 1);
        assert_eq!(repo.latest_price_points().await.unwrap()[&h.id].price, 120.0);
        assert_eq!(
            repo.price_at(h.id, t2 + Duration::hours(1)).await.unwrap().unwrap().price,
            110.0
        );
        assert!(repo.price_at(h.id, t1 - Duration::hours(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn negative_price_is_rejected() {
        let repo = LocalRepository::new();
        let h = repo.create_holding(NewHolding::stock("AAPL", "Apple")).await.unwrap();
        assert!(matches!(
            repo.append_price_point(NewPricePoint::manual(h.id, -1.0, "USD", Utc::now()))
                .await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn alert_lifecycle() {
        let repo = LocalRepository::new();
        let h = repo.create_holding(NewHolding::stock("AAPL", "Apple")).await.unwrap();
        let alert = repo.create_alert(NewPriceAlert::above(h.id, 200.0)).await.unwrap();
        assert!(alert.active);

        let fired_at = Utc::now();
        let updated = repo
            .update_alert(
                alert.id,
                PriceAlertUpdate {
                    active: Some(false),
                    last_triggered_at: Some(fired_at),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.active);
        assert_eq!(updated.last_triggered_at, Some(fired_at));

        repo.delete_alert(alert.id).await.unwrap();
        assert!(repo.list_alerts(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insight_records_are_immutable() {
        let repo = LocalRepository::new();
        let record = InsightRecord {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            currency: "USD".into(),
            items: vec![],
        };
        repo.save_insight_record(record.clone()).await.unwrap();
        assert!(matches!(
            repo.save_insight_record(record.clone()).await,
            Err(CoreError::Validation(_))
        ));
        assert_eq!(repo.latest_insight_record().await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn settings_with_invalid_base_are_rejected() {
        let repo = LocalRepository::new();
        let mut settings = repo.load_settings().await.unwrap();
        settings.exchange_rates.base = "EURO".into();
        assert!(repo.save_settings(settings).await.is_err());
    }

    #[tokio::test]
    async fn settings_base_is_uppercased() {
        let repo = LocalRepository::new();
        let mut settings = repo.load_settings().await.unwrap();
        settings.exchange_rates.base = "eur".into();
        let saved = repo.save_settings(settings).await.unwrap();
        assert_eq!(saved.exchange_rates.base, "EUR");
        assert_eq!(repo.load_settings().await.unwrap().exchange_rates.base, "EUR");
    }

    #[tokio::test]
    async fn settings_with_invalid_thresholds_are_rejected() {
        let repo = LocalRepository::new();
        for bad in [f64::NAN, -5.0, 0.0] {
            let mut settings = repo.load_settings().await.unwrap();
            settings.insights.price_move_pct = bad;
            assert!(matches!(
                repo.save_settings(settings).await,
                Err(CoreError::Validation(_))
            ));
        }
        let mut settings = repo.load_settings().await.unwrap();
        settings.insights.stale_after_days = -1;
        assert!(repo.save_settings(settings).await.is_err());
        assert_eq!(repo.load_settings().await.unwrap().insights.price_move_pct, 10.0);
    }

    #[tokio::test]
    async fn replace_all_swaps_everything() {
        let repo = LocalRepository::new();
        repo.create_holding(NewHolding::stock("AAPL", "Apple")).await.unwrap();
        repo.replace_all(DataSnapshot::default()).await.unwrap();
        assert!(repo.list_holdings(true).await.unwrap().is_empty());
        assert_eq!(repo.export_snapshot().await.unwrap(), DataSnapshot::default());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Failure modes
// ═══════════════════════════════════════════════════════════════════

mod failure_modes {
    use super::*;

    #[tokio::test]
    async fn read_only_rejects_writes_but_allows_reads() {
        let repo = LocalRepository::new();
        let h = repo.create_holding(NewHolding::stock("AAPL", "Apple")).await.unwrap();
        repo.set_read_only(true);

        assert!(matches!(
            repo.create_holding(NewHolding::stock("MSFT", "Microsoft")).await,
            Err(CoreError::Storage(_))
        ));
        assert!(matches!(
            repo.append_price_point(NewPricePoint::manual(h.id, 1.0, "USD", Utc::now()))
                .await,
            Err(CoreError::Storage(_))
        ));
        assert_eq!(repo.list_holdings(false).await.unwrap().len(), 1);

        repo.set_read_only(false);
        assert!(repo.create_holding(NewHolding::stock("MSFT", "Microsoft")).await.is_ok());
    }

    #[tokio::test]
    async fn cloud_repository_is_unsupported() {
        let repo = CloudRepository::new("https://example.invalid");
        assert_eq!(repo.endpoint(), "https://example.invalid");
        assert!(matches!(
            repo.list_holdings(false).await,
            Err(CoreError::Unsupported(_))
        ));
        assert!(matches!(
            repo.replace_all(DataSnapshot::default()).await,
            Err(CoreError::Unsupported(_))
        ));
    }
}
