mod common;

use chrono::{DateTime, Utc};
use common::date;
use region_engine::domain::entities::{CountryAssignment, PriceType, RegionPatch, RegionUpdate};
use region_engine::domain::repositories::{RegionRepository, ShippingOptionDefaults};
use region_engine::error::AppError;
use region_engine::infrastructure::persistence::PgRegionRepository;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;

async fn create_region(pool: &PgPool, id: &str, name: &str, created_at: DateTime<Utc>) {
    sqlx::query(
        "INSERT INTO region (id, name, currency_code, created_at) VALUES ($1, $2, 'usd', $3)",
    )
    .bind(id)
    .bind(name)
    .bind(created_at)
    .execute(pool)
    .await
    .unwrap();
}

async fn create_shipping_options(pool: &PgPool, region_id: &str, count: usize) {
    for n in 0..count {
        sqlx::query(
            "INSERT INTO shipping_option (id, name, region_id, provider_id, profile_id, price_type)
             VALUES ($1, $2, $3, 'manual', 'sp_default', 'flat_rate')",
        )
        .bind(format!("{region_id}_so_{n}"))
        .bind(format!("Option {n}"))
        .bind(region_id)
        .execute(pool)
        .await
        .unwrap();
    }
}

async fn count(pool: &PgPool, sql: &str, region_id: &str) -> i64 {
    sqlx::query_scalar(sql)
        .bind(region_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn repo(pool: PgPool) -> PgRegionRepository {
    PgRegionRepository::new(Arc::new(pool))
}

#[sqlx::test]
async fn test_find_aggregate_joins_currency_and_dependents(pool: PgPool) {
    create_region(&pool, "reg_us", "US", date(2024, 1, 1)).await;
    create_shipping_options(&pool, "reg_us", 2).await;
    sqlx::query("INSERT INTO region_fulfillment_providers VALUES ('reg_us', 'manual')")
        .execute(&pool)
        .await
        .unwrap();

    let aggregate = repo(pool).find_aggregate("reg_us").await.unwrap().unwrap();

    assert_eq!(aggregate.currency.unwrap().name, "US Dollar");
    assert!(aggregate.fulfillment_providers.contains("manual"));
    assert!(aggregate.payment_providers.is_empty());
    assert_eq!(aggregate.shipping_options.len(), 2);
    assert_eq!(
        aggregate.shipping_options[0].price_type,
        Some(PriceType::FlatRate)
    );
}

#[sqlx::test]
async fn test_soft_deleted_region_is_not_found(pool: PgPool) {
    create_region(&pool, "reg_gone", "Gone", date(2024, 1, 1)).await;
    sqlx::query("UPDATE region SET deleted_at = NOW() WHERE id = 'reg_gone'")
        .execute(&pool)
        .await
        .unwrap();

    let result = repo(pool).find_aggregate("reg_gone").await.unwrap();

    assert!(result.is_none());
}

#[sqlx::test]
async fn test_apply_update_replaces_lists(pool: PgPool) {
    create_region(&pool, "reg_us", "US", date(2024, 1, 1)).await;
    let repo = repo(pool.clone());

    let update = RegionUpdate {
        patch: RegionPatch {
            name: Some("USA".to_string()),
            tax_rate: Some(Some(Decimal::new(725, 2))),
            ..Default::default()
        },
        fulfillment_providers: Some(vec!["manual".to_string()]),
        payment_providers: Some(vec!["manual".to_string()]),
        countries: Some(vec![CountryAssignment::code("us")]),
    };

    repo.apply_update("reg_us", update.clone()).await.unwrap();
    repo.apply_update("reg_us", update).await.unwrap();

    let aggregate = repo.find_aggregate("reg_us").await.unwrap().unwrap();
    assert_eq!(aggregate.region.name, "USA");
    assert_eq!(aggregate.region.tax_rate, Some(Decimal::new(725, 2)));
    assert_eq!(aggregate.fulfillment_providers.len(), 1);
    assert_eq!(aggregate.countries.len(), 1);
    assert_eq!(aggregate.countries[0].name, "us");
}

#[sqlx::test]
async fn test_apply_update_rolls_back_on_unknown_provider(pool: PgPool) {
    create_region(&pool, "reg_us", "US", date(2024, 1, 1)).await;
    let repo = repo(pool.clone());

    let update = RegionUpdate {
        patch: RegionPatch {
            name: Some("Changed".to_string()),
            ..Default::default()
        },
        fulfillment_providers: Some(vec!["manual".to_string()]),
        payment_providers: Some(vec!["nope".to_string()]),
        ..Default::default()
    };

    let err = repo.apply_update("reg_us", update).await.unwrap_err();

    assert!(matches!(err, AppError::Validation { .. }));
    let aggregate = repo.find_aggregate("reg_us").await.unwrap().unwrap();
    assert_eq!(aggregate.region.name, "US");
    assert!(aggregate.fulfillment_providers.is_empty());
}

#[sqlx::test]
async fn test_merge_region_moves_dependents(pool: PgPool) {
    create_region(&pool, "reg_a", "US", date(2024, 1, 1)).await;
    create_region(&pool, "reg_b", "US", date(2024, 2, 1)).await;
    create_shipping_options(&pool, "reg_a", 3).await;
    create_shipping_options(&pool, "reg_b", 3).await;
    sqlx::query(
        "INSERT INTO country (iso_2, iso_3, num_code, name, display_name, region_id)
         VALUES ('us', 'usa', 840, 'UNITED STATES', 'United States', 'reg_b')",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO region_payment_providers VALUES ('reg_b', 'manual')")
        .execute(&pool)
        .await
        .unwrap();
    let repo = repo(pool.clone());

    let summaries = repo.list_region_summaries().await.unwrap();
    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.shipping_option_count == 3));

    let outcome = repo.merge_region("reg_a", "reg_b").await.unwrap();

    assert_eq!(outcome.shipping_options_moved, 3);
    assert_eq!(outcome.countries_moved, 1);
    assert_eq!(
        count(
            &pool,
            "SELECT COUNT(*) FROM shipping_option WHERE region_id = $1",
            "reg_a"
        )
        .await,
        6
    );
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM region WHERE id = $1", "reg_b").await,
        0
    );
    assert_eq!(
        count(
            &pool,
            "SELECT COUNT(*) FROM region_payment_providers WHERE region_id = $1",
            "reg_b"
        )
        .await,
        0
    );
}

#[sqlx::test]
async fn test_merge_missing_donor_is_not_found(pool: PgPool) {
    create_region(&pool, "reg_a", "US", date(2024, 1, 1)).await;

    let err = repo(pool).merge_region("reg_a", "reg_missing").await.unwrap_err();

    assert!(matches!(err, AppError::NotFound { .. }));
    assert_eq!(err.to_error_info().details["entity_id"], "reg_missing");
}

#[sqlx::test]
async fn test_default_links_are_only_added_once(pool: PgPool) {
    create_region(&pool, "reg_a", "US", date(2024, 1, 1)).await;
    let repo = repo(pool);

    repo.ensure_providers("manual", "manual").await.unwrap();
    let gaps = repo.list_provider_gaps().await.unwrap();
    assert_eq!(gaps.len(), 1);
    assert!(gaps[0].missing_fulfillment && gaps[0].missing_payment);

    assert!(
        repo.link_default_fulfillment_provider("reg_a", "manual")
            .await
            .unwrap()
    );
    assert!(
        !repo
            .link_default_fulfillment_provider("reg_a", "manual")
            .await
            .unwrap()
    );
}

#[sqlx::test]
async fn test_backfill_shipping_option_defaults(pool: PgPool) {
    create_region(&pool, "reg_a", "US", date(2024, 1, 1)).await;
    sqlx::query("INSERT INTO shipping_option (id, name, region_id) VALUES ('so_bare', 'Bare', 'reg_a')")
        .execute(&pool)
        .await
        .unwrap();
    let repo = repo(pool);

    let defaults = ShippingOptionDefaults {
        provider_id: "manual".to_string(),
        price_type: PriceType::FlatRate,
        profile_id: "sp_default".to_string(),
    };

    let first = repo.backfill_shipping_option_defaults(&defaults).await.unwrap();
    let second = repo.backfill_shipping_option_defaults(&defaults).await.unwrap();

    assert_eq!(first, vec!["so_bare"]);
    assert!(second.is_empty());
}

#[sqlx::test]
async fn test_merge_refuses_regions_that_no_longer_match(pool: PgPool) {
    create_region(&pool, "reg_a", "US", date(2024, 1, 1)).await;
    create_region(&pool, "reg_b", "US", date(2024, 2, 1)).await;
    create_shipping_options(&pool, "reg_b", 2).await;
    let repo = repo(pool.clone());

    let rename = RegionUpdate {
        patch: RegionPatch {
            name: Some("Canada".to_string()),
            currency_code: Some("cad".to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    repo.apply_update("reg_b", rename).await.unwrap();

    let err = repo.merge_region("reg_a", "reg_b").await.unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM region WHERE id = $1", "reg_b").await,
        1
    );
    assert_eq!(
        count(
            &pool,
            "SELECT COUNT(*) FROM shipping_option WHERE region_id = $1",
            "reg_b"
        )
        .await,
        2
    );
}

#[sqlx::test]
async fn test_concurrent_updates_apply_one_whole_update_at_a_time(pool: PgPool) {
    create_region(&pool, "reg_us", "US", date(2024, 1, 1)).await;
    sqlx::query("INSERT INTO fulfillment_provider (id, is_installed) VALUES ('dhl', TRUE)")
        .execute(&pool)
        .await
        .unwrap();
    let repo = repo(pool);

    let first = RegionUpdate {
        patch: RegionPatch {
            name: Some("First".to_string()),
            ..Default::default()
        },
        fulfillment_providers: Some(vec!["manual".to_string()]),
        countries: Some(vec![CountryAssignment::code("us")]),
        ..Default::default()
    };
    let second = RegionUpdate {
        patch: RegionPatch {
            name: Some("Second".to_string()),
            ..Default::default()
        },
        fulfillment_providers: Some(vec!["dhl".to_string()]),
        countries: Some(vec![CountryAssignment::code("ca")]),
        ..Default::default()
    };

    let (a, b) = tokio::join!(
        repo.apply_update("reg_us", first),
        repo.apply_update("reg_us", second)
    );
    a.unwrap();
    b.unwrap();

    let aggregate = repo.find_aggregate("reg_us").await.unwrap().unwrap();
    let providers: Vec<&String> = aggregate.fulfillment_providers.iter().collect();
    let expected = match aggregate.region.name.as_str() {
        "First" => ("manual", "us"),
        "Second" => ("dhl", "ca"),
        other => panic!("unexpected name {other}"),
    };
    assert_eq!(providers, vec![expected.0]);
    assert_eq!(aggregate.countries.len(), 1);
    assert_eq!(aggregate.countries[0].iso_2, expected.1);
}
