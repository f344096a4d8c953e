mod common;

use chrono::Utc;
use common::{create_test_region, date};
use region_engine::application::services::{ProviderDefaults, RepairService};
use region_engine::domain::entities::{PriceType, ShippingOption};
use region_engine::infrastructure::persistence::InMemoryRegionRepository;
use std::sync::Arc;

#[tokio::test]
async fn test_repair_is_idempotent() {
    let store = InMemoryRegionRepository::with_reference_data();
    create_test_region(&store, "reg_bare", "Nordics", "eur", date(2024, 1, 1)).await;
    create_test_region(&store, "reg_half", "Oceania", "aud", date(2024, 1, 2)).await;
    store.link_fulfillment("reg_half", "manual").await;
    common::create_linked_region(&store).await;
    let state = common::create_test_state(&store);

    let first = state
        .repair_service
        .repair_provider_associations()
        .await
        .unwrap();
    let after_first = store.snapshot().await;

    let second = state
        .repair_service
        .repair_provider_associations()
        .await
        .unwrap();

    assert_eq!(first.regions_repaired, 2);
    assert_eq!(second.regions_repaired, 0);
    assert_eq!(store.snapshot().await, after_first);

    for region_id in ["reg_bare", "reg_half", "reg_us"] {
        let aggregate = state.region_service.get_region(region_id).await.unwrap();
        assert!(!aggregate.fulfillment_providers.is_empty(), "{region_id}");
        assert!(!aggregate.payment_providers.is_empty(), "{region_id}");
    }
}

#[tokio::test]
async fn test_existing_associations_are_not_replaced() {
    let store = InMemoryRegionRepository::with_reference_data();
    store.insert_payment_provider("stripe").await;
    create_test_region(&store, "reg_eu", "EU", "eur", date(2024, 1, 1)).await;
    store.link_payment("reg_eu", "stripe").await;
    let state = common::create_test_state(&store);

    state
        .repair_service
        .repair_provider_associations()
        .await
        .unwrap();

    let aggregate = state.region_service.get_region("reg_eu").await.unwrap();
    assert_eq!(
        aggregate.payment_providers.iter().collect::<Vec<_>>(),
        vec!["stripe"]
    );
    assert_eq!(
        aggregate.fulfillment_providers.iter().collect::<Vec<_>>(),
        vec!["manual"]
    );
}

#[tokio::test]
async fn test_configured_defaults_are_created_when_missing() {
    let store = InMemoryRegionRepository::new();
    create_test_region(&store, "reg_x", "X", "usd", date(2024, 1, 1)).await;
    let defaults = ProviderDefaults {
        fulfillment_provider_id: "warehouse".to_string(),
        payment_provider_id: "invoice".to_string(),
        ..Default::default()
    };
    let service = RepairService::new(Arc::new(store.clone()), defaults);

    let report = service.repair_provider_associations().await.unwrap();

    assert_eq!(report.regions_repaired, 1);
    let snapshot = store.snapshot().await;
    assert!(snapshot.fulfillment_providers.contains("warehouse"));
    assert!(snapshot.payment_providers.contains("invoice"));
    assert!(
        snapshot
            .region_fulfillment_providers
            .contains(&("reg_x".to_string(), "warehouse".to_string()))
    );
}

#[tokio::test]
async fn test_shipping_option_defaults_are_backfilled_once() {
    let store = InMemoryRegionRepository::with_reference_data();
    common::create_linked_region(&store).await;

    let mut incomplete = ShippingOption::new("so_incomplete", "Standard", "reg_us", Utc::now());
    incomplete.price_type = None;
    store.insert_shipping_option(incomplete).await;

    let mut complete = ShippingOption::new("so_complete", "Express", "reg_us", Utc::now());
    complete.provider_id = Some("manual".to_string());
    complete.profile_id = Some("sp_default".to_string());
    store.insert_shipping_option(complete.clone()).await;

    let mut deleted = ShippingOption::new("so_deleted", "Old", "reg_us", Utc::now());
    deleted.deleted_at = Some(Utc::now());
    store.insert_shipping_option(deleted).await;

    let state = common::create_test_state(&store);

    let first = state
        .repair_service
        .repair_shipping_option_defaults()
        .await
        .unwrap();
    let second = state
        .repair_service
        .repair_shipping_option_defaults()
        .await
        .unwrap();

    assert_eq!(first.option_ids, vec!["so_incomplete"]);
    assert_eq!(second.options_repaired, 0);

    let snapshot = store.snapshot().await;
    let repaired = &snapshot.shipping_options["so_incomplete"];
    assert_eq!(repaired.provider_id.as_deref(), Some("manual"));
    assert_eq!(repaired.profile_id.as_deref(), Some("sp_default"));
    assert_eq!(repaired.price_type, Some(PriceType::FlatRate));
    assert_eq!(snapshot.shipping_options["so_complete"], complete);
    assert_eq!(snapshot.shipping_options["so_deleted"].provider_id, None);
}

#[tokio::test]
async fn test_unknown_shipping_profile_is_rejected() {
    let store = InMemoryRegionRepository::with_reference_data();
    common::create_linked_region(&store).await;
    store
        .insert_shipping_option(ShippingOption::new(
            "so_1",
            "Standard",
            "reg_us",
            Utc::now(),
        ))
        .await;
    let defaults = ProviderDefaults {
        shipping_profile_id: "sp_missing".to_string(),
        ..Default::default()
    };
    let service = RepairService::new(Arc::new(store.clone()), defaults);
    let before = store.snapshot().await;

    let err = service.repair_shipping_option_defaults().await.unwrap_err();

    assert_eq!(err.code(), "validation_error");
    assert_eq!(store.snapshot().await, before);
}
