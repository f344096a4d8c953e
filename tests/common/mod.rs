#![allow(dead_code)]

use axum::Router;
use axum::routing::get;
use axum_test::TestServer;
use chrono::{DateTime, TimeZone, Utc};
use region_engine::api::handlers::health_handler;
use region_engine::api::routes::admin_routes;
use region_engine::application::services::ProviderDefaults;
use region_engine::domain::entities::{Country, Region, ShippingOption};
use region_engine::infrastructure::persistence::InMemoryRegionRepository;
use region_engine::state::AppState;
use std::sync::Arc;

pub fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub fn create_test_state(store: &InMemoryRegionRepository) -> AppState {
    AppState::new(Arc::new(store.clone()), ProviderDefaults::default())
}

pub fn create_test_server(store: &InMemoryRegionRepository) -> TestServer {
    let app = Router::new()
        .route("/health", get(health_handler))
        .nest("/admin", admin_routes())
        .with_state(create_test_state(store));

    TestServer::new(app).unwrap()
}

pub async fn create_test_region(
    store: &InMemoryRegionRepository,
    id: &str,
    name: &str,
    currency_code: &str,
    created_at: DateTime<Utc>,
) {
    store
        .insert_region(Region::new(id, name, currency_code, created_at))
        .await;
}

/// Adds `count` complete shipping options named `<region_id>_so_<n>`.
pub async fn create_shipping_options(
    store: &InMemoryRegionRepository,
    region_id: &str,
    count: usize,
) -> Vec<String> {
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        let id = format!("{region_id}_so_{n}");
        let mut option = ShippingOption::new(&id, format!("Option {n}"), region_id, Utc::now());
        option.provider_id = Some("manual".to_string());
        option.profile_id = Some("sp_default".to_string());
        store.insert_shipping_option(option).await;
        ids.push(id);
    }
    ids
}

pub async fn create_test_country(
    store: &InMemoryRegionRepository,
    iso_2: &str,
    name: &str,
    region_id: Option<&str>,
) {
    store
        .insert_country(Country {
            iso_2: iso_2.to_string(),
            iso_3: format!("{iso_2}x"),
            num_code: 1,
            name: name.to_uppercase(),
            display_name: name.to_string(),
            region_id: region_id.map(str::to_string),
        })
        .await;
}

/// Region `reg_us` ("United States", usd) with manual providers and country `us`.
pub async fn create_linked_region(store: &InMemoryRegionRepository) {
    create_test_region(store, "reg_us", "United States", "usd", date(2024, 1, 1)).await;
    store.link_fulfillment("reg_us", "manual").await;
    store.link_payment("reg_us", "manual").await;
    create_test_country(store, "us", "United States", Some("reg_us")).await;
}
