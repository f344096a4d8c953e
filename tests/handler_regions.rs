mod common;

use axum::http::StatusCode;
use region_engine::infrastructure::persistence::InMemoryRegionRepository;
use serde_json::{Value, json};

async fn setup() -> InMemoryRegionRepository {
    let store = InMemoryRegionRepository::with_reference_data();
    store.insert_fulfillment_provider("dhl").await;
    common::create_linked_region(&store).await;
    common::create_shipping_options(&store, "reg_us", 2).await;
    store
}

#[tokio::test]
async fn test_get_region_returns_aggregate_view() {
    let store = setup().await;
    let server = common::create_test_server(&store);

    let response = server.get("/admin/regions/reg_us").await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    let region = &json["region"];
    assert_eq!(region["id"], "reg_us");
    assert_eq!(region["name"], "United States");
    assert_eq!(region["currency"]["code"], "usd");
    assert_eq!(region["currency"]["symbol"], "$");
    assert_eq!(region["gift_cards_taxable"], true);
    assert_eq!(region["fulfillment_providers"][0]["provider_id"], "manual");
    assert_eq!(region["payment_providers"][0]["provider_id"], "manual");
    assert_eq!(region["countries"][0]["iso_2"], "us");
    assert_eq!(region["shipping_options"].as_array().unwrap().len(), 2);
    assert_eq!(region["shipping_options"][0]["price_type"], "flat_rate");
}

#[tokio::test]
async fn test_get_unknown_region_is_404() {
    let store = setup().await;
    let server = common::create_test_server(&store);

    let response = server.get("/admin/regions/reg_missing").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let json = response.json::<Value>();
    assert_eq!(json["error"]["code"], "not_found");
    assert_eq!(json["error"]["details"]["id"], "reg_missing");
}

#[tokio::test]
async fn test_list_regions() {
    let store = setup().await;
    common::create_test_region(&store, "reg_eu", "Europe", "eur", common::date(2024, 5, 1))
        .await;
    let server = common::create_test_server(&store);

    let response = server.get("/admin/regions").await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["count"], 2);
    assert_eq!(json["regions"][0]["id"], "reg_us");
    assert_eq!(json["regions"][1]["id"], "reg_eu");
}

#[tokio::test]
async fn test_update_accepts_ids_and_objects() {
    let store = setup().await;
    let server = common::create_test_server(&store);

    let response = server
        .put("/admin/regions/reg_us")
        .json(&json!({
            "name": "USA",
            "tax_rate": "8.5",
            "fulfillment_providers": ["manual", { "provider_id": "dhl" }],
            "countries": ["us", { "iso_2": "pr", "name": "PUERTO RICO", "display_name": "Puerto Rico" }]
        }))
        .await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    let region = &json["region"];
    assert_eq!(region["name"], "USA");
    assert_eq!(region["tax_rate"], "8.5");
    assert_eq!(region["fulfillment_providers"].as_array().unwrap().len(), 2);
    assert_eq!(region["payment_providers"][0]["provider_id"], "manual");
    assert_eq!(region["countries"][0]["iso_2"], "pr");
    assert_eq!(region["countries"][0]["display_name"], "Puerto Rico");
    assert_eq!(region["countries"][1]["iso_2"], "us");
}

#[tokio::test]
async fn test_null_clears_nullable_field() {
    let store = setup().await;
    let server = common::create_test_server(&store);

    server
        .put("/admin/regions/reg_us")
        .json(&json!({ "tax_code": "US-STD" }))
        .await
        .assert_status_ok();

    let response = server
        .put("/admin/regions/reg_us")
        .json(&json!({ "tax_code": null }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["region"]["tax_code"], Value::Null);
}

#[tokio::test]
async fn test_unknown_currency_is_rejected() {
    let store = setup().await;
    let server = common::create_test_server(&store);

    let response = server
        .put("/admin/regions/reg_us")
        .json(&json!({ "currency_code": "xyz" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json = response.json::<Value>();
    assert_eq!(json["error"]["code"], "validation_error");
    assert_eq!(json["error"]["details"]["currency_code"], "xyz");
}

#[tokio::test]
async fn test_unknown_provider_rolls_back_whole_update() {
    let store = setup().await;
    let server = common::create_test_server(&store);

    let response = server
        .put("/admin/regions/reg_us")
        .json(&json!({
            "name": "Changed",
            "payment_providers": ["nope"]
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    let json = server.get("/admin/regions/reg_us").await.json::<Value>();
    assert_eq!(json["region"]["name"], "United States");
    assert_eq!(json["region"]["payment_providers"][0]["provider_id"], "manual");
}

#[tokio::test]
async fn test_invalid_payload_is_rejected() {
    let store = setup().await;
    let server = common::create_test_server(&store);

    let response = server
        .put("/admin/regions/reg_us")
        .json(&json!({ "currency_code": "dollars" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let json = response.json::<Value>();
    assert_eq!(json["error"]["details"]["fields"][0], "currency_code");
}

#[tokio::test]
async fn test_update_unknown_region_is_404() {
    let store = setup().await;
    let server = common::create_test_server(&store);

    let response = server
        .put("/admin/regions/reg_missing")
        .json(&json!({ "name": "Ghost" }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_currency_code_is_trimmed_before_validation() {
    let store = setup().await;
    let server = common::create_test_server(&store);

    let response = server
        .put("/admin/regions/reg_us")
        .json(&json!({ "currency_code": " EUR " }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["region"]["currency_code"], "eur");
}
