mod common;

use region_engine::infrastructure::persistence::InMemoryRegionRepository;

#[tokio::test]
async fn test_health_endpoint_success() {
    let store = InMemoryRegionRepository::with_reference_data();
    let server = common::create_test_server(&store);

    let response = server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["database"]["status"], "ok");
}

#[tokio::test]
async fn test_health_endpoint_structure() {
    let store = InMemoryRegionRepository::new();
    let server = common::create_test_server(&store);

    let response = server.get("/health").await;

    let json = response.json::<serde_json::Value>();

    assert!(json.get("status").is_some());
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["checks"].get("database").is_some());
}
