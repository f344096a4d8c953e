//! Admin API route configuration.

use crate::api::handlers::{
    get_region_handler, reconcile_regions_handler, region_list_handler, repair_providers_handler,
    repair_shipping_options_handler, update_region_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Admin routes, mounted under `/admin`.
///
/// # Endpoints
///
/// - `GET  /regions`                                   - List region aggregates
/// - `GET  /regions/{id}`                              - Region aggregate view
/// - `PUT  /regions/{id}`                              - Atomic region update
/// - `POST /maintenance/reconcile-regions`             - Merge duplicate regions (`?dry_run=true` to plan)
/// - `POST /maintenance/repair-provider-associations`  - Backfill default providers
/// - `POST /maintenance/repair-shipping-options`       - Backfill shipping option defaults
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/regions", get(region_list_handler))
        .route(
            "/regions/{id}",
            get(get_region_handler).put(update_region_handler),
        )
        .route(
            "/maintenance/reconcile-regions",
            post(reconcile_regions_handler),
        )
        .route(
            "/maintenance/repair-provider-associations",
            post(repair_providers_handler),
        )
        .route(
            "/maintenance/repair-shipping-options",
            post(repair_shipping_options_handler),
        )
}
