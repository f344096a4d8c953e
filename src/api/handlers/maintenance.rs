//! Handlers for maintenance endpoints.

use axum::{
    Json,
    extract::{Query, State},
};

use crate::api::dto::maintenance::{
    ProviderRepairResponse, ReconcileQuery, ReconcileResponse, ShippingOptionRepairResponse,
};
use crate::error::AppError;
use crate::state::AppState;

/// Merges duplicate regions sharing a name and currency.
///
/// # Endpoint
///
/// `POST /admin/maintenance/reconcile-regions?dry_run=true`
///
/// Always 200 once the duplicate scan succeeded; per-donor failures are
/// listed in `failures` next to the merged groups.
pub async fn reconcile_regions_handler(
    State(state): State<AppState>,
    Query(query): Query<ReconcileQuery>,
) -> Result<Json<ReconcileResponse>, AppError> {
    let report = state.reconcile_service.reconcile(query.dry_run).await?;
    Ok(Json(report.into()))
}

/// Backfills default provider associations.
///
/// # Endpoint
///
/// `POST /admin/maintenance/repair-provider-associations`
pub async fn repair_providers_handler(
    State(state): State<AppState>,
) -> Result<Json<ProviderRepairResponse>, AppError> {
    let report = state.repair_service.repair_provider_associations().await?;
    Ok(Json(report.into()))
}

/// Backfills missing provider, price type and profile on shipping options.
///
/// # Endpoint
///
/// `POST /admin/maintenance/repair-shipping-options`
pub async fn repair_shipping_options_handler(
    State(state): State<AppState>,
) -> Result<Json<ShippingOptionRepairResponse>, AppError> {
    let report = state.repair_service.repair_shipping_option_defaults().await?;
    Ok(Json(report.into()))
}
