//! Handlers for region aggregate endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use validator::Validate;

use crate::api::dto::region::{RegionItem, RegionListResponse, RegionResponse};
use crate::api::dto::update_region::UpdateRegionRequest;
use crate::domain::entities::RegionUpdate;
use crate::error::AppError;
use crate::state::AppState;

/// Lists all live regions with their dependents.
///
/// # Endpoint
///
/// `GET /admin/regions`
pub async fn region_list_handler(
    State(state): State<AppState>,
) -> Result<Json<RegionListResponse>, AppError> {
    let regions = state.region_service.list_regions().await?;

    Ok(Json(RegionListResponse {
        count: regions.len(),
        regions: regions.into_iter().map(RegionItem::from).collect(),
    }))
}

/// Returns one region aggregate.
///
/// # Endpoint
///
/// `GET /admin/regions/{id}`
///
/// # Errors
///
/// Returns 404 if the region does not exist or is soft-deleted.
pub async fn get_region_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<RegionResponse>, AppError> {
    let region = state.region_service.get_region(&id).await?;

    Ok(Json(RegionResponse {
        region: region.into(),
    }))
}

/// Updates region fields and replaces provider/country lists atomically.
///
/// # Endpoint
///
/// `PUT /admin/regions/{id}`
///
/// # Errors
///
/// Returns 400 on invalid input, unknown currency or unknown provider.
/// Returns 404 if the region does not exist.
/// Returns 409 if a conflict persists after one retry.
/// Returns 503 on deadlock or statement timeout; the request may be retried.
pub async fn update_region_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateRegionRequest>,
) -> Result<Json<RegionResponse>, AppError> {
    payload.validate()?;

    let region = state
        .region_service
        .update_region(&id, RegionUpdate::from(payload))
        .await?;

    Ok(Json(RegionResponse {
        region: region.into(),
    }))
}
