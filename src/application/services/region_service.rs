//! Region aggregate reads and atomic updates.

use crate::domain::entities::{CountryAssignment, RegionAggregate, RegionUpdate};
use crate::domain::repositories::RegionRepository;
use crate::error::AppError;
use crate::utils::codes::{
    normalize_currency_code, normalize_iso_2, normalize_iso_3, normalize_provider_ids,
};
use crate::utils::retry::retry_once_on_conflict;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;

const MAX_NAME_LENGTH: usize = 255;

/// Service for reading and updating region aggregates.
///
/// Updates are validated in full before the repository is touched, then
/// applied in one transaction. A unique-key conflict is retried once with a
/// fresh transaction.
pub struct RegionService<R: RegionRepository + ?Sized> {
    repository: Arc<R>,
}

impl<R: RegionRepository + ?Sized> RegionService<R> {
    /// Creates a new region service.
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Loads the aggregate view of a live region.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the region does not exist or is soft-deleted.
    /// Returns [`AppError::Internal`] on database errors.
    pub async fn get_region(&self, id: &str) -> Result<RegionAggregate, AppError> {
        self.repository
            .find_aggregate(id)
            .await
            .map_err(|e| e.context("get_region", id))?
            .ok_or_else(|| AppError::not_found("Region not found", json!({ "id": id })))
    }

    /// Lists all live region aggregates, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    pub async fn list_regions(&self) -> Result<Vec<RegionAggregate>, AppError> {
        self.repository
            .list_aggregates()
            .await
            .map_err(|e| e.context("list_regions", "*"))
    }

    /// Applies a sparse field update plus optional replacement lists to a
    /// region, atomically, and returns the reloaded aggregate.
    ///
    /// # Validation
    ///
    /// - `name` must not be blank and at most 255 characters
    /// - `currency_code` must be three letters and a known currency
    /// - `tax_rate` must be within 0..=100
    /// - provider ids must not be blank; repeats are collapsed
    /// - country `iso_2` must be two letters; repeats are collapsed
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if validation fails or a provider is unknown.
    /// Returns [`AppError::NotFound`] if the region does not exist, or vanished
    /// before the reload.
    /// Returns [`AppError::Conflict`] if a unique violation survives the retry.
    /// Returns [`AppError::Transaction`] on deadlock or timeout.
    pub async fn update_region(
        &self,
        id: &str,
        update: RegionUpdate,
    ) -> Result<RegionAggregate, AppError> {
        let update = self
            .validate(update)
            .await
            .map_err(|e| e.context("update_region", id))?;

        let replaces = [
            update.fulfillment_providers.is_some(),
            update.payment_providers.is_some(),
            update.countries.is_some(),
        ];

        retry_once_on_conflict(|| {
            let update = update.clone();
            async move { self.repository.apply_update(id, update).await }
        })
        .await
        .map_err(|e| e.context("update_region", id))?;

        tracing::info!(
            region_id = %id,
            fields = !update.patch.is_empty(),
            fulfillment_providers = replaces[0],
            payment_providers = replaces[1],
            countries = replaces[2],
            "Region updated"
        );

        self.repository
            .find_aggregate(id)
            .await
            .map_err(|e| e.context("update_region", id))?
            .ok_or_else(|| {
                AppError::not_found(
                    "Region disappeared during update",
                    json!({ "id": id, "race": true }),
                )
            })
    }

    /// Normalizes and checks an update before any mutation happens.
    async fn validate(&self, mut update: RegionUpdate) -> Result<RegionUpdate, AppError> {
        if let Some(name) = update.patch.name.take() {
            let name = name.trim().to_string();
            if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
                return Err(AppError::bad_request(
                    "Invalid region name length",
                    json!({ "min": 1, "max": MAX_NAME_LENGTH }),
                ));
            }
            update.patch.name = Some(name);
        }

        if let Some(code) = update.patch.currency_code.take() {
            let code = normalize_currency_code(&code)?;
            if !self.repository.currency_exists(&code).await? {
                return Err(AppError::bad_request(
                    "Unknown currency code",
                    json!({ "currency_code": code }),
                ));
            }
            update.patch.currency_code = Some(code);
        }

        if let Some(Some(rate)) = update.patch.tax_rate
            && (rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED)
        {
            return Err(AppError::bad_request(
                "Tax rate must be between 0 and 100",
                json!({ "tax_rate": rate.to_string() }),
            ));
        }

        if let Some(Some(code)) = update.patch.tax_code.as_mut() {
            *code = code.trim().to_string();
        }

        if let Some(ids) = update.fulfillment_providers.take() {
            update.fulfillment_providers = Some(normalize_provider_ids("fulfillment_providers", ids)?);
        }
        if let Some(ids) = update.payment_providers.take() {
            update.payment_providers = Some(normalize_provider_ids("payment_providers", ids)?);
        }

        if let Some(countries) = update.countries.take() {
            update.countries = Some(normalize_countries(countries)?);
        }

        Ok(update)
    }
}

fn normalize_countries(
    countries: Vec<CountryAssignment>,
) -> Result<Vec<CountryAssignment>, AppError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(countries.len());

    for mut country in countries {
        country.iso_2 = normalize_iso_2(&country.iso_2)?;
        if let Some(iso_3) = country.iso_3.take() {
            country.iso_3 = Some(normalize_iso_3(&iso_3)?);
        }
        if seen.insert(country.iso_2.clone()) {
            out.push(country);
        }
    }

    Ok(out)
}
