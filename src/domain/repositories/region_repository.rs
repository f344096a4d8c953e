//! Repository trait for the region aggregate.

use crate::domain::entities::{PriceType, RegionAggregate, RegionUpdate};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Per-region counts used by duplicate detection.
///
/// Counts include non-deleted dependents only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSummary {
    pub id: String,
    pub name: String,
    pub currency_code: String,
    pub created_at: DateTime<Utc>,
    pub shipping_option_count: i64,
    pub country_count: i64,
}

/// Rows reassigned from a donor region to its survivor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Live shipping options moved. Soft-deleted ones move too but are not counted.
    pub shipping_options_moved: u64,
    pub countries_moved: u64,
}

/// A live region lacking provider associations of one or both kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderGap {
    pub region_id: String,
    pub missing_fulfillment: bool,
    pub missing_payment: bool,
}

/// Values written into shipping options that lack them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingOptionDefaults {
    pub provider_id: String,
    pub price_type: PriceType,
    pub profile_id: String,
}

/// Repository interface for regions and their dependents.
///
/// Every mutating method runs in its own transaction: either all of its
/// effects are visible after it returns `Ok`, or none are.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgRegionRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::InMemoryRegionRepository`] - in-process store
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/region_update.rs`, `tests/region_reconcile.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegionRepository: Send + Sync {
    /// Checks that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transaction`] or [`AppError::Internal`] if it is not.
    async fn ping(&self) -> Result<(), AppError>;

    /// Loads a non-deleted region with its currency, provider sets, countries
    /// and live shipping options from one consistent snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_aggregate(&self, id: &str) -> Result<Option<RegionAggregate>, AppError>;

    /// Loads every non-deleted region aggregate, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn list_aggregates(&self) -> Result<Vec<RegionAggregate>, AppError>;

    /// Returns true if the currency code is known.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn currency_exists(&self, code: &str) -> Result<bool, AppError>;

    /// Applies a sparse field update and the supplied replacement lists in one
    /// transaction, holding the region row lock for its duration.
    ///
    /// Input is expected to be validated and normalized already.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the region is missing or soft-deleted.
    /// Returns [`AppError::Validation`] if a referenced provider or currency is unknown.
    /// Returns [`AppError::Conflict`] on a unique violation outside the upsert paths.
    /// Returns [`AppError::Transaction`] on deadlock or statement timeout.
    async fn apply_update(&self, id: &str, update: RegionUpdate) -> Result<(), AppError>;

    /// Lists every non-deleted region with its dependent counts.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn list_region_summaries(&self) -> Result<Vec<RegionSummary>, AppError>;

    /// Moves all shipping options and countries of `donor_id` to
    /// `survivor_id`, drops the donor's provider associations and hard-deletes
    /// the donor, in one transaction with both rows locked.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if either region is missing.
    /// Returns [`AppError::Conflict`] if the locked rows no longer share a
    /// `(name, currency_code)` key; nothing is changed.
    /// Returns [`AppError::Validation`] if survivor and donor are the same region.
    /// Returns [`AppError::Transaction`] on deadlock or statement timeout.
    async fn merge_region(&self, survivor_id: &str, donor_id: &str)
    -> Result<MergeOutcome, AppError>;

    /// Makes sure the given provider ids exist in the provider tables.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn ensure_providers(
        &self,
        fulfillment_provider_id: &str,
        payment_provider_id: &str,
    ) -> Result<(), AppError>;

    /// Lists live regions with no fulfillment or no payment provider association.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn list_provider_gaps(&self) -> Result<Vec<ProviderGap>, AppError>;

    /// Associates `provider_id` with the region if the region has no
    /// fulfillment provider at all. Returns true if a row was inserted.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the provider is unknown.
    /// Returns [`AppError::Internal`] on database errors.
    async fn link_default_fulfillment_provider(
        &self,
        region_id: &str,
        provider_id: &str,
    ) -> Result<bool, AppError>;

    /// Payment-provider counterpart of
    /// [`RegionRepository::link_default_fulfillment_provider`].
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the provider is unknown.
    /// Returns [`AppError::Internal`] on database errors.
    async fn link_default_payment_provider(
        &self,
        region_id: &str,
        provider_id: &str,
    ) -> Result<bool, AppError>;

    /// Fills missing `provider_id`, `price_type` and `profile_id` on live
    /// shipping options. Returns the ids of the options that changed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if a default references an unknown row.
    /// Returns [`AppError::Internal`] on database errors.
    async fn backfill_shipping_option_defaults(
        &self,
        defaults: &ShippingOptionDefaults,
    ) -> Result<Vec<String>, AppError>;
}
