//! In-memory implementation of the region repository.
//!
//! Used by integration tests and the local demo server. Each mutating call
//! works on a copy of the store and swaps it in only on success, so a failed
//! call leaves no trace, matching a rolled back transaction. Foreign keys of
//! the relational schema are enforced and reported with the same error kinds
//! the PostgreSQL implementation produces.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::duplicates::no_longer_duplicates;
use crate::domain::entities::{
    Country, Currency, Region, RegionAggregate, RegionUpdate, ShippingOption,
};
use crate::domain::repositories::{
    MergeOutcome, ProviderGap, RegionRepository, RegionSummary, ShippingOptionDefaults,
};
use crate::error::AppError;

/// Full contents of the in-memory store.
///
/// Join tables are sets of `(region_id, provider_id)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    pub currencies: BTreeMap<String, Currency>,
    pub fulfillment_providers: BTreeSet<String>,
    pub payment_providers: BTreeSet<String>,
    pub shipping_profiles: BTreeSet<String>,
    pub regions: BTreeMap<String, Region>,
    pub countries: BTreeMap<String, Country>,
    pub region_fulfillment_providers: BTreeSet<(String, String)>,
    pub region_payment_providers: BTreeSet<(String, String)>,
    pub shipping_options: BTreeMap<String, ShippingOption>,
}

impl MemoryState {
    fn live_region(&self, id: &str) -> Option<&Region> {
        self.regions.get(id).filter(|r| !r.is_deleted())
    }

    fn links_of<'a>(
        links: &'a BTreeSet<(String, String)>,
        region_id: &'a str,
    ) -> impl Iterator<Item = &'a String> + 'a {
        links
            .iter()
            .filter(move |(r, _)| r == region_id)
            .map(|(_, p)| p)
    }

    fn aggregate(&self, region: &Region) -> RegionAggregate {
        let mut aggregate = RegionAggregate::new(
            region.clone(),
            self.currencies.get(&region.currency_code).cloned(),
        );
        aggregate.fulfillment_providers =
            Self::links_of(&self.region_fulfillment_providers, &region.id)
                .cloned()
                .collect();
        aggregate.payment_providers = Self::links_of(&self.region_payment_providers, &region.id)
            .cloned()
            .collect();
        aggregate.countries = self
            .countries
            .values()
            .filter(|c| c.region_id.as_deref() == Some(region.id.as_str()))
            .cloned()
            .collect();

        let mut options: Vec<ShippingOption> = self
            .shipping_options
            .values()
            .filter(|o| o.region_id == region.id && !o.is_deleted())
            .cloned()
            .collect();
        options.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        aggregate.shipping_options = options;

        aggregate
    }

    fn live_regions_oldest_first(&self) -> Vec<&Region> {
        let mut regions: Vec<&Region> = self.regions.values().filter(|r| !r.is_deleted()).collect();
        regions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        regions
    }

    fn replace_links(
        links: &mut BTreeSet<(String, String)>,
        known: &BTreeSet<String>,
        constraint: &str,
        region_id: &str,
        provider_ids: Vec<String>,
    ) -> Result<(), AppError> {
        links.retain(|(r, _)| r != region_id);
        for provider_id in provider_ids {
            if !known.contains(&provider_id) {
                return Err(reference_violation(&format!("{constraint}_provider_id_fkey")));
            }
            if !links.insert((region_id.to_string(), provider_id)) {
                return Err(unique_violation(&format!("{constraint}_pkey")));
            }
        }
        Ok(())
    }
}

fn reference_violation(constraint: &str) -> AppError {
    AppError::bad_request(
        "Referenced record does not exist",
        json!({ "constraint": constraint }),
    )
}

fn unique_violation(constraint: &str) -> AppError {
    AppError::conflict(
        "Unique constraint violation",
        json!({ "constraint": constraint }),
    )
}

/// Deterministic failures for exercising rollback and retry paths.
#[derive(Debug, Default)]
struct Faults {
    update_conflicts: usize,
    merge_failures: BTreeSet<String>,
}

/// Thread-safe in-memory region store.
///
/// Cloning shares the underlying store. Every operation holds the store lock
/// for its whole duration, which serializes all transactions.
#[derive(Clone, Default)]
pub struct InMemoryRegionRepository {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Mutex<Faults>>,
}

impl InMemoryRegionRepository {
    /// Creates an empty store without reference data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded like a freshly migrated database: five
    /// currencies, the `manual` providers and the `sp_default` profile.
    pub fn with_reference_data() -> Self {
        let mut state = MemoryState::default();
        for (code, symbol, symbol_native, name) in [
            ("usd", "$", "$", "US Dollar"),
            ("eur", "€", "€", "Euro"),
            ("gbp", "£", "£", "British Pound"),
            ("cad", "CA$", "$", "Canadian Dollar"),
            ("aud", "A$", "$", "Australian Dollar"),
        ] {
            state.currencies.insert(
                code.to_string(),
                Currency {
                    code: code.to_string(),
                    symbol: symbol.to_string(),
                    symbol_native: symbol_native.to_string(),
                    name: name.to_string(),
                },
            );
        }
        state.fulfillment_providers.insert("manual".to_string());
        state.payment_providers.insert("manual".to_string());
        state.shipping_profiles.insert("sp_default".to_string());

        Self {
            state: Arc::new(Mutex::new(state)),
            faults: Arc::default(),
        }
    }

    pub async fn insert_region(&self, region: Region) {
        let mut state = self.state.lock().await;
        state.regions.insert(region.id.clone(), region);
    }

    pub async fn insert_shipping_option(&self, option: ShippingOption) {
        let mut state = self.state.lock().await;
        state.shipping_options.insert(option.id.clone(), option);
    }

    pub async fn insert_country(&self, country: Country) {
        let mut state = self.state.lock().await;
        state.countries.insert(country.iso_2.clone(), country);
    }

    pub async fn insert_fulfillment_provider(&self, provider_id: &str) {
        let mut state = self.state.lock().await;
        state.fulfillment_providers.insert(provider_id.to_string());
    }

    pub async fn insert_payment_provider(&self, provider_id: &str) {
        let mut state = self.state.lock().await;
        state.payment_providers.insert(provider_id.to_string());
    }

    pub async fn link_fulfillment(&self, region_id: &str, provider_id: &str) {
        let mut state = self.state.lock().await;
        state
            .region_fulfillment_providers
            .insert((region_id.to_string(), provider_id.to_string()));
    }

    pub async fn link_payment(&self, region_id: &str, provider_id: &str) {
        let mut state = self.state.lock().await;
        state
            .region_payment_providers
            .insert((region_id.to_string(), provider_id.to_string()));
    }

    /// Returns a copy of the whole store.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    /// Makes the next `count` updates fail with a unique violation after all
    /// of their changes were staged.
    pub async fn fail_next_updates_with_conflict(&self, count: usize) {
        self.faults.lock().await.update_conflicts = count;
    }

    /// Makes every merge of `donor_id` abort after staging its changes.
    pub async fn fail_merges_of(&self, donor_id: &str) {
        self.faults
            .lock()
            .await
            .merge_failures
            .insert(donor_id.to_string());
    }
}

#[async_trait]
impl RegionRepository for InMemoryRegionRepository {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn find_aggregate(&self, id: &str) -> Result<Option<RegionAggregate>, AppError> {
        let state = self.state.lock().await;
        Ok(state.live_region(id).map(|region| state.aggregate(region)))
    }

    async fn list_aggregates(&self) -> Result<Vec<RegionAggregate>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .live_regions_oldest_first()
            .into_iter()
            .map(|region| state.aggregate(region))
            .collect())
    }

    async fn currency_exists(&self, code: &str) -> Result<bool, AppError> {
        Ok(self.state.lock().await.currencies.contains_key(code))
    }

    async fn apply_update(&self, id: &str, update: RegionUpdate) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if state.live_region(id).is_none() {
            return Err(AppError::not_found("Region not found", json!({ "id": id })));
        }
        if update.is_empty() {
            return Ok(());
        }

        let mut next = state.clone();
        let RegionUpdate {
            patch,
            fulfillment_providers,
            payment_providers,
            countries,
        } = update;

        if let Some(code) = &patch.currency_code
            && !next.currencies.contains_key(code)
        {
            return Err(reference_violation("region_currency_code_fkey"));
        }
        if let Some(region) = next.regions.get_mut(id) {
            patch.apply_to(region);
            region.updated_at = Utc::now();
        }

        if let Some(providers) = fulfillment_providers {
            MemoryState::replace_links(
                &mut next.region_fulfillment_providers,
                &state.fulfillment_providers,
                "region_fulfillment_providers",
                id,
                providers,
            )?;
        }
        if let Some(providers) = payment_providers {
            MemoryState::replace_links(
                &mut next.region_payment_providers,
                &state.payment_providers,
                "region_payment_providers",
                id,
                providers,
            )?;
        }

        if let Some(countries) = countries {
            for country in next.countries.values_mut() {
                if country.region_id.as_deref() == Some(id) {
                    country.region_id = None;
                }
            }
            for assignment in countries {
                match next.countries.get_mut(&assignment.iso_2) {
                    Some(existing) => existing.region_id = Some(id.to_string()),
                    None => {
                        let country = assignment.into_country(id);
                        next.countries.insert(country.iso_2.clone(), country);
                    }
                }
            }
        }

        {
            let mut faults = self.faults.lock().await;
            if faults.update_conflicts > 0 {
                faults.update_conflicts -= 1;
                return Err(unique_violation("region_pkey"));
            }
        }

        *state = next;
        Ok(())
    }

    async fn list_region_summaries(&self) -> Result<Vec<RegionSummary>, AppError> {
        let state = self.state.lock().await;
        let mut summaries: Vec<RegionSummary> = state
            .regions
            .values()
            .filter(|r| !r.is_deleted())
            .map(|r| RegionSummary {
                id: r.id.clone(),
                name: r.name.clone(),
                currency_code: r.currency_code.clone(),
                created_at: r.created_at,
                shipping_option_count: state
                    .shipping_options
                    .values()
                    .filter(|o| o.region_id == r.id && !o.is_deleted())
                    .count() as i64,
                country_count: state
                    .countries
                    .values()
                    .filter(|c| c.region_id.as_deref() == Some(r.id.as_str()))
                    .count() as i64,
            })
            .collect();
        summaries.sort_by(|a, b| {
            (&a.name, &a.currency_code, a.created_at, &a.id).cmp(&(
                &b.name,
                &b.currency_code,
                b.created_at,
                &b.id,
            ))
        });
        Ok(summaries)
    }

    async fn merge_region(
        &self,
        survivor_id: &str,
        donor_id: &str,
    ) -> Result<MergeOutcome, AppError> {
        if survivor_id == donor_id {
            return Err(AppError::bad_request(
                "Cannot merge a region into itself",
                json!({ "id": donor_id }),
            ));
        }

        let mut state = self.state.lock().await;
        let mut keys = Vec::with_capacity(2);
        for required in [survivor_id, donor_id] {
            match state.live_region(required) {
                Some(region) => keys.push((region.name.clone(), region.currency_code.clone())),
                None => {
                    return Err(AppError::not_found(
                        "Region not found",
                        json!({ "entity_id": required }),
                    ));
                }
            }
        }
        if keys[0] != keys[1] {
            return Err(no_longer_duplicates(survivor_id, donor_id));
        }

        let mut next = state.clone();
        let mut outcome = MergeOutcome::default();

        for option in next.shipping_options.values_mut() {
            if option.region_id == donor_id {
                option.region_id = survivor_id.to_string();
                option.updated_at = Utc::now();
                if !option.is_deleted() {
                    outcome.shipping_options_moved += 1;
                }
            }
        }
        for country in next.countries.values_mut() {
            if country.region_id.as_deref() == Some(donor_id) {
                country.region_id = Some(survivor_id.to_string());
                outcome.countries_moved += 1;
            }
        }
        next.region_fulfillment_providers.retain(|(r, _)| r != donor_id);
        next.region_payment_providers.retain(|(r, _)| r != donor_id);
        next.regions.remove(donor_id);

        if self.faults.lock().await.merge_failures.contains(donor_id) {
            return Err(AppError::transaction(
                "Transaction aborted, retry later",
                json!({ "retryable": true, "reason": "injected fault" }),
            ));
        }

        *state = next;
        Ok(outcome)
    }

    async fn ensure_providers(
        &self,
        fulfillment_provider_id: &str,
        payment_provider_id: &str,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        state
            .fulfillment_providers
            .insert(fulfillment_provider_id.to_string());
        state
            .payment_providers
            .insert(payment_provider_id.to_string());
        Ok(())
    }

    async fn list_provider_gaps(&self) -> Result<Vec<ProviderGap>, AppError> {
        let state = self.state.lock().await;
        Ok(state
            .live_regions_oldest_first()
            .into_iter()
            .map(|r| ProviderGap {
                region_id: r.id.clone(),
                missing_fulfillment: MemoryState::links_of(
                    &state.region_fulfillment_providers,
                    &r.id,
                )
                .next()
                .is_none(),
                missing_payment: MemoryState::links_of(&state.region_payment_providers, &r.id)
                    .next()
                    .is_none(),
            })
            .filter(|g| g.missing_fulfillment || g.missing_payment)
            .collect())
    }

    async fn link_default_fulfillment_provider(
        &self,
        region_id: &str,
        provider_id: &str,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        if !state.fulfillment_providers.contains(provider_id) {
            return Err(reference_violation(
                "region_fulfillment_providers_provider_id_fkey",
            ));
        }
        if state.live_region(region_id).is_none()
            || MemoryState::links_of(&state.region_fulfillment_providers, region_id)
                .next()
                .is_some()
        {
            return Ok(false);
        }
        Ok(state
            .region_fulfillment_providers
            .insert((region_id.to_string(), provider_id.to_string())))
    }

    async fn link_default_payment_provider(
        &self,
        region_id: &str,
        provider_id: &str,
    ) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        if !state.payment_providers.contains(provider_id) {
            return Err(reference_violation(
                "region_payment_providers_provider_id_fkey",
            ));
        }
        if state.live_region(region_id).is_none()
            || MemoryState::links_of(&state.region_payment_providers, region_id)
                .next()
                .is_some()
        {
            return Ok(false);
        }
        Ok(state
            .region_payment_providers
            .insert((region_id.to_string(), provider_id.to_string())))
    }

    async fn backfill_shipping_option_defaults(
        &self,
        defaults: &ShippingOptionDefaults,
    ) -> Result<Vec<String>, AppError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let mut repaired = Vec::new();

        for option in next.shipping_options.values_mut() {
            if option.is_deleted() || !option.needs_defaults() {
                continue;
            }
            if option.provider_id.is_none() {
                if !state.fulfillment_providers.contains(&defaults.provider_id) {
                    return Err(reference_violation("shipping_option_provider_id_fkey"));
                }
                option.provider_id = Some(defaults.provider_id.clone());
            }
            if option.profile_id.is_none() {
                if !state.shipping_profiles.contains(&defaults.profile_id) {
                    return Err(reference_violation("shipping_option_profile_id_fkey"));
                }
                option.profile_id = Some(defaults.profile_id.clone());
            }
            if option.price_type.is_none() {
                option.price_type = Some(defaults.price_type);
            }
            option.updated_at = Utc::now();
            repaired.push(option.id.clone());
        }

        *state = next;
        Ok(repaired)
    }
}
