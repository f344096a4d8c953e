//! Region entity, its sparse update and the denormalized aggregate view.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::BTreeSet;

use super::country::{Country, CountryAssignment};
use super::shipping_option::ShippingOption;

/// A geographic/currency configuration of the store.
///
/// `gift_cards_taxable` and `automatic_taxes` default to `true`; storage
/// layers coalesce legacy NULLs to that value when reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: String,
    pub name: String,
    pub currency_code: String,
    pub tax_rate: Option<Decimal>,
    pub tax_code: Option<String>,
    pub gift_cards_taxable: bool,
    pub automatic_taxes: bool,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Region {
    /// Creates a live region with default tax flags and empty metadata.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        currency_code: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            currency_code: currency_code.into(),
            tax_rate: None,
            tax_code: None,
            gift_cards_taxable: true,
            automatic_taxes: true,
            metadata: Value::Object(Default::default()),
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    /// Returns true if the region has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Currency details joined into the region view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    pub code: String,
    pub symbol: String,
    pub symbol_native: String,
    pub name: String,
}

/// Sparse change set for a region's scalar fields.
///
/// `None` leaves a field unchanged. Nullable columns use a nested option:
/// `Some(None)` clears the value, `Some(Some(v))` sets it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionPatch {
    pub name: Option<String>,
    pub currency_code: Option<String>,
    pub tax_rate: Option<Option<Decimal>>,
    pub tax_code: Option<Option<String>>,
    pub gift_cards_taxable: Option<bool>,
    pub automatic_taxes: Option<bool>,
}

impl RegionPatch {
    /// Returns true if no field is present.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.currency_code.is_none()
            && self.tax_rate.is_none()
            && self.tax_code.is_none()
            && self.gift_cards_taxable.is_none()
            && self.automatic_taxes.is_none()
    }

    /// Applies the present fields to `region` in place.
    pub fn apply_to(&self, region: &mut Region) {
        if let Some(name) = &self.name {
            region.name = name.clone();
        }
        if let Some(currency_code) = &self.currency_code {
            region.currency_code = currency_code.clone();
        }
        if let Some(tax_rate) = self.tax_rate {
            region.tax_rate = tax_rate;
        }
        if let Some(tax_code) = &self.tax_code {
            region.tax_code = tax_code.clone();
        }
        if let Some(flag) = self.gift_cards_taxable {
            region.gift_cards_taxable = flag;
        }
        if let Some(flag) = self.automatic_taxes {
            region.automatic_taxes = flag;
        }
    }
}

/// Full update request for a region aggregate.
///
/// Each list, when `Some`, replaces the region's current membership for that
/// relation wholesale; `Some(vec![])` clears it. `None` leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionUpdate {
    pub patch: RegionPatch,
    pub fulfillment_providers: Option<Vec<String>>,
    pub payment_providers: Option<Vec<String>>,
    pub countries: Option<Vec<CountryAssignment>>,
}

impl RegionUpdate {
    /// Returns true if neither a field nor any replacement list is present.
    pub fn is_empty(&self) -> bool {
        self.patch.is_empty()
            && self.fulfillment_providers.is_none()
            && self.payment_providers.is_none()
            && self.countries.is_none()
    }
}

/// A region with all of its dependents, loaded as one consistent view.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionAggregate {
    pub region: Region,
    pub currency: Option<Currency>,
    pub fulfillment_providers: BTreeSet<String>,
    pub payment_providers: BTreeSet<String>,
    pub countries: Vec<Country>,
    pub shipping_options: Vec<ShippingOption>,
}

impl RegionAggregate {
    /// Creates an aggregate with no dependents.
    pub fn new(region: Region, currency: Option<Currency>) -> Self {
        Self {
            region,
            currency,
            fulfillment_providers: BTreeSet::new(),
            payment_providers: BTreeSet::new(),
            countries: Vec::new(),
            shipping_options: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.region.id
    }
}
