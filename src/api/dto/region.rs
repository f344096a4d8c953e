//! DTOs for region aggregate responses.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::domain::entities::{Country, Currency, RegionAggregate, ShippingOption};

/// Currency details joined into a region.
#[derive(Debug, Serialize)]
pub struct CurrencyItem {
    pub code: String,
    pub symbol: String,
    pub symbol_native: String,
    pub name: String,
}

impl From<Currency> for CurrencyItem {
    fn from(c: Currency) -> Self {
        Self {
            code: c.code,
            symbol: c.symbol,
            symbol_native: c.symbol_native,
            name: c.name,
        }
    }
}

/// One provider association.
#[derive(Debug, Serialize)]
pub struct ProviderItem {
    pub provider_id: String,
}

#[derive(Debug, Serialize)]
pub struct CountryItem {
    pub iso_2: String,
    pub iso_3: String,
    pub num_code: i32,
    pub name: String,
    pub display_name: String,
    pub region_id: Option<String>,
}

impl From<Country> for CountryItem {
    fn from(c: Country) -> Self {
        Self {
            iso_2: c.iso_2,
            iso_3: c.iso_3,
            num_code: c.num_code,
            name: c.name,
            display_name: c.display_name,
            region_id: c.region_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShippingOptionItem {
    pub id: String,
    pub name: String,
    pub region_id: String,
    pub profile_id: Option<String>,
    pub provider_id: Option<String>,
    pub price_type: Option<&'static str>,
    pub amount: Option<i64>,
    pub is_return: bool,
    pub admin_only: bool,
    pub requirements: Vec<Value>,
    pub data: Value,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ShippingOption> for ShippingOptionItem {
    fn from(o: ShippingOption) -> Self {
        Self {
            id: o.id,
            name: o.name,
            region_id: o.region_id,
            profile_id: o.profile_id,
            provider_id: o.provider_id,
            price_type: o.price_type.map(|p| p.as_str()),
            amount: o.amount,
            is_return: o.is_return,
            admin_only: o.admin_only,
            requirements: o.requirements,
            data: o.data,
            metadata: o.metadata,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

/// Denormalized region view.
///
/// `tax_rate` is serialized as a decimal string to keep its precision.
#[derive(Debug, Serialize)]
pub struct RegionItem {
    pub id: String,
    pub name: String,
    pub currency_code: String,
    pub currency: Option<CurrencyItem>,
    pub tax_rate: Option<Decimal>,
    pub tax_code: Option<String>,
    pub gift_cards_taxable: bool,
    pub automatic_taxes: bool,
    pub fulfillment_providers: Vec<ProviderItem>,
    pub payment_providers: Vec<ProviderItem>,
    pub countries: Vec<CountryItem>,
    pub shipping_options: Vec<ShippingOptionItem>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<RegionAggregate> for RegionItem {
    fn from(a: RegionAggregate) -> Self {
        let to_items = |ids: BTreeSet<String>| -> Vec<ProviderItem> {
            ids.into_iter()
                .map(|provider_id| ProviderItem { provider_id })
                .collect()
        };

        Self {
            id: a.region.id,
            name: a.region.name,
            currency_code: a.region.currency_code,
            currency: a.currency.map(CurrencyItem::from),
            tax_rate: a.region.tax_rate,
            tax_code: a.region.tax_code,
            gift_cards_taxable: a.region.gift_cards_taxable,
            automatic_taxes: a.region.automatic_taxes,
            fulfillment_providers: to_items(a.fulfillment_providers),
            payment_providers: to_items(a.payment_providers),
            countries: a.countries.into_iter().map(CountryItem::from).collect(),
            shipping_options: a
                .shipping_options
                .into_iter()
                .map(ShippingOptionItem::from)
                .collect(),
            metadata: a.region.metadata,
            created_at: a.region.created_at,
            updated_at: a.region.updated_at,
            deleted_at: a.region.deleted_at,
        }
    }
}

/// Response for `GET /admin/regions/{id}` and `PUT /admin/regions/{id}`.
#[derive(Debug, Serialize)]
pub struct RegionResponse {
    pub region: RegionItem,
}

/// Response for `GET /admin/regions`.
#[derive(Debug, Serialize)]
pub struct RegionListResponse {
    pub regions: Vec<RegionItem>,
    pub count: usize,
}
