//! DTO for the region update endpoint.

use rust_decimal::Decimal;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::domain::entities::{CountryAssignment, RegionPatch, RegionUpdate};

/// A provider given either as a bare id or as `{"provider_id": "..."}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProviderRef {
    Id(String),
    Object { provider_id: String },
}

impl ProviderRef {
    pub fn into_id(self) -> String {
        match self {
            ProviderRef::Id(id) | ProviderRef::Object { provider_id: id } => id,
        }
    }
}

/// Country attributes used when the country does not exist yet.
#[derive(Debug, Clone, Deserialize)]
pub struct CountryInput {
    pub iso_2: String,
    pub iso_3: Option<String>,
    pub num_code: Option<i32>,
    pub name: Option<String>,
    pub display_name: Option<String>,
}

/// A country given either as a bare `iso_2` code or as an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CountryRef {
    Code(String),
    Detailed(CountryInput),
}

impl From<CountryRef> for CountryAssignment {
    fn from(c: CountryRef) -> Self {
        match c {
            CountryRef::Code(iso_2) => CountryAssignment::code(iso_2),
            CountryRef::Detailed(input) => CountryAssignment {
                iso_2: input.iso_2,
                iso_3: input.iso_3,
                num_code: input.num_code,
                name: input.name,
                display_name: input.display_name,
            },
        }
    }
}

/// Request body for `PUT /admin/regions/{id}`.
///
/// All fields are optional; only provided fields are changed.
///
/// # Nullable fields (`tax_rate`, `tax_code`)
///
/// - **Absent** → leave existing value unchanged
/// - **`null`** → clear the value
/// - **Value** → set it
///
/// # Replacement lists
///
/// `fulfillment_providers`, `payment_providers` and `countries` replace the
/// region's current set when present. `[]` clears it; absent or `null`
/// leaves it unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateRegionRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_currency_code"))]
    pub currency_code: Option<String>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    pub tax_rate: Option<Option<Decimal>>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    pub tax_code: Option<Option<String>>,

    pub gift_cards_taxable: Option<bool>,

    pub automatic_taxes: Option<bool>,

    pub fulfillment_providers: Option<Vec<ProviderRef>>,

    pub payment_providers: Option<Vec<ProviderRef>>,

    pub countries: Option<Vec<CountryRef>>,
}

/// Length check on the trimmed code; case and alphabet are left to the service.
fn validate_currency_code(code: &str) -> Result<(), ValidationError> {
    if code.trim().chars().count() == 3 {
        Ok(())
    } else {
        Err(ValidationError::new("length")
            .with_message("Currency code must be three letters".into()))
    }
}

impl From<UpdateRegionRequest> for RegionUpdate {
    fn from(req: UpdateRegionRequest) -> Self {
        let ids = |refs: Vec<ProviderRef>| -> Vec<String> {
            refs.into_iter().map(ProviderRef::into_id).collect()
        };

        RegionUpdate {
            patch: RegionPatch {
                name: req.name,
                currency_code: req.currency_code,
                tax_rate: req.tax_rate,
                tax_code: req.tax_code,
                gift_cards_taxable: req.gift_cards_taxable,
                automatic_taxes: req.automatic_taxes,
            },
            fulfillment_providers: req.fulfillment_providers.map(ids),
            payment_providers: req.payment_providers.map(ids),
            countries: req
                .countries
                .map(|c| c.into_iter().map(CountryAssignment::from).collect()),
        }
    }
}
