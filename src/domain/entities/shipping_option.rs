//! Shipping option entity owned by a region.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// How a shipping option's price is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceType {
    FlatRate,
    Calculated,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::FlatRate => "flat_rate",
            PriceType::Calculated => "calculated",
        }
    }
}

impl fmt::Display for PriceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown price type: {0}")]
pub struct UnknownPriceType(pub String);

impl FromStr for PriceType {
    type Err = UnknownPriceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flat_rate" => Ok(PriceType::FlatRate),
            "calculated" => Ok(PriceType::Calculated),
            other => Err(UnknownPriceType(other.to_string())),
        }
    }
}

/// A way of shipping to a region.
///
/// `provider_id`, `profile_id` and `price_type` may be missing on rows created
/// outside the admin flow; the shipping option repair fills them in.
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingOption {
    pub id: String,
    pub name: String,
    pub region_id: String,
    pub profile_id: Option<String>,
    pub provider_id: Option<String>,
    pub price_type: Option<PriceType>,
    pub amount: Option<i64>,
    pub is_return: bool,
    pub admin_only: bool,
    pub requirements: Vec<Value>,
    pub data: Value,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ShippingOption {
    /// Creates a live flat-rate option served by `provider_id`.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        region_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            region_id: region_id.into(),
            profile_id: None,
            provider_id: None,
            price_type: Some(PriceType::FlatRate),
            amount: None,
            is_return: false,
            admin_only: false,
            requirements: Vec::new(),
            data: Value::Object(Default::default()),
            metadata: Value::Object(Default::default()),
            created_at,
            updated_at: created_at,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns true if any field filled by the repair pass is missing.
    pub fn needs_defaults(&self) -> bool {
        self.provider_id.is_none() || self.price_type.is_none() || self.profile_id.is_none()
    }
}
