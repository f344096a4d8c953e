//! DTOs for maintenance endpoints.

use serde::{Deserialize, Serialize};

use crate::application::services::{
    MergeFailure, MergedGroup, ProviderRepairReport, ReconcileReport, ShippingOptionRepairReport,
};
use crate::domain::duplicates::DuplicateGroup;
use crate::error::ErrorInfo;

/// Query for `POST /admin/maintenance/reconcile-regions`.
#[derive(Debug, Default, Deserialize)]
pub struct ReconcileQuery {
    #[serde(default)]
    pub dry_run: bool,
}

/// One planned merge.
#[derive(Debug, Serialize)]
pub struct DuplicateGroupItem {
    pub name: String,
    pub currency_code: String,
    pub survivor_id: String,
    pub donor_ids: Vec<String>,
}

impl From<DuplicateGroup> for DuplicateGroupItem {
    fn from(g: DuplicateGroup) -> Self {
        Self {
            donor_ids: g.donor_ids(),
            name: g.name,
            currency_code: g.currency_code,
            survivor_id: g.survivor.id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MergedGroupItem {
    pub survivor_id: String,
    pub donor_ids: Vec<String>,
    pub shipping_options_moved: u64,
    pub countries_moved: u64,
}

impl From<MergedGroup> for MergedGroupItem {
    fn from(m: MergedGroup) -> Self {
        Self {
            survivor_id: m.survivor_id,
            donor_ids: m.donor_ids,
            shipping_options_moved: m.shipping_options_moved,
            countries_moved: m.countries_moved,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MergeFailureItem {
    pub donor_id: String,
    pub survivor_id: String,
    pub reason: String,
    pub error: ErrorInfo,
}

impl From<MergeFailure> for MergeFailureItem {
    fn from(f: MergeFailure) -> Self {
        Self {
            donor_id: f.donor_id,
            survivor_id: f.survivor_id,
            reason: f.reason,
            error: f.error,
        }
    }
}

/// Response for `POST /admin/maintenance/repair-provider-associations`.
#[derive(Debug, Serialize)]
pub struct ProviderRepairResponse {
    pub regions_repaired: usize,
}

impl From<ProviderRepairReport> for ProviderRepairResponse {
    fn from(r: ProviderRepairReport) -> Self {
        Self {
            regions_repaired: r.regions_repaired,
        }
    }
}

/// Response for `POST /admin/maintenance/reconcile-regions`.
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub dry_run: bool,
    pub groups_found: usize,
    pub groups: Vec<DuplicateGroupItem>,
    pub merged: Vec<MergedGroupItem>,
    pub failures: Vec<MergeFailureItem>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_repair: Option<ProviderRepairResponse>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_repair_error: Option<ErrorInfo>,
}

impl From<ReconcileReport> for ReconcileResponse {
    fn from(r: ReconcileReport) -> Self {
        Self {
            dry_run: r.dry_run,
            groups_found: r.groups_found,
            groups: r.groups.into_iter().map(DuplicateGroupItem::from).collect(),
            merged: r.merged.into_iter().map(MergedGroupItem::from).collect(),
            failures: r.failures.into_iter().map(MergeFailureItem::from).collect(),
            provider_repair: r.provider_repair.map(ProviderRepairResponse::from),
            provider_repair_error: r.provider_repair_error,
        }
    }
}

/// Response for `POST /admin/maintenance/repair-shipping-options`.
#[derive(Debug, Serialize)]
pub struct ShippingOptionRepairResponse {
    pub options_repaired: usize,
    pub option_ids: Vec<String>,
}

impl From<ShippingOptionRepairReport> for ShippingOptionRepairResponse {
    fn from(r: ShippingOptionRepairReport) -> Self {
        Self {
            options_repaired: r.options_repaired,
            option_ids: r.option_ids,
        }
    }
}
