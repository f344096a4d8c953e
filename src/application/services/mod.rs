//! Business logic services for the application layer.

pub mod reconcile_service;
pub mod region_service;
pub mod repair_service;

pub use reconcile_service::{MergeFailure, MergedGroup, ReconcileReport, ReconcileService};
pub use region_service::RegionService;
pub use repair_service::{
    ProviderDefaults, ProviderRepairReport, RepairService, ShippingOptionRepairReport,
};
