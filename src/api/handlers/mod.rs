//! HTTP request handlers for API endpoints.
//!
//! Each handler module corresponds to a logical grouping of endpoints.

pub mod health;
pub mod maintenance;
pub mod regions;

pub use health::health_handler;
pub use maintenance::{
    reconcile_regions_handler, repair_providers_handler, repair_shipping_options_handler,
};
pub use regions::{get_region_handler, region_list_handler, update_region_handler};
