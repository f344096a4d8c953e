//! Core domain entities of the region aggregate.
//!
//! # Entity Types
//!
//! - [`Region`] - Geographic/currency configuration, the aggregate root
//! - [`ShippingOption`] - One-to-many dependent of a region
//! - [`Country`] - Assigned to at most one region, keyed by `iso_2`
//! - [`RegionAggregate`] - A region with all dependents, as read
//!
//! Updates are expressed as [`RegionUpdate`]: a sparse [`RegionPatch`] plus
//! optional replacement lists for the three dependent collections.

pub mod country;
pub mod region;
pub mod shipping_option;

pub use country::{Country, CountryAssignment};
pub use region::{Currency, Region, RegionAggregate, RegionPatch, RegionUpdate};
pub use shipping_option::{PriceType, ShippingOption, UnknownPriceType};
