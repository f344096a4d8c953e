//! Repository trait definitions for the domain layer.
//!
//! The trait abstracts the transactional aggregate store. Implementations live
//! in `crate::infrastructure::persistence`; mocks are generated with `mockall`.
//!
//! # Available Repositories
//!
//! - [`RegionRepository`] - Region aggregate reads, updates, merges and repairs

pub mod region_repository;

pub use region_repository::{
    MergeOutcome, ProviderGap, RegionRepository, RegionSummary, ShippingOptionDefaults,
};

#[cfg(test)]
pub use region_repository::MockRegionRepository;
