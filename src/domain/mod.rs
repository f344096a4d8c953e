//! Domain layer containing business entities and logic.
//!
//! It defines entities, repository interfaces and pure domain rules,
//! independent of infrastructure concerns.
//!
//! # Architecture
//!
//! - [`entities`] - Region aggregate data structures
//! - [`repositories`] - Data access trait definitions
//! - [`duplicates`] - Duplicate grouping and survivor selection
//!
//! # Reconcile Flow
//!
//! 1. [`repositories::RegionRepository::list_region_summaries`] loads per-region counts
//! 2. [`duplicates::find_duplicate_groups`] picks a survivor per `(name, currency_code)`
//! 3. Each donor is merged in its own transaction (see [`crate::application::services`])
//! 4. Provider associations are backfilled for regions left without any

pub mod duplicates;
pub mod entities;
pub mod repositories;
