//! Application layer services implementing business logic.
//!
//! Services validate input, coordinate repository calls and decide how
//! failures are reported. They consume the repository trait and provide the
//! operations exposed over HTTP and the admin CLI.
//!
//! # Available Services
//!
//! - [`services::region_service::RegionService`] - Region aggregate reads and atomic updates
//! - [`services::reconcile_service::ReconcileService`] - Duplicate region detection and merging
//! - [`services::repair_service::RepairService`] - Provider and shipping option backfills

pub mod services;
