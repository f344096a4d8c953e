//! Region repository implementations.
//!
//! # Repositories
//!
//! - [`PgRegionRepository`] - PostgreSQL via SQLx, one transaction per mutating call
//! - [`InMemoryRegionRepository`] - copy-on-write in-process store for tests and demos

pub mod memory_region_repository;
pub mod pg_region_repository;

pub use memory_region_repository::{InMemoryRegionRepository, MemoryState};
pub use pg_region_repository::{DEFAULT_STATEMENT_TIMEOUT_MS, PgRegionRepository};
