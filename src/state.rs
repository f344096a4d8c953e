//! Shared application state injected into HTTP handlers.

use std::sync::Arc;

use crate::application::services::{
    ProviderDefaults, ReconcileService, RegionService, RepairService,
};
use crate::domain::repositories::RegionRepository;

/// Services wired over a single region store.
#[derive(Clone)]
pub struct AppState {
    pub region_service: Arc<RegionService<dyn RegionRepository>>,
    pub reconcile_service: Arc<ReconcileService<dyn RegionRepository>>,
    pub repair_service: Arc<RepairService<dyn RegionRepository>>,
    /// Used directly by the health check.
    pub repository: Arc<dyn RegionRepository>,
}

impl AppState {
    pub fn new(repository: Arc<dyn RegionRepository>, defaults: ProviderDefaults) -> Self {
        let repair_service = Arc::new(RepairService::new(repository.clone(), defaults));
        let reconcile_service = Arc::new(ReconcileService::new(
            repository.clone(),
            repair_service.clone(),
        ));
        let region_service = Arc::new(RegionService::new(repository.clone()));

        Self {
            region_service,
            reconcile_service,
            repair_service,
            repository,
        }
    }
}
