//! Idempotent maintenance passes restoring region relationship invariants.

use crate::domain::entities::PriceType;
use crate::domain::repositories::{RegionRepository, ShippingOptionDefaults};
use crate::error::AppError;
use std::sync::Arc;

/// Provider and profile ids used to backfill missing relationships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDefaults {
    pub fulfillment_provider_id: String,
    pub payment_provider_id: String,
    pub shipping_profile_id: String,
}

impl Default for ProviderDefaults {
    fn default() -> Self {
        Self {
            fulfillment_provider_id: "manual".to_string(),
            payment_provider_id: "manual".to_string(),
            shipping_profile_id: "sp_default".to_string(),
        }
    }
}

/// Result of a provider association repair run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProviderRepairReport {
    /// Regions that gained at least one association.
    pub regions_repaired: usize,
}

/// Result of a shipping option backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShippingOptionRepairReport {
    pub options_repaired: usize,
    pub option_ids: Vec<String>,
}

/// Service backfilling default providers for regions and shipping options.
///
/// Every pass only inserts what is missing, so running it again right after
/// a successful run changes nothing.
pub struct RepairService<R: RegionRepository + ?Sized> {
    repository: Arc<R>,
    defaults: ProviderDefaults,
}

impl<R: RegionRepository + ?Sized> RepairService<R> {
    /// Creates a new repair service.
    pub fn new(repository: Arc<R>, defaults: ProviderDefaults) -> Self {
        Self {
            repository,
            defaults,
        }
    }

    pub fn defaults(&self) -> &ProviderDefaults {
        &self.defaults
    }

    /// Gives every live region without fulfillment or payment providers an
    /// association to the configured default provider.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    pub async fn repair_provider_associations(&self) -> Result<ProviderRepairReport, AppError> {
        let defaults = &self.defaults;
        self.repository
            .ensure_providers(
                &defaults.fulfillment_provider_id,
                &defaults.payment_provider_id,
            )
            .await
            .map_err(|e| e.context("repair_provider_associations", "*"))?;

        let gaps = self
            .repository
            .list_provider_gaps()
            .await
            .map_err(|e| e.context("repair_provider_associations", "*"))?;

        let mut report = ProviderRepairReport::default();
        for gap in gaps {
            let mut repaired = false;

            if gap.missing_fulfillment {
                repaired |= self
                    .repository
                    .link_default_fulfillment_provider(
                        &gap.region_id,
                        &defaults.fulfillment_provider_id,
                    )
                    .await
                    .map_err(|e| e.context("repair_provider_associations", &gap.region_id))?;
            }
            if gap.missing_payment {
                repaired |= self
                    .repository
                    .link_default_payment_provider(&gap.region_id, &defaults.payment_provider_id)
                    .await
                    .map_err(|e| e.context("repair_provider_associations", &gap.region_id))?;
            }

            if repaired {
                tracing::info!(
                    region_id = %gap.region_id,
                    fulfillment = gap.missing_fulfillment,
                    payment = gap.missing_payment,
                    "Default provider associations added"
                );
                report.regions_repaired += 1;
            }
        }

        metrics::counter!("region_provider_repairs_total").increment(report.regions_repaired as u64);
        tracing::info!(regions_repaired = report.regions_repaired, "Provider repair complete");

        Ok(report)
    }

    /// Fills missing `provider_id`, `price_type` and `profile_id` on live
    /// shipping options.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the configured profile does not exist.
    /// Returns [`AppError::Internal`] on database errors.
    pub async fn repair_shipping_option_defaults(
        &self,
    ) -> Result<ShippingOptionRepairReport, AppError> {
        let defaults = &self.defaults;
        self.repository
            .ensure_providers(
                &defaults.fulfillment_provider_id,
                &defaults.payment_provider_id,
            )
            .await
            .map_err(|e| e.context("repair_shipping_option_defaults", "*"))?;

        let option_ids = self
            .repository
            .backfill_shipping_option_defaults(&ShippingOptionDefaults {
                provider_id: defaults.fulfillment_provider_id.clone(),
                price_type: PriceType::FlatRate,
                profile_id: defaults.shipping_profile_id.clone(),
            })
            .await
            .map_err(|e| e.context("repair_shipping_option_defaults", "*"))?;

        metrics::counter!("shipping_option_repairs_total").increment(option_ids.len() as u64);
        tracing::info!(options_repaired = option_ids.len(), "Shipping option repair complete");

        Ok(ShippingOptionRepairReport {
            options_repaired: option_ids.len(),
            option_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::{MockRegionRepository, ProviderGap};
    use serde_json::json;

    fn gap(region_id: &str, fulfillment: bool, payment: bool) -> ProviderGap {
        ProviderGap {
            region_id: region_id.to_string(),
            missing_fulfillment: fulfillment,
            missing_payment: payment,
        }
    }

    #[tokio::test]
    async fn test_repair_links_only_missing_kinds() {
        let mut mock_repo = MockRegionRepository::new();

        mock_repo
            .expect_ensure_providers()
            .times(1)
            .returning(|_, _| Ok(()));
        mock_repo
            .expect_list_provider_gaps()
            .times(1)
            .returning(|| Ok(vec![gap("reg_a", true, false), gap("reg_b", false, true)]));
        mock_repo
            .expect_link_default_fulfillment_provider()
            .withf(|region, provider| region == "reg_a" && provider == "manual")
            .times(1)
            .returning(|_, _| Ok(true));
        mock_repo
            .expect_link_default_payment_provider()
            .withf(|region, provider| region == "reg_b" && provider == "stripe")
            .times(1)
            .returning(|_, _| Ok(true));

        let defaults = ProviderDefaults {
            payment_provider_id: "stripe".to_string(),
            ..Default::default()
        };
        let service = RepairService::new(Arc::new(mock_repo), defaults);

        let report = service.repair_provider_associations().await.unwrap();

        assert_eq!(report.regions_repaired, 2);
    }

    #[tokio::test]
    async fn test_region_filled_concurrently_is_not_counted() {
        let mut mock_repo = MockRegionRepository::new();

        mock_repo
            .expect_ensure_providers()
            .returning(|_, _| Ok(()));
        mock_repo
            .expect_list_provider_gaps()
            .returning(|| Ok(vec![gap("reg_a", true, true)]));
        mock_repo
            .expect_link_default_fulfillment_provider()
            .returning(|_, _| Ok(false));
        mock_repo
            .expect_link_default_payment_provider()
            .returning(|_, _| Ok(false));

        let service = RepairService::new(Arc::new(mock_repo), ProviderDefaults::default());

        let report = service.repair_provider_associations().await.unwrap();

        assert_eq!(report.regions_repaired, 0);
    }

    #[tokio::test]
    async fn test_repair_error_carries_region_context() {
        let mut mock_repo = MockRegionRepository::new();

        mock_repo
            .expect_ensure_providers()
            .returning(|_, _| Ok(()));
        mock_repo
            .expect_list_provider_gaps()
            .returning(|| Ok(vec![gap("reg_a", true, false)]));
        mock_repo
            .expect_link_default_fulfillment_provider()
            .returning(|_, _| Err(AppError::internal("Database error", json!({}))));

        let service = RepairService::new(Arc::new(mock_repo), ProviderDefaults::default());

        let err = service.repair_provider_associations().await.unwrap_err();

        let info = err.to_error_info();
        assert_eq!(info.details["entity_id"], "reg_a");
        assert_eq!(info.details["operation"], "repair_provider_associations");
    }

    #[tokio::test]
    async fn test_shipping_option_repair_uses_configured_defaults() {
        let mut mock_repo = MockRegionRepository::new();

        mock_repo
            .expect_ensure_providers()
            .returning(|_, _| Ok(()));
        mock_repo
            .expect_backfill_shipping_option_defaults()
            .withf(|d| {
                d.provider_id == "manual"
                    && d.profile_id == "sp_custom"
                    && d.price_type == PriceType::FlatRate
            })
            .times(1)
            .returning(|_| Ok(vec!["so_1".to_string(), "so_2".to_string()]));

        let defaults = ProviderDefaults {
            shipping_profile_id: "sp_custom".to_string(),
            ..Default::default()
        };
        let service = RepairService::new(Arc::new(mock_repo), defaults);

        let report = service.repair_shipping_option_defaults().await.unwrap();

        assert_eq!(report.options_repaired, 2);
        assert_eq!(report.option_ids, vec!["so_1", "so_2"]);
    }
}
