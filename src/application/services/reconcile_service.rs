//! Duplicate region reconciliation.

use crate::application::services::repair_service::{ProviderRepairReport, RepairService};
use crate::domain::duplicates::{DuplicateGroup, find_duplicate_groups};
use crate::domain::repositories::RegionRepository;
use crate::error::{AppError, ErrorInfo};
use std::sync::Arc;

/// A duplicate group after merging; lists only donors that were merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedGroup {
    pub survivor_id: String,
    pub donor_ids: Vec<String>,
    pub shipping_options_moved: u64,
    pub countries_moved: u64,
}

/// A donor whose merge was rolled back. The donor is left untouched.
#[derive(Debug, Clone)]
pub struct MergeFailure {
    pub survivor_id: String,
    pub donor_id: String,
    pub reason: String,
    pub error: ErrorInfo,
}

/// Outcome of a reconcile run.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub dry_run: bool,
    pub groups_found: usize,
    /// The plan: every duplicate group with its chosen survivor and donors.
    pub groups: Vec<DuplicateGroup>,
    /// Groups where at least one donor was merged.
    pub merged: Vec<MergedGroup>,
    pub failures: Vec<MergeFailure>,
    /// Provider backfill run after merging; `None` on dry runs or if it failed.
    pub provider_repair: Option<ProviderRepairReport>,
    pub provider_repair_error: Option<ErrorInfo>,
}

/// Service merging regions that share a `(name, currency_code)` key.
///
/// Each donor is merged in its own transaction. A failing donor is reported
/// and skipped; the others still merge. After merging, regions left without
/// provider associations are repaired.
pub struct ReconcileService<R: RegionRepository + ?Sized> {
    repository: Arc<R>,
    repair: Arc<RepairService<R>>,
}

impl<R: RegionRepository + ?Sized> ReconcileService<R> {
    /// Creates a new reconcile service.
    pub fn new(repository: Arc<R>, repair: Arc<RepairService<R>>) -> Self {
        Self { repository, repair }
    }

    /// Finds duplicate groups and their survivors without changing anything.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    pub async fn plan(&self) -> Result<Vec<DuplicateGroup>, AppError> {
        let summaries = self
            .repository
            .list_region_summaries()
            .await
            .map_err(|e| e.context("reconcile_regions", "*"))?;

        Ok(find_duplicate_groups(summaries))
    }

    /// Merges every duplicate group into its survivor.
    ///
    /// With `dry_run` only the plan is returned.
    ///
    /// # Errors
    ///
    /// Returns an error only if the duplicate scan itself fails. Merge and
    /// repair failures are reported in the returned [`ReconcileReport`].
    pub async fn reconcile(&self, dry_run: bool) -> Result<ReconcileReport, AppError> {
        let groups = self.plan().await?;

        let mut report = ReconcileReport {
            dry_run,
            groups_found: groups.len(),
            ..Default::default()
        };

        tracing::info!(groups_found = groups.len(), dry_run, "Duplicate region scan complete");

        if dry_run {
            for group in &groups {
                tracing::info!(
                    survivor_id = %group.survivor.id,
                    donors = ?group.donor_ids(),
                    name = %group.name,
                    currency_code = %group.currency_code,
                    "dry-run: would merge duplicate regions"
                );
            }
            report.groups = groups;
            return Ok(report);
        }

        for group in &groups {
            if let Some(merged) = self.merge_group(group, &mut report.failures).await {
                report.merged.push(merged);
            }
        }
        report.groups = groups;

        match self.repair.repair_provider_associations().await {
            Ok(repair) => report.provider_repair = Some(repair),
            Err(e) => {
                tracing::error!(error = %e, "Provider repair after reconcile failed");
                report.provider_repair_error = Some(e.to_error_info());
            }
        }

        tracing::info!(
            groups_found = report.groups_found,
            groups_merged = report.merged.len(),
            failures = report.failures.len(),
            "Region reconcile complete"
        );

        Ok(report)
    }

    async fn merge_group(
        &self,
        group: &DuplicateGroup,
        failures: &mut Vec<MergeFailure>,
    ) -> Option<MergedGroup> {
        let survivor_id = &group.survivor.id;
        let mut merged = MergedGroup {
            survivor_id: survivor_id.clone(),
            donor_ids: Vec::new(),
            shipping_options_moved: 0,
            countries_moved: 0,
        };

        for donor in &group.donors {
            match self.repository.merge_region(survivor_id, &donor.id).await {
                Ok(outcome) => {
                    tracing::info!(
                        survivor_id = %survivor_id,
                        donor_id = %donor.id,
                        shipping_options_moved = outcome.shipping_options_moved,
                        countries_moved = outcome.countries_moved,
                        "Merged duplicate region"
                    );
                    metrics::counter!("region_merges_total", "outcome" => "merged").increment(1);
                    merged.donor_ids.push(donor.id.clone());
                    merged.shipping_options_moved += outcome.shipping_options_moved;
                    merged.countries_moved += outcome.countries_moved;
                }
                Err(e) => {
                    let e = e.context("merge_region", &donor.id);
                    tracing::warn!(
                        survivor_id = %survivor_id,
                        donor_id = %donor.id,
                        error = %e,
                        "Merge rolled back, donor left untouched"
                    );
                    metrics::counter!("region_merges_total", "outcome" => "failed").increment(1);
                    failures.push(MergeFailure {
                        survivor_id: survivor_id.clone(),
                        donor_id: donor.id.clone(),
                        reason: e.to_string(),
                        error: e.to_error_info(),
                    });
                }
            }
        }

        (!merged.donor_ids.is_empty()).then_some(merged)
    }
}
