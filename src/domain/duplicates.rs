//! Duplicate region detection and survivor selection.

use std::collections::BTreeMap;

use serde_json::json;

use super::repositories::RegionSummary;
use crate::error::AppError;

/// Regions sharing a `(name, currency_code)` key.
///
/// `survivor` keeps the key; `donors` are merged into it in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub name: String,
    pub currency_code: String,
    pub survivor: RegionSummary,
    pub donors: Vec<RegionSummary>,
}

impl DuplicateGroup {
    pub fn donor_ids(&self) -> Vec<String> {
        self.donors.iter().map(|d| d.id.clone()).collect()
    }
}

/// Error for a merge whose regions were changed after the duplicate scan.
pub fn no_longer_duplicates(survivor_id: &str, donor_id: &str) -> AppError {
    AppError::conflict(
        "Regions are no longer duplicates",
        json!({ "survivor_id": survivor_id, "donor_id": donor_id }),
    )
}

/// Groups live regions by `(name, currency_code)` and picks a survivor for
/// every group with two or more members.
///
/// Members are ordered by shipping option count descending, then
/// `created_at` ascending, then `id` ascending. The first is the survivor.
/// Groups come back sorted by key.
pub fn find_duplicate_groups(summaries: Vec<RegionSummary>) -> Vec<DuplicateGroup> {
    let mut by_key: BTreeMap<(String, String), Vec<RegionSummary>> = BTreeMap::new();
    for summary in summaries {
        by_key
            .entry((summary.name.clone(), summary.currency_code.clone()))
            .or_default()
            .push(summary);
    }

    by_key
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|((name, currency_code), mut members)| {
            members.sort_by(|a, b| {
                b.shipping_option_count
                    .cmp(&a.shipping_option_count)
                    .then(a.created_at.cmp(&b.created_at))
                    .then_with(|| a.id.cmp(&b.id))
            });
            let survivor = members.remove(0);
            DuplicateGroup {
                name,
                currency_code,
                survivor,
                donors: members,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(offset_days: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(offset_days)
    }

    fn summary(id: &str, name: &str, currency: &str, shipping: i64, created: i64) -> RegionSummary {
        RegionSummary {
            id: id.to_string(),
            name: name.to_string(),
            currency_code: currency.to_string(),
            created_at: t(created),
            shipping_option_count: shipping,
            country_count: 0,
        }
    }

    #[test]
    fn test_single_regions_are_not_duplicates() {
        let groups = find_duplicate_groups(vec![
            summary("reg_us", "US", "usd", 1, 0),
            summary("reg_eu", "EU", "eur", 1, 0),
            summary("reg_us_eur", "US", "eur", 0, 1),
        ]);

        assert!(groups.is_empty());
    }

    #[test]
    fn test_shipping_count_tie_broken_by_age() {
        // counts [3, 3, 1], creation order [t2, t1, t3]
        let groups = find_duplicate_groups(vec![
            summary("reg_a", "EU", "eur", 3, 2),
            summary("reg_b", "EU", "eur", 3, 1),
            summary("reg_c", "EU", "eur", 1, 3),
        ]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].survivor.id, "reg_b");
        assert_eq!(groups[0].donor_ids(), vec!["reg_a", "reg_c"]);
    }

    #[test]
    fn test_more_shipping_options_beats_age() {
        let groups = find_duplicate_groups(vec![
            summary("reg_a", "US", "usd", 0, 1),
            summary("reg_b", "US", "usd", 2, 5),
        ]);

        assert_eq!(groups[0].survivor.id, "reg_b");
        assert_eq!(groups[0].donor_ids(), vec!["reg_a"]);
        assert_eq!(groups[0].name, "US");
        assert_eq!(groups[0].currency_code, "usd");
    }

    #[test]
    fn test_full_tie_broken_by_id() {
        let groups = find_duplicate_groups(vec![
            summary("reg_z", "UK", "gbp", 1, 0),
            summary("reg_m", "UK", "gbp", 1, 0),
        ]);

        assert_eq!(groups[0].survivor.id, "reg_m");
    }

    #[test]
    fn test_key_is_case_sensitive_on_name() {
        let groups = find_duplicate_groups(vec![
            summary("reg_a", "US", "usd", 0, 0),
            summary("reg_b", "us", "usd", 0, 1),
        ]);

        assert!(groups.is_empty());
    }

    #[test]
    fn test_multiple_groups_sorted_by_key() {
        let groups = find_duplicate_groups(vec![
            summary("reg_us1", "US", "usd", 0, 0),
            summary("reg_eu1", "EU", "eur", 0, 0),
            summary("reg_us2", "US", "usd", 0, 1),
            summary("reg_eu2", "EU", "eur", 0, 1),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "EU");
        assert_eq!(groups[1].name, "US");
    }
}
