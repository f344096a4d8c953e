//! PostgreSQL implementation of the region repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::duplicates::no_longer_duplicates;
use crate::domain::entities::{
    Country, CountryAssignment, Currency, PriceType, Region, RegionAggregate, RegionUpdate,
    ShippingOption,
};
use crate::domain::repositories::{
    MergeOutcome, ProviderGap, RegionRepository, RegionSummary, ShippingOptionDefaults,
};
use crate::error::AppError;

/// Default per-transaction statement timeout.
pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 5_000;

const REGION_COLUMNS: &str = r#"
    r.id, r.name, r.currency_code, r.tax_rate, r.tax_code,
    COALESCE(r.gift_cards_taxable, TRUE) AS gift_cards_taxable,
    COALESCE(r.automatic_taxes, TRUE) AS automatic_taxes,
    COALESCE(r.metadata, '{}'::jsonb) AS metadata,
    r.created_at, r.updated_at, r.deleted_at,
    c.symbol AS currency_symbol,
    c.symbol_native AS currency_symbol_native,
    c.name AS currency_name
"#;

#[derive(Debug, sqlx::FromRow)]
struct RegionRow {
    id: String,
    name: String,
    currency_code: String,
    tax_rate: Option<Decimal>,
    tax_code: Option<String>,
    gift_cards_taxable: bool,
    automatic_taxes: bool,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    currency_symbol: Option<String>,
    currency_symbol_native: Option<String>,
    currency_name: Option<String>,
}

impl From<RegionRow> for RegionAggregate {
    fn from(row: RegionRow) -> Self {
        let currency = match (row.currency_symbol, row.currency_symbol_native, row.currency_name) {
            (Some(symbol), Some(symbol_native), Some(name)) => Some(Currency {
                code: row.currency_code.clone(),
                symbol,
                symbol_native,
                name,
            }),
            _ => None,
        };

        let region = Region {
            id: row.id,
            name: row.name,
            currency_code: row.currency_code,
            tax_rate: row.tax_rate,
            tax_code: row.tax_code,
            gift_cards_taxable: row.gift_cards_taxable,
            automatic_taxes: row.automatic_taxes,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        };

        RegionAggregate::new(region, currency)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CountryRow {
    iso_2: String,
    iso_3: String,
    num_code: i32,
    name: String,
    display_name: String,
    region_id: Option<String>,
}

impl From<CountryRow> for Country {
    fn from(row: CountryRow) -> Self {
        Self {
            iso_2: row.iso_2,
            iso_3: row.iso_3,
            num_code: row.num_code,
            name: row.name,
            display_name: row.display_name,
            region_id: row.region_id,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ShippingOptionRow {
    id: String,
    name: String,
    region_id: String,
    profile_id: Option<String>,
    provider_id: Option<String>,
    price_type: Option<String>,
    amount: Option<i64>,
    is_return: bool,
    admin_only: bool,
    requirements: Value,
    data: Value,
    metadata: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<ShippingOptionRow> for ShippingOption {
    fn from(row: ShippingOptionRow) -> Self {
        let requirements = match row.requirements {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };

        Self {
            id: row.id,
            name: row.name,
            region_id: row.region_id,
            profile_id: row.profile_id,
            provider_id: row.provider_id,
            // The column CHECK constraint only admits known values.
            price_type: row.price_type.and_then(|p| p.parse::<PriceType>().ok()),
            amount: row.amount,
            is_return: row.is_return,
            admin_only: row.admin_only,
            requirements,
            data: row.data,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RegionSummaryRow {
    id: String,
    name: String,
    currency_code: String,
    created_at: DateTime<Utc>,
    shipping_option_count: i64,
    country_count: i64,
}

impl From<RegionSummaryRow> for RegionSummary {
    fn from(row: RegionSummaryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            currency_code: row.currency_code,
            created_at: row.created_at,
            shipping_option_count: row.shipping_option_count,
            country_count: row.country_count,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProviderGapRow {
    region_id: String,
    missing_fulfillment: bool,
    missing_payment: bool,
}

impl From<ProviderGapRow> for ProviderGap {
    fn from(row: ProviderGapRow) -> Self {
        Self {
            region_id: row.region_id,
            missing_fulfillment: row.missing_fulfillment,
            missing_payment: row.missing_payment,
        }
    }
}

/// Provider association tables.
#[derive(Debug, Clone, Copy)]
enum ProviderKind {
    Fulfillment,
    Payment,
}

impl ProviderKind {
    fn join_table(self) -> &'static str {
        match self {
            ProviderKind::Fulfillment => "region_fulfillment_providers",
            ProviderKind::Payment => "region_payment_providers",
        }
    }
}

/// PostgreSQL repository for region aggregates.
///
/// Every transaction sets a local `statement_timeout`, so a blocked lock or a
/// slow statement aborts with a retryable error instead of hanging. Updates
/// hold the region row lock (`FOR UPDATE`) for the whole transaction; merges
/// lock survivor and donor in id order.
pub struct PgRegionRepository {
    pool: Arc<PgPool>,
    statement_timeout_ms: u64,
}

impl PgRegionRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            statement_timeout_ms: DEFAULT_STATEMENT_TIMEOUT_MS,
        }
    }

    /// Overrides the per-transaction statement timeout.
    pub fn with_statement_timeout(mut self, timeout_ms: u64) -> Self {
        self.statement_timeout_ms = timeout_ms;
        self
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, AppError> {
        let mut tx = self.pool.begin().await?;
        self.set_statement_timeout(&mut tx).await?;
        Ok(tx)
    }

    /// Read-only transaction over a single snapshot, so the region and its
    /// dependents are loaded consistently.
    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>, AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;
        self.set_statement_timeout(&mut tx).await?;
        Ok(tx)
    }

    async fn set_statement_timeout(
        &self,
        tx: &mut Transaction<'static, Postgres>,
    ) -> Result<(), AppError> {
        sqlx::query("SELECT set_config('statement_timeout', $1, true)")
            .bind(self.statement_timeout_ms.to_string())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn replace_providers(
        conn: &mut PgConnection,
        kind: ProviderKind,
        region_id: &str,
        provider_ids: &[String],
    ) -> Result<(), AppError> {
        let table = kind.join_table();

        sqlx::query(&format!("DELETE FROM {table} WHERE region_id = $1"))
            .bind(region_id)
            .execute(&mut *conn)
            .await?;

        if !provider_ids.is_empty() {
            sqlx::query(&format!(
                "INSERT INTO {table} (region_id, provider_id) SELECT $1, UNNEST($2::TEXT[])"
            ))
            .bind(region_id)
            .bind(provider_ids)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    async fn replace_countries(
        conn: &mut PgConnection,
        region_id: &str,
        countries: Vec<CountryAssignment>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE country SET region_id = NULL WHERE region_id = $1")
            .bind(region_id)
            .execute(&mut *conn)
            .await?;

        for assignment in countries {
            let country = assignment.into_country(region_id);
            sqlx::query(
                r#"
                INSERT INTO country (iso_2, iso_3, num_code, name, display_name, region_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (iso_2) DO UPDATE SET region_id = EXCLUDED.region_id
                "#,
            )
            .bind(&country.iso_2)
            .bind(&country.iso_3)
            .bind(country.num_code)
            .bind(&country.name)
            .bind(&country.display_name)
            .bind(region_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    async fn link_default_provider(
        &self,
        kind: ProviderKind,
        region_id: &str,
        provider_id: &str,
    ) -> Result<bool, AppError> {
        let table = kind.join_table();
        let mut tx = self.begin().await?;

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {table} (region_id, provider_id)
            SELECT r.id, $2
            FROM region r
            WHERE r.id = $1
              AND r.deleted_at IS NULL
              AND NOT EXISTS (SELECT 1 FROM {table} j WHERE j.region_id = r.id)
            ON CONFLICT (region_id, provider_id) DO NOTHING
            "#
        ))
        .bind(region_id)
        .bind(provider_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Attaches provider sets, countries and live shipping options to the
    /// given regions, keeping their order.
    async fn load_dependents(
        conn: &mut PgConnection,
        regions: Vec<RegionRow>,
    ) -> Result<Vec<RegionAggregate>, AppError> {
        let mut aggregates: Vec<RegionAggregate> =
            regions.into_iter().map(RegionAggregate::from).collect();
        if aggregates.is_empty() {
            return Ok(aggregates);
        }

        let ids: Vec<String> = aggregates.iter().map(|a| a.region.id.clone()).collect();
        let index: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        let fulfillment: Vec<(String, String)> = sqlx::query_as(
            "SELECT region_id, provider_id FROM region_fulfillment_providers WHERE region_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;
        let payment: Vec<(String, String)> = sqlx::query_as(
            "SELECT region_id, provider_id FROM region_payment_providers WHERE region_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let countries: Vec<CountryRow> = sqlx::query_as(
            r#"
            SELECT iso_2, iso_3, num_code, name, display_name, region_id
            FROM country
            WHERE region_id = ANY($1)
            ORDER BY iso_2
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let options: Vec<ShippingOptionRow> = sqlx::query_as(
            r#"
            SELECT id, name, region_id, profile_id, provider_id, price_type, amount,
                   is_return, admin_only, requirements, data, metadata,
                   created_at, updated_at, deleted_at
            FROM shipping_option
            WHERE region_id = ANY($1) AND deleted_at IS NULL
            ORDER BY created_at, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        for (region_id, provider_id) in fulfillment {
            if let Some(&i) = index.get(&region_id) {
                aggregates[i].fulfillment_providers.insert(provider_id);
            }
        }
        for (region_id, provider_id) in payment {
            if let Some(&i) = index.get(&region_id) {
                aggregates[i].payment_providers.insert(provider_id);
            }
        }

        for row in countries {
            let country = Country::from(row);
            if let Some(&i) = country.region_id.as_ref().and_then(|id| index.get(id)) {
                aggregates[i].countries.push(country);
            }
        }

        for row in options {
            let option = ShippingOption::from(row);
            if let Some(&i) = index.get(&option.region_id) {
                aggregates[i].shipping_options.push(option);
            }
        }

        Ok(aggregates)
    }
}

#[async_trait]
impl RegionRepository for PgRegionRepository {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn find_aggregate(&self, id: &str) -> Result<Option<RegionAggregate>, AppError> {
        let mut tx = self.begin_snapshot().await?;

        let row: Option<RegionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {REGION_COLUMNS}
            FROM region r
            LEFT JOIN currency c ON c.code = r.currency_code
            WHERE r.id = $1 AND r.deleted_at IS NULL
            "#
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };

        let aggregate = Self::load_dependents(&mut *tx, vec![row]).await?.pop();
        tx.commit().await?;
        Ok(aggregate)
    }

    async fn list_aggregates(&self) -> Result<Vec<RegionAggregate>, AppError> {
        let mut tx = self.begin_snapshot().await?;

        let rows: Vec<RegionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {REGION_COLUMNS}
            FROM region r
            LEFT JOIN currency c ON c.code = r.currency_code
            WHERE r.deleted_at IS NULL
            ORDER BY r.created_at, r.id
            "#
        ))
        .fetch_all(&mut *tx)
        .await?;

        let aggregates = Self::load_dependents(&mut *tx, rows).await?;
        tx.commit().await?;
        Ok(aggregates)
    }

    async fn currency_exists(&self, code: &str) -> Result<bool, AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM currency WHERE code = $1)")
                .bind(code)
                .fetch_one(self.pool.as_ref())
                .await?;
        Ok(exists)
    }

    async fn apply_update(&self, id: &str, update: RegionUpdate) -> Result<(), AppError> {
        let mut tx = self.begin().await?;

        let locked: Option<String> =
            sqlx::query_scalar("SELECT id FROM region WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Err(AppError::not_found("Region not found", json!({ "id": id })));
        }

        if update.is_empty() {
            tx.commit().await?;
            return Ok(());
        }

        let RegionUpdate {
            patch,
            fulfillment_providers,
            payment_providers,
            countries,
        } = update;

        let set_tax_rate = patch.tax_rate.is_some();
        let set_tax_code = patch.tax_code.is_some();

        sqlx::query(
            r#"
            UPDATE region SET
                name               = COALESCE($2::TEXT, name),
                currency_code      = COALESCE($3::TEXT, currency_code),
                tax_rate           = CASE WHEN $4 THEN $5::NUMERIC ELSE tax_rate END,
                tax_code           = CASE WHEN $6 THEN $7::TEXT ELSE tax_code END,
                gift_cards_taxable = COALESCE($8::BOOLEAN, gift_cards_taxable),
                automatic_taxes    = COALESCE($9::BOOLEAN, automatic_taxes),
                updated_at         = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.currency_code)
        .bind(set_tax_rate)
        .bind(patch.tax_rate.flatten())
        .bind(set_tax_code)
        .bind(patch.tax_code.flatten())
        .bind(patch.gift_cards_taxable)
        .bind(patch.automatic_taxes)
        .execute(&mut *tx)
        .await?;

        if let Some(providers) = fulfillment_providers {
            Self::replace_providers(&mut *tx, ProviderKind::Fulfillment, id, &providers).await?;
        }
        if let Some(providers) = payment_providers {
            Self::replace_providers(&mut *tx, ProviderKind::Payment, id, &providers).await?;
        }
        if let Some(countries) = countries {
            Self::replace_countries(&mut *tx, id, countries).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_region_summaries(&self) -> Result<Vec<RegionSummary>, AppError> {
        // Correlated counts; a join-then-count would multiply shipping options by countries.
        let rows: Vec<RegionSummaryRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.name, r.currency_code, r.created_at,
                   (SELECT COUNT(*) FROM shipping_option s
                     WHERE s.region_id = r.id AND s.deleted_at IS NULL) AS shipping_option_count,
                   (SELECT COUNT(*) FROM country c
                     WHERE c.region_id = r.id) AS country_count
            FROM region r
            WHERE r.deleted_at IS NULL
            ORDER BY r.name, r.currency_code, r.created_at, r.id
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(RegionSummary::from).collect())
    }

    async fn merge_region(
        &self,
        survivor_id: &str,
        donor_id: &str,
    ) -> Result<MergeOutcome, AppError> {
        if survivor_id == donor_id {
            return Err(AppError::bad_request(
                "Cannot merge a region into itself",
                json!({ "id": donor_id }),
            ));
        }

        let mut tx = self.begin().await?;

        let locked: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT id, name, currency_code FROM region
            WHERE id = ANY($1) AND deleted_at IS NULL
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(vec![survivor_id.to_string(), donor_id.to_string()])
        .fetch_all(&mut *tx)
        .await?;

        let mut keys = Vec::with_capacity(2);
        for required in [survivor_id, donor_id] {
            match locked.iter().find(|(id, _, _)| id == required) {
                Some((_, name, currency_code)) => keys.push((name, currency_code)),
                None => {
                    return Err(AppError::not_found(
                        "Region not found",
                        json!({ "entity_id": required }),
                    ));
                }
            }
        }
        if keys[0] != keys[1] {
            return Err(no_longer_duplicates(survivor_id, donor_id));
        }

        let moved: Vec<bool> = sqlx::query_scalar(
            r#"
            UPDATE shipping_option SET region_id = $1, updated_at = NOW()
            WHERE region_id = $2
            RETURNING deleted_at IS NULL
            "#,
        )
        .bind(survivor_id)
        .bind(donor_id)
        .fetch_all(&mut *tx)
        .await?;

        let countries = sqlx::query("UPDATE country SET region_id = $1 WHERE region_id = $2")
            .bind(survivor_id)
            .bind(donor_id)
            .execute(&mut *tx)
            .await?;

        for kind in [ProviderKind::Fulfillment, ProviderKind::Payment] {
            sqlx::query(&format!("DELETE FROM {} WHERE region_id = $1", kind.join_table()))
                .bind(donor_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM region WHERE id = $1")
            .bind(donor_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(MergeOutcome {
            shipping_options_moved: moved.iter().filter(|live| **live).count() as u64,
            countries_moved: countries.rows_affected(),
        })
    }

    async fn ensure_providers(
        &self,
        fulfillment_provider_id: &str,
        payment_provider_id: &str,
    ) -> Result<(), AppError> {
        let mut tx = self.begin().await?;

        sqlx::query("INSERT INTO fulfillment_provider (id, is_installed) VALUES ($1, TRUE) ON CONFLICT (id) DO NOTHING")
            .bind(fulfillment_provider_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO payment_provider (id, is_installed) VALUES ($1, TRUE) ON CONFLICT (id) DO NOTHING")
            .bind(payment_provider_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_provider_gaps(&self) -> Result<Vec<ProviderGap>, AppError> {
        let rows: Vec<ProviderGapRow> = sqlx::query_as(
            r#"
            SELECT region_id, missing_fulfillment, missing_payment
            FROM (
                SELECT r.id AS region_id, r.created_at,
                       NOT EXISTS (SELECT 1 FROM region_fulfillment_providers f
                                    WHERE f.region_id = r.id) AS missing_fulfillment,
                       NOT EXISTS (SELECT 1 FROM region_payment_providers p
                                    WHERE p.region_id = r.id) AS missing_payment
                FROM region r
                WHERE r.deleted_at IS NULL
            ) gaps
            WHERE missing_fulfillment OR missing_payment
            ORDER BY created_at, region_id
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(ProviderGap::from).collect())
    }

    async fn link_default_fulfillment_provider(
        &self,
        region_id: &str,
        provider_id: &str,
    ) -> Result<bool, AppError> {
        self.link_default_provider(ProviderKind::Fulfillment, region_id, provider_id)
            .await
    }

    async fn link_default_payment_provider(
        &self,
        region_id: &str,
        provider_id: &str,
    ) -> Result<bool, AppError> {
        self.link_default_provider(ProviderKind::Payment, region_id, provider_id)
            .await
    }

    async fn backfill_shipping_option_defaults(
        &self,
        defaults: &ShippingOptionDefaults,
    ) -> Result<Vec<String>, AppError> {
        let mut tx = self.begin().await?;

        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE shipping_option SET
                provider_id = COALESCE(provider_id, $1),
                price_type  = COALESCE(price_type, $2),
                profile_id  = COALESCE(profile_id, $3),
                updated_at  = NOW()
            WHERE deleted_at IS NULL
              AND (provider_id IS NULL OR price_type IS NULL OR profile_id IS NULL)
            RETURNING id
            "#,
        )
        .bind(&defaults.provider_id)
        .bind(defaults.price_type.as_str())
        .bind(&defaults.profile_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ids)
    }
}
