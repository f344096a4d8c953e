//! CLI administration tool for the region engine.
//!
//! Runs the same services as the HTTP admin API directly against the
//! database, for operators and scheduled jobs.
//!
//! # Usage
//!
//! ```bash
//! # List live regions
//! cargo run --bin admin -- regions list
//!
//! # Show one region aggregate
//! cargo run --bin admin -- regions show reg_us
//!
//! # Preview, then merge duplicate regions
//! cargo run --bin admin -- regions reconcile --dry-run
//! cargo run --bin admin -- regions reconcile -y
//!
//! # Backfill default providers
//! cargo run --bin admin -- regions repair-providers
//! cargo run --bin admin -- regions repair-shipping-options
//!
//! # Database tools
//! cargo run --bin admin -- db check
//! cargo run --bin admin -- db migrate
//! ```
//!
//! # Environment Variables
//!
//! Same as the server, see [`region_engine::config`]. `DATABASE_URL` (or the
//! `DB_*` components) is required.

use region_engine::application::services::{ReconcileReport, RegionService};
use region_engine::config::{self, Config};
use region_engine::domain::repositories::RegionRepository;
use region_engine::server;
use region_engine::state::AppState;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;

/// CLI tool for maintaining region aggregates.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Inspect and maintain regions
    Regions {
        #[command(subcommand)]
        action: RegionAction,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// Region subcommands.
#[derive(Subcommand)]
enum RegionAction {
    /// List live regions
    List,

    /// Show one region with its providers, countries and shipping options
    Show {
        /// Region id
        id: String,
    },

    /// Merge regions sharing a name and currency
    Reconcile {
        /// Print the merge plan without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Link the default providers to regions that have none
    RepairProviders,

    /// Fill missing provider, price type and profile on shipping options
    RepairShippingOptions,
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = config::load_from_env()?;
    let pool = server::connect_pool(&config).await?;

    match cli.command {
        Commands::Regions { action } => handle_region_action(action, pool, &config).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

/// Dispatches region commands.
async fn handle_region_action(action: RegionAction, pool: PgPool, config: &Config) -> Result<()> {
    let state = AppState::new(
        server::region_repository(pool, config),
        config.provider_defaults(),
    );

    match action {
        RegionAction::List => list_regions(&state.region_service).await?,
        RegionAction::Show { id } => show_region(&state.region_service, &id).await?,
        RegionAction::Reconcile { dry_run, yes } => reconcile(&state, dry_run, yes).await?,
        RegionAction::RepairProviders => {
            println!("{}", "🔧 Repairing provider associations".bright_blue().bold());

            let report = state
                .repair_service
                .repair_provider_associations()
                .await
                .map_err(|e| anyhow::anyhow!("Provider repair failed: {}", e))?;

            println!(
                "  Regions repaired: {}",
                report.regions_repaired.to_string().bright_green().bold()
            );
        }
        RegionAction::RepairShippingOptions => {
            println!("{}", "🔧 Repairing shipping options".bright_blue().bold());

            let report = state
                .repair_service
                .repair_shipping_option_defaults()
                .await
                .map_err(|e| anyhow::anyhow!("Shipping option repair failed: {}", e))?;

            println!(
                "  Options repaired: {}",
                report.options_repaired.to_string().bright_green().bold()
            );
            for id in &report.option_ids {
                println!("    {}", id.bright_black());
            }
        }
    }

    Ok(())
}

/// Lists live regions.
///
/// # Output Format
///
/// ```text
/// 📋 Regions
///
///   ID                   Name                      Currency  Countries  Shipping
///   ─────────────────────────────────────────────────────────────────────────────
///   reg_us               United States             usd       1          3
/// ```
async fn list_regions(service: &RegionService<dyn RegionRepository>) -> Result<()> {
    println!("{}", "📋 Regions".bright_blue().bold());
    println!();

    let regions = service
        .list_regions()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list regions: {}", e))?;

    if regions.is_empty() {
        println!("{}", "  No regions found".yellow());
        return Ok(());
    }

    println!(
        "  {:<20} {:<25} {:<9} {:<10} {:<8}",
        "ID".bright_white().bold(),
        "Name".bright_white().bold(),
        "Currency".bright_white().bold(),
        "Countries".bright_white().bold(),
        "Shipping".bright_white().bold()
    );
    println!("  {}", "─".repeat(77).bright_black());

    for aggregate in &regions {
        let region = &aggregate.region;
        println!(
            "  {:<20} {:<25} {:<9} {:<10} {}",
            region.id.bright_black(),
            region.name.cyan(),
            region.currency_code,
            aggregate.countries.len(),
            aggregate.shipping_options.len()
        );
    }

    println!();
    println!(
        "  Total: {}",
        regions.len().to_string().bright_white().bold()
    );
    println!();

    Ok(())
}

async fn show_region(service: &RegionService<dyn RegionRepository>, id: &str) -> Result<()> {
    let aggregate = service
        .get_region(id)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let region = &aggregate.region;

    println!("{} {}", "🌍".bright_blue(), region.name.bright_white().bold());
    println!();
    println!("  ID:          {}", region.id.bright_black());
    match &aggregate.currency {
        Some(currency) => println!(
            "  Currency:    {} ({})",
            region.currency_code.cyan(),
            currency.name
        ),
        None => println!("  Currency:    {}", region.currency_code.cyan()),
    }
    println!(
        "  Tax rate:    {}",
        region
            .tax_rate
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "  Fulfillment: {}",
        join_or_dash(aggregate.fulfillment_providers.iter())
    );
    println!(
        "  Payment:     {}",
        join_or_dash(aggregate.payment_providers.iter())
    );
    println!(
        "  Countries:   {}",
        join_or_dash(aggregate.countries.iter().map(|c| &c.iso_2))
    );
    println!();

    if aggregate.shipping_options.is_empty() {
        println!("{}", "  No shipping options".yellow());
    } else {
        println!("  {}", "Shipping options:".bright_white().bold());
        for option in &aggregate.shipping_options {
            let status = if option.needs_defaults() {
                "INCOMPLETE".yellow()
            } else {
                "OK".green()
            };
            println!(
                "    {:<20} {:<25} {}",
                option.id.bright_black(),
                option.name,
                status
            );
        }
    }
    println!();

    Ok(())
}

/// Reconciles duplicate regions, asking for confirmation before merging.
async fn reconcile(state: &AppState, dry_run: bool, skip_confirm: bool) -> Result<()> {
    println!("{}", "🔀 Reconcile duplicate regions".bright_blue().bold());
    println!();

    let groups = state
        .reconcile_service
        .plan()
        .await
        .map_err(|e| anyhow::anyhow!("Duplicate scan failed: {}", e))?;

    if groups.is_empty() {
        println!("{}", "✅ No duplicate regions".green().bold());
        return Ok(());
    }

    for group in &groups {
        println!(
            "  {} / {}",
            group.name.cyan().bold(),
            group.currency_code.cyan()
        );
        println!(
            "    keep   {} ({} shipping options)",
            group.survivor.id.bright_green(),
            group.survivor.shipping_option_count
        );
        for donor in &group.donors {
            println!(
                "    merge  {} ({} shipping options)",
                donor.id.yellow(),
                donor.shipping_option_count
            );
        }
    }
    println!();

    if dry_run {
        println!(
            "{}",
            format!("Dry run: {} group(s) would be merged", groups.len()).yellow()
        );
        return Ok(());
    }

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Merge these regions?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let report = state
        .reconcile_service
        .reconcile(false)
        .await
        .map_err(|e| anyhow::anyhow!("Reconcile failed: {}", e))?;

    print_reconcile_report(&report);

    Ok(())
}

fn print_reconcile_report(report: &ReconcileReport) {
    println!();
    for merged in &report.merged {
        println!(
            "  {} {} <- {} (shipping options: {}, countries: {})",
            "✅".green(),
            merged.survivor_id.bright_green(),
            merged.donor_ids.join(", "),
            merged.shipping_options_moved,
            merged.countries_moved
        );
    }
    for failure in &report.failures {
        println!(
            "  {} {} -> {}: {}",
            "❌".red(),
            failure.donor_id.yellow(),
            failure.survivor_id,
            failure.reason.red()
        );
    }

    if let Some(repair) = &report.provider_repair {
        println!(
            "  Provider associations repaired: {}",
            repair.regions_repaired.to_string().bright_green()
        );
    }
    if let Some(error) = &report.provider_repair_error {
        println!(
            "  {} Provider repair failed: {}",
            "⚠️".yellow(),
            error.message.red()
        );
    }

    println!();
    let summary = format!(
        "Groups: {}  merged: {}  failed donors: {}",
        report.groups_found,
        report.merged.len(),
        report.failures.len()
    );
    if report.failures.is_empty() {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary.yellow().bold());
    }
}

/// Handles database commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Migrate => {
            println!("{}", "📦 Applying migrations...".bright_blue());

            server::run_migrations(pool).await?;

            println!("{}", "✅ Migrations applied".green().bold());
        }
    }

    Ok(())
}

fn join_or_dash<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let joined = items.map(String::as_str).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "-".to_string()
    } else {
        joined
    }
}
