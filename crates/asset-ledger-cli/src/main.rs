mod commands;
mod input;
mod logging;
mod progress;

use std::path::Path;
use std::process;

use anyhow::Result;
use asset_ledger_core::ledger::{compliance_summary, optimization_candidates, true_up_report};
use asset_ledger_core::model::LicenseStatus;
use asset_ledger_core::storage::{Database, InventoryStore};
use asset_ledger_core::{AppConfig, EntityKind, Inventory, ReconcileEngine, ReconcileReport};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use serde_json::json;
use tracing::{error, info};

fn main() {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match asset_ledger_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let outcome = match args.command {
        Some(Commands::Reconcile {
            input,
            record_sightings,
            json,
        }) => run_reconcile(&config, &input, record_sightings, json),
        Some(Commands::Licenses { json }) => run_licenses(&config, json),
        Some(Commands::Audit { entity, id }) => run_audit(&config, entity.into(), &id),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(())
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = outcome {
        error!("Error: {:#}", err);
        process::exit(1);
    }
}

fn open_inventory(config: &AppConfig) -> Result<Inventory<Database>> {
    let db = Database::open(&config.database_path)?;
    Ok(Inventory::new(db).with_config(config))
}

fn run_reconcile(config: &AppConfig, input: &Path, record_sightings: bool, as_json: bool) -> Result<()> {
    let discovered = input::load_discovered(input, config.discovery.max_passthrough_entries)?;
    let inventory = open_inventory(config)?;
    let engine = ReconcileEngine::from_config(config);
    let reporter = CliReporter::new();

    let report = engine.run_against_store(inventory.store(), &discovered, inventory.now(), &reporter)?;

    if record_sightings {
        let sightings = inventory.record_sightings(&report.outcome.matches, &discovered);
        info!(
            "{} assets stamped as seen, {} failed",
            format!("{}", sightings.success).green(),
            format!("{}", sightings.failed).red()
        );
    }

    if as_json {
        let body = json!({
            "stats": report.stats,
            "matches": report.outcome.matches,
            "unmatched": report.outcome.unmatched,
            "orphaned": report.outcome.orphaned,
            "duplicate_serial_groups": report.outcome.duplicate_serial_groups,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print_reconcile(&report);
    }
    Ok(())
}

fn print_reconcile(report: &ReconcileReport) {
    let stats = &report.stats;
    println!();
    println!(
        "{} matches (exact {}, high {}, medium {}, low {}), average confidence {:.1}",
        format!("{}", stats.total).green(),
        stats.exact,
        stats.high,
        stats.medium,
        stats.low,
        stats.average_confidence
    );

    for m in &report.outcome.matches {
        println!(
            "  {} -> {}  {:.0} ({})",
            m.external_id,
            m.asset_id.cyan(),
            m.confidence,
            m.tier
        );
        for conflict in &m.conflicts {
            println!(
                "      {} {:?}: ledger {:?}, discovered {:?}",
                "conflict".yellow(),
                conflict.field,
                conflict.existing.as_deref().unwrap_or("-"),
                conflict.discovered.as_deref().unwrap_or("-")
            );
        }
    }

    if !report.outcome.unmatched.is_empty() {
        println!();
        println!("{} unmatched discovered records", format!("{}", report.outcome.unmatched.len()).yellow());
        for external_id in &report.outcome.unmatched {
            println!("  {}", external_id);
        }
    }

    if !report.outcome.orphaned.is_empty() {
        println!();
        println!("{} orphaned assets", format!("{}", report.outcome.orphaned.len()).red());
        for orphan in &report.outcome.orphaned {
            let seen = orphan
                .days_since_last_seen
                .map(|d| format!("last seen {} days ago", d))
                .unwrap_or_else(|| "never seen".to_string());
            println!("  {} {} ({:?}, {})", orphan.asset_id, orphan.name, orphan.reason, seen);
        }
    }

    for group in &report.outcome.duplicate_serial_groups {
        println!(
            "{} serial {} shared by {}",
            "duplicate".red(),
            group.serial_key,
            group.asset_ids.join(", ")
        );
    }

    info!(
        "Match: {}, Orphans: {}",
        format!("{:.2}s", report.match_duration.as_secs_f64()).green(),
        format!("{:.2}s", report.orphan_duration.as_secs_f64()).green(),
    );
}

fn run_licenses(config: &AppConfig, as_json: bool) -> Result<()> {
    let inventory = open_inventory(config)?;
    let licenses = inventory.store().list_licenses()?;
    let now = inventory.now();

    let summary = compliance_summary(&licenses);
    let true_up = true_up_report(&licenses);
    let candidates = optimization_candidates(&licenses);
    let renewals: Vec<_> = licenses
        .iter()
        .filter(|l| !l.is_archived && l.status(now) != LicenseStatus::Active)
        .collect();

    if as_json {
        let renewals: Vec<_> = renewals
            .iter()
            .map(|l| json!({ "license_id": l.id, "name": l.name, "status": l.status(now), "expiration_date": l.expiration_date }))
            .collect();
        let body = json!({
            "compliance": summary,
            "true_up": true_up,
            "optimization": candidates,
            "renewals": renewals,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!(
        "Compliance score {} across {} licenses ({} compliant, {} at risk, {} over-allocated, {} under-utilized)",
        format!("{:.1}", summary.score).green(),
        summary.total,
        summary.compliant,
        summary.at_risk,
        summary.over_allocated,
        summary.under_utilized
    );

    if !true_up.items.is_empty() {
        println!();
        println!(
            "True-up: {} seats short, {} estimated cost",
            format!("{}", true_up.total_shortfall).red(),
            format!("{:.2}", true_up.total_cost).red()
        );
        for item in &true_up.items {
            println!(
                "  {} {}/{} seats, short {} ({:.2})",
                item.license_id, item.used_seats, item.total_seats, item.shortfall, item.cost
            );
        }
    }

    if !candidates.is_empty() {
        println!();
        println!("Downgrade candidates:");
        for c in &candidates {
            println!(
                "  {} {} {}/{} seats ({:.0}%), keep {}, save {}",
                c.license_id,
                c.name,
                c.used_seats,
                c.total_seats,
                c.utilization * 100.0,
                c.recommended_seats,
                format!("{:.2}", c.potential_savings).cyan()
            );
        }
    }

    for license in renewals {
        let label = match license.status(now) {
            LicenseStatus::Expired => "expired".red(),
            _ => "expiring".yellow(),
        };
        println!("{} {} {}", label, license.id, license.name);
    }
    Ok(())
}

fn run_audit(config: &AppConfig, entity: EntityKind, id: &str) -> Result<()> {
    let inventory = open_inventory(config)?;
    match entity {
        EntityKind::Asset => {
            inventory.asset(id)?;
        }
        EntityKind::License => {
            inventory.license(id)?;
        }
    }

    for entry in inventory.audit_trail(entity, id)? {
        let mut line = format!(
            "{} {} by {}",
            entry.timestamp.to_rfc3339(),
            format!("{}", entry.action).cyan(),
            entry.actor
        );
        if let Some(subject) = &entry.subject {
            line.push_str(&format!(" [{}]", subject));
        }
        if let Some(reason) = &entry.reason {
            line.push_str(&format!(": {}", reason));
        }
        println!("{}", line);
    }
    Ok(())
}
