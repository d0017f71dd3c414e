//! # Inaya Back-Office
//!
//! Startup binary: loads configuration, opens the store, runs the schema
//! migrator and prints back-office reports.
//!
//! ## Startup Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Back-Office Startup                             │
//! │                                                                         │
//! │  1. Initialize Tracing ───────────────────────────────────────────────► │
//! │     • tracing-subscriber with env filter                                │
//! │     • Default: info,inaya=debug,sqlx=warn (override with RUST_LOG)      │
//! │                                                                         │
//! │  2. Load Configuration ───────────────────────────────────────────────► │
//! │     • defaults → backoffice.toml → INAYA_* env → validate()             │
//! │                                                                         │
//! │  3. Open Database ────────────────────────────────────────────────────► │
//! │     • Create parent directory, connect pool                             │
//! │     • Run the schema migrator and log every change / warning            │
//! │                                                                         │
//! │  4. Run Command ──────────────────────────────────────────────────────► │
//! │     • migrate | stock | grn | deliveries | users | reset-password       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```bash
//! backoffice                                   # migrate and print the log
//! backoffice --config ./backoffice.toml stock  # stock on hand + valuation
//! backoffice deliveries picked                 # open courier pickups
//! backoffice --json grn                        # GRN report as JSON
//! backoffice reset-password owner@inaya.pk NEW # recover a legacy account
//! ```

mod config;

use std::error::Error;
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use inaya_core::DeliveryStatus;
use inaya_db::{Database, MigrationReport};

use crate::config::BackofficeConfig;

#[derive(Debug, Parser)]
#[command(
    name = "backoffice",
    about = "Inaya back-office: schema migrator, reports and account recovery",
    version
)]
struct Cli {
    #[arg(
        short,
        long,
        global = true,
        value_name = "PATH",
        help = "Config file (default: backoffice.toml in the config dir)"
    )]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Print reports as JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// Run the schema migrator and print its log (default)
    Migrate,
    /// Stock on hand with valuation
    Stock,
    /// Goods received, newest first
    Grn,
    /// Deliveries, optionally filtered by status
    Deliveries {
        #[arg(help = "picked, delivered or cancelled")]
        status: Option<DeliveryStatus>,
    },
    /// Accounts by role
    Users,
    /// Set a new password for an account
    ResetPassword { email: String, password: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Migrate);

    info!("Starting Inaya back-office");

    let config = BackofficeConfig::load(cli.config.as_deref())?;
    info!(
        path = %config.database.path.display(),
        max_connections = config.database.max_connections,
        "Configuration loaded"
    );

    if let Some(parent) = config.database.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db = Database::new(config.db_config()).await?;

    let report = if config.database.run_migrations || command == Command::Migrate {
        Some(db.run_migrations().await?)
    } else {
        None
    };

    let result = run_command(&db, &command, cli.json, report).await;
    db.close().await;
    result
}

/// Dispatches one sub-command against an open store.
async fn run_command(
    db: &Database,
    command: &Command,
    json: bool,
    report: Option<MigrationReport>,
) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Migrate => {
            let report = report.unwrap_or_default();
            if json {
                return print_json(&report);
            }
            print_migration_report(&report);
        }

        Command::Stock => {
            let report = db.reports().stock_report().await?;
            if json {
                return print_json(&report);
            }
            println!("{:>5}  {:<40} {:>6} {:>14} {:>14}", "ID", "NAME", "QTY", "PRICE", "MRP");
            for stock in &report.items {
                println!(
                    "{:>5}  {:<40} {:>6} {:>14} {:>14}",
                    stock.id,
                    stock.name,
                    stock.quantity,
                    stock.selling_price.to_string(),
                    stock.mrp.to_string()
                );
            }
            println!();
            println!(
                "{} items, {} units, value {} (MRP {})",
                report.valuation.items,
                report.valuation.units,
                report.valuation.selling_value,
                report.valuation.mrp_value
            );
        }

        Command::Grn => {
            let grns = db.reports().grn_report().await?;
            if json {
                return print_json(&grns);
            }
            for doc in &grns {
                println!(
                    "GRN #{:<5} {}  {:<40} {:>5} x {:>12} = {}",
                    doc.grn.id,
                    doc.grn.date.format("%Y-%m-%d %H:%M"),
                    doc.stock_name,
                    doc.grn.quantity,
                    doc.grn.unit_price.to_string(),
                    doc.total_selling_price
                );
            }
        }

        Command::Deliveries { status } => {
            let deliveries = db.reports().delivery_report(*status).await?;
            if json {
                return print_json(&deliveries);
            }
            for doc in &deliveries {
                let d = &doc.delivery;
                println!(
                    "Delivery #{:<5} sale #{:<5} {:<10} {} ({})",
                    d.id,
                    d.sale_id,
                    d.status,
                    d.customer_name.as_deref().unwrap_or("-"),
                    doc.grand_total
                );
                if let Some(reason) = &d.reason {
                    println!("    reason: {}", reason);
                }
            }
        }

        Command::Users => {
            let users = db.reports().user_report().await?;
            if json {
                return print_json(&users);
            }
            for user in &users {
                println!(
                    "{:>4}  {:<14} {:<24} {:<32} {}",
                    user.id,
                    user.role.to_string(),
                    user.name,
                    user.email,
                    if user.is_active { "active" } else { "inactive" }
                );
            }
        }

        Command::ResetPassword { email, password } => {
            let user = db
                .users()
                .get_by_email(email)
                .await?
                .ok_or_else(|| format!("no account with e-mail {}", email))?;
            db.users().set_password(user.id, password).await?;
            println!("Password reset for {} ({})", user.name, user.email);
        }
    }

    Ok(())
}

fn print_migration_report(report: &MigrationReport) {
    if report.is_noop() {
        println!("✓ Schema up to date");
        return;
    }

    for change in &report.changes {
        println!("✓ {}", change);
    }
    for warning in &report.warnings {
        println!("⚠ {}", warning);
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=inaya_db=trace` - Trace the database layer only
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,inaya=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind as ClapErrorKind;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_args() {
        let cli = Cli::try_parse_from([
            "backoffice",
            "--config",
            "/etc/inaya.toml",
            "--json",
            "deliveries",
            "picked",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/inaya.toml")));
        assert!(cli.json);
        assert_eq!(
            cli.command,
            Some(Command::Deliveries { status: Some(DeliveryStatus::Picked) })
        );

        // Global flags are accepted after the sub-command too.
        let cli = Cli::try_parse_from(["backoffice", "grn", "--json"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.command, Some(Command::Grn));

        let cli = Cli::try_parse_from(["backoffice"]).unwrap();
        assert_eq!(cli.command, None);

        let cli = Cli::try_parse_from(["backoffice", "reset-password", "owner@inaya.pk", "NEW"])
            .unwrap();
        assert_eq!(
            cli.command,
            Some(Command::ResetPassword {
                email: "owner@inaya.pk".to_string(),
                password: "NEW".to_string(),
            })
        );

        let help = Cli::try_parse_from(["backoffice", "stock", "--help"]).unwrap_err();
        assert_eq!(help.kind(), ClapErrorKind::DisplayHelp);
        assert!(Cli::try_parse_from(["backoffice", "reset-password", "owner@inaya.pk"]).is_err());
        assert!(Cli::try_parse_from(["backoffice", "restock"]).is_err());
    }

    #[test]
    fn test_bad_delivery_status_rejected() {
        let err = Cli::try_parse_from(["backoffice", "deliveries", "lost"]).unwrap_err();
        assert_eq!(err.kind(), ClapErrorKind::ValueValidation);

        let cli = Cli::try_parse_from(["backoffice", "deliveries", "Canceled"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Deliveries { status: Some(DeliveryStatus::Cancelled) })
        );
    }

    #[tokio::test]
    async fn test_reset_password_command() {
        let db = Database::new(inaya_db::DbConfig::in_memory()).await.unwrap();
        let reset = Command::ResetPassword {
            email: "admin@inaya.local".to_string(),
            password: "fresh-pass".to_string(),
        };

        run_command(&db, &reset, false, None).await.unwrap();
        assert!(db
            .users()
            .authenticate("admin@inaya.local", "fresh-pass")
            .await
            .unwrap()
            .is_some());

        let unknown = Command::ResetPassword {
            email: "nobody@inaya.pk".to_string(),
            password: "x".to_string(),
        };
        assert!(run_command(&db, &unknown, false, None).await.is_err());
    }

    #[tokio::test]
    async fn test_delivery_report_by_status() {
        let db = Database::new(inaya_db::DbConfig::in_memory()).await.unwrap();
        let open = Command::Deliveries { status: Some(DeliveryStatus::Picked) };
        run_command(&db, &open, true, None).await.unwrap();
    }
}
