//! # inaya-db: Database Layer for the Inaya Back Office
//!
//! Owns the SQLite store: schema upgrades, every stock movement, and the
//! queries behind invoices and reports.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Inaya Data Flow                                  │
//! │                                                                         │
//! │  Back-office screen (checkout, GRN, returns, deliveries)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     inaya-db (THIS CRATE)                       │    │
//! │  │                                                                 │    │
//! │  │   ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐    │    │
//! │  │   │ Coordinator  │──►│   Ledger     │   │ SchemaMigrator   │    │    │
//! │  │   │ (one tx per  │   │ (guarded     │   │ (legacy shapes → │    │    │
//! │  │   │  action)     │   │  UPDATEs)    │   │  current shape)  │    │    │
//! │  │   └──────────────┘   └──────────────┘   └──────────────────┘    │    │
//! │  │   ┌──────────────────────────────────────────────────────────┐  │    │
//! │  │   │ Repositories: stock, sale, delivery, user, invoice,      │  │    │
//! │  │   │ report                                                   │  │    │
//! │  │   └──────────────────────────────────────────────────────────┘  │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, foreign_keys = ON)   inaya_cloth.db                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Schema migrator for legacy stores
//! - [`ledger`] - Stock ledger (the only writer of quantities)
//! - [`coordinator`] - One action, one transaction
//! - [`repository`] - Master data, invoices and reports
//! - [`password`] - Argon2 password hashing
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use inaya_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("inaya_cloth.db")).await?;
//!
//! let outcome = db.coordinator().execute(action).await?;
//! let invoice = db.invoices().sale(outcome.sale_id.unwrap()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod migrations;
pub mod password;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use coordinator::{ActionError, ActionOutcome, TransactionCoordinator};
pub use error::{DbError, DbResult};
pub use migrations::{DefaultAdmin, MigrationReport, SchemaMigrator};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::delivery::DeliveryRepository;
pub use repository::invoice::InvoiceQueries;
pub use repository::report::{ReportRepository, StockReport};
pub use repository::sale::SaleRepository;
pub use repository::stock::StockRepository;
pub use repository::user::UserRepository;
