//! # inaya-core: Pure Business Logic for the Inaya Back Office
//!
//! This crate holds the ledger rules, entity types and action descriptions
//! of the back office as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Inaya Back-Office Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Presentation / invoice rendering (external)          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ Action, documents                      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ inaya-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌────────┐ ┌────────┐ ┌──────────┐ ┌───────────┐  │   │
//! │  │   │  types  │ │ money  │ │ ledger │ │  action  │ │ documents │  │   │
//! │  │   │ Stock   │ │ Money  │ │ rules  │ │ Action   │ │ invoices  │  │   │
//! │  │   │ Sale... │ │ paise  │ │        │ │ lines    │ │ totals    │  │   │
//! │  │   └─────────┘ └────────┘ └────────┘ └──────────┘ └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    inaya-db (Database Layer)                    │   │
//! │  │      migrator, stock ledger, transaction coordinator            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (Stock, Sale, Delivery, User, ...)
//! - [`money`] - Money in paise (no floating point!)
//! - [`error`] - Domain error types and the [`ErrorKind`] taxonomy
//! - [`validation`] - Field validation
//! - [`ledger`] - Pure stock movement rules
//! - [`action`] - User actions, the unit of atomicity
//! - [`documents`] - Invoice projections
//!
//! ## Example Usage
//!
//! ```rust
//! use inaya_core::ledger::{check_return, line_total};
//! use inaya_core::{Money, SaleItem};
//!
//! let item = SaleItem {
//!     id: 1,
//!     sale_id: 1,
//!     stock_id: 1,
//!     quantity: 8,
//!     unit_price: Money::from_rupees(500),
//!     total_price: Money::from_rupees(4_000),
//! };
//!
//! let remaining = check_return(&item, 3).unwrap();
//! assert_eq!(line_total(item.unit_price, remaining), Money::from_rupees(2_500));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod action;
pub mod documents;
pub mod error;
pub mod ledger;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use action::{Action, GrnLine, InvalidAction, LedgerCall, ReturnLine, SaleLine};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Upper bound on a single line quantity; catches a mistyped extra zero.
pub const MAX_LINE_QUANTITY: i64 = 100_000;

/// Upper bound on a selling price or MRP (Rs. 1 crore, in paise).
///
/// Keeps `price × MAX_LINE_QUANTITY × MAX_ACTION_LINES` inside `i64`.
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000;

/// Maximum lines in one action.
pub const MAX_ACTION_LINES: usize = 200;

/// Maximum length of names and other short text fields.
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum length of reasons and addresses.
pub const MAX_REASON_LENGTH: usize = 255;
