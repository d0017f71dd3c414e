//! # Actions
//!
//! A user action is a batch of ledger calls that must succeed or fail as a
//! whole. This module only *describes* actions and validates them; the
//! transaction coordinator in `inaya-db` executes them.
//!
//! ## Action Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Action::validate()  ── pure, no store access                          │
//! │        │                                                                │
//! │        ├── Err(InvalidAction { line: Some(k), .. })  → nothing touched  │
//! │        ▼                                                                │
//! │   BEGIN                                                                 │
//! │   headers (sale, delivery)                                              │
//! │   line 0 → line 1 → ... → line n   (submitted order)                    │
//! │        │                                                                │
//! │        ├── any failure → ROLLBACK                                       │
//! │        ▼                                                                │
//! │   COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::CustomerDetails;
use crate::validation::{validate_customer, validate_id, validate_quantity, validate_reason};
use crate::MAX_ACTION_LINES;

// =============================================================================
// Lines
// =============================================================================

/// One line of a goods receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GrnLine {
    pub stock_id: i64,
    pub quantity: i64,
}

/// One line of a checkout or pickup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub stock_id: i64,
    pub quantity: i64,
}

/// One line of a return batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnLine {
    pub sale_item_id: i64,
    pub quantity: i64,
    pub reason: String,
}

/// A single stock ledger operation, for callers composing their own batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "op", rename_all = "snake_case")]
#[ts(export)]
pub enum LedgerCall {
    Receive { stock_id: i64, quantity: i64 },
    Sell { stock_id: i64, quantity: i64 },
    ReturnUnits { sale_item_id: i64, quantity: i64, reason: String },
    ReverseDelivery { delivery_id: i64, reason: String },
    MarkDelivered { delivery_id: i64 },
}

impl LedgerCall {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            LedgerCall::Receive { stock_id, quantity } | LedgerCall::Sell { stock_id, quantity } => {
                validate_id("stock_id", *stock_id)?;
                validate_quantity(*quantity)
            }
            LedgerCall::ReturnUnits {
                sale_item_id,
                quantity,
                reason,
            } => {
                validate_id("sale_item_id", *sale_item_id)?;
                validate_quantity(*quantity)?;
                validate_reason(reason).map(|_| ())
            }
            LedgerCall::ReverseDelivery {
                delivery_id,
                reason,
            } => {
                validate_id("delivery_id", *delivery_id)?;
                validate_reason(reason).map(|_| ())
            }
            LedgerCall::MarkDelivered { delivery_id } => validate_id("delivery_id", *delivery_id),
        }
    }
}

// =============================================================================
// Action
// =============================================================================

/// A user action: the unit of atomicity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum Action {
    /// Goods receipt: one GRN row and a stock increase per line.
    ReceiveGoods { lines: Vec<GrnLine> },
    /// Counter sale: one sale header, one sale item per line.
    Checkout {
        customer: CustomerDetails,
        lines: Vec<SaleLine>,
    },
    /// Sale handed to a courier: sale + delivery headers, sale and delivery
    /// items per line.
    Pickup {
        customer: CustomerDetails,
        lines: Vec<SaleLine>,
    },
    /// Customer returns against existing sale items.
    ReturnBatch { lines: Vec<ReturnLine> },
    /// Courier confirms delivery.
    MarkDelivered { delivery_id: i64 },
    /// Courier brought the goods back; stock is restored.
    CancelDelivery { delivery_id: i64, reason: String },
    /// Raw ordered sequence of ledger calls.
    Ledger { calls: Vec<LedgerCall> },
}

/// Why an action was refused before touching the store.
///
/// `line` is `None` when the header (customer, delivery id, the action as
/// a whole) is at fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidAction {
    pub line: Option<usize>,
    pub error: ValidationError,
}

impl InvalidAction {
    fn header(error: ValidationError) -> Self {
        InvalidAction { line: None, error }
    }

    fn line(index: usize, error: ValidationError) -> Self {
        InvalidAction {
            line: Some(index),
            error,
        }
    }
}

impl fmt::Display for InvalidAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(index) => write!(f, "line {}: {}", index, self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for InvalidAction {}

impl Action {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::ReceiveGoods { .. } => "receive_goods",
            Action::Checkout { .. } => "checkout",
            Action::Pickup { .. } => "pickup",
            Action::ReturnBatch { .. } => "return_batch",
            Action::MarkDelivered { .. } => "mark_delivered",
            Action::CancelDelivery { .. } => "cancel_delivery",
            Action::Ledger { .. } => "ledger",
        }
    }

    /// Number of lines applied after the headers.
    pub fn line_count(&self) -> usize {
        match self {
            Action::ReceiveGoods { lines } => lines.len(),
            Action::Checkout { lines, .. } | Action::Pickup { lines, .. } => lines.len(),
            Action::ReturnBatch { lines } => lines.len(),
            Action::MarkDelivered { .. } | Action::CancelDelivery { .. } => 1,
            Action::Ledger { calls } => calls.len(),
        }
    }

    /// Validates the whole action without touching the store.
    ///
    /// ## Example
    /// ```rust
    /// use inaya_core::action::{Action, GrnLine};
    ///
    /// let action = Action::ReceiveGoods {
    ///     lines: vec![
    ///         GrnLine { stock_id: 1, quantity: 5 },
    ///         GrnLine { stock_id: 2, quantity: 0 },
    ///     ],
    /// };
    /// assert_eq!(action.validate().unwrap_err().line, Some(1));
    /// ```
    pub fn validate(&self) -> Result<(), InvalidAction> {
        if self.line_count() == 0 {
            return Err(InvalidAction::header(ValidationError::Empty {
                what: self.name().to_string(),
            }));
        }

        if self.line_count() > MAX_ACTION_LINES {
            return Err(InvalidAction::header(ValidationError::OutOfRange {
                field: "lines".to_string(),
                min: 1,
                max: MAX_ACTION_LINES as i64,
            }));
        }

        match self {
            Action::ReceiveGoods { lines } => {
                for (index, line) in lines.iter().enumerate() {
                    check_stock_line(line.stock_id, line.quantity)
                        .map_err(|e| InvalidAction::line(index, e))?;
                }
            }
            Action::Checkout { customer, lines } | Action::Pickup { customer, lines } => {
                validate_customer(customer).map_err(InvalidAction::header)?;
                for (index, line) in lines.iter().enumerate() {
                    check_stock_line(line.stock_id, line.quantity)
                        .map_err(|e| InvalidAction::line(index, e))?;
                }
            }
            Action::ReturnBatch { lines } => {
                for (index, line) in lines.iter().enumerate() {
                    validate_id("sale_item_id", line.sale_item_id)
                        .and_then(|_| validate_quantity(line.quantity))
                        .and_then(|_| validate_reason(&line.reason).map(|_| ()))
                        .map_err(|e| InvalidAction::line(index, e))?;
                }
            }
            Action::MarkDelivered { delivery_id } => {
                validate_id("delivery_id", *delivery_id).map_err(InvalidAction::header)?;
            }
            Action::CancelDelivery {
                delivery_id,
                reason,
            } => {
                validate_id("delivery_id", *delivery_id).map_err(InvalidAction::header)?;
                validate_reason(reason).map_err(InvalidAction::header)?;
            }
            Action::Ledger { calls } => {
                for (index, call) in calls.iter().enumerate() {
                    call.validate().map_err(|e| InvalidAction::line(index, e))?;
                }
            }
        }

        Ok(())
    }
}

fn check_stock_line(stock_id: i64, quantity: i64) -> Result<(), ValidationError> {
    validate_id("stock_id", stock_id)?;
    validate_quantity(quantity)
}

// =============================================================================
// Unit Tests
// =============================================================================
