//! # Error Types
//!
//! Domain-specific error types for inaya-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  inaya-core errors (this file)                                          │
//! │  ├── CoreError        - Ledger rule violations                          │
//! │  ├── ValidationError  - Input validation failures                       │
//! │  └── ErrorKind        - Coarse taxonomy shared by every layer           │
//! │                                                                         │
//! │  inaya-db errors (separate crate)                                       │
//! │  ├── DbError          - Store failures, wraps CoreError                 │
//! │  └── ActionError      - Which line of an action failed                  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ActionError → caller     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::types::DeliveryStatus;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification callers branch on without matching every variant.
///
/// `InvalidState` covers a delivery already in a terminal state and an
/// e-mail already taken by another account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientStock,
    OverReturn,
    InvalidState,
    Persistence,
}

// =============================================================================
// Core Error
// =============================================================================

/// Stock ledger and account rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Not enough units on hand to sell.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout line: Saree A × 5
    ///      │
    ///      ▼
    /// Stock on hand: 3
    ///      │
    ///      ▼
    /// InsufficientStock { name: "Saree A", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Not enough stock for Saree A: 3 available, 5 requested"
    /// ```
    #[error("Not enough stock for {name}: {available} available, {requested} requested")]
    InsufficientStock {
        stock_id: i64,
        name: String,
        available: i64,
        requested: i64,
    },

    /// More units returned than remain on the sale item.
    #[error("Cannot return {requested} units of sale item {sale_item_id}: only {remaining} remaining")]
    OverReturn {
        sale_item_id: i64,
        remaining: i64,
        requested: i64,
    },

    /// Delivery already left the `Picked` state.
    #[error("Delivery {delivery_id} is {status}, expected Picked")]
    DeliveryNotPending {
        delivery_id: i64,
        status: DeliveryStatus,
    },

    /// Sale item travels with a delivery that has not been delivered.
    #[error("Sale item {sale_item_id} belongs to delivery {delivery_id} which is {status}")]
    DeliveryInTransit {
        sale_item_id: i64,
        delivery_id: i64,
        status: DeliveryStatus,
    },

    /// E-mail already registered (active or deactivated).
    #[error("A user with email {email} already exists")]
    DuplicateEmail { email: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Units missing to satisfy an `InsufficientStock` request.
    pub fn shortfall(&self) -> Option<i64> {
        match self {
            CoreError::InsufficientStock {
                available,
                requested,
                ..
            } => Some(requested - available),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CoreError::OverReturn { .. } => ErrorKind::OverReturn,
            CoreError::DeliveryNotPending { .. }
            | CoreError::DeliveryInTransit { .. }
            | CoreError::DuplicateEmail { .. } => ErrorKind::InvalidState,
            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any store access so a rejected action touches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g. malformed e-mail).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The tag price may not undercut the selling price.
    #[error("MRP ({mrp}) must be greater than or equal to selling price ({selling_price})")]
    MrpBelowSellingPrice { mrp: String, selling_price: String },

    /// An action or batch has no lines.
    #[error("{what} must contain at least one line")]
    Empty { what: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            stock_id: 1,
            name: "Saree A".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Not enough stock for Saree A: 3 available, 5 requested"
        );
        assert_eq!(err.shortfall(), Some(2));
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }

    #[test]
    fn test_duplicate_email_is_invalid_state() {
        let err = CoreError::DuplicateEmail {
            email: "a@inaya.pk".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_delivery_errors_are_invalid_state() {
        let err = CoreError::DeliveryNotPending {
            delivery_id: 4,
            status: DeliveryStatus::Delivered,
        };
        assert_eq!(err.to_string(), "Delivery 4 is Delivered, expected Picked");
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(err.shortfall(), None);
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.kind(), ErrorKind::Validation);
    }
}
