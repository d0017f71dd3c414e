//! # Validation Module
//!
//! Input validation for the back office.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure)                                            │
//! │  ├── Field format and range checks                                      │
//! │  └── Whole-action checks before any store access                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Stock ledger (inaya-db)                                       │
//! │  └── Quantity rules fused with their writes                             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK (quantity >= 0)                                              │
//! │  ├── UNIQUE INDEX ux_user_email                                         │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use inaya_core::validation::{validate_quantity, validate_stock_name};
//!
//! assert_eq!(validate_stock_name("  Saree A ").unwrap(), "Saree A");
//! assert!(validate_quantity(0).is_err());
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::CustomerDetails;
use crate::{MAX_LINE_QUANTITY, MAX_NAME_LENGTH, MAX_REASON_LENGTH, MAX_UNIT_PRICE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("static email pattern")
});

// =============================================================================
// String Validators
// =============================================================================

/// Validates that a free-text field is present and at most `max` characters,
/// returning it trimmed.
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// [`validate_text`] with the default name length.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<String> {
    validate_text(field, value, MAX_NAME_LENGTH)
}

/// Validates the customer block of a sale or pickup.
///
/// Name, mobile and address are all required; the result is trimmed.
pub fn validate_customer(customer: &CustomerDetails) -> ValidationResult<CustomerDetails> {
    let name = validate_text("customer name", customer.name.as_deref().unwrap_or(""), 100)?;
    let mobile = validate_text("customer mobile", customer.mobile.as_deref().unwrap_or(""), 15)?;
    let address = validate_text(
        "customer address",
        customer.address.as_deref().unwrap_or(""),
        MAX_REASON_LENGTH,
    )?;

    Ok(CustomerDetails::new(name, mobile, address))
}

/// Validates a stock item name.
///
/// ## Example
/// ```rust
/// use inaya_core::validation::validate_stock_name;
///
/// assert!(validate_stock_name("Lawn Suit 3pc").is_ok());
/// assert!(validate_stock_name("").is_err());
/// ```
pub fn validate_stock_name(name: &str) -> ValidationResult<String> {
    validate_required("name", name)
}

/// Validates an e-mail address and returns it trimmed.
///
/// ## Example
/// ```rust
/// use inaya_core::validation::validate_email;
///
/// assert!(validate_email("admin@inaya.local").is_ok());
/// assert!(validate_email("admin@inaya").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = validate_required("email", email)?;

    if !EMAIL_RE.is_match(&email) {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@domain.tld".to_string(),
        });
    }

    Ok(email)
}

/// Validates a plaintext password before hashing.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }

    if password.len() > 128 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 128,
        });
    }

    Ok(())
}

/// Validates the reason given for a return or a cancelled delivery.
pub fn validate_reason(reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LENGTH,
        });
    }

    Ok(reason.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates the quantity entered when a stock item is created (may be 0).
pub fn validate_opening_quantity(qty: i64) -> ValidationResult<()> {
    if !(0..=MAX_LINE_QUANTITY).contains(&qty) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 0,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a selling price / MRP pair.
///
/// ## Rules
/// - Both prices must be positive
/// - Neither may exceed MAX_UNIT_PRICE
/// - MRP must be at least the selling price
///
/// ## Example
/// ```rust
/// use inaya_core::money::Money;
/// use inaya_core::validation::validate_prices;
///
/// assert!(validate_prices(Money::from_rupees(500), Money::from_rupees(650)).is_ok());
/// assert!(validate_prices(Money::from_rupees(500), Money::from_rupees(450)).is_err());
/// ```
pub fn validate_prices(selling_price: Money, mrp: Money) -> ValidationResult<()> {
    if !selling_price.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "selling price".to_string(),
        });
    }

    if !mrp.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "mrp".to_string(),
        });
    }

    for (field, price) in [("selling price", selling_price), ("mrp", mrp)] {
        if price.paise() > MAX_UNIT_PRICE {
            return Err(ValidationError::OutOfRange {
                field: field.to_string(),
                min: 1,
                max: MAX_UNIT_PRICE,
            });
        }
    }

    if mrp < selling_price {
        return Err(ValidationError::MrpBelowSellingPrice {
            mrp: mrp.to_string(),
            selling_price: selling_price.to_string(),
        });
    }

    Ok(())
}

/// Validates a row id supplied by a caller.
pub fn validate_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
