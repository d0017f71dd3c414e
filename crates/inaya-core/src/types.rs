//! # Domain Types
//!
//! Entities of the back-office ledger, one struct per table.
//!
//! ## Entity Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Entity Relationships                            │
//! │                                                                         │
//! │   Stock ◄──── GoodsReceipt (grn)                                        │
//! │     ▲                                                                   │
//! │     │                                                                   │
//! │   SaleItem ───► Sale ◄──── Delivery                                     │
//! │     ▲  ▲                      │                                         │
//! │     │  └────── DeliveryItem ◄─┘                                         │
//! │     │                                                                   │
//! │   ReturnRecord                                                          │
//! │                                                                         │
//! │   User (stand-alone, soft-deactivated)                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entities reference each other by `i64` id only. There are no object
//! graphs; documents that need related rows are assembled explicitly (see
//! [`crate::documents`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Stock
// =============================================================================

/// One sellable item and its on-hand count.
///
/// `quantity` is the single source of truth for stock on hand. It is only
/// ever changed by the stock ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Stock {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    pub selling_price: Money,
    /// Maximum retail price printed on the tag.
    pub mrp: Money,
}

impl Stock {
    /// Checks whether `quantity` units can leave the shelf.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.quantity >= quantity
    }
}

// =============================================================================
// Goods Receipt
// =============================================================================

/// A goods received note: one inbound stock event. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct GoodsReceipt {
    pub id: i64,
    pub stock_id: i64,
    pub quantity: i64,
    /// Selling price of the stock at the moment of receipt (frozen).
    pub unit_price: Money,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
}

impl GoodsReceipt {
    /// Total selling value of the received units at receipt-time price.
    #[inline]
    pub fn total_selling_price(&self) -> Money {
        self.unit_price * self.quantity
    }
}

// =============================================================================
// Customer
// =============================================================================

/// Optional customer details printed on sale and delivery documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerDetails {
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
}

impl CustomerDetails {
    /// Creates fully populated customer details.
    pub fn new(
        name: impl Into<String>,
        mobile: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        CustomerDetails {
            name: Some(name.into()),
            mobile: Some(mobile.into()),
            address: Some(address.into()),
        }
    }

    /// Trims every field and turns blank ones into `None`.
    pub fn normalized(&self) -> Self {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        CustomerDetails {
            name: clean(&self.name),
            mobile: clean(&self.mobile),
            address: clean(&self.address),
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// Sale header. Owns a sequence of [`SaleItem`] rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: i64,
    pub customer_name: Option<String>,
    pub customer_mobile: Option<String>,
    pub customer_address: Option<String>,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
}

/// A line item of a sale.
///
/// ## Snapshot Pattern
/// `unit_price` is the stock's selling price frozen at sale time.
/// `quantity` only ever decreases (through returns) and `total_price` is
/// kept equal to `quantity × unit_price` by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: i64,
    pub sale_id: i64,
    pub stock_id: i64,
    /// Remaining (not yet returned) quantity.
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
}

// =============================================================================
// Return
// =============================================================================

/// A customer return against one sale item. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnRecord {
    pub id: i64,
    pub sale_item_id: i64,
    pub quantity: i64,
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
}

// =============================================================================
// Delivery Status
// =============================================================================

/// Lifecycle of a courier pickup.
///
/// ```text
/// Picked ──(mark delivered)──► Delivered   [terminal]
///    │
///    └────(cancel)───────────► Cancelled   [terminal]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum DeliveryStatus {
    /// Goods handed to the courier; stock already deducted.
    #[default]
    Picked,
    /// Customer received the goods.
    Delivered,
    /// Courier brought the goods back; stock restored.
    Cancelled,
}

impl DeliveryStatus {
    /// Stored and displayed name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Picked => "Picked",
            DeliveryStatus::Delivered => "Delivered",
            DeliveryStatus::Cancelled => "Cancelled",
        }
    }

    /// Terminal states admit no further transition.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    /// Whether `self → next` is an edge of the state machine.
    #[inline]
    pub const fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        matches!(
            (self, next),
            (DeliveryStatus::Picked, DeliveryStatus::Delivered)
                | (DeliveryStatus::Picked, DeliveryStatus::Cancelled)
        )
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "picked" => Ok(DeliveryStatus::Picked),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "cancelled" | "canceled" => Ok(DeliveryStatus::Cancelled),
            other => Err(format!("unknown delivery status: {}", other)),
        }
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// Delivery header for a pickup-style sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Delivery {
    pub id: i64,
    pub sale_id: i64,
    pub status: DeliveryStatus,
    pub customer_name: Option<String>,
    pub customer_mobile: Option<String>,
    pub customer_address: Option<String>,
    /// Why the delivery came back (set on cancellation).
    pub reason: Option<String>,
    #[ts(as = "String")]
    pub date: DateTime<Utc>,
}

/// Links a delivery to the sale item it carries; used to reverse stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DeliveryItem {
    pub id: i64,
    pub delivery_id: i64,
    pub sale_item_id: i64,
    pub quantity: i64,
}

// =============================================================================
// Users
// =============================================================================

/// Role of an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum Role {
    Admin,
    Salesman,
    #[serde(rename = "Delivery Boy")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Delivery Boy"))]
    DeliveryBoy,
}

impl Role {
    /// Stored and displayed name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Salesman => "Salesman",
            Role::DeliveryBoy => "Delivery Boy",
        }
    }

    /// Only admins may manage users.
    #[inline]
    pub const fn can_manage_users(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "salesman" => Ok(Role::Salesman),
            "delivery boy" | "delivery_boy" | "delivery" => Ok(Role::DeliveryBoy),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A back-office account. Never hard-deleted; see `is_active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// Argon2 PHC string. Never serialized.
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

// =============================================================================
// Unit Tests
// =============================================================================
