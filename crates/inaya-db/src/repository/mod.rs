//! # Repository Module
//!
//! Read access and master-data writes for the back office.
//!
//! ## Who Writes What
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Back-office screen                                                     │
//! │       │                                                                 │
//! │       ├── db.coordinator().execute(action) ──► quantities, sales,       │
//! │       │                                        returns, deliveries      │
//! │       │                                                                 │
//! │       └── db.stocks() / db.users() ──────────► names, prices, accounts  │
//! │                                                                         │
//! │  Repositories never touch stock.quantity after creation.                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`stock::StockRepository`] - Stock master data
//! - [`sale::SaleRepository`] - Sales, sale items and their returns
//! - [`delivery::DeliveryRepository`] - Courier pickups
//! - [`user::UserRepository`] - Accounts and authentication
//! - [`invoice::InvoiceQueries`] - Invoice documents
//! - [`report::ReportRepository`] - Back-office reports

pub mod delivery;
pub mod invoice;
pub mod report;
pub mod sale;
pub mod stock;
pub mod user;

/// Column list shared by every `Stock` query.
pub(crate) const STOCK_COLUMNS: &str = "id, name, quantity, selling_price, mrp";

/// Column list shared by every `SaleItem` query.
pub(crate) const SALE_ITEM_COLUMNS: &str =
    "id, sale_id, stock_id, quantity, unit_price, total_price";

/// Column list shared by every `Delivery` query.
pub(crate) const DELIVERY_COLUMNS: &str =
    "id, sale_id, status, customer_name, customer_mobile, customer_address, reason, date";

/// Column list shared by every `User` query.
pub(crate) const USER_COLUMNS: &str = "id, name, email, password_hash, role, is_active";
