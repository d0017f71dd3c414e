//! # Stock Ledger
//!
//! The only code allowed to change `stock.quantity`, `sale_item.quantity`,
//! `sale_item.total_price` and `delivery.status`.
//!
//! ## Guarded Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Check fused with the write                           │
//! │                                                                         │
//! │  UPDATE stock                                                           │
//! │     SET quantity = quantity - ?qty                                      │
//! │   WHERE id = ?id AND quantity >= ?qty     ◄── the check                 │
//! │  RETURNING ...                                                          │
//! │       │                                                                 │
//! │       ├── row returned ──► done                                         │
//! │       │                                                                 │
//! │       └── no row ──► re-read, inaya_core::ledger decides the error      │
//! │                      (NotFound / InsufficientStock / OverReturn ...)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function takes the caller's connection; the transaction
//! coordinator passes its open transaction so a failed call rolls back the
//! whole action.

use sqlx::SqliteConnection;
use tracing::debug;

use inaya_core::ledger::{check_receive, check_return, check_returnable_delivery, check_sell};
use inaya_core::validation::{validate_quantity, validate_reason};
use inaya_core::{Delivery, DeliveryStatus, GoodsReceipt, ReturnRecord, SaleItem, Stock};

use crate::error::{DbError, DbResult};
use crate::repository::{DELIVERY_COLUMNS, SALE_ITEM_COLUMNS, STOCK_COLUMNS};

// =============================================================================
// Stock Movements
// =============================================================================

/// Adds `qty` units to a stock row.
pub async fn receive(conn: &mut SqliteConnection, stock_id: i64, qty: i64) -> DbResult<Stock> {
    check_receive(qty)?;
    debug!(stock_id, qty, "Ledger receive");

    let sql = format!(
        "UPDATE stock SET quantity = quantity + ?2 WHERE id = ?1 RETURNING {}",
        STOCK_COLUMNS
    );
    sqlx::query_as::<_, Stock>(&sql)
        .bind(stock_id)
        .bind(qty)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Stock", stock_id))
}

/// Removes `qty` units from a stock row, never below zero.
///
/// ## Errors
/// * `NotFound` - no such stock
/// * `InsufficientStock` - fewer than `qty` units on hand; quantity unchanged
pub async fn sell(conn: &mut SqliteConnection, stock_id: i64, qty: i64) -> DbResult<Stock> {
    validate_quantity(qty)?;
    debug!(stock_id, qty, "Ledger sell");

    let sql = format!(
        "UPDATE stock SET quantity = quantity - ?2 WHERE id = ?1 AND quantity >= ?2 RETURNING {}",
        STOCK_COLUMNS
    );
    let updated = sqlx::query_as::<_, Stock>(&sql)
        .bind(stock_id)
        .bind(qty)
        .fetch_optional(&mut *conn)
        .await?;

    match updated {
        Some(stock) => Ok(stock),
        None => {
            let current = fetch_stock(conn, stock_id).await?;
            check_sell(&current, qty)?;
            Err(DbError::TransactionFailed(format!(
                "stock {} changed during sell",
                stock_id
            )))
        }
    }
}

/// Receives goods and appends the GRN row, snapshotting the selling price.
pub async fn record_receipt(
    conn: &mut SqliteConnection,
    stock_id: i64,
    qty: i64,
) -> DbResult<GoodsReceipt> {
    let stock = receive(conn, stock_id, qty).await?;

    let grn = sqlx::query_as::<_, GoodsReceipt>(
        r#"
        INSERT INTO grn (stock_id, quantity, unit_price)
        VALUES (?1, ?2, ?3)
        RETURNING id, stock_id, quantity, unit_price, date
        "#,
    )
    .bind(stock.id)
    .bind(qty)
    .bind(stock.selling_price)
    .fetch_one(&mut *conn)
    .await?;

    debug!(grn_id = grn.id, stock_id, quantity = stock.quantity, "GRN recorded");
    Ok(grn)
}

/// Sells from stock and appends the sale item, freezing the unit price.
pub async fn record_sale_item(
    conn: &mut SqliteConnection,
    sale_id: i64,
    stock_id: i64,
    qty: i64,
) -> DbResult<SaleItem> {
    let stock = sell(conn, stock_id, qty).await?;
    let unit_price = stock.selling_price;

    let sql = format!(
        "INSERT INTO sale_item (sale_id, stock_id, quantity, unit_price, total_price) VALUES (?1, ?2, ?3, ?4, ?5) RETURNING {}",
        SALE_ITEM_COLUMNS
    );
    let item = sqlx::query_as::<_, SaleItem>(&sql)
        .bind(sale_id)
        .bind(stock_id)
        .bind(qty)
        .bind(unit_price)
        .bind(unit_price * qty)
        .fetch_one(&mut *conn)
        .await?;

    debug!(sale_item_id = item.id, sale_id, stock_id, qty, "Sale item recorded");
    Ok(item)
}

// =============================================================================
// Returns
// =============================================================================

/// Takes back `qty` units of a sale item.
///
/// ## What This Does
/// 1. Rejects the return if the item rides on a delivery that is not
///    `Delivered` (a pickup still with the courier, or one already
///    restocked by a cancellation)
/// 2. Decrements the sale item and recomputes its total
/// 3. Puts the units back on the shelf
/// 4. Appends the return row
pub async fn return_units(
    conn: &mut SqliteConnection,
    sale_item_id: i64,
    qty: i64,
    reason: &str,
) -> DbResult<ReturnRecord> {
    validate_quantity(qty)?;
    let reason = validate_reason(reason)?;
    debug!(sale_item_id, qty, "Ledger return");

    let item = fetch_sale_item(conn, sale_item_id).await?;
    check_return(&item, qty)?;

    let delivery: Option<(i64, DeliveryStatus)> = sqlx::query_as(
        r#"
        SELECT d.id, d.status
        FROM delivery_item di
        JOIN delivery d ON d.id = di.delivery_id
        WHERE di.sale_item_id = ?1
        ORDER BY d.id DESC
        LIMIT 1
        "#,
    )
    .bind(sale_item_id)
    .fetch_optional(&mut *conn)
    .await?;
    check_returnable_delivery(sale_item_id, delivery)?;

    // SET expressions see the pre-update row.
    let sql = format!(
        "UPDATE sale_item SET quantity = quantity - ?2, total_price = (quantity - ?2) * unit_price WHERE id = ?1 AND quantity >= ?2 RETURNING {}",
        SALE_ITEM_COLUMNS
    );
    let updated = sqlx::query_as::<_, SaleItem>(&sql)
        .bind(sale_item_id)
        .bind(qty)
        .fetch_optional(&mut *conn)
        .await?;

    let updated = match updated {
        Some(updated) => updated,
        None => {
            let current = fetch_sale_item(conn, sale_item_id).await?;
            check_return(&current, qty)?;
            return Err(DbError::TransactionFailed(format!(
                "sale item {} changed during return",
                sale_item_id
            )));
        }
    };

    receive(conn, updated.stock_id, qty).await?;

    let record = sqlx::query_as::<_, ReturnRecord>(
        r#"
        INSERT INTO "return" (sale_item_id, quantity, reason)
        VALUES (?1, ?2, ?3)
        RETURNING id, sale_item_id, quantity, reason, date
        "#,
    )
    .bind(sale_item_id)
    .bind(qty)
    .bind(&reason)
    .fetch_one(&mut *conn)
    .await?;

    debug!(
        return_id = record.id,
        sale_item_id,
        remaining = updated.quantity,
        "Return recorded"
    );
    Ok(record)
}

// =============================================================================
// Deliveries
// =============================================================================

/// Cancels a pickup and puts every carried unit back on the shelf.
pub async fn reverse_delivery(
    conn: &mut SqliteConnection,
    delivery_id: i64,
    reason: &str,
) -> DbResult<Delivery> {
    let reason = validate_reason(reason)?;
    debug!(delivery_id, "Ledger reverse delivery");

    let delivery =
        transition_delivery(conn, delivery_id, DeliveryStatus::Cancelled, Some(&reason)).await?;

    let carried: Vec<(i64, i64)> = sqlx::query_as(
        r#"
        SELECT si.stock_id, di.quantity
        FROM delivery_item di
        JOIN sale_item si ON si.id = di.sale_item_id
        WHERE di.delivery_id = ?1
        ORDER BY di.id
        "#,
    )
    .bind(delivery_id)
    .fetch_all(&mut *conn)
    .await?;

    for (stock_id, qty) in carried {
        receive(conn, stock_id, qty).await?;
    }

    Ok(delivery)
}

/// Confirms a pickup reached the customer. No stock effect.
pub async fn mark_delivered(conn: &mut SqliteConnection, delivery_id: i64) -> DbResult<Delivery> {
    debug!(delivery_id, "Ledger mark delivered");
    transition_delivery(conn, delivery_id, DeliveryStatus::Delivered, None).await
}

/// Moves a delivery out of `Picked`; the status check is part of the UPDATE.
async fn transition_delivery(
    conn: &mut SqliteConnection,
    delivery_id: i64,
    next: DeliveryStatus,
    reason: Option<&str>,
) -> DbResult<Delivery> {
    let sql = format!(
        "UPDATE delivery SET status = ?2, reason = COALESCE(?3, reason) WHERE id = ?1 AND status = ?4 RETURNING {}",
        DELIVERY_COLUMNS
    );
    let updated = sqlx::query_as::<_, Delivery>(&sql)
        .bind(delivery_id)
        .bind(next)
        .bind(reason)
        .bind(DeliveryStatus::Picked)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(delivery) = updated {
        return Ok(delivery);
    }

    let status: DeliveryStatus = sqlx::query_scalar("SELECT status FROM delivery WHERE id = ?1")
        .bind(delivery_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Delivery", delivery_id))?;

    status.transition(next, delivery_id)?;
    Err(DbError::TransactionFailed(format!(
        "delivery {} changed during update",
        delivery_id
    )))
}

// =============================================================================
// Lookups
// =============================================================================

async fn fetch_stock(conn: &mut SqliteConnection, stock_id: i64) -> DbResult<Stock> {
    let sql = format!("SELECT {} FROM stock WHERE id = ?1", STOCK_COLUMNS);
    sqlx::query_as::<_, Stock>(&sql)
        .bind(stock_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Stock", stock_id))
}

async fn fetch_sale_item(conn: &mut SqliteConnection, sale_item_id: i64) -> DbResult<SaleItem> {
    let sql = format!("SELECT {} FROM sale_item WHERE id = ?1", SALE_ITEM_COLUMNS);
    sqlx::query_as::<_, SaleItem>(&sql)
        .bind(sale_item_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("SaleItem", sale_item_id))
}

// =============================================================================
// Unit Tests
// =============================================================================
