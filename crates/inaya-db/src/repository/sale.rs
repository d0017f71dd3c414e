//! # Sale Repository
//!
//! Read access to sales, their items and the returns recorded against them.
//! Sales are written only by the transaction coordinator.

use sqlx::SqlitePool;
use tracing::debug;

use inaya_core::{ReturnRecord, Sale, SaleItem};

use super::SALE_ITEM_COLUMNS;
use crate::error::DbResult;

const SALE_COLUMNS: &str = "id, customer_name, customer_mobile, customer_address, date";

/// Repository for sale reads.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale header by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {} FROM sale WHERE id = ?1", SALE_COLUMNS);
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Most recent sales first.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sql = format!("SELECT {} FROM sale ORDER BY id DESC LIMIT ?1", SALE_COLUMNS);
        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Items of a sale in the order they were entered.
    pub async fn items(&self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        let sql = format!(
            "SELECT {} FROM sale_item WHERE sale_id = ?1 ORDER BY id",
            SALE_ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Items of a sale that can take a return right now.
    ///
    /// ## Returnable When
    /// - some units remain (`quantity > 0`)
    /// - the item is not on a delivery, or its delivery is `Delivered`
    pub async fn returnable_items(&self, sale_id: i64) -> DbResult<Vec<SaleItem>> {
        debug!(sale_id, "Listing returnable items");

        let sql = format!(
            r#"
            SELECT {} FROM sale_item si
            WHERE si.sale_id = ?1
              AND si.quantity > 0
              AND NOT EXISTS (
                  SELECT 1 FROM delivery_item di
                  JOIN delivery d ON d.id = di.delivery_id
                  WHERE di.sale_item_id = si.id AND d.status <> 'Delivered'
              )
            ORDER BY si.id
            "#,
            SALE_ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Returns recorded against one sale item, oldest first.
    pub async fn returns(&self, sale_item_id: i64) -> DbResult<Vec<ReturnRecord>> {
        let records = sqlx::query_as::<_, ReturnRecord>(
            r#"
            SELECT id, sale_item_id, quantity, reason, date
            FROM "return"
            WHERE sale_item_id = ?1
            ORDER BY id
            "#,
        )
        .bind(sale_item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}
