//! # Report Repository
//!
//! Back-office reports: stock on hand, goods received, deliveries, users.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use inaya_core::documents::{DeliveryDocument, GrnDocument, StockValuation};
use inaya_core::{Delivery, DeliveryStatus, Money, Stock, User};

use super::invoice::{delivery_lines, GrnRow, GRN_ROW_SELECT};
use super::{DELIVERY_COLUMNS, STOCK_COLUMNS, USER_COLUMNS};
use crate::error::DbResult;

/// Stock on hand with its valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockReport {
    pub items: Vec<Stock>,
    pub valuation: StockValuation,
}

/// Repository for report queries.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Every stock item and the value of what is on the shelf.
    pub async fn stock_report(&self) -> DbResult<StockReport> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM stock ORDER BY name", STOCK_COLUMNS);
        let items = sqlx::query_as::<_, Stock>(&sql)
            .fetch_all(&mut *tx)
            .await?;

        let (count, units, selling_value, mrp_value): (i64, i64, Money, Money) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(quantity), 0),
                   COALESCE(SUM(quantity * selling_price), 0),
                   COALESCE(SUM(quantity * mrp), 0)
            FROM stock
            "#,
        )
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(items = count, units, "Stock report generated");
        Ok(StockReport {
            items,
            valuation: StockValuation {
                items: count,
                units,
                selling_value,
                mrp_value,
                generated_at: Utc::now(),
            },
        })
    }

    /// Goods received, newest first, valued at the price on the day of receipt.
    pub async fn grn_report(&self) -> DbResult<Vec<GrnDocument>> {
        let sql = format!("{} ORDER BY g.date DESC, g.id DESC", GRN_ROW_SELECT);
        let rows = sqlx::query_as::<_, GrnRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(GrnDocument::from).collect())
    }

    /// Deliveries with their carried goods, optionally filtered by status.
    pub async fn delivery_report(
        &self,
        status: Option<DeliveryStatus>,
    ) -> DbResult<Vec<DeliveryDocument>> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {} FROM delivery WHERE ?1 IS NULL OR status = ?1 ORDER BY id DESC",
            DELIVERY_COLUMNS
        );
        let deliveries = sqlx::query_as::<_, Delivery>(&sql)
            .bind(status)
            .fetch_all(&mut *tx)
            .await?;

        let mut report = Vec::with_capacity(deliveries.len());
        for delivery in deliveries {
            let lines = delivery_lines(&mut tx, delivery.id).await?;
            report.push(DeliveryDocument::new(delivery, lines));
        }

        tx.commit().await?;
        Ok(report)
    }

    /// Accounts grouped by role.
    pub async fn user_report(&self) -> DbResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM \"user\" ORDER BY role, is_active DESC, name",
            USER_COLUMNS
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(users)
    }
}
