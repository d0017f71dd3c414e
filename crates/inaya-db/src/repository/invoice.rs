//! # Invoice Data Assembler
//!
//! Builds the read-only documents the invoice renderer prints.
//!
//! ## Assembly
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  sale(id)                                                               │
//! │    │                                                                    │
//! │    ├── BEGIN (read)                                                     │
//! │    ├── SELECT sale WHERE id = ?            → header                     │
//! │    ├── SELECT sale_item JOIN stock         → lines (with stock names)   │
//! │    ├── COMMIT                                                           │
//! │    │                                                                    │
//! │    ▼                                                                    │
//! │  SaleDocument::new(header, lines)          → grand total computed once  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each call reads committed data through its own transaction, so header
//! and lines always come from the same snapshot.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use inaya_core::documents::{
    DeliveryDocument, DocumentLine, GrnDocument, ReturnDocument, SaleDocument,
};
use inaya_core::{Delivery, GoodsReceipt, Money, ReturnRecord, Sale, Stock};

use super::{DELIVERY_COLUMNS, STOCK_COLUMNS};
use crate::error::{DbError, DbResult};

/// A GRN row joined with its stock item.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct GrnRow {
    id: i64,
    stock_id: i64,
    quantity: i64,
    unit_price: Money,
    date: DateTime<Utc>,
    stock_name: String,
    mrp: Money,
}

impl From<GrnRow> for GrnDocument {
    fn from(row: GrnRow) -> Self {
        let grn = GoodsReceipt {
            id: row.id,
            stock_id: row.stock_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            date: row.date,
        };
        GrnDocument::new(grn, row.stock_name, row.mrp)
    }
}

pub(crate) const GRN_ROW_SELECT: &str = r#"
    SELECT g.id, g.stock_id, g.quantity, g.unit_price, g.date, s.name AS stock_name, s.mrp
    FROM grn g
    JOIN stock s ON s.id = g.stock_id
"#;

/// A return row joined with the sale item and stock it refers to.
#[derive(Debug, sqlx::FromRow)]
struct ReturnRow {
    id: i64,
    sale_item_id: i64,
    quantity: i64,
    reason: Option<String>,
    date: DateTime<Utc>,
    sale_id: i64,
    stock_name: String,
    unit_price: Money,
}

/// Read-only document queries.
#[derive(Debug, Clone)]
pub struct InvoiceQueries {
    pool: SqlitePool,
}

impl InvoiceQueries {
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceQueries { pool }
    }

    /// A stock item, for the price tag.
    pub async fn stock(&self, id: i64) -> DbResult<Stock> {
        let sql = format!("SELECT {} FROM stock WHERE id = ?1", STOCK_COLUMNS);
        sqlx::query_as::<_, Stock>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Stock", id))
    }

    /// Sales invoice.
    pub async fn sale(&self, id: i64) -> DbResult<SaleDocument> {
        debug!(sale_id = id, "Assembling sale invoice");
        let mut tx = self.pool.begin().await?;

        let sale = sqlx::query_as::<_, Sale>(
            "SELECT id, customer_name, customer_mobile, customer_address, date FROM sale WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Sale", id))?;

        let lines = sale_lines(&mut tx, id).await?;
        tx.commit().await?;

        Ok(SaleDocument::new(sale, lines))
    }

    /// Goods received note.
    pub async fn grn(&self, id: i64) -> DbResult<GrnDocument> {
        let sql = format!("{} WHERE g.id = ?1", GRN_ROW_SELECT);
        sqlx::query_as::<_, GrnRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(GrnDocument::from)
            .ok_or_else(|| DbError::not_found("GRN", id))
    }

    /// Return note, priced at what the customer paid.
    pub async fn return_note(&self, id: i64) -> DbResult<ReturnDocument> {
        let row = sqlx::query_as::<_, ReturnRow>(
            r#"
            SELECT r.id, r.sale_item_id, r.quantity, r.reason, r.date,
                   si.sale_id, s.name AS stock_name, si.unit_price
            FROM "return" r
            JOIN sale_item si ON si.id = r.sale_item_id
            JOIN stock s ON s.id = si.stock_id
            WHERE r.id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Return", id))?;

        let record = ReturnRecord {
            id: row.id,
            sale_item_id: row.sale_item_id,
            quantity: row.quantity,
            reason: row.reason,
            date: row.date,
        };
        Ok(ReturnDocument::new(
            record,
            row.sale_id,
            row.stock_name,
            row.unit_price,
        ))
    }

    /// Delivery challan.
    pub async fn delivery(&self, id: i64) -> DbResult<DeliveryDocument> {
        debug!(delivery_id = id, "Assembling delivery challan");
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {} FROM delivery WHERE id = ?1", DELIVERY_COLUMNS);
        let delivery = sqlx::query_as::<_, Delivery>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Delivery", id))?;

        let lines = delivery_lines(&mut tx, id).await?;
        tx.commit().await?;

        Ok(DeliveryDocument::new(delivery, lines))
    }

    /// Id of the newest sale, for "print last invoice".
    pub async fn latest_sale_id(&self) -> DbResult<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM sale")
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    /// Id of the newest return.
    pub async fn latest_return_id(&self) -> DbResult<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM \"return\"")
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }
}

async fn sale_lines(conn: &mut SqliteConnection, sale_id: i64) -> DbResult<Vec<DocumentLine>> {
    let lines = sqlx::query_as::<_, DocumentLine>(
        r#"
        SELECT si.id AS sale_item_id, si.stock_id, s.name AS stock_name,
               si.quantity, si.unit_price, si.total_price
        FROM sale_item si
        JOIN stock s ON s.id = si.stock_id
        WHERE si.sale_id = ?1
        ORDER BY si.id
        "#,
    )
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(lines)
}

pub(crate) async fn delivery_lines(
    conn: &mut SqliteConnection,
    delivery_id: i64,
) -> DbResult<Vec<DocumentLine>> {
    let lines = sqlx::query_as::<_, DocumentLine>(
        r#"
        SELECT si.id AS sale_item_id, si.stock_id, s.name AS stock_name,
               di.quantity, si.unit_price, di.quantity * si.unit_price AS total_price
        FROM delivery_item di
        JOIN sale_item si ON si.id = di.sale_item_id
        JOIN stock s ON s.id = si.stock_id
        WHERE di.delivery_id = ?1
        ORDER BY di.id
        "#,
    )
    .bind(delivery_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use inaya_core::{Action, CustomerDetails, ErrorKind, GrnLine, Money, ReturnLine, SaleLine};

    async fn setup() -> (Database, i64, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let saree = db
            .stocks()
            .create("Saree A", 10, Money::from_rupees(500), Money::from_rupees(600))
            .await
            .unwrap();
        let lawn = db
            .stocks()
            .create("Lawn Suit", 10, Money::from_rupees(1250), Money::from_rupees(1500))
            .await
            .unwrap();
        (db, saree.id, lawn.id)
    }

    fn customer() -> CustomerDetails {
        CustomerDetails::new("Ayesha", "03001234567", "Gulberg, Lahore")
    }

    #[tokio::test]
    async fn test_sale_invoice() {
        let (db, saree, lawn) = setup().await;
        assert_eq!(db.invoices().latest_sale_id().await.unwrap(), None);

        let outcome = db
            .coordinator()
            .execute(Action::Checkout {
                customer: customer(),
                lines: vec![
                    SaleLine { stock_id: saree, quantity: 2 },
                    SaleLine { stock_id: lawn, quantity: 1 },
                ],
            })
            .await
            .unwrap();
        let sale_id = outcome.sale_id.unwrap();
        assert_eq!(db.invoices().latest_sale_id().await.unwrap(), Some(sale_id));

        let doc = db.invoices().sale(sale_id).await.unwrap();
        assert_eq!(doc.lines.len(), 2);
        assert_eq!(doc.lines[0].stock_name, "Saree A");
        assert_eq!(doc.lines[1].stock_name, "Lawn Suit");
        assert_eq!(doc.grand_total, Money::from_rupees(2250));
        assert_eq!(doc.total_quantity(), 3);
        assert_eq!(doc.sale.customer_mobile.as_deref(), Some("03001234567"));

        let err = db.invoices().sale(999).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_grn_and_return_notes() {
        let (db, saree, _) = setup().await;

        let received = db
            .coordinator()
            .execute(Action::ReceiveGoods {
                lines: vec![GrnLine { stock_id: saree, quantity: 4 }],
            })
            .await
            .unwrap();
        let grn = db.invoices().grn(received.grn_ids[0]).await.unwrap();
        assert_eq!(grn.stock_name, "Saree A");
        assert_eq!(grn.mrp, Money::from_rupees(600));
        assert_eq!(grn.total_selling_price, Money::from_rupees(2000));

        let sold = db
            .coordinator()
            .execute(Action::Checkout {
                customer: customer(),
                lines: vec![SaleLine { stock_id: saree, quantity: 3 }],
            })
            .await
            .unwrap();
        db.coordinator()
            .execute(Action::ReturnBatch {
                lines: vec![ReturnLine {
                    sale_item_id: sold.sale_item_ids[0],
                    quantity: 2,
                    reason: "colour faded".into(),
                }],
            })
            .await
            .unwrap();

        let return_id = db.invoices().latest_return_id().await.unwrap().unwrap();
        let note = db.invoices().return_note(return_id).await.unwrap();
        assert_eq!(note.sale_id, sold.sale_id.unwrap());
        assert_eq!(note.refund_amount, Money::from_rupees(1000));
        assert_eq!(note.record.reason.as_deref(), Some("colour faded"));
    }

    #[tokio::test]
    async fn test_delivery_challan_keeps_delivered_quantities() {
        let (db, saree, lawn) = setup().await;
        let outcome = db
            .coordinator()
            .execute(Action::Pickup {
                customer: customer(),
                lines: vec![
                    SaleLine { stock_id: saree, quantity: 2 },
                    SaleLine { stock_id: lawn, quantity: 2 },
                ],
            })
            .await
            .unwrap();

        let doc = db
            .invoices()
            .delivery(outcome.delivery_id.unwrap())
            .await
            .unwrap();
        assert_eq!(doc.lines.len(), 2);
        assert_eq!(doc.grand_total, Money::from_rupees(3500));
        assert_eq!(doc.delivery.customer_address.as_deref(), Some("Gulberg, Lahore"));

        let stock = db.invoices().stock(lawn).await.unwrap();
        assert_eq!(stock.quantity, 8);
    }
}
