//! # Delivery Repository
//!
//! Read access to courier pickups. Status changes go through the
//! coordinator (`MarkDelivered`, `CancelDelivery`).

use sqlx::SqlitePool;

use inaya_core::{Delivery, DeliveryItem, DeliveryStatus};

use super::DELIVERY_COLUMNS;
use crate::error::DbResult;

/// Repository for delivery reads.
#[derive(Debug, Clone)]
pub struct DeliveryRepository {
    pool: SqlitePool,
}

impl DeliveryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DeliveryRepository { pool }
    }

    /// Gets a delivery by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<Delivery>> {
        let sql = format!("SELECT {} FROM delivery WHERE id = ?1", DELIVERY_COLUMNS);
        let delivery = sqlx::query_as::<_, Delivery>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(delivery)
    }

    /// Deliveries newest first, optionally filtered by status.
    ///
    /// `list(Some(DeliveryStatus::Picked))` is the courier's open list.
    pub async fn list(&self, status: Option<DeliveryStatus>) -> DbResult<Vec<Delivery>> {
        let sql = format!(
            "SELECT {} FROM delivery WHERE ?1 IS NULL OR status = ?1 ORDER BY id DESC",
            DELIVERY_COLUMNS
        );
        let deliveries = sqlx::query_as::<_, Delivery>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(deliveries)
    }

    /// Items carried by a delivery.
    pub async fn items(&self, delivery_id: i64) -> DbResult<Vec<DeliveryItem>> {
        let items = sqlx::query_as::<_, DeliveryItem>(
            "SELECT id, delivery_id, sale_item_id, quantity FROM delivery_item WHERE delivery_id = ?1 ORDER BY id",
        )
        .bind(delivery_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use inaya_core::{Action, CustomerDetails, DeliveryStatus, Money, SaleLine};

    #[tokio::test]
    async fn test_list_by_status() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let stock = db
            .stocks()
            .create("Saree A", 10, Money::from_rupees(500), Money::from_rupees(600))
            .await
            .unwrap();
        let pickup = || Action::Pickup {
            customer: CustomerDetails::new("Hina", "03331234567", "Model Town"),
            lines: vec![SaleLine { stock_id: stock.id, quantity: 1 }],
        };

        let first = db.coordinator().execute(pickup()).await.unwrap();
        let second = db.coordinator().execute(pickup()).await.unwrap();
        db.coordinator()
            .execute(Action::MarkDelivered {
                delivery_id: first.delivery_id.unwrap(),
            })
            .await
            .unwrap();

        let all = db.deliveries().list(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let open = db.deliveries().list(Some(DeliveryStatus::Picked)).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(Some(open[0].id), second.delivery_id);
        assert_eq!(open[0].customer_name.as_deref(), Some("Hina"));

        let items = db.deliveries().items(open[0].id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sale_item_id, second.sale_item_ids[0]);

        let delivered = db
            .deliveries()
            .get(first.delivery_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(delivered.status, DeliveryStatus::Delivered);
    }
}
