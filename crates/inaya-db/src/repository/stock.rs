//! # Stock Repository
//!
//! Stock master data: names and prices.
//!
//! ## Price Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  selling_price > 0      mrp > 0      mrp >= selling_price               │
//! │                                                                         │
//! │  Rs. 500 / MRP Rs. 600   ✅                                             │
//! │  Rs. 600 / MRP Rs. 500   ❌ MrpBelowSellingPrice                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Quantity is set once at creation (the opening count) and from then on
//! only moves through the ledger.

use sqlx::SqlitePool;
use tracing::debug;

use inaya_core::validation::{validate_opening_quantity, validate_prices, validate_stock_name};
use inaya_core::{Money, Stock};

use super::STOCK_COLUMNS;
use crate::error::{DbError, DbResult};

/// Repository for stock master data.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Creates a stock item with its opening quantity.
    ///
    /// ## Arguments
    /// * `name` - Display name, trimmed
    /// * `opening_quantity` - Units on the shelf today (may be 0)
    /// * `selling_price` / `mrp` - See the module price rule
    pub async fn create(
        &self,
        name: &str,
        opening_quantity: i64,
        selling_price: Money,
        mrp: Money,
    ) -> DbResult<Stock> {
        let name = validate_stock_name(name)?;
        validate_opening_quantity(opening_quantity)?;
        validate_prices(selling_price, mrp)?;

        debug!(name = %name, opening_quantity, "Creating stock");

        let sql = format!(
            "INSERT INTO stock (name, quantity, selling_price, mrp) VALUES (?1, ?2, ?3, ?4) RETURNING {}",
            STOCK_COLUMNS
        );
        let stock = sqlx::query_as::<_, Stock>(&sql)
            .bind(&name)
            .bind(opening_quantity)
            .bind(selling_price)
            .bind(mrp)
            .fetch_one(&self.pool)
            .await?;

        Ok(stock)
    }

    /// Gets a stock item by id.
    ///
    /// ## Returns
    /// * `Ok(Some(Stock))` - Stock found
    /// * `Ok(None)` - Stock not found
    pub async fn get(&self, id: i64) -> DbResult<Option<Stock>> {
        let sql = format!("SELECT {} FROM stock WHERE id = ?1", STOCK_COLUMNS);
        let stock = sqlx::query_as::<_, Stock>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(stock)
    }

    /// Lists every stock item in creation order.
    pub async fn list(&self) -> DbResult<Vec<Stock>> {
        let sql = format!("SELECT {} FROM stock ORDER BY id", STOCK_COLUMNS);
        let stocks = sqlx::query_as::<_, Stock>(&sql)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = stocks.len(), "Listed stock");
        Ok(stocks)
    }

    /// Finds stock whose name contains `fragment` (case-insensitive).
    pub async fn search(&self, fragment: &str) -> DbResult<Vec<Stock>> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return self.list().await;
        }

        let sql = format!(
            "SELECT {} FROM stock WHERE name LIKE '%' || ?1 || '%' ORDER BY name",
            STOCK_COLUMNS
        );
        let stocks = sqlx::query_as::<_, Stock>(&sql)
            .bind(fragment)
            .fetch_all(&self.pool)
            .await?;

        Ok(stocks)
    }

    /// Changes the selling price and MRP.
    ///
    /// Existing GRN and sale item rows keep the price they were recorded at.
    pub async fn update_prices(&self, id: i64, selling_price: Money, mrp: Money) -> DbResult<Stock> {
        validate_prices(selling_price, mrp)?;
        debug!(id, %selling_price, %mrp, "Updating stock prices");

        let sql = format!(
            "UPDATE stock SET selling_price = ?2, mrp = ?3 WHERE id = ?1 RETURNING {}",
            STOCK_COLUMNS
        );
        sqlx::query_as::<_, Stock>(&sql)
            .bind(id)
            .bind(selling_price)
            .bind(mrp)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Stock", id))
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use inaya_core::{ErrorKind, Money};

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.stocks();

        let stock = repo
            .create("  Lawn Suit 3pc ", 12, Money::from_rupees(3500), Money::from_rupees(4200))
            .await
            .unwrap();
        assert_eq!(stock.name, "Lawn Suit 3pc");
        assert_eq!(stock.quantity, 12);

        let fetched = repo.get(stock.id).await.unwrap().unwrap();
        assert_eq!(fetched, stock);
        assert!(repo.get(999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_price_rule_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.stocks();

        let err = repo
            .create("Kurta", 1, Money::from_rupees(600), Money::from_rupees(500))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = repo
            .create("Kurta", -1, Money::from_rupees(500), Money::from_rupees(600))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let stock = repo
            .create("Kurta", 0, Money::from_rupees(500), Money::from_rupees(600))
            .await
            .unwrap();
        let err = repo
            .update_prices(stock.id, Money::from_rupees(700), Money::from_rupees(650))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let updated = repo
            .update_prices(stock.id, Money::from_rupees(550), Money::from_rupees(650))
            .await
            .unwrap();
        assert_eq!(updated.selling_price, Money::from_rupees(550));
        assert_eq!(updated.quantity, 0);

        let err = repo
            .update_prices(404, Money::from_rupees(550), Money::from_rupees(650))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_and_search() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.stocks();
        for name in ["Saree A", "Lawn Suit", "Silk Saree"] {
            repo.create(name, 1, Money::from_rupees(100), Money::from_rupees(100))
                .await
                .unwrap();
        }

        assert_eq!(repo.list().await.unwrap().len(), 3);
        let sarees: Vec<String> = repo
            .search("saree")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(sarees, vec!["Saree A", "Silk Saree"]);
    }
}
