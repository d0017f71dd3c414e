//! # Transaction Coordinator
//!
//! Turns one user [`Action`] into exactly one SQLite transaction.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    execute(action)                                      │
//! │                                                                         │
//! │  action.validate() ──── Err ──► ActionError (line index), store untouched│
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  headers: sale / delivery ──── Err ──► ROLLBACK, Rejected               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  line 0, line 1, ... (ledger) ── Err at k ──► ROLLBACK, LineItem { k }  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ──── Err ──► Rejected                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ActionOutcome { created ids }                                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A committed action is complete; a failed one left no rows and no
//! quantity changes behind.

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{debug, info, warn};

use inaya_core::validation::validate_customer;
use inaya_core::{Action, CustomerDetails, DeliveryStatus, ErrorKind, InvalidAction, LedgerCall};

use crate::error::{DbError, DbResult};
use crate::ledger;

// =============================================================================
// Outcome & Errors
// =============================================================================

/// Ids of the rows a committed action created or changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub sale_id: Option<i64>,
    pub delivery_id: Option<i64>,
    pub grn_ids: Vec<i64>,
    pub sale_item_ids: Vec<i64>,
    pub return_ids: Vec<i64>,
}

/// Why an action was not committed.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action as a whole failed (header, delivery state, commit).
    #[error("Action rejected: {0}")]
    Rejected(#[source] DbError),

    /// Line `index` (0-based, submission order) failed.
    #[error("Line {index} failed: {source}")]
    LineItem {
        index: usize,
        #[source]
        source: DbError,
    },
}

impl ActionError {
    /// Index of the failing line, if a line was at fault.
    pub fn failed_at(&self) -> Option<usize> {
        match self {
            ActionError::LineItem { index, .. } => Some(*index),
            ActionError::Rejected(_) => None,
        }
    }

    /// The underlying error.
    pub fn cause(&self) -> &DbError {
        match self {
            ActionError::Rejected(e) | ActionError::LineItem { source: e, .. } => e,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.cause().kind()
    }
}

impl From<InvalidAction> for ActionError {
    fn from(invalid: InvalidAction) -> Self {
        let source = DbError::from(invalid.error);
        match invalid.line {
            Some(index) => ActionError::LineItem { index, source },
            None => ActionError::Rejected(source),
        }
    }
}

fn line(index: usize) -> impl FnOnce(DbError) -> ActionError {
    move |source| ActionError::LineItem { index, source }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Executes actions atomically against the store.
#[derive(Debug, Clone)]
pub struct TransactionCoordinator {
    pool: SqlitePool,
}

impl TransactionCoordinator {
    pub fn new(pool: SqlitePool) -> Self {
        TransactionCoordinator { pool }
    }

    /// Validates, applies and commits `action`, or leaves the store as it was.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let outcome = db.coordinator().execute(Action::Checkout {
    ///     customer: CustomerDetails::new("Ayesha", "03001234567", "Gulberg, Lahore"),
    ///     lines: vec![SaleLine { stock_id: 1, quantity: 2 }],
    /// }).await?;
    /// let invoice = db.invoices().sale(outcome.sale_id.unwrap()).await?;
    /// ```
    pub async fn execute(&self, action: Action) -> Result<ActionOutcome, ActionError> {
        action.validate()?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ActionError::Rejected(e.into()))?;

        debug!(action = action.name(), lines = action.line_count(), "Transaction started");

        match apply(&mut tx, &action).await {
            Ok(outcome) => {
                tx.commit()
                    .await
                    .map_err(|e| ActionError::Rejected(DbError::TransactionFailed(e.to_string())))?;

                info!(
                    action = action.name(),
                    sale_id = ?outcome.sale_id,
                    delivery_id = ?outcome.delivery_id,
                    "Action committed"
                );
                Ok(outcome)
            }
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "Rollback failed");
                }
                debug!(
                    action = action.name(),
                    failed_at = ?err.failed_at(),
                    error = %err.cause(),
                    "Action rolled back"
                );
                Err(err)
            }
        }
    }
}

// =============================================================================
// Action Application
// =============================================================================

async fn apply(conn: &mut SqliteConnection, action: &Action) -> Result<ActionOutcome, ActionError> {
    let mut outcome = ActionOutcome::default();

    match action {
        Action::ReceiveGoods { lines } => {
            for (index, l) in lines.iter().enumerate() {
                let grn = ledger::record_receipt(conn, l.stock_id, l.quantity)
                    .await
                    .map_err(line(index))?;
                outcome.grn_ids.push(grn.id);
            }
        }

        Action::Checkout { customer, lines } => {
            let sale_id = insert_sale(conn, Some(customer))
                .await
                .map_err(ActionError::Rejected)?;
            outcome.sale_id = Some(sale_id);

            for (index, l) in lines.iter().enumerate() {
                let item = ledger::record_sale_item(conn, sale_id, l.stock_id, l.quantity)
                    .await
                    .map_err(line(index))?;
                outcome.sale_item_ids.push(item.id);
            }
        }

        Action::Pickup { customer, lines } => {
            let sale_id = insert_sale(conn, Some(customer))
                .await
                .map_err(ActionError::Rejected)?;
            let delivery_id = insert_delivery(conn, sale_id, customer)
                .await
                .map_err(ActionError::Rejected)?;
            outcome.sale_id = Some(sale_id);
            outcome.delivery_id = Some(delivery_id);

            for (index, l) in lines.iter().enumerate() {
                let item = ledger::record_sale_item(conn, sale_id, l.stock_id, l.quantity)
                    .await
                    .map_err(line(index))?;
                insert_delivery_item(conn, delivery_id, item.id, l.quantity)
                    .await
                    .map_err(line(index))?;
                outcome.sale_item_ids.push(item.id);
            }
        }

        Action::ReturnBatch { lines } => {
            for (index, l) in lines.iter().enumerate() {
                let record = ledger::return_units(conn, l.sale_item_id, l.quantity, &l.reason)
                    .await
                    .map_err(line(index))?;
                outcome.return_ids.push(record.id);
            }
        }

        Action::MarkDelivered { delivery_id } => {
            ledger::mark_delivered(conn, *delivery_id)
                .await
                .map_err(ActionError::Rejected)?;
            outcome.delivery_id = Some(*delivery_id);
        }

        Action::CancelDelivery {
            delivery_id,
            reason,
        } => {
            ledger::reverse_delivery(conn, *delivery_id, reason)
                .await
                .map_err(ActionError::Rejected)?;
            outcome.delivery_id = Some(*delivery_id);
        }

        Action::Ledger { calls } => {
            for (index, call) in calls.iter().enumerate() {
                apply_call(conn, call, &mut outcome)
                    .await
                    .map_err(line(index))?;
            }
        }
    }

    Ok(outcome)
}

/// One raw ledger call. Sells share a single customer-less sale header,
/// created on the first sell of the batch.
async fn apply_call(
    conn: &mut SqliteConnection,
    call: &LedgerCall,
    outcome: &mut ActionOutcome,
) -> DbResult<()> {
    match call {
        LedgerCall::Receive { stock_id, quantity } => {
            let grn = ledger::record_receipt(conn, *stock_id, *quantity).await?;
            outcome.grn_ids.push(grn.id);
        }
        LedgerCall::Sell { stock_id, quantity } => {
            let sale_id = match outcome.sale_id {
                Some(id) => id,
                None => {
                    let id = insert_sale(conn, None).await?;
                    outcome.sale_id = Some(id);
                    id
                }
            };
            let item = ledger::record_sale_item(conn, sale_id, *stock_id, *quantity).await?;
            outcome.sale_item_ids.push(item.id);
        }
        LedgerCall::ReturnUnits {
            sale_item_id,
            quantity,
            reason,
        } => {
            let record = ledger::return_units(conn, *sale_item_id, *quantity, reason).await?;
            outcome.return_ids.push(record.id);
        }
        LedgerCall::ReverseDelivery {
            delivery_id,
            reason,
        } => {
            ledger::reverse_delivery(conn, *delivery_id, reason).await?;
            outcome.delivery_id = Some(*delivery_id);
        }
        LedgerCall::MarkDelivered { delivery_id } => {
            ledger::mark_delivered(conn, *delivery_id).await?;
            outcome.delivery_id = Some(*delivery_id);
        }
    }
    Ok(())
}

// =============================================================================
// Header Rows
// =============================================================================

async fn insert_sale(
    conn: &mut SqliteConnection,
    customer: Option<&CustomerDetails>,
) -> DbResult<i64> {
    let customer = match customer {
        Some(c) => validate_customer(c)?,
        None => CustomerDetails::default(),
    };

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO sale (customer_name, customer_mobile, customer_address)
        VALUES (?1, ?2, ?3)
        RETURNING id
        "#,
    )
    .bind(&customer.name)
    .bind(&customer.mobile)
    .bind(&customer.address)
    .fetch_one(&mut *conn)
    .await?;

    debug!(sale_id = id, "Sale header inserted");
    Ok(id)
}

async fn insert_delivery(
    conn: &mut SqliteConnection,
    sale_id: i64,
    customer: &CustomerDetails,
) -> DbResult<i64> {
    let customer = validate_customer(customer)?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO delivery (sale_id, status, customer_name, customer_mobile, customer_address)
        VALUES (?1, ?2, ?3, ?4, ?5)
        RETURNING id
        "#,
    )
    .bind(sale_id)
    .bind(DeliveryStatus::Picked)
    .bind(&customer.name)
    .bind(&customer.mobile)
    .bind(&customer.address)
    .fetch_one(&mut *conn)
    .await?;

    debug!(delivery_id = id, sale_id, "Delivery header inserted");
    Ok(id)
}

async fn insert_delivery_item(
    conn: &mut SqliteConnection,
    delivery_id: i64,
    sale_item_id: i64,
    qty: i64,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO delivery_item (delivery_id, sale_item_id, quantity) VALUES (?1, ?2, ?3)",
    )
    .bind(delivery_id)
    .bind(sale_item_id)
    .bind(qty)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use inaya_core::{GrnLine, Money, ReturnLine, SaleLine};
    use proptest::prelude::*;

    const TABLES: [&str; 8] = [
        "stock",
        "grn",
        "sale",
        "sale_item",
        "return",
        "delivery",
        "delivery_item",
        "user",
    ];

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn add_stock(db: &Database, name: &str, qty: i64, rupees: i64, mrp: i64) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO stock (name, quantity, selling_price, mrp) VALUES (?1, ?2, ?3, ?4) RETURNING id",
        )
        .bind(name)
        .bind(qty)
        .bind(Money::from_rupees(rupees))
        .bind(Money::from_rupees(mrp))
        .fetch_one(db.pool())
        .await
        .unwrap()
    }

    async fn quantity(db: &Database, stock_id: i64) -> i64 {
        sqlx::query_scalar("SELECT quantity FROM stock WHERE id = ?1")
            .bind(stock_id)
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    async fn item(db: &Database, sale_item_id: i64) -> (i64, Money) {
        sqlx::query_as("SELECT quantity, total_price FROM sale_item WHERE id = ?1")
            .bind(sale_item_id)
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    /// Every row of every table, as JSON per table.
    async fn snapshot(db: &Database) -> Vec<String> {
        let mut out = Vec::new();
        for table in TABLES {
            let cols: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?1)")
                .bind(table)
                .fetch_all(db.pool())
                .await
                .unwrap();
            let sql = format!(
                "SELECT COALESCE(json_group_array(json_array({})), '[]') FROM (SELECT * FROM \"{}\" ORDER BY id)",
                cols.join(", "),
                table
            );
            let rows: String = sqlx::query_scalar(&sql).fetch_one(db.pool()).await.unwrap();
            out.push(format!("{}: {}", table, rows));
        }
        out
    }

    fn customer() -> CustomerDetails {
        CustomerDetails::new("Ayesha", "03001234567", "Gulberg, Lahore")
    }

    #[tokio::test]
    async fn test_saree_scenario() {
        let db = setup().await;
        let saree = add_stock(&db, "Saree-A", 12, 500, 600).await;
        let coord = db.coordinator();

        // A courier already holds 2 units when the day starts.
        let pickup = coord
            .execute(Action::Pickup {
                customer: customer(),
                lines: vec![SaleLine { stock_id: saree, quantity: 2 }],
            })
            .await
            .unwrap();
        assert_eq!(quantity(&db, saree).await, 10);

        coord
            .execute(Action::ReceiveGoods {
                lines: vec![GrnLine { stock_id: saree, quantity: 5 }],
            })
            .await
            .unwrap();
        assert_eq!(quantity(&db, saree).await, 15);

        let sale = coord
            .execute(Action::Checkout {
                customer: customer(),
                lines: vec![SaleLine { stock_id: saree, quantity: 8 }],
            })
            .await
            .unwrap();
        let sale_item_id = sale.sale_item_ids[0];
        assert_eq!(quantity(&db, saree).await, 7);
        assert_eq!(item(&db, sale_item_id).await, (8, Money::from_rupees(4000)));

        coord
            .execute(Action::ReturnBatch {
                lines: vec![ReturnLine {
                    sale_item_id,
                    quantity: 3,
                    reason: "size".into(),
                }],
            })
            .await
            .unwrap();
        assert_eq!(quantity(&db, saree).await, 10);
        assert_eq!(item(&db, sale_item_id).await, (5, Money::from_rupees(2500)));

        coord
            .execute(Action::CancelDelivery {
                delivery_id: pickup.delivery_id.unwrap(),
                reason: "customer not home".into(),
            })
            .await
            .unwrap();
        assert_eq!(quantity(&db, saree).await, 12);
    }

    #[tokio::test]
    async fn test_checkout_at_price_ceiling_stays_exact() {
        let db = setup().await;

        let huge = Money::from_paise(i64::MAX / 10);
        let err = db
            .stocks()
            .create("Bridal Lehenga", 20, huge, huge)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let cap = Money::from_paise(inaya_core::MAX_UNIT_PRICE);
        let stock = db
            .stocks()
            .create("Bridal Lehenga", 20, cap, cap)
            .await
            .unwrap();
        let outcome = db
            .coordinator()
            .execute(Action::Checkout {
                customer: customer(),
                lines: vec![SaleLine { stock_id: stock.id, quantity: 20 }],
            })
            .await
            .unwrap();

        let total: Money = sqlx::query_scalar("SELECT total_price FROM sale_item WHERE id = ?1")
            .bind(outcome.sale_item_ids[0])
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(total.paise(), inaya_core::MAX_UNIT_PRICE * 20);
        assert_eq!(quantity(&db, stock.id).await, 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_quantity() {
        let db = setup().await;
        let lawn = add_stock(&db, "Lawn Suit", 3, 1200, 1500).await;

        let err = db
            .coordinator()
            .execute(Action::Checkout {
                customer: customer(),
                lines: vec![SaleLine { stock_id: lawn, quantity: 5 }],
            })
            .await
            .unwrap_err();

        assert_eq!(err.failed_at(), Some(0));
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
        assert_eq!(quantity(&db, lawn).await, 3);

        let sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(sales, 0);
    }

    #[tokio::test]
    async fn test_failure_at_each_index_changes_nothing() {
        let db = setup().await;
        let ids = [
            add_stock(&db, "Saree A", 10, 500, 600).await,
            add_stock(&db, "Lawn Suit", 10, 1200, 1500).await,
            add_stock(&db, "Dupatta", 10, 300, 350).await,
        ];
        let coord = db.coordinator();

        let delivered = coord
            .execute(Action::Checkout {
                customer: customer(),
                lines: ids.iter().map(|&stock_id| SaleLine { stock_id, quantity: 2 }).collect(),
            })
            .await
            .unwrap();

        for k in 0..ids.len() {
            let sale_lines: Vec<SaleLine> = ids
                .iter()
                .enumerate()
                .map(|(i, &stock_id)| SaleLine {
                    stock_id,
                    quantity: if i == k { 50 } else { 1 },
                })
                .collect();
            let grn_lines: Vec<GrnLine> = ids
                .iter()
                .enumerate()
                .map(|(i, &stock_id)| GrnLine {
                    stock_id: if i == k { 9_999 } else { stock_id },
                    quantity: 1,
                })
                .collect();
            let return_lines: Vec<ReturnLine> = delivered
                .sale_item_ids
                .iter()
                .enumerate()
                .map(|(i, &sale_item_id)| ReturnLine {
                    sale_item_id,
                    quantity: if i == k { 3 } else { 1 },
                    reason: "fit".into(),
                })
                .collect();

            let actions = [
                Action::Checkout {
                    customer: customer(),
                    lines: sale_lines.clone(),
                },
                Action::Pickup {
                    customer: customer(),
                    lines: sale_lines,
                },
                Action::ReceiveGoods { lines: grn_lines },
                Action::ReturnBatch { lines: return_lines },
            ];

            for action in actions {
                let before = snapshot(&db).await;
                let err = coord.execute(action.clone()).await.unwrap_err();
                assert_eq!(err.failed_at(), Some(k), "{} at {}", action.name(), k);
                assert_eq!(snapshot(&db).await, before, "{} at {}", action.name(), k);
            }
        }
    }

    #[tokio::test]
    async fn test_validation_failure_reports_index() {
        let db = setup().await;
        let saree = add_stock(&db, "Saree A", 10, 500, 600).await;
        let before = snapshot(&db).await;

        let err = db
            .coordinator()
            .execute(Action::ReceiveGoods {
                lines: vec![
                    GrnLine { stock_id: saree, quantity: 5 },
                    GrnLine { stock_id: saree, quantity: 0 },
                ],
            })
            .await
            .unwrap_err();

        assert_eq!(err.failed_at(), Some(1));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(snapshot(&db).await, before);

        let err = db
            .coordinator()
            .execute(Action::Checkout {
                customer: CustomerDetails::default(),
                lines: vec![SaleLine { stock_id: saree, quantity: 1 }],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Rejected(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_pickup_return_and_delivery_states() {
        let db = setup().await;
        let saree = add_stock(&db, "Saree A", 10, 500, 600).await;
        let coord = db.coordinator();

        let pickup = coord
            .execute(Action::Pickup {
                customer: customer(),
                lines: vec![SaleLine { stock_id: saree, quantity: 2 }],
            })
            .await
            .unwrap();
        let delivery_id = pickup.delivery_id.unwrap();
        let return_line = ReturnLine {
            sale_item_id: pickup.sale_item_ids[0],
            quantity: 1,
            reason: "changed mind".into(),
        };

        let err = coord
            .execute(Action::ReturnBatch {
                lines: vec![return_line.clone()],
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        coord
            .execute(Action::MarkDelivered { delivery_id })
            .await
            .unwrap();

        let err = coord
            .execute(Action::CancelDelivery {
                delivery_id,
                reason: "too late".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Rejected(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(quantity(&db, saree).await, 8);

        coord
            .execute(Action::ReturnBatch {
                lines: vec![return_line],
            })
            .await
            .unwrap();
        assert_eq!(quantity(&db, saree).await, 9);
    }

    #[tokio::test]
    async fn test_raw_ledger_calls_share_one_sale() {
        let db = setup().await;
        let saree = add_stock(&db, "Saree A", 5, 500, 600).await;
        let kurta = add_stock(&db, "Kurta", 5, 900, 1000).await;

        let outcome = db
            .coordinator()
            .execute(Action::Ledger {
                calls: vec![
                    LedgerCall::Receive { stock_id: saree, quantity: 5 },
                    LedgerCall::Sell { stock_id: saree, quantity: 4 },
                    LedgerCall::Sell { stock_id: kurta, quantity: 1 },
                ],
            })
            .await
            .unwrap();

        assert!(outcome.sale_id.is_some());
        assert_eq!(outcome.grn_ids.len(), 1);
        assert_eq!(outcome.sale_item_ids.len(), 2);
        assert_eq!(quantity(&db, saree).await, 6);
        assert_eq!(quantity(&db, kurta).await, 4);

        let err = db
            .coordinator()
            .execute(Action::Ledger {
                calls: vec![
                    LedgerCall::Sell { stock_id: kurta, quantity: 1 },
                    LedgerCall::MarkDelivered { delivery_id: 77 },
                ],
            })
            .await
            .unwrap_err();
        assert_eq!(err.failed_at(), Some(1));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(quantity(&db, kurta).await, 4);
    }

    // =========================================================================
    // Conservation
    // =========================================================================

    #[derive(Debug, Clone)]
    enum Op {
        Receive(i64),
        Sell(i64),
        Return(i64),
        PickupThenCancel(i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..20).prop_map(Op::Receive),
            (1i64..20).prop_map(Op::Sell),
            (1i64..5).prop_map(Op::Return),
            (1i64..10).prop_map(Op::PickupThenCancel),
        ]
    }

    async fn run_ops(opening: i64, ops: Vec<Op>) {
        let db = setup().await;
        let id = add_stock(&db, "Saree A", opening, 500, 600).await;
        let coord = db.coordinator();

        let (mut received, mut sold, mut returned, mut restocked) = (0i64, 0i64, 0i64, 0i64);
        let mut last_item: Option<i64> = None;

        for op in ops {
            match op {
                Op::Receive(q) => {
                    coord
                        .execute(Action::ReceiveGoods {
                            lines: vec![GrnLine { stock_id: id, quantity: q }],
                        })
                        .await
                        .unwrap();
                    received += q;
                }
                Op::Sell(q) => {
                    let before = quantity(&db, id).await;
                    let result = coord
                        .execute(Action::Checkout {
                            customer: customer(),
                            lines: vec![SaleLine { stock_id: id, quantity: q }],
                        })
                        .await;
                    match result {
                        Ok(outcome) => {
                            sold += q;
                            last_item = outcome.sale_item_ids.first().copied();
                        }
                        Err(e) => {
                            assert!(q > before);
                            assert_eq!(e.kind(), ErrorKind::InsufficientStock);
                            assert_eq!(quantity(&db, id).await, before);
                        }
                    }
                }
                Op::Return(q) => {
                    if let Some(sale_item_id) = last_item {
                        let result = coord
                            .execute(Action::ReturnBatch {
                                lines: vec![ReturnLine {
                                    sale_item_id,
                                    quantity: q,
                                    reason: "return".into(),
                                }],
                            })
                            .await;
                        match result {
                            Ok(_) => returned += q,
                            Err(e) => assert_eq!(e.kind(), ErrorKind::OverReturn),
                        }
                    }
                }
                Op::PickupThenCancel(q) => {
                    let result = coord
                        .execute(Action::Pickup {
                            customer: customer(),
                            lines: vec![SaleLine { stock_id: id, quantity: q }],
                        })
                        .await;
                    if let Ok(outcome) = result {
                        sold += q;
                        coord
                            .execute(Action::CancelDelivery {
                                delivery_id: outcome.delivery_id.unwrap(),
                                reason: "refused".into(),
                            })
                            .await
                            .unwrap();
                        restocked += q;
                    }
                }
            }

            let on_hand = quantity(&db, id).await;
            assert!(on_hand >= 0);
            assert_eq!(on_hand, opening + received - sold + returned + restocked);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_quantity_is_conserved(opening in 0i64..20, ops in prop::collection::vec(op(), 1..12)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(run_ops(opening, ops));
        }
    }
}
