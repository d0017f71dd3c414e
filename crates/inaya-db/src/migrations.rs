//! # Schema Migrator
//!
//! Upgrades a running store from any older shape to the current one,
//! without data loss and repeatably across restarts.
//!
//! ## How Migration Works
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Migration Process                                  │
//! │                                                                         │
//! │  App Startup                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  1. Ensure tables ─────────────── failure is FATAL                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  2. Column renames          ┐                                           │
//! │  3. Money → paise rebuild   │  each step: own transaction               │
//! │  4. Column additions        │  failure: rollback + warning,             │
//! │  5. Legacy sale split       │           next step still runs            │
//! │  6. Legacy return re-point  │                                           │
//! │  7. E-mail de-duplication   │  3, 5, 6 rebuild tables with              │
//! │  8. Foreign-key indexes     ┘  foreign_keys = OFF                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  9. Default administrator (warning on failure)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  MigrationReport { changes, warnings }                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every step inspects the live schema (`sqlite_master`,
//! `pragma_table_info`) and only acts when the legacy shape is present, so
//! a second run reports no changes.
//!
//! All steps share one dedicated connection: `PRAGMA foreign_keys` is a
//! per-connection setting and cannot change inside a transaction.

use serde::Serialize;
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use inaya_core::validation::{validate_email, validate_password, validate_required};

use crate::error::{DbError, DbResult};
use crate::password::hash_password;

// =============================================================================
// Current Schema
// =============================================================================

/// A table of the current schema.
struct TableDef {
    name: &'static str,
    columns: &'static str,
}

impl TableDef {
    fn create_sql(&self, as_name: &str, if_not_exists: bool) -> String {
        format!(
            "CREATE TABLE {}\"{}\" ({})",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            as_name,
            self.columns
        )
    }
}

const STOCK: TableDef = TableDef {
    name: "stock",
    columns: "
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
        selling_price INTEGER NOT NULL DEFAULT 0,
        mrp INTEGER NOT NULL DEFAULT 0",
};

const GRN: TableDef = TableDef {
    name: "grn",
    columns: "
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        stock_id INTEGER NOT NULL REFERENCES \"stock\"(id),
        quantity INTEGER NOT NULL,
        unit_price INTEGER NOT NULL DEFAULT 0,
        date DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP",
};

const USER: TableDef = TableDef {
    name: "user",
    columns: "
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1",
};

const SALE: TableDef = TableDef {
    name: "sale",
    columns: "
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_name TEXT,
        customer_mobile TEXT,
        customer_address TEXT,
        date DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP",
};

const SALE_ITEM: TableDef = TableDef {
    name: "sale_item",
    columns: "
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sale_id INTEGER NOT NULL REFERENCES \"sale\"(id),
        stock_id INTEGER NOT NULL REFERENCES \"stock\"(id),
        quantity INTEGER NOT NULL CHECK (quantity >= 0),
        unit_price INTEGER NOT NULL DEFAULT 0,
        total_price INTEGER NOT NULL DEFAULT 0",
};

const RETURN: TableDef = TableDef {
    name: "return",
    columns: "
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sale_item_id INTEGER NOT NULL REFERENCES \"sale_item\"(id),
        quantity INTEGER NOT NULL,
        reason TEXT,
        date DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP",
};

const DELIVERY: TableDef = TableDef {
    name: "delivery",
    columns: "
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sale_id INTEGER NOT NULL REFERENCES \"sale\"(id),
        status TEXT NOT NULL DEFAULT 'Picked',
        customer_name TEXT,
        customer_mobile TEXT,
        customer_address TEXT,
        reason TEXT,
        date DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP",
};

const DELIVERY_ITEM: TableDef = TableDef {
    name: "delivery_item",
    columns: "
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        delivery_id INTEGER NOT NULL REFERENCES \"delivery\"(id),
        sale_item_id INTEGER NOT NULL REFERENCES \"sale_item\"(id),
        quantity INTEGER NOT NULL",
};

/// Creation order respects foreign keys.
const TABLES: [&TableDef; 8] = [
    &STOCK,
    &GRN,
    &USER,
    &SALE,
    &SALE_ITEM,
    &RETURN,
    &DELIVERY,
    &DELIVERY_ITEM,
];

/// A column added to an existing table, with its one-time backfill.
struct ColumnAddition {
    table: &'static str,
    column: &'static str,
    definition: &'static str,
    backfill: Option<&'static str>,
}

const ADDITIONS: [ColumnAddition; 4] = [
    ColumnAddition {
        table: "stock",
        column: "mrp",
        definition: "INTEGER NOT NULL DEFAULT 0",
        backfill: Some("UPDATE \"stock\" SET mrp = selling_price WHERE mrp = 0"),
    },
    ColumnAddition {
        table: "sale_item",
        column: "unit_price",
        definition: "INTEGER NOT NULL DEFAULT 0",
        backfill: Some(
            "UPDATE \"sale_item\" SET unit_price = CASE
                 WHEN quantity > 0 THEN CAST(ROUND(total_price * 1.0 / quantity) AS INTEGER)
                 ELSE COALESCE((SELECT s.selling_price FROM \"stock\" s WHERE s.id = \"sale_item\".stock_id), 0)
             END",
        ),
    },
    ColumnAddition {
        table: "grn",
        column: "unit_price",
        definition: "INTEGER NOT NULL DEFAULT 0",
        backfill: Some(
            "UPDATE \"grn\" SET unit_price =
                 COALESCE((SELECT s.selling_price FROM \"stock\" s WHERE s.id = \"grn\".stock_id), 0)",
        ),
    },
    ColumnAddition {
        table: "user",
        column: "is_active",
        definition: "INTEGER NOT NULL DEFAULT 1",
        backfill: None,
    },
];

/// (table, legacy column, current column)
const RENAMES: [(&str, &str, &str); 2] = [
    ("stock", "price", "selling_price"),
    ("user", "password", "password_hash"),
];

/// (index name, table, column)
const FK_INDEXES: [(&str, &str, &str); 7] = [
    ("ix_grn_stock_id", "grn", "stock_id"),
    ("ix_sale_item_sale_id", "sale_item", "sale_id"),
    ("ix_sale_item_stock_id", "sale_item", "stock_id"),
    ("ix_return_sale_item_id", "return", "sale_item_id"),
    ("ix_delivery_sale_id", "delivery", "sale_id"),
    ("ix_delivery_item_delivery_id", "delivery_item", "delivery_id"),
    ("ix_delivery_item_sale_item_id", "delivery_item", "sale_item_id"),
];

const EMAIL_INDEX: &str = "ux_user_email";

// =============================================================================
// Report & Configuration
// =============================================================================

/// Outcome of one migrator run.
///
/// `changes` is empty when the store already had the current shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub changes: Vec<String>,
    pub warnings: Vec<String>,
}

impl MigrationReport {
    /// True when nothing was changed and nothing failed.
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty() && self.warnings.is_empty()
    }

    fn record(&mut self, step: &str, outcome: DbResult<Vec<String>>) {
        match outcome {
            Ok(changes) => self.changes.extend(changes),
            Err(e) => {
                warn!(step, error = %e, "Migration step rolled back");
                self.warnings.push(format!("{}: {}", step, e));
            }
        }
    }
}

/// Account created when no active administrator exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl DefaultAdmin {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        DefaultAdmin {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

impl Default for DefaultAdmin {
    fn default() -> Self {
        DefaultAdmin::new("Admin User", "admin@inaya.local", "admin123")
    }
}

// =============================================================================
// Schema Migrator
// =============================================================================

/// Brings the store to the current schema. See the module docs for steps.
#[derive(Debug, Clone)]
pub struct SchemaMigrator {
    pool: SqlitePool,
    admin: DefaultAdmin,
}

impl SchemaMigrator {
    pub fn new(pool: SqlitePool, admin: DefaultAdmin) -> Self {
        SchemaMigrator { pool, admin }
    }

    /// Runs every step in order.
    ///
    /// ## Returns
    /// * `Ok(report)` - applied changes and non-fatal step failures
    /// * `Err(DbError::MigrationFailed)` - the tables could not be created
    pub async fn migrate(&self) -> DbResult<MigrationReport> {
        let mut conn = self.pool.acquire().await?;
        let mut report = MigrationReport::default();

        let created = ensure_tables(&mut conn)
            .await
            .map_err(|e| DbError::MigrationFailed(e.to_string()))?;
        report.changes.extend(created);

        report.record("rename columns", rename_columns(&mut conn).await);

        for step in [
            StructuralStep::StockToPaise,
            StructuralStep::SaleItemToPaise,
        ] {
            report.record(step.name(), run_structural(&mut conn, step).await);
        }

        for addition in &ADDITIONS {
            report.record("add columns", add_column(&mut conn, addition).await);
        }

        for step in [
            StructuralStep::SplitLegacySales,
            StructuralStep::RepointLegacyReturns,
        ] {
            report.record(step.name(), run_structural(&mut conn, step).await);
        }

        report.record("deduplicate users", dedupe_users(&mut conn).await);
        report.record("create indexes", create_indexes(&mut conn).await);

        match seed_admin(&mut conn, &self.admin).await {
            Ok(changes) => report.changes.extend(changes),
            Err(e) => {
                warn!(error = %e, "Could not create default administrator");
                report
                    .warnings
                    .push(format!("default administrator: {}", e));
            }
        }

        Ok(report)
    }
}

// =============================================================================
// Schema Inspection
// =============================================================================

async fn table_exists(conn: &mut SqliteConnection, table: &str) -> DbResult<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(table)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count > 0)
}

async fn index_exists(conn: &mut SqliteConnection, index: &str) -> DbResult<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1")
            .bind(index)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count > 0)
}

/// Column of a live table.
#[derive(Debug, Clone)]
struct ColumnInfo {
    name: String,
    declared_type: String,
}

impl ColumnInfo {
    /// SQLite affinity rule: a declared type containing "INT" stores integers.
    fn is_integer(&self) -> bool {
        self.declared_type.to_uppercase().contains("INT")
    }
}

async fn columns(conn: &mut SqliteConnection, table: &str) -> DbResult<Vec<ColumnInfo>> {
    let rows: Vec<(String, String)> =
        sqlx::query_as("SELECT name, type FROM pragma_table_info(?1)")
            .bind(table)
            .fetch_all(&mut *conn)
            .await?;

    Ok(rows
        .into_iter()
        .map(|(name, declared_type)| ColumnInfo {
            name,
            declared_type,
        })
        .collect())
}

fn find<'a>(cols: &'a [ColumnInfo], name: &str) -> Option<&'a ColumnInfo> {
    cols.iter().find(|c| c.name == name)
}

/// SQL converting a rupee amount column to integer paise.
fn to_paise(expr: &str) -> String {
    format!("CAST(ROUND(COALESCE({}, 0) * 100) AS INTEGER)", expr)
}

// =============================================================================
// Step 1: Tables
// =============================================================================

async fn ensure_tables(conn: &mut SqliteConnection) -> DbResult<Vec<String>> {
    let mut tx = conn.begin().await?;
    let mut created = Vec::new();

    for table in TABLES {
        if !table_exists(&mut tx, table.name).await? {
            sqlx::query(&table.create_sql(table.name, true))
                .execute(&mut *tx)
                .await?;
            debug!(table = table.name, "Created table");
            created.push(format!("Created table {}", table.name));
        }
    }

    tx.commit().await?;
    Ok(created)
}

// =============================================================================
// Step 2: Renames
// =============================================================================

async fn rename_columns(conn: &mut SqliteConnection) -> DbResult<Vec<String>> {
    let mut tx = conn.begin().await?;
    let mut changes = Vec::new();

    for (table, legacy, current) in RENAMES {
        let cols = columns(&mut tx, table).await?;
        if find(&cols, legacy).is_some() && find(&cols, current).is_none() {
            let sql = format!(
                "ALTER TABLE \"{}\" RENAME COLUMN {} TO {}",
                table, legacy, current
            );
            sqlx::query(&sql).execute(&mut *tx).await?;
            changes.push(format!("Renamed {}.{} to {}.{}", table, legacy, table, current));
        }
    }

    tx.commit().await?;
    Ok(changes)
}

// =============================================================================
// Structural Steps (table rebuilds)
// =============================================================================

/// Steps that rebuild a table and therefore run with foreign keys off.
#[derive(Debug, Clone, Copy)]
enum StructuralStep {
    StockToPaise,
    SaleItemToPaise,
    SplitLegacySales,
    RepointLegacyReturns,
}

impl StructuralStep {
    fn name(&self) -> &'static str {
        match self {
            StructuralStep::StockToPaise => "convert stock prices",
            StructuralStep::SaleItemToPaise => "convert sale item prices",
            StructuralStep::SplitLegacySales => "split legacy sales",
            StructuralStep::RepointLegacyReturns => "re-point legacy returns",
        }
    }

    async fn apply(&self, conn: &mut SqliteConnection) -> DbResult<Option<String>> {
        match self {
            StructuralStep::StockToPaise => stock_to_paise(conn).await,
            StructuralStep::SaleItemToPaise => sale_item_to_paise(conn).await,
            StructuralStep::SplitLegacySales => split_legacy_sales(conn).await,
            StructuralStep::RepointLegacyReturns => repoint_legacy_returns(conn).await,
        }
    }
}

/// Runs a structural step in its own transaction with foreign-key
/// enforcement suspended for the connection.
async fn run_structural(conn: &mut SqliteConnection, step: StructuralStep) -> DbResult<Vec<String>> {
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&mut *conn)
        .await?;

    let outcome = apply_in_transaction(conn, step).await;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    outcome.map(|change| change.into_iter().collect())
}

async fn apply_in_transaction(
    conn: &mut SqliteConnection,
    step: StructuralStep,
) -> DbResult<Option<String>> {
    let mut tx = conn.begin().await?;

    match step.apply(&mut tx).await {
        Ok(change) => {
            tx.commit().await?;
            if let Some(change) = &change {
                debug!(step = step.name(), change = %change, "Structural step committed");
            }
            Ok(change)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

/// Replaces `table` with a freshly created current-shape copy filled by
/// `select`. Row ids are carried over by the select list.
async fn rebuild_table(
    conn: &mut SqliteConnection,
    def: &TableDef,
    insert_columns: &str,
    select: &str,
) -> DbResult<()> {
    let scratch = format!("{}_rebuild", def.name);

    sqlx::query(&def.create_sql(&scratch, false))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&format!(
        "INSERT INTO \"{}\" ({}) {}",
        scratch, insert_columns, select
    ))
    .execute(&mut *conn)
    .await?;
    sqlx::query(&format!("DROP TABLE \"{}\"", def.name))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&format!(
        "ALTER TABLE \"{}\" RENAME TO \"{}\"",
        scratch, def.name
    ))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn count_rows(conn: &mut SqliteConnection, table: &str) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{}\"", table))
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

// -----------------------------------------------------------------------------
// Step 3: Money normalisation
// -----------------------------------------------------------------------------

async fn stock_to_paise(conn: &mut SqliteConnection) -> DbResult<Option<String>> {
    let cols = columns(conn, "stock").await?;
    let Some(price) = find(&cols, "selling_price") else {
        return Ok(None);
    };
    if price.is_integer() {
        return Ok(None);
    }

    let selling = to_paise("selling_price");
    let mrp = match find(&cols, "mrp") {
        Some(_) => to_paise("CASE WHEN mrp IS NULL OR mrp = 0 THEN selling_price ELSE mrp END"),
        None => selling.clone(),
    };
    let select = format!(
        "SELECT id, name, COALESCE(quantity, 0), {}, {} FROM \"stock\"",
        selling, mrp
    );

    let rows = count_rows(conn, "stock").await?;
    rebuild_table(conn, &STOCK, "id, name, quantity, selling_price, mrp", &select).await?;

    Ok(Some(format!("Converted {} stock prices to paise", rows)))
}

async fn sale_item_to_paise(conn: &mut SqliteConnection) -> DbResult<Option<String>> {
    let cols = columns(conn, "sale_item").await?;
    let Some(total) = find(&cols, "total_price") else {
        return Ok(None);
    };
    if total.is_integer() {
        return Ok(None);
    }

    let total_paise = to_paise("si.total_price");
    let unit_paise = match find(&cols, "unit_price") {
        Some(unit) if unit.is_integer() => "si.unit_price".to_string(),
        Some(_) => to_paise("si.unit_price"),
        None => format!(
            "CASE WHEN si.quantity > 0 THEN CAST(ROUND(COALESCE(si.total_price, 0) * 100.0 / si.quantity) AS INTEGER)
                  ELSE COALESCE((SELECT s.selling_price FROM \"stock\" s WHERE s.id = si.stock_id), 0) END"
        ),
    };
    let select = format!(
        "SELECT si.id, si.sale_id, si.stock_id, COALESCE(si.quantity, 0), {}, {} FROM \"sale_item\" si",
        unit_paise, total_paise
    );

    let rows = count_rows(conn, "sale_item").await?;
    rebuild_table(
        conn,
        &SALE_ITEM,
        "id, sale_id, stock_id, quantity, unit_price, total_price",
        &select,
    )
    .await?;
    let uneven = count_uneven_items(conn, None).await?;

    Ok(Some(format!(
        "Converted {} sale item prices to paise{}",
        rows,
        uneven_suffix(uneven)
    )))
}

/// Sale items whose stored total is not `quantity × unit_price`, i.e. a
/// legacy total that did not divide evenly by its quantity. The total is
/// kept as recorded; the unit price is the rounded quotient.
async fn count_uneven_items(conn: &mut SqliteConnection, filter: Option<&str>) -> DbResult<i64> {
    let mut sql = "SELECT COUNT(*) FROM \"sale_item\" WHERE quantity > 0 AND unit_price * quantity <> total_price"
        .to_string();
    if let Some(filter) = filter {
        sql.push_str(" AND ");
        sql.push_str(filter);
    }
    let count: i64 = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await?;
    Ok(count)
}

fn uneven_suffix(uneven: i64) -> String {
    if uneven == 0 {
        String::new()
    } else {
        format!(" ({} totals not a multiple of the unit price)", uneven)
    }
}

// -----------------------------------------------------------------------------
// Step 5: Legacy single-item sales
// -----------------------------------------------------------------------------

async fn split_legacy_sales(conn: &mut SqliteConnection) -> DbResult<Option<String>> {
    let cols = columns(conn, "sale").await?;
    if find(&cols, "stock_id").is_none() {
        return Ok(None);
    }

    let total = match find(&cols, "total_price") {
        Some(c) if c.is_integer() => "COALESCE(total_price, 0)".to_string(),
        Some(_) => to_paise("total_price"),
        None => "0".to_string(),
    };
    let quantity = if find(&cols, "quantity").is_some() {
        "COALESCE(quantity, 0)"
    } else {
        "0"
    };

    let moved = sqlx::query(&format!(
        "INSERT INTO \"sale_item\" (sale_id, stock_id, quantity, unit_price, total_price)
         SELECT id, stock_id, {qty},
                CASE WHEN {qty} > 0 THEN CAST(ROUND(({total}) * 1.0 / {qty}) AS INTEGER)
                     ELSE COALESCE((SELECT s.selling_price FROM \"stock\" s WHERE s.id = \"sale\".stock_id), 0) END,
                {total}
         FROM \"sale\" WHERE stock_id IS NOT NULL ORDER BY id",
        qty = quantity,
        total = total
    ))
    .execute(&mut *conn)
    .await?
    .rows_affected();

    let uneven = count_uneven_items(
        conn,
        Some("sale_id IN (SELECT id FROM \"sale\" WHERE stock_id IS NOT NULL)"),
    )
    .await?;

    let keep = |name: &str| {
        if find(&cols, name).is_some() {
            name.to_string()
        } else {
            "NULL".to_string()
        }
    };
    let select = format!(
        "SELECT id, {}, {}, {}, COALESCE(date, CURRENT_TIMESTAMP) FROM \"sale\"",
        keep("customer_name"),
        keep("customer_mobile"),
        keep("customer_address"),
    );
    rebuild_table(
        conn,
        &SALE,
        "id, customer_name, customer_mobile, customer_address, date",
        &select,
    )
    .await?;

    Ok(Some(format!(
        "Split {} legacy sales into sale items{}",
        moved,
        uneven_suffix(uneven)
    )))
}

// -----------------------------------------------------------------------------
// Step 6: Legacy returns keyed by sale
// -----------------------------------------------------------------------------

async fn repoint_legacy_returns(conn: &mut SqliteConnection) -> DbResult<Option<String>> {
    let cols = columns(conn, "return").await?;
    if find(&cols, "sale_id").is_none() {
        return Ok(None);
    }

    let unresolved: Vec<(i64, Option<i64>)> = sqlx::query_as(
        "SELECT r.id, r.sale_id FROM \"return\" r
         WHERE NOT EXISTS (SELECT 1 FROM \"sale_item\" si WHERE si.sale_id = r.sale_id)
         ORDER BY r.id",
    )
    .fetch_all(&mut *conn)
    .await?;

    if let Some((return_id, sale_id)) = unresolved.first() {
        return Err(DbError::MigrationFailed(format!(
            "{} legacy return(s) cannot be matched to a sale item (first: return {} for sale {})",
            unresolved.len(),
            return_id,
            sale_id.map_or_else(|| "NULL".to_string(), |id| id.to_string())
        )));
    }

    sqlx::query("ALTER TABLE \"return\" RENAME TO \"return_legacy\"")
        .execute(&mut *conn)
        .await?;
    sqlx::query(&RETURN.create_sql(RETURN.name, false))
        .execute(&mut *conn)
        .await?;

    let reason = if find(&cols, "reason").is_some() {
        "r.reason"
    } else {
        "NULL"
    };
    let moved = sqlx::query(&format!(
        "INSERT INTO \"return\" (id, sale_item_id, quantity, reason, date)
         SELECT r.id,
                (SELECT MIN(si.id) FROM \"sale_item\" si WHERE si.sale_id = r.sale_id),
                COALESCE(r.quantity, 0),
                {},
                COALESCE(r.date, CURRENT_TIMESTAMP)
         FROM \"return_legacy\" r ORDER BY r.id",
        reason
    ))
    .execute(&mut *conn)
    .await?
    .rows_affected();

    sqlx::query("DROP TABLE \"return_legacy\"")
        .execute(&mut *conn)
        .await?;

    Ok(Some(format!("Re-pointed {} returns to sale items", moved)))
}

// =============================================================================
// Step 4: Column Additions
// =============================================================================

async fn add_column(conn: &mut SqliteConnection, addition: &ColumnAddition) -> DbResult<Vec<String>> {
    let mut tx = conn.begin().await?;

    let cols = columns(&mut tx, addition.table).await?;
    if cols.is_empty() || find(&cols, addition.column).is_some() {
        return Ok(Vec::new());
    }

    sqlx::query(&format!(
        "ALTER TABLE \"{}\" ADD COLUMN {} {}",
        addition.table, addition.column, addition.definition
    ))
    .execute(&mut *tx)
    .await?;

    let change = match addition.backfill {
        Some(backfill) => {
            let filled = sqlx::query(backfill).execute(&mut *tx).await?.rows_affected();
            format!(
                "Added {}.{} (backfilled {} rows)",
                addition.table, addition.column, filled
            )
        }
        None => format!("Added {}.{}", addition.table, addition.column),
    };

    tx.commit().await?;
    Ok(vec![change])
}

// =============================================================================
// Step 7: Users
// =============================================================================

async fn dedupe_users(conn: &mut SqliteConnection) -> DbResult<Vec<String>> {
    let mut tx = conn.begin().await?;
    let mut changes = Vec::new();

    let removed = sqlx::query(
        "DELETE FROM \"user\" WHERE id NOT IN (SELECT MIN(id) FROM \"user\" GROUP BY email)",
    )
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if removed > 0 {
        changes.push(format!("Removed {} duplicate users", removed));
    }

    if !index_exists(&mut tx, EMAIL_INDEX).await? {
        sqlx::query(&format!(
            "CREATE UNIQUE INDEX \"{}\" ON \"user\"(email)",
            EMAIL_INDEX
        ))
        .execute(&mut *tx)
        .await?;
        changes.push(format!("Created unique index {}", EMAIL_INDEX));
    }

    tx.commit().await?;
    Ok(changes)
}

// =============================================================================
// Step 8: Indexes
// =============================================================================

async fn create_indexes(conn: &mut SqliteConnection) -> DbResult<Vec<String>> {
    let mut tx = conn.begin().await?;
    let mut created = Vec::new();

    for (index, table, column) in FK_INDEXES {
        if !index_exists(&mut tx, index).await? {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS \"{}\" ON \"{}\"({})",
                index, table, column
            ))
            .execute(&mut *tx)
            .await?;
            created.push(index);
        }
    }

    tx.commit().await?;

    if created.is_empty() {
        Ok(Vec::new())
    } else {
        Ok(vec![format!("Created indexes {}", created.join(", "))])
    }
}

// =============================================================================
// Step 9: Default Administrator
// =============================================================================

async fn seed_admin(conn: &mut SqliteConnection, admin: &DefaultAdmin) -> DbResult<Vec<String>> {
    let active_admins: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM \"user\" WHERE role = 'Admin' AND is_active = 1",
    )
    .fetch_one(&mut *conn)
    .await?;

    if active_admins > 0 {
        return Ok(Vec::new());
    }

    let name = validate_required("name", &admin.name)?;
    let email = validate_email(&admin.email)?;
    validate_password(&admin.password)?;
    let hash = hash_password(&admin.password)?;

    sqlx::query(
        "INSERT INTO \"user\" (name, email, password_hash, role, is_active) VALUES (?1, ?2, ?3, 'Admin', 1)",
    )
    .bind(&name)
    .bind(&email)
    .bind(&hash)
    .execute(&mut *conn)
    .await?;

    info!(email = %email, "Created default administrator");
    Ok(vec![format!("Created default admin user ({})", email)])
}

// =============================================================================
// Unit Tests
// =============================================================================
