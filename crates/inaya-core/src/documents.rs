//! # Invoice Documents
//!
//! Read-only projections handed to the invoice renderer. Each document is
//! assembled from id-based queries in `inaya-db` and carries its computed
//! totals so the renderer never does arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Delivery, GoodsReceipt, ReturnRecord, Sale};

/// A sale item joined with its stock name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DocumentLine {
    pub sale_item_id: i64,
    pub stock_id: i64,
    pub stock_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub total_price: Money,
}

/// Sales invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDocument {
    pub sale: Sale,
    pub lines: Vec<DocumentLine>,
    pub grand_total: Money,
}

impl SaleDocument {
    pub fn new(sale: Sale, lines: Vec<DocumentLine>) -> Self {
        let grand_total = lines.iter().map(|l| l.total_price).sum();
        SaleDocument {
            sale,
            lines,
            grand_total,
        }
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }
}

/// Goods received note, also one row of the GRN report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GrnDocument {
    pub grn: GoodsReceipt,
    pub stock_name: String,
    /// Current tag price of the stock item.
    pub mrp: Money,
    pub total_selling_price: Money,
}

impl GrnDocument {
    pub fn new(grn: GoodsReceipt, stock_name: String, mrp: Money) -> Self {
        let total_selling_price = grn.total_selling_price();
        GrnDocument {
            grn,
            stock_name,
            mrp,
            total_selling_price,
        }
    }
}

/// Return note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnDocument {
    pub record: ReturnRecord,
    pub sale_id: i64,
    pub stock_name: String,
    pub unit_price: Money,
    /// Value of the returned units at the price they were sold for.
    pub refund_amount: Money,
}

impl ReturnDocument {
    pub fn new(record: ReturnRecord, sale_id: i64, stock_name: String, unit_price: Money) -> Self {
        let refund_amount = unit_price * record.quantity;
        ReturnDocument {
            record,
            sale_id,
            stock_name,
            unit_price,
            refund_amount,
        }
    }
}

/// Delivery challan: the delivery header with the goods the courier carries.
///
/// Line quantities are the delivered quantities, so the total stays the
/// same even if the sale items change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeliveryDocument {
    pub delivery: Delivery,
    pub lines: Vec<DocumentLine>,
    pub grand_total: Money,
}

impl DeliveryDocument {
    pub fn new(delivery: Delivery, lines: Vec<DocumentLine>) -> Self {
        let grand_total = lines.iter().map(|l| l.total_price).sum();
        DeliveryDocument {
            delivery,
            lines,
            grand_total,
        }
    }
}

/// Aggregate figures printed at the top of the stock report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockValuation {
    pub items: i64,
    pub units: i64,
    pub selling_value: Money,
    pub mrp_value: Money,
    #[ts(as = "String")]
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, qty: i64, unit_rupees: i64) -> DocumentLine {
        DocumentLine {
            sale_item_id: id,
            stock_id: id,
            stock_name: format!("Item {}", id),
            quantity: qty,
            unit_price: Money::from_rupees(unit_rupees),
            total_price: Money::from_rupees(unit_rupees) * qty,
        }
    }

    #[test]
    fn test_sale_document_totals() {
        let sale = Sale {
            id: 1,
            customer_name: Some("Ayesha".to_string()),
            customer_mobile: None,
            customer_address: None,
            date: Utc::now(),
        };
        let doc = SaleDocument::new(sale, vec![line(1, 5, 500), line(2, 2, 1_200)]);
        assert_eq!(doc.grand_total, Money::from_rupees(4_900));
        assert_eq!(doc.total_quantity(), 7);
    }

    #[test]
    fn test_return_refund_uses_sale_price() {
        let record = ReturnRecord {
            id: 1,
            sale_item_id: 4,
            quantity: 3,
            reason: Some("wrong size".to_string()),
            date: Utc::now(),
        };
        let doc = ReturnDocument::new(record, 2, "Saree A".to_string(), Money::from_rupees(500));
        assert_eq!(doc.refund_amount, Money::from_rupees(1_500));
    }
}
