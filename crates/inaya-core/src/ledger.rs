//! # Ledger Rules
//!
//! Pure quantity rules behind every stock movement. The database ledger in
//! `inaya-db` fuses these checks with its writes; this module decides what
//! the precise error is and what the resulting quantities are.
//!
//! ## Movements
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Movement          Stock.quantity      SaleItem.quantity   Rule         │
//! │  ────────────────  ──────────────────  ──────────────────  ──────────── │
//! │  receive (GRN)     + qty               -                   qty > 0      │
//! │  sell              - qty               = qty (new row)     qty ≤ stock  │
//! │  return            + qty               - qty               qty ≤ remain │
//! │  cancel pickup     + delivery qty      -                   Picked only  │
//! │  mark delivered    -                   -                   Picked only  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{DeliveryStatus, SaleItem, Stock};
use crate::validation::validate_quantity;

/// Checks an inbound quantity.
pub fn check_receive(qty: i64) -> CoreResult<()> {
    validate_quantity(qty)?;
    Ok(())
}

/// Checks an outbound quantity against the stock on hand.
///
/// Returns the quantity left after the sale.
///
/// ## Example
/// ```rust
/// use inaya_core::ledger::check_sell;
/// use inaya_core::{Money, Stock};
///
/// let stock = Stock {
///     id: 1,
///     name: "Saree A".into(),
///     quantity: 3,
///     selling_price: Money::from_rupees(500),
///     mrp: Money::from_rupees(650),
/// };
/// assert_eq!(check_sell(&stock, 2).unwrap(), 1);
/// assert_eq!(check_sell(&stock, 5).unwrap_err().shortfall(), Some(2));
/// ```
pub fn check_sell(stock: &Stock, qty: i64) -> CoreResult<i64> {
    validate_quantity(qty)?;

    if !stock.can_sell(qty) {
        return Err(CoreError::InsufficientStock {
            stock_id: stock.id,
            name: stock.name.clone(),
            available: stock.quantity,
            requested: qty,
        });
    }

    Ok(stock.quantity - qty)
}

/// Checks a return quantity against what remains on the sale item.
///
/// Returns the remaining quantity after the return.
pub fn check_return(item: &SaleItem, qty: i64) -> CoreResult<i64> {
    validate_quantity(qty)?;

    if qty > item.quantity {
        return Err(CoreError::OverReturn {
            sale_item_id: item.id,
            remaining: item.quantity,
            requested: qty,
        });
    }

    Ok(item.quantity - qty)
}

/// Rejects a return while the goods are with the courier or already restocked
/// by a cancellation.
pub fn check_returnable_delivery(
    sale_item_id: i64,
    delivery: Option<(i64, DeliveryStatus)>,
) -> CoreResult<()> {
    match delivery {
        Some((delivery_id, status)) if status != DeliveryStatus::Delivered => {
            Err(CoreError::DeliveryInTransit {
                sale_item_id,
                delivery_id,
                status,
            })
        }
        _ => Ok(()),
    }
}

/// Line total for the quantity still held by the customer.
#[inline]
pub fn line_total(unit_price: Money, remaining: i64) -> Money {
    unit_price.multiply_quantity(remaining)
}

impl DeliveryStatus {
    /// Applies a state-machine edge, or explains why it is not allowed.
    pub fn transition(self, next: DeliveryStatus, delivery_id: i64) -> CoreResult<DeliveryStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::DeliveryNotPending {
                delivery_id,
                status: self,
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use proptest::prelude::*;

    fn stock(quantity: i64) -> Stock {
        Stock {
            id: 1,
            name: "Saree A".to_string(),
            quantity,
            selling_price: Money::from_rupees(500),
            mrp: Money::from_rupees(650),
        }
    }

    fn item(quantity: i64) -> SaleItem {
        SaleItem {
            id: 7,
            sale_id: 3,
            stock_id: 1,
            quantity,
            unit_price: Money::from_rupees(500),
            total_price: Money::from_rupees(500) * quantity,
        }
    }

    #[test]
    fn test_sell_reports_shortfall() {
        let err = check_sell(&stock(3), 5).unwrap_err();
        match err {
            CoreError::InsufficientStock {
                ref name,
                available,
                requested,
                ..
            } => {
                assert_eq!(name, "Saree A");
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.shortfall(), Some(2));
    }

    #[test]
    fn test_sell_exact_stock() {
        assert_eq!(check_sell(&stock(3), 3).unwrap(), 0);
    }

    #[test]
    fn test_return_rules() {
        assert_eq!(check_return(&item(8), 3).unwrap(), 5);
        assert_eq!(check_return(&item(8), 8).unwrap(), 0);

        let err = check_return(&item(2), 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OverReturn);

        let err = check_return(&item(2), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_returnable_delivery() {
        assert!(check_returnable_delivery(7, None).is_ok());
        assert!(check_returnable_delivery(7, Some((2, DeliveryStatus::Delivered))).is_ok());

        let err = check_returnable_delivery(7, Some((2, DeliveryStatus::Picked))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = check_returnable_delivery(7, Some((2, DeliveryStatus::Cancelled))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_delivery_transition_errors() {
        assert_eq!(
            DeliveryStatus::Picked
                .transition(DeliveryStatus::Cancelled, 1)
                .unwrap(),
            DeliveryStatus::Cancelled
        );
        let err = DeliveryStatus::Delivered
            .transition(DeliveryStatus::Cancelled, 9)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::DeliveryNotPending {
                delivery_id: 9,
                status: DeliveryStatus::Delivered
            }
        ));
    }

    #[test]
    fn test_saree_line_total_after_return() {
        // 8 sold at Rs. 500, 3 returned
        assert_eq!(line_total(Money::from_rupees(500), 8), Money::from_rupees(4_000));
        assert_eq!(line_total(Money::from_rupees(500), 5), Money::from_rupees(2_500));
    }

    proptest! {
        #[test]
        fn sell_never_goes_negative(on_hand in 0i64..500, qty in 1i64..1_000) {
            match check_sell(&stock(on_hand), qty) {
                Ok(left) => {
                    prop_assert!(left >= 0);
                    prop_assert_eq!(left + qty, on_hand);
                }
                Err(err) => {
                    prop_assert!(qty > on_hand);
                    prop_assert_eq!(err.shortfall(), Some(qty - on_hand));
                }
            }
        }

        #[test]
        fn returns_never_exceed_remaining(sold in 0i64..200, qty in 1i64..400) {
            match check_return(&item(sold), qty) {
                Ok(remaining) => {
                    prop_assert!(remaining >= 0 && remaining <= sold);
                    prop_assert_eq!(remaining + qty, sold);
                }
                Err(err) => prop_assert_eq!(err.kind(), ErrorKind::OverReturn),
            }
        }

        #[test]
        fn total_tracks_remaining(paise in 1i64..1_000_000, remaining in 0i64..1_000) {
            let unit = Money::from_paise(paise);
            prop_assert_eq!(line_total(unit, remaining).paise(), paise * remaining);
        }

        #[test]
        fn terminal_states_reject_everything(next_idx in 0usize..3) {
            let all = [DeliveryStatus::Picked, DeliveryStatus::Delivered, DeliveryStatus::Cancelled];
            let next = all[next_idx];
            prop_assert!(DeliveryStatus::Delivered.transition(next, 1).is_err());
            prop_assert!(DeliveryStatus::Cancelled.transition(next, 1).is_err());
        }
    }
}
