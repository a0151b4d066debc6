//! Aggregates computed from a slice of transactions.
//!
//! Every function here is pure: it reads the transactions, never changes
//! them, and returns a fresh, serializable summary. Calling one twice with
//! the same input gives equal results, so maps are ordered and ties in sorts
//! fall back to a fixed order.

mod categories;
mod discounts;
mod gas;
mod items;
mod overview;
mod payments;
mod refunds;

use std::cmp::Ordering;

pub use categories::{CategoryItem, CategorySummary, build_category_summaries};
pub use discounts::{DiscountInsights, DiscountedItem, collect_discount_insights};
pub use gas::{GasInsights, GasMonth, GasPricePoint, GradeBreakdown, collect_gas_insights};
pub use items::{ItemSummary, PurchaseEvent, build_item_summaries};
pub use overview::{OverviewSummary, summarize_overview};
pub use payments::{PaymentInsights, PaymentMethodSummary, collect_payment_insights};
pub use refunds::{DepartmentRefunds, RefundEvent, RefundInsights, collect_refund_insights};

/// Order two amounts from largest to smallest, treating NaN as equal.
fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
pub(crate) mod test_utils {
    use time::Date;

    use crate::receipt::{LineItem, Transaction};

    /// A sale at the Seattle warehouse with the given lines and a matching total.
    pub(crate) fn receipt(date: Date, items: Vec<LineItem>) -> Transaction {
        let total = items.iter().map(|item| item.amount).sum();
        let mut transaction = Transaction::new(date, "SEATTLE #1", total);
        transaction.item_array = items;
        transaction
    }
}
