//! Returns and price adjustments.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use time::Date;

use crate::{
    calculations::{
        ItemLine, RefundKind, calculate_days_kept, calculate_refund_rate, classify_refund_type,
    },
    config::InsightsConfig,
    receipt::{LineItem, Transaction, iso_date},
};

use super::descending;

/// A single negative line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundEvent {
    /// The day of the refund.
    #[serde(with = "iso_date")]
    pub date: Date,
    /// Where the refund was given.
    pub warehouse: String,
    /// The item number, if the line had one.
    pub item_number: Option<String>,
    /// The item description.
    pub name: String,
    /// The amount given back, as a positive number.
    pub amount: f64,
    /// The signed quantity on the line.
    pub quantity: f64,
    /// The department of the item.
    pub department: String,
    /// Whether an earlier purchase at about the same unit price was found.
    pub matched_purchase: bool,
    /// Days since the most recent earlier purchase of the item, if any.
    pub days_kept: Option<i64>,
}

/// Refund totals for one department.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRefunds {
    /// The department number, or "Other".
    pub department: String,
    /// The sum of returns and adjustments, as a positive number.
    pub total: f64,
    /// The number of refund lines.
    pub count: usize,
}

/// Returns and price adjustments over a set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundInsights {
    /// The sum of non-negative transaction totals.
    pub total_purchases: f64,
    /// The sum of returned lines.
    pub total_returned: f64,
    /// The sum of price adjustment lines.
    pub total_adjustments: f64,
    /// The number of returned lines.
    pub return_count: usize,
    /// Returns and adjustments as a percentage of purchases.
    pub refund_rate: f64,
    /// Returned lines, newest first.
    pub returns: Vec<RefundEvent>,
    /// Price adjustment lines, newest first.
    pub adjustments: Vec<RefundEvent>,
    /// Refunds per department, largest first.
    pub by_department: Vec<DepartmentRefunds>,
}

/// Purchases of one product, oldest first.
struct PurchaseHistory {
    dates: Vec<Date>,
    lines: Vec<ItemLine>,
}

impl PurchaseHistory {
    /// The purchases made on or before `date`, and the day of the latest one.
    fn until(&self, date: Date) -> (&[ItemLine], Option<Date>) {
        let count = self.dates.partition_point(|&purchased| purchased <= date);
        (&self.lines[..count], self.dates[..count].last().copied())
    }
}

fn item_line(line: &LineItem) -> ItemLine {
    ItemLine {
        product_name: line.description().to_owned(),
        total_price: line.amount,
        quantity: line.quantity(),
        unit_price: line.unit_price,
    }
}

/// Split the negative lines of `transactions` into returns and price
/// adjustments.
///
/// A negative line with a negative quantity is a return, any other negative
/// line is an adjustment. Discount lines are not refunds and are skipped.
/// Each refund is checked against earlier purchases of the same product to
/// fill in `matched_purchase` and `days_kept`.
pub fn collect_refund_insights(
    transactions: &[Transaction],
    config: &InsightsConfig,
) -> RefundInsights {
    let mut purchases: HashMap<&str, Vec<(Date, ItemLine)>> = HashMap::new();
    for transaction in transactions {
        for line in &transaction.item_array {
            if line.amount >= 0.0 && !line.is_discount() {
                purchases
                    .entry(line.description())
                    .or_default()
                    .push((transaction.transaction_date, item_line(line)));
            }
        }
    }
    let purchases: HashMap<&str, PurchaseHistory> = purchases
        .into_iter()
        .map(|(description, mut found)| {
            found.sort_by_key(|(date, _)| *date);
            let (dates, lines) = found.into_iter().unzip();
            (description, PurchaseHistory { dates, lines })
        })
        .collect();

    let total_purchases: f64 = transactions
        .iter()
        .map(|transaction| transaction.total.max(0.0))
        .sum();

    let mut returns = Vec::new();
    let mut adjustments = Vec::new();
    let mut departments: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for transaction in transactions {
        for line in &transaction.item_array {
            if line.amount >= 0.0 || line.is_discount() {
                continue;
            }

            let date = transaction.transaction_date;
            let (history, last_purchase) = purchases
                .get(line.description())
                .map(|found| found.until(date))
                .unwrap_or_default();

            let Some(classification) =
                classify_refund_type(&item_line(line), history, config.price_match_tolerance)
            else {
                continue;
            };

            let days_kept = last_purchase.and_then(|purchased| {
                calculate_days_kept(&purchased.to_string(), &date.to_string())
            });

            let event = RefundEvent {
                date,
                warehouse: transaction.warehouse_name.clone(),
                item_number: line.item_number.clone(),
                name: line.description().to_owned(),
                amount: classification.amount,
                quantity: line.quantity(),
                department: line.department_key().to_owned(),
                matched_purchase: classification.matched_purchase,
                days_kept,
            };

            let department = departments
                .entry(event.department.clone())
                .or_insert((0.0, 0));
            department.0 += event.amount;
            department.1 += 1;

            match classification.kind {
                RefundKind::FullReturn => returns.push(event),
                RefundKind::PriceAdjustment => adjustments.push(event),
            }
        }
    }

    returns.sort_by(|a: &RefundEvent, b| b.date.cmp(&a.date));
    adjustments.sort_by(|a: &RefundEvent, b| b.date.cmp(&a.date));

    let total_returned: f64 = returns.iter().map(|event| event.amount).sum();
    let total_adjustments: f64 = adjustments.iter().map(|event| event.amount).sum();
    let refund_rate = calculate_refund_rate(total_purchases, total_returned + total_adjustments)
        .unwrap_or_else(|error| {
            tracing::warn!("Could not compute the refund rate: {error}");
            0.0
        });

    let mut by_department: Vec<DepartmentRefunds> = departments
        .into_iter()
        .map(|(department, (total, count))| DepartmentRefunds {
            department,
            total,
            count,
        })
        .collect();
    by_department.sort_by(|a, b| descending(a.total, b.total));

    RefundInsights {
        total_purchases,
        total_returned,
        total_adjustments,
        return_count: returns.len(),
        refund_rate,
        returns,
        adjustments,
        by_department,
    }
}
