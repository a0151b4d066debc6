//! Spending by department.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::receipt::{LineItem, Transaction};

use super::descending;

/// Spending on one item within a department.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryItem {
    /// The item's description.
    pub name: String,
    /// The sum of its purchases.
    pub total: f64,
    /// The number of purchase lines.
    pub count: usize,
}

/// Spending, refunds and monthly totals for one department.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    /// The department number, or "Other".
    pub department: String,
    /// The sum of non-negative lines.
    pub spend: f64,
    /// The sum of negative lines, as a positive number.
    pub refund_amount: f64,
    /// The number of negative lines.
    pub return_count: usize,
    /// Spend per month, keyed by `YYYY-MM`.
    pub monthly: BTreeMap<String, f64>,
    /// Items in the department, largest total first.
    pub items: Vec<CategoryItem>,
}

#[derive(Default)]
struct CategoryBuilder {
    spend: f64,
    refund_amount: f64,
    return_count: usize,
    monthly: BTreeMap<String, f64>,
    items: BTreeMap<String, (f64, usize)>,
}

fn item_name(line: &LineItem) -> String {
    line.item_description01
        .clone()
        .or_else(|| line.item_number.clone())
        .unwrap_or_else(|| "Unknown item".to_owned())
}

/// Group item lines by department.
///
/// Discount lines are skipped. The result is sorted by spend, largest first.
pub fn build_category_summaries(transactions: &[Transaction]) -> Vec<CategorySummary> {
    let mut categories: BTreeMap<String, CategoryBuilder> = BTreeMap::new();

    for transaction in transactions {
        let month = transaction.month_key();

        for line in transaction
            .item_array
            .iter()
            .filter(|line| !line.is_discount())
        {
            let category = categories
                .entry(line.department_key().to_owned())
                .or_default();

            if line.amount >= 0.0 {
                category.spend += line.amount;
                *category.monthly.entry(month.clone()).or_insert(0.0) += line.amount;

                let item = category.items.entry(item_name(line)).or_insert((0.0, 0));
                item.0 += line.amount;
                item.1 += 1;
            } else {
                category.refund_amount += line.amount.abs();
                category.return_count += 1;
            }
        }
    }

    let mut summaries: Vec<CategorySummary> = categories
        .into_iter()
        .map(|(department, builder)| {
            let mut items: Vec<CategoryItem> = builder
                .items
                .into_iter()
                .map(|(name, (total, count))| CategoryItem { name, total, count })
                .collect();
            items.sort_by(|a, b| descending(a.total, b.total));

            CategorySummary {
                department,
                spend: builder.spend,
                refund_amount: builder.refund_amount,
                return_count: builder.return_count,
                monthly: builder.monthly,
                items,
            }
        })
        .collect();

    summaries.sort_by(|a, b| descending(a.spend, b.spend));

    summaries
}
