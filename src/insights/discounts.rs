//! Savings from instant rebates and coupons.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    config::InsightsConfig,
    receipt::{LineItem, Transaction},
};

use super::descending;

/// The discounts applied to one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountedItem {
    /// The item number the discounts referenced.
    pub item_id: String,
    /// The item's description, if a purchase line for it was seen.
    pub name: Option<String>,
    /// The total saved, as a positive number.
    pub total: f64,
    /// How many discount lines referenced the item.
    pub count: usize,
}

/// Totals over all discount lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountInsights {
    /// The sum of all discounts, as a positive number.
    pub total_saved: f64,
    /// The number of discount lines.
    pub discount_count: usize,
    /// The items with the biggest savings, largest first.
    pub top_items: Vec<DiscountedItem>,
}

/// The item a discount line is credited to. Falls back to the discount line's
/// own number or description when no item number can be read.
fn discount_key(line: &LineItem) -> String {
    line.discount_target()
        .or_else(|| line.item_number.clone())
        .unwrap_or_else(|| line.description().to_owned())
}

/// Sum the discount lines in `transactions` by the item they apply to.
///
/// Only the `config.top_discount_limit` items with the largest savings are
/// listed, but the totals cover every discount.
pub fn collect_discount_insights(
    transactions: &[Transaction],
    config: &InsightsConfig,
) -> DiscountInsights {
    let mut names: BTreeMap<&str, &str> = BTreeMap::new();
    let mut by_item: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    let mut total_saved = 0.0;
    let mut discount_count = 0;

    for line in transactions
        .iter()
        .flat_map(|transaction| &transaction.item_array)
    {
        if !line.is_discount() {
            if let (Some(number), Some(name)) = (&line.item_number, &line.item_description01) {
                names.insert(number, name);
            }
            continue;
        }

        let saved = line.amount.abs();
        total_saved += saved;
        discount_count += 1;

        let entry = by_item.entry(discount_key(line)).or_insert((0.0, 0));
        entry.0 += saved;
        entry.1 += 1;
    }

    let mut top_items: Vec<DiscountedItem> = by_item
        .into_iter()
        .map(|(item_id, (total, count))| DiscountedItem {
            name: names.get(item_id.as_str()).map(|name| (*name).to_owned()),
            item_id,
            total,
            count,
        })
        .collect();
    top_items.sort_by(|a, b| descending(a.total, b.total));
    top_items.truncate(config.top_discount_limit);

    DiscountInsights {
        total_saved,
        discount_count,
        top_items,
    }
}
