//! Per-item spending history.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use time::Date;

use crate::{
    calculations::calculate_average_item_price,
    receipt::{LineItem, Transaction, iso_date},
};

use super::descending;

/// One purchase of an item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseEvent {
    /// The day of the purchase.
    #[serde(with = "iso_date")]
    pub date: Date,
    /// The price of one unit.
    pub price: f64,
    /// How many were bought.
    pub quantity: f64,
    /// The line total.
    pub total: f64,
    /// Where it was bought.
    pub warehouse: String,
}

/// Everything spent on, refunded for, and saved on one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    /// The item number, or the description for lines without one.
    pub item_id: String,
    /// The most recent non-empty description seen for the item.
    pub name: String,
    /// The sum of all non-negative lines.
    pub total_spent: f64,
    /// The sum of all negative lines, as a positive number.
    pub total_refunded: f64,
    /// The sum of all discounts that referenced this item, as a positive number.
    pub discount_total: f64,
    /// `total_spent - total_refunded - discount_total`.
    pub net_spend: f64,
    /// Units bought.
    pub unit_count: f64,
    /// Units refunded.
    pub refund_count: f64,
    /// Discount lines that referenced this item.
    pub discount_count: usize,
    /// The mean unit price over all purchases.
    pub average_price: f64,
    /// Purchases from oldest to newest.
    pub purchase_events: Vec<PurchaseEvent>,
    /// The day of the first purchase.
    #[serde(with = "iso_date::option")]
    pub first_purchase: Option<Date>,
    /// The day of the most recent purchase.
    #[serde(with = "iso_date::option")]
    pub last_purchase: Option<Date>,
    /// The departments the item was sold under.
    pub departments: BTreeSet<String>,
}

impl ItemSummary {
    fn new(item_id: String) -> Self {
        Self {
            item_id,
            name: String::new(),
            total_spent: 0.0,
            total_refunded: 0.0,
            discount_total: 0.0,
            net_spend: 0.0,
            unit_count: 0.0,
            refund_count: 0.0,
            discount_count: 0,
            average_price: 0.0,
            purchase_events: Vec::new(),
            first_purchase: None,
            last_purchase: None,
            departments: BTreeSet::new(),
        }
    }

    fn record_purchase(&mut self, line: &LineItem, transaction: &Transaction) {
        let quantity = line.quantity();
        let date = transaction.transaction_date;

        self.total_spent += line.amount;
        self.unit_count += if quantity > 0.0 { quantity } else { 1.0 };
        self.purchase_events.push(PurchaseEvent {
            date,
            price: line.effective_unit_price(),
            quantity,
            total: line.amount,
            warehouse: transaction.warehouse_name.clone(),
        });
        self.first_purchase = Some(self.first_purchase.map_or(date, |first| first.min(date)));
        self.last_purchase = Some(self.last_purchase.map_or(date, |last| last.max(date)));
        self.update_net_spend();
    }

    fn record_refund(&mut self, line: &LineItem) {
        let quantity = line.quantity().abs();

        self.total_refunded += line.amount.abs();
        self.refund_count += if quantity > 0.0 { quantity } else { 1.0 };
        self.update_net_spend();
    }

    fn record_discount(&mut self, line: &LineItem) {
        self.discount_total += line.amount.abs();
        self.discount_count += 1;
        self.update_net_spend();
    }

    fn update_net_spend(&mut self) {
        self.net_spend = self.total_spent - self.total_refunded - self.discount_total;
    }

    fn finish(&mut self) {
        self.purchase_events.sort_by_key(|event| event.date);

        let price_sum: f64 = self.purchase_events.iter().map(|event| event.price).sum();
        self.average_price = calculate_average_item_price(price_sum, self.purchase_events.len())
            .unwrap_or_else(|error| {
                tracing::warn!("Could not compute the average price of {}: {error}", self.item_id);
                0.0
            });
    }
}

/// The key an item line is grouped under.
///
/// Lines without an item number fall back to their description, and lines
/// with neither get a key unique to their position in the input.
fn item_key(line: &LineItem, transaction_index: usize, line_index: usize) -> String {
    line.item_number
        .clone()
        .or_else(|| line.item_description01.clone())
        .unwrap_or_else(|| format!("unidentified-{transaction_index}-{line_index}"))
}

/// Build a summary for every item in `transactions`.
///
/// Discount lines are added to the item they reference and never get an
/// entry of their own. Negative lines count as refunds of the item whatever
/// their quantity.
///
/// The result is sorted by `total_spent`, largest first.
pub fn build_item_summaries(transactions: &[Transaction]) -> Vec<ItemSummary> {
    let mut summaries: BTreeMap<String, ItemSummary> = BTreeMap::new();

    for (transaction_index, transaction) in transactions.iter().enumerate() {
        for (line_index, line) in transaction.item_array.iter().enumerate() {
            if line.is_discount() {
                match line.discount_target() {
                    Some(target) => summaries
                        .entry(target.clone())
                        .or_insert_with(|| ItemSummary::new(target))
                        .record_discount(line),
                    None => tracing::debug!(
                        "Discount line \"{}\" does not name an item, skipping it",
                        line.description()
                    ),
                }
                continue;
            }

            let key = item_key(line, transaction_index, line_index);
            let summary = summaries
                .entry(key.clone())
                .or_insert_with(|| ItemSummary::new(key));

            if !line.description().is_empty() {
                summary.name = line.description().to_owned();
            }
            if let Some(department) = &line.item_department_number {
                summary.departments.insert(department.clone());
            }

            if line.amount >= 0.0 {
                summary.record_purchase(line, transaction);
            } else {
                summary.record_refund(line);
            }
        }
    }

    let mut summaries: Vec<ItemSummary> = summaries.into_values().collect();
    for summary in &mut summaries {
        summary.finish();
    }
    summaries.sort_by(|a, b| descending(a.total_spent, b.total_spent));

    summaries
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::build_item_summaries;
    use crate::{insights::test_utils::receipt, receipt::LineItem};

    #[test]
    fn discounts_are_attributed_to_the_referenced_item() {
        let transactions = vec![receipt(
            date!(2024 - 01 - 10),
            vec![
                LineItem::new("1234567", "KS OLIVE OIL", 20.0, 1.0),
                LineItem::new("348902", "/1234567", -4.0, -1.0),
            ],
        )];

        let summaries = build_item_summaries(&transactions);

        assert_eq!(summaries.len(), 1);
        let oil = &summaries[0];
        assert_eq!(oil.item_id, "1234567");
        assert_eq!(oil.discount_total, 4.0);
        assert_eq!(oil.discount_count, 1);
        assert_eq!(oil.net_spend, 16.0);
        assert!(summaries.iter().all(|summary| summary.item_id != "348902"));
    }

    #[test]
    fn discount_before_purchase_still_lands_on_the_item() {
        let transactions = vec![
            receipt(
                date!(2024 - 01 - 10),
                vec![LineItem::new("348902", "/ 55", -2.0, -1.0)],
            ),
            receipt(
                date!(2024 - 01 - 11),
                vec![LineItem::new("55", "PAPER TOWELS", 22.0, 1.0)],
            ),
        ];

        let summaries = build_item_summaries(&transactions);

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "PAPER TOWELS");
        assert_eq!(summaries[0].net_spend, 20.0);
    }

    #[test]
    fn negative_lines_are_refunds_whatever_their_quantity() {
        let transactions = vec![
            receipt(
                date!(2024 - 01 - 10),
                vec![LineItem::new("9", "VACUUM", 300.0, 1.0)],
            ),
            receipt(
                date!(2024 - 02 - 10),
                vec![LineItem::new("9", "VACUUM", -300.0, -1.0)],
            ),
            receipt(
                date!(2024 - 02 - 20),
                vec![LineItem::new("9", "VACUUM", -20.0, 0.0)],
            ),
        ];

        let summaries = build_item_summaries(&transactions);
        let vacuum = &summaries[0];

        assert_eq!(vacuum.total_spent, 300.0);
        assert_eq!(vacuum.total_refunded, 320.0);
        assert_eq!(vacuum.refund_count, 2.0);
        assert_eq!(vacuum.net_spend, -20.0);
        assert_eq!(vacuum.purchase_events.len(), 1);
    }

    #[test]
    fn net_spend_always_matches_its_parts() {
        let transactions = vec![
            receipt(
                date!(2024 - 03 - 01),
                vec![
                    LineItem::new("1", "A", 10.0, 1.0),
                    LineItem::new("2", "B", 5.0, 1.0),
                    LineItem::new("900", "/1", -1.5, -1.0),
                ],
            ),
            receipt(date!(2024 - 03 - 02), vec![LineItem::new("2", "B", -5.0, -1.0)]),
        ];

        for summary in build_item_summaries(&transactions) {
            assert_eq!(
                summary.net_spend,
                summary.total_spent - summary.total_refunded - summary.discount_total
            );
        }
    }

    #[test]
    fn output_is_sorted_by_spend_and_events_by_date() {
        let transactions = vec![
            receipt(
                date!(2024 - 05 - 01),
                vec![
                    LineItem::new("1", "CHEAP", 2.0, 1.0),
                    LineItem::new("2", "PRICEY", 50.0, 1.0),
                ],
            ),
            receipt(
                date!(2024 - 01 - 01),
                vec![LineItem::new("2", "PRICEY", 45.0, 1.0)],
            ),
        ];

        let summaries = build_item_summaries(&transactions);

        assert_eq!(summaries[0].item_id, "2");
        assert_eq!(summaries[1].item_id, "1");
        let dates: Vec<_> = summaries[0]
            .purchase_events
            .iter()
            .map(|event| event.date)
            .collect();
        assert_eq!(dates, vec![date!(2024 - 01 - 01), date!(2024 - 05 - 01)]);
        assert_eq!(summaries[0].first_purchase, Some(date!(2024 - 01 - 01)));
        assert_eq!(summaries[0].last_purchase, Some(date!(2024 - 05 - 01)));
        assert_eq!(summaries[0].average_price, 47.5);
    }

    #[test]
    fn purchase_price_uses_unit_price_or_amount_over_quantity() {
        let mut priced = LineItem::new("1", "EGGS", 12.0, 2.0);
        priced.unit_price = Some(5.99);
        let transactions = vec![
            receipt(date!(2024 - 01 - 01), vec![priced]),
            receipt(
                date!(2024 - 01 - 02),
                vec![LineItem::new("1", "EGGS", 12.0, 3.0)],
            ),
        ];

        let summaries = build_item_summaries(&transactions);
        let prices: Vec<f64> = summaries[0]
            .purchase_events
            .iter()
            .map(|event| event.price)
            .collect();

        assert_eq!(prices, vec![5.99, 4.0]);
        assert_eq!(summaries[0].unit_count, 5.0);
    }

    #[test]
    fn lines_without_ids_fall_back_to_description_then_position() {
        let no_number = LineItem {
            item_description01: Some("SAMPLE".to_owned()),
            amount: 1.0,
            ..Default::default()
        };
        let anonymous = LineItem {
            amount: 2.0,
            ..Default::default()
        };
        let transactions = vec![receipt(date!(2024 - 01 - 01), vec![no_number, anonymous])];

        let summaries = build_item_summaries(&transactions);
        let ids: Vec<&str> = summaries.iter().map(|s| s.item_id.as_str()).collect();

        assert_eq!(ids, vec!["unidentified-0-1", "SAMPLE"]);
    }

    #[test]
    fn building_twice_gives_equal_results() {
        let transactions = vec![receipt(
            date!(2024 - 01 - 01),
            vec![
                LineItem::new("1", "A", 10.0, 1.0).department("14"),
                LineItem::new("2", "B", 10.0, 1.0).department("17"),
                LineItem::new("3", "C", 10.0, 1.0),
            ],
        )];

        assert_eq!(
            build_item_summaries(&transactions),
            build_item_summaries(&transactions)
        );
    }
}
