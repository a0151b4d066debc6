//! Headline totals for a set of transactions.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use time::Date;

use crate::{
    calculations::{
        Spread, YearOverYear, calculate_average_transaction, calculate_rewards,
        calculate_standard_deviation, calculate_year_over_year_growth,
    },
    config::InsightsConfig,
    receipt::{Transaction, TransactionType, iso_date},
};

/// Counts, totals and trends over a set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewSummary {
    /// The number of transactions.
    pub transaction_count: usize,
    /// The number of sales.
    pub sales_count: usize,
    /// The number of refunds.
    pub refund_count: usize,
    /// The number of online orders.
    pub online_count: usize,
    /// The sum of sale totals.
    pub total_spent: f64,
    /// The sum of refund totals, as a positive number.
    pub total_refunded: f64,
    /// `total_spent - total_refunded`.
    pub net_spent: f64,
    /// The average sale total.
    pub average_transaction: f64,
    /// The number of distinct warehouses, counting online orders as one.
    pub warehouse_count: usize,
    /// The day of the oldest transaction.
    #[serde(with = "iso_date::option")]
    pub first_date: Option<Date>,
    /// The day of the newest transaction.
    #[serde(with = "iso_date::option")]
    pub last_date: Option<Date>,
    /// Net spending per year.
    pub yearly: BTreeMap<String, f64>,
    /// The change between the two most recent years, if there are two.
    pub year_over_year: Option<YearOverYear>,
    /// The spread of net spending across months.
    pub monthly_spread: Spread,
    /// The estimated membership reward per year.
    pub rewards_by_year: BTreeMap<String, f64>,
}

/// Summarize `transactions` into headline numbers.
pub fn summarize_overview(
    transactions: &[Transaction],
    config: &InsightsConfig,
) -> OverviewSummary {
    let mut sales_count = 0;
    let mut refund_count = 0;
    let mut total_spent = 0.0;
    let mut total_refunded = 0.0;
    let mut warehouses = BTreeSet::new();
    let mut yearly: BTreeMap<String, f64> = BTreeMap::new();
    let mut monthly: BTreeMap<String, f64> = BTreeMap::new();
    let mut yearly_subtotals: BTreeMap<String, f64> = BTreeMap::new();

    for transaction in transactions {
        match transaction.transaction_type {
            TransactionType::Sales => {
                sales_count += 1;
                total_spent += transaction.total.max(0.0);
            }
            TransactionType::Refund => {
                refund_count += 1;
                total_refunded += transaction.total.abs();
            }
        }

        warehouses.insert(transaction.warehouse_name.as_str());

        let year = transaction.year_key();
        *yearly.entry(year.clone()).or_insert(0.0) += transaction.total;
        *monthly.entry(transaction.month_key()).or_insert(0.0) += transaction.total;
        *yearly_subtotals.entry(year).or_insert(0.0) += transaction.sub_total.max(0.0);
    }

    let average_transaction = calculate_average_transaction(total_spent, sales_count)
        .unwrap_or_else(|error| {
            tracing::warn!("Could not compute the average transaction: {error}");
            0.0
        });

    let year_over_year = {
        let mut years = yearly.keys().rev();
        match (years.next(), years.next()) {
            (Some(current), Some(previous)) => {
                calculate_year_over_year_growth(&yearly, current, previous)
                    .inspect_err(|error| {
                        tracing::warn!("Could not compare {current} with {previous}: {error}");
                    })
                    .ok()
            }
            _ => None,
        }
    };

    let monthly_totals: Vec<f64> = monthly.into_values().collect();
    let monthly_spread = calculate_standard_deviation(&monthly_totals).unwrap_or_default();

    let rewards_by_year = yearly_subtotals
        .into_iter()
        .map(|(year, subtotal)| {
            let rewards =
                calculate_rewards(subtotal, &config.reward_terms).unwrap_or_else(|error| {
                    tracing::warn!("Could not compute the rewards for {year}: {error}");
                    0.0
                });
            (year, rewards)
        })
        .collect();

    OverviewSummary {
        transaction_count: transactions.len(),
        sales_count,
        refund_count,
        online_count: transactions.iter().filter(|t| t.is_online).count(),
        total_spent,
        total_refunded,
        net_spent: total_spent - total_refunded,
        average_transaction,
        warehouse_count: warehouses.len(),
        first_date: transactions.iter().map(|t| t.transaction_date).min(),
        last_date: transactions.iter().map(|t| t.transaction_date).max(),
        yearly,
        year_over_year,
        monthly_spread,
        rewards_by_year,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::summarize_overview;
    use crate::{
        config::{InsightsConfig, RewardTerms},
        receipt::Transaction,
    };

    fn transactions() -> Vec<Transaction> {
        let mut online = Transaction::new(date!(2024 - 02 - 01), "Online", 100.0);
        online.is_online = true;

        vec![
            Transaction::new(date!(2023 - 06 - 01), "SEATTLE #1", 100.0),
            Transaction::new(date!(2024 - 01 - 10), "SEATTLE #1", 200.0),
            Transaction::new(date!(2024 - 01 - 20), "TACOMA #2", -50.0),
            online,
        ]
    }

    #[test]
    fn counts_and_totals() {
        let overview = summarize_overview(&transactions(), &InsightsConfig::default());

        assert_eq!(overview.transaction_count, 4);
        assert_eq!(overview.sales_count, 3);
        assert_eq!(overview.refund_count, 1);
        assert_eq!(overview.online_count, 1);
        assert_eq!(overview.total_spent, 400.0);
        assert_eq!(overview.total_refunded, 50.0);
        assert_eq!(overview.net_spent, 350.0);
        assert_eq!(overview.average_transaction, 400.0 / 3.0);
        assert_eq!(overview.warehouse_count, 3);
        assert_eq!(overview.first_date, Some(date!(2023 - 06 - 01)));
        assert_eq!(overview.last_date, Some(date!(2024 - 02 - 01)));
    }

    #[test]
    fn compares_the_two_most_recent_years() {
        let overview = summarize_overview(&transactions(), &InsightsConfig::default());

        assert_eq!(overview.yearly["2023"], 100.0);
        assert_eq!(overview.yearly["2024"], 250.0);
        let growth = overview.year_over_year.unwrap();
        assert_eq!(growth.current, 250.0);
        assert_eq!(growth.previous, 100.0);
        assert_eq!(growth.growth_percent, 150.0);
    }

    #[test]
    fn rewards_use_positive_subtotals_and_the_cap() {
        let config = InsightsConfig {
            reward_terms: RewardTerms {
                rate: 0.5,
                cap: 120.0,
            },
            ..Default::default()
        };

        let overview = summarize_overview(&transactions(), &config);

        assert_eq!(overview.rewards_by_year["2023"], 50.0);
        assert_eq!(overview.rewards_by_year["2024"], 120.0);
    }

    #[test]
    fn empty_input_gives_an_empty_overview() {
        let overview = summarize_overview(&[], &InsightsConfig::default());

        assert_eq!(overview.transaction_count, 0);
        assert_eq!(overview.average_transaction, 0.0);
        assert_eq!(overview.first_date, None);
        assert_eq!(overview.year_over_year, None);
        assert_eq!(overview.monthly_spread.std_dev, 0.0);
    }

    #[test]
    fn dates_serialize_as_iso_days() {
        let overview = summarize_overview(&transactions(), &InsightsConfig::default());
        let empty = summarize_overview(&[], &InsightsConfig::default());

        let json = serde_json::to_value(&overview).unwrap();
        let empty_json = serde_json::to_value(&empty).unwrap();

        assert_eq!(json["firstDate"], "2023-06-01");
        assert_eq!(json["lastDate"], "2024-02-01");
        assert!(empty_json["firstDate"].is_null());
    }
}
