//! Spending and estimated card rewards per payment method.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{config::InsightsConfig, receipt::Transaction};

use super::descending;

const UNKNOWN_METHOD: &str = "Unknown";

/// Spending with one payment method.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodSummary {
    /// The tender description, e.g. "COSTCO VISA".
    pub method: String,
    /// The sum of tender amounts.
    pub total: f64,
    /// The number of tenders.
    pub count: usize,
    /// The part of `total` paid on gas transactions.
    pub gas_spend: f64,
    /// The part of `total` paid on everything else.
    pub merchandise_spend: f64,
    /// Tender amounts per year.
    pub by_year: BTreeMap<String, f64>,
    /// The estimated card reward.
    pub rewards: f64,
}

/// Spending by payment method.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInsights {
    /// The sum over all methods.
    pub total: f64,
    /// Methods with the largest total first.
    pub methods: Vec<PaymentMethodSummary>,
    /// The sum of estimated rewards over all methods.
    pub rewards: f64,
}

impl PaymentMethodSummary {
    fn new(method: String) -> Self {
        Self {
            method,
            total: 0.0,
            count: 0,
            gas_spend: 0.0,
            merchandise_spend: 0.0,
            by_year: BTreeMap::new(),
            rewards: 0.0,
        }
    }

    fn estimate_rewards(&mut self, config: &InsightsConfig) {
        self.rewards = match config.reward_program(&self.method) {
            Some(program) => {
                self.gas_spend * program.gas_rate
                    + self.merchandise_spend * program.merchandise_rate
            }
            None => self.total * config.default_reward_rate,
        };
    }
}

/// Group tenders by payment method and estimate the rewards each earned.
///
/// Methods that belong to a configured reward program earn its gas and
/// merchandise rates, every other method earns the default rate on its total.
pub fn collect_payment_insights(
    transactions: &[Transaction],
    config: &InsightsConfig,
) -> PaymentInsights {
    let mut methods: BTreeMap<String, PaymentMethodSummary> = BTreeMap::new();

    for transaction in transactions {
        let is_gas = transaction.is_gas(config);
        let year = transaction.year_key();

        for tender in &transaction.tender_array {
            let name = match tender.tender_description.trim() {
                "" => UNKNOWN_METHOD,
                name => name,
            };
            let method = methods
                .entry(name.to_owned())
                .or_insert_with(|| PaymentMethodSummary::new(name.to_owned()));

            method.total += tender.amount_tender;
            method.count += 1;
            if is_gas {
                method.gas_spend += tender.amount_tender;
            } else {
                method.merchandise_spend += tender.amount_tender;
            }
            *method.by_year.entry(year.clone()).or_insert(0.0) += tender.amount_tender;
        }
    }

    let mut methods: Vec<PaymentMethodSummary> = methods.into_values().collect();
    for method in &mut methods {
        method.estimate_rewards(config);
    }
    methods.sort_by(|a, b| descending(a.total, b.total));

    PaymentInsights {
        total: methods.iter().map(|method| method.total).sum(),
        rewards: methods.iter().map(|method| method.rewards).sum(),
        methods,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::collect_payment_insights;
    use crate::{config::InsightsConfig, receipt::Transaction};

    fn payments() -> Vec<Transaction> {
        vec![
            Transaction::new(date!(2023 - 12 - 30), "SEATTLE #1", 200.0)
                .with_tender("COSTCO VISA", 200.0),
            Transaction::new(date!(2024 - 01 - 05), "GAS #1", 50.0)
                .with_receipt_type("Gas Station")
                .with_tender("Costco Visa", 50.0),
            Transaction::new(date!(2024 - 01 - 06), "SEATTLE #1", 100.0)
                .with_tender("DEBIT", 60.0)
                .with_tender("CASH", 40.0),
        ]
    }

    #[test]
    fn program_cards_earn_split_rates() {
        let insights = collect_payment_insights(&payments(), &InsightsConfig::default());

        let visa = &insights.methods[0];
        assert_eq!(visa.method, "COSTCO VISA");
        assert_eq!(visa.total, 200.0);
        assert_eq!(visa.rewards, 4.0);

        let gas_visa = insights
            .methods
            .iter()
            .find(|method| method.method == "Costco Visa")
            .unwrap();
        assert_eq!(gas_visa.gas_spend, 50.0);
        assert_eq!(gas_visa.merchandise_spend, 0.0);
        assert_eq!(gas_visa.rewards, 2.0);
    }

    #[test]
    fn other_methods_earn_the_default_rate() {
        let insights = collect_payment_insights(&payments(), &InsightsConfig::default());

        let debit = insights
            .methods
            .iter()
            .find(|method| method.method == "DEBIT")
            .unwrap();
        assert_eq!(debit.rewards, 0.6);
        assert_eq!(insights.total, 350.0);
        assert!((insights.rewards - 7.0).abs() < 1e-9);
    }

    #[test]
    fn methods_are_sorted_by_total_and_split_by_year() {
        let insights = collect_payment_insights(&payments(), &InsightsConfig::default());

        let totals: Vec<f64> = insights.methods.iter().map(|method| method.total).collect();
        assert_eq!(totals, vec![200.0, 60.0, 50.0, 40.0]);
        assert_eq!(insights.methods[0].by_year["2023"], 200.0);
    }

    #[test]
    fn blank_method_names_are_unknown() {
        let transactions = vec![
            Transaction::new(date!(2024 - 01 - 05), "SEATTLE #1", 10.0).with_tender("  ", 10.0),
        ];

        let insights = collect_payment_insights(&transactions, &InsightsConfig::default());

        assert_eq!(insights.methods[0].method, "Unknown");
        assert_eq!(insights.methods[0].count, 1);
    }

    #[test]
    fn equal_totals_keep_method_order_on_every_call() {
        let transactions = vec![
            Transaction::new(date!(2024 - 01 - 05), "SEATTLE #1", 50.0).with_tender("DEBIT", 50.0),
            Transaction::new(date!(2024 - 01 - 06), "SEATTLE #1", 50.0).with_tender("CASH", 50.0),
        ];
        let config = InsightsConfig::default();

        let first = collect_payment_insights(&transactions, &config);
        let second = collect_payment_insights(&transactions, &config);

        assert_eq!(first, second);
        assert_eq!(first.methods[0].method, "CASH");
        assert_eq!(first.methods[1].method, "DEBIT");
    }
}
