//! Gas station spending and fuel prices.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    config::InsightsConfig,
    receipt::{LineItem, Transaction},
};

use super::descending;

/// The grade reported for fuel lines whose item number is not configured.
const OTHER_GRADE: &str = "Other";

/// Gas spending in one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasMonth {
    /// The month as `YYYY-MM`.
    pub month: String,
    /// The sum of gas transaction totals.
    pub spent: f64,
    /// Gallons pumped.
    pub gallons: f64,
    /// The number of gas transactions.
    pub visits: usize,
}

/// The average price per gallon of each grade in one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPricePoint {
    /// The month as `YYYY-MM`.
    pub month: String,
    /// Price per gallon keyed by grade name, `None` if none of that grade was
    /// pumped in the month.
    pub prices: BTreeMap<String, Option<f64>>,
}

/// Totals for one fuel grade.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBreakdown {
    /// The grade name.
    pub grade: String,
    /// The sum of the grade's line amounts.
    pub spent: f64,
    /// Gallons pumped.
    pub gallons: f64,
    /// The gallon-weighted price, `None` if no gallons were recorded.
    pub average_price: Option<f64>,
}

/// Gas spending and fuel prices over a set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasInsights {
    /// The sum of gas transaction totals.
    pub total_spent: f64,
    /// Gallons pumped.
    pub total_gallons: f64,
    /// The gallon-weighted price per gallon, zero if no gallons were recorded.
    pub average_price: f64,
    /// The number of gas transactions.
    pub visits: usize,
    /// The number of distinct gas stations.
    pub location_count: usize,
    /// Spending per month, oldest first.
    pub monthly: Vec<GasMonth>,
    /// Prices per grade per month, oldest first.
    pub price_history: Vec<GasPricePoint>,
    /// Totals per grade, largest spend first.
    pub grade_breakdown: Vec<GradeBreakdown>,
}

/// Gallons and gallon-weighted price for one bucket.
#[derive(Debug, Default, Clone, Copy)]
struct FuelTotals {
    spent: f64,
    gallons: f64,
    weighted_price: f64,
}

impl FuelTotals {
    fn add(&mut self, line: &LineItem) {
        self.spent += line.amount;

        if let (Some(gallons), Some(price)) = (line.fuel_unit_quantity, line.item_unit_price_amount)
            && gallons > 0.0
            && price > 0.0
        {
            self.gallons += gallons;
            self.weighted_price += gallons * price;
        }
    }

    fn average_price(&self) -> Option<f64> {
        if self.gallons > 0.0 {
            Some(self.weighted_price / self.gallons)
        } else {
            None
        }
    }
}

/// The grade a fuel line belongs to, or `None` for non-fuel lines.
fn fuel_grade<'a>(line: &LineItem, config: &'a InsightsConfig) -> Option<&'a str> {
    let configured = line
        .item_number
        .as_deref()
        .and_then(|number| config.fuel_grade(number))
        .map(|grade| grade.name.as_str());

    match configured {
        Some(name) => Some(name),
        None if line.fuel_unit_quantity.is_some_and(|gallons| gallons > 0.0) => Some(OTHER_GRADE),
        None => None,
    }
}

/// Summarize the gas transactions in `transactions`.
///
/// Prices are weighted by gallons, and a month or grade without gallons
/// reports no price instead of dividing by zero.
pub fn collect_gas_insights(transactions: &[Transaction], config: &InsightsConfig) -> GasInsights {
    let mut total_spent = 0.0;
    let mut visits = 0;
    let mut overall = FuelTotals::default();
    let mut locations = BTreeSet::new();
    let mut months: BTreeMap<String, (f64, usize, FuelTotals)> = BTreeMap::new();
    let mut grades: BTreeMap<String, FuelTotals> = BTreeMap::new();
    let mut grade_months: BTreeMap<(String, String), FuelTotals> = BTreeMap::new();

    for transaction in transactions.iter().filter(|t| t.is_gas(config)) {
        let month_key = transaction.month_key();

        total_spent += transaction.total;
        visits += 1;
        locations.insert(transaction.warehouse_name.as_str());

        let month = months
            .entry(month_key.clone())
            .or_insert((0.0, 0, FuelTotals::default()));
        month.0 += transaction.total;
        month.1 += 1;

        for line in &transaction.item_array {
            let Some(grade) = fuel_grade(line, config) else {
                continue;
            };

            overall.add(line);
            month.2.add(line);
            grades.entry(grade.to_owned()).or_default().add(line);
            grade_months
                .entry((month_key.clone(), grade.to_owned()))
                .or_default()
                .add(line);
        }
    }

    tracing::debug!(
        "Found {visits} gas transactions at {} locations",
        locations.len()
    );

    let price_history = months
        .keys()
        .map(|month| GasPricePoint {
            month: month.clone(),
            prices: grades
                .keys()
                .map(|grade| {
                    let price = grade_months
                        .get(&(month.clone(), grade.clone()))
                        .and_then(FuelTotals::average_price);
                    (grade.clone(), price)
                })
                .collect(),
        })
        .collect();

    let monthly = months
        .into_iter()
        .map(|(month, (spent, visits, fuel))| GasMonth {
            month,
            spent,
            gallons: fuel.gallons,
            visits,
        })
        .collect();

    let mut grade_breakdown: Vec<GradeBreakdown> = grades
        .into_iter()
        .map(|(grade, totals)| GradeBreakdown {
            grade,
            spent: totals.spent,
            gallons: totals.gallons,
            average_price: totals.average_price(),
        })
        .collect();
    grade_breakdown.sort_by(|a, b| descending(a.spent, b.spent));

    GasInsights {
        total_spent,
        total_gallons: overall.gallons,
        average_price: overall.average_price().unwrap_or(0.0),
        visits,
        location_count: locations.len(),
        monthly,
        price_history,
        grade_breakdown,
    }
}
