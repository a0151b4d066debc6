//! Small financial formulas used by the insights and by report rendering.
//!
//! Inputs are checked up front: a negative or non-finite amount here means
//! the caller has a bug, so these return [Error::ArithmeticGuard] instead of
//! producing a meaningless number.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Error, config::RewardTerms, receipt::parse_iso_date};

fn ensure_non_negative(name: &str, value: f64) -> Result<f64, Error> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(Error::ArithmeticGuard(format!(
            "{name} must be a non-negative number, got {value}"
        )))
    }
}

fn ensure_finite(name: &str, value: f64) -> Result<f64, Error> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Error::ArithmeticGuard(format!(
            "{name} must be a finite number, got {value}"
        )))
    }
}

/// The membership reward earned on `subtotal`, limited to the program's cap.
///
/// # Errors
/// Returns [Error::ArithmeticGuard] if `subtotal`, the rate or the cap is
/// negative or not finite.
pub fn calculate_rewards(subtotal: f64, terms: &RewardTerms) -> Result<f64, Error> {
    let subtotal = ensure_non_negative("subtotal", subtotal)?;
    let rate = ensure_non_negative("reward rate", terms.rate)?;
    let cap = ensure_non_negative("reward cap", terms.cap)?;

    Ok((subtotal * rate).min(cap))
}

/// The percentage of `spent` that was refunded. Zero if nothing was spent.
///
/// # Errors
/// Returns [Error::ArithmeticGuard] if either amount is negative or not finite.
pub fn calculate_refund_rate(spent: f64, refunded: f64) -> Result<f64, Error> {
    let spent = ensure_non_negative("amount spent", spent)?;
    let refunded = ensure_non_negative("amount refunded", refunded)?;

    if spent == 0.0 {
        return Ok(0.0);
    }

    Ok(refunded / spent * 100.0)
}

fn average(total: f64, count: usize) -> Result<f64, Error> {
    let total = ensure_finite("total", total)?;

    if count == 0 {
        Ok(0.0)
    } else {
        Ok(total / count as f64)
    }
}

/// The average amount of a transaction. Zero if there are none.
///
/// # Errors
/// Returns [Error::ArithmeticGuard] if `total` is not finite.
pub fn calculate_average_transaction(total: f64, count: usize) -> Result<f64, Error> {
    average(total, count)
}

/// The average amount spent per purchase. Zero if there are none.
///
/// # Errors
/// Returns [Error::ArithmeticGuard] if `total` is not finite.
pub fn calculate_average_purchase(total: f64, count: usize) -> Result<f64, Error> {
    average(total, count)
}

/// The average price paid for an item. Zero if it was never bought.
///
/// # Errors
/// Returns [Error::ArithmeticGuard] if `total` is not finite.
pub fn calculate_average_item_price(total: f64, count: usize) -> Result<f64, Error> {
    average(total, count)
}

/// How a negative line came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundKind {
    /// The item was brought back.
    FullReturn,
    /// Part of the price was given back while the item was kept.
    PriceAdjustment,
}

/// A line as seen by [classify_refund_type].
#[derive(Debug, Clone, PartialEq)]
pub struct ItemLine {
    /// The product name.
    pub product_name: String,
    /// The signed line total.
    pub total_price: f64,
    /// The signed quantity.
    pub quantity: f64,
    /// The price of one unit, if known.
    pub unit_price: Option<f64>,
}

impl ItemLine {
    /// Create a line with no explicit unit price.
    pub fn new(product_name: &str, total_price: f64, quantity: f64) -> Self {
        Self {
            product_name: product_name.to_owned(),
            total_price,
            quantity,
            unit_price: None,
        }
    }

    fn effective_unit_price(&self) -> f64 {
        match self.unit_price {
            Some(price) => price.abs(),
            None if self.quantity != 0.0 => (self.total_price / self.quantity).abs(),
            None => self.total_price.abs(),
        }
    }
}

/// The result of [classify_refund_type].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundClassification {
    /// Whether this was a return or a price adjustment.
    #[serde(rename = "type")]
    pub kind: RefundKind,
    /// The amount given back, as a positive number.
    pub amount: f64,
    /// Whether an earlier purchase of the same product at about the same unit
    /// price was found.
    pub matched_purchase: bool,
}

/// Classify a negative line as a return or a price adjustment.
///
/// Returns `None` for lines that are not refunds. A line with a negative
/// quantity is a [RefundKind::FullReturn], otherwise it is a
/// [RefundKind::PriceAdjustment]. `matched_purchase` is set if `history` has
/// a purchase of the same product whose unit price is within `tolerance`.
pub fn classify_refund_type(
    item: &ItemLine,
    history: &[ItemLine],
    tolerance: f64,
) -> Option<RefundClassification> {
    if item.total_price.is_nan() || item.total_price >= 0.0 {
        return None;
    }

    let kind = if item.quantity >= 0.0 {
        RefundKind::PriceAdjustment
    } else {
        RefundKind::FullReturn
    };

    let unit_price = item.effective_unit_price();
    let matched_purchase = history.iter().any(|purchase| {
        purchase.total_price >= 0.0
            && purchase.product_name == item.product_name
            && (purchase.effective_unit_price() - unit_price).abs() <= tolerance
    });

    Some(RefundClassification {
        kind,
        amount: item.total_price.abs(),
        matched_purchase,
    })
}

/// The number of days between a purchase and its return, rounded.
///
/// Returns `None` if either date cannot be parsed.
pub fn calculate_days_kept(purchase_date: &str, return_date: &str) -> Option<i64> {
    let purchased = parse_iso_date(purchase_date).ok()?;
    let returned = parse_iso_date(return_date).ok()?;

    Some((returned - purchased).whole_days())
}

/// The mean and population spread of a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Spread {
    /// The arithmetic mean.
    pub mean: f64,
    /// The population variance.
    pub variance: f64,
    /// The square root of the variance.
    pub std_dev: f64,
}

/// The population standard deviation of `values`. All zero for no values.
///
/// # Errors
/// Returns [Error::ArithmeticGuard] if any value is not finite.
pub fn calculate_standard_deviation(values: &[f64]) -> Result<Spread, Error> {
    for value in values {
        ensure_finite("value", *value)?;
    }

    if values.is_empty() {
        return Ok(Spread::default());
    }

    let count = values.len() as f64;
    let mean = values.iter().sum::<f64>() / count;
    let variance = values
        .iter()
        .map(|value| (value - mean).powi(2))
        .sum::<f64>()
        / count;

    Ok(Spread {
        mean,
        variance,
        std_dev: variance.sqrt(),
    })
}

/// The percentage of `dataset` strictly below `value`. Zero for an empty dataset.
pub fn calculate_percentile(value: f64, dataset: &[f64]) -> f64 {
    if dataset.is_empty() {
        return 0.0;
    }

    let below = dataset.iter().filter(|&&other| other < value).count();

    below as f64 / dataset.len() as f64 * 100.0
}

/// The change between two years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearOverYear {
    /// The amount for the current year.
    pub current: f64,
    /// The amount for the previous year.
    pub previous: f64,
    /// `current - previous`.
    pub change: f64,
    /// The change as a percentage of the previous year.
    pub growth_percent: f64,
}

/// Compare two entries of a per-year map. Missing years count as zero.
///
/// When the previous year is zero the growth is 100% if anything was spent
/// in the current year, and 0% otherwise.
///
/// # Errors
/// Returns [Error::ArithmeticGuard] if either amount is not finite.
pub fn calculate_year_over_year_growth(
    yearly: &BTreeMap<String, f64>,
    current_key: &str,
    previous_key: &str,
) -> Result<YearOverYear, Error> {
    let current = ensure_finite("current year", yearly.get(current_key).copied().unwrap_or(0.0))?;
    let previous = ensure_finite(
        "previous year",
        yearly.get(previous_key).copied().unwrap_or(0.0),
    )?;

    let growth_percent = if previous == 0.0 {
        if current > 0.0 { 100.0 } else { 0.0 }
    } else {
        (current - previous) / previous.abs() * 100.0
    };

    Ok(YearOverYear {
        current,
        previous,
        change: current - previous,
        growth_percent,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{
        ItemLine, RefundKind, calculate_average_item_price, calculate_average_purchase,
        calculate_average_transaction, calculate_days_kept, calculate_percentile,
        calculate_refund_rate, calculate_rewards, calculate_standard_deviation,
        calculate_year_over_year_growth, classify_refund_type,
    };
    use crate::{Error, config::RewardTerms};

    #[test]
    fn rewards_are_capped() {
        let terms = RewardTerms::default();

        assert_eq!(calculate_rewards(50000.0, &terms), Ok(1000.0));
        assert_eq!(calculate_rewards(25000.0, &terms), Ok(500.0));
        assert_eq!(calculate_rewards(0.0, &terms), Ok(0.0));
    }

    #[test]
    fn rewards_reject_negative_subtotals() {
        let result = calculate_rewards(-1.0, &RewardTerms::default());

        assert!(matches!(result, Err(Error::ArithmeticGuard(_))));
    }

    #[test]
    fn rewards_reject_nan() {
        let result = calculate_rewards(f64::NAN, &RewardTerms::default());

        assert!(matches!(result, Err(Error::ArithmeticGuard(_))));
    }

    #[test]
    fn refund_rate_is_a_percentage() {
        assert_eq!(calculate_refund_rate(10000.0, 500.0), Ok(5.0));
        assert_eq!(calculate_refund_rate(0.0, 0.0), Ok(0.0));
        assert!(calculate_refund_rate(-10.0, 1.0).is_err());
    }

    #[test]
    fn averages_handle_zero_counts() {
        assert_eq!(calculate_average_transaction(100.0, 4), Ok(25.0));
        assert_eq!(calculate_average_purchase(100.0, 0), Ok(0.0));
        assert_eq!(calculate_average_item_price(9.0, 3), Ok(3.0));
        assert!(calculate_average_transaction(f64::INFINITY, 1).is_err());
    }

    #[test]
    fn negative_quantity_is_a_full_return() {
        let result = classify_refund_type(&ItemLine::new("TV", -50.0, -1.0), &[], 0.02).unwrap();

        assert_eq!(result.kind, RefundKind::FullReturn);
        assert_eq!(result.amount, 50.0);
        assert!(!result.matched_purchase);
    }

    #[test]
    fn positive_quantity_is_a_price_adjustment() {
        let result = classify_refund_type(&ItemLine::new("TV", -10.0, 1.0), &[], 0.02).unwrap();

        assert_eq!(result.kind, RefundKind::PriceAdjustment);
        assert_eq!(result.amount, 10.0);
    }

    #[test]
    fn purchases_are_not_refunds() {
        assert_eq!(
            classify_refund_type(&ItemLine::new("TV", 10.0, 1.0), &[], 0.02),
            None
        );
        assert_eq!(
            classify_refund_type(&ItemLine::new("TV", 0.0, 1.0), &[], 0.02),
            None
        );
    }

    #[test]
    fn return_matches_purchase_within_tolerance() {
        let history = vec![
            ItemLine::new("TV", 499.99, 1.0),
            ItemLine::new("SOUNDBAR", 199.99, 1.0),
        ];

        let matched =
            classify_refund_type(&ItemLine::new("TV", -500.0, -1.0), &history, 0.02).unwrap();
        let unmatched =
            classify_refund_type(&ItemLine::new("TV", -450.0, -1.0), &history, 0.02).unwrap();

        assert!(matched.matched_purchase);
        assert!(!unmatched.matched_purchase);
    }

    #[test]
    fn days_kept_counts_whole_days() {
        assert_eq!(calculate_days_kept("2024-01-01", "2024-01-31"), Some(30));
        assert_eq!(
            calculate_days_kept("2024-02-28T10:00:00", "2024-03-01"),
            Some(2)
        );
        assert_eq!(calculate_days_kept("garbage", "2024-03-01"), None);
    }

    #[test]
    fn standard_deviation_uses_population_variance() {
        let spread = calculate_standard_deviation(&[10.0, 20.0, 30.0, 40.0, 50.0]).unwrap();

        assert_eq!(spread.mean, 30.0);
        assert_eq!(spread.variance, 200.0);
        assert!((spread.std_dev - 14.142).abs() < 0.001);
    }

    #[test]
    fn standard_deviation_of_nothing_is_zero() {
        let spread = calculate_standard_deviation(&[]).unwrap();

        assert_eq!(spread.mean, 0.0);
        assert_eq!(spread.std_dev, 0.0);
    }

    #[test]
    fn percentile_counts_values_strictly_below() {
        let data = [1.0, 2.0, 3.0, 4.0];

        assert_eq!(calculate_percentile(3.0, &data), 50.0);
        assert_eq!(calculate_percentile(0.5, &data), 0.0);
        assert_eq!(calculate_percentile(10.0, &data), 100.0);
        assert_eq!(calculate_percentile(1.0, &[]), 0.0);
    }

    #[test]
    fn year_over_year_growth_avoids_dividing_by_zero() {
        let yearly = BTreeMap::from([
            ("2023".to_owned(), 0.0),
            ("2024".to_owned(), 150.0),
            ("2025".to_owned(), 300.0),
        ]);

        let from_zero = calculate_year_over_year_growth(&yearly, "2024", "2023").unwrap();
        let doubled = calculate_year_over_year_growth(&yearly, "2025", "2024").unwrap();
        let nothing = calculate_year_over_year_growth(&yearly, "2022", "2021").unwrap();

        assert_eq!(from_zero.growth_percent, 100.0);
        assert_eq!(doubled.growth_percent, 100.0);
        assert_eq!(doubled.change, 150.0);
        assert_eq!(nothing.growth_percent, 0.0);
    }
}
