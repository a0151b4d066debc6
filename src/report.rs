//! Plain text and CSV renderings of the insights.
//!
//! JSON output needs nothing beyond `serde_json`, so only the formats that
//! need hand-written layouts live here.

use std::{io::Write, sync::OnceLock};

use numfmt::{Formatter, Precision};

use crate::{
    Error,
    insights::{
        CategorySummary, DiscountInsights, GasInsights, ItemSummary, OverviewSummary,
        PaymentInsights, RefundInsights,
    },
};

fn currency_formatter(negative: bool) -> Option<&'static Formatter> {
    static POSITIVE_FMT: OnceLock<Option<Formatter>> = OnceLock::new();
    static NEGATIVE_FMT: OnceLock<Option<Formatter>> = OnceLock::new();

    let (cell, prefix) = if negative {
        (&NEGATIVE_FMT, "-$")
    } else {
        (&POSITIVE_FMT, "$")
    };

    cell.get_or_init(|| {
        Formatter::currency(prefix)
            .ok()
            .map(|formatter| formatter.precision(Precision::Decimals(2)))
    })
    .as_ref()
}

/// Format `number` as dollars with two decimal places, e.g. `-$1,234.50`.
pub fn format_currency(number: f64) -> String {
    // Zero is rendered as "0" by numfmt.
    if number == 0.0 || !number.is_finite() {
        return "$0.00".to_owned();
    }

    let negative = number < 0.0;
    let mut formatted = match currency_formatter(negative) {
        Some(formatter) => formatter.fmt_string(number.abs()),
        None => format!("{}${:.2}", if negative { "-" } else { "" }, number.abs()),
    };

    // numfmt drops trailing zeros, e.g. "12.30" comes out as "12.3".
    match formatted.rfind('.') {
        None => formatted.push_str(".00"),
        Some(index) if formatted.len() - index == 2 => formatted.push('0'),
        Some(_) => {}
    }

    formatted
}

fn format_percent(number: f64) -> String {
    format!("{number:.1}%")
}

/// Write the overview as aligned `label: value` lines.
pub fn write_overview_text(overview: &OverviewSummary, mut out: impl Write) -> Result<(), Error> {
    let dates = match (overview.first_date, overview.last_date) {
        (Some(first), Some(last)) => format!("{first} to {last}"),
        _ => "no transactions".to_owned(),
    };

    writeln!(out, "Period:              {dates}")?;
    writeln!(
        out,
        "Transactions:        {} ({} sales, {} refunds, {} online)",
        overview.transaction_count,
        overview.sales_count,
        overview.refund_count,
        overview.online_count
    )?;
    writeln!(out, "Warehouses:          {}", overview.warehouse_count)?;
    writeln!(
        out,
        "Total spent:         {}",
        format_currency(overview.total_spent)
    )?;
    writeln!(
        out,
        "Total refunded:      {}",
        format_currency(overview.total_refunded)
    )?;
    writeln!(
        out,
        "Net spent:           {}",
        format_currency(overview.net_spent)
    )?;
    writeln!(
        out,
        "Average transaction: {}",
        format_currency(overview.average_transaction)
    )?;
    writeln!(
        out,
        "Monthly std. dev.:   {}",
        format_currency(overview.monthly_spread.std_dev)
    )?;

    if !overview.yearly.is_empty() {
        writeln!(out)?;
        writeln!(out, "Year  Net spent      Rewards")?;
        for (year, total) in &overview.yearly {
            let rewards = overview.rewards_by_year.get(year).copied().unwrap_or(0.0);
            writeln!(
                out,
                "{year}  {:<13}  {}",
                format_currency(*total),
                format_currency(rewards)
            )?;
        }
    }

    if let Some(growth) = &overview.year_over_year {
        writeln!(
            out,
            "Change on previous year: {} ({})",
            format_currency(growth.change),
            format_percent(growth.growth_percent)
        )?;
    }

    Ok(())
}

/// Write one line per item, largest spend first.
pub fn write_items_text(items: &[ItemSummary], mut out: impl Write) -> Result<(), Error> {
    for item in items {
        writeln!(
            out,
            "{:<12} {:<32} {:>12} {:>6} units",
            item.item_id,
            item.name,
            format_currency(item.net_spend),
            item.unit_count
        )?;
    }

    Ok(())
}

/// Write one line per department and its top items.
pub fn write_categories_text(
    categories: &[CategorySummary],
    mut out: impl Write,
) -> Result<(), Error> {
    for category in categories {
        writeln!(
            out,
            "Department {}: {} spent, {} refunded",
            category.department,
            format_currency(category.spend),
            format_currency(category.refund_amount)
        )?;
        for item in category.items.iter().take(5) {
            writeln!(out, "    {:<32} {}", item.name, format_currency(item.total))?;
        }
    }

    Ok(())
}

/// Write the discount totals and the top discounted items.
pub fn write_discounts_text(
    discounts: &DiscountInsights,
    mut out: impl Write,
) -> Result<(), Error> {
    writeln!(
        out,
        "Saved {} over {} discounts",
        format_currency(discounts.total_saved),
        discounts.discount_count
    )?;
    for item in &discounts.top_items {
        writeln!(
            out,
            "    {:<12} {:<32} {}",
            item.item_id,
            item.name.as_deref().unwrap_or(""),
            format_currency(item.total)
        )?;
    }

    Ok(())
}

/// Write the refund totals and each return.
pub fn write_refunds_text(refunds: &RefundInsights, mut out: impl Write) -> Result<(), Error> {
    writeln!(
        out,
        "Returned {} in {} returns, adjusted {}, {} of purchases",
        format_currency(refunds.total_returned),
        refunds.return_count,
        format_currency(refunds.total_adjustments),
        format_percent(refunds.refund_rate)
    )?;
    for event in &refunds.returns {
        let kept = event
            .days_kept
            .map(|days| format!(" after {days} days"))
            .unwrap_or_default();
        writeln!(
            out,
            "    {} {:<32} {}{kept}",
            event.date,
            event.name,
            format_currency(event.amount)
        )?;
    }

    Ok(())
}

/// Write the gas totals and the price per grade.
pub fn write_gas_text(gas: &GasInsights, mut out: impl Write) -> Result<(), Error> {
    writeln!(
        out,
        "{} on {:.1} gallons over {} visits to {} stations, {} per gallon",
        format_currency(gas.total_spent),
        gas.total_gallons,
        gas.visits,
        gas.location_count,
        format_currency(gas.average_price)
    )?;
    for grade in &gas.grade_breakdown {
        let price = grade
            .average_price
            .map(format_currency)
            .unwrap_or_else(|| "n/a".to_owned());
        writeln!(
            out,
            "    {:<10} {:>12} {:>8.1} gal {price}/gal",
            grade.grade,
            format_currency(grade.spent),
            grade.gallons
        )?;
    }

    Ok(())
}

/// Write one line per payment method.
pub fn write_payments_text(payments: &PaymentInsights, mut out: impl Write) -> Result<(), Error> {
    writeln!(
        out,
        "{} paid, about {} in rewards",
        format_currency(payments.total),
        format_currency(payments.rewards)
    )?;
    for method in &payments.methods {
        writeln!(
            out,
            "    {:<24} {:>12} {:>4} payments, {} rewards",
            method.method,
            format_currency(method.total),
            method.count,
            format_currency(method.rewards)
        )?;
    }

    Ok(())
}

/// Write the item summaries as CSV with a header row.
pub fn write_items_csv(items: &[ItemSummary], out: impl Write) -> Result<(), Error> {
    let mut writer = csv::Writer::from_writer(out);

    writer.write_record([
        "item_id",
        "name",
        "total_spent",
        "total_refunded",
        "discount_total",
        "net_spend",
        "unit_count",
        "refund_count",
        "average_price",
        "first_purchase",
        "last_purchase",
    ])?;

    for item in items {
        writer.write_record([
            item.item_id.clone(),
            item.name.clone(),
            format!("{:.2}", item.total_spent),
            format!("{:.2}", item.total_refunded),
            format!("{:.2}", item.discount_total),
            format!("{:.2}", item.net_spend),
            item.unit_count.to_string(),
            item.refund_count.to_string(),
            format!("{:.2}", item.average_price),
            item.first_purchase.map(|date| date.to_string()).unwrap_or_default(),
            item.last_purchase.map(|date| date.to_string()).unwrap_or_default(),
        ])?;
    }

    writer.flush()?;

    Ok(())
}

/// Write the category summaries as CSV with a header row.
pub fn write_categories_csv(categories: &[CategorySummary], out: impl Write) -> Result<(), Error> {
    let mut writer = csv::Writer::from_writer(out);

    writer.write_record([
        "department",
        "spend",
        "refund_amount",
        "return_count",
        "item_count",
    ])?;

    for category in categories {
        writer.write_record([
            category.department.clone(),
            format!("{:.2}", category.spend),
            format!("{:.2}", category.refund_amount),
            category.return_count.to_string(),
            category.items.len().to_string(),
        ])?;
    }

    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::{format_currency, write_categories_csv, write_items_csv, write_overview_text};
    use crate::{
        config::InsightsConfig,
        insights::{build_category_summaries, build_item_summaries, summarize_overview},
        receipt::{LineItem, Transaction},
    };

    fn transactions() -> Vec<Transaction> {
        vec![
            Transaction::new(date!(2024 - 01 - 05), "SEATTLE #1", 12.5)
                .with_item(LineItem::new("1", "MILK, 2%", 4.5, 1.0).department("17"))
                .with_item(LineItem::new("2", "BREAD", 8.0, 2.0).department("17")),
        ]
    }

    #[test]
    fn currency_has_two_decimals() {
        assert_eq!(format_currency(12.3), "$12.30");
        assert_eq!(format_currency(-4.5), "-$4.50");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(f64::NAN), "$0.00");
    }

    #[test]
    fn items_csv_has_a_header_and_quotes_commas() {
        let items = build_item_summaries(&transactions());
        let mut out = Vec::new();

        write_items_csv(&items, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("item_id,name,total_spent"));
        assert!(lines[1].starts_with("2,BREAD,8.00"));
        assert!(lines[2].starts_with("1,\"MILK, 2%\",4.50"));
    }

    #[test]
    fn categories_csv_has_one_row_per_department() {
        let categories = build_category_summaries(&transactions());
        let mut out = Vec::new();

        write_categories_csv(&categories, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "department,spend,refund_amount,return_count,item_count\n17,12.50,0.00,0,2\n"
        );
    }

    #[test]
    fn overview_text_lists_years() {
        let overview = summarize_overview(&transactions(), &InsightsConfig::default());
        let mut out = Vec::new();

        write_overview_text(&overview, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("2024-01-05 to 2024-01-05"));
        assert!(text.contains("Total spent:         $12.50"));
        assert!(text.lines().any(|line| line.starts_with("2024  $12.50")));
    }
}
