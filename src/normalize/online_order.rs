//! Normalizes records from the online order export.
//!
//! Orders come in two shapes. Detailed orders nest their lines under
//! `shipToAddress[].orderLineItems[]` and price every line. Simple orders have
//! a flat `orderLineItems[]` list and only an order total.

use crate::{
    Error,
    receipt::{LineItem, Tender, Transaction, TransactionType, parse_iso_date},
};

use super::fields::{Record, field, has_field, number, objects, tenders, text};

const DATE_KEYS: [&str; 2] = ["orderPlacedDate", "orderedDate"];
const CANCELLED_STATUS: &str = "Cancelled";
const ONLINE_WAREHOUSE: &str = "Online";

pub(super) fn can_handle(record: &Record) -> bool {
    has_field(record, &["orderPlacedDate", "orderedDate", "orderNumber"])
        && !has_field(record, &["transactionDate"])
}

/// Build a transaction from an online order.
///
/// # Errors
/// Returns a:
/// - [Error::CancelledOrder] if the order status is "Cancelled",
/// - or [Error::InvalidRecord] if the order date is missing or unparseable or
///   a numeric field holds a non-number.
pub(super) fn normalize(record: &Record) -> Result<Transaction, Error> {
    let order_number = text(record, &["orderNumber"]);

    if text(record, &["status", "orderStatus"]).as_deref() == Some(CANCELLED_STATUS) {
        return Err(Error::CancelledOrder(
            order_number.unwrap_or_else(|| "without a number".to_owned()),
        ));
    }

    let date_text = text(record, &DATE_KEYS).ok_or_else(|| {
        Error::InvalidRecord(format!(
            "online order {} is missing its order date",
            order_number.as_deref().unwrap_or("")
        ))
    })?;
    let transaction_date = parse_iso_date(&date_text)
        .map_err(|error| Error::InvalidRecord(format!("online order has a bad date: {error}")))?;

    let total = number(record, &["orderTotal", "total"])?.unwrap_or(0.0);

    let item_array = if is_detailed(record) {
        detailed_line_items(record)?
    } else {
        simple_line_items(record, total)?
    };

    let mut tender_array = tenders(record)?;
    if tender_array.is_empty()
        && let Some(method) = text(record, &["paymentMethod"])
    {
        tender_array.push(Tender {
            tender_description: method,
            amount_tender: total,
        });
    }

    Ok(Transaction {
        transaction_date,
        transaction_date_time: date_text,
        transaction_type: TransactionType::from_total(total),
        warehouse_name: text(record, &["warehouseName"])
            .unwrap_or_else(|| ONLINE_WAREHOUSE.to_owned()),
        total,
        sub_total: number(record, &["orderSubTotal", "subTotal"])?.unwrap_or(total),
        taxes: number(record, &["orderTax", "taxes"])?.unwrap_or(0.0),
        item_array,
        tender_array,
        is_online: true,
        receipt_type: None,
        document_type: None,
        transaction_barcode: None,
        order_number,
    })
}

fn is_detailed(record: &Record) -> bool {
    objects(record, &["shipToAddress"])
        .iter()
        .any(|address| field(address, &["orderLineItems"]).is_some())
}

/// Lines from a detailed order, each carrying its own price and quantity.
fn detailed_line_items(record: &Record) -> Result<Vec<LineItem>, Error> {
    let mut items = Vec::new();

    for address in objects(record, &["shipToAddress"]) {
        for line in objects(address, &["orderLineItems"]) {
            let quantity = number(line, &["quantity", "unit"])?.unwrap_or(1.0);
            let unit_price = number(line, &["unitPrice", "price", "itemPrice"])?;
            let amount = match number(line, &["totalPrice", "amount"])? {
                Some(amount) => amount,
                None => unit_price.unwrap_or(0.0) * quantity,
            };

            items.push(LineItem {
                item_number: text(line, &["itemNumber", "itemId"]),
                item_description01: text(
                    line,
                    &["itemDescription", "itemDescription01", "description"],
                ),
                amount,
                unit: Some(quantity),
                unit_price,
                item_department_number: text(line, &["itemDepartmentNumber", "departmentNumber"]),
                ..Default::default()
            });
        }
    }

    Ok(items)
}

/// Lines from a simple order.
///
/// The export only gives the order total, so it is split evenly across the
/// lines. The resulting prices are an approximation, not what each item
/// actually cost, and are marked with `approximate_price`.
fn simple_line_items(record: &Record, total: f64) -> Result<Vec<LineItem>, Error> {
    let lines = objects(record, &["orderLineItems"]);
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let share = total / lines.len() as f64;

    lines
        .into_iter()
        .map(|line| {
            let quantity = number(line, &["quantity", "unit"])?.unwrap_or(1.0);
            let unit_price = if quantity != 0.0 {
                share / quantity
            } else {
                share
            };

            Ok(LineItem {
                item_number: text(line, &["itemNumber", "itemId"]),
                item_description01: text(
                    line,
                    &["itemDescription", "itemDescription01", "description"],
                ),
                amount: share,
                unit: Some(quantity),
                unit_price: Some(unit_price),
                item_department_number: text(line, &["itemDepartmentNumber", "departmentNumber"]),
                approximate_price: true,
                ..Default::default()
            })
        })
        .collect()
}
