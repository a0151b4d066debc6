//! Normalizes records from the warehouse receipt export.
//!
//! These already use the canonical field names, so this is mostly a pass
//! through with defaults for missing fields.

use crate::{
    Error,
    receipt::{Transaction, TransactionType, parse_iso_date},
};

use super::fields::{Record, has_field, line_item, number, objects, tenders, text};

const DATE_KEYS: [&str; 2] = ["transactionDate", "transactionDateTime"];

pub(super) fn can_handle(record: &Record) -> bool {
    has_field(record, &DATE_KEYS)
}

/// Build a transaction from a warehouse or gas station receipt.
///
/// # Errors
/// Returns [Error::InvalidRecord] if the date is missing or unparseable, or
/// if a numeric field holds a non-number.
pub(super) fn normalize(record: &Record) -> Result<Transaction, Error> {
    let date_text = text(record, &DATE_KEYS).ok_or_else(|| {
        Error::InvalidRecord("receipt is missing transactionDate".to_owned())
    })?;
    let transaction_date = parse_iso_date(&date_text)
        .map_err(|error| Error::InvalidRecord(format!("receipt has a bad date: {error}")))?;
    let transaction_date_time =
        text(record, &["transactionDateTime"]).unwrap_or_else(|| transaction_date.to_string());

    let total = number(record, &["total"])?.unwrap_or(0.0);
    let transaction_type = match text(record, &["transactionType"]) {
        Some(kind) => parse_transaction_type(&kind).unwrap_or_else(|| {
            tracing::debug!("Unknown transaction type \"{kind}\", using the sign of the total");
            TransactionType::from_total(total)
        }),
        None => TransactionType::from_total(total),
    };

    let item_array = objects(record, &["itemArray"])
        .into_iter()
        .map(line_item)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Transaction {
        transaction_date,
        transaction_date_time,
        transaction_type,
        warehouse_name: text(record, &["warehouseName", "warehouseShortName"])
            .unwrap_or_else(|| "Unknown".to_owned()),
        total,
        sub_total: number(record, &["subTotal"])?.unwrap_or(total),
        taxes: number(record, &["taxes"])?.unwrap_or(0.0),
        item_array,
        tender_array: tenders(record)?,
        is_online: false,
        receipt_type: text(record, &["receiptType"]),
        document_type: text(record, &["documentType"]),
        transaction_barcode: text(record, &["transactionBarcode"]),
        order_number: None,
    })
}

fn parse_transaction_type(kind: &str) -> Option<TransactionType> {
    match kind.to_lowercase().as_str() {
        "sales" | "sale" => Some(TransactionType::Sales),
        "refund" | "return" => Some(TransactionType::Refund),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::date;

    use super::{can_handle, normalize};
    use crate::{Error, normalize::fields::Record, receipt::TransactionType};

    fn record(value: serde_json::Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn claims_records_with_a_transaction_date() {
        assert!(can_handle(&record(json!({"transactionDate": "2024-01-01"}))));
        assert!(can_handle(&record(
            json!({"transactionDateTime": "2024-01-01T10:00:00"})
        )));
        assert!(!can_handle(&record(json!({"orderNumber": "1"}))));
    }

    #[test]
    fn passes_fields_through() {
        let transaction = normalize(&record(json!({
            "transactionDate": "2024-01-15",
            "transactionDateTime": "2024-01-15T12:34:56",
            "transactionType": "Sales",
            "warehouseName": "SEATTLE #1",
            "total": 110.0,
            "subTotal": 100.0,
            "taxes": 10.0,
            "transactionBarcode": "21100300101234",
            "itemArray": [
                {"itemNumber": "1", "itemDescription01": "MILK", "amount": 100.0, "unit": 2}
            ],
            "tenderArray": [{"tenderDescription": "COSTCO VISA", "amountTender": 110.0}]
        })))
        .unwrap();

        assert_eq!(transaction.transaction_date, date!(2024 - 01 - 15));
        assert_eq!(transaction.transaction_date_time, "2024-01-15T12:34:56");
        assert_eq!(transaction.warehouse_name, "SEATTLE #1");
        assert_eq!(transaction.sub_total, 100.0);
        assert_eq!(transaction.taxes, 10.0);
        assert_eq!(transaction.item_array.len(), 1);
        assert_eq!(transaction.tender_array[0].tender_description, "COSTCO VISA");
        assert!(!transaction.is_online);
    }

    #[test]
    fn missing_type_follows_sign_of_total() {
        let refund = normalize(&record(json!({"transactionDate": "2024-01-15", "total": -5})))
            .unwrap();
        let sale = normalize(&record(json!({"transactionDate": "2024-01-15", "total": 5})))
            .unwrap();

        assert_eq!(refund.transaction_type, TransactionType::Refund);
        assert_eq!(sale.transaction_type, TransactionType::Sales);
    }

    #[test]
    fn missing_arrays_and_total_default() {
        let transaction =
            normalize(&record(json!({"transactionDateTime": "2024-02-01T09:00:00"}))).unwrap();

        assert_eq!(transaction.transaction_date, date!(2024 - 02 - 01));
        assert_eq!(transaction.total, 0.0);
        assert!(transaction.item_array.is_empty());
        assert!(transaction.tender_array.is_empty());
    }

    #[test]
    fn rejects_bad_dates_and_totals() {
        let bad_date = normalize(&record(json!({"transactionDate": "yesterday"})));
        let bad_total = normalize(&record(
            json!({"transactionDate": "2024-01-01", "total": "lots"}),
        ));

        assert!(matches!(bad_date, Err(Error::InvalidRecord(_))));
        assert!(matches!(bad_total, Err(Error::InvalidRecord(_))));
    }
}
