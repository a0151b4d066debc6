//! Lenient field access for raw export records.
//!
//! The exports are not consistent about types: amounts show up as numbers or
//! numeric strings and item numbers as strings or integers. These helpers
//! accept both and report fields that are present but unusable.

use serde_json::{Map, Value};

use crate::{
    Error,
    receipt::{LineItem, Tender},
};

pub(super) type Record = Map<String, Value>;

/// The first of `keys` present in `record` with a non-null value.
pub(super) fn field<'a>(record: &'a Record, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find(|value| !value.is_null())
}

/// Whether any of `keys` is present with a non-null value.
pub(super) fn has_field(record: &Record, keys: &[&str]) -> bool {
    field(record, keys).is_some()
}

/// Read a string-like field. Numbers are converted to their decimal form and
/// empty strings count as missing.
pub(super) fn text(record: &Record, keys: &[&str]) -> Option<String> {
    let value = field(record, keys)?;

    let text = match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };

    if text.is_empty() { None } else { Some(text) }
}

/// Read a numeric field.
///
/// Returns `Ok(None)` if none of `keys` is present.
///
/// # Errors
/// Returns [Error::InvalidRecord] if the field is present but is not a finite
/// number or a string holding one.
pub(super) fn number(record: &Record, keys: &[&str]) -> Result<Option<f64>, Error> {
    let Some(value) = field(record, keys) else {
        return Ok(None);
    };

    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) if text.trim().is_empty() => return Ok(None),
        Value::String(text) => text.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(number) if number.is_finite() => Ok(Some(number)),
        _ => Err(Error::InvalidRecord(format!(
            "field \"{}\" should be a number, got {value}",
            keys[0]
        ))),
    }
}

/// The objects in an array field. Non-object elements are ignored.
pub(super) fn objects<'a>(record: &'a Record, keys: &[&str]) -> Vec<&'a Record> {
    match field(record, keys) {
        Some(Value::Array(values)) => values.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

/// Read a receipt line item in the warehouse export's field names.
///
/// # Errors
/// Returns [Error::InvalidRecord] if a numeric field holds a non-number.
pub(super) fn line_item(record: &Record) -> Result<LineItem, Error> {
    let item_unit_price_amount = number(record, &["itemUnitPriceAmount"])?;

    Ok(LineItem {
        item_number: text(record, &["itemNumber"]),
        item_description01: text(record, &["itemDescription01", "itemDescription"]),
        amount: number(record, &["amount"])?.unwrap_or(0.0),
        unit: number(record, &["unit", "quantity"])?,
        unit_price: number(record, &["unitPrice"])?.or(item_unit_price_amount),
        item_department_number: text(record, &["itemDepartmentNumber"]),
        fuel_unit_quantity: number(record, &["fuelUnitQuantity"])?,
        item_unit_price_amount,
        approximate_price: false,
    })
}

/// Read the tenders of a record, from `tenderArray` or from an online order's
/// `orderPayment` list.
///
/// # Errors
/// Returns [Error::InvalidRecord] if a tender amount is not a number.
pub(super) fn tenders(record: &Record) -> Result<Vec<Tender>, Error> {
    objects(record, &["tenderArray", "orderPayment"])
        .into_iter()
        .map(|tender| {
            Ok(Tender {
                tender_description: text(
                    tender,
                    &["tenderDescription", "tenderTypeName", "paymentType"],
                )
                .unwrap_or_else(|| "Unknown".to_owned()),
                amount_tender: number(tender, &["amountTender", "amount"])?.unwrap_or(0.0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Record, line_item, number, objects, tenders, text};
    use crate::Error;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn number_accepts_numbers_and_numeric_strings() {
        let record = record(json!({"a": 12.5, "b": " 1,024.10 ", "c": null}));

        assert_eq!(number(&record, &["a"]), Ok(Some(12.5)));
        assert_eq!(number(&record, &["b"]), Ok(Some(1024.1)));
        assert_eq!(number(&record, &["c"]), Ok(None));
        assert_eq!(number(&record, &["missing"]), Ok(None));
    }

    #[test]
    fn number_rejects_non_numeric_values() {
        let record = record(json!({"total": "twelve", "flag": true}));

        assert!(matches!(
            number(&record, &["total"]),
            Err(Error::InvalidRecord(_))
        ));
        assert!(matches!(
            number(&record, &["flag"]),
            Err(Error::InvalidRecord(_))
        ));
    }

    #[test]
    fn number_uses_first_present_key() {
        let record = record(json!({"orderTotal": null, "total": 5}));

        assert_eq!(number(&record, &["orderTotal", "total"]), Ok(Some(5.0)));
    }

    #[test]
    fn text_converts_numbers_and_drops_blanks() {
        let record = record(json!({"id": 800599, "name": "  ", "desc": " KS TP "}));

        assert_eq!(text(&record, &["id"]), Some("800599".to_owned()));
        assert_eq!(text(&record, &["name"]), None);
        assert_eq!(text(&record, &["desc"]), Some("KS TP".to_owned()));
    }

    #[test]
    fn objects_skips_non_objects() {
        let record = record(json!({"items": [{"a": 1}, 3, "x", {"b": 2}]}));

        assert_eq!(objects(&record, &["items"]).len(), 2);
        assert!(objects(&record, &["missing"]).is_empty());
    }

    #[test]
    fn line_item_reads_fuel_fields() {
        let line = line_item(&record(json!({
            "itemNumber": "800877",
            "itemDescription01": "PREMIUM",
            "amount": 52.14,
            "unit": 1,
            "fuelUnitQuantity": 11.0,
            "itemUnitPriceAmount": 4.74,
            "itemDepartmentNumber": 2
        })))
        .unwrap();

        assert_eq!(line.item_number.as_deref(), Some("800877"));
        assert_eq!(line.fuel_unit_quantity, Some(11.0));
        assert_eq!(line.unit_price, Some(4.74));
        assert_eq!(line.item_department_number.as_deref(), Some("2"));
    }

    #[test]
    fn tenders_reads_order_payments() {
        let record = record(json!({
            "orderPayment": [{"paymentType": "VISA", "amount": "20.00"}]
        }));

        let tenders = tenders(&record).unwrap();

        assert_eq!(tenders.len(), 1);
        assert_eq!(tenders[0].tender_description, "VISA");
        assert_eq!(tenders[0].amount_tender, 20.0);
    }
}
