//! The normalized receipt model shared by the filters and insights.
//!
//! Every record from the exports, whether it came from a warehouse till, a
//! gas pump or the website, ends up as a [Transaction] with its line items
//! and payment tenders.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{Error, config::InsightsConfig};

const ISO_DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

time::serde::format_description!(pub(crate) iso_date, Date, "[year]-[month]-[day]");

/// The department label used for line items without a department number.
pub const UNKNOWN_DEPARTMENT: &str = "Other";

/// Receipt types and document types that mark a gas station purchase.
const GAS_RECEIPT_TYPE: &str = "Gas Station";
const GAS_DOCUMENT_TYPE: &str = "FuelReceipts";

/// Parse the date at the start of an ISO 8601 string.
///
/// Only the first ten characters are read, so both `2024-01-15` and
/// `2024-01-15T10:32:00` give the same date. No time zone conversion is done.
///
/// # Errors
/// Returns [Error::InvalidDate] if the string does not start with a valid
/// `YYYY-MM-DD` date.
pub fn parse_iso_date(text: &str) -> Result<Date, Error> {
    let text = text.trim();
    let date_part = text.get(..10).unwrap_or(text);

    Date::parse(date_part, ISO_DATE_FORMAT).map_err(|_| Error::InvalidDate(text.to_owned()))
}

/// Whether money was spent or given back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    /// A purchase.
    Sales,
    /// A return or refund.
    Refund,
}

impl TransactionType {
    /// The type implied by the sign of a receipt total.
    pub fn from_total(total: f64) -> Self {
        if total < 0.0 {
            TransactionType::Refund
        } else {
            TransactionType::Sales
        }
    }
}

/// One purchase or refund event from a receipt or an online order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The day of the transaction.
    #[serde(with = "iso_date")]
    pub transaction_date: Date,
    /// The timestamp as given in the export, possibly with a time of day.
    pub transaction_date_time: String,
    /// Whether this was a sale or a refund.
    pub transaction_type: TransactionType,
    /// The warehouse the transaction happened at, or "Online".
    pub warehouse_name: String,
    /// The amount charged, negative for refunds.
    pub total: f64,
    /// The amount before taxes.
    pub sub_total: f64,
    /// The tax charged.
    pub taxes: f64,
    /// The items, discounts and fees on the receipt.
    pub item_array: Vec<LineItem>,
    /// How the transaction was paid for.
    pub tender_array: Vec<Tender>,
    /// Whether this came from the online order export.
    pub is_online: bool,
    /// The kind of receipt, e.g. "Gas Station".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_type: Option<String>,
    /// The kind of document, e.g. "FuelReceipts".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    /// The barcode printed on a warehouse receipt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_barcode: Option<String>,
    /// The order number of an online order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
}

impl Transaction {
    /// Create a transaction with no items, tenders or taxes.
    ///
    /// The transaction type follows the sign of `total`.
    pub fn new(transaction_date: Date, warehouse_name: &str, total: f64) -> Self {
        Self {
            transaction_date,
            transaction_date_time: transaction_date.to_string(),
            transaction_type: TransactionType::from_total(total),
            warehouse_name: warehouse_name.to_owned(),
            total,
            sub_total: total,
            taxes: 0.0,
            item_array: Vec::new(),
            tender_array: Vec::new(),
            is_online: false,
            receipt_type: None,
            document_type: None,
            transaction_barcode: None,
            order_number: None,
        }
    }

    /// Add a line item.
    pub fn with_item(mut self, item: LineItem) -> Self {
        self.item_array.push(item);
        self
    }

    /// Add a payment tender.
    pub fn with_tender(mut self, description: &str, amount: f64) -> Self {
        self.tender_array.push(Tender {
            tender_description: description.to_owned(),
            amount_tender: amount,
        });
        self
    }

    /// Set the receipt type.
    pub fn with_receipt_type(mut self, receipt_type: &str) -> Self {
        self.receipt_type = Some(receipt_type.to_owned());
        self
    }

    /// The date as `YYYY-MM-DD`.
    pub fn iso_date(&self) -> String {
        self.transaction_date.to_string()
    }

    /// The four digit year taken from the ISO date string.
    pub fn year_key(&self) -> String {
        let date = self.iso_date();
        date.get(..4).unwrap_or(&date).to_owned()
    }

    /// The month as `YYYY-MM`.
    pub fn month_key(&self) -> String {
        let date = self.iso_date();
        date.get(..7).unwrap_or(&date).to_owned()
    }

    /// Whether this transaction was a gas station purchase.
    ///
    /// A transaction counts as gas if its receipt or document type says so, or
    /// if any of its lines is a configured fuel grade.
    pub fn is_gas(&self, config: &InsightsConfig) -> bool {
        self.receipt_type.as_deref() == Some(GAS_RECEIPT_TYPE)
            || self.document_type.as_deref() == Some(GAS_DOCUMENT_TYPE)
            || self.item_array.iter().any(|item| {
                item.item_number
                    .as_deref()
                    .is_some_and(|number| config.fuel_grade(number).is_some())
            })
    }
}

/// An item, discount or fee on a receipt.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// The product number.
    pub item_number: Option<String>,
    /// The product name as printed on the receipt.
    pub item_description01: Option<String>,
    /// The signed line total. Negative for returns, adjustments and discounts.
    pub amount: f64,
    /// The signed quantity. Negative for returns.
    pub unit: Option<f64>,
    /// The price of a single unit, when the export provides it.
    pub unit_price: Option<f64>,
    /// The department the product belongs to.
    pub item_department_number: Option<String>,
    /// Gallons pumped, for fuel lines.
    pub fuel_unit_quantity: Option<f64>,
    /// Price per gallon, for fuel lines.
    pub item_unit_price_amount: Option<f64>,
    /// Set when the amount was estimated by splitting an order total.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub approximate_price: bool,
}

impl LineItem {
    /// Create a line item with a product number, name, amount and quantity.
    pub fn new(item_number: &str, description: &str, amount: f64, unit: f64) -> Self {
        Self {
            item_number: Some(item_number.to_owned()),
            item_description01: Some(description.to_owned()),
            amount,
            unit: Some(unit),
            ..Default::default()
        }
    }

    /// Set the department number.
    pub fn department(mut self, department: &str) -> Self {
        self.item_department_number = Some(department.to_owned());
        self
    }

    /// Set the gallons and price per gallon of a fuel line.
    pub fn fuel(mut self, gallons: f64, price_per_gallon: f64) -> Self {
        self.fuel_unit_quantity = Some(gallons);
        self.item_unit_price_amount = Some(price_per_gallon);
        self
    }

    /// The product name, or an empty string.
    pub fn description(&self) -> &str {
        self.item_description01.as_deref().unwrap_or("")
    }

    /// The department number, or [UNKNOWN_DEPARTMENT].
    pub fn department_key(&self) -> &str {
        self.item_department_number
            .as_deref()
            .filter(|department| !department.is_empty())
            .unwrap_or(UNKNOWN_DEPARTMENT)
    }

    /// The signed quantity, zero when absent.
    pub fn quantity(&self) -> f64 {
        self.unit.unwrap_or(0.0)
    }

    /// Whether this line is a discount on another item.
    ///
    /// Discount lines have a description starting with `/`, followed by the
    /// number of the item they apply to.
    pub fn is_discount(&self) -> bool {
        self.description().starts_with('/')
    }

    /// The item number a discount line refers to.
    ///
    /// Returns `None` for lines that are not discounts, or discounts with no
    /// number in the description.
    pub fn discount_target(&self) -> Option<String> {
        if !self.is_discount() {
            return None;
        }

        digits_re()
            .find(self.description())
            .map(|found| found.as_str().to_owned())
    }

    /// Whether this is a negative line with a negative quantity, i.e. goods
    /// were brought back.
    pub fn is_full_return(&self) -> bool {
        self.amount < 0.0 && self.quantity() < 0.0
    }

    /// The price of one unit: the export's unit price if present, otherwise
    /// the line total divided by the quantity.
    pub fn effective_unit_price(&self) -> f64 {
        if let Some(price) = self.unit_price {
            return price;
        }

        let quantity = self.quantity().abs();
        if quantity > 0.0 {
            self.amount / quantity
        } else {
            self.amount
        }
    }
}

/// A payment instrument used on a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tender {
    /// The payment method, e.g. "COSTCO VISA".
    pub tender_description: String,
    /// The signed amount paid with this method.
    pub amount_tender: f64,
}

fn digits_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("invalid digits regex"))
}
