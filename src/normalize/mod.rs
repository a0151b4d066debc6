//! Turns raw export records into [Transaction]s.
//!
//! Each export format has a [Normalizer]. A record is given to the first
//! normalizer that claims it. Records nobody claims are ignored, and records
//! that are claimed but broken are reported without stopping the rest of the
//! batch.

mod fields;
mod online_order;
mod warehouse_receipt;

use serde_json::Value;

use crate::{Error, receipt::Transaction};

/// The export formats that can be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalizer {
    /// Orders from the website, in the detailed or simple shape.
    OnlineOrder,
    /// Receipts from warehouses and gas stations.
    WarehouseReceipt,
}

impl Normalizer {
    /// Every normalizer, in the order they are tried.
    pub const ALL: [Normalizer; 2] = [Normalizer::OnlineOrder, Normalizer::WarehouseReceipt];

    /// Whether this normalizer understands `record`.
    pub fn can_handle(self, record: &Value) -> bool {
        let Some(record) = record.as_object() else {
            return false;
        };

        match self {
            Normalizer::OnlineOrder => online_order::can_handle(record),
            Normalizer::WarehouseReceipt => warehouse_receipt::can_handle(record),
        }
    }

    /// Convert `record` into a transaction.
    ///
    /// # Errors
    /// Returns a:
    /// - [Error::InvalidRecord] if the record is not an object, has no valid
    ///   date, or has a non-numeric total,
    /// - or [Error::CancelledOrder] if the record is a cancelled online order.
    pub fn normalize(self, record: &Value) -> Result<Transaction, Error> {
        let Some(record) = record.as_object() else {
            return Err(Error::InvalidRecord("record is not an object".to_owned()));
        };

        let transaction = match self {
            Normalizer::OnlineOrder => online_order::normalize(record)?,
            Normalizer::WarehouseReceipt => warehouse_receipt::normalize(record)?,
        };

        validate(&transaction)?;

        Ok(transaction)
    }
}

fn validate(transaction: &Transaction) -> Result<(), Error> {
    if !transaction.total.is_finite() {
        return Err(Error::InvalidRecord(format!(
            "transaction on {} has a non-finite total",
            transaction.transaction_date
        )));
    }

    Ok(())
}

/// Normalize a single record.
///
/// Returns `Ok(None)` if no normalizer claims the record.
///
/// # Errors
/// Returns the error of the claiming normalizer, see [Normalizer::normalize].
pub fn normalize(record: &Value) -> Result<Option<Transaction>, Error> {
    match Normalizer::ALL
        .into_iter()
        .find(|normalizer| normalizer.can_handle(record))
    {
        Some(normalizer) => normalizer.normalize(record).map(Some),
        None => {
            tracing::debug!("No normalizer claimed record, skipping it");
            Ok(None)
        }
    }
}

/// A record that could not be normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordFailure {
    /// The position of the record in the input.
    pub index: usize,
    /// Why the record was rejected.
    pub error: Error,
}

/// The outcome of normalizing a batch of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    /// The transactions, in the same order as their records.
    pub transactions: Vec<Transaction>,
    /// How many records no normalizer claimed.
    pub unsupported: usize,
    /// How many records were cancelled orders.
    pub cancelled: usize,
    /// The records that were claimed but invalid.
    pub failures: Vec<RecordFailure>,
}

impl NormalizedBatch {
    /// The number of records that were looked at.
    pub fn record_count(&self) -> usize {
        self.transactions.len() + self.unsupported + self.cancelled + self.failures.len()
    }
}

/// Normalize every record, keeping track of what was skipped and why.
///
/// One bad record never stops the batch.
pub fn normalize_batch(records: &[Value]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for (index, record) in records.iter().enumerate() {
        match normalize(record) {
            Ok(Some(transaction)) => batch.transactions.push(transaction),
            Ok(None) => batch.unsupported += 1,
            Err(Error::CancelledOrder(order)) => {
                tracing::debug!("Skipping cancelled order {order}");
                batch.cancelled += 1;
            }
            Err(error) => {
                tracing::warn!("Could not normalize record {index}: {error}");
                batch.failures.push(RecordFailure { index, error });
            }
        }
    }

    tracing::info!(
        "Normalized {} of {} records ({} unsupported, {} cancelled, {} invalid)",
        batch.transactions.len(),
        records.len(),
        batch.unsupported,
        batch.cancelled,
        batch.failures.len()
    );

    batch
}

/// Normalize every record and return the transactions that succeeded.
///
/// Failed records are logged and left out; the others keep their order.
pub fn normalize_many(records: &[Value]) -> Vec<Transaction> {
    normalize_batch(records).transactions
}

/// The keys an export object may keep its records under.
const RECORD_KEYS: [&str; 3] = ["receipts", "orders", "data"];

/// Read the records from an export document.
///
/// The document is either an array of records or an object holding one under
/// `receipts`, `orders` or `data`. Records from every such key are returned.
///
/// # Errors
/// Returns [Error::InvalidJson] if `text` is not JSON or has no record array.
pub fn parse_export(text: &str) -> Result<Vec<Value>, Error> {
    let document: Value =
        serde_json::from_str(text).map_err(|error| Error::InvalidJson(error.to_string()))?;

    match document {
        Value::Array(records) => Ok(records),
        Value::Object(mut object) => {
            let mut records = Vec::new();
            let mut found = false;

            for key in RECORD_KEYS {
                if let Some(Value::Array(values)) = object.remove(key) {
                    records.extend(values);
                    found = true;
                }
            }

            if found {
                Ok(records)
            } else {
                Err(Error::InvalidJson(format!(
                    "expected an array or an object with one of {RECORD_KEYS:?}"
                )))
            }
        }
        _ => Err(Error::InvalidJson("expected an array of records".to_owned())),
    }
}
