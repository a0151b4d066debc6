//! Receipt Insights turns warehouse club receipt exports into spending analytics.
//!
//! Raw JSON records from the online-order and warehouse-receipt exports are
//! normalized into [Transaction]s, narrowed down with a [FilterPipeline], and
//! summarised by the pure functions in [insights]. [InsightStore] ties these
//! together for callers that want change notifications and cached results.
//!
//! ```ignore
//! use receipt_insights::{InsightsConfig, normalize_many, insights};
//!
//! let config = InsightsConfig::default();
//! let transactions = normalize_many(&records);
//! let gas = insights::collect_gas_insights(&transactions, &config);
//! ```

#![warn(missing_docs)]

use time::Date;

pub mod calculations;
pub mod config;
pub mod filter;
pub mod insights;
pub mod normalize;
pub mod receipt;
pub mod report;
pub mod store;

pub use config::{FuelGrade, InsightsConfig, RewardProgram, RewardTerms};
pub use filter::{
    DateRangeFilter, Filter, FilterPipeline, LocationFilter, TransactionTypeFilter, YearFilter,
};
pub use normalize::{
    NormalizedBatch, Normalizer, normalize, normalize_batch, normalize_many, parse_export,
};
pub use receipt::{LineItem, Tender, Transaction, TransactionType};
pub use store::{InsightStore, StoreEvent, SubscriptionId, Topic};

/// The errors that may occur while importing and analysing receipts.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum Error {
    /// A record was claimed by a normalizer but is missing a required field
    /// or has a field with the wrong type.
    ///
    /// In a batch the record is logged and skipped.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// An online order was cancelled and should not count as a purchase.
    ///
    /// The string holds the order number, if the record had one.
    #[error("order {0} was cancelled")]
    CancelledOrder(String),

    /// A calculation received a negative or non-finite input.
    ///
    /// This indicates a bug in the caller rather than bad data, so it should
    /// not be silently recovered from.
    #[error("invalid calculation input: {0}")]
    ArithmeticGuard(String),

    /// A date string could not be parsed as `YYYY-MM-DD`.
    #[error("could not parse \"{0}\" as a date")]
    InvalidDate(String),

    /// A date range was created with the start after the end.
    #[error("the start date {start} is after the end date {end}")]
    InvalidDateRange {
        /// The requested start of the range.
        start: Date,
        /// The requested end of the range.
        end: Date,
    },

    /// The configuration document could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An input document was not valid JSON or did not contain any records.
    #[error("could not parse the export: {0}")]
    InvalidJson(String),

    /// A file could not be read or written.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Error::Io(value.to_string())
    }
}
