//! Filters that narrow down the transactions before they are summarised.
//!
//! A [FilterPipeline] holds any number of [Filter]s and keeps the
//! transactions that pass all of them. Filter configs are plain data so they
//! can be saved and restored with serde.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    receipt::{Transaction, TransactionType, iso_date, parse_iso_date},
};

/// Keeps transactions from any of the given years.
///
/// Years are compared as strings against the start of the ISO date so no
/// time zone conversion can move a transaction into another year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearFilter {
    /// Four digit years, e.g. "2024".
    pub years: Vec<String>,
}

impl YearFilter {
    /// Create a filter for `years`.
    pub fn new<I, S>(years: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            years: years
                .into_iter()
                .map(|year| year.as_ref().trim().to_owned())
                .collect(),
        }
    }

    fn matches(&self, transaction: &Transaction) -> bool {
        let year = transaction.year_key();
        self.years.iter().any(|wanted| *wanted == year)
    }
}

/// Keeps transactions from any of the given warehouses.
///
/// Both the targets and the transaction's warehouse name are passed through
/// the normalizer before comparing. By default that is
/// [normalize_warehouse_name].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationFilter {
    /// The warehouse names or numbers to keep.
    pub locations: Vec<String>,
    /// Replaces the default warehouse name normalizer. Not saved with the config.
    #[serde(skip)]
    pub normalizer: Option<fn(&str) -> String>,
}

impl PartialEq for LocationFilter {
    fn eq(&self, other: &Self) -> bool {
        self.locations == other.locations
    }
}

impl LocationFilter {
    /// Create a filter for `locations` using the default normalizer.
    pub fn new<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            locations: locations
                .into_iter()
                .map(|location| location.as_ref().to_owned())
                .collect(),
            normalizer: None,
        }
    }

    /// Use `normalizer` instead of [normalize_warehouse_name].
    pub fn with_normalizer(mut self, normalizer: fn(&str) -> String) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    fn matches(&self, transaction: &Transaction) -> bool {
        let normalize = self.normalizer.unwrap_or(normalize_warehouse_name);
        let warehouse = normalize(&transaction.warehouse_name);

        self.locations
            .iter()
            .any(|location| normalize(location) == warehouse)
    }
}

/// Reduce a warehouse name to something comparable.
///
/// Names with a warehouse number, like "SEATTLE #1", "Warehouse 123" or
/// "WH 45", become the number. Anything else is lowercased and trimmed.
pub fn normalize_warehouse_name(name: &str) -> String {
    match warehouse_number_re()
        .captures(name)
        .and_then(|captures| captures.get(1))
    {
        Some(number) => number.as_str().to_owned(),
        None => name.trim().to_lowercase(),
    }
}

fn warehouse_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:warehouse|wh|#)\s*#?\s*(\d+)").expect("invalid warehouse regex")
    })
}

#[derive(Deserialize)]
struct RawDateRange {
    #[serde(with = "iso_date")]
    start: Date,
    #[serde(with = "iso_date")]
    end: Date,
}

/// Keeps transactions between two dates, including both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRangeFilter {
    #[serde(with = "iso_date")]
    start: Date,
    #[serde(with = "iso_date")]
    end: Date,
}

impl DateRangeFilter {
    /// Create a filter for `start..=end`.
    ///
    /// # Errors
    /// Returns [Error::InvalidDateRange] if `start` is after `end`.
    pub fn new(start: Date, end: Date) -> Result<Self, Error> {
        if start > end {
            return Err(Error::InvalidDateRange { start, end });
        }

        Ok(Self { start, end })
    }

    /// Create a filter from two `YYYY-MM-DD` strings.
    ///
    /// # Errors
    /// Returns a:
    /// - [Error::InvalidDate] if either date cannot be parsed,
    /// - or [Error::InvalidDateRange] if `start` is after `end`.
    pub fn parse(start: &str, end: &str) -> Result<Self, Error> {
        Self::new(parse_iso_date(start)?, parse_iso_date(end)?)
    }

    /// The first day of the range.
    pub fn start(&self) -> Date {
        self.start
    }

    /// The last day of the range.
    pub fn end(&self) -> Date {
        self.end
    }

    fn matches(&self, transaction: &Transaction) -> bool {
        (self.start..=self.end).contains(&transaction.transaction_date)
    }
}

impl TryFrom<RawDateRange> for DateRangeFilter {
    type Error = Error;

    fn try_from(value: RawDateRange) -> Result<Self, Self::Error> {
        DateRangeFilter::new(value.start, value.end)
    }
}

/// Keeps sales, refunds, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionTypeFilter {
    /// The transaction types to keep.
    pub types: Vec<TransactionType>,
}

impl TransactionTypeFilter {
    /// Create a filter for `types`.
    pub fn new(types: &[TransactionType]) -> Self {
        Self {
            types: types.to_vec(),
        }
    }

    fn matches(&self, transaction: &Transaction) -> bool {
        self.types.contains(&transaction.transaction_type)
    }
}

/// A single condition a transaction must meet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Filter {
    /// See [YearFilter].
    Year(YearFilter),
    /// See [LocationFilter].
    Location(LocationFilter),
    /// See [DateRangeFilter].
    DateRange(DateRangeFilter),
    /// See [TransactionTypeFilter].
    TransactionType(TransactionTypeFilter),
}

impl Filter {
    /// The name of the filter. A pipeline holds at most one filter per name.
    pub fn name(&self) -> &'static str {
        match self {
            Filter::Year(_) => "year",
            Filter::Location(_) => "location",
            Filter::DateRange(_) => "dateRange",
            Filter::TransactionType(_) => "transactionType",
        }
    }

    /// Whether `transaction` passes this filter.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        match self {
            Filter::Year(filter) => filter.matches(transaction),
            Filter::Location(filter) => filter.matches(transaction),
            Filter::DateRange(filter) => filter.matches(transaction),
            Filter::TransactionType(filter) => filter.matches(transaction),
        }
    }
}

/// A set of filters that must all pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterPipeline {
    filters: Vec<Filter>,
}

impl FilterPipeline {
    /// Create a pipeline with no filters, which keeps everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter, builder style. See [FilterPipeline::add].
    pub fn with(mut self, filter: Filter) -> Self {
        self.add(filter);
        self
    }

    /// Add a filter, replacing any filter with the same name.
    pub fn add(&mut self, filter: Filter) {
        match self
            .filters
            .iter_mut()
            .find(|existing| existing.name() == filter.name())
        {
            Some(existing) => *existing = filter,
            None => self.filters.push(filter),
        }
    }

    /// Remove the filter called `name`. Returns whether one was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let count = self.filters.len();
        self.filters.retain(|filter| filter.name() != name);
        self.filters.len() != count
    }

    /// Remove every filter.
    pub fn clear(&mut self) {
        self.filters.clear();
    }

    /// The filters in the order they were added.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Whether the pipeline has no filters.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Whether `transaction` passes every filter.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.filters.iter().all(|filter| filter.matches(transaction))
    }

    /// The transactions that pass every filter, in their original order.
    pub fn apply(&self, transactions: &[Transaction]) -> Vec<Transaction> {
        let kept: Vec<Transaction> = transactions
            .iter()
            .filter(|transaction| self.matches(transaction))
            .cloned()
            .collect();

        tracing::debug!(
            "Filters kept {} of {} transactions",
            kept.len(),
            transactions.len()
        );

        kept
    }
}
