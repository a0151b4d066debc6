use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, ValueEnum};
use serde::Serialize;
use time::Date;
use tracing_subscriber::EnvFilter;

use receipt_insights::{
    DateRangeFilter, Error, Filter, FilterPipeline, InsightStore, InsightsConfig, LocationFilter,
    Transaction, TransactionType, TransactionTypeFilter, YearFilter,
    insights::{
        CategorySummary, DiscountInsights, GasInsights, ItemSummary, OverviewSummary,
        PaymentInsights, RefundInsights,
    },
    normalize_batch, parse_export,
    receipt::parse_iso_date,
    report,
};

/// Spending analytics for warehouse club receipt and online order exports.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON export files to read.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Only include transactions from this year. May be repeated.
    #[arg(long = "year")]
    years: Vec<String>,

    /// Only include transactions from this warehouse, e.g. "SEATTLE #1".
    /// May be repeated.
    #[arg(long = "location")]
    locations: Vec<String>,

    /// Only include transactions on or after this date (YYYY-MM-DD).
    #[arg(long)]
    from: Option<String>,

    /// Only include transactions on or before this date (YYYY-MM-DD).
    #[arg(long)]
    to: Option<String>,

    /// Only include sales or refunds. May be repeated.
    #[arg(long = "type", value_enum)]
    types: Vec<TypeArg>,

    /// The report to produce.
    #[arg(long, value_enum, default_value_t = ReportKind::Overview)]
    report: ReportKind,

    /// The output format. CSV is available for the items and categories reports.
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// A JSON file with fuel grades, reward programs and other settings.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TypeArg {
    Sales,
    Refund,
}

impl From<TypeArg> for TransactionType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::Sales => TransactionType::Sales,
            TypeArg::Refund => TransactionType::Refund,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportKind {
    Overview,
    Items,
    Categories,
    Discounts,
    Refunds,
    Gas,
    Payments,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Text,
}

fn main() -> ExitCode {
    setup_logging();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: &Args) -> Result<(), Error> {
    if args.format == OutputFormat::Csv
        && !matches!(args.report, ReportKind::Items | ReportKind::Categories)
    {
        return Err(csv_unavailable());
    }

    let config = match &args.config {
        Some(path) => InsightsConfig::from_json(&fs::read_to_string(path)?)?,
        None => InsightsConfig::default(),
    };

    let mut transactions = Vec::new();
    for path in &args.files {
        transactions.extend(load_file(path)?);
    }

    let mut store = InsightStore::new(config)?;
    store.load(transactions);
    store.set_filters(build_filters(args)?);

    tracing::info!(
        "{} of {} transactions match the filters",
        store.filtered().len(),
        store.transactions().len()
    );

    let mut stdout = io::stdout().lock();
    write_report(&store, args.report, args.format, &mut stdout)
}

fn csv_unavailable() -> Error {
    Error::InvalidConfig(
        "CSV output is only available for the items and categories reports".to_owned(),
    )
}

fn load_file(path: &Path) -> Result<Vec<Transaction>, Error> {
    let text = fs::read_to_string(path)
        .map_err(|error| Error::Io(format!("could not read {}: {error}", path.display())))?;
    let records = parse_export(&text)?;
    let batch = normalize_batch(&records);

    let skipped = batch.cancelled + batch.failures.len();
    if skipped > 0 {
        tracing::warn!(
            "{skipped} of {} records in {} could not be processed",
            batch.record_count(),
            path.display()
        );
    }

    Ok(batch.transactions)
}

fn build_filters(args: &Args) -> Result<FilterPipeline, Error> {
    let mut filters = FilterPipeline::new();

    if !args.years.is_empty() {
        filters.add(Filter::Year(YearFilter::new(&args.years)));
    }

    if !args.locations.is_empty() {
        filters.add(Filter::Location(LocationFilter::new(&args.locations)));
    }

    if args.from.is_some() || args.to.is_some() {
        let start = parse_bound(args.from.as_deref(), Date::MIN)?;
        let end = parse_bound(args.to.as_deref(), Date::MAX)?;
        filters.add(Filter::DateRange(DateRangeFilter::new(start, end)?));
    }

    if !args.types.is_empty() {
        let types: Vec<TransactionType> = args.types.iter().map(|&t| t.into()).collect();
        filters.add(Filter::TransactionType(TransactionTypeFilter::new(&types)));
    }

    Ok(filters)
}

fn parse_bound(text: Option<&str>, default: Date) -> Result<Date, Error> {
    text.map_or(Ok(default), parse_iso_date)
}

fn write_json(value: &impl Serialize, out: &mut dyn Write) -> Result<(), Error> {
    serde_json::to_writer_pretty(&mut *out, value).map_err(|error| Error::Io(error.to_string()))?;
    writeln!(out)?;
    Ok(())
}

fn write_report(
    store: &InsightStore,
    report_kind: ReportKind,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), Error> {
    match (report_kind, format) {
        (ReportKind::Items, OutputFormat::Csv) => {
            report::write_items_csv(store.item_summaries(), out)
        }
        (ReportKind::Categories, OutputFormat::Csv) => {
            report::write_categories_csv(store.category_summaries(), out)
        }
        (_, OutputFormat::Csv) => Err(csv_unavailable()),
        (ReportKind::All, OutputFormat::Json) => write_json(&AllReports::new(store), out),
        (ReportKind::All, OutputFormat::Text) => {
            for kind in [
                ReportKind::Overview,
                ReportKind::Items,
                ReportKind::Categories,
                ReportKind::Discounts,
                ReportKind::Refunds,
                ReportKind::Gas,
                ReportKind::Payments,
            ] {
                writeln!(out, "== {kind:?} ==")?;
                write_report(store, kind, format, &mut *out)?;
                writeln!(out)?;
            }
            Ok(())
        }
        (kind, OutputFormat::Json) => match kind {
            ReportKind::Overview => write_json(store.overview(), out),
            ReportKind::Items => write_json(&store.item_summaries(), out),
            ReportKind::Categories => write_json(&store.category_summaries(), out),
            ReportKind::Discounts => write_json(store.discount_insights(), out),
            ReportKind::Refunds => write_json(store.refund_insights(), out),
            ReportKind::Gas => write_json(store.gas_insights(), out),
            ReportKind::Payments => write_json(store.payment_insights(), out),
            ReportKind::All => write_json(&AllReports::new(store), out),
        },
        (kind, OutputFormat::Text) => match kind {
            ReportKind::Overview => report::write_overview_text(store.overview(), out),
            ReportKind::Items => report::write_items_text(store.item_summaries(), out),
            ReportKind::Categories => {
                report::write_categories_text(store.category_summaries(), out)
            }
            ReportKind::Discounts => report::write_discounts_text(store.discount_insights(), out),
            ReportKind::Refunds => report::write_refunds_text(store.refund_insights(), out),
            ReportKind::Gas => report::write_gas_text(store.gas_insights(), out),
            ReportKind::Payments => report::write_payments_text(store.payment_insights(), out),
            ReportKind::All => Ok(()),
        },
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AllReports<'a> {
    overview: &'a OverviewSummary,
    items: &'a [ItemSummary],
    categories: &'a [CategorySummary],
    discounts: &'a DiscountInsights,
    refunds: &'a RefundInsights,
    gas: &'a GasInsights,
    payments: &'a PaymentInsights,
}

impl<'a> AllReports<'a> {
    fn new(store: &'a InsightStore) -> Self {
        Self {
            overview: store.overview(),
            items: store.item_summaries(),
            categories: store.category_summaries(),
            discounts: store.discount_insights(),
            refunds: store.refund_insights(),
            gas: store.gas_insights(),
            payments: store.payment_insights(),
        }
    }
}
