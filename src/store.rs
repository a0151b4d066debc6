//! Holds the loaded transactions, the active filters and cached insights.
//!
//! Every change to the data or the filters bumps [InsightStore::data_version],
//! rebuilds the filtered view, drops all cached insights and then tells the
//! subscribers of the affected topics. Insights are computed from the
//! filtered view on first access and reused until the next change.

use std::cell::OnceCell;

use crate::{
    Error,
    config::InsightsConfig,
    filter::{Filter, FilterPipeline},
    insights::{
        CategorySummary, DiscountInsights, GasInsights, ItemSummary, OverviewSummary,
        PaymentInsights, RefundInsights, build_category_summaries, build_item_summaries,
        collect_discount_insights, collect_gas_insights, collect_payment_insights,
        collect_refund_insights, summarize_overview,
    },
    receipt::Transaction,
};

/// The parts of the store that can be subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every loaded transaction.
    Transactions,
    /// The transactions that pass the active filters.
    FilteredTransactions,
    /// The active filters.
    Filters,
}

/// The current value of a [Topic], passed to its subscribers.
#[derive(Debug, Clone, Copy)]
pub enum StoreEvent<'a> {
    /// Every loaded transaction.
    Transactions(&'a [Transaction]),
    /// The transactions that pass the active filters.
    FilteredTransactions(&'a [Transaction]),
    /// The active filters.
    Filters(&'a FilterPipeline),
}

impl StoreEvent<'_> {
    /// The topic this event belongs to.
    pub fn topic(&self) -> Topic {
        match self {
            StoreEvent::Transactions(_) => Topic::Transactions,
            StoreEvent::FilteredTransactions(_) => Topic::FilteredTransactions,
            StoreEvent::Filters(_) => Topic::Filters,
        }
    }
}

/// Identifies a subscription so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn FnMut(StoreEvent<'_>)>;

struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    callback: Callback,
}

/// Insight results computed for one data version.
#[derive(Default)]
struct InsightCache {
    items: OnceCell<Vec<ItemSummary>>,
    categories: OnceCell<Vec<CategorySummary>>,
    discounts: OnceCell<DiscountInsights>,
    refunds: OnceCell<RefundInsights>,
    gas: OnceCell<GasInsights>,
    payments: OnceCell<PaymentInsights>,
    overview: OnceCell<OverviewSummary>,
}

/// Loaded transactions with filters, change notifications and cached insights.
///
/// Callbacks run synchronously on the thread that made the change, so the
/// store is neither `Send` nor `Sync`.
pub struct InsightStore {
    config: InsightsConfig,
    transactions: Vec<Transaction>,
    filters: FilterPipeline,
    filtered: Vec<Transaction>,
    data_version: u64,
    cache: InsightCache,
    subscriptions: Vec<Subscription>,
    next_subscription: u64,
}

impl InsightStore {
    /// Create an empty store.
    ///
    /// # Errors
    /// Returns [Error::InvalidConfig] if `config` has a negative or non-finite
    /// rate, cap or tolerance.
    pub fn new(config: InsightsConfig) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            config,
            transactions: Vec::new(),
            filters: FilterPipeline::new(),
            filtered: Vec::new(),
            data_version: 0,
            cache: InsightCache::default(),
            subscriptions: Vec::new(),
            next_subscription: 0,
        })
    }

    /// The config the insights are computed with.
    pub fn config(&self) -> &InsightsConfig {
        &self.config
    }

    /// A counter that increases on every change to the data or the filters.
    pub fn data_version(&self) -> u64 {
        self.data_version
    }

    /// Every loaded transaction.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The transactions that pass the active filters.
    pub fn filtered(&self) -> &[Transaction] {
        &self.filtered
    }

    /// The active filters.
    pub fn filters(&self) -> &FilterPipeline {
        &self.filters
    }

    /// Replace all transactions.
    pub fn load(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
        self.data_changed();
    }

    /// Add transactions to the ones already loaded.
    pub fn extend(&mut self, transactions: impl IntoIterator<Item = Transaction>) {
        self.transactions.extend(transactions);
        self.data_changed();
    }

    /// Replace the active filters.
    pub fn set_filters(&mut self, filters: FilterPipeline) {
        self.filters = filters;
        self.filters_changed();
    }

    /// Add a filter, replacing any active filter of the same kind.
    pub fn add_filter(&mut self, filter: Filter) {
        self.filters.add(filter);
        self.filters_changed();
    }

    /// Remove the active filter named `name`.
    ///
    /// Returns `false`, and changes nothing, if no such filter was active.
    pub fn remove_filter(&mut self, name: &str) -> bool {
        let removed = self.filters.remove(name);
        if removed {
            self.filters_changed();
        }
        removed
    }

    /// Remove all filters.
    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.filters_changed();
    }

    /// Call `callback` with the current value of `topic`, and again every time
    /// it changes.
    pub fn subscribe(
        &mut self,
        topic: Topic,
        callback: impl FnMut(StoreEvent<'_>) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;

        let mut subscription = Subscription {
            id,
            topic,
            callback: Box::new(callback),
        };
        (subscription.callback)(self.event(topic));
        self.subscriptions.push(subscription);

        tracing::debug!("Added subscription {id:?} to {topic:?}");

        id
    }

    /// Stop calling the callback registered under `id`.
    ///
    /// Returns `false` if there was no such subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let count = self.subscriptions.len();
        self.subscriptions
            .retain(|subscription| subscription.id != id);
        self.subscriptions.len() != count
    }

    /// Per-item summaries of the filtered transactions.
    pub fn item_summaries(&self) -> &[ItemSummary] {
        self.cache
            .items
            .get_or_init(|| build_item_summaries(&self.filtered))
    }

    /// Per-department summaries of the filtered transactions.
    pub fn category_summaries(&self) -> &[CategorySummary] {
        self.cache
            .categories
            .get_or_init(|| build_category_summaries(&self.filtered))
    }

    /// Discount totals for the filtered transactions.
    pub fn discount_insights(&self) -> &DiscountInsights {
        self.cache
            .discounts
            .get_or_init(|| collect_discount_insights(&self.filtered, &self.config))
    }

    /// Returns and adjustments in the filtered transactions.
    pub fn refund_insights(&self) -> &RefundInsights {
        self.cache
            .refunds
            .get_or_init(|| collect_refund_insights(&self.filtered, &self.config))
    }

    /// Gas spending in the filtered transactions.
    pub fn gas_insights(&self) -> &GasInsights {
        self.cache
            .gas
            .get_or_init(|| collect_gas_insights(&self.filtered, &self.config))
    }

    /// Spending per payment method in the filtered transactions.
    pub fn payment_insights(&self) -> &PaymentInsights {
        self.cache
            .payments
            .get_or_init(|| collect_payment_insights(&self.filtered, &self.config))
    }

    /// Headline numbers for the filtered transactions.
    pub fn overview(&self) -> &OverviewSummary {
        self.cache
            .overview
            .get_or_init(|| summarize_overview(&self.filtered, &self.config))
    }

    fn event(&self, topic: Topic) -> StoreEvent<'_> {
        match topic {
            Topic::Transactions => StoreEvent::Transactions(&self.transactions),
            Topic::FilteredTransactions => StoreEvent::FilteredTransactions(&self.filtered),
            Topic::Filters => StoreEvent::Filters(&self.filters),
        }
    }

    fn data_changed(&mut self) {
        self.refresh();
        self.notify(&[Topic::Transactions, Topic::FilteredTransactions]);
    }

    fn filters_changed(&mut self) {
        self.refresh();
        self.notify(&[Topic::Filters, Topic::FilteredTransactions]);
    }

    fn refresh(&mut self) {
        self.data_version += 1;
        self.filtered = self.filters.apply(&self.transactions);
        self.cache = InsightCache::default();

        tracing::debug!(
            "Data version {}: {} of {} transactions pass {} filters",
            self.data_version,
            self.filtered.len(),
            self.transactions.len(),
            self.filters.filters().len()
        );
    }

    fn notify(&mut self, topics: &[Topic]) {
        for &topic in topics {
            let event = match topic {
                Topic::Transactions => StoreEvent::Transactions(&self.transactions),
                Topic::FilteredTransactions => StoreEvent::FilteredTransactions(&self.filtered),
                Topic::Filters => StoreEvent::Filters(&self.filters),
            };

            for subscription in self
                .subscriptions
                .iter_mut()
                .filter(|subscription| subscription.topic == topic)
            {
                (subscription.callback)(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use time::macros::date;

    use super::{InsightStore, StoreEvent, Topic};
    use crate::{
        Error,
        config::{InsightsConfig, RewardTerms},
        filter::{Filter, FilterPipeline, YearFilter},
        receipt::{LineItem, Transaction},
    };

    fn transactions() -> Vec<Transaction> {
        vec![
            Transaction::new(date!(2023 - 05 - 01), "SEATTLE #1", 10.0)
                .with_item(LineItem::new("1", "MILK", 10.0, 1.0)),
            Transaction::new(date!(2024 - 05 - 01), "SEATTLE #1", 20.0)
                .with_item(LineItem::new("2", "BREAD", 20.0, 1.0)),
        ]
    }

    fn year_2024() -> Filter {
        Filter::Year(YearFilter::new(["2024"]))
    }

    #[test]
    fn subscribers_are_called_immediately() {
        let mut store = InsightStore::new(InsightsConfig::default()).unwrap();
        store.load(transactions());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        store.subscribe(Topic::FilteredTransactions, move |event| {
            if let StoreEvent::FilteredTransactions(transactions) = event {
                log.borrow_mut().push(transactions.len());
            }
        });

        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn subscribers_hear_about_filter_changes() {
        let mut store = InsightStore::new(InsightsConfig::default()).unwrap();
        store.load(transactions());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&seen);
        store.subscribe(Topic::FilteredTransactions, move |event| {
            if let StoreEvent::FilteredTransactions(transactions) = event {
                log.borrow_mut().push(transactions.len());
            }
        });
        store.add_filter(year_2024());
        store.clear_filters();

        assert_eq!(*seen.borrow(), vec![2, 1, 2]);
    }

    #[test]
    fn unsubscribed_callbacks_are_not_called() {
        let mut store = InsightStore::new(InsightsConfig::default()).unwrap();
        let calls = Rc::new(RefCell::new(0));

        let counter = Rc::clone(&calls);
        let id = store.subscribe(Topic::Transactions, move |_| *counter.borrow_mut() += 1);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.load(transactions());

        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn filter_topic_only_fires_for_filter_changes() {
        let mut store = InsightStore::new(InsightsConfig::default()).unwrap();
        let topics = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&topics);
        store.subscribe(Topic::Filters, move |event| log.borrow_mut().push(event.topic()));
        store.load(transactions());
        store.set_filters(FilterPipeline::new().with(year_2024()));

        assert_eq!(*topics.borrow(), vec![Topic::Filters, Topic::Filters]);
    }

    #[test]
    fn cached_insights_are_dropped_when_data_changes() {
        let mut store = InsightStore::new(InsightsConfig::default()).unwrap();
        store.load(transactions());

        assert_eq!(store.overview().total_spent, 30.0);
        assert_eq!(store.item_summaries().len(), 2);
        let version = store.data_version();

        store.add_filter(year_2024());

        assert!(store.data_version() > version);
        assert_eq!(store.overview().total_spent, 20.0);
        assert_eq!(store.item_summaries().len(), 1);
        assert_eq!(store.item_summaries()[0].name, "BREAD");
    }

    #[test]
    fn repeated_reads_reuse_the_cached_value() {
        let mut store = InsightStore::new(InsightsConfig::default()).unwrap();
        store.load(transactions());

        let first = store.category_summaries().as_ptr();
        let version = store.data_version();

        assert_eq!(store.category_summaries().as_ptr(), first);
        assert_eq!(store.data_version(), version);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = InsightsConfig {
            reward_terms: RewardTerms {
                rate: -0.02,
                cap: 1000.0,
            },
            ..Default::default()
        };

        let result = InsightStore::new(config);

        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn removing_an_inactive_filter_changes_nothing() {
        let mut store = InsightStore::new(InsightsConfig::default()).unwrap();
        store.load(transactions());
        let version = store.data_version();

        assert!(!store.remove_filter("year"));
        assert_eq!(store.data_version(), version);

        store.extend(transactions());
        assert_eq!(store.filtered().len(), 4);
    }
}
