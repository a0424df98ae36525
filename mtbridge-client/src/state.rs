//! Snapshots published by the pollers.
//!
//! Each snapshot is an immutable value behind an [`ArcSwap`]. A poller builds
//! the next value completely and swaps it in; readers get an `Arc` to
//! whichever complete value was current when they asked.

use arc_swap::ArcSwap;
use mtbridge_core::{
    BarDataSnapshot, CandleSeries, HistoricDataSnapshot, HistoricTrades, MarketDataSnapshot,
    OrdersFile,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Current view of the terminal as seen by the bridge.
pub struct BridgeState {
    orders: ArcSwap<OrdersFile>,
    market_data: ArcSwap<MarketDataSnapshot>,
    bar_data: ArcSwap<BarDataSnapshot>,
    historic_data: ArcSwap<HistoricDataSnapshot>,
    historic_trades: ArcSwap<HistoricTrades>,
    last_message_millis: AtomicU64,
}

impl BridgeState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            orders: ArcSwap::from_pointee(OrdersFile::default()),
            market_data: ArcSwap::from_pointee(MarketDataSnapshot::new()),
            bar_data: ArcSwap::from_pointee(BarDataSnapshot::new()),
            historic_data: ArcSwap::from_pointee(HistoricDataSnapshot::new()),
            historic_trades: ArcSwap::from_pointee(HistoricTrades::new()),
            last_message_millis: AtomicU64::new(0),
        }
    }

    /// Returns open orders together with the account info they came with.
    #[must_use]
    pub fn orders(&self) -> Arc<OrdersFile> {
        self.orders.load_full()
    }

    /// Returns the latest quotes.
    #[must_use]
    pub fn market_data(&self) -> Arc<MarketDataSnapshot> {
        self.market_data.load_full()
    }

    /// Returns the latest bars.
    #[must_use]
    pub fn bar_data(&self) -> Arc<BarDataSnapshot> {
        self.bar_data.load_full()
    }

    /// Returns all historic bars received so far.
    #[must_use]
    pub fn historic_data(&self) -> Arc<HistoricDataSnapshot> {
        self.historic_data.load_full()
    }

    /// Returns the latest historic trades response.
    #[must_use]
    pub fn historic_trades(&self) -> Arc<HistoricTrades> {
        self.historic_trades.load_full()
    }

    /// Returns the timestamp of the newest delivered message.
    #[must_use]
    pub fn last_message_millis(&self) -> u64 {
        self.last_message_millis.load(Ordering::Acquire)
    }

    pub(crate) fn publish_orders(&self, orders: Arc<OrdersFile>) {
        self.orders.store(orders);
    }

    pub(crate) fn publish_market_data(&self, data: Arc<MarketDataSnapshot>) {
        self.market_data.store(data);
    }

    pub(crate) fn publish_bar_data(&self, data: Arc<BarDataSnapshot>) {
        self.bar_data.store(data);
    }

    pub(crate) fn publish_historic_trades(&self, trades: HistoricTrades) {
        self.historic_trades.store(Arc::new(trades));
    }

    /// Merges a historic data response into the cumulative store.
    pub(crate) fn merge_historic_data(&self, batch: &[(String, CandleSeries)]) {
        let mut merged = HistoricDataSnapshot::clone(&self.historic_data.load());
        for (key, series) in batch {
            merged
                .entry(key.clone())
                .or_default()
                .extend(series.iter().map(|(time, candle)| (time.clone(), candle.clone())));
        }
        self.historic_data.store(Arc::new(merged));
    }

    pub(crate) fn set_last_message_millis(&self, millis: u64) {
        self.last_message_millis.store(millis, Ordering::Release);
    }
}

impl Default for BridgeState {
    fn default() -> Self {
        Self::new()
    }
}
