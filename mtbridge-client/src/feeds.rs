//! The five inbound feeds: orders, messages, market data, bar data and the
//! historic data/trades pair.

use crate::bridge::Bridge;
use crate::poller::{Feed, WatchedFile};
use crate::sequencer::MessageSequencer;
use async_trait::async_trait;
use mtbridge_core::{
    BarDataSnapshot, CandleSeries, HistoricDataSnapshot, HistoricTrades, MarketDataSnapshot,
    OrderSnapshot, OrdersFile, parse_message_queue, parse_record, split_symbol_timeframe,
};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Tickets that appeared or disappeared between two order snapshots.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct OrdersDiff {
    /// Tickets present only in the new snapshot.
    pub added: Vec<String>,
    /// Tickets present only in the old snapshot.
    pub removed: Vec<String>,
}

impl OrdersDiff {
    /// Returns true if the ticket sets are equal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compares two order snapshots by ticket only; field changes of a ticket
/// present in both are not reported.
#[must_use]
pub fn diff_orders(old: &OrderSnapshot, new: &OrderSnapshot) -> OrdersDiff {
    OrdersDiff {
        added: new
            .keys()
            .filter(|ticket| !old.contains_key(*ticket))
            .cloned()
            .collect(),
        removed: old
            .keys()
            .filter(|ticket| !new.contains_key(*ticket))
            .cloned()
            .collect(),
    }
}

/// Returns the keys of `new` whose value is absent from or different in
/// `old`, in key order.
#[must_use]
pub fn changed_keys<V: PartialEq>(old: &BTreeMap<String, V>, new: &BTreeMap<String, V>) -> Vec<String> {
    new.iter()
        .filter(|(key, value)| old.get(*key) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect()
}

fn parse_or_skip<T: DeserializeOwned>(feed: &'static str, text: &str) -> Option<T> {
    match parse_record(text) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::trace!(feed, error = %e, "skipping unparsable snapshot");
            None
        }
    }
}

/// Watches the orders file.
pub(crate) struct OrdersFeed {
    file: WatchedFile,
    persist: bool,
}

impl OrdersFeed {
    pub(crate) fn new(file: WatchedFile, persist: bool) -> Self {
        Self { file, persist }
    }
}

#[async_trait]
impl Feed for OrdersFeed {
    fn name(&self) -> &'static str {
        "orders"
    }

    async fn tick(&mut self, bridge: &Bridge) {
        let Some(text) = self.file.read_changed(bridge.store()).await else {
            return;
        };
        let Some(next) = parse_or_skip::<OrdersFile>(self.name(), &text) else {
            return;
        };
        self.file.accept(text.clone());

        let previous = bridge.state().orders();
        let diff = diff_orders(&previous.orders, &next.orders);
        for ticket in &diff.removed {
            tracing::debug!(ticket = %ticket, order = ?previous.orders.get(ticket), "order removed");
        }
        for ticket in &diff.added {
            tracing::debug!(ticket = %ticket, order = ?next.orders.get(ticket), "new order");
        }

        bridge.state().publish_orders(Arc::new(next));

        if self.persist {
            if let Err(e) = bridge.restart().save_orders(&text).await {
                tracing::warn!(error = %e, "failed to store orders");
            }
        }

        if !diff.is_empty() {
            if let Some(handler) = bridge.handler() {
                handler.on_order_event(bridge);
            }
        }
    }
}

/// Watches the messages file.
pub(crate) struct MessagesFeed {
    file: WatchedFile,
    sequencer: MessageSequencer,
}

impl MessagesFeed {
    pub(crate) fn new(file: WatchedFile, sequencer: MessageSequencer) -> Self {
        Self { file, sequencer }
    }
}

#[async_trait]
impl Feed for MessagesFeed {
    fn name(&self) -> &'static str {
        "messages"
    }

    async fn tick(&mut self, bridge: &Bridge) {
        let Some(text) = self.file.read_changed(bridge.store()).await else {
            return;
        };
        let queue = match parse_message_queue(&text) {
            Ok(queue) => queue,
            Err(e) => {
                tracing::trace!(feed = self.name(), error = %e, "skipping unparsable snapshot");
                return;
            }
        };
        self.file.accept(text.clone());

        let fresh = self.sequencer.admit(&queue);
        if let Some((millis, _)) = fresh.last() {
            bridge.state().set_last_message_millis(*millis);
        }

        for (millis, message) in &fresh {
            if message.is_error() {
                tracing::debug!(millis, message = ?message, "terminal reported an error");
            }
            if let Some(handler) = bridge.handler() {
                handler.on_message(bridge, message);
            }
        }

        if let Err(e) = bridge.restart().save_messages(&text).await {
            tracing::warn!(error = %e, "failed to store messages");
        }
    }
}

/// Watches the market data file.
pub(crate) struct MarketDataFeed {
    file: WatchedFile,
}

impl MarketDataFeed {
    pub(crate) fn new(file: WatchedFile) -> Self {
        Self { file }
    }
}

#[async_trait]
impl Feed for MarketDataFeed {
    fn name(&self) -> &'static str {
        "market_data"
    }

    async fn tick(&mut self, bridge: &Bridge) {
        let Some(text) = self.file.read_changed(bridge.store()).await else {
            return;
        };
        let Some(next) = parse_or_skip::<MarketDataSnapshot>(self.name(), &text) else {
            return;
        };
        self.file.accept(text);

        let next = Arc::new(next);
        let changed = changed_keys(bridge.state().market_data().as_ref(), next.as_ref());
        bridge.state().publish_market_data(Arc::clone(&next));

        let Some(handler) = bridge.handler() else {
            return;
        };
        for symbol in changed {
            if let Some(quote) = next.get(&symbol) {
                handler.on_tick(bridge, &symbol, quote.bid, quote.ask);
            }
        }
    }
}

/// Watches the bar data file.
pub(crate) struct BarDataFeed {
    file: WatchedFile,
}

impl BarDataFeed {
    pub(crate) fn new(file: WatchedFile) -> Self {
        Self { file }
    }
}

#[async_trait]
impl Feed for BarDataFeed {
    fn name(&self) -> &'static str {
        "bar_data"
    }

    async fn tick(&mut self, bridge: &Bridge) {
        let Some(text) = self.file.read_changed(bridge.store()).await else {
            return;
        };
        let Some(next) = parse_or_skip::<BarDataSnapshot>(self.name(), &text) else {
            return;
        };
        self.file.accept(text);

        let next = Arc::new(next);
        let changed = changed_keys(bridge.state().bar_data().as_ref(), next.as_ref());
        bridge.state().publish_bar_data(Arc::clone(&next));

        let Some(handler) = bridge.handler() else {
            return;
        };
        for key in changed {
            let Some((symbol, timeframe)) = split_symbol_timeframe(&key) else {
                tracing::trace!(key = %key, "dropping bar with malformed key");
                continue;
            };
            if let Some(bar) = next.get(&key) {
                handler.on_bar_data(bridge, symbol, timeframe, bar);
            }
        }
    }
}

/// Watches the one-shot historic data and historic trades files.
pub(crate) struct HistoricFeed {
    data_file: WatchedFile,
    trades_file: WatchedFile,
}

impl HistoricFeed {
    pub(crate) fn new(data_file: WatchedFile, trades_file: WatchedFile) -> Self {
        Self {
            data_file,
            trades_file,
        }
    }

    async fn poll_data(&mut self, bridge: &Bridge) {
        let Some(text) = self.data_file.read_changed(bridge.store()).await else {
            return;
        };
        let Some(data) = parse_or_skip::<HistoricDataSnapshot>("historic_data", &text) else {
            return;
        };
        self.data_file.accept(text);

        let batch: Vec<(String, CandleSeries)> = data
            .into_iter()
            .filter(|(key, _)| {
                let valid = split_symbol_timeframe(key).is_some();
                if !valid {
                    tracing::trace!(key = %key, "dropping historic data with malformed key");
                }
                valid
            })
            .collect();

        bridge.state().merge_historic_data(&batch);
        bridge.store().remove(self.data_file.path()).await;
        self.data_file.clear();

        let Some(handler) = bridge.handler() else {
            return;
        };
        for (key, series) in &batch {
            if let Some((symbol, timeframe)) = split_symbol_timeframe(key) {
                handler.on_historic_data(bridge, symbol, timeframe, series);
            }
        }
    }

    async fn poll_trades(&mut self, bridge: &Bridge) {
        let Some(text) = self.trades_file.read_changed(bridge.store()).await else {
            return;
        };
        let Some(trades) = parse_or_skip::<HistoricTrades>("historic_trades", &text) else {
            return;
        };
        self.trades_file.accept(text);

        bridge.state().publish_historic_trades(trades);
        if let Some(handler) = bridge.handler() {
            handler.on_historic_trades(bridge);
        }
        bridge.store().remove(self.trades_file.path()).await;
        self.trades_file.clear();
    }
}

#[async_trait]
impl Feed for HistoricFeed {
    fn name(&self) -> &'static str {
        "historic"
    }

    async fn tick(&mut self, bridge: &Bridge) {
        self.poll_data(bridge).await;
        self.poll_trades(bridge).await;
    }
}
