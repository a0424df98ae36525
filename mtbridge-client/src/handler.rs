//! Application callbacks.

use crate::bridge::Bridge;
use mtbridge_core::{Bar, CandleSeries, Message};
use tokio::sync::mpsc;

/// Trait for reacting to bridge events.
///
/// Every callback runs on the task of the poller that observed the change, so
/// callbacks of one poller are serialized but callbacks of different pollers
/// may interleave. The [`Bridge`] argument gives access to the current
/// snapshots and to the command helpers.
pub trait EventHandler: Send + Sync + 'static {
    /// Called once at startup, before any other callback.
    fn on_start(&self, _bridge: &Bridge) {}

    /// Called for every symbol whose quote changed.
    fn on_tick(&self, _bridge: &Bridge, _symbol: &str, _bid: f64, _ask: f64) {}

    /// Called for every `symbol_timeframe` whose latest bar changed.
    fn on_bar_data(&self, _bridge: &Bridge, _symbol: &str, _timeframe: &str, _bar: &Bar) {}

    /// Called for every series in a historic data response.
    fn on_historic_data(
        &self,
        _bridge: &Bridge,
        _symbol: &str,
        _timeframe: &str,
        _data: &CandleSeries,
    ) {
    }

    /// Called when a historic trades response replaced the stored trades.
    fn on_historic_trades(&self, _bridge: &Bridge) {}

    /// Called once per new message, in timestamp order.
    fn on_message(&self, _bridge: &Bridge, _message: &Message) {}

    /// Called once per poll in which orders appeared or disappeared.
    fn on_order_event(&self, _bridge: &Bridge) {}
}

/// Events forwarded by [`EventForwarder`].
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    /// The pollers are running.
    Started,
    /// A quote changed.
    Tick {
        /// Symbol.
        symbol: String,
        /// Bid price.
        bid: f64,
        /// Ask price.
        ask: f64,
    },
    /// A latest bar changed.
    Bar {
        /// Symbol.
        symbol: String,
        /// Timeframe.
        timeframe: String,
        /// The new bar.
        bar: Bar,
    },
    /// A historic data series arrived.
    HistoricData {
        /// Symbol.
        symbol: String,
        /// Timeframe.
        timeframe: String,
        /// Bars keyed by time.
        data: CandleSeries,
    },
    /// Historic trades were replaced.
    HistoricTrades,
    /// A new message.
    Message(Message),
    /// Orders appeared or disappeared.
    OrderEvent,
}

/// Event handler that forwards every callback into a channel, for
/// applications that prefer to consume events from their own task.
pub struct EventForwarder {
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl EventForwarder {
    /// Creates a forwarder and the receiving end of its channel.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: BridgeEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl EventHandler for EventForwarder {
    fn on_start(&self, _bridge: &Bridge) {
        self.forward(BridgeEvent::Started);
    }

    fn on_tick(&self, _bridge: &Bridge, symbol: &str, bid: f64, ask: f64) {
        self.forward(BridgeEvent::Tick {
            symbol: symbol.to_string(),
            bid,
            ask,
        });
    }

    fn on_bar_data(&self, _bridge: &Bridge, symbol: &str, timeframe: &str, bar: &Bar) {
        self.forward(BridgeEvent::Bar {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            bar: bar.clone(),
        });
    }

    fn on_historic_data(
        &self,
        _bridge: &Bridge,
        symbol: &str,
        timeframe: &str,
        data: &CandleSeries,
    ) {
        self.forward(BridgeEvent::HistoricData {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            data: data.clone(),
        });
    }

    fn on_historic_trades(&self, _bridge: &Bridge) {
        self.forward(BridgeEvent::HistoricTrades);
    }

    fn on_message(&self, _bridge: &Bridge, message: &Message) {
        self.forward(BridgeEvent::Message(message.clone()));
    }

    fn on_order_event(&self, _bridge: &Bridge) {
        self.forward(BridgeEvent::OrderEvent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_event_debug() {
        let event = BridgeEvent::Tick {
            symbol: "EURUSD".into(),
            bid: 1.1,
            ask: 1.2,
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("Tick"));
        assert!(debug_str.contains("EURUSD"));
    }

    #[test]
    fn test_forwarder_survives_dropped_receiver() {
        let (forwarder, rx) = EventForwarder::channel();
        drop(rx);
        forwarder.forward(BridgeEvent::OrderEvent);
    }
}
