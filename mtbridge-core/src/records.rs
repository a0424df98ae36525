//! Typed records for the inbound mailbox files.
//!
//! The terminal writes JSON objects. Each file maps onto one record type here;
//! parsing yields either the typed record or an [`Error::Malformed`], which
//! callers treat as "terminal is mid-write, try again later".
//!
//! [`Error::Malformed`]: crate::Error::Malformed

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Open orders keyed by ticket.
pub type OrderSnapshot = BTreeMap<String, Order>;

/// Quotes keyed by symbol.
pub type MarketDataSnapshot = BTreeMap<String, Quote>;

/// Latest bar keyed by `symbol_timeframe`.
pub type BarDataSnapshot = BTreeMap<String, Bar>;

/// Bars keyed by bar time, for one `symbol_timeframe`.
pub type CandleSeries = BTreeMap<String, Candle>;

/// Historic bars keyed by `symbol_timeframe`.
pub type HistoricDataSnapshot = BTreeMap<String, CandleSeries>;

/// Historic trades as reported by the terminal.
pub type HistoricTrades = BTreeMap<String, Value>;

/// Messages keyed by millisecond timestamp. Null entries are kept as `None`.
pub type MessageQueueSnapshot = BTreeMap<String, Option<Message>>;

/// Content of the orders file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrdersFile {
    /// Account fields, replaced wholesale on every update.
    #[serde(default)]
    pub account_info: AccountInfo,
    /// Open orders keyed by ticket.
    pub orders: OrderSnapshot,
}

/// A single open or pending order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Order {
    /// Magic number.
    pub magic: i64,
    /// Symbol.
    pub symbol: String,
    /// Volume in lots.
    pub lots: f64,
    /// Order type (`buy`, `sell`, `buylimit`, ...).
    #[serde(rename = "type")]
    pub order_type: String,
    /// Open price.
    pub open_price: f64,
    /// Open time as formatted by the terminal.
    pub open_time: String,
    /// Stop loss price, zero if unset.
    #[serde(rename = "SL")]
    pub stop_loss: f64,
    /// Take profit price, zero if unset.
    #[serde(rename = "TP")]
    pub take_profit: f64,
    /// Floating profit.
    pub pnl: f64,
    /// Commission.
    pub commission: f64,
    /// Swap.
    pub swap: f64,
    /// Order comment.
    pub comment: String,
    /// Any other field the terminal reports.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Account fields reported with the orders file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountInfo {
    /// Account holder name.
    pub name: String,
    /// Account number.
    pub number: i64,
    /// Deposit currency.
    pub currency: String,
    /// Leverage.
    pub leverage: i64,
    /// Free margin.
    pub free_margin: f64,
    /// Balance.
    pub balance: f64,
    /// Equity.
    pub equity: f64,
    /// Any other field the terminal reports.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Latest quote of a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Bid price.
    pub bid: f64,
    /// Ask price.
    pub ask: f64,
    /// Other tick fields, part of the equality used for change detection.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Latest bar of a subscribed `symbol_timeframe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time as formatted by the terminal.
    pub time: String,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Tick volume.
    pub tick_volume: i64,
}

/// A historic bar; its time is the key it is stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Tick volume.
    #[serde(default)]
    pub tick_volume: i64,
}

/// A message from the terminal, e.g. an `INFO` or `ERROR` report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// Message type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Payload fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Message {
    /// Returns a payload field as a string slice.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Returns true for `ERROR` messages.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == "ERROR"
    }
}

/// Parses inbound text into a typed record.
///
/// # Errors
/// Returns [`Error::Malformed`](crate::Error::Malformed) if the text is not a
/// complete record of type `T`.
pub fn parse_record<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}

/// Parses the messages file.
///
/// Entries that are not a message object are kept as `None`, so one bad entry
/// does not hide the rest of the queue.
///
/// # Errors
/// Returns [`Error::Malformed`](crate::Error::Malformed) if the text is not a
/// complete JSON object.
pub fn parse_message_queue(text: &str) -> Result<MessageQueueSnapshot> {
    let raw: BTreeMap<String, Value> = serde_json::from_str(text)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let message = serde_json::from_value::<Option<Message>>(value).unwrap_or_else(|e| {
                tracing::debug!(key = %key, error = %e, "ignoring malformed message entry");
                None
            });
            (key, message)
        })
        .collect())
}

/// Splits a `symbol_timeframe` key.
///
/// Keys must split on `_` into exactly two parts; anything else is `None`.
#[must_use]
pub fn split_symbol_timeframe(key: &str) -> Option<(&str, &str)> {
    let (symbol, timeframe) = key.split_once('_')?;
    if timeframe.contains('_') {
        return None;
    }
    Some((symbol, timeframe))
}
